//! Read-only static dataset: monthly series per city and country plus point
//! snapshots, loaded once from CSV files and shared by every request.

use anyhow::{Context, Result, anyhow};
use csv::{ReaderBuilder, StringRecord};
use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, fs::File, io::Read, path::PathBuf};
use tracing::debug;

use crate::{
    category::{AqiCategory, classify},
    error::{AqiError, AqiResult},
    model::Place,
    series::{Month, MonthlySeries},
};

/// Where the dataset files live. Every file is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetPaths {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cities: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub countries: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markers: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CityRecord {
    pub city: String,
    pub state: Option<String>,
    pub country: Option<String>,
    pub series: MonthlySeries,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CountryRecord {
    pub rank: Option<u32>,
    pub country: String,
    pub annual_average: Option<f64>,
    pub series: MonthlySeries,
}

/// Single current value for a place, as shown on the map.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerRecord {
    pub city: Option<String>,
    pub country: Option<String>,
    pub aqi: Option<f64>,
}

/// One row of the most-polluted countries list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryRanking {
    pub position: usize,
    pub country: String,
    /// Rank as printed in the source table, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_rank: Option<u32>,
    pub average: Option<f64>,
    pub category: Option<AqiCategory>,
}

/// What the dataset holds for a place.
#[derive(Debug, Clone, PartialEq)]
pub enum DatasetHit {
    Current(f64),
    Monthly(MonthlySeries),
}

#[derive(Debug, Clone, Default)]
pub struct StaticDataset {
    cities: Vec<CityRecord>,
    countries: Vec<CountryRecord>,
    markers: Vec<MarkerRecord>,
}

impl StaticDataset {
    pub fn new(
        cities: Vec<CityRecord>,
        countries: Vec<CountryRecord>,
        markers: Vec<MarkerRecord>,
    ) -> Self {
        Self { cities, countries, markers }
    }

    /// Load whichever files are configured; a missing entry just leaves that
    /// table empty.
    pub fn load(paths: &DatasetPaths) -> Result<Self> {
        let mut dataset = Self::default();

        if let Some(path) = &paths.cities {
            let file = File::open(path)
                .with_context(|| format!("Failed to open cities dataset: {}", path.display()))?;
            dataset.cities = parse_cities(file)
                .with_context(|| format!("Failed to parse cities dataset: {}", path.display()))?;
        }
        if let Some(path) = &paths.countries {
            let file = File::open(path)
                .with_context(|| format!("Failed to open countries dataset: {}", path.display()))?;
            dataset.countries = parse_countries(file).with_context(|| {
                format!("Failed to parse countries dataset: {}", path.display())
            })?;
        }
        if let Some(path) = &paths.markers {
            let file = File::open(path)
                .with_context(|| format!("Failed to open markers dataset: {}", path.display()))?;
            dataset.markers = parse_markers(file)
                .with_context(|| format!("Failed to parse markers dataset: {}", path.display()))?;
        }

        debug!(
            cities = dataset.cities.len(),
            countries = dataset.countries.len(),
            markers = dataset.markers.len(),
            "Static dataset loaded"
        );

        Ok(dataset)
    }

    pub fn cities(&self) -> &[CityRecord] {
        &self.cities
    }

    pub fn countries(&self) -> &[CountryRecord] {
        &self.countries
    }

    pub fn markers(&self) -> &[MarkerRecord] {
        &self.markers
    }

    /// Best figure for a place: a point snapshot first, then a monthly series
    /// with at least one value. Snapshots carry no state, so a state-qualified
    /// city with its own series skips them.
    pub fn lookup(&self, place: &Place) -> AqiResult<DatasetHit> {
        let series = self.series_candidate(place)?;

        let state_qualified = matches!(place, Place::City { state: Some(_), .. }) && series.is_some();
        let snapshot =
            if state_qualified { None } else { self.marker_for(place).and_then(|m| m.aqi) };
        if let Some(aqi) = snapshot {
            return Ok(DatasetHit::Current(aqi));
        }

        match series {
            Some(series) if !series.is_all_missing() => Ok(DatasetHit::Monthly(series.clone())),
            Some(_) => Err(AqiError::no_data(place.to_string())),
            None if self.marker_for(place).is_some() => Err(AqiError::no_data(place.to_string())),
            None => Err(AqiError::unknown_place(place.to_string())),
        }
    }

    /// Monthly series for a place. Places with only a point snapshot, or with
    /// twelve missing months, have no data.
    pub fn series(&self, place: &Place) -> AqiResult<MonthlySeries> {
        match self.series_candidate(place)? {
            Some(series) if !series.is_all_missing() => Ok(series.clone()),
            Some(_) => Err(AqiError::no_data(place.to_string())),
            None if self.marker_for(place).is_some() => Err(AqiError::no_data(place.to_string())),
            None => Err(AqiError::unknown_place(place.to_string())),
        }
    }

    /// Countries ordered from most to least polluted by their annual average,
    /// or the mean of their monthly values when the table has none. Countries
    /// without any figure come last.
    pub fn ranking(&self, limit: Option<usize>) -> Vec<CountryRanking> {
        let mut rows: Vec<(&CountryRecord, Option<f64>)> = self
            .countries
            .iter()
            .map(|r| {
                let average = r
                    .annual_average
                    .filter(|v| v.is_finite() && *v >= 0.0)
                    .or_else(|| r.series.average());
                (r, average)
            })
            .collect();

        rows.sort_by(|(a, x), (b, y)| {
            let by_value = match (x, y) {
                (Some(x), Some(y)) => y.total_cmp(x),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            by_value.then_with(|| a.country.to_lowercase().cmp(&b.country.to_lowercase()))
        });

        rows.into_iter()
            .take(limit.unwrap_or(usize::MAX))
            .enumerate()
            .map(|(i, (r, average))| CountryRanking {
                position: i + 1,
                country: r.country.clone(),
                published_rank: r.rank,
                average,
                category: average.and_then(|v| classify(v).ok()),
            })
            .collect()
    }

    /// City names known for a country, from snapshots and monthly rows,
    /// sorted and without case-insensitive duplicates.
    pub fn cities_in(&self, country: &str) -> AqiResult<Vec<String>> {
        if country.trim().is_empty() {
            return Err(AqiError::invalid("Country name must not be empty"));
        }

        let from_markers = self
            .markers
            .iter()
            .filter(|m| opt_same(m.country.as_deref(), country))
            .filter_map(|m| m.city.as_deref());
        let from_series = self
            .cities
            .iter()
            .filter(|r| opt_same(r.country.as_deref(), country))
            .map(|r| r.city.as_str());

        let mut cities: Vec<String> = from_markers.chain(from_series).map(String::from).collect();
        cities.sort_by_key(|c| c.to_lowercase());
        cities.dedup_by(|a, b| same(a, b));

        debug!(country, count = cities.len(), "Listed cities");
        Ok(cities)
    }

    fn series_candidate(&self, place: &Place) -> AqiResult<Option<&MonthlySeries>> {
        match place {
            Place::City { city, state, country } => {
                let matches: Vec<&CityRecord> = self
                    .cities
                    .iter()
                    .filter(|r| same(&r.city, city))
                    .filter(|r| state.as_deref().is_none_or(|s| opt_same(r.state.as_deref(), s)))
                    .filter(|r| {
                        country.as_deref().is_none_or(|c| {
                            r.country.as_deref().is_none_or(|rc| same(rc, c))
                        })
                    })
                    .collect();

                if state.is_none() && has_several_states(&matches) {
                    let states: Vec<&str> =
                        matches.iter().filter_map(|r| r.state.as_deref()).collect();
                    return Err(AqiError::invalid(format!(
                        "'{city}' exists in several states ({}); please specify a state",
                        states.join(", ")
                    )));
                }

                Ok(matches.first().map(|r| &r.series))
            }
            Place::Country { country } => Ok(self
                .countries
                .iter()
                .find(|r| same(&r.country, country))
                .map(|r| &r.series)),
        }
    }

    fn marker_for(&self, place: &Place) -> Option<&MarkerRecord> {
        match place {
            Place::City { city, country, .. } => self.markers.iter().find(|m| {
                opt_same(m.city.as_deref(), city)
                    && country.as_deref().is_none_or(|c| {
                        m.country.as_deref().is_none_or(|mc| same(mc, c))
                    })
            }),
            Place::Country { country } => self
                .markers
                .iter()
                .find(|m| m.city.is_none() && opt_same(m.country.as_deref(), country)),
        }
    }
}

fn same(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

fn opt_same(a: Option<&str>, b: &str) -> bool {
    a.is_some_and(|a| same(a, b))
}

fn has_several_states(matches: &[&CityRecord]) -> bool {
    let mut states: Vec<String> =
        matches.iter().filter_map(|r| r.state.as_deref()).map(str::to_lowercase).collect();
    states.sort();
    states.dedup();
    states.len() > 1
}

struct Columns {
    headers: StringRecord,
}

impl Columns {
    fn find(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.trim().eq_ignore_ascii_case(name))
    }

    fn require(&self, name: &str) -> Result<usize> {
        self.find(name).ok_or_else(|| anyhow!("Missing column '{name}'"))
    }

    fn months(&self) -> Result<[usize; 12]> {
        let mut idx = [0; 12];
        for month in Month::ALL {
            idx[month.index()] = self.require(month.abbrev())?;
        }
        Ok(idx)
    }
}

fn reader<R: Read>(input: R) -> csv::Reader<R> {
    ReaderBuilder::new().has_headers(true).flexible(true).trim(csv::Trim::All).from_reader(input)
}

fn text(record: &StringRecord, idx: Option<usize>) -> Option<String> {
    idx.and_then(|i| record.get(i)).map(str::trim).filter(|s| !s.is_empty()).map(String::from)
}

/// `--`, `N/A` and blank cells are missing; anything else must be a number.
fn number(record: &StringRecord, idx: usize) -> Result<Option<f64>> {
    match record.get(idx).map(str::trim) {
        None | Some("") | Some("--") | Some("-") => Ok(None),
        Some(s) if s.eq_ignore_ascii_case("n/a") || s.eq_ignore_ascii_case("nan") => Ok(None),
        Some(s) => s.parse::<f64>().map(Some).with_context(|| format!("Invalid number '{s}'")),
    }
}

fn series(record: &StringRecord, months: &[usize; 12]) -> Result<MonthlySeries> {
    let mut values = [None; 12];
    for (slot, idx) in values.iter_mut().zip(months) {
        *slot = number(record, *idx)?;
    }
    Ok(MonthlySeries::new(values)?)
}

fn line(record: &StringRecord) -> u64 {
    record.position().map_or(0, |p| p.line())
}

pub fn parse_cities<R: Read>(input: R) -> Result<Vec<CityRecord>> {
    let mut rdr = reader(input);
    let columns = Columns { headers: rdr.headers()?.clone() };

    let city_idx = columns.require("City")?;
    let state_idx = columns.find("State");
    let country_idx = columns.find("Country");
    let months = columns.months()?;

    let mut out = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let Some(city) = text(&record, Some(city_idx)) else {
            continue;
        };
        let series = series(&record, &months).with_context(|| format!("line {}", line(&record)))?;

        out.push(CityRecord {
            city,
            state: text(&record, state_idx),
            country: text(&record, country_idx),
            series,
        });
    }

    Ok(out)
}

pub fn parse_countries<R: Read>(input: R) -> Result<Vec<CountryRecord>> {
    let mut rdr = reader(input);
    let columns = Columns { headers: rdr.headers()?.clone() };

    let country_idx = columns.require("Country")?;
    let rank_idx = columns.find("Rank");
    let avg_idx = columns
        .headers
        .iter()
        .position(|h| h.to_ascii_lowercase().contains("avg"));
    let months = columns.months()?;

    let mut out = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let Some(country) = text(&record, Some(country_idx)) else {
            continue;
        };
        let context = || format!("line {}", line(&record));

        let annual_average = match avg_idx {
            Some(i) => number(&record, i).with_context(context)?,
            None => None,
        };

        out.push(CountryRecord {
            rank: text(&record, rank_idx).and_then(|r| r.parse().ok()),
            country,
            annual_average,
            series: series(&record, &months).with_context(context)?,
        });
    }

    Ok(out)
}

pub fn parse_markers<R: Read>(input: R) -> Result<Vec<MarkerRecord>> {
    let mut rdr = reader(input);
    let columns = Columns { headers: rdr.headers()?.clone() };

    let city_idx = columns.find("City");
    let country_idx = columns.find("Country");
    let aqi_idx = columns.find("AQI Value").or_else(|| columns.find("AQI"));
    if city_idx.is_none() && country_idx.is_none() {
        return Err(anyhow!("Markers need a 'City' or 'Country' column"));
    }
    let aqi_idx = aqi_idx.ok_or_else(|| anyhow!("Missing column 'AQI Value'"))?;

    let mut out = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let aqi = number(&record, aqi_idx)
            .with_context(|| format!("line {}", line(&record)))?
            .filter(|v| v.is_finite() && *v >= 0.0);

        out.push(MarkerRecord {
            city: text(&record, city_idx),
            country: text(&record, country_idx),
            aqi,
        });
    }

    Ok(out)
}
