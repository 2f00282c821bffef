//! Four-season AQI outlook by location type.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

use crate::{
    category::{AqiCategory, classify},
    error::{AqiError, AqiResult},
    model::Pollutant,
};

/// Meteorological seasons, northern-hemisphere calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Fall,
}

impl Season {
    const ORDER: [Season; 4] = [Season::Winter, Season::Spring, Season::Summer, Season::Fall];

    /// `month` is 1-based; December belongs to the following winter.
    pub fn from_month(month: u32) -> Self {
        Self::ORDER[((month % 12) / 3) as usize]
    }

    pub fn of(date: NaiveDate) -> Self {
        Self::from_month(date.month())
    }

    pub fn next(&self) -> Self {
        let idx = Self::ORDER.iter().position(|s| s == self).unwrap_or(0);
        Self::ORDER[(idx + 1) % 4]
    }

    pub fn label(&self) -> &'static str {
        match self {
            Season::Winter => "Winter",
            Season::Spring => "Spring",
            Season::Summer => "Summer",
            Season::Fall => "Fall",
        }
    }

    pub fn trend(&self) -> Trend {
        match self {
            Season::Spring => Trend::Improving,
            Season::Summer | Season::Winter => Trend::Worsening,
            Season::Fall => Trend::Stable,
        }
    }

    pub fn factors(&self) -> &'static [&'static str] {
        match self {
            Season::Spring => {
                &["Increased precipitation", "Higher wind speeds", "Less heating"]
            }
            Season::Summer => {
                &["Higher temperatures", "Increased ozone formation", "Wildfire potential"]
            }
            Season::Fall => &[
                "Moderate temperatures",
                "Varying precipitation",
                "Beginning of heating season",
            ],
            Season::Winter => {
                &["Temperature inversions", "Increased heating", "Lower mixing height"]
            }
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Improving,
    Worsening,
    Stable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationType {
    Urban,
    Suburban,
    Rural,
}

impl LocationType {
    pub const fn all() -> &'static [LocationType] {
        &[LocationType::Urban, LocationType::Suburban, LocationType::Rural]
    }

    pub fn default_base(&self) -> f64 {
        match self {
            LocationType::Urban => 85.0,
            LocationType::Suburban => 60.0,
            LocationType::Rural => 40.0,
        }
    }
}

impl fmt::Display for LocationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LocationType::Urban => "urban",
            LocationType::Suburban => "suburban",
            LocationType::Rural => "rural",
        })
    }
}

impl TryFrom<&str> for LocationType {
    type Error = AqiError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "urban" => Ok(LocationType::Urban),
            "suburban" => Ok(LocationType::Suburban),
            "rural" => Ok(LocationType::Rural),
            _ => Err(AqiError::invalid(format!(
                "Unknown location type '{value}'. Expected urban, suburban or rural."
            ))),
        }
    }
}

/// Base AQI per location type that the seasonal factors are applied to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeasonalBaseline {
    pub urban: f64,
    pub suburban: f64,
    pub rural: f64,
}

impl Default for SeasonalBaseline {
    fn default() -> Self {
        Self {
            urban: LocationType::Urban.default_base(),
            suburban: LocationType::Suburban.default_base(),
            rural: LocationType::Rural.default_base(),
        }
    }
}

impl SeasonalBaseline {
    /// Pin `location` to an observed AQI and scale the other types by the
    /// default ratios between them.
    pub fn anchored(current_aqi: f64, location: LocationType) -> AqiResult<Self> {
        classify(current_aqi)?;
        let scale = current_aqi / location.default_base();

        Ok(Self {
            urban: LocationType::Urban.default_base() * scale,
            suburban: LocationType::Suburban.default_base() * scale,
            rural: LocationType::Rural.default_base() * scale,
        })
    }

    pub fn get(&self, location: LocationType) -> f64 {
        match location {
            LocationType::Urban => self.urban,
            LocationType::Suburban => self.suburban,
            LocationType::Rural => self.rural,
        }
    }
}

pub fn seasonal_factor(season: Season, location: LocationType) -> f64 {
    use LocationType::*;

    match (season, location) {
        (Season::Winter, Urban) => 1.3,
        (Season::Winter, Suburban) => 1.2,
        (Season::Winter, Rural) => 1.1,
        (Season::Summer, Urban) => 1.1,
        (Season::Summer, Suburban) => 0.9,
        (Season::Summer, Rural) => 0.8,
        (Season::Spring, _) => 0.9,
        (Season::Fall, _) => 1.0,
    }
}

pub fn dominant_pollutant(season: Season, location: LocationType) -> Pollutant {
    match (season, location) {
        (Season::Winter, LocationType::Rural) => Pollutant::Pm10,
        (Season::Winter, _) => Pollutant::Pm25,
        (Season::Summer, _) => Pollutant::O3,
        (Season::Spring, LocationType::Rural) => Pollutant::Pm10,
        (Season::Spring, _) => Pollutant::O3,
        (Season::Fall, LocationType::Urban) => Pollutant::Pm25,
        (Season::Fall, _) => Pollutant::O3,
    }
}

/// (dominant share, background share) of the AQI attributed to a pollutant.
fn pollutant_shares(pollutant: Pollutant) -> (f64, f64) {
    match pollutant {
        Pollutant::Pm25 => (0.6, 0.3),
        Pollutant::Pm10 => (0.55, 0.35),
        Pollutant::O3 => (0.5, 0.25),
        Pollutant::No2 => (0.4, 0.2),
        Pollutant::So2 => (0.3, 0.15),
        Pollutant::Co => (0.02, 0.01),
    }
}

pub fn pollutant_levels(aqi: u32, dominant: Pollutant) -> BTreeMap<Pollutant, f64> {
    Pollutant::all()
        .iter()
        .map(|p| {
            let (dominant_share, background) = pollutant_shares(*p);
            let share = if *p == dominant { dominant_share } else { background };
            (*p, round1(f64::from(aqi) * share))
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalForecastPoint {
    pub season: Season,
    pub location_type: LocationType,
    pub aqi: u32,
    pub category: AqiCategory,
    pub color: String,
    pub dominant_pollutant: Pollutant,
    pub pollutant_levels: BTreeMap<Pollutant, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalOutlook {
    pub season: Season,
    pub trend: Trend,
    pub factors: Vec<String>,
    pub locations: Vec<SeasonalForecastPoint>,
}

impl SeasonalOutlook {
    pub fn location(&self, location: LocationType) -> Option<&SeasonalForecastPoint> {
        self.locations.iter().find(|p| p.location_type == location)
    }
}

pub fn project(
    baseline: &SeasonalBaseline,
    season: Season,
    location: LocationType,
) -> AqiResult<SeasonalForecastPoint> {
    let projected = (baseline.get(location) * seasonal_factor(season, location)).max(0.0);
    let aqi = projected.round();
    let category = classify(aqi)?;
    let aqi = aqi as u32;
    let dominant = dominant_pollutant(season, location);

    Ok(SeasonalForecastPoint {
        season,
        location_type: location,
        aqi,
        category,
        color: category.color().to_string(),
        dominant_pollutant: dominant,
        pollutant_levels: pollutant_levels(aqi, dominant),
    })
}

/// Four outlooks starting with the season that contains `reference`.
pub fn seasonal_forecast(
    baseline: &SeasonalBaseline,
    reference: NaiveDate,
) -> AqiResult<Vec<SeasonalOutlook>> {
    let mut season = Season::of(reference);
    let mut outlooks = Vec::with_capacity(4);

    for _ in 0..4 {
        let locations = LocationType::all()
            .iter()
            .map(|lt| project(baseline, season, *lt))
            .collect::<AqiResult<Vec<_>>>()?;

        outlooks.push(SeasonalOutlook {
            season,
            trend: season.trend(),
            factors: season.factors().iter().map(|f| f.to_string()).collect(),
            locations,
        });
        season = season.next();
    }

    Ok(outlooks)
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
