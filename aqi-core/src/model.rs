use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

use crate::{
    category::{AqiCategory, classify},
    error::{AqiError, AqiResult},
};

/// A place whose air quality is being asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Place {
    City {
        city: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        state: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        country: Option<String>,
    },
    Country {
        country: String,
    },
}

impl Place {
    /// City lookup. Blank optional parts are dropped.
    pub fn city(
        city: impl Into<String>,
        state: Option<String>,
        country: Option<String>,
    ) -> AqiResult<Self> {
        let city = city.into().trim().to_string();
        if city.is_empty() {
            return Err(AqiError::invalid("City name must not be empty"));
        }

        Ok(Place::City { city, state: non_blank(state), country: non_blank(country) })
    }

    pub fn country(country: impl Into<String>) -> AqiResult<Self> {
        let country = country.into().trim().to_string();
        if country.is_empty() {
            return Err(AqiError::invalid("Country name must not be empty"));
        }

        Ok(Place::Country { country })
    }

    /// Stable key for caches; case and punctuation insensitive.
    pub fn cache_key(&self) -> String {
        let parts: Vec<&str> = match self {
            Place::City { city, state, country } => {
                vec![city.as_str(), state.as_deref().unwrap_or(""), country.as_deref().unwrap_or("")]
            }
            Place::Country { country } => vec!["country", country.as_str()],
        };

        parts
            .iter()
            .map(|p| {
                p.trim()
                    .to_lowercase()
                    .chars()
                    .map(|c| if c.is_alphanumeric() { c } else { '_' })
                    .collect::<String>()
            })
            .collect::<Vec<_>>()
            .join("--")
    }

    /// Query string handed to live providers: "city" or "city, country".
    pub fn query(&self) -> String {
        match self {
            Place::City { city, country: Some(country), .. } => format!("{city}, {country}"),
            Place::City { city, .. } => city.clone(),
            Place::Country { country } => country.clone(),
        }
    }
}

impl fmt::Display for Place {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Place::City { city, state, country } => {
                f.write_str(city)?;
                if let Some(state) = state {
                    write!(f, ", {state}")?;
                }
                if let Some(country) = country {
                    write!(f, ", {country}")?;
                }
                Ok(())
            }
            Place::Country { country } => f.write_str(country),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Fixed pollutant vocabulary. Declaration order is the tie-break order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pollutant {
    Pm25,
    Pm10,
    O3,
    No2,
    So2,
    Co,
}

impl Pollutant {
    pub const fn all() -> &'static [Pollutant] {
        &[
            Pollutant::Pm25,
            Pollutant::Pm10,
            Pollutant::O3,
            Pollutant::No2,
            Pollutant::So2,
            Pollutant::Co,
        ]
    }

    pub fn key(&self) -> &'static str {
        match self {
            Pollutant::Pm25 => "pm25",
            Pollutant::Pm10 => "pm10",
            Pollutant::O3 => "o3",
            Pollutant::No2 => "no2",
            Pollutant::So2 => "so2",
            Pollutant::Co => "co",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Pollutant::Pm25 => "PM2.5",
            Pollutant::Pm10 => "PM10",
            Pollutant::O3 => "Ozone",
            Pollutant::No2 => "Nitrogen Dioxide",
            Pollutant::So2 => "Sulfur Dioxide",
            Pollutant::Co => "Carbon Monoxide",
        }
    }

    /// Accepts the vocabulary keys plus the spellings upstream APIs use.
    pub fn from_key(key: &str) -> Option<Self> {
        let normalized: String = key
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();

        match normalized.as_str() {
            "pm25" => Some(Pollutant::Pm25),
            "pm10" => Some(Pollutant::Pm10),
            "o3" | "ozone" => Some(Pollutant::O3),
            "no2" => Some(Pollutant::No2),
            "so2" => Some(Pollutant::So2),
            "co" => Some(Pollutant::Co),
            _ => None,
        }
    }
}

impl fmt::Display for Pollutant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Keep only vocabulary pollutants with finite, non-negative values.
pub fn normalize_pollutants<'a, I>(raw: I) -> BTreeMap<Pollutant, f64>
where
    I: IntoIterator<Item = (&'a str, f64)>,
{
    raw.into_iter()
        .filter(|(_, v)| v.is_finite() && *v >= 0.0)
        .filter_map(|(k, v)| Pollutant::from_key(k).map(|p| (p, v)))
        .collect()
}

/// Pollutant with the highest value; ties go to the earlier vocabulary entry.
pub fn main_pollutant(pollutants: &BTreeMap<Pollutant, f64>) -> Option<Pollutant> {
    let mut best: Option<(Pollutant, f64)> = None;

    for pollutant in Pollutant::all() {
        if let Some(&value) = pollutants.get(pollutant) {
            match best {
                Some((_, top)) if value <= top => {}
                _ => best = Some((*pollutant, value)),
            }
        }
    }

    best.map(|(p, _)| p)
}

/// Point-in-time weather. Every field is independent and optional.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    /// Relative humidity, percent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
    /// Metres per second.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind_speed: Option<f64>,
    /// hPa.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pressure: Option<f64>,
    /// Degrees Celsius.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Millimetres.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precipitation: Option<f64>,
}

impl WeatherSnapshot {
    pub fn is_empty(&self) -> bool {
        self.humidity.is_none()
            && self.wind_speed.is_none()
            && self.pressure.is_none()
            && self.temperature.is_none()
            && self.precipitation.is_none()
    }
}

/// Weather a forecast source expects for one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyWeather {
    pub date: NaiveDate,
    pub conditions: String,
    pub snapshot: WeatherSnapshot,
}

/// Which tier produced a `CurrentConditions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "kebab-case")]
pub enum Provenance {
    Live { provider: String },
    Cache,
    Dataset,
    DerivedFromMonthlyAverage,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::Live { provider } => write!(f, "live ({provider})"),
            Provenance::Cache => f.write_str("cache"),
            Provenance::Dataset => f.write_str("dataset"),
            Provenance::DerivedFromMonthlyAverage => f.write_str("derived-from-monthly-average"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub place: Place,
    pub aqi: f64,
    pub category: AqiCategory,
    pub color: String,
    /// `None` when no pollutant breakdown is known.
    pub main_pollutant: Option<Pollutant>,
    #[serde(default)]
    pub pollutants: BTreeMap<Pollutant, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather: Option<WeatherSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub station: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub provenance: Provenance,
}

impl CurrentConditions {
    /// Build a record for a usable AQI; classification fails for bad numbers.
    pub fn new(
        place: Place,
        aqi: f64,
        pollutants: BTreeMap<Pollutant, f64>,
        provenance: Provenance,
    ) -> AqiResult<Self> {
        let category = classify(aqi)?;

        Ok(Self {
            place,
            aqi,
            category,
            color: category.color().to_string(),
            main_pollutant: main_pollutant(&pollutants),
            pollutants,
            weather: None,
            station: None,
            timestamp: Utc::now(),
            provenance,
        })
    }

    pub fn with_weather(mut self, weather: Option<WeatherSnapshot>) -> Self {
        self.weather = weather.filter(|w| !w.is_empty());
        self
    }

    pub fn with_station(mut self, station: Option<String>) -> Self {
        self.station = station;
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn main_pollutant_name(&self) -> &'static str {
        self.main_pollutant.map(|p| p.display_name()).unwrap_or("Unknown")
    }
}
