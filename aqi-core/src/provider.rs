use crate::{
    Config,
    model::{DailyWeather, Place, WeatherSnapshot},
    provider::{iqair::IqAirProvider, openweather::OpenWeatherSource, waqi::WaqiProvider},
};
use anyhow::{Context, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use std::{convert::TryFrom, fmt::Debug, time::Duration};

pub mod iqair;
pub mod openweather;
pub mod waqi;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    Waqi,
    IqAir,
    OpenWeather,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Waqi => "waqi",
            ProviderId::IqAir => "iqair",
            ProviderId::OpenWeather => "openweather",
        }
    }

    pub const fn all() -> &'static [ProviderId] {
        &[ProviderId::Waqi, ProviderId::IqAir, ProviderId::OpenWeather]
    }

    /// False for weather-only providers.
    pub fn is_air_quality(&self) -> bool {
        !matches!(self, ProviderId::OpenWeather)
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "waqi" | "aqicn" => Ok(ProviderId::Waqi),
            "iqair" | "airvisual" => Ok(ProviderId::IqAir),
            "openweather" => Ok(ProviderId::OpenWeather),
            _ => Err(anyhow!(
                "Unknown provider '{value}'. Supported providers: waqi, iqair, openweather."
            )),
        }
    }
}

/// Whether the upstream answered with a usable payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadingStatus {
    Ok,
    /// The request went through but the API reported a problem.
    Failed(String),
}

/// A live reading, already mapped out of the provider's wire format.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderReading {
    pub status: ReadingStatus,
    pub aqi: Option<f64>,
    /// Raw pollutant keys as the provider names them.
    pub pollutants: Vec<(String, f64)>,
    pub station_name: Option<String>,
    pub time: Option<DateTime<Utc>>,
    pub weather: Option<WeatherSnapshot>,
}

impl ProviderReading {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: ReadingStatus::Failed(message.into()),
            aqi: None,
            pollutants: Vec::new(),
            station_name: None,
            time: None,
            weather: None,
        }
    }
}

/// Live air-quality source. An `Err` means the source could not be reached.
#[async_trait]
pub trait AirQualityProvider: Send + Sync + Debug {
    fn id(&self) -> ProviderId;

    async fn current(&self, place: &Place) -> anyhow::Result<ProviderReading>;
}

/// Daily weather outlook for a place.
#[async_trait]
pub trait WeatherForecastSource: Send + Sync + Debug {
    async fn daily(&self, place: &Place) -> anyhow::Result<Vec<DailyWeather>>;
}

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(8);

pub(crate) fn http_client(timeout: Duration) -> anyhow::Result<Client> {
    Client::builder().timeout(timeout).build().context("Failed to build HTTP client")
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() <= MAX {
        return body.to_string();
    }

    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

fn missing_key(id: ProviderId) -> anyhow::Error {
    anyhow!(
        "No API key configured for provider '{id}'.\n\
             Hint: run `aqi configure {id}` and enter your API key."
    )
}

/// Construct an air-quality provider from config and explicit ProviderId.
pub fn provider_from_config(
    id: ProviderId,
    config: &Config,
) -> anyhow::Result<Box<dyn AirQualityProvider>> {
    let api_key = config.provider_api_key(id).ok_or_else(|| missing_key(id))?;
    let timeout = config.timeout();

    let boxed: Box<dyn AirQualityProvider> = match id {
        ProviderId::Waqi => Box::new(WaqiProvider::new(api_key.to_owned(), timeout)?),
        ProviderId::IqAir => Box::new(IqAirProvider::new(api_key.to_owned(), timeout)?),
        ProviderId::OpenWeather => {
            return Err(anyhow!(
                "'{id}' only provides weather. Air-quality providers: waqi, iqair."
            ));
        }
    };

    Ok(boxed)
}

/// Construct the default air-quality provider, using the `default_provider` field.
pub fn default_provider_from_config(
    config: &Config,
) -> anyhow::Result<Box<dyn AirQualityProvider>> {
    let id = config.default_provider_id()?;
    provider_from_config(id, config)
}

/// Weather forecast source, when an OpenWeather key is configured.
pub fn weather_source_from_config(
    config: &Config,
) -> anyhow::Result<Option<Box<dyn WeatherForecastSource>>> {
    match config.provider_api_key(ProviderId::OpenWeather) {
        Some(key) => Ok(Some(Box::new(OpenWeatherSource::new(key.to_owned(), config.timeout())?))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn provider_id_as_str_roundtrip() {
        for id in ProviderId::all() {
            let s = id.as_str();
            let parsed = ProviderId::try_from(s).expect("roundtrip should succeed");
            assert_eq!(*id, parsed);
        }
        assert_eq!(ProviderId::try_from("AQICN").unwrap(), ProviderId::Waqi);
    }

    #[test]
    fn unknown_provider_error() {
        let err = ProviderId::try_from("doesnotexist").unwrap_err();
        assert!(err.to_string().contains("Unknown provider"));
    }

    #[test]
    fn provider_from_config_errors_when_missing_api_key() {
        let cfg = Config::default();
        let err = provider_from_config(ProviderId::Waqi, &cfg).unwrap_err();
        assert!(err.to_string().contains("No API key configured for provider"));
    }

    #[test]
    fn weather_only_provider_is_not_an_aqi_source() {
        let mut cfg = Config::default();
        cfg.upsert_provider_api_key(ProviderId::OpenWeather, "KEY".to_string());

        let err = provider_from_config(ProviderId::OpenWeather, &cfg).unwrap_err();
        assert!(err.to_string().contains("only provides weather"));
        assert!(weather_source_from_config(&cfg).unwrap().is_some());
    }

    #[test]
    fn default_provider_from_config_errors_when_not_set() {
        let cfg = Config::default();
        let err = default_provider_from_config(&cfg).unwrap_err();

        let msg = err.to_string();
        assert!(msg.contains("No default provider configured"));
        assert!(msg.contains("Hint: run `aqi configure"));
    }

    #[test]
    fn default_provider_from_config_works_when_set_and_configured() {
        let mut cfg = Config::default();
        cfg.upsert_provider_api_key(ProviderId::Waqi, "KEY".to_string());

        let provider = default_provider_from_config(&cfg).unwrap();
        assert_eq!(provider.id(), ProviderId::Waqi);
    }

    #[test]
    fn truncate_body_respects_char_boundaries() {
        let body = "é".repeat(150);
        let out = truncate_body(&body);
        assert!(out.ends_with("..."));
        assert!(out.len() <= 203);
        assert_eq!(truncate_body("short"), "short");
    }
}
