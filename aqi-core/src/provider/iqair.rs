use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::model::{Place, Pollutant, WeatherSnapshot};

use super::{AirQualityProvider, ProviderId, ProviderReading, ReadingStatus, http_client, truncate_body};

const CITY_URL: &str = "https://api.airvisual.com/v2/city";

/// IQAir AirVisual city endpoint. Needs city, state and country.
#[derive(Debug, Clone)]
pub struct IqAirProvider {
    api_key: String,
    http: Client,
}

impl IqAirProvider {
    pub fn new(api_key: String, timeout: Duration) -> Result<Self> {
        Ok(Self { api_key, http: http_client(timeout)? })
    }
}

#[async_trait]
impl AirQualityProvider for IqAirProvider {
    fn id(&self) -> ProviderId {
        ProviderId::IqAir
    }

    async fn current(&self, place: &Place) -> Result<ProviderReading> {
        let (city, state, country) = match place {
            Place::City { city, state: Some(state), country: Some(country) } => {
                (city, state, country)
            }
            _ => {
                return Ok(ProviderReading::failed(
                    "IQAir lookups need a city, a state and a country",
                ));
            }
        };

        let res = self
            .http
            .get(CITY_URL)
            .query(&[
                ("city", city.as_str()),
                ("state", state.as_str()),
                ("country", country.as_str()),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await
            .context("Failed to send request to IQAir (city)")?;

        let status = res.status();
        let body = res.text().await.context("Failed to read IQAir city response body")?;

        // IQAir reports unknown cities as a 400 with a JSON body.
        if !status.is_success() && !status.is_client_error() {
            return Err(anyhow!(
                "IQAir city request failed with status {}: {}",
                status,
                truncate_body(&body),
            ));
        }

        parse_city(&body)
    }
}

#[derive(Debug, Deserialize)]
struct IqEnvelope {
    status: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct IqPollution {
    ts: Option<String>,
    aqius: Option<f64>,
    /// Main pollutant code, e.g. `p2`.
    mainus: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct IqWeather {
    tp: Option<f64>,
    hu: Option<f64>,
    pr: Option<f64>,
    ws: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct IqCurrent {
    pollution: Option<IqPollution>,
    #[serde(default)]
    weather: IqWeather,
}

#[derive(Debug, Deserialize)]
struct IqCity {
    city: Option<String>,
    current: IqCurrent,
}

fn main_pollutant_code(code: &str) -> Option<Pollutant> {
    match code {
        "p2" => Some(Pollutant::Pm25),
        "p1" => Some(Pollutant::Pm10),
        "o3" => Some(Pollutant::O3),
        "n2" => Some(Pollutant::No2),
        "s2" => Some(Pollutant::So2),
        "co" => Some(Pollutant::Co),
        _ => None,
    }
}

pub(crate) fn parse_city(body: &str) -> Result<ProviderReading> {
    let envelope: IqEnvelope =
        serde_json::from_str(body).context("Failed to parse IQAir city JSON")?;

    if envelope.status != "success" {
        let message = envelope
            .data
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or(envelope.status.as_str())
            .to_string();
        return Ok(ProviderReading::failed(format!("IQAir: {message}")));
    }

    let data: IqCity =
        serde_json::from_value(envelope.data).context("Failed to parse IQAir city data")?;

    let pollution = data.current.pollution;
    let aqi = pollution.as_ref().and_then(|p| p.aqius);

    // Only the US AQI of the main pollutant is reported.
    let pollutants = pollution
        .as_ref()
        .and_then(|p| p.mainus.as_deref())
        .and_then(main_pollutant_code)
        .zip(aqi)
        .map(|(p, v)| vec![(p.key().to_string(), v)])
        .unwrap_or_default();

    let time = pollution
        .as_ref()
        .and_then(|p| p.ts.as_deref())
        .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
        .map(|dt| dt.with_timezone(&Utc));

    let w = data.current.weather;
    let weather = WeatherSnapshot {
        humidity: w.hu,
        wind_speed: w.ws,
        pressure: w.pr,
        temperature: w.tp,
        precipitation: None,
    };

    Ok(ProviderReading {
        status: ReadingStatus::Ok,
        aqi,
        pollutants,
        station_name: data.city,
        time,
        weather: Some(weather).filter(|w| !w.is_empty()),
    })
}
