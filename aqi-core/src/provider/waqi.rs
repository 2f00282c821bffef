use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::Value;
use std::{collections::HashMap, time::Duration};

use crate::model::{Place, WeatherSnapshot};

use super::{AirQualityProvider, ProviderId, ProviderReading, ReadingStatus, http_client, truncate_body};

const BASE_URL: &str = "https://api.waqi.info";

/// World Air Quality Index project (aqicn.org) city feed.
#[derive(Debug, Clone)]
pub struct WaqiProvider {
    token: String,
    http: Client,
}

impl WaqiProvider {
    pub fn new(token: String, timeout: Duration) -> Result<Self> {
        Ok(Self { token, http: http_client(timeout)? })
    }

    /// The city feed is keyed by station or city name only; WAQI has no
    /// country qualifier on this endpoint, so the country is not sent.
    fn feed_url(place: &Place) -> Result<Url> {
        let name = match place {
            Place::City { city, .. } => city,
            Place::Country { country } => country,
        };

        let mut url = Url::parse(BASE_URL).context("Invalid WAQI base URL")?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("WAQI base URL cannot take a path"))?
            .pop_if_empty()
            .push("feed")
            .push(&name.trim().to_lowercase())
            .push("");
        Ok(url)
    }
}

#[async_trait]
impl AirQualityProvider for WaqiProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Waqi
    }

    async fn current(&self, place: &Place) -> Result<ProviderReading> {
        let res = self
            .http
            .get(Self::feed_url(place)?)
            .query(&[("token", self.token.as_str())])
            .send()
            .await
            .context("Failed to send request to WAQI (city feed)")?;

        let status = res.status();
        let body = res.text().await.context("Failed to read WAQI feed response body")?;

        if !status.is_success() {
            return Err(anyhow!(
                "WAQI feed request failed with status {}: {}",
                status,
                truncate_body(&body),
            ));
        }

        parse_feed(&body)
    }
}

#[derive(Debug, Deserialize)]
struct WaqiEnvelope {
    status: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct WaqiValue {
    v: f64,
}

#[derive(Debug, Default, Deserialize)]
struct WaqiCity {
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct WaqiTime {
    iso: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WaqiData {
    /// Usually a number, `"-"` when the station has no current value.
    #[serde(default)]
    aqi: Value,
    #[serde(default)]
    iaqi: HashMap<String, WaqiValue>,
    #[serde(default)]
    city: WaqiCity,
    #[serde(default)]
    time: WaqiTime,
}

pub(crate) fn parse_feed(body: &str) -> Result<ProviderReading> {
    let envelope: WaqiEnvelope =
        serde_json::from_str(body).context("Failed to parse WAQI feed JSON")?;

    if envelope.status != "ok" {
        let message = envelope.data.as_str().unwrap_or(envelope.status.as_str());
        return Ok(ProviderReading::failed(format!("WAQI: {message}")));
    }

    let data: WaqiData =
        serde_json::from_value(envelope.data).context("Failed to parse WAQI feed data")?;

    let aqi = match &data.aqi {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };

    let field = |key: &str| data.iaqi.get(key).map(|v| v.v);
    let weather = WeatherSnapshot {
        humidity: field("h"),
        wind_speed: field("w"),
        pressure: field("p"),
        temperature: field("t"),
        precipitation: None,
    };

    let pollutants = data
        .iaqi
        .iter()
        .filter(|(k, _)| !matches!(k.as_str(), "h" | "w" | "p" | "t" | "dew" | "wg" | "r"))
        .map(|(k, v)| (k.clone(), v.v))
        .collect();

    let time = data
        .time
        .iso
        .as_deref()
        .and_then(|iso| DateTime::parse_from_rfc3339(iso).ok())
        .map(|dt| dt.with_timezone(&Utc));

    Ok(ProviderReading {
        status: ReadingStatus::Ok,
        aqi,
        pollutants,
        station_name: data.city.name,
        time,
        weather: Some(weather).filter(|w| !w.is_empty()),
    })
}
