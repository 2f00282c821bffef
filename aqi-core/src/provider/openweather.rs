use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::{collections::BTreeMap, time::Duration};

use crate::model::{DailyWeather, Place, WeatherSnapshot};

use super::{WeatherForecastSource, http_client, truncate_body};

const FORECAST_URL: &str = "https://api.openweathermap.org/data/2.5/forecast";

/// OpenWeather 5-day / 3-hour forecast, reduced to one entry per day.
#[derive(Debug, Clone)]
pub struct OpenWeatherSource {
    api_key: String,
    http: Client,
}

impl OpenWeatherSource {
    pub fn new(api_key: String, timeout: Duration) -> Result<Self> {
        Ok(Self { api_key, http: http_client(timeout)? })
    }
}

#[async_trait]
impl WeatherForecastSource for OpenWeatherSource {
    async fn daily(&self, place: &Place) -> Result<Vec<DailyWeather>> {
        let query = place.query();

        let res = self
            .http
            .get(FORECAST_URL)
            .query(&[("q", query.as_str()), ("appid", self.api_key.as_str()), ("units", "metric")])
            .send()
            .await
            .context("Failed to send request to OpenWeather (5-day forecast)")?;

        let status = res.status();
        let body = res.text().await.context("Failed to read OpenWeather forecast response body")?;

        if !status.is_success() {
            return Err(anyhow!(
                "OpenWeather forecast request failed with status {}: {}",
                status,
                truncate_body(&body),
            ));
        }

        parse_forecast(&body)
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: Option<f64>,
    humidity: Option<f64>,
    pressure: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    description: String,
}

#[derive(Debug, Default, Deserialize)]
struct OwWind {
    speed: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct OwRain {
    #[serde(rename = "3h")]
    three_hours: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwForecastEntry {
    dt: i64,
    main: OwMain,
    #[serde(default)]
    weather: Vec<OwWeather>,
    #[serde(default)]
    wind: OwWind,
    #[serde(default)]
    rain: OwRain,
}

#[derive(Debug, Deserialize)]
struct OwForecastResponse {
    list: Vec<OwForecastEntry>,
}

/// First forecast entry of every UTC calendar day, in date order.
pub(crate) fn parse_forecast(body: &str) -> Result<Vec<DailyWeather>> {
    let parsed: OwForecastResponse =
        serde_json::from_str(body).context("Failed to parse OpenWeather forecast JSON")?;

    let mut days: BTreeMap<NaiveDate, DailyWeather> = BTreeMap::new();

    for entry in parsed.list {
        let Some(date) = unix_to_utc(entry.dt).map(|dt| dt.date_naive()) else {
            continue;
        };
        if days.contains_key(&date) {
            continue;
        }

        let conditions = entry
            .weather
            .first()
            .map(|w| w.description.clone())
            .unwrap_or_else(|| "unknown".to_string());

        days.insert(
            date,
            DailyWeather {
                date,
                conditions,
                snapshot: WeatherSnapshot {
                    humidity: entry.main.humidity,
                    wind_speed: entry.wind.speed,
                    pressure: entry.main.pressure,
                    temperature: entry.main.temp,
                    precipitation: Some(entry.rain.three_hours.unwrap_or(0.0)),
                },
            },
        );
    }

    Ok(days.into_values().collect())
}

fn unix_to_utc(ts: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0)
}
