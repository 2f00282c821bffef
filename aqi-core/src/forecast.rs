//! Short-horizon daily AQI forecast.
//!
//! The forecast is a heuristic: the current AQI nudged by a bounded daily
//! variation, a weekend dip, a slow upward drift and the accumulated weather
//! impact. Variation comes from an explicitly seeded PRNG so a forecast can
//! always be recomputed.

use chrono::{Datelike, Days, NaiveDate, Weekday};
use rand::{Rng, SeedableRng, distributions::WeightedIndex, prelude::Distribution, rngs::StdRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{
    category::{AqiCategory, classify},
    error::{AqiError, AqiResult},
    model::{DailyWeather, WeatherSnapshot},
    seasonal::Season,
};

pub const DEFAULT_FORECAST_DAYS: u32 = 7;
pub const MAX_FORECAST_DAYS: u32 = 30;

/// Daily variation is drawn from `[-DAILY_VARIATION, DAILY_VARIATION)`.
const DAILY_VARIATION: i32 = 10;
const WEEKEND_RELIEF: f64 = 5.0;
const TREND_PER_DAY: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeatherSource {
    Observed,
    Generated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayWeather {
    pub conditions: String,
    #[serde(flatten)]
    pub snapshot: WeatherSnapshot,
    pub source: WeatherSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyForecastPoint {
    pub date: NaiveDate,
    pub day_of_week: String,
    pub aqi: u32,
    pub category: AqiCategory,
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather: Option<DayWeather>,
}

/// Seed used when the caller does not pick one: the same start date always
/// produces the same forecast.
pub fn seed_for(start: NaiveDate) -> u64 {
    u64::try_from(start.num_days_from_ce()).unwrap_or_default()
}

/// Forecast with the default date-derived seed.
pub fn forecast(
    current_aqi: f64,
    weather_impact: f64,
    start: NaiveDate,
    days: u32,
) -> AqiResult<Vec<DailyForecastPoint>> {
    let mut rng = StdRng::seed_from_u64(seed_for(start));
    daily_forecast(current_aqi, weather_impact, start, days, &mut rng)
}

pub fn daily_forecast<R: Rng + ?Sized>(
    current_aqi: f64,
    weather_impact: f64,
    start: NaiveDate,
    days: u32,
    rng: &mut R,
) -> AqiResult<Vec<DailyForecastPoint>> {
    classify(current_aqi)?;
    if !weather_impact.is_finite() {
        return Err(AqiError::invalid(format!(
            "Weather impact must be a finite number, got {weather_impact}"
        )));
    }
    if days > MAX_FORECAST_DAYS {
        return Err(AqiError::invalid(format!(
            "Forecast horizon is at most {MAX_FORECAST_DAYS} days, got {days}"
        )));
    }

    (0..days)
        .map(|i| -> AqiResult<DailyForecastPoint> {
            let date = start.checked_add_days(Days::new(u64::from(i))).ok_or_else(|| {
                AqiError::invalid(format!("Forecast date out of range: {start} + {i} days"))
            })?;

            let variation = f64::from(rng.gen_range(-DAILY_VARIATION..DAILY_VARIATION));
            let weekend = if is_weekend(date) { WEEKEND_RELIEF } else { 0.0 };
            let step = f64::from(i);

            let value = (current_aqi + variation - weekend
                + TREND_PER_DAY * step
                + weather_impact * (step + 1.0))
                .max(0.0)
                .round();

            let category = classify(value)?;

            Ok(DailyForecastPoint {
                date,
                day_of_week: date.format("%A").to_string(),
                aqi: value as u32,
                category,
                color: category.color().to_string(),
                weather: None,
            })
        })
        .collect()
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Attach weather to every point: observed when the source has that day,
/// generated otherwise. AQI values are left untouched.
pub fn attach_weather<R: Rng + ?Sized>(
    points: &mut [DailyForecastPoint],
    observed: &[DailyWeather],
    rng: &mut R,
) {
    let by_date: BTreeMap<NaiveDate, &DailyWeather> =
        observed.iter().rev().map(|w| (w.date, w)).collect();

    for point in points.iter_mut() {
        point.weather = Some(match by_date.get(&point.date) {
            Some(day) => DayWeather {
                conditions: day.conditions.clone(),
                snapshot: day.snapshot,
                source: WeatherSource::Observed,
            },
            None => generate_weather(point.date, rng),
        });
    }
}

const CONDITIONS: [&str; 6] = ["sunny", "partly cloudy", "cloudy", "rain", "thunderstorm", "fog"];

fn condition_weights(season: Season) -> [f64; 6] {
    match season {
        Season::Winter => [0.3, 0.2, 0.2, 0.1, 0.0, 0.2],
        Season::Spring => [0.3, 0.3, 0.2, 0.15, 0.05, 0.0],
        Season::Summer => [0.5, 0.2, 0.1, 0.1, 0.1, 0.0],
        Season::Fall => [0.3, 0.3, 0.2, 0.1, 0.0, 0.1],
    }
}

fn temperature_range(season: Season) -> (f64, f64) {
    match season {
        Season::Winter => (-5.0, 10.0),
        Season::Spring => (10.0, 25.0),
        Season::Summer => (20.0, 35.0),
        Season::Fall => (5.0, 20.0),
    }
}

/// Plausible weather for a date when no observation is available.
pub fn generate_weather<R: Rng + ?Sized>(date: NaiveDate, rng: &mut R) -> DayWeather {
    let season = Season::of(date);

    let conditions = match WeightedIndex::new(condition_weights(season)) {
        Ok(dist) => CONDITIONS[dist.sample(rng)],
        Err(_) => CONDITIONS[0],
    };

    let (low, high) = temperature_range(season);
    let temperature = round1(rng.gen_range(low..high));

    let humidity: u8 = match conditions {
        "rain" | "thunderstorm" => rng.gen_range(70..=95),
        "fog" => rng.gen_range(80..=100),
        "cloudy" => rng.gen_range(50..=80),
        _ => rng.gen_range(30..=60),
    };

    let wind_speed = match conditions {
        "rain" | "thunderstorm" => rng.gen_range(10.0..30.0),
        "sunny" => rng.gen_range(5.0..15.0),
        _ => rng.gen_range(2.0..10.0),
    };

    DayWeather {
        conditions: conditions.to_string(),
        snapshot: WeatherSnapshot {
            humidity: Some(f64::from(humidity)),
            wind_speed: Some(round1(wind_speed)),
            temperature: Some(temperature),
            ..Default::default()
        },
        source: WeatherSource::Generated,
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
