use anyhow::{Context, Result, anyhow};
use aqi_core::{
    AirQualityService, Config, FileCache, ForecastOptions, HealthProfile, LocationType, Place,
    ProviderId, SourceResolver, StaticDataset,
    forecast::{DEFAULT_FORECAST_DAYS, MAX_FORECAST_DAYS},
    health::{ActivityLevel, AgeGroup, HealthConcern},
    provider::{default_provider_from_config, weather_source_from_config},
};
use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use inquire::{Confirm, Password};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::output;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "aqi", version, about = "Air quality lookups, forecasts and summaries")]
pub struct Cli {
    /// Print JSON instead of text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Skip the live provider; use the cache and the static dataset only.
    #[arg(long, global = true)]
    pub offline: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// A city (optionally narrowed by state and country) or, with only
/// `--country`, a whole country.
#[derive(Debug, Clone, Args)]
pub struct PlaceArgs {
    /// City name.
    pub city: Option<String>,

    #[arg(long)]
    pub state: Option<String>,

    #[arg(long)]
    pub country: Option<String>,
}

impl PlaceArgs {
    fn place(&self) -> Result<Option<Place>> {
        let place = match (&self.city, &self.country) {
            (Some(city), _) => Some(Place::city(city, self.state.clone(), self.country.clone())?),
            (None, Some(country)) => {
                if self.state.is_some() {
                    return Err(anyhow!("--state needs a city"));
                }
                Some(Place::country(country)?)
            }
            (None, None) => None,
        };
        Ok(place)
    }

    fn require(&self) -> Result<Place> {
        self.place()?.ok_or_else(|| anyhow!("Give a city name or --country <name>"))
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure credentials for a specific provider.
    Configure {
        /// Provider short name: "waqi", "iqair" or "openweather".
        provider: String,
    },

    /// Current air quality for a place.
    Current {
        #[command(flatten)]
        place: PlaceArgs,
    },

    /// Daily AQI forecast for a place.
    Forecast {
        #[command(flatten)]
        place: PlaceArgs,

        #[arg(
            long,
            default_value_t = DEFAULT_FORECAST_DAYS,
            value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_FORECAST_DAYS))
        )]
        days: u32,

        /// Seed for the daily variation; defaults to one derived from the start date.
        #[arg(long)]
        seed: Option<u64>,

        /// First forecast day (YYYY-MM-DD); defaults to today.
        #[arg(long)]
        start: Option<String>,

        /// Attach per-day weather.
        #[arg(long)]
        weather: bool,
    },

    /// Four-season outlook, anchored to a place when one is given.
    Seasonal {
        #[command(flatten)]
        place: PlaceArgs,

        /// urban, suburban or rural.
        #[arg(long, default_value = "urban")]
        location: String,

        /// Reference date (YYYY-MM-DD); defaults to today.
        #[arg(long)]
        date: Option<String>,
    },

    /// Monthly series summary from the static dataset.
    Summary {
        #[command(flatten)]
        place: PlaceArgs,
    },

    /// Compare several places side by side.
    Compare {
        /// Entries like "Delhi", "Aurangabad, Bihar" or "Pune, Maharashtra, India".
        #[arg(required = true, num_args = 1..)]
        places: Vec<String>,

        /// Treat every entry as a country.
        #[arg(long)]
        countries: bool,
    },

    /// Countries ranked from most to least polluted.
    Ranking {
        /// How many countries to list.
        #[arg(long, default_value_t = 10)]
        limit: usize,

        /// List every country.
        #[arg(long, conflicts_with = "limit")]
        all: bool,
    },

    /// Cities the dataset knows for a country.
    Cities {
        country: String,
    },

    /// Health recommendations for the current air quality.
    Advice {
        #[command(flatten)]
        place: PlaceArgs,

        /// asthma, heart-disease or copd. Repeatable.
        #[arg(long = "concern")]
        concerns: Vec<String>,

        /// low, moderate or high.
        #[arg(long, default_value = "moderate")]
        activity: String,

        /// child, adult or senior.
        #[arg(long, default_value = "adult")]
        age: String,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let json = self.json;

        if let Command::Configure { provider } = &self.command {
            return configure(provider);
        }

        let config = Config::load()?;
        let service = build_service(&config, self.offline)?;

        match self.command {
            Command::Configure { .. } => {}
            Command::Current { place } => {
                let current = service.current(&place.require()?).await?;
                output::emit(json, &current, output::current)?;
            }
            Command::Forecast { place, days, seed, start, weather } => {
                let options = ForecastOptions {
                    days,
                    seed,
                    include_weather: weather,
                    start: start.as_deref().map(parse_date).transpose()?,
                };
                let report = service.daily_forecast(&place.require()?, options).await?;
                output::emit(json, &report, output::daily)?;
            }
            Command::Seasonal { place, location, date } => {
                let location = LocationType::try_from(location.as_str())?;
                let reference = match date {
                    Some(d) => parse_date(&d)?,
                    None => Utc::now().date_naive(),
                };
                let place = place.place()?;
                let report = service.seasonal_forecast(place.as_ref(), location, reference).await?;
                output::emit(json, &report, output::seasonal)?;
            }
            Command::Summary { place } => {
                let report = service.monthly_summary(&place.require()?)?;
                output::emit(json, &report, output::monthly)?;
            }
            Command::Compare { places, countries } => {
                let places = places
                    .iter()
                    .map(|entry| parse_place_entry(entry, countries))
                    .collect::<Result<Vec<_>>>()?;
                let reports = service.compare(&places)?;
                output::emit(json, reports.as_slice(), output::comparison)?;
            }
            Command::Ranking { limit, all } => {
                let ranking = service.ranking((!all).then_some(limit));
                output::emit(json, ranking.as_slice(), output::ranking)?;
            }
            Command::Cities { country } => {
                let cities = service.cities_in(&country)?;
                output::emit(json, cities.as_slice(), output::cities)?;
            }
            Command::Advice { place, concerns, activity, age } => {
                let profile = HealthProfile {
                    concerns: concerns
                        .iter()
                        .map(|c| HealthConcern::try_from(c.as_str()))
                        .collect::<Result<_, _>>()?,
                    activity: ActivityLevel::try_from(activity.as_str())?,
                    age: AgeGroup::try_from(age.as_str())?,
                };
                let advice = service.advice(&place.require()?, &profile).await?;
                output::emit(json, &advice, output::advice)?;
            }
        }

        Ok(())
    }
}

fn configure(provider: &str) -> Result<()> {
    let id = ProviderId::try_from(provider)?;
    let mut config = Config::load()?;

    let api_key = Password::new(&format!("API key for {id}:"))
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;
    let api_key = api_key.trim().to_string();
    if api_key.is_empty() {
        return Err(anyhow!("API key must not be empty"));
    }

    config.upsert_provider_api_key(id, api_key);

    let current_default = config.default_provider_id().ok();
    if id.is_air_quality() && current_default != Some(id) {
        let make_default = Confirm::new(&format!("Use {id} as the default air-quality provider?"))
            .with_default(false)
            .prompt()
            .context("Failed to read answer")?;
        if make_default {
            config.set_default_provider(id)?;
        }
    }

    config.save()?;
    println!("Saved {id} credentials to {}", Config::config_file_path()?.display());

    Ok(())
}

fn build_service(config: &Config, offline: bool) -> Result<AirQualityService> {
    let dataset = StaticDataset::load(&config.dataset)?;
    let mut resolver =
        SourceResolver::new(Arc::new(dataset)).with_max_age(config.cache_max_age());

    if !offline {
        match default_provider_from_config(config) {
            Ok(provider) => resolver = resolver.with_provider(provider),
            Err(e) => debug!("Live lookups disabled: {e}"),
        }
    }

    if !config.cache.disabled {
        let cache = match &config.cache.dir {
            Some(dir) => Ok(FileCache::new(dir)),
            None => FileCache::default_location(),
        };
        match cache {
            Ok(cache) => resolver = resolver.with_cache(Box::new(cache)),
            Err(e) => warn!("Reading cache disabled: {e:#}"),
        }
    }

    let mut service = AirQualityService::new(resolver).with_impact_rules(config.impact.clone());
    if !offline {
        if let Some(weather) = weather_source_from_config(config)? {
            service = service.with_weather_source(weather);
        }
    }

    Ok(service)
}

fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{value}', expected YYYY-MM-DD"))
}

/// "City[, State[, Country]]", or a bare country name.
fn parse_place_entry(entry: &str, country: bool) -> Result<Place> {
    if country {
        return Ok(Place::country(entry)?);
    }

    let mut parts = entry.split(',').map(str::trim);
    let city = parts.next().unwrap_or_default();
    let state = parts.next().map(String::from);
    let country = parts.next().map(String::from);

    Ok(Place::city(city, state, country)?)
}
