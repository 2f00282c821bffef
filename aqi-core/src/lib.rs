//! Core library for the `aqi` CLI.
//!
//! This crate defines:
//! - AQI classification, shared by every component
//! - Resolution of a place to its current conditions (live provider, cache,
//!   static dataset)
//! - Daily and seasonal forecasts, monthly series summaries and health advice
//! - Configuration, provider clients and the on-disk reading cache
//!
//! It is used by `aqi-cli`, but can also be reused by other binaries or services.

pub mod cache;
pub mod category;
pub mod config;
pub mod dataset;
pub mod error;
pub mod forecast;
pub mod health;
pub mod impact;
pub mod model;
pub mod provider;
pub mod resolver;
pub mod seasonal;
pub mod series;
pub mod service;

pub use cache::{CachedReading, FileCache, ReadingCache};
pub use category::{AqiCategory, classify};
pub use config::{CacheConfig, Config, ProviderConfig};
pub use dataset::{CountryRanking, DatasetHit, DatasetPaths, StaticDataset};
pub use error::{AqiError, AqiResult, NotFoundReason};
pub use forecast::{DailyForecastPoint, forecast};
pub use health::{HealthAdvice, HealthProfile, advise};
pub use impact::WeatherImpactRules;
pub use model::{CurrentConditions, Place, Pollutant, Provenance, WeatherSnapshot};
pub use provider::{AirQualityProvider, ProviderId, ProviderReading, WeatherForecastSource};
pub use resolver::SourceResolver;
pub use seasonal::{LocationType, Season, SeasonalOutlook};
pub use series::{Month, MonthlySeries, SeriesSummary, summarize};
pub use service::{AirQualityService, ForecastOptions};
