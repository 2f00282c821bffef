//! Fallback chain from a place to its current conditions:
//! live provider, then a fresh cache entry, then the static dataset.

use std::{collections::BTreeMap, sync::Arc, time::Duration};
use tracing::{debug, info, warn};

use crate::{
    cache::{DEFAULT_MAX_AGE, ReadingCache},
    dataset::{DatasetHit, StaticDataset},
    error::{AqiError, AqiResult},
    model::{CurrentConditions, Place, Provenance, normalize_pollutants},
    provider::{AirQualityProvider, ProviderReading, ReadingStatus},
};

pub struct SourceResolver {
    provider: Option<Box<dyn AirQualityProvider>>,
    cache: Option<Box<dyn ReadingCache>>,
    dataset: Arc<StaticDataset>,
    max_age: Duration,
}

impl SourceResolver {
    pub fn new(dataset: Arc<StaticDataset>) -> Self {
        Self { provider: None, cache: None, dataset, max_age: DEFAULT_MAX_AGE }
    }

    pub fn with_provider(mut self, provider: Box<dyn AirQualityProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_cache(mut self, cache: Box<dyn ReadingCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn dataset(&self) -> &StaticDataset {
        &self.dataset
    }

    /// Current conditions for `place`. Live failures are absorbed; only
    /// `InvalidInput` and `NotFound` reach the caller.
    pub async fn resolve(&self, place: &Place) -> AqiResult<CurrentConditions> {
        let key = place.cache_key();

        match self.live(place).await {
            Ok(Some(conditions)) => {
                if let Some(cache) = &self.cache {
                    if let Err(e) = cache.write(&key, &conditions) {
                        warn!("Failed to cache reading for {place}: {e:#}");
                    }
                }
                return Ok(conditions);
            }
            Ok(None) => {}
            Err(AqiError::UpstreamUnavailable(reason)) => {
                warn!("Live source unavailable for {place}: {reason}");
            }
            Err(e) => return Err(e),
        }

        if let Some(cached) = self.fresh_cached(&key) {
            info!("Serving cached reading for {place}");
            return Ok(cached);
        }

        let conditions = self.from_dataset(place)?;
        info!("Serving {} figure for {place}", conditions.provenance);
        Ok(conditions)
    }

    /// `Ok(None)` when no provider is configured.
    async fn live(&self, place: &Place) -> AqiResult<Option<CurrentConditions>> {
        let Some(provider) = &self.provider else {
            return Ok(None);
        };

        let reading = provider
            .current(place)
            .await
            .map_err(|e| AqiError::UpstreamUnavailable(format!("{}: {e:#}", provider.id())))?;

        normalize(place, provider.id().as_str(), reading).map(Some)
    }

    fn fresh_cached(&self, key: &str) -> Option<CurrentConditions> {
        let cache = self.cache.as_ref()?;
        let hit = cache.read(key)?;

        if hit.age >= self.max_age {
            debug!("Cache entry {key} is stale ({}s old)", hit.age.as_secs());
            return None;
        }
        if !hit.value.aqi.is_finite() || hit.value.aqi < 0.0 {
            debug!("Cache entry {key} holds an unusable AQI");
            return None;
        }

        Some(CurrentConditions { provenance: Provenance::Cache, ..hit.value })
    }

    fn from_dataset(&self, place: &Place) -> AqiResult<CurrentConditions> {
        match self.dataset.lookup(place)? {
            DatasetHit::Current(aqi) => {
                CurrentConditions::new(place.clone(), aqi, BTreeMap::new(), Provenance::Dataset)
            }
            DatasetHit::Monthly(series) => {
                let average = series.average().ok_or_else(|| AqiError::no_data(place.to_string()))?;
                CurrentConditions::new(
                    place.clone(),
                    average,
                    BTreeMap::new(),
                    Provenance::DerivedFromMonthlyAverage,
                )
            }
        }
    }
}

/// Map a provider reading to conditions. A reading without a usable AQI is
/// reported as unavailable so the chain moves on.
fn normalize(
    place: &Place,
    provider: &str,
    reading: ProviderReading,
) -> AqiResult<CurrentConditions> {
    if let ReadingStatus::Failed(message) = &reading.status {
        return Err(AqiError::UpstreamUnavailable(message.clone()));
    }

    let aqi = reading
        .aqi
        .filter(|v| v.is_finite() && *v >= 0.0)
        .ok_or_else(|| AqiError::UpstreamUnavailable(format!("{provider}: no usable AQI")))?;

    let pollutants = normalize_pollutants(reading.pollutants.iter().map(|(k, v)| (k.as_str(), *v)));

    let conditions = CurrentConditions::new(
        place.clone(),
        aqi,
        pollutants,
        Provenance::Live { provider: provider.to_string() },
    )?
    .with_weather(reading.weather)
    .with_station(reading.station_name);

    Ok(match reading.time {
        Some(time) => conditions.with_timestamp(time),
        None => conditions,
    })
}
