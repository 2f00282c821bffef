use anyhow::anyhow;
use approx::assert_relative_eq;
use aqi_core::{
    AirQualityProvider, AirQualityService, AqiCategory, AqiError, CachedReading,
    CurrentConditions, ForecastOptions, HealthProfile, LocationType, Month, NotFoundReason, Place,
    ProviderId, ProviderReading, Provenance, ReadingCache, SourceResolver, StaticDataset,
    WeatherSnapshot,
    dataset::{parse_cities, parse_countries, parse_markers},
    model::DailyWeather,
    provider::{ReadingStatus, WeatherForecastSource},
};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex},
    time::Duration,
};

const CITIES: &str = "\
City,State,Country,Jan,Feb,Mar,Apr,May,Jun,Jul,Aug,Sep,Oct,Nov,Dec
Delhi,Delhi,India,300,280,220,200,180,160,140,150,170,250,290,280
Aurangabad,Maharashtra,India,90,85,80,75,70,60,50,55,60,75,85,95
Aurangabad,Bihar,India,150,140,130,120,110,100,90,95,100,120,140,160
Ghost Town,Nowhere,India,--,--,--,--,--,--,--,--,--,--,--,--
";

const COUNTRIES: &str = "\
Rank,Country,2024 Avg,Jan,Feb,Mar,Apr,May,Jun,Jul,Aug,Sep,Oct,Nov,Dec
1,Chad,91.8,100,90,--,--,--,--,--,--,--,--,--,80
";

const MARKERS: &str = "\
City,Country,AQI Value
Pune,India,88
";

fn dataset() -> Arc<StaticDataset> {
    Arc::new(StaticDataset::new(
        parse_cities(CITIES.as_bytes()).unwrap(),
        parse_countries(COUNTRIES.as_bytes()).unwrap(),
        parse_markers(MARKERS.as_bytes()).unwrap(),
    ))
}

#[derive(Debug)]
enum Behaviour {
    Reading(f64),
    TransportError,
    Failed,
    NoAqi,
}

#[derive(Debug)]
struct FakeProvider {
    behaviour: Behaviour,
    weather: Option<WeatherSnapshot>,
}

impl FakeProvider {
    fn boxed(behaviour: Behaviour) -> Box<dyn AirQualityProvider> {
        Box::new(Self { behaviour, weather: None })
    }
}

#[async_trait]
impl AirQualityProvider for FakeProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Waqi
    }

    async fn current(&self, _place: &Place) -> anyhow::Result<ProviderReading> {
        match self.behaviour {
            Behaviour::Reading(aqi) => Ok(ProviderReading {
                status: ReadingStatus::Ok,
                aqi: Some(aqi),
                pollutants: vec![("pm25".into(), aqi), ("no2".into(), 10.0)],
                station_name: Some("Test station".into()),
                time: None,
                weather: self.weather,
            }),
            Behaviour::TransportError => Err(anyhow!("connection timed out")),
            Behaviour::Failed => Ok(ProviderReading::failed("Unknown station")),
            Behaviour::NoAqi => Ok(ProviderReading {
                status: ReadingStatus::Ok,
                aqi: None,
                pollutants: Vec::new(),
                station_name: None,
                time: None,
                weather: None,
            }),
        }
    }
}

#[derive(Default)]
struct MemoryCache {
    entries: Mutex<HashMap<String, CachedReading>>,
    fail_writes: bool,
}

impl MemoryCache {
    fn with_entry(key: &str, aqi: f64, age: Duration) -> Self {
        let place = Place::city("Delhi", None, None).unwrap();
        let value =
            CurrentConditions::new(place, aqi, BTreeMap::new(), Provenance::Live { provider: "waqi".into() })
                .unwrap();
        let cache = Self::default();
        cache.entries.lock().unwrap().insert(key.to_string(), CachedReading { value, age });
        cache
    }
}

/// Lets a test keep a handle on the cache it hands to the resolver.
struct Shared(Arc<MemoryCache>);

impl ReadingCache for Shared {
    fn read(&self, key: &str) -> Option<CachedReading> {
        self.0.entries.lock().unwrap().get(key).cloned()
    }

    fn write(&self, key: &str, value: &CurrentConditions) -> anyhow::Result<()> {
        if self.0.fail_writes {
            return Err(anyhow!("disk full"));
        }
        self.0.entries.lock().unwrap().insert(
            key.to_string(),
            CachedReading { value: value.clone(), age: Duration::ZERO },
        );
        Ok(())
    }
}

fn delhi() -> Place {
    Place::city("Delhi", None, None).unwrap()
}

#[tokio::test]
async fn live_reading_wins_and_is_cached() {
    let cache = Arc::new(MemoryCache::with_entry(&delhi().cache_key(), 90.0, Duration::ZERO));
    let resolver = SourceResolver::new(dataset())
        .with_provider(FakeProvider::boxed(Behaviour::Reading(174.0)))
        .with_cache(Box::new(Shared(cache.clone())));

    let current = resolver.resolve(&delhi()).await.unwrap();

    assert_eq!(current.aqi, 174.0);
    assert_eq!(current.category, AqiCategory::Unhealthy);
    assert_eq!(current.provenance, Provenance::Live { provider: "waqi".into() });
    assert_eq!(current.main_pollutant_name(), "PM2.5");

    let stored = Shared(cache).read(&delhi().cache_key()).unwrap();
    assert_eq!(stored.value.aqi, 174.0);
}

#[tokio::test]
async fn fresh_cache_is_used_when_live_source_fails() {
    for behaviour in [Behaviour::TransportError, Behaviour::Failed, Behaviour::NoAqi] {
        let cache =
            Arc::new(MemoryCache::with_entry(&delhi().cache_key(), 95.0, Duration::from_secs(600)));
        let resolver = SourceResolver::new(dataset())
            .with_provider(FakeProvider::boxed(behaviour))
            .with_cache(Box::new(Shared(cache)));

        let current = resolver.resolve(&delhi()).await.unwrap();
        assert_eq!(current.aqi, 95.0);
        assert_eq!(current.provenance, Provenance::Cache);
    }
}

#[tokio::test]
async fn stale_cache_falls_through_to_dataset() {
    let cache =
        Arc::new(MemoryCache::with_entry(&delhi().cache_key(), 95.0, Duration::from_secs(7200)));
    let resolver = SourceResolver::new(dataset())
        .with_provider(FakeProvider::boxed(Behaviour::TransportError))
        .with_cache(Box::new(Shared(cache)));

    let current = resolver.resolve(&delhi()).await.unwrap();
    assert_eq!(current.provenance, Provenance::DerivedFromMonthlyAverage);
}

#[tokio::test]
async fn cache_entry_exactly_at_max_age_is_stale() {
    let cache =
        Arc::new(MemoryCache::with_entry(&delhi().cache_key(), 95.0, Duration::from_secs(3600)));
    let resolver = SourceResolver::new(Arc::new(StaticDataset::default()))
        .with_provider(FakeProvider::boxed(Behaviour::TransportError))
        .with_cache(Box::new(Shared(cache)));

    assert!(matches!(
        resolver.resolve(&delhi()).await,
        Err(AqiError::NotFound { reason: NotFoundReason::UnknownPlace, .. })
    ));

    let cache =
        Arc::new(MemoryCache::with_entry(&delhi().cache_key(), 95.0, Duration::from_secs(3599)));
    let resolver = SourceResolver::new(Arc::new(StaticDataset::default()))
        .with_cache(Box::new(Shared(cache)));
    assert_eq!(resolver.resolve(&delhi()).await.unwrap().provenance, Provenance::Cache);
}

#[tokio::test]
async fn max_age_is_configurable() {
    let cache =
        Arc::new(MemoryCache::with_entry(&delhi().cache_key(), 95.0, Duration::from_secs(7200)));
    let resolver = SourceResolver::new(dataset())
        .with_cache(Box::new(Shared(cache)))
        .with_max_age(Duration::from_secs(3 * 3600));

    assert_eq!(resolver.resolve(&delhi()).await.unwrap().provenance, Provenance::Cache);
}

#[tokio::test]
async fn failed_cache_write_does_not_fail_resolution() {
    let cache = Arc::new(MemoryCache { fail_writes: true, ..Default::default() });
    let resolver = SourceResolver::new(dataset())
        .with_provider(FakeProvider::boxed(Behaviour::Reading(42.0)))
        .with_cache(Box::new(Shared(cache)));

    let current = resolver.resolve(&delhi()).await.unwrap();
    assert_eq!(current.aqi, 42.0);
}

#[tokio::test]
async fn delhi_monthly_average_end_to_end() {
    let resolver = SourceResolver::new(dataset());

    let current = resolver.resolve(&delhi()).await.unwrap();

    assert_relative_eq!(current.aqi, 2620.0 / 12.0, epsilon = 1e-9);
    assert_eq!(current.category, AqiCategory::VeryUnhealthy);
    assert_eq!(current.provenance, Provenance::DerivedFromMonthlyAverage);
    assert_eq!(current.main_pollutant, None);

    let service = AirQualityService::new(resolver);
    let report = service.monthly_summary(&delhi()).unwrap();
    assert_eq!(report.summary.peak_month, Some(Month::Jan));
    assert_eq!(report.summary.peak_value, Some(300.0));
    assert_eq!(report.summary.cleanest_month, Some(Month::Jul));
    assert_eq!(report.summary.cleanest_value, Some(140.0));
}

#[tokio::test]
async fn delhi_with_live_source_down_and_stale_cache() {
    let cities = "\
City,State,Country,Jan,Feb,Mar,Apr,May,Jun,Jul,Aug,Sep,Oct,Nov,Dec
Delhi,Delhi,India,300,280,250,200,180,150,140,160,190,220,260,290
";
    let dataset = Arc::new(StaticDataset::new(
        parse_cities(cities.as_bytes()).unwrap(),
        Vec::new(),
        Vec::new(),
    ));
    let place = Place::city("Delhi", None, Some("India".into())).unwrap();
    let cache =
        Arc::new(MemoryCache::with_entry(&place.cache_key(), 95.0, Duration::from_secs(7200)));
    let service = AirQualityService::new(
        SourceResolver::new(dataset)
            .with_provider(FakeProvider::boxed(Behaviour::TransportError))
            .with_cache(Box::new(Shared(cache))),
    );

    let current = service.current(&place).await.unwrap();
    assert_relative_eq!(current.aqi, 218.333_333, epsilon = 1e-5);
    assert_eq!(current.category, AqiCategory::VeryUnhealthy);
    assert_eq!(current.provenance, Provenance::DerivedFromMonthlyAverage);

    let summary = service.monthly_summary(&place).unwrap().summary;
    assert_eq!(summary.peak_month, Some(Month::Jan));
    assert_eq!(summary.peak_value, Some(300.0));
    assert_eq!(summary.cleanest_month, Some(Month::Jul));
    assert_eq!(summary.cleanest_value, Some(140.0));
}

#[tokio::test]
async fn point_snapshot_resolves_as_dataset() {
    let resolver = SourceResolver::new(dataset());
    let pune = Place::city("pune", None, None).unwrap();

    let current = resolver.resolve(&pune).await.unwrap();
    assert_eq!(current.aqi, 88.0);
    assert_eq!(current.provenance, Provenance::Dataset);
}

#[tokio::test]
async fn not_found_distinguishes_unknown_from_empty() {
    let resolver = SourceResolver::new(dataset())
        .with_provider(FakeProvider::boxed(Behaviour::TransportError));

    let atlantis = Place::city("Atlantis", None, None).unwrap();
    assert!(matches!(
        resolver.resolve(&atlantis).await,
        Err(AqiError::NotFound { reason: NotFoundReason::UnknownPlace, .. })
    ));

    let ghost = Place::city("Ghost Town", None, None).unwrap();
    assert!(matches!(
        resolver.resolve(&ghost).await,
        Err(AqiError::NotFound { reason: NotFoundReason::NoData, .. })
    ));
}

#[tokio::test]
async fn ambiguous_city_is_invalid_input() {
    let resolver = SourceResolver::new(dataset());
    let place = Place::city("Aurangabad", None, None).unwrap();

    assert!(matches!(resolver.resolve(&place).await, Err(AqiError::InvalidInput(_))));

    let bihar = Place::city("Aurangabad", Some("Bihar".into()), None).unwrap();
    let current = resolver.resolve(&bihar).await.unwrap();
    assert_relative_eq!(current.aqi, 1455.0 / 12.0, epsilon = 1e-9);
}

#[tokio::test]
async fn forecast_uses_weather_of_live_reading() {
    let provider = FakeProvider {
        behaviour: Behaviour::Reading(100.0),
        weather: Some(WeatherSnapshot {
            humidity: Some(85.0),
            wind_speed: Some(1.0),
            ..Default::default()
        }),
    };
    let service = AirQualityService::new(SourceResolver::new(dataset()).with_provider(Box::new(provider)));

    let start = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
    let options = ForecastOptions { start: Some(start), seed: Some(1), ..Default::default() };
    let report = service.daily_forecast(&delhi(), options).await.unwrap();

    assert_eq!(report.weather_impact, 5.0);
    assert_eq!(report.forecast.len(), 7);
    assert_eq!(report.forecast[0].date, start);
    assert!(report.forecast.iter().all(|p| p.weather.is_none()));

    let again = service.daily_forecast(&delhi(), options).await.unwrap();
    assert_eq!(report.forecast, again.forecast);
}

#[derive(Debug)]
struct FixedWeather(Vec<DailyWeather>);

#[async_trait]
impl WeatherForecastSource for FixedWeather {
    async fn daily(&self, _place: &Place) -> anyhow::Result<Vec<DailyWeather>> {
        Ok(self.0.clone())
    }
}

#[tokio::test]
async fn forecast_attaches_observed_and_generated_weather() {
    let start = NaiveDate::from_ymd_opt(2026, 7, 1).unwrap();
    let observed = vec![DailyWeather {
        date: start,
        conditions: "haze".into(),
        snapshot: WeatherSnapshot { temperature: Some(38.0), ..Default::default() },
    }];
    let service = AirQualityService::new(SourceResolver::new(dataset()))
        .with_weather_source(Box::new(FixedWeather(observed)));

    let options = ForecastOptions {
        days: 3,
        start: Some(start),
        include_weather: true,
        ..Default::default()
    };
    let report = service.daily_forecast(&delhi(), options).await.unwrap();

    let first = report.forecast[0].weather.as_ref().unwrap();
    assert_eq!(first.conditions, "haze");
    assert!(report.forecast[1..].iter().all(|p| p.weather.is_some()));
}

#[tokio::test]
async fn seasonal_outlook_is_anchored_to_place() {
    let service = AirQualityService::new(
        SourceResolver::new(dataset()).with_provider(FakeProvider::boxed(Behaviour::Reading(170.0))),
    );
    let reference = NaiveDate::from_ymd_opt(2026, 12, 10).unwrap();

    let report = service
        .seasonal_forecast(Some(&delhi()), LocationType::Urban, reference)
        .await
        .unwrap();

    let winter = &report.seasons[0];
    let urban = winter.location(LocationType::Urban).unwrap();
    assert_eq!(urban.aqi, 221);
    assert_eq!(urban.category, AqiCategory::VeryUnhealthy);
    assert_eq!(report.baseline.rural, 80.0);

    let default = service.seasonal_forecast(None, LocationType::Rural, reference).await.unwrap();
    assert_eq!(default.seasons[0].location(LocationType::Rural).unwrap().aqi, 44);
}

#[tokio::test]
async fn compare_and_advice() {
    let service = AirQualityService::new(SourceResolver::new(dataset()));

    let places = vec![delhi(), Place::country("Chad").unwrap()];
    let reports = service.compare(&places).unwrap();
    assert_eq!(reports.len(), 2);
    assert_relative_eq!(reports[1].summary.average.unwrap(), 90.0);
    assert_eq!(reports[1].summary.seasonal_averages.monsoon, None);

    let missing = vec![delhi(), Place::city("Atlantis", None, None).unwrap()];
    assert!(service.compare(&missing).is_err());

    let ranking = service.ranking(None);
    assert_eq!(ranking.len(), 1);
    assert_eq!(ranking[0].country, "Chad");
    assert_eq!(service.cities_in("India").unwrap(), ["Aurangabad", "Delhi", "Ghost Town", "Pune"]);

    let advice = service.advice(&delhi(), &HealthProfile::default()).await.unwrap();
    assert_eq!(advice.category, AqiCategory::VeryUnhealthy);
    assert_eq!(advice.activity.len(), 1);
}
