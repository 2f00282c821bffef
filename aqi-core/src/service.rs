use chrono::{NaiveDate, Utc};
use rand::{SeedableRng, rngs::StdRng};
use serde::Serialize;
use tracing::{debug, warn};

use crate::{
    category::AqiCategory,
    dataset::{CountryRanking, StaticDataset},
    error::AqiResult,
    forecast::{DEFAULT_FORECAST_DAYS, DailyForecastPoint, attach_weather, daily_forecast, seed_for},
    health::{HealthAdvice, HealthProfile, advise},
    impact::WeatherImpactRules,
    model::{CurrentConditions, Place},
    provider::WeatherForecastSource,
    resolver::SourceResolver,
    seasonal::{LocationType, SeasonalBaseline, SeasonalOutlook, seasonal_forecast},
    series::{MonthlySeries, SeriesSummary, summarize},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForecastOptions {
    pub days: u32,
    /// Defaults to a seed derived from the start date.
    pub seed: Option<u64>,
    pub include_weather: bool,
    /// Defaults to today (UTC).
    pub start: Option<NaiveDate>,
}

impl Default for ForecastOptions {
    fn default() -> Self {
        Self { days: DEFAULT_FORECAST_DAYS, seed: None, include_weather: false, start: None }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyForecastReport {
    pub place: Place,
    pub current: CurrentConditions,
    pub weather_impact: f64,
    pub forecast: Vec<DailyForecastPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeasonalReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub place: Option<Place>,
    pub location_type: LocationType,
    pub baseline: SeasonalBaseline,
    pub seasons: Vec<SeasonalOutlook>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyReport {
    pub place: Place,
    pub series: MonthlySeries,
    pub categories: [Option<AqiCategory>; 12],
    pub summary: SeriesSummary,
}

/// Entry point used by front ends: one method per request kind.
pub struct AirQualityService {
    resolver: SourceResolver,
    weather: Option<Box<dyn WeatherForecastSource>>,
    impact: WeatherImpactRules,
}

impl AirQualityService {
    pub fn new(resolver: SourceResolver) -> Self {
        Self { resolver, weather: None, impact: WeatherImpactRules::default() }
    }

    pub fn with_weather_source(mut self, weather: Box<dyn WeatherForecastSource>) -> Self {
        self.weather = Some(weather);
        self
    }

    pub fn with_impact_rules(mut self, impact: WeatherImpactRules) -> Self {
        self.impact = impact;
        self
    }

    fn dataset(&self) -> &StaticDataset {
        self.resolver.dataset()
    }

    pub async fn current(&self, place: &Place) -> AqiResult<CurrentConditions> {
        self.resolver.resolve(place).await
    }

    pub async fn daily_forecast(
        &self,
        place: &Place,
        options: ForecastOptions,
    ) -> AqiResult<DailyForecastReport> {
        let current = self.resolver.resolve(place).await?;
        let weather_impact = current.weather.map_or(0.0, |w| self.impact.estimate(&w));

        let start = options.start.unwrap_or_else(|| Utc::now().date_naive());
        let seed = options.seed.unwrap_or_else(|| seed_for(start));
        let mut rng = StdRng::seed_from_u64(seed);

        debug!(%place, aqi = current.aqi, weather_impact, seed, "Generating daily forecast");
        let mut forecast = daily_forecast(current.aqi, weather_impact, start, options.days, &mut rng)?;

        if options.include_weather {
            let observed = match &self.weather {
                Some(source) => source.daily(place).await.unwrap_or_else(|e| {
                    warn!("Weather forecast unavailable for {place}: {e:#}");
                    Vec::new()
                }),
                None => Vec::new(),
            };
            attach_weather(&mut forecast, &observed, &mut rng);
        }

        Ok(DailyForecastReport { place: place.clone(), current, weather_impact, forecast })
    }

    /// Without a place the default baselines are projected.
    pub async fn seasonal_forecast(
        &self,
        place: Option<&Place>,
        location_type: LocationType,
        reference: NaiveDate,
    ) -> AqiResult<SeasonalReport> {
        let baseline = match place {
            Some(place) => {
                let current = self.resolver.resolve(place).await?;
                SeasonalBaseline::anchored(current.aqi, location_type)?
            }
            None => SeasonalBaseline::default(),
        };

        let seasons = seasonal_forecast(&baseline, reference)?;

        Ok(SeasonalReport { place: place.cloned(), location_type, baseline, seasons })
    }

    pub fn monthly_summary(&self, place: &Place) -> AqiResult<MonthlyReport> {
        let series = self.dataset().series(place)?;

        Ok(MonthlyReport {
            place: place.clone(),
            categories: series.categories(),
            summary: summarize(&series),
            series,
        })
    }

    pub fn compare(&self, places: &[Place]) -> AqiResult<Vec<MonthlyReport>> {
        places.iter().map(|p| self.monthly_summary(p)).collect()
    }

    /// Most polluted countries first; `None` lists them all.
    pub fn ranking(&self, limit: Option<usize>) -> Vec<CountryRanking> {
        self.dataset().ranking(limit)
    }

    pub fn cities_in(&self, country: &str) -> AqiResult<Vec<String>> {
        self.dataset().cities_in(country)
    }

    pub async fn advice(&self, place: &Place, profile: &HealthProfile) -> AqiResult<HealthAdvice> {
        let current = self.resolver.resolve(place).await?;
        advise(current.aqi, profile)
    }
}
