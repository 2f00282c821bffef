//! Weather-driven adjustment of the AQI baseline.
//!
//! The estimate is a signed number of AQI points per forecast day: positive
//! means conditions favour accumulation, negative means dispersion or washout.

use serde::{Deserialize, Serialize};

use crate::model::WeatherSnapshot;

/// Thresholds and magnitudes of the impact heuristic.
///
/// The defaults are the values the forecasts have always used; every field can
/// be overridden from the `[impact]` table of the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherImpactRules {
    pub humid_above: f64,
    pub humid_impact: f64,
    pub dry_below: f64,
    pub dry_impact: f64,

    /// Wind steps, checked from the strongest down: (speed above, impact).
    pub wind_steps: Vec<(f64, f64)>,
    /// Applied when wind is at or below the lowest step.
    pub calm_impact: f64,

    pub high_pressure_above: f64,
    pub high_pressure_impact: f64,

    pub hot_above: f64,
    pub hot_impact: f64,
    pub warm_above: f64,
    pub warm_impact: f64,
    pub freezing_below: f64,
    pub freezing_impact: f64,

    pub precipitation_impact: f64,
}

impl Default for WeatherImpactRules {
    fn default() -> Self {
        Self {
            humid_above: 70.0,
            humid_impact: 3.0,
            dry_below: 30.0,
            dry_impact: -3.0,

            wind_steps: vec![(20.0, -10.0), (15.0, -8.0), (10.0, -5.0), (5.0, -2.0)],
            calm_impact: 2.0,

            high_pressure_above: 1025.0,
            high_pressure_impact: 3.0,

            hot_above: 35.0,
            hot_impact: 5.0,
            warm_above: 28.0,
            warm_impact: 2.0,
            freezing_below: 0.0,
            freezing_impact: 3.0,

            precipitation_impact: -4.0,
        }
    }
}

impl WeatherImpactRules {
    /// Sum of the per-field contributions. Absent or non-finite fields add 0.
    pub fn estimate(&self, weather: &WeatherSnapshot) -> f64 {
        let humidity = finite(weather.humidity).map_or(0.0, |h| self.humidity_impact(h));
        let wind = finite(weather.wind_speed).map_or(0.0, |w| self.wind_impact(w));
        let pressure = finite(weather.pressure).map_or(0.0, |p| self.pressure_impact(p));
        let temperature = finite(weather.temperature).map_or(0.0, |t| self.temperature_impact(t));
        let precipitation =
            finite(weather.precipitation).map_or(0.0, |p| self.precipitation_impact(p));

        humidity + wind + pressure + temperature + precipitation
    }

    fn humidity_impact(&self, humidity: f64) -> f64 {
        if humidity > self.humid_above {
            self.humid_impact
        } else if humidity < self.dry_below {
            self.dry_impact
        } else {
            0.0
        }
    }

    fn wind_impact(&self, speed: f64) -> f64 {
        let mut steps = self.wind_steps.clone();
        steps.sort_by(|a, b| b.0.total_cmp(&a.0));

        steps
            .iter()
            .find(|(above, _)| speed > *above)
            .map_or(self.calm_impact, |(_, impact)| *impact)
    }

    fn pressure_impact(&self, pressure: f64) -> f64 {
        if pressure > self.high_pressure_above { self.high_pressure_impact } else { 0.0 }
    }

    fn temperature_impact(&self, temperature: f64) -> f64 {
        if temperature > self.hot_above {
            self.hot_impact
        } else if temperature > self.warm_above {
            self.warm_impact
        } else if temperature < self.freezing_below {
            self.freezing_impact
        } else {
            0.0
        }
    }

    fn precipitation_impact(&self, precipitation: f64) -> f64 {
        if precipitation > 0.0 { self.precipitation_impact } else { 0.0 }
    }
}

/// Impact under the default rules.
pub fn estimate(weather: &WeatherSnapshot) -> f64 {
    WeatherImpactRules::default().estimate(weather)
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_snapshot_has_no_impact() {
        assert_eq!(estimate(&WeatherSnapshot::default()), 0.0);
    }

    #[test]
    fn stagnant_hot_humid_weather_worsens() {
        let weather = WeatherSnapshot {
            humidity: Some(80.0),
            wind_speed: Some(2.0),
            pressure: Some(1030.0),
            temperature: Some(36.0),
            precipitation: Some(0.0),
        };
        let impact = estimate(&weather);
        assert!(impact > 0.0);
        assert_eq!(impact, 3.0 + 2.0 + 3.0 + 5.0);
    }

    #[test]
    fn wind_steps_pick_strongest_matching_band() {
        let rules = WeatherImpactRules::default();
        let at = |speed| rules.estimate(&WeatherSnapshot { wind_speed: Some(speed), ..Default::default() });

        assert_eq!(at(25.0), -10.0);
        assert_eq!(at(18.0), -8.0);
        assert_eq!(at(12.0), -5.0);
        assert_eq!(at(7.0), -2.0);
        assert_eq!(at(5.0), 2.0);
        assert_eq!(at(0.0), 2.0);
    }

    #[test]
    fn rain_and_dry_air_improve() {
        let weather = WeatherSnapshot {
            humidity: Some(20.0),
            precipitation: Some(3.5),
            ..Default::default()
        };
        assert_eq!(estimate(&weather), -3.0 - 4.0);
    }

    #[test]
    fn cold_and_warm_both_worsen() {
        let cold = WeatherSnapshot { temperature: Some(-5.0), ..Default::default() };
        let warm = WeatherSnapshot { temperature: Some(30.0), ..Default::default() };
        let mild = WeatherSnapshot { temperature: Some(18.0), ..Default::default() };
        assert_eq!(estimate(&cold), 3.0);
        assert_eq!(estimate(&warm), 2.0);
        assert_eq!(estimate(&mild), 0.0);
    }

    #[test]
    fn non_finite_fields_are_ignored() {
        let weather = WeatherSnapshot { humidity: Some(f64::NAN), ..Default::default() };
        assert_eq!(estimate(&weather), 0.0);
    }

    #[test]
    fn rules_can_be_partially_overridden_from_toml() {
        let rules: WeatherImpactRules = toml::from_str("humid_impact = 6.0").unwrap();
        assert_eq!(rules.humid_impact, 6.0);
        assert_eq!(rules.high_pressure_above, 1025.0);

        let humid = WeatherSnapshot { humidity: Some(90.0), ..Default::default() };
        assert_eq!(rules.estimate(&humid), 6.0);
    }
}
