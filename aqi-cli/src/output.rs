//! Human-readable rendering of core results.

use anyhow::{Context, Result};
use aqi_core::{
    CountryRanking, CurrentConditions, HealthAdvice, Month,
    service::{DailyForecastReport, MonthlyReport, SeasonalReport},
};
use serde::Serialize;
use std::fmt::Write as _;

/// Print `value` as pretty JSON, or through `render` as text.
pub fn emit<T: Serialize + ?Sized>(json: bool, value: &T, render: fn(&T) -> String) -> Result<()> {
    if json {
        let out = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
        println!("{out}");
    } else {
        print!("{}", render(value));
    }
    Ok(())
}

fn opt(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.1}"))
}

pub fn current(c: &CurrentConditions) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", c.place);
    let _ = writeln!(out, "  AQI:            {:.0} ({})", c.aqi, c.category);
    let _ = writeln!(out, "  Main pollutant: {}", c.main_pollutant_name());
    for (pollutant, value) in &c.pollutants {
        let _ = writeln!(out, "    {:<16}{value}", pollutant.display_name());
    }
    if let Some(station) = &c.station {
        let _ = writeln!(out, "  Station:        {station}");
    }
    if let Some(w) = &c.weather {
        let _ = writeln!(
            out,
            "  Weather:        {} °C, {} % humidity, {} m/s wind, {} hPa",
            opt(w.temperature),
            opt(w.humidity),
            opt(w.wind_speed),
            opt(w.pressure),
        );
    }
    let _ = writeln!(out, "  Source:         {}", c.provenance);
    let _ = writeln!(out, "  Updated:        {}", c.timestamp.format("%Y-%m-%d %H:%M UTC"));
    out
}

pub fn daily(r: &DailyForecastReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{}: current AQI {:.0} ({}), weather impact {:+.1}/day",
        r.place, r.current.aqi, r.current.category, r.weather_impact
    );
    for point in &r.forecast {
        let _ = write!(
            out,
            "  {} {:<9} {:>4}  {}",
            point.date, point.day_of_week, point.aqi, point.category
        );
        if let Some(w) = &point.weather {
            let _ = write!(
                out,
                "  [{}, {} °C, {:?}]",
                w.conditions,
                opt(w.snapshot.temperature),
                w.source
            );
        }
        out.push('\n');
    }
    out
}

pub fn seasonal(r: &SeasonalReport) -> String {
    let mut out = String::new();
    match &r.place {
        Some(place) => {
            let _ = writeln!(out, "Seasonal outlook for {place} ({})", r.location_type);
        }
        None => {
            let _ = writeln!(out, "Seasonal outlook ({})", r.location_type);
        }
    }
    for outlook in &r.seasons {
        let _ = writeln!(out, "  {} ({:?})", outlook.season, outlook.trend);
        if let Some(point) = outlook.location(r.location_type) {
            let _ = writeln!(
                out,
                "    AQI {} ({}), dominant {}",
                point.aqi,
                point.category,
                point.dominant_pollutant.display_name()
            );
        }
        let _ = writeln!(out, "    {}", outlook.factors.join("; "));
    }
    out
}

pub fn monthly(r: &MonthlyReport) -> String {
    let mut out = String::new();
    let s = &r.summary;
    let _ = writeln!(out, "{}", r.place);
    let _ = writeln!(out, "  Average: {}  Min: {}  Max: {}", opt(s.average), opt(s.min), opt(s.max));
    if let (Some(month), Some(value)) = (s.peak_month, s.peak_value) {
        let _ = writeln!(out, "  Peak:     {month} ({value:.0})");
    }
    if let (Some(month), Some(value)) = (s.cleanest_month, s.cleanest_value) {
        let _ = writeln!(out, "  Cleanest: {month} ({value:.0})");
    }
    let seasons = &s.seasonal_averages;
    let _ = writeln!(
        out,
        "  Winter {}  Summer {}  Monsoon {}  Post-monsoon {}",
        opt(seasons.winter),
        opt(seasons.summer),
        opt(seasons.monsoon),
        opt(seasons.post_monsoon)
    );
    for month in Month::ALL {
        let value = r.series.get(month);
        let category = r.categories[month.index()]
            .map_or_else(|| "-".to_string(), |c| c.to_string());
        let _ = writeln!(out, "    {month} {:>7}  {category}", opt(value));
    }
    out
}

pub fn comparison(reports: &[MonthlyReport]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<28} {:>8} {:>8} {:>8}  Peak", "Place", "Average", "Min", "Max");
    for r in reports {
        let s = &r.summary;
        let peak = s.peak_month.map_or_else(|| "-".to_string(), |m| m.to_string());
        let _ = writeln!(
            out,
            "{:<28} {:>8} {:>8} {:>8}  {peak}",
            r.place.to_string(),
            opt(s.average),
            opt(s.min),
            opt(s.max)
        );
    }
    out
}

pub fn ranking(rows: &[CountryRanking]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:>4}  {:<28} {:>8}  Category", "#", "Country", "Average");
    for r in rows {
        let category = r.category.map_or_else(|| "-".to_string(), |c| c.to_string());
        let _ = writeln!(out, "{:>4}  {:<28} {:>8}  {category}", r.position, r.country, opt(r.average));
    }
    out
}

pub fn cities(names: &[String]) -> String {
    if names.is_empty() {
        return "No cities found\n".to_string();
    }
    let mut out = String::new();
    for name in names {
        let _ = writeln!(out, "{name}");
    }
    out
}

pub fn advice(a: &HealthAdvice) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "AQI {:.0} ({})", a.aqi, a.category);
    let _ = writeln!(out, "  {}", a.general);
    for line in a.condition_specific.iter().chain(&a.activity).chain(&a.age_specific) {
        let _ = writeln!(out, "  - {line}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use aqi_core::{AqiCategory, MonthlySeries, Place, Provenance, summarize};
    use std::collections::BTreeMap;

    #[test]
    fn current_shows_source_and_unknown_pollutant() {
        let place = Place::country("India").unwrap();
        let c = CurrentConditions::new(place, 142.0, BTreeMap::new(), Provenance::Dataset).unwrap();
        let text = current(&c);
        assert!(text.contains("142 (Unhealthy for Sensitive Groups)"));
        assert!(text.contains("Main pollutant: Unknown"));
        assert!(text.contains("Source:         dataset"));
    }

    #[test]
    fn ranking_shows_missing_average() {
        let rows = vec![
            CountryRanking {
                position: 1,
                country: "Chad".into(),
                published_rank: Some(1),
                average: Some(91.8),
                category: Some(AqiCategory::Moderate),
            },
            CountryRanking {
                position: 2,
                country: "Atlantis".into(),
                published_rank: None,
                average: None,
                category: None,
            },
        ];
        let text = ranking(&rows);
        assert!(text.contains("Chad"));
        assert!(text.contains("91.8  Moderate"));
        assert!(text.lines().last().unwrap().ends_with("n/a  -"));
        assert_eq!(cities(&[]), "No cities found\n");
    }

    #[test]
    fn monthly_marks_missing_months() {
        let mut values = [None; 12];
        values[0] = Some(300.0);
        let series = MonthlySeries::new(values).unwrap();
        let report = MonthlyReport {
            place: Place::city("Delhi", None, None).unwrap(),
            categories: series.categories(),
            summary: summarize(&series),
            series,
        };
        let text = monthly(&report);
        assert!(text.contains("Peak:     Jan (300)"));
        assert!(text.contains("Summer n/a"));
    }
}
