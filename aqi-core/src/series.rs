//! Twelve-month AQI series and their summaries.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{
    category::{AqiCategory, classify},
    error::{AqiError, AqiResult},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Month {
    Jan,
    Feb,
    Mar,
    Apr,
    May,
    Jun,
    Jul,
    Aug,
    Sep,
    Oct,
    Nov,
    Dec,
}

impl Month {
    pub const ALL: [Month; 12] = [
        Month::Jan,
        Month::Feb,
        Month::Mar,
        Month::Apr,
        Month::May,
        Month::Jun,
        Month::Jul,
        Month::Aug,
        Month::Sep,
        Month::Oct,
        Month::Nov,
        Month::Dec,
    ];

    pub fn index(&self) -> usize {
        *self as usize
    }

    /// 1-based month number, as chrono reports it.
    pub fn from_number(number: u32) -> Option<Self> {
        Month::ALL.get(usize::try_from(number).ok()?.checked_sub(1)?).copied()
    }

    pub fn abbrev(&self) -> &'static str {
        match self {
            Month::Jan => "Jan",
            Month::Feb => "Feb",
            Month::Mar => "Mar",
            Month::Apr => "Apr",
            Month::May => "May",
            Month::Jun => "Jun",
            Month::Jul => "Jul",
            Month::Aug => "Aug",
            Month::Sep => "Sep",
            Month::Oct => "Oct",
            Month::Nov => "Nov",
            Month::Dec => "Dec",
        }
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.abbrev())
    }
}

/// Climate buckets used by the monthly datasets (Indian convention).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeasonBucket {
    Winter,
    Summer,
    Monsoon,
    PostMonsoon,
}

impl SeasonBucket {
    pub fn months(&self) -> &'static [Month] {
        match self {
            SeasonBucket::Winter => &[Month::Dec, Month::Jan, Month::Feb],
            SeasonBucket::Summer => &[Month::Mar, Month::Apr, Month::May],
            SeasonBucket::Monsoon => &[Month::Jun, Month::Jul, Month::Aug, Month::Sep],
            SeasonBucket::PostMonsoon => &[Month::Oct, Month::Nov],
        }
    }
}

/// Exactly twelve calendar-ordered slots; `None` means missing, not zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Option<f64>>", into = "Vec<Option<f64>>")]
pub struct MonthlySeries([Option<f64>; 12]);

impl MonthlySeries {
    pub fn new(values: [Option<f64>; 12]) -> AqiResult<Self> {
        for (month, value) in Month::ALL.iter().zip(values.iter()) {
            match value {
                Some(v) if !v.is_finite() || *v < 0.0 => {
                    return Err(AqiError::invalid(format!(
                        "Monthly reading for {month} must be a finite, non-negative number, got {v}"
                    )));
                }
                _ => {}
            }
        }
        Ok(Self(values))
    }

    pub fn empty() -> Self {
        Self([None; 12])
    }

    pub fn get(&self, month: Month) -> Option<f64> {
        self.0[month.index()]
    }

    pub fn values(&self) -> &[Option<f64>; 12] {
        &self.0
    }

    /// Present readings in calendar order.
    pub fn present(&self) -> impl Iterator<Item = (Month, f64)> + '_ {
        Month::ALL.iter().filter_map(|m| self.get(*m).map(|v| (*m, v)))
    }

    pub fn is_all_missing(&self) -> bool {
        self.0.iter().all(Option::is_none)
    }

    pub fn average(&self) -> Option<f64> {
        mean(self.present().map(|(_, v)| v))
    }

    /// Category per slot; missing slots stay unclassified.
    pub fn categories(&self) -> [Option<AqiCategory>; 12] {
        self.0.map(|slot| slot.and_then(|v| classify(v).ok()))
    }
}

impl TryFrom<Vec<Option<f64>>> for MonthlySeries {
    type Error = AqiError;

    fn try_from(values: Vec<Option<f64>>) -> Result<Self, Self::Error> {
        let len = values.len();
        let arr: [Option<f64>; 12] = values
            .try_into()
            .map_err(|_| AqiError::invalid(format!("A monthly series needs 12 slots, got {len}")))?;
        MonthlySeries::new(arr)
    }
}

impl From<MonthlySeries> for Vec<Option<f64>> {
    fn from(series: MonthlySeries) -> Self {
        series.0.to_vec()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SeasonalAverages {
    pub winter: Option<f64>,
    pub summer: Option<f64>,
    pub monsoon: Option<f64>,
    pub post_monsoon: Option<f64>,
}

impl SeasonalAverages {
    pub fn get(&self, bucket: SeasonBucket) -> Option<f64> {
        match bucket {
            SeasonBucket::Winter => self.winter,
            SeasonBucket::Summer => self.summer,
            SeasonBucket::Monsoon => self.monsoon,
            SeasonBucket::PostMonsoon => self.post_monsoon,
        }
    }
}

/// Derived figures; `None` everywhere when the series holds no readings.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SeriesSummary {
    pub average: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub peak_month: Option<Month>,
    pub peak_value: Option<f64>,
    pub cleanest_month: Option<Month>,
    pub cleanest_value: Option<f64>,
    pub seasonal_averages: SeasonalAverages,
}

pub fn summarize(series: &MonthlySeries) -> SeriesSummary {
    // Strict comparisons keep the earliest month on ties.
    let mut peak: Option<(Month, f64)> = None;
    let mut cleanest: Option<(Month, f64)> = None;

    for (month, value) in series.present() {
        if peak.is_none_or(|(_, top)| value > top) {
            peak = Some((month, value));
        }
        if cleanest.is_none_or(|(_, low)| value < low) {
            cleanest = Some((month, value));
        }
    }

    let bucket = |b: SeasonBucket| mean(b.months().iter().filter_map(|m| series.get(*m)));

    SeriesSummary {
        average: series.average(),
        min: cleanest.map(|(_, v)| v),
        max: peak.map(|(_, v)| v),
        peak_month: peak.map(|(m, _)| m),
        peak_value: peak.map(|(_, v)| v),
        cleanest_month: cleanest.map(|(m, _)| m),
        cleanest_value: cleanest.map(|(_, v)| v),
        seasonal_averages: SeasonalAverages {
            winter: bucket(SeasonBucket::Winter),
            summer: bucket(SeasonBucket::Summer),
            monsoon: bucket(SeasonBucket::Monsoon),
            post_monsoon: bucket(SeasonBucket::PostMonsoon),
        },
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (count > 0).then(|| sum / count as f64)
}
