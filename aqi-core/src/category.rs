//! AQI severity categories.
//!
//! Every component that labels a numeric AQI goes through [`classify`], so the
//! six bands and their colors are defined exactly once.

use serde::{Deserialize, Serialize};

use crate::error::{AqiError, AqiResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AqiCategory {
    #[serde(rename = "Good")]
    Good,
    #[serde(rename = "Moderate")]
    Moderate,
    #[serde(rename = "Unhealthy for Sensitive Groups")]
    UnhealthyForSensitiveGroups,
    #[serde(rename = "Unhealthy")]
    Unhealthy,
    #[serde(rename = "Very Unhealthy")]
    VeryUnhealthy,
    #[serde(rename = "Hazardous")]
    Hazardous,
}

impl AqiCategory {
    pub const fn all() -> &'static [AqiCategory] {
        &[
            AqiCategory::Good,
            AqiCategory::Moderate,
            AqiCategory::UnhealthyForSensitiveGroups,
            AqiCategory::Unhealthy,
            AqiCategory::VeryUnhealthy,
            AqiCategory::Hazardous,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            AqiCategory::Good => "Good",
            AqiCategory::Moderate => "Moderate",
            AqiCategory::UnhealthyForSensitiveGroups => "Unhealthy for Sensitive Groups",
            AqiCategory::Unhealthy => "Unhealthy",
            AqiCategory::VeryUnhealthy => "Very Unhealthy",
            AqiCategory::Hazardous => "Hazardous",
        }
    }

    /// Hex display color used by the map and chart views.
    pub fn color(&self) -> &'static str {
        match self {
            AqiCategory::Good => "#009966",
            AqiCategory::Moderate => "#ffde33",
            AqiCategory::UnhealthyForSensitiveGroups => "#ff9933",
            AqiCategory::Unhealthy => "#cc0033",
            AqiCategory::VeryUnhealthy => "#660099",
            AqiCategory::Hazardous => "#7e0023",
        }
    }

    /// Inclusive upper bound of the band, `None` for the open-ended top band.
    pub fn upper_bound(&self) -> Option<f64> {
        match self {
            AqiCategory::Good => Some(50.0),
            AqiCategory::Moderate => Some(100.0),
            AqiCategory::UnhealthyForSensitiveGroups => Some(150.0),
            AqiCategory::Unhealthy => Some(200.0),
            AqiCategory::VeryUnhealthy => Some(300.0),
            AqiCategory::Hazardous => None,
        }
    }

    /// True from "Unhealthy for Sensitive Groups" upwards.
    pub fn is_unhealthy_for_sensitive(&self) -> bool {
        *self >= AqiCategory::UnhealthyForSensitiveGroups
    }
}

impl std::fmt::Display for AqiCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Map a numeric AQI onto its band. Bands are upper-inclusive.
pub fn classify(aqi: f64) -> AqiResult<AqiCategory> {
    if !aqi.is_finite() {
        return Err(AqiError::invalid(format!("AQI must be a finite number, got {aqi}")));
    }
    if aqi < 0.0 {
        return Err(AqiError::invalid(format!("AQI must not be negative, got {aqi}")));
    }

    let category = AqiCategory::all()
        .iter()
        .copied()
        .find(|c| c.upper_bound().is_none_or(|upper| aqi <= upper))
        .unwrap_or(AqiCategory::Hazardous);

    Ok(category)
}

/// Label and color of a numeric AQI in one call.
pub fn classify_with_color(aqi: f64) -> AqiResult<(&'static str, &'static str)> {
    let category = classify(aqi)?;
    Ok((category.label(), category.color()))
}
