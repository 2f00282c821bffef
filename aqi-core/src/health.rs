//! Personal recommendations for a classified AQI.

use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, fmt};

use crate::{
    category::{AqiCategory, classify},
    error::{AqiError, AqiResult},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HealthConcern {
    Asthma,
    HeartDisease,
    Copd,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityLevel {
    Low,
    #[default]
    Moderate,
    High,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgeGroup {
    Child,
    #[default]
    Adult,
    Senior,
}

macro_rules! parse_keyword {
    ($ty:ty, $what:literal, { $($text:literal => $variant:expr),+ $(,)? }) => {
        impl TryFrom<&str> for $ty {
            type Error = AqiError;

            fn try_from(value: &str) -> Result<Self, Self::Error> {
                match value.trim().to_lowercase().replace('_', "-").as_str() {
                    $($text => Ok($variant),)+
                    _ => Err(AqiError::invalid(format!(
                        concat!("Unknown ", $what, " '{}'. Expected one of: {}"),
                        value,
                        [$($text),+].join(", ")
                    ))),
                }
            }
        }
    };
}

parse_keyword!(HealthConcern, "health concern", {
    "asthma" => HealthConcern::Asthma,
    "heart-disease" => HealthConcern::HeartDisease,
    "copd" => HealthConcern::Copd,
});

parse_keyword!(ActivityLevel, "activity level", {
    "low" => ActivityLevel::Low,
    "moderate" => ActivityLevel::Moderate,
    "high" => ActivityLevel::High,
});

parse_keyword!(AgeGroup, "age group", {
    "child" => AgeGroup::Child,
    "adult" => AgeGroup::Adult,
    "senior" => AgeGroup::Senior,
});

impl fmt::Display for HealthConcern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HealthConcern::Asthma => "asthma",
            HealthConcern::HeartDisease => "heart-disease",
            HealthConcern::Copd => "copd",
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthProfile {
    #[serde(default)]
    pub concerns: BTreeSet<HealthConcern>,
    #[serde(default)]
    pub activity: ActivityLevel,
    #[serde(default)]
    pub age: AgeGroup,
}

impl HealthProfile {
    pub fn is_sensitive(&self) -> bool {
        !self.concerns.is_empty() || matches!(self.age, AgeGroup::Child | AgeGroup::Senior)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthAdvice {
    pub aqi: f64,
    pub category: AqiCategory,
    pub general: String,
    pub condition_specific: Vec<String>,
    pub activity: Vec<String>,
    pub age_specific: Vec<String>,
}

fn general_text(category: AqiCategory, sensitive: bool) -> &'static str {
    use AqiCategory::*;

    match (category, sensitive) {
        (Good, false) => "Air quality is good. A great day for outdoor activities.",
        (Good, true) => "Air quality is good. Most people will not be affected.",
        (Moderate, false) => {
            "Air quality is acceptable. If you are sensitive to air pollution, consider reducing prolonged outdoor exertion."
        }
        (Moderate, true) => {
            "If you have respiratory issues, consider limiting prolonged outdoor activities."
        }
        (UnhealthyForSensitiveGroups, false) => {
            "Sensitive groups may experience health effects. The general public is less likely to be affected."
        }
        (UnhealthyForSensitiveGroups, true) => {
            "Reduce prolonged or heavy outdoor exertion and take more breaks outdoors."
        }
        (Unhealthy, false) => {
            "Everyone may begin to experience health effects; sensitive groups may feel more serious effects."
        }
        (Unhealthy, true) => {
            "Avoid prolonged or heavy outdoor exertion. Move activities indoors or reschedule them."
        }
        (VeryUnhealthy, false) => {
            "Health warning of emergency conditions. The entire population is more likely to be affected."
        }
        (VeryUnhealthy, true) => "Avoid all outdoor physical activity. Stay indoors with windows closed.",
        (Hazardous, false) => {
            "Health alert: everyone may experience serious health effects. Avoid all outdoor activities."
        }
        (Hazardous, true) => {
            "Remain indoors and keep activity low. Close windows and run an air purifier if available."
        }
    }
}

fn concern_advice(concern: HealthConcern, category: AqiCategory) -> Vec<&'static str> {
    use AqiCategory::*;

    let severe = matches!(category, VeryUnhealthy | Hazardous);
    let mut out = Vec::new();

    match concern {
        HealthConcern::Asthma => {
            if category.is_unhealthy_for_sensitive() {
                out.push("Keep your rescue inhaler with you at all times.");
            }
            if severe {
                out.push("Consider preemptive use of prescribed asthma medication.");
            }
        }
        HealthConcern::HeartDisease => {
            if matches!(category, Unhealthy | VeryUnhealthy | Hazardous) {
                out.push("Limit physical exertion to reduce strain on your heart.");
            }
            if severe {
                out.push(
                    "Watch for chest pain, shortness of breath or unusual fatigue.",
                );
            }
        }
        HealthConcern::Copd => {
            if matches!(category, Moderate | UnhealthyForSensitiveGroups | Unhealthy) {
                out.push("Use your oxygen as prescribed and consider a higher flow rate if needed.");
            }
            if severe {
                out.push("Stay indoors with windows closed and use an air purifier if available.");
            }
        }
    }

    out
}

fn activity_advice(level: ActivityLevel, category: AqiCategory) -> Option<&'static str> {
    use AqiCategory::*;

    match (level, category) {
        (ActivityLevel::High, Moderate) => Some("Consider reducing the intensity of outdoor workouts."),
        (ActivityLevel::High, UnhealthyForSensitiveGroups) => {
            Some("Shorten outdoor workouts or exercise indoors.")
        }
        (ActivityLevel::High, Unhealthy | VeryUnhealthy | Hazardous) => {
            Some("Move all workouts indoors.")
        }
        (ActivityLevel::Moderate, UnhealthyForSensitiveGroups) => {
            Some("Consider reducing time spent outdoors.")
        }
        (ActivityLevel::Moderate, Unhealthy | VeryUnhealthy | Hazardous) => {
            Some("Limit outdoor activities and exercise indoors.")
        }
        _ => None,
    }
}

fn age_advice(age: AgeGroup, category: AqiCategory) -> Option<&'static str> {
    use AqiCategory::*;

    match (age, category) {
        (AgeGroup::Child, UnhealthyForSensitiveGroups) => {
            Some("Children should take more breaks during outdoor play.")
        }
        (AgeGroup::Child, Unhealthy | VeryUnhealthy | Hazardous) => {
            Some("Children should play indoors.")
        }
        (AgeGroup::Senior, Moderate | UnhealthyForSensitiveGroups) => {
            Some("Seniors should limit prolonged outdoor activities.")
        }
        (AgeGroup::Senior, Unhealthy | VeryUnhealthy | Hazardous) => {
            Some("Seniors should stay indoors and keep activity light.")
        }
        _ => None,
    }
}

pub fn advise(aqi: f64, profile: &HealthProfile) -> AqiResult<HealthAdvice> {
    let category = classify(aqi)?;

    let condition_specific = profile
        .concerns
        .iter()
        .flat_map(|c| concern_advice(*c, category))
        .map(String::from)
        .collect();

    Ok(HealthAdvice {
        aqi,
        category,
        general: general_text(category, profile.is_sensitive()).to_string(),
        condition_specific,
        activity: activity_advice(profile.activity, category).map(String::from).into_iter().collect(),
        age_specific: age_advice(profile.age, category).map(String::from).into_iter().collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(concerns: &[HealthConcern], activity: ActivityLevel, age: AgeGroup) -> HealthProfile {
        HealthProfile { concerns: concerns.iter().copied().collect(), activity, age }
    }

    #[test]
    fn healthy_adult_on_a_good_day_gets_general_advice_only() {
        let advice = advise(30.0, &HealthProfile::default()).unwrap();
        assert_eq!(advice.category, AqiCategory::Good);
        assert_eq!(advice.general, general_text(AqiCategory::Good, false));
        assert!(advice.condition_specific.is_empty());
        assert!(advice.activity.is_empty());
        assert!(advice.age_specific.is_empty());
    }

    #[test]
    fn children_and_seniors_are_sensitive() {
        assert!(profile(&[], ActivityLevel::Low, AgeGroup::Child).is_sensitive());
        assert!(profile(&[], ActivityLevel::Low, AgeGroup::Senior).is_sensitive());
        assert!(!profile(&[], ActivityLevel::Low, AgeGroup::Adult).is_sensitive());
        assert!(profile(&[HealthConcern::Copd], ActivityLevel::Low, AgeGroup::Adult).is_sensitive());
    }

    #[test]
    fn asthma_on_a_very_unhealthy_day() {
        let p = profile(&[HealthConcern::Asthma], ActivityLevel::High, AgeGroup::Adult);
        let advice = advise(250.0, &p).unwrap();

        assert_eq!(advice.category, AqiCategory::VeryUnhealthy);
        assert_eq!(advice.general, general_text(AqiCategory::VeryUnhealthy, true));
        assert_eq!(advice.condition_specific.len(), 2);
        assert_eq!(advice.activity, vec!["Move all workouts indoors.".to_string()]);
    }

    #[test]
    fn copd_advice_changes_with_severity() {
        let p = profile(&[HealthConcern::Copd], ActivityLevel::Low, AgeGroup::Adult);

        let moderate = advise(80.0, &p).unwrap();
        assert!(moderate.condition_specific[0].contains("oxygen"));

        let hazardous = advise(400.0, &p).unwrap();
        assert_eq!(hazardous.condition_specific.len(), 1);
        assert!(hazardous.condition_specific[0].contains("indoors"));
    }

    #[test]
    fn senior_on_a_moderate_day() {
        let p = profile(&[], ActivityLevel::Moderate, AgeGroup::Senior);
        let advice = advise(75.0, &p).unwrap();
        assert_eq!(advice.age_specific.len(), 1);
        assert!(advice.activity.is_empty());
    }

    #[test]
    fn keywords_parse_loosely() {
        assert_eq!(HealthConcern::try_from("heart_disease").unwrap(), HealthConcern::HeartDisease);
        assert_eq!(ActivityLevel::try_from(" HIGH ").unwrap(), ActivityLevel::High);
        assert_eq!(AgeGroup::try_from("senior").unwrap(), AgeGroup::Senior);

        let err = HealthConcern::try_from("gout").unwrap_err();
        assert!(err.to_string().contains("asthma, heart-disease, copd"));
    }

    #[test]
    fn invalid_aqi_is_rejected() {
        assert!(advise(-5.0, &HealthProfile::default()).is_err());
    }
}
