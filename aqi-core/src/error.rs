use thiserror::Error;

/// Why a place could not be resolved to a numeric AQI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundReason {
    /// No source knows the place at all.
    UnknownPlace,
    /// The place is known but no source holds a usable number for it.
    NoData,
}

#[derive(Debug, Error)]
pub enum AqiError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{}", not_found_message(.place, .reason))]
    NotFound { place: String, reason: NotFoundReason },

    /// Transient live-source failure. The resolver absorbs these and moves on
    /// to the next tier, so callers never receive this variant from `resolve`.
    #[error("Upstream source unavailable: {0}")]
    UpstreamUnavailable(String),
}

impl AqiError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        AqiError::InvalidInput(msg.into())
    }

    pub fn unknown_place(place: impl Into<String>) -> Self {
        AqiError::NotFound { place: place.into(), reason: NotFoundReason::UnknownPlace }
    }

    pub fn no_data(place: impl Into<String>) -> Self {
        AqiError::NotFound { place: place.into(), reason: NotFoundReason::NoData }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AqiError::NotFound { .. })
    }
}

fn not_found_message(place: &str, reason: &NotFoundReason) -> String {
    match reason {
        NotFoundReason::UnknownPlace => format!("No data found for '{place}'"),
        NotFoundReason::NoData => {
            format!("'{place}' is known but no numeric AQI data is available for it")
        }
    }
}

pub type AqiResult<T> = Result<T, AqiError>;
