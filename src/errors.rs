//! Search errors

use std::fmt;

use thiserror::Error;

use crate::model::{ItineraryError, PaxTypeCode};

/// Code attached to a rule engine error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleErrorCode {
    /// No validating carrier is common to every passenger.
    ValidatingCarrier,

    /// A passenger type has no usable fares.
    NoFaresForPaxType,

    /// Raised by the validator for a rule category.
    Category(u16),
}

impl fmt::Display for RuleErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleErrorCode::ValidatingCarrier => f.write_str("VALIDATING_CXR_ERROR"),
            RuleErrorCode::NoFaresForPaxType => f.write_str("NO_FARE_FOR_PAX_TYPE"),
            RuleErrorCode::Category(category) => write!(f, "CAT{category}"),
        }
    }
}

/// Errors that stop a search.
///
/// Running out of combinations is not an error: factories report it by
/// returning `None`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SearchError {
    /// A fare component slot has no candidates at all.
    #[error("no fare candidates for {origin}-{destination} ({pax})")]
    EmptyCandidateSlot {
        /// Market origin
        origin: String,
        /// Market destination
        destination: String,
        /// Passenger type
        pax: PaxTypeCode,
    },

    /// A validator reported an error condition.
    #[error("rule engine error {code}: {message}")]
    RuleEngine {
        /// Error code
        code: RuleErrorCode,
        /// Error text
        message: String,
    },

    /// A hard resource limit was hit; the whole pass stops.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// The transaction was cancelled or ran out of time.
    #[error("search aborted")]
    Aborted,

    /// A worker pool could not be built.
    #[error("worker pool error: {0}")]
    Executor(String),

    /// A task panicked or failed in a way nobody anticipated.
    #[error("unexpected failure: {0}")]
    Unexpected(String),

    /// The itinerary description is inconsistent.
    #[error(transparent)]
    Itinerary(#[from] ItineraryError),
}

impl SearchError {
    /// Whether the error stops every itinerary of the pass, not just the one
    /// that raised it.
    pub fn is_global(&self) -> bool {
        matches!(self, SearchError::ResourceExhausted(_) | SearchError::Executor(_))
    }
}

impl From<rayon::ThreadPoolBuildError> for SearchError {
    fn from(error: rayon::ThreadPoolBuildError) -> Self {
        SearchError::Executor(error.to_string())
    }
}
