//! Error taxonomy for the reservation engine
//!
//! Every operation returns `Result<_, EngineError>`. Validation and conflict
//! errors carry enough structure for a caller to render field-level or
//! per-asset detail; persistence failures are opaque and retryable.

use crate::availability::AssetAvailability;
use crate::reservation::ReservationStatus;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("end date precedes start date")]
    InvalidDateRange,
    #[error("reservation draft has no date range")]
    MissingDateRange,
    #[error("reservation draft has no title")]
    MissingTitle,
    #[error("requested quantity must be at least 1")]
    ZeroQuantity,
    #[error("summed quantities exceed the representable maximum")]
    QuantityOverflow,
    #[error("at least one asset must be requested")]
    EmptyAssetRequests,
    #[error("kit has no items")]
    EmptyKit,
    #[error("asset was never checked out")]
    NotCheckedOut,
    #[error("illegal status transition {from:?} -> {to:?}")]
    InvalidTransition {
        from: ReservationStatus,
        to: ReservationStatus,
    },
}

#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Also covers entities owned by a different tenant; the two cases are
    /// indistinguishable on purpose.
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },
    /// Carries one entry per asset that failed the availability check,
    /// including the reservations it collided with.
    #[error("one or more assets are unavailable over the requested range")]
    Conflict(Vec<AssetAvailability>),
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl EngineError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }
}

impl From<sled::Error> for EngineError {
    fn from(err: sled::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

impl From<minicbor::decode::Error> for EngineError {
    fn from(err: minicbor::decode::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

impl From<minicbor::encode::Error<std::convert::Infallible>> for EngineError {
    fn from(err: minicbor::encode::Error<std::convert::Infallible>) -> Self {
        Self::Persistence(err.to_string())
    }
}
