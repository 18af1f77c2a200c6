//! Price source error types.

use bridgeledger_common::ConversionError;
use thiserror::Error;

/// Which side of a conversion a price belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PriceSide {
    /// The bridged-in asset being converted.
    Source,
    /// The asset being converted into.
    Target,
}

impl std::fmt::Display for PriceSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PriceSide::Source => write!(f, "source"),
            PriceSide::Target => write!(f, "target"),
        }
    }
}

/// Errors raised by price sources.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PricingError {
    /// No price is currently available for this side.
    #[error("No {0} price available")]
    Unavailable(PriceSide),

    /// The source reported a zero price.
    #[error("Zero {0} price reported")]
    ZeroPrice(PriceSide),

    /// The underlying feed failed.
    #[error("Price provider error: {0}")]
    Provider(String),
}

/// Result type for pricing operations.
pub type PricingResult<T> = Result<T, PricingError>;

impl From<PricingError> for ConversionError {
    fn from(err: PricingError) -> Self {
        ConversionError::PriceUnavailable(err.to_string())
    }
}
