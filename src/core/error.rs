//! Errors surfaced by the rate cache to its callers.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RateError {
    /// Token matched no alias, pattern or code.
    #[error("Unknown currency: {0}")]
    UnknownCurrency(String),

    /// Amount was negative or not a finite number.
    #[error("Invalid amount: {0}")]
    InvalidAmount(f64),

    /// Neither the provider nor the cached quotes could produce a result.
    #[error("Conversion unavailable from {from} to {to}")]
    Unavailable { from: String, to: String },

    /// No API key is configured so the cache is not running.
    #[error("Rate cache is not initialized")]
    Disabled,

    /// A full refresh could not be completed.
    #[error("Rate refresh failed: {0}")]
    RefreshFailed(String),

    /// The provider reported a different base than the one already cached.
    #[error("Provider base currency changed from {cached} to {reported}")]
    BaseCurrencyChanged { cached: String, reported: String },

    #[error("Rate cache actor has stopped")]
    ActorStopped,
}

pub type RateResult<T> = Result<T, RateError>;
