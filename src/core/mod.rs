//! Core abstractions shared by the cache, providers and CLI

pub mod config;
pub mod currency;
pub mod error;
pub mod log;
pub mod quote;

// Re-export main types for cleaner imports
pub use currency::{CurrencyCode, CurrencyRegistry, default_counter};
pub use error::{RateError, RateResult};
pub use quote::{ProviderQuote, Quote, QuoteProvider, QuoteSheet};
