//! Quote types and the upstream quoting abstraction

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration as AgeLimit, Utc};
use std::time::Duration;

use super::currency::CurrencyCode;

/// Two-sided rate of one currency against the base currency.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quote {
    /// Base currency paid per unit when the holder sells this currency.
    pub bid: f64,
    /// Base currency charged per unit when the holder buys this currency.
    pub ask: f64,
    /// `None` until the quote has been fetched.
    pub updated_at: Option<DateTime<Utc>>,
}

impl Quote {
    /// Implicit quote of the base currency against itself.
    pub const UNIT: Quote = Quote {
        bid: 1.0,
        ask: 1.0,
        updated_at: None,
    };

    pub fn new(bid: f64, ask: f64, updated_at: DateTime<Utc>) -> Self {
        Self {
            bid,
            ask,
            updated_at: Some(updated_at),
        }
    }

    pub fn age(&self, now: DateTime<Utc>) -> Option<AgeLimit> {
        self.updated_at.map(|ts| now.signed_duration_since(ts))
    }

    /// True when the quote was never fetched or is older than `limit`.
    pub fn is_stale(&self, now: DateTime<Utc>, limit: AgeLimit) -> bool {
        self.age(now).is_none_or(|age| age > limit)
    }
}

/// One row of a provider response.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderQuote {
    pub currency: String,
    pub bid: f64,
    pub ask: f64,
}

/// Full quote list as reported by the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteSheet {
    pub base: String,
    pub quotes: Vec<ProviderQuote>,
}

/// Upstream quoting service. Every call is independent and safe to retry.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    async fn fetch_all(&self, timeout: Option<Duration>) -> Result<QuoteSheet>;

    async fn fetch_one(&self, code: CurrencyCode, timeout: Duration) -> Result<ProviderQuote>;

    async fn convert_direct(
        &self,
        from: CurrencyCode,
        to: CurrencyCode,
        amount: f64,
        timeout: Duration,
    ) -> Result<f64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unfetched_quote_is_stale() {
        let quote = Quote {
            bid: 2.7,
            ask: 2.75,
            updated_at: None,
        };
        assert!(quote.is_stale(Utc::now(), AgeLimit::hours(1)));
        assert!(quote.age(Utc::now()).is_none());
    }

    #[test]
    fn test_quote_staleness_by_age() {
        let now = Utc::now();
        let fresh = Quote::new(2.7, 2.75, now - AgeLimit::minutes(30));
        let old = Quote::new(2.7, 2.75, now - AgeLimit::minutes(90));
        assert!(!fresh.is_stale(now, AgeLimit::hours(1)));
        assert!(old.is_stale(now, AgeLimit::hours(1)));
    }
}
