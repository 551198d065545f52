//! Conversion policy evaluated on the cache actor.
//!
//! Everything here is synchronous and reads the store directly; network work
//! is described by the returned plans and carried out by the actor.

use chrono::{DateTime, Duration, Utc};

use super::state::RateStore;
use crate::core::{CurrencyCode, Quote};

/// Where a converted amount came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionSource {
    /// Computed live by the provider's convert endpoint.
    Direct,
    /// Computed from cached bid/ask quotes through the base currency.
    CrossRate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    pub from: CurrencyCode,
    pub to: CurrencyCode,
    pub amount: f64,
    pub converted: f64,
    pub source: ConversionSource,
}

/// Fetch work needed before a conversion can rely on the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPlan {
    Fresh,
    /// Top up one currency in the background.
    Single(CurrencyCode),
    /// Both sides are stale; refresh everything before converting.
    Full,
}

pub fn plan_refresh(
    store: &RateStore,
    from: CurrencyCode,
    to: CurrencyCode,
    now: DateTime<Utc>,
    freshness: Duration,
) -> RefreshPlan {
    if from == to {
        return RefreshPlan::Fresh;
    }
    let stale: Vec<CurrencyCode> = [from, to]
        .into_iter()
        .filter(|code| store.needs_refresh(*code, now, freshness))
        .collect();

    match stale.as_slice() {
        [] => RefreshPlan::Fresh,
        [code] => RefreshPlan::Single(*code),
        _ => RefreshPlan::Full,
    }
}

/// Quote eligible for conversion: the base, or a quote that was actually fetched.
fn usable_quote(store: &RateStore, code: CurrencyCode) -> Option<Quote> {
    if store.base() == Some(code) {
        return Some(Quote::UNIT);
    }
    store.quote(code).filter(|q| q.updated_at.is_some())
}

fn usable_rate(rate: f64) -> Option<f64> {
    (rate.is_finite() && rate > 0.0).then_some(rate)
}

/// Converts through the base currency: sell `from` at its bid, buy `to` at its ask.
pub fn cross_rate(
    store: &RateStore,
    from: CurrencyCode,
    to: CurrencyCode,
    amount: f64,
) -> Option<f64> {
    if from == to {
        return Some(amount);
    }
    let bid = usable_rate(usable_quote(store, from)?.bid)?;
    let ask = usable_rate(usable_quote(store, to)?.ask)?;

    let in_base = amount * bid;
    let converted = in_base / ask;
    converted.is_finite().then_some(converted)
}
