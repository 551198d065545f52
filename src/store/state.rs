use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tracing::{debug, error, info};

use crate::core::{CurrencyCode, Quote, QuoteSheet, RateError, RateResult};

/// Point-in-time copy of the cache, detached from the actor.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub base: Option<CurrencyCode>,
    pub last_refresh: Option<DateTime<Utc>>,
    pub rates: HashMap<CurrencyCode, Quote>,
}

/// What the periodic ticker should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshDecision {
    /// Launch a background full fetch.
    FetchAll,
    /// Every quote is recent enough; the cache timestamp is aligned to the oldest one.
    AlignTo(DateTime<Utc>),
}

/// Quote table owned by the cache actor.
#[derive(Debug, Default)]
pub struct RateStore {
    base: Option<CurrencyCode>,
    rates: HashMap<CurrencyCode, Quote>,
    last_refresh: Option<DateTime<Utc>>,
}

impl RateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn base(&self) -> Option<CurrencyCode> {
        self.base
    }

    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        self.last_refresh
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    /// Quote used for conversion. The base currency always quotes at one.
    pub fn quote(&self, code: CurrencyCode) -> Option<Quote> {
        if self.base == Some(code) {
            return Some(Quote::UNIT);
        }
        self.rates.get(&code).copied()
    }

    /// True if `code` has to be fetched before its quote can be trusted.
    pub fn needs_refresh(&self, code: CurrencyCode, now: DateTime<Utc>, limit: Duration) -> bool {
        if self.base == Some(code) {
            return false;
        }
        self.rates
            .get(&code)
            .is_none_or(|quote| quote.is_stale(now, limit))
    }

    /// Replaces the whole table with a freshly fetched sheet.
    ///
    /// Rows for currencies outside `known` and rows repeating the base are
    /// dropped. A sheet whose base differs from the one already cached is
    /// rejected and leaves the table untouched.
    pub fn replace_all(
        &mut self,
        sheet: QuoteSheet,
        known: &[CurrencyCode],
        now: DateTime<Utc>,
    ) -> RateResult<()> {
        let reported = sheet.base.trim().to_uppercase();
        let base: CurrencyCode = reported.parse().map_err(|_| {
            RateError::RefreshFailed(format!("Unsupported base currency {reported}"))
        })?;

        if let Some(cached) = self.base {
            if cached != base {
                error!(
                    %cached,
                    %reported,
                    "Provider base currency changed, refusing to apply rates"
                );
                return Err(RateError::BaseCurrencyChanged {
                    cached: cached.to_string(),
                    reported,
                });
            }
        }

        let mut rates = HashMap::with_capacity(sheet.quotes.len());
        for row in sheet.quotes {
            let code = match row.currency.parse::<CurrencyCode>() {
                Ok(code) if known.contains(&code) && code != base => code,
                _ => {
                    debug!(currency = %row.currency, "Skipping unsupported currency");
                    continue;
                }
            };
            rates.insert(code, Quote::new(row.bid, row.ask, now));
        }

        info!(%base, count = rates.len(), "Replaced rate table");
        self.base = Some(base);
        self.rates = rates;
        self.last_refresh = Some(now);
        Ok(())
    }

    /// Merges one quote; unstamped quotes are stamped with `now`.
    pub fn apply_single(&mut self, code: CurrencyCode, mut quote: Quote, now: DateTime<Utc>) {
        if self.base == Some(code) {
            debug!(%code, "Ignoring quote for base currency");
            return;
        }
        if quote.updated_at.is_none() {
            quote.updated_at = Some(now);
        }
        debug!(%code, bid = quote.bid, ask = quote.ask, "Applied single quote");
        self.rates.insert(code, quote);
        self.last_refresh = Some(now);
    }

    /// Evaluates the periodic refresh policy.
    pub fn refresh_decision(&self, now: DateTime<Utc>, threshold: Duration) -> RefreshDecision {
        let last = match self.last_refresh {
            Some(last) if now.signed_duration_since(last) <= threshold => last,
            _ => return RefreshDecision::FetchAll,
        };

        let mut oldest: Option<DateTime<Utc>> = None;
        for quote in self.rates.values() {
            match quote.updated_at {
                None => return RefreshDecision::FetchAll,
                Some(ts) if now.signed_duration_since(ts) > threshold => {
                    return RefreshDecision::FetchAll;
                }
                Some(ts) => oldest = Some(oldest.map_or(ts, |o| o.min(ts))),
            }
        }
        RefreshDecision::AlignTo(oldest.unwrap_or(last))
    }

    pub fn align_last_refresh(&mut self, ts: DateTime<Utc>) {
        self.last_refresh = Some(ts);
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            base: self.base,
            last_refresh: self.last_refresh,
            rates: self.rates.clone(),
        }
    }
}
