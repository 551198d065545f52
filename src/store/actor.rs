//! The task that owns the rate table.
//!
//! All reads and writes of [`RateStore`] happen inside [`CacheActor::run`];
//! other code talks to it through [`Request`] messages on a bounded mailbox.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};

use super::engine::{self, Conversion, ConversionSource, RefreshPlan};
use super::state::{RateStore, RefreshDecision, Snapshot};
use crate::core::config::CacheConfig;
use crate::core::{CurrencyCode, Quote, QuoteProvider, QuoteSheet, RateError, RateResult};

pub const MAILBOX_CAPACITY: usize = 32;

#[derive(Debug)]
pub enum Request {
    Convert {
        from: CurrencyCode,
        to: CurrencyCode,
        amount: f64,
        respond_to: oneshot::Sender<RateResult<Conversion>>,
    },
    Refresh {
        timeout: Option<Duration>,
        respond_to: oneshot::Sender<RateResult<()>>,
    },
    ApplySingle {
        code: CurrencyCode,
        quote: Quote,
    },
    ApplyFull {
        sheet: QuoteSheet,
    },
    Snapshot {
        respond_to: oneshot::Sender<Snapshot>,
    },
}

pub struct CacheActor {
    store: RateStore,
    provider: Arc<dyn QuoteProvider>,
    known: Vec<CurrencyCode>,
    config: CacheConfig,
    mailbox: mpsc::Receiver<Request>,
    // Weak so that dropping every handle stops the actor.
    mailbox_tx: mpsc::WeakSender<Request>,
}

impl CacheActor {
    pub fn new(
        provider: Arc<dyn QuoteProvider>,
        known: Vec<CurrencyCode>,
        config: CacheConfig,
        mailbox: mpsc::Receiver<Request>,
        mailbox_tx: mpsc::WeakSender<Request>,
    ) -> Self {
        Self {
            store: RateStore::new(),
            provider,
            known,
            config,
            mailbox,
            mailbox_tx,
        }
    }

    pub async fn run(mut self) {
        if let Err(e) = self.refresh(self.config.initial_refresh_timeout()).await {
            warn!(error = %e, "Initial rate refresh failed, serving from an empty cache");
        }

        let period = self.config.refresh_interval();
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                msg = self.mailbox.recv() => {
                    match msg {
                        Some(msg) => self.handle(msg).await,
                        None => break,
                    }
                }
                _ = ticker.tick() => self.on_tick(),
            }
        }
        debug!("Rate cache actor stopped");
    }

    async fn handle(&mut self, msg: Request) {
        match msg {
            Request::Convert {
                from,
                to,
                amount,
                respond_to,
            } => self.convert(from, to, amount, respond_to).await,
            Request::Refresh {
                timeout,
                respond_to,
            } => {
                let result = self.refresh(timeout).await;
                let _ = respond_to.send(result);
            }
            Request::ApplySingle { code, quote } => {
                self.store.apply_single(code, quote, Utc::now());
            }
            Request::ApplyFull { sheet } => {
                if let Err(e) = self.store.replace_all(sheet, &self.known, Utc::now()) {
                    warn!(error = %e, "Discarding background rate update");
                }
            }
            Request::Snapshot { respond_to } => {
                let _ = respond_to.send(self.store.snapshot());
            }
        }
    }

    /// Synchronous full refresh. Blocks the mailbox until the provider answers.
    async fn refresh(&mut self, timeout: Option<Duration>) -> RateResult<()> {
        let sheet = self
            .provider
            .fetch_all(timeout)
            .await
            .map_err(|e| RateError::RefreshFailed(format!("{e:#}")))?;
        self.store.replace_all(sheet, &self.known, Utc::now())
    }

    fn on_tick(&mut self) {
        match self
            .store
            .refresh_decision(Utc::now(), self.config.staleness_threshold())
        {
            RefreshDecision::FetchAll => self.spawn_full_fetch(),
            RefreshDecision::AlignTo(ts) => {
                debug!(oldest = %ts, "Rates are recent, skipping periodic refresh");
                self.store.align_last_refresh(ts);
            }
        }
    }

    async fn convert(
        &mut self,
        from: CurrencyCode,
        to: CurrencyCode,
        amount: f64,
        respond_to: oneshot::Sender<RateResult<Conversion>>,
    ) {
        if !amount.is_finite() || amount < 0.0 {
            let _ = respond_to.send(Err(RateError::InvalidAmount(amount)));
            return;
        }

        let plan = engine::plan_refresh(
            &self.store,
            from,
            to,
            Utc::now(),
            self.config.freshness_threshold(),
        );
        match plan {
            RefreshPlan::Fresh => {}
            RefreshPlan::Single(code) => self.spawn_single_fetch(code),
            RefreshPlan::Full => {
                if let Err(e) = self.refresh(self.config.sync_refresh_timeout()).await {
                    warn!(
                        error = %e,
                        %from,
                        %to,
                        "Refresh before conversion failed, using cached rates"
                    );
                }
            }
        }

        let cached = engine::cross_rate(&self.store, from, to, amount).map(|converted| Conversion {
            from,
            to,
            amount,
            converted,
            source: ConversionSource::CrossRate,
        });

        if from == to || !self.config.direct_convert {
            let _ = respond_to.send(cached.ok_or_else(|| unavailable(from, to)));
            return;
        }

        // The provider call runs off the actor; the cached result is the fallback.
        let provider = Arc::clone(&self.provider);
        let timeout = self.config.direct_convert_timeout();
        tokio::spawn(async move {
            let result = match provider.convert_direct(from, to, amount, timeout).await {
                Ok(converted) if converted.is_finite() && converted >= 0.0 => Ok(Conversion {
                    from,
                    to,
                    amount,
                    converted,
                    source: ConversionSource::Direct,
                }),
                Ok(converted) => {
                    debug!(converted, "Provider returned an unusable amount");
                    cached.ok_or_else(|| unavailable(from, to))
                }
                Err(e) => {
                    debug!(error = %e, "Direct conversion failed, using cross rate");
                    cached.ok_or_else(|| unavailable(from, to))
                }
            };
            let _ = respond_to.send(result);
        });
    }

    fn spawn_single_fetch(&self, code: CurrencyCode) {
        let Some(mailbox) = self.mailbox_tx.upgrade() else {
            return;
        };
        let provider = Arc::clone(&self.provider);
        let timeout = self.config.background_fetch_timeout();
        debug!(%code, "Starting background quote top-up");

        tokio::spawn(async move {
            match provider.fetch_one(code, timeout).await {
                Ok(row) => {
                    let quote = Quote::new(row.bid, row.ask, Utc::now());
                    if mailbox
                        .send(Request::ApplySingle { code, quote })
                        .await
                        .is_err()
                    {
                        debug!(%code, "Cache stopped before quote could be applied");
                    }
                }
                Err(e) => warn!(%code, error = %e, "Background quote fetch failed"),
            }
        });
    }

    fn spawn_full_fetch(&self) {
        let Some(mailbox) = self.mailbox_tx.upgrade() else {
            return;
        };
        let provider = Arc::clone(&self.provider);
        let timeout = self.config.background_fetch_timeout();
        info!("Rates are stale, starting background refresh");

        tokio::spawn(async move {
            match provider.fetch_all(Some(timeout)).await {
                Ok(sheet) => {
                    let _ = mailbox.send(Request::ApplyFull { sheet }).await;
                }
                Err(e) => warn!(error = %e, "Background rate refresh failed"),
            }
        });
    }
}

fn unavailable(from: CurrencyCode, to: CurrencyCode) -> RateError {
    RateError::Unavailable {
        from: from.to_string(),
        to: to.to_string(),
    }
}
