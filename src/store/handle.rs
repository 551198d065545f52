use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use super::actor::{CacheActor, MAILBOX_CAPACITY, Request};
use super::engine::Conversion;
use super::state::Snapshot;
use crate::core::config::{AppConfig, CacheConfig};
use crate::core::{CurrencyCode, CurrencyRegistry, Quote, QuoteProvider, RateError, RateResult};
use crate::core::{config::API_KEY_ENV, default_counter};
use crate::providers::TbcProvider;

/// Cloneable entry point to the rate cache.
///
/// A disabled cache (no API key) answers every conversion with
/// [`RateError::Unavailable`] and never touches the network.
#[derive(Clone, Debug)]
pub struct RateCache {
    mailbox: Option<mpsc::Sender<Request>>,
}

impl RateCache {
    /// Starts the cache actor on the current tokio runtime.
    pub fn spawn(
        provider: Arc<dyn QuoteProvider>,
        registry: &CurrencyRegistry,
        config: CacheConfig,
    ) -> Self {
        if let Err(e) = config.validate() {
            warn!(error = %e, "Cache config out of range, using the nearest usable values");
        }
        let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
        let actor = CacheActor::new(
            provider,
            registry.codes().collect(),
            config,
            rx,
            tx.downgrade(),
        );
        tokio::spawn(actor.run());
        Self { mailbox: Some(tx) }
    }

    pub fn disabled() -> Self {
        Self { mailbox: None }
    }

    pub fn from_config(config: &AppConfig, registry: &CurrencyRegistry) -> Result<Self> {
        Self::with_api_key(config.provider.resolve_api_key(), config, registry)
    }

    pub fn with_api_key(
        api_key: Option<String>,
        config: &AppConfig,
        registry: &CurrencyRegistry,
    ) -> Result<Self> {
        let Some(api_key) = api_key else {
            warn!(
                "Missing TBC API key. Set {} or provider.api_key; create a developer account at https://developers.tbcbank.ge/docs/create-developer-account",
                API_KEY_ENV
            );
            return Ok(Self::disabled());
        };

        let provider = TbcProvider::new(&config.provider.base_url, &api_key)?;
        info!(base_url = %config.provider.base_url, "Starting rate cache");
        Ok(Self::spawn(Arc::new(provider), registry, config.cache.clone()))
    }

    pub fn is_enabled(&self) -> bool {
        self.mailbox.is_some()
    }

    /// Converts `amount` of `from` into `to`, or into the default counter-currency.
    pub async fn compute_counter_amount(
        &self,
        from: CurrencyCode,
        to: Option<CurrencyCode>,
        amount: f64,
    ) -> RateResult<Conversion> {
        let to = to.unwrap_or_else(|| default_counter(from));
        let Some(mailbox) = &self.mailbox else {
            return Err(RateError::Unavailable {
                from: from.to_string(),
                to: to.to_string(),
            });
        };

        let (respond_to, response) = oneshot::channel();
        mailbox
            .send(Request::Convert {
                from,
                to,
                amount,
                respond_to,
            })
            .await
            .map_err(|_| RateError::ActorStopped)?;
        response.await.map_err(|_| RateError::ActorStopped)?
    }

    /// Full refresh bypassing staleness checks. `None` waits indefinitely.
    pub async fn force_refresh(&self, timeout: Option<Duration>) -> RateResult<()> {
        let mailbox = self.mailbox.as_ref().ok_or(RateError::Disabled)?;
        let (respond_to, response) = oneshot::channel();
        mailbox
            .send(Request::Refresh {
                timeout,
                respond_to,
            })
            .await
            .map_err(|_| RateError::ActorStopped)?;
        response.await.map_err(|_| RateError::ActorStopped)?
    }

    pub async fn snapshot(&self) -> RateResult<Snapshot> {
        let mailbox = self.mailbox.as_ref().ok_or(RateError::Disabled)?;
        let (respond_to, response) = oneshot::channel();
        mailbox
            .send(Request::Snapshot { respond_to })
            .await
            .map_err(|_| RateError::ActorStopped)?;
        response.await.map_err(|_| RateError::ActorStopped)
    }

    /// Merges a single quote without waiting for it to be applied.
    pub async fn apply_quote(&self, code: CurrencyCode, quote: Quote) -> RateResult<()> {
        let mailbox = self.mailbox.as_ref().ok_or(RateError::Disabled)?;
        mailbox
            .send(Request::ApplySingle { code, quote })
            .await
            .map_err(|_| RateError::ActorStopped)
    }
}
