pub mod cli;
pub mod core;
pub mod providers;
pub mod store;

use crate::core::CurrencyRegistry;
use crate::core::config::AppConfig;
use crate::store::RateCache;
use anyhow::Result;
use std::time::Duration;
use tracing::{debug, info};

/// Commands that need the rate cache. `setup` is handled by the binary.
#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    Convert {
        amount: f64,
        from: String,
        to: Vec<String>,
    },
    Rates {
        refresh: bool,
        timeout: Option<Duration>,
    },
    Currencies,
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("exrate starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let registry = CurrencyRegistry::default();
    match command {
        AppCommand::Currencies => {
            cli::currencies::run(&registry);
            Ok(())
        }
        AppCommand::Convert { amount, from, to } => {
            let cache = RateCache::from_config(&config, &registry)?;
            cli::convert::run(&cache, &registry, amount, &from, &to).await
        }
        AppCommand::Rates { refresh, timeout } => {
            let cache = RateCache::from_config(&config, &registry)?;
            cli::rates::run(&cache, &registry, refresh, timeout).await
        }
    }
}
