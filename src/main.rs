use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use exrate::core::config::optional_secs;
use exrate::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for exrate::AppCommand {
    fn from(cmd: Commands) -> exrate::AppCommand {
        match cmd {
            Commands::Convert { amount, from, to } => {
                exrate::AppCommand::Convert { amount, from, to }
            }
            Commands::Rates { refresh, timeout } => exrate::AppCommand::Rates {
                refresh,
                timeout: optional_secs(timeout),
            },
            Commands::Currencies => exrate::AppCommand::Currencies,
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Convert an amount between currencies, e.g. `convert 100 $ р`
    Convert {
        amount: f64,
        /// Currency held: a code, symbol or alias
        from: String,
        /// Currencies wanted; defaults to the usual counter-currency
        to: Vec<String>,
    },
    /// Display cached exchange rates
    Rates {
        /// Force a full refresh before printing
        #[arg(long)]
        refresh: bool,
        /// Refresh timeout in seconds, 0 waits indefinitely
        #[arg(long, default_value_t = 0)]
        timeout: u64,
    },
    /// List supported currencies and their aliases
    Currencies,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => exrate::cli::setup::setup(),
        Some(cmd) => exrate::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
