mod commands;
mod config;
mod error;
mod fulfillment;
mod output;
mod services;

use std::panic;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use crate::commands::Commands;
use crate::config::DemoConfig;
use crate::error::CliError;

#[derive(Parser)]
#[command(name = "saga-demo")]
#[command(bin_name = "saga-demo")]
#[command(about = "Run order-fulfilment sagas against simulated services", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file (default: ./saga-demo.toml if present)
    #[arg(long = "config", short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(long = "verbose", short = 'v', action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Seed for the simulated services, overriding the configuration file
    #[arg(long = "seed", global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    install_panic_hook();

    let config = match DemoConfig::load(cli.config.as_deref()) {
        Ok(config) => config.with_seed(cli.seed),
        Err(e) => {
            print_error(&e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command.execute(&config) {
        Ok(code) => code,
        Err(e) => {
            print_error(&e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = if verbose == 0 {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
    } else {
        EnvFilter::new(default_level)
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Report panics through `tracing`.
///
/// Step panics are caught by the executor and show up in the saga report, so the
/// default hook's crash banner would only be noise on stderr.
fn install_panic_hook() {
    panic::set_hook(Box::new(|info| {
        let payload = info.payload();
        let message = payload
            .downcast_ref::<&str>()
            .map(|message| (*message).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        let location = info
            .location()
            .map(ToString::to_string)
            .unwrap_or_default();
        warn!(%message, %location, "panic raised");
    }));
}

fn print_error(error: &CliError) {
    eprintln!("error: {error}");

    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        eprintln!("caused by: {cause}");
        source = std::error::Error::source(cause);
    }
}
