//! # famtree
//!
//! Binary entry point: parse arguments, load configuration, initialize
//! tracing, then run one command.

use clap::Parser;
use famtree::cli::{self, Cli};
use famtree::config::{Config, LOG_FORMAT_ENV, LogFormat};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    init_tracing(&cli, &config);

    if let Err(e) = cli::execute(cli, config) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// `RUST_LOG` wins; otherwise `-v`, `-q`, then the config filter.
/// `FAMTREE_LOG_FORMAT=json` enables machine-parseable output.
fn init_tracing(cli: &Cli, config: &Config) {
    let fallback = if cli.verbose {
        "famtree=debug"
    } else if cli.quiet {
        "famtree=warn"
    } else {
        config.log_filter()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let env_format = std::env::var(LOG_FORMAT_ENV).ok();
    match config.log_format(env_format.as_deref()) {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
