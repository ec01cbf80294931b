//! # Drill
//!
//! The command-line binary for the drill engine.
//!
//! ## Usage
//!
//! ```bash
//! # Record a finished session and update stages
//! drill record -f session.json
//!
//! # Pick the next ten questions for a learner
//! drill order -d deck.json -l alice -n 10 --level Lv2
//!
//! # Inspect progress
//! drill states -l alice --ids q1,q2,q3
//! drill status --json
//! ```

use clap::Parser;
use drill::cli;
use drill::config::{self, LogFormat};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    let cli = cli::Cli::parse();
    let (config, config_error) = config::resolve(cli.config.as_deref());

    // Initialize tracing. DRILL_LOG_FORMAT=json enables machine-parseable output.
    let default_filter = if cli.verbose {
        "drill=debug,drill_core=debug"
    } else {
        "drill=info,drill_core=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    match config.effective_log_format() {
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

    if let Some(e) = config_error {
        tracing::error!("Config error, using defaults: {}", e);
    }

    if let Err(e) = cli::execute(cli, &config) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}
