//! # Drill CLI Module
//!
//! This module implements the CLI interface for Drill.
//!
//! ## Available Commands
//!
//! - `record` - Append a session record and update stages
//! - `rebuild` - Rebuild the stage store from the results log
//! - `state` - Show one question's stage stats
//! - `states` - Show stage stats for several questions
//! - `order` - Build a session order from a deck
//! - `config` - Show the subject's stage configuration
//! - `reset` - Remove stage progress (admin)
//! - `level` - Show or change a question's level override (admin)
//! - `status` - Show store counts and stage histogram

mod commands;

use crate::config::AppConfig;
use clap::{Parser, Subcommand};
use drill_core::DrillError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Drill - adaptive question ordering for drill practice
///
/// Tracks per-learner mastery stages from the session log and decides which
/// questions come next.
#[derive(Parser, Debug)]
#[command(name = "drill")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to a TOML config file (falls back to DRILL_CONFIG_PATH)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Root data directory (overrides `data_dir` from the config)
    #[arg(short = 'D', long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Subject key (overrides `default_subject` from the config)
    #[arg(short, long, global = true)]
    pub subject: Option<String>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress normal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable debug logging (unless RUST_LOG is set)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Append a session record (JSON object or array) and apply it
    Record {
        /// Path to the session record file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Rebuild the stage store from the results log
    Rebuild,

    /// Show one question's stage stats
    State {
        #[arg(short, long)]
        learner: String,

        /// Question id
        #[arg(short, long)]
        id: String,
    },

    /// Show stage stats for several questions, in the given order
    States {
        #[arg(short, long)]
        learner: String,

        /// Comma-separated question ids
        #[arg(long)]
        ids: String,
    },

    /// Build the question order for a session
    Order {
        /// Path to the deck file
        #[arg(short, long)]
        deck: PathBuf,

        #[arg(short, long)]
        learner: String,

        /// Number of questions (defaults to `session.count`)
        #[arg(short = 'n', long)]
        count: Option<usize>,

        /// Level ceiling, e.g. Lv2 (defaults to `session.level`)
        #[arg(long)]
        level: Option<String>,

        /// Only questions of this unit (normal mode)
        #[arg(short, long)]
        unit: Option<String>,

        /// Drill mode (normal, review, math-drill)
        #[arg(short, long, default_value = "normal")]
        mode: String,

        /// Evaluate due dates at this time instead of now (RFC 3339)
        #[arg(long)]
        now: Option<String>,
    },

    /// Show the subject's stage configuration
    Config,

    /// Remove stage progress for a learner or one question
    Reset {
        #[arg(short, long)]
        learner: String,

        /// Only this question id
        #[arg(short, long)]
        id: Option<String>,
    },

    /// Show or change a question's level override
    Level {
        /// Question id
        #[arg(short, long)]
        id: String,

        /// New level (Lv1, Lv2, Lv3)
        #[arg(long, conflicts_with = "clear")]
        set: Option<String>,

        /// Remove the override
        #[arg(long)]
        clear: bool,
    },

    /// Show store counts and the stage histogram
    Status,
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments and the loaded configuration.
pub fn execute(cli: Cli, config: &AppConfig) -> Result<(), DrillError> {
    let ctx = Context::new(&cli, config);

    let output = match cli.command {
        Some(Commands::Record { file }) => cmd_record(&ctx, &file)?,
        Some(Commands::Rebuild) => cmd_rebuild(&ctx)?,
        Some(Commands::State { learner, id }) => cmd_state(&ctx, &learner, &id)?,
        Some(Commands::States { learner, ids }) => cmd_states(&ctx, &learner, &ids)?,
        Some(Commands::Order {
            deck,
            learner,
            count,
            level,
            unit,
            mode,
            now,
        }) => cmd_order(
            &ctx,
            &OrderArgs {
                deck,
                learner,
                count,
                level,
                unit,
                mode,
                now,
            },
        )?,
        Some(Commands::Config) => cmd_config(&ctx)?,
        Some(Commands::Reset { learner, id }) => cmd_reset(&ctx, &learner, id.as_deref())?,
        Some(Commands::Level { id, set, clear }) => cmd_level(&ctx, &id, set.as_deref(), clear)?,
        Some(Commands::Status) | None => {
            // No subcommand - show status by default
            cmd_status(&ctx)?
        }
    };

    if !cli.quiet {
        output.print(ctx.json);
    }
    Ok(())
}
