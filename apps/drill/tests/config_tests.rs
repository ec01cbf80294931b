//! Tests for TOML configuration loading and CLI argument parsing.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use clap::Parser;
use drill::cli::{Cli, Commands};
use drill::config::{AppConfig, LogFormat, resolve};
use drill_core::{Level, StoreFormat};
use std::path::PathBuf;

// =============================================================================
// APP CONFIG
// =============================================================================

#[test]
fn test_empty_document_is_default() {
    let config = AppConfig::from_toml_str("").unwrap();
    assert_eq!(config, AppConfig::default());
    assert_eq!(config.data_dir, PathBuf::from("data"));
    assert_eq!(config.default_subject, "english");
    assert_eq!(config.session.count, 10);
    assert_eq!(config.session.level, Level::Lv1);
}

#[test]
fn test_full_document() {
    let config = AppConfig::from_toml_str(
        r#"
data_dir = "/var/lib/drill"
default_subject = "math"
log_format = "json"
store_format = "binary"

[session]
count = 25
level = "Lv3"
"#,
    )
    .unwrap();

    assert_eq!(config.data_dir, PathBuf::from("/var/lib/drill"));
    assert_eq!(config.default_subject, "math");
    assert_eq!(config.log_format, LogFormat::Json);
    assert_eq!(config.store_format, StoreFormat::Binary);
    assert_eq!(config.session.count, 25);
    assert_eq!(config.session.level, Level::Lv3);
}

#[test]
fn test_partial_session_table_keeps_defaults() {
    let config = AppConfig::from_toml_str("[session]\ncount = 5\n").unwrap();
    assert_eq!(config.session.count, 5);
    assert_eq!(config.session.level, Level::Lv1);
    assert_eq!(config.store_format, StoreFormat::Json);
}

#[test]
fn test_invalid_document_is_error() {
    assert!(AppConfig::from_toml_str("data_dir = [").is_err());
    assert!(AppConfig::from_toml_str("store_format = \"yaml\"").is_err());
}

#[test]
fn test_load_missing_file_is_default() {
    let dir = tempfile::tempdir().unwrap();
    let config = AppConfig::load(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(config, AppConfig::default());
}

#[test]
fn test_load_reads_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("drill.toml");
    std::fs::write(&path, "default_subject = \"french\"\n").unwrap();

    let config = AppConfig::load(&path).unwrap();
    assert_eq!(config.default_subject, "french");
}

#[test]
fn test_resolve_reports_broken_file_and_falls_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("drill.toml");
    std::fs::write(&path, "this is not toml = = =").unwrap();

    let (config, error) = resolve(Some(&path));
    assert_eq!(config, AppConfig::default());
    assert!(error.is_some());
}

#[test]
fn test_log_format_parse_is_lenient() {
    assert_eq!(LogFormat::parse("JSON"), LogFormat::Json);
    assert_eq!(LogFormat::parse(" json "), LogFormat::Json);
    assert_eq!(LogFormat::parse("xml"), LogFormat::Text);
    assert_eq!(LogFormat::parse(""), LogFormat::Text);
}

// =============================================================================
// CLI PARSING
// =============================================================================

#[test]
fn test_no_subcommand_parses() {
    let cli = Cli::try_parse_from(["drill"]).unwrap();
    assert!(cli.command.is_none());
    assert!(!cli.json);
}

#[test]
fn test_order_arguments() {
    let cli = Cli::try_parse_from([
        "drill", "--json", "-s", "math", "order", "-d", "deck.json", "-l", "amy", "-n", "5",
    ])
    .unwrap();

    assert!(cli.json);
    assert_eq!(cli.subject.as_deref(), Some("math"));
    match cli.command {
        Some(Commands::Order {
            deck,
            learner,
            count,
            level,
            mode,
            ..
        }) => {
            assert_eq!(deck, PathBuf::from("deck.json"));
            assert_eq!(learner, "amy");
            assert_eq!(count, Some(5));
            assert!(level.is_none());
            assert_eq!(mode, "normal");
        }
        other => panic!("unexpected command: {:?}", other),
    }
}

#[test]
fn test_global_flags_after_subcommand() {
    let cli = Cli::try_parse_from(["drill", "status", "--json", "-D", "/tmp/drill"]).unwrap();
    assert!(cli.json);
    assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/drill")));
}

#[test]
fn test_level_set_conflicts_with_clear() {
    let result = Cli::try_parse_from(["drill", "level", "-i", "q1", "--set", "Lv2", "--clear"]);
    assert!(result.is_err());
}

#[test]
fn test_record_requires_file() {
    assert!(Cli::try_parse_from(["drill", "record"]).is_err());
}
