//! # drill
//!
//! Command-line front end for `drill-core`: configuration, logging and the
//! commands that drive the engine against a data directory.

pub mod cli;
pub mod config;
