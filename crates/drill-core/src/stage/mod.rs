//! # Stage Module
//!
//! The per-question mastery state machine.
//!
//! - [`config`]: static stage graphs, selected by subject or record mode
//! - [`state`]: the per-(learner, question) record
//! - [`transition`]: the pure transition function that drives all mutation

pub mod config;
pub mod state;
pub mod transition;

pub use config::{
    DEFAULT_STAGE_CONFIG, MATH_STAGE_CONFIG, StageConfig, StageRule, config_for_record,
    get_stage_config, normalize_subject,
};
pub use state::StageState;
pub use transition::apply_attempt;
