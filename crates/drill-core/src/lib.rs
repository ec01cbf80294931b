//! # drill-core
//!
//! The deterministic drill engine.
//!
//! This crate decides, for every quiz session, how mastered each question is
//! for a learner and which questions to present next.
//!
//! - `stage`: stage configurations, per-question state and the pure
//!   transition function
//! - `store`: the learner -> question -> state map, rebuildable from the log
//! - `ingestor`: the validating parse of raw session records
//! - `order`: the quota-bounded question selection
//!
//! ## Architectural Constraints
//!
//! - The transition function and the order builder are pure: no clock, no
//!   I/O, no randomness. Time is always passed in.
//! - Malformed input degrades to "skip" or "treat as default"; it never
//!   reaches the caller as an error.
//! - A stored store is a cache. Replaying the attempt log is authoritative.
//! - No async, no network dependencies.

// =============================================================================
// MODULES
// =============================================================================

pub mod deck;
pub mod formats;
pub mod ingestor;
pub mod levels;
pub mod order;
pub mod primitives;
pub mod repository;
pub mod stage;
pub mod stats;
pub mod store;
pub mod timestamp;
pub mod tracker;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types
// =============================================================================

pub use timestamp::{Timestamp, format_timestamp, parse_timestamp};
pub use types::{DrillError, DrillMode, LearnerId, Level, Question, QuestionId, QuestionType};

// =============================================================================
// RE-EXPORTS: Stage Engine
// =============================================================================

pub use ingestor::{Attempt, Ingestor, SessionRecord};
pub use stage::{
    DEFAULT_STAGE_CONFIG, MATH_STAGE_CONFIG, StageConfig, StageRule, StageState, apply_attempt,
    config_for_record, get_stage_config, normalize_subject,
};
pub use stats::{QuestionStat, stats_for};
pub use store::StageStore;

// =============================================================================
// RE-EXPORTS: Persistence
// =============================================================================

pub use formats::{StoreFormat, StoreHeader, store_from_bytes, store_to_bytes};
pub use levels::{LEVELS_FILE_NAME, LevelOverrides};
pub use repository::{FileRepository, InMemoryRepository, StageRepository, write_atomic};
pub use tracker::StageTracker;

// =============================================================================
// RE-EXPORTS: Selection
// =============================================================================

pub use deck::{load_deck, parse_deck};
pub use order::{
    Bucket, OrderEntry, OrderParams, OrderResult, build_order, determine_quota, is_promotable,
};
