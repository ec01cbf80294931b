//! # Stage State
//!
//! The mutable per-(learner, question) mastery record.

use crate::stage::config::StageConfig;
use crate::timestamp::Timestamp;
use serde::{Deserialize, Serialize};

/// Mastery record for one question and one learner.
///
/// Invariants (maintained by [`crate::stage::apply_attempt`]):
/// - `correct <= answered`
/// - `streak` counts consecutive correct answers since the last wrong one
/// - a non-null `next_due_at` reflects the current stage's gap
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StageState {
    pub stage: String,
    pub streak: u32,
    pub answered: u32,
    pub correct: u32,
    pub last_correct_at: Option<Timestamp>,
    pub last_wrong_at: Option<Timestamp>,
    pub last_attempt_at: Option<Timestamp>,
    pub next_due_at: Option<Timestamp>,
    pub updated_at: Option<Timestamp>,
}

impl StageState {
    /// Fresh state at the configuration's default stage.
    #[must_use]
    pub fn new(config: &StageConfig) -> Self {
        Self {
            stage: config.default_stage.to_string(),
            ..Self::default()
        }
    }

    /// Lifetime accuracy in whole percent (0 when never answered).
    #[must_use]
    pub fn accuracy_percent(&self) -> u32 {
        if self.answered == 0 {
            return 0;
        }
        let pct = u64::from(self.correct).saturating_mul(100) / u64::from(self.answered);
        pct.min(100) as u32
    }
}

impl Default for StageState {
    /// An empty state with no stage label. Prefer [`StageState::new`].
    fn default() -> Self {
        Self {
            stage: String::new(),
            streak: 0,
            answered: 0,
            correct: 0,
            last_correct_at: None,
            last_wrong_at: None,
            last_attempt_at: None,
            next_due_at: None,
            updated_at: None,
        }
    }
}
