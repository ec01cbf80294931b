//! # Question Stats
//!
//! Dashboard view of a stage state with defaults filled in, so callers get
//! one payload shape for attempted and never-attempted questions alike.

use crate::stage::{StageConfig, StageState};
use crate::store::StageStore;
use crate::timestamp::Timestamp;
use crate::{LearnerId, QuestionId};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionStat {
    pub id: QuestionId,
    pub answered: u32,
    pub correct: u32,
    pub streak: u32,
    pub stage: String,
    pub last_wrong_at: Option<Timestamp>,
    pub last_correct_at: Option<Timestamp>,
    pub next_due_at: Option<Timestamp>,
    /// `false` when the learner never attempted the question.
    pub attempted: bool,
}

impl QuestionStat {
    /// Build the payload; `None` yields zero counters at the default stage.
    #[must_use]
    pub fn from_state(id: QuestionId, state: Option<&StageState>, config: &StageConfig) -> Self {
        match state {
            Some(state) => Self {
                id,
                answered: state.answered,
                correct: state.correct,
                streak: state.streak,
                stage: config.normalize_stage(&state.stage).to_string(),
                last_wrong_at: state.last_wrong_at,
                last_correct_at: state.last_correct_at,
                next_due_at: state.next_due_at,
                attempted: true,
            },
            None => Self {
                id,
                answered: 0,
                correct: 0,
                streak: 0,
                stage: config.default_stage.to_string(),
                last_wrong_at: None,
                last_correct_at: None,
                next_due_at: None,
                attempted: false,
            },
        }
    }
}

/// Payloads for `ids`, in the requested order.
#[must_use]
pub fn stats_for(
    store: &StageStore,
    learner: &LearnerId,
    ids: &[QuestionId],
    config: &StageConfig,
) -> Vec<QuestionStat> {
    ids.iter()
        .map(|id| QuestionStat::from_state(id.clone(), store.get_state(learner, id), config))
        .collect()
}
