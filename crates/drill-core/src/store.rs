//! # Stage Store
//!
//! `learner -> question id -> StageState`, rebuilt deterministically from the
//! attempt log.
//!
//! The store is a pure function of the chronologically ordered attempt
//! history: [`StageStore::rebuild`] over a log and incremental
//! [`StageStore::apply_session`] over the same records in the same order
//! produce identical stores.

use crate::ingestor::{Attempt, SessionRecord};
use crate::stage::{StageConfig, StageState, apply_attempt, config_for_record};
use crate::timestamp::Timestamp;
use crate::{LearnerId, QuestionId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-learner mastery states.
///
/// Serialized transparently as the nested map so the persisted JSON is
/// exactly `{ "<learner>": { "<question id>": { ...state } } }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageStore {
    learners: BTreeMap<LearnerId, BTreeMap<QuestionId, StageState>>,
}

impl StageStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // MUTATION
    // =========================================================================

    /// Apply one session record. Returns `true` if any state changed.
    ///
    /// Review records and review attempts are ignored. The stage
    /// configuration is chosen from the record's subject and mode.
    pub fn apply_session(&mut self, record: &SessionRecord) -> bool {
        let attempts = record.scoring_attempts();
        if attempts.is_empty() {
            return false;
        }
        let config = config_for_record(&record.subject, &record.mode);
        let states = self.learners.entry(record.learner.clone()).or_default();

        let mut changed = false;
        for attempt in attempts {
            let current = states.get(&attempt.question_id);
            if let Some(next) = apply_attempt(current, attempt.at, attempt.correct, config) {
                states.insert(attempt.question_id.clone(), next);
                changed = true;
            }
        }

        if states.is_empty() {
            self.learners.remove(&record.learner);
        }
        changed
    }

    /// Replay every record into a fresh store.
    ///
    /// Records are sorted by their effective time (`endedAt`, else
    /// `receivedAt`); records without a parsable time sort as `now`. Ties
    /// are broken by the earliest attempt time and then by record content,
    /// so the result does not depend on log order.
    #[must_use]
    pub fn rebuild(records: &[SessionRecord], now: Timestamp) -> Self {
        let mut ordered: Vec<&SessionRecord> = records.iter().collect();
        ordered.sort_by(|a, b| replay_key(a, now).cmp(&replay_key(b, now)));

        let mut store = Self::new();
        for record in ordered {
            store.apply_session(record);
        }
        tracing::debug!(
            records = records.len(),
            learners = store.learner_count(),
            states = store.state_count(),
            "stage store rebuilt"
        );
        store
    }

    /// Remove one question's state. Returns `true` if it existed.
    pub fn reset_question(&mut self, learner: &LearnerId, question_id: &QuestionId) -> bool {
        let Some(states) = self.learners.get_mut(learner) else {
            return false;
        };
        let removed = states.remove(question_id).is_some();
        if states.is_empty() {
            self.learners.remove(learner);
        }
        removed
    }

    /// Remove every state for a learner. Returns the number removed.
    pub fn reset_learner(&mut self, learner: &LearnerId) -> usize {
        self.learners.remove(learner).map_or(0, |states| states.len())
    }

    // =========================================================================
    // LOOKUP
    // =========================================================================

    /// One state, or `None` when the learner never attempted the question.
    #[must_use]
    pub fn get_state(&self, learner: &LearnerId, question_id: &QuestionId) -> Option<&StageState> {
        self.learners.get(learner)?.get(question_id)
    }

    /// States for the requested ids. Only ids with a state are returned.
    #[must_use]
    pub fn get_states(
        &self,
        learner: &LearnerId,
        question_ids: &[QuestionId],
    ) -> BTreeMap<QuestionId, StageState> {
        let Some(states) = self.learners.get(learner) else {
            return BTreeMap::new();
        };
        question_ids
            .iter()
            .filter_map(|id| states.get(id).map(|state| (id.clone(), state.clone())))
            .collect()
    }

    /// Every state held for a learner.
    #[must_use]
    pub fn learner_states(&self, learner: &LearnerId) -> Option<&BTreeMap<QuestionId, StageState>> {
        self.learners.get(learner)
    }

    pub fn learners(&self) -> impl Iterator<Item = &LearnerId> {
        self.learners.keys()
    }

    #[must_use]
    pub fn learner_count(&self) -> usize {
        self.learners.len()
    }

    #[must_use]
    pub fn state_count(&self) -> usize {
        self.learners.values().map(BTreeMap::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.learners.is_empty()
    }

    /// Count of states per stage, with stored labels clamped onto `config`.
    #[must_use]
    pub fn stage_histogram(&self, config: &StageConfig) -> BTreeMap<&'static str, usize> {
        let mut histogram: BTreeMap<&'static str, usize> =
            config.sequence.iter().map(|stage| (*stage, 0)).collect();
        for state in self.learners.values().flat_map(BTreeMap::values) {
            *histogram.entry(config.normalize_stage(&state.stage)).or_insert(0) += 1;
        }
        histogram
    }
}

/// Total replay order: records with equal keys are identical.
fn replay_key(
    record: &SessionRecord,
    now: Timestamp,
) -> (Timestamp, Option<Timestamp>, &LearnerId, &str, &str, &[Attempt]) {
    (
        record.ended_at.unwrap_or(now),
        record.attempts.iter().filter_map(|a| a.at).min(),
        &record.learner,
        record.subject.as_str(),
        record.mode.as_str(),
        record.attempts.as_slice(),
    )
}

// =============================================================================
// TESTS
// =============================================================================
