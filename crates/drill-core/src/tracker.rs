//! # Stage Tracker
//!
//! A [`StageStore`] bound to a [`StageRepository`].
//!
//! The cached store is the fast path. Rebuilding from the attempt log is the
//! slow, authoritative path and runs lazily:
//!
//! - the repository has nothing persisted yet
//! - the persisted store is unreadable or corrupt
//! - a bulk lookup asks for ids the cached store does not know
//!
//! The log is passed as a closure so it is only read when a rebuild happens.

use crate::ingestor::SessionRecord;
use crate::repository::StageRepository;
use crate::stage::StageState;
use crate::store::StageStore;
use crate::timestamp::Timestamp;
use crate::{DrillError, LearnerId, QuestionId};
use std::collections::{BTreeMap, BTreeSet};

/// Stage store with lazy rebuild and save-on-change persistence.
#[derive(Debug)]
pub struct StageTracker<R: StageRepository> {
    repo: R,
    store: StageStore,
}

impl<R: StageRepository> StageTracker<R> {
    /// Load the cached store, rebuilding from `log` when it is missing or
    /// corrupt. A rebuilt store is saved before returning.
    pub fn load_or_rebuild<F>(repo: R, log: F, now: Timestamp) -> Result<Self, DrillError>
    where
        F: FnOnce() -> Result<Vec<SessionRecord>, DrillError>,
    {
        match repo.load() {
            Ok(Some(store)) => return Ok(Self { repo, store }),
            Ok(None) => tracing::info!("no cached stage store, rebuilding from log"),
            Err(e) => tracing::warn!(error = %e, "cached stage store unreadable, rebuilding from log"),
        }
        let mut tracker = Self {
            repo,
            store: StageStore::new(),
        };
        tracker.rebuild(&log()?, now)?;
        Ok(tracker)
    }

    /// Load the cached store without any rebuild fallback.
    ///
    /// Missing stores start empty; corrupt stores are an error.
    pub fn open(repo: R) -> Result<Self, DrillError> {
        let store = repo.load()?.unwrap_or_default();
        Ok(Self { repo, store })
    }

    /// Apply a new session and persist if anything changed.
    pub fn record_session(&mut self, record: &SessionRecord) -> Result<bool, DrillError> {
        let changed = self.store.apply_session(record);
        if changed {
            self.repo.save(&self.store)?;
        }
        Ok(changed)
    }

    /// Replace the store with a full replay of `records` and persist it.
    pub fn rebuild(&mut self, records: &[SessionRecord], now: Timestamp) -> Result<(), DrillError> {
        self.store = StageStore::rebuild(records, now);
        self.repo.save(&self.store)?;
        tracing::info!(
            records = records.len(),
            learners = self.store.learner_count(),
            states = self.store.state_count(),
            "stage store rebuilt from log"
        );
        Ok(())
    }

    /// Bulk lookup that repairs a stale cache.
    ///
    /// When any requested id is absent from the cached store, the store is
    /// rebuilt once from `log` and the lookup retried. The rebuilt store is
    /// only saved if it differs from the cached one.
    pub fn lookup_or_rebuild<F>(
        &mut self,
        learner: &LearnerId,
        question_ids: &[QuestionId],
        log: F,
        now: Timestamp,
    ) -> Result<BTreeMap<QuestionId, StageState>, DrillError>
    where
        F: FnOnce() -> Result<Vec<SessionRecord>, DrillError>,
    {
        let states = self.store.get_states(learner, question_ids);
        let wanted: BTreeSet<&QuestionId> = question_ids.iter().collect();
        if states.len() >= wanted.len() {
            return Ok(states);
        }

        let rebuilt = StageStore::rebuild(&log()?, now);
        if rebuilt != self.store {
            tracing::info!(
                learner = %learner,
                missing = wanted.len().saturating_sub(states.len()),
                "cached stage store was stale, saving rebuilt store"
            );
            self.store = rebuilt;
            self.repo.save(&self.store)?;
        }
        Ok(self.store.get_states(learner, question_ids))
    }

    /// Remove one state; persists when something was removed.
    pub fn reset_question(
        &mut self,
        learner: &LearnerId,
        question_id: &QuestionId,
    ) -> Result<bool, DrillError> {
        let removed = self.store.reset_question(learner, question_id);
        if removed {
            self.repo.save(&self.store)?;
        }
        Ok(removed)
    }

    /// Remove every state of a learner; persists when something was removed.
    pub fn reset_learner(&mut self, learner: &LearnerId) -> Result<usize, DrillError> {
        let removed = self.store.reset_learner(learner);
        if removed > 0 {
            self.repo.save(&self.store)?;
        }
        Ok(removed)
    }

    #[must_use]
    pub fn store(&self) -> &StageStore {
        &self.store
    }

    #[must_use]
    pub fn repository(&self) -> &R {
        &self.repo
    }
}

// =============================================================================
// TESTS
// =============================================================================
