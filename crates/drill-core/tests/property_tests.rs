//! # Property-Based Tests
//!
//! Determinism and state-machine invariants checked with proptest.

use chrono::Duration;
use drill_core::{
    Attempt, DEFAULT_STAGE_CONFIG, LearnerId, Level, OrderParams, Question, QuestionId,
    QuestionType, SessionRecord, StageState, StageStore, Timestamp, apply_attempt, build_order,
    determine_quota, parse_timestamp,
};
use proptest::collection::vec;
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

fn base_time() -> Timestamp {
    parse_timestamp("2024-01-01T00:00:00Z").expect("base time")
}

fn qid(n: usize) -> QuestionId {
    QuestionId::new(format!("q{}", n)).expect("question id")
}

/// One record per entry, one hour apart; attempts one second apart.
fn build_records(raw: &[(usize, Vec<(usize, bool)>)]) -> Vec<SessionRecord> {
    raw.iter()
        .enumerate()
        .map(|(i, (learner, attempts))| {
            let ended = base_time() + Duration::hours(i as i64);
            let mut record =
                SessionRecord::new(LearnerId::new(&format!("learner{}", learner)), "english", "normal");
            record.ended_at = Some(ended);
            record.attempts = attempts
                .iter()
                .enumerate()
                .map(|(k, (q, correct))| Attempt {
                    question_id: qid(*q),
                    correct: *correct,
                    at: Some(ended + Duration::seconds(k as i64)),
                    mode: "normal".to_string(),
                })
                .collect();
            record
        })
        .collect()
}

fn raw_log() -> impl Strategy<Value = Vec<(usize, Vec<(usize, bool)>)>> {
    vec((0usize..2, vec((0usize..4, any::<bool>()), 0..6)), 1..12)
}

/// `(learner, session hour, [(question, correct, attempt hour)])`.
type CoarseRecord = (usize, Option<i64>, Vec<(usize, bool, Option<i64>)>);

/// Records on a coarse clock: session times collide or are missing, and
/// attempt times may be missing too.
fn coarse_log() -> impl Strategy<Value = Vec<CoarseRecord>> {
    vec(
        (
            0usize..2,
            proptest::option::of(0i64..3),
            vec((0usize..3, any::<bool>(), proptest::option::of(0i64..4)), 0..4),
        ),
        1..10,
    )
}

fn build_coarse_records(raw: &[CoarseRecord]) -> Vec<SessionRecord> {
    raw.iter()
        .map(|(learner, ended_hour, attempts)| {
            let mut record =
                SessionRecord::new(LearnerId::new(&format!("learner{}", learner)), "english", "normal");
            record.ended_at = ended_hour.map(|h| base_time() + Duration::hours(h));
            record.attempts = attempts
                .iter()
                .map(|(q, correct, hour)| Attempt {
                    question_id: qid(*q),
                    correct: *correct,
                    at: hour.map(|h| base_time() + Duration::hours(h)),
                    mode: "normal".to_string(),
                })
                .collect();
            record
        })
        .collect()
}

// =============================================================================
// STAGE STORE
// =============================================================================

proptest! {
    /// Rebuilding from any permutation of the log yields the same store.
    #[test]
    fn rebuild_is_permutation_invariant(
        (raw, order) in raw_log().prop_flat_map(|raw| {
            let indices: Vec<usize> = (0..raw.len()).collect();
            (Just(raw), Just(indices).prop_shuffle())
        })
    ) {
        let records = build_records(&raw);
        let shuffled: Vec<SessionRecord> = order.iter().map(|&i| records[i].clone()).collect();
        let now = base_time() + Duration::days(365);

        prop_assert_eq!(
            StageStore::rebuild(&records, now),
            StageStore::rebuild(&shuffled, now)
        );
    }

    /// Permutation invariance also holds when session times tie or are missing.
    #[test]
    fn rebuild_is_permutation_invariant_with_coarse_times(
        (raw, order) in coarse_log().prop_flat_map(|raw| {
            let indices: Vec<usize> = (0..raw.len()).collect();
            (Just(raw), Just(indices).prop_shuffle())
        })
    ) {
        let records = build_coarse_records(&raw);
        let shuffled: Vec<SessionRecord> = order.iter().map(|&i| records[i].clone()).collect();
        let now = base_time() + Duration::days(365);

        prop_assert_eq!(
            StageStore::rebuild(&records, now),
            StageStore::rebuild(&shuffled, now)
        );
    }

    /// Incremental application in log order equals a full rebuild.
    #[test]
    fn incremental_equals_rebuild(raw in raw_log()) {
        let records = build_records(&raw);
        let mut incremental = StageStore::new();
        for record in &records {
            incremental.apply_session(record);
        }
        let now = base_time() + Duration::days(365);
        prop_assert_eq!(incremental, StageStore::rebuild(&records, now));
    }
}

// =============================================================================
// TRANSITION FUNCTION
// =============================================================================

proptest! {
    /// `correct <= answered`, both non-decreasing, `answered` grows by one.
    #[test]
    fn counters_are_monotonic(steps in vec((any::<bool>(), 0i64..20_000), 1..40)) {
        let mut at = base_time();
        let mut state: Option<StageState> = None;
        for (correct, gap_minutes) in steps {
            at += Duration::minutes(gap_minutes);
            let next = apply_attempt(state.as_ref(), Some(at), correct, &DEFAULT_STAGE_CONFIG)
                .expect("timed attempt changes state");
            prop_assert!(next.correct <= next.answered);
            if let Some(prev) = &state {
                prop_assert_eq!(next.answered, prev.answered + 1);
                prop_assert!(next.correct >= prev.correct);
            }
            state = Some(next);
        }
    }

    /// A wrong answer resets stage, streak and due date from any stage.
    #[test]
    fn wrong_answer_resets_all(stage_index in 0usize..6, streak in 0u32..50, due_days in 0i64..60) {
        let state = StageState {
            stage: DEFAULT_STAGE_CONFIG.sequence[stage_index].to_string(),
            streak,
            answered: streak,
            correct: streak,
            next_due_at: Some(base_time() + Duration::days(due_days)),
            ..StageState::new(&DEFAULT_STAGE_CONFIG)
        };
        let next = apply_attempt(Some(&state), Some(base_time()), false, &DEFAULT_STAGE_CONFIG)
            .expect("changed");
        prop_assert_eq!(next.stage.as_str(), DEFAULT_STAGE_CONFIG.reset_stage);
        prop_assert_eq!(next.streak, 0);
        prop_assert!(next.next_due_at.is_none());
    }

    /// Gap stages promote exactly when the required gap has elapsed.
    #[test]
    fn promotion_is_gated_by_gap(stage_index in 1usize..5, elapsed_hours in 0i64..(24 * 20)) {
        let stage = DEFAULT_STAGE_CONFIG.sequence[stage_index];
        let state = StageState {
            stage: stage.to_string(),
            last_correct_at: Some(base_time()),
            ..StageState::new(&DEFAULT_STAGE_CONFIG)
        };
        let at = base_time() + Duration::hours(elapsed_hours);
        let next = apply_attempt(Some(&state), Some(at), true, &DEFAULT_STAGE_CONFIG)
            .expect("changed");

        let required = DEFAULT_STAGE_CONFIG
            .required_gap_seconds(stage)
            .expect("gap stage");
        let expected = if elapsed_hours * 3600 >= required {
            DEFAULT_STAGE_CONFIG.sequence[stage_index + 1]
        } else {
            stage
        };
        prop_assert_eq!(next.stage.as_str(), expected);
    }
}

// =============================================================================
// ORDER BUILDER
// =============================================================================

fn deck_and_stats(
    raw: &[(usize, Option<usize>)],
) -> (Vec<Question>, BTreeMap<QuestionId, StageState>) {
    let mut deck = Vec::new();
    let mut stats = BTreeMap::new();
    for (i, (level, stage)) in raw.iter().enumerate() {
        deck.push(Question::new(qid(i), QuestionType::Reorder, Level::ALL[*level], ""));
        if let Some(stage) = stage {
            stats.insert(
                qid(i),
                StageState {
                    stage: DEFAULT_STAGE_CONFIG.sequence[*stage].to_string(),
                    next_due_at: Some(base_time() + Duration::days(i as i64 % 3 - 1)),
                    ..StageState::new(&DEFAULT_STAGE_CONFIG)
                },
            );
        }
    }
    (deck, stats)
}

proptest! {
    /// The quota law holds for all inputs.
    #[test]
    fn quota_law(desired in 0usize..100, stage_f in 0usize..100) {
        prop_assert_eq!(determine_quota(desired, stage_f), desired - stage_f.min(desired));
    }

    /// Output length is `min(desired, working set + admitted extras)` with
    /// no repeated deck position.
    #[test]
    fn output_is_bounded_and_unique(
        raw in vec((0usize..3, proptest::option::of(0usize..6)), 0..30),
        desired in 0usize..20,
        ceiling in 0usize..3,
    ) {
        let (deck, stats) = deck_and_stats(&raw);
        let ceiling = Level::ALL[ceiling];
        let params = OrderParams::new(desired, ceiling, base_time());
        let result = build_order(&deck, &stats, &params, &DEFAULT_STAGE_CONFIG);

        let working: Vec<&Question> = deck.iter().filter(|q| q.level <= ceiling).collect();
        let above = deck.len() - working.len();
        let stage_f = working
            .iter()
            .filter(|q| stats.get(&q.id).is_none_or(|s| s.stage == "F"))
            .count();
        let admitted = determine_quota(desired, stage_f).min(above);

        prop_assert_eq!(result.fallback_extra_ids.len(), admitted);
        prop_assert_eq!(result.len(), desired.min(working.len() + admitted));

        let positions: BTreeSet<usize> = result.entries.iter().map(|e| e.deck_index).collect();
        prop_assert_eq!(positions.len(), result.len());
    }
}
