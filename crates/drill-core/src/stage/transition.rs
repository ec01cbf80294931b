//! # Stage Transition Function
//!
//! `(StageState, attempt time, correct?, StageConfig) -> StageState'`
//!
//! This is the only code path that mutates mastery state. It is pure: no
//! clock, no I/O, no randomness. Replaying the same attempts in the same
//! order always produces the same states.
//!
//! ## Promotion styles
//!
//! - **Streak**: the default stage promotes once `streak >= min_streak`, if
//!   its rule defines a minimum streak.
//! - **Gap**: every other stage promotes when at least `required_gap_days`
//!   have elapsed since the previous correct answer. Without a previous
//!   correct answer the requirement holds only if the gap is zero or absent.
//!
//! A wrong answer always resets to the configuration's reset stage.

use crate::stage::config::StageConfig;
use crate::stage::state::StageState;
use crate::timestamp::Timestamp;

/// Apply one attempt to a state.
///
/// `current` is `None` for a question the learner has never attempted; the
/// configuration's default state is used. Returns `None` (no change) when
/// the attempt has no usable timestamp.
#[must_use]
pub fn apply_attempt(
    current: Option<&StageState>,
    at: Option<Timestamp>,
    correct: bool,
    config: &StageConfig,
) -> Option<StageState> {
    let at = at?;
    let mut state = current.cloned().unwrap_or_else(|| StageState::new(config));

    state.answered = state.answered.saturating_add(1);
    if correct {
        state.correct = state.correct.saturating_add(1);
        apply_correct(&mut state, at, config);
    } else {
        apply_wrong(&mut state, at, config);
    }
    state.last_attempt_at = Some(at);
    state.updated_at = Some(at);

    Some(state)
}

fn apply_correct(state: &mut StageState, at: Timestamp, config: &StageConfig) {
    let previous_correct = state.last_correct_at;
    state.streak = state.streak.saturating_add(1);

    let stage = config.normalize_stage(&state.stage);
    let next_stage = match config.rule(stage) {
        Some(rule) => match (rule.next, rule.min_streak) {
            (Some(next), Some(min_streak)) if stage == config.default_stage => {
                if min_streak > 0 && state.streak >= min_streak {
                    next
                } else {
                    stage
                }
            }
            (Some(next), _) => {
                if gap_satisfied(previous_correct, at, config.required_gap_seconds(stage)) {
                    next
                } else {
                    stage
                }
            }
            (None, _) => stage,
        },
        None => stage,
    };

    let next_stage = if config.contains(next_stage) {
        next_stage
    } else {
        tracing::debug!(
            stage = next_stage,
            config = config.name,
            "promotion target outside sequence, clamping"
        );
        config.default_stage
    };

    state.stage = next_stage.to_string();
    state.last_correct_at = Some(at);
    state.next_due_at = config.next_due(next_stage, at);
}

fn apply_wrong(state: &mut StageState, at: Timestamp, config: &StageConfig) {
    state.stage = config.reset_stage.to_string();
    state.streak = 0;
    state.last_wrong_at = Some(at);
    state.next_due_at = None;
}

/// Whether enough time has passed since the previous correct answer.
fn gap_satisfied(previous: Option<Timestamp>, at: Timestamp, required: Option<i64>) -> bool {
    let Some(required) = required else {
        return true;
    };
    match previous {
        Some(previous) => at.signed_duration_since(previous).num_seconds() >= required,
        None => false,
    }
}

// =============================================================================
// TESTS
// =============================================================================
