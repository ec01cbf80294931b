//! # Stage Configuration
//!
//! Static, subject-scoped stage graphs.
//!
//! | Config  | Sequence      | Default / Reset | Promotion out of the lowest stage |
//! |---------|---------------|-----------------|-----------------------------------|
//! | default | F E D C B A   | F / F           | streak of 3                       |
//! | math    | E D C B A     | E / E           | any correct answer                |
//!
//! Gap requirements (days) for the remaining stages:
//!
//! | From | default | math |
//! |------|---------|------|
//! | E    | 2       | -    |
//! | D    | 3       | 3    |
//! | C    | 7       | 7    |
//! | B    | 14      | 30   |
//!
//! Configurations are data, selected by key lookup; they are never mutated
//! at runtime.

use crate::primitives::{DEFAULT_SUBJECT, MATH_DRILL_MODE, MATH_SUBJECT, SECONDS_PER_DAY};
use crate::timestamp::Timestamp;
use chrono::Duration;
use serde::Serialize;

// =============================================================================
// RULES
// =============================================================================

/// Promotion rule for one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageRule {
    /// Stage reached on promotion. `None` marks the terminal stage.
    pub next: Option<&'static str>,
    /// Days that must elapse since the previous correct answer.
    pub required_gap_days: Option<u32>,
    /// Consecutive correct answers required instead of elapsed time.
    pub min_streak: Option<u32>,
}

impl StageRule {
    const fn gap(next: &'static str, days: u32) -> Self {
        Self {
            next: Some(next),
            required_gap_days: Some(days),
            min_streak: None,
        }
    }

    const fn terminal() -> Self {
        Self {
            next: None,
            required_gap_days: None,
            min_streak: None,
        }
    }
}

/// An ordered stage sequence with its promotion rules.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageConfig {
    pub name: &'static str,
    /// Earliest = least mastered.
    pub sequence: &'static [&'static str],
    pub default_stage: &'static str,
    /// Stage assigned on a wrong answer.
    pub reset_stage: &'static str,
    pub rules: &'static [(&'static str, StageRule)],
}

// =============================================================================
// BUILT-IN CONFIGURATIONS
// =============================================================================

/// The 6-stage configuration used by every subject without an override.
pub static DEFAULT_STAGE_CONFIG: StageConfig = StageConfig {
    name: "default",
    sequence: &["F", "E", "D", "C", "B", "A"],
    default_stage: "F",
    reset_stage: "F",
    rules: &[
        (
            "F",
            StageRule {
                next: Some("E"),
                required_gap_days: None,
                min_streak: Some(3),
            },
        ),
        ("E", StageRule::gap("D", 2)),
        ("D", StageRule::gap("C", 3)),
        ("C", StageRule::gap("B", 7)),
        ("B", StageRule::gap("A", 14)),
        ("A", StageRule::terminal()),
    ],
};

/// The 5-stage configuration used by math drills.
pub static MATH_STAGE_CONFIG: StageConfig = StageConfig {
    name: "math",
    sequence: &["E", "D", "C", "B", "A"],
    default_stage: "E",
    reset_stage: "E",
    rules: &[
        (
            "E",
            StageRule {
                next: Some("D"),
                required_gap_days: None,
                min_streak: None,
            },
        ),
        ("D", StageRule::gap("C", 3)),
        ("C", StageRule::gap("B", 7)),
        ("B", StageRule::gap("A", 30)),
        ("A", StageRule::terminal()),
    ],
};

// =============================================================================
// LOOKUPS
// =============================================================================

impl StageConfig {
    /// Rule entry for a stage, if the stage belongs to this configuration.
    #[must_use]
    pub fn rule(&self, stage: &str) -> Option<&StageRule> {
        self.rules
            .iter()
            .find(|(name, _)| *name == stage)
            .map(|(_, rule)| rule)
    }

    /// Whether `stage` is a member of the sequence.
    #[must_use]
    pub fn contains(&self, stage: &str) -> bool {
        self.sequence.contains(&stage)
    }

    /// Clamp a stored stage label onto this configuration.
    ///
    /// Labels are compared trimmed and upper-cased. Unknown or empty labels
    /// resolve to the default stage.
    #[must_use]
    pub fn normalize_stage(&self, stage: &str) -> &'static str {
        let wanted = stage.trim().to_ascii_uppercase();
        self.sequence
            .iter()
            .copied()
            .find(|s| *s == wanted)
            .unwrap_or(self.default_stage)
    }

    /// Position in the sequence; 0 is the least mastered stage.
    /// Unknown stages rank after every known stage.
    #[must_use]
    pub fn rank(&self, stage: &str) -> usize {
        self.sequence
            .iter()
            .position(|s| *s == stage)
            .unwrap_or(self.sequence.len())
    }

    /// The stage without a successor.
    #[must_use]
    pub fn terminal_stage(&self) -> &'static str {
        self.rules
            .iter()
            .find(|(_, rule)| rule.next.is_none())
            .map(|(name, _)| *name)
            .unwrap_or(self.default_stage)
    }

    #[must_use]
    pub fn is_terminal(&self, stage: &str) -> bool {
        self.rule(stage).is_some_and(|rule| rule.next.is_none())
    }

    /// Required gap in whole seconds, if the stage has a non-zero gap rule.
    #[must_use]
    pub fn required_gap_seconds(&self, stage: &str) -> Option<i64> {
        self.rule(stage)
            .and_then(|rule| rule.required_gap_days)
            .filter(|days| *days > 0)
            .map(|days| i64::from(days).saturating_mul(SECONDS_PER_DAY))
    }

    /// Due date for a question that has just reached `stage` at `reference`.
    ///
    /// `None` when the stage has no gap requirement (lowest or terminal stage).
    #[must_use]
    pub fn next_due(&self, stage: &str, reference: Timestamp) -> Option<Timestamp> {
        let gap = self.required_gap_seconds(stage)?;
        reference.checked_add_signed(Duration::seconds(gap))
    }
}

// =============================================================================
// SELECTION
// =============================================================================

/// Normalize a subject key: lower-case, keep `[a-z0-9_-]`, empty → default subject.
#[must_use]
pub fn normalize_subject(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    if cleaned.is_empty() {
        DEFAULT_SUBJECT.to_string()
    } else {
        cleaned
    }
}

/// Stage configuration for a subject. Unknown subjects get the default config.
#[must_use]
pub fn get_stage_config(subject: &str) -> &'static StageConfig {
    match normalize_subject(subject).as_str() {
        MATH_SUBJECT => &MATH_STAGE_CONFIG,
        _ => &DEFAULT_STAGE_CONFIG,
    }
}

/// Stage configuration for a session record.
///
/// The subject decides first; a record that falls back to the default config
/// but declares the math drill mode uses the math config.
#[must_use]
pub fn config_for_record(subject: &str, mode: &str) -> &'static StageConfig {
    let config = get_stage_config(subject);
    if std::ptr::eq(config, &DEFAULT_STAGE_CONFIG)
        && mode.trim().eq_ignore_ascii_case(MATH_DRILL_MODE)
    {
        return &MATH_STAGE_CONFIG;
    }
    config
}

// =============================================================================
// TESTS
// =============================================================================
