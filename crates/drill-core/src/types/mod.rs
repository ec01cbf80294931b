//! # Core Type Definitions
//!
//! This module contains the shared types of the drill engine:
//! - Normalized identifiers (`LearnerId`, `QuestionId`)
//! - Question content (`Question`, `QuestionType`, `Level`)
//! - Session drill mode (`DrillMode`)
//! - Error types (`DrillError`)
//!
//! ## Determinism Guarantees
//!
//! All identifier and level types implement `Ord` so they can key
//! `BTreeMap`/`BTreeSet` collections with a stable iteration order.

use crate::primitives::{GUEST_LEARNER, MAX_ID_LENGTH, REVIEW_MODE};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Normalized learner identifier.
///
/// Surrounding whitespace is trimmed; an empty identifier maps to `guest`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LearnerId(String);

impl LearnerId {
    /// Normalize a raw learner identifier.
    #[must_use]
    pub fn new(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            Self(GUEST_LEARNER.to_string())
        } else {
            Self(trimmed.to_string())
        }
    }

    /// The learner used for records without an identifier.
    #[must_use]
    pub fn guest() -> Self {
        Self(GUEST_LEARNER.to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LearnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque, stable question identifier.
///
/// Question ids are used verbatim; only the empty id is rejected.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionId(String);

impl QuestionId {
    /// Create a question id, rejecting empty or oversized input.
    pub fn new(raw: impl Into<String>) -> Result<Self, DrillError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(DrillError::MissingQuestionId);
        }
        if raw.len() > MAX_ID_LENGTH {
            return Err(DrillError::InvalidRecord(format!(
                "question id longer than {} bytes",
                MAX_ID_LENGTH
            )));
        }
        Ok(Self(raw))
    }

    /// Read a question id from an arbitrary JSON value.
    ///
    /// Strings are taken verbatim, numbers are rendered in decimal;
    /// anything else (including `null` and `""`) has no id.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(s) => Self::new(s.as_str()).ok(),
            serde_json::Value::Number(n) => Self::new(n.to_string()).ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// LEVEL
// =============================================================================

/// Question difficulty level. `Lv1 < Lv2 < Lv3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Level {
    #[default]
    Lv1,
    Lv2,
    Lv3,
}

impl Level {
    pub const ALL: [Level; 3] = [Level::Lv1, Level::Lv2, Level::Lv3];

    /// Parse a level label leniently.
    ///
    /// Exact labels win; otherwise the first of `1`, `2`, `3` found in the
    /// text decides; anything else is `Lv1`.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        if let Some(level) = Self::ALL.iter().find(|l| l.label() == text) {
            return *level;
        }
        if !text.is_empty() {
            for (marker, level) in [('1', Level::Lv1), ('2', Level::Lv2), ('3', Level::Lv3)] {
                if text.contains(marker) {
                    return level;
                }
            }
        }
        Level::default()
    }

    /// Parse a level only when the label matches, ignoring case (admin input).
    #[must_use]
    pub fn parse_strict(text: &str) -> Option<Self> {
        let text = text.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|l| l.label().eq_ignore_ascii_case(text))
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Level::Lv1 => "Lv1",
            Level::Lv2 => "Lv2",
            Level::Lv3 => "Lv3",
        }
    }

    /// Zero-based ordinal.
    #[must_use]
    pub const fn index(&self) -> usize {
        match self {
            Level::Lv1 => 0,
            Level::Lv2 => 1,
            Level::Lv3 => 2,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Level {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for Level {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Levels arrive as strings or bare numbers depending on the content author.
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(match value {
            serde_json::Value::String(s) => Level::parse(&s),
            serde_json::Value::Number(n) => Level::parse(&n.to_string()),
            _ => Level::default(),
        })
    }
}

// =============================================================================
// QUESTION
// =============================================================================

/// Kind of drill question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionType {
    #[default]
    Reorder,
    Vocab,
    VocabChoice,
    Rewrite,
}

/// A question from the content catalog. Immutable within a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    #[serde(rename = "type", default)]
    pub kind: QuestionType,
    #[serde(default)]
    pub level: Level,
    #[serde(default)]
    pub unit: String,
    /// Display text; also the secondary sort key for fallback extras.
    #[serde(rename = "en", default)]
    pub display_text: String,
    #[serde(rename = "jp", default)]
    pub prompt: String,
}

impl Question {
    /// Create a question with empty display content.
    #[must_use]
    pub fn new(id: QuestionId, kind: QuestionType, level: Level, unit: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            level,
            unit: unit.into(),
            display_text: String::new(),
            prompt: String::new(),
        }
    }

    /// Builder-style display text setter.
    #[must_use]
    pub fn with_text(mut self, display_text: impl Into<String>) -> Self {
        self.display_text = display_text.into();
        self
    }

    /// The unit label with surrounding whitespace removed.
    #[must_use]
    pub fn unit_key(&self) -> &str {
        self.unit.trim()
    }
}

// =============================================================================
// DRILL MODE
// =============================================================================

/// How a session selects its working set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrillMode {
    /// Level ceiling and unit filter apply.
    #[default]
    Normal,
    /// The whole deck is the working set.
    Review,
}

impl DrillMode {
    /// Case-insensitive parse; anything other than `review` is `Normal`.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        if text.trim().eq_ignore_ascii_case(REVIEW_MODE) {
            DrillMode::Review
        } else {
            DrillMode::Normal
        }
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur at the edges of the drill engine.
///
/// The stage transition function and the order builder never return errors;
/// malformed input degrades to "skip" or "treat as default". These variants
/// are produced by the ingestion boundary, persistence, and the CLI.
#[derive(Debug, Error)]
pub enum DrillError {
    /// A session record could not be interpreted.
    #[error("Invalid session record: {0}")]
    InvalidRecord(String),

    /// A timestamp string could not be parsed.
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// A question id was required but absent or empty.
    #[error("Question id is required")]
    MissingQuestionId,

    /// A stage label is not part of the active configuration.
    #[error("Unknown stage '{stage}' for configuration '{config}'")]
    UnknownStage { stage: String, config: String },

    /// A serialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A deserialization error occurred.
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for DrillError {
    fn from(e: std::io::Error) -> Self {
        DrillError::IoError(e.to_string())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn learner_id_trims_and_defaults_to_guest() {
        assert_eq!(LearnerId::new("  alice ").as_str(), "alice");
        assert_eq!(LearnerId::new("   "), LearnerId::guest());
        assert_eq!(LearnerId::new("").as_str(), "guest");
    }

    #[test]
    fn question_id_rejects_empty() {
        assert!(matches!(
            QuestionId::new(""),
            Err(DrillError::MissingQuestionId)
        ));
        assert_eq!(QuestionId::new("q1").expect("id").as_str(), "q1");
    }

    #[test]
    fn question_id_from_json_accepts_numbers() {
        let id = QuestionId::from_json(&serde_json::json!(42)).expect("numeric id");
        assert_eq!(id.as_str(), "42");
        assert!(QuestionId::from_json(&serde_json::json!(null)).is_none());
        assert!(QuestionId::from_json(&serde_json::json!("")).is_none());
        assert!(QuestionId::from_json(&serde_json::json!(true)).is_none());
    }

    #[test]
    fn level_parse_is_lenient() {
        assert_eq!(Level::parse("Lv2"), Level::Lv2);
        assert_eq!(Level::parse("level 3"), Level::Lv3);
        assert_eq!(Level::parse("2"), Level::Lv2);
        assert_eq!(Level::parse(""), Level::Lv1);
        assert_eq!(Level::parse("hard"), Level::Lv1);
    }

    #[test]
    fn level_parse_strict_requires_a_label() {
        assert_eq!(Level::parse_strict("Lv3"), Some(Level::Lv3));
        assert_eq!(Level::parse_strict(" lv2 "), Some(Level::Lv2));
        assert_eq!(Level::parse_strict("hard"), None);
        assert_eq!(Level::parse_strict("3"), None);
    }

    #[test]
    fn level_ordering() {
        assert!(Level::Lv1 < Level::Lv2);
        assert!(Level::Lv2 < Level::Lv3);
    }

    #[test]
    fn question_deserializes_with_defaults() {
        let q: Question =
            serde_json::from_str(r#"{"id":"q1","type":"vocab-choice","level":"Lv2","en":"apple"}"#)
                .expect("question");
        assert_eq!(q.kind, QuestionType::VocabChoice);
        assert_eq!(q.level, Level::Lv2);
        assert_eq!(q.display_text, "apple");
        assert_eq!(q.unit, "");

        let bare: Question = serde_json::from_str(r#"{"id":"q2"}"#).expect("bare question");
        assert_eq!(bare.level, Level::Lv1);
        assert_eq!(bare.kind, QuestionType::Reorder);
    }

    #[test]
    fn drill_mode_parse() {
        assert_eq!(DrillMode::parse("Review"), DrillMode::Review);
        assert_eq!(DrillMode::parse("normal"), DrillMode::Normal);
        assert_eq!(DrillMode::parse("anything"), DrillMode::Normal);
    }
}
