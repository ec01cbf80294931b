//! # Ingestor Module
//!
//! Validating parse of raw session records at the ingestion boundary.
//!
//! - Accept heterogeneous, partially malformed JSON records
//! - Reduce them to typed [`SessionRecord`]s with explicit optional fields
//! - Skip malformed attempts instead of failing the record
//! - No interpretation beyond field extraction
//!
//! The rest of the engine only ever sees validated records.

use crate::primitives::{MAX_ATTEMPTS_PER_RECORD, MAX_ID_LENGTH, REVIEW_MODE};
use crate::timestamp::{Timestamp, parse_timestamp};
use crate::{DrillError, LearnerId, QuestionId};
use serde_json::Value;

// =============================================================================
// VALIDATED RECORDS
// =============================================================================

/// One answered question inside a session.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Attempt {
    pub question_id: QuestionId,
    pub correct: bool,
    /// Effective attempt time: the attempt's own `at` when present, otherwise
    /// the session's end time. `None` when neither parses.
    pub at: Option<Timestamp>,
    /// Effective mode: the attempt's own `mode`, otherwise the session's.
    pub mode: String,
}

impl Attempt {
    /// Review attempts never mutate stage state.
    #[must_use]
    pub fn is_review(&self) -> bool {
        self.mode.eq_ignore_ascii_case(REVIEW_MODE)
    }
}

/// A validated session record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub learner: LearnerId,
    pub subject: String,
    pub mode: String,
    /// `endedAt`, falling back to `receivedAt`.
    pub ended_at: Option<Timestamp>,
    pub attempts: Vec<Attempt>,
}

impl SessionRecord {
    /// Create an empty record (mostly useful for tests and tools).
    #[must_use]
    pub fn new(learner: LearnerId, subject: impl Into<String>, mode: impl Into<String>) -> Self {
        Self {
            learner,
            subject: subject.into(),
            mode: mode.into(),
            ended_at: None,
            attempts: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_review(&self) -> bool {
        self.mode.eq_ignore_ascii_case(REVIEW_MODE)
    }

    /// Attempts that may mutate stage state, ordered by timestamp.
    ///
    /// Review records yield nothing. Attempts without a usable timestamp are
    /// kept (they are no-ops for the transition function). The sort is
    /// stable, so equal timestamps keep their arrival order.
    #[must_use]
    pub fn scoring_attempts(&self) -> Vec<&Attempt> {
        if self.is_review() {
            return Vec::new();
        }
        let mut attempts: Vec<&Attempt> = self.attempts.iter().filter(|a| !a.is_review()).collect();
        attempts.sort_by_key(|a| a.at);
        attempts
    }
}

// =============================================================================
// INGESTOR
// =============================================================================

/// The Ingestor turns raw JSON into [`SessionRecord`]s.
pub struct Ingestor;

impl Ingestor {
    /// Parse one raw record.
    ///
    /// Returns `DrillError::InvalidRecord` only when the value is not an
    /// object; every other defect degrades to skipping the offending attempt.
    pub fn parse_record(value: &Value) -> Result<SessionRecord, DrillError> {
        let obj = value
            .as_object()
            .ok_or_else(|| DrillError::InvalidRecord("record is not an object".to_string()))?;

        let learner = match obj.get("user").and_then(Value::as_str) {
            Some(user) if user.len() <= MAX_ID_LENGTH => LearnerId::new(user),
            Some(_) => {
                return Err(DrillError::InvalidRecord(format!(
                    "user longer than {} bytes",
                    MAX_ID_LENGTH
                )));
            }
            None => LearnerId::guest(),
        };
        let subject = string_field(obj.get("subject")).unwrap_or_default();
        let mode = string_field(obj.get("mode"))
            .map(|m| m.trim().to_lowercase())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| "normal".to_string());

        let ended_at = effective_time(obj.get("endedAt"), obj.get("receivedAt"));

        let mut record = SessionRecord {
            learner,
            subject,
            mode,
            ended_at,
            attempts: Vec::new(),
        };

        let Some(answered) = obj.get("answered").and_then(Value::as_array) else {
            return Ok(record);
        };

        if answered.len() > MAX_ATTEMPTS_PER_RECORD {
            tracing::warn!(
                count = answered.len(),
                limit = MAX_ATTEMPTS_PER_RECORD,
                "session record exceeds attempt limit, truncating"
            );
        }

        for item in answered.iter().take(MAX_ATTEMPTS_PER_RECORD) {
            match Self::parse_attempt(item, &record) {
                Some(attempt) => record.attempts.push(attempt),
                None => tracing::debug!(learner = %record.learner, "skipping malformed attempt"),
            }
        }

        Ok(record)
    }

    /// Parse one newline-delimited JSON line.
    pub fn parse_line(line: &str) -> Result<SessionRecord, DrillError> {
        let value: Value = serde_json::from_str(line)
            .map_err(|e| DrillError::DeserializationError(e.to_string()))?;
        Self::parse_record(&value)
    }

    /// Parse a whole results log. Blank and unparsable lines are skipped.
    #[must_use]
    pub fn parse_log(text: &str) -> Vec<SessionRecord> {
        let mut records = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match Self::parse_line(line) {
                Ok(record) => records.push(record),
                Err(e) => tracing::debug!(line = lineno + 1, error = %e, "skipping log line"),
            }
        }
        records
    }

    fn parse_attempt(item: &Value, record: &SessionRecord) -> Option<Attempt> {
        let obj = item.as_object()?;
        let question_id = QuestionId::from_json(obj.get("id")?)?;
        let correct = obj.get("correct").is_some_and(is_truthy);

        // A present-but-unusable `at` does not fall back to the session time.
        let at = time_field(obj.get("at")).unwrap_or(record.ended_at);

        let mode = string_field(obj.get("mode"))
            .map(|m| m.trim().to_lowercase())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| record.mode.clone());

        Some(Attempt {
            question_id,
            correct,
            at,
            mode,
        })
    }
}

fn string_field(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_str).map(str::to_string)
}

/// `None` when the field is absent, null or empty; otherwise the parse
/// result, which is `None` for non-strings and unparsable text.
fn time_field(value: Option<&Value>) -> Option<Option<Timestamp>> {
    match value? {
        Value::Null => None,
        Value::String(text) if text.is_empty() => None,
        Value::String(text) => Some(parse_timestamp(text)),
        _ => Some(None),
    }
}

/// The primary field wins whenever it is present, even if unusable.
fn effective_time(primary: Option<&Value>, fallback: Option<&Value>) -> Option<Timestamp> {
    time_field(primary).unwrap_or_else(|| time_field(fallback).flatten())
}

/// JSON truthiness: `false`, `null`, `0`, `""`, `[]` and `{}` are false.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f.is_normal() || f.is_subnormal()),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

// =============================================================================
// TESTS
// =============================================================================
