//! # Deck Loading
//!
//! Reads a question catalog into an ordered `Vec<Question>`.
//!
//! Accepted shapes:
//!
//! - an array of questions, each with an optional `type`
//! - an object of typed sections, read in this order:
//!   `questions` (reorder), `vocabInput` (vocab), legacy `vocab`,
//!   `vocabChoice` (vocab-choice), `rewrite`
//!
//! Legacy `vocab` entries with a non-empty `choices` array are choice
//! questions; the rest are typed-input vocab. Entries without an id are
//! skipped.

use crate::DrillError;
use crate::types::{Level, Question, QuestionId, QuestionType};
use serde_json::{Map, Value};
use std::path::Path;

/// Parse a deck from a JSON value.
pub fn parse_deck(value: &Value) -> Result<Vec<Question>, DrillError> {
    match value {
        Value::Array(items) => Ok(items
            .iter()
            .filter_map(|item| parse_entry(item, None))
            .collect()),
        Value::Object(sections) => {
            let mut vocab_input: Vec<&Value> = section(sections, "vocabInput").iter().collect();
            let mut vocab_choice: Vec<&Value> = section(sections, "vocabChoice").iter().collect();
            for entry in section(sections, "vocab") {
                let has_choices = entry
                    .get("choices")
                    .and_then(Value::as_array)
                    .is_some_and(|choices| !choices.is_empty());
                if has_choices {
                    vocab_choice.push(entry);
                } else {
                    vocab_input.push(entry);
                }
            }

            let mut deck = Vec::new();
            deck.extend(
                section(sections, "questions")
                    .iter()
                    .filter_map(|e| parse_entry(e, Some(QuestionType::Reorder))),
            );
            deck.extend(
                vocab_input
                    .into_iter()
                    .filter_map(|e| parse_entry(e, Some(QuestionType::Vocab))),
            );
            deck.extend(
                vocab_choice
                    .into_iter()
                    .filter_map(|e| parse_entry(e, Some(QuestionType::VocabChoice))),
            );
            deck.extend(
                section(sections, "rewrite")
                    .iter()
                    .filter_map(|e| parse_entry(e, Some(QuestionType::Rewrite))),
            );
            Ok(deck)
        }
        _ => Err(DrillError::DeserializationError(
            "deck must be an array or an object of sections".to_string(),
        )),
    }
}

/// Read and parse a deck file.
pub fn load_deck(path: &Path) -> Result<Vec<Question>, DrillError> {
    let text = std::fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&text)
        .map_err(|e| DrillError::DeserializationError(format!("{}: {}", path.display(), e)))?;
    parse_deck(&value)
}

fn section<'a>(sections: &'a Map<String, Value>, name: &str) -> &'a [Value] {
    sections
        .get(name)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn parse_entry(entry: &Value, section_kind: Option<QuestionType>) -> Option<Question> {
    let obj = entry.as_object()?;
    let id = QuestionId::from_json(obj.get("id")?)?;

    let kind = section_kind.unwrap_or_else(|| {
        obj.get("type")
            .and_then(|t| serde_json::from_value::<QuestionType>(t.clone()).ok())
            .unwrap_or_default()
    });
    let level = match obj.get("level") {
        Some(Value::String(s)) => Level::parse(s),
        Some(Value::Number(n)) => Level::parse(&n.to_string()),
        _ => Level::default(),
    };
    let text = |key: &str| {
        obj.get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    let mut question = Question::new(id, kind, level, text("unit")).with_text(text("en"));
    question.prompt = text("jp");
    Some(question)
}
