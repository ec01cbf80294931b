//! # Level Overrides
//!
//! Per-subject `question id -> Level` overrides set by an administrator.
//! Applied to the deck before ordering so an override moves a question
//! across the level ceiling.
//!
//! Persisted as a flat JSON object through atomic replace; the file is
//! removed once the last override is cleared.

use crate::DrillError;
use crate::repository::write_atomic;
use crate::types::{Level, Question, QuestionId};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// File name inside a subject directory.
pub const LEVELS_FILE_NAME: &str = "levels.json";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LevelOverrides {
    levels: BTreeMap<QuestionId, Level>,
}

impl LevelOverrides {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load overrides from `path`.
    ///
    /// A missing file is empty. Unreadable JSON or a non-object document is
    /// logged and treated as empty; invalid entries are dropped.
    pub fn load(path: &Path) -> Result<Self, DrillError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::new()),
            Err(e) => return Err(e.into()),
        };
        let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&text) else {
            tracing::warn!(path = %path.display(), "level overrides unreadable, ignoring");
            return Ok(Self::new());
        };

        let levels = map
            .into_iter()
            .filter_map(|(key, value)| {
                let id = QuestionId::new(key).ok()?;
                let label = value.as_str().filter(|s| !s.is_empty())?;
                Some((id, Level::parse(label)))
            })
            .collect();
        Ok(Self { levels })
    }

    /// Persist to `path`, removing the file when there are no overrides.
    pub fn save(&self, path: &Path) -> Result<(), DrillError> {
        if self.levels.is_empty() {
            return match fs::remove_file(path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            };
        }
        let map: BTreeMap<&str, &str> = self
            .levels
            .iter()
            .map(|(id, level)| (id.as_str(), level.label()))
            .collect();
        let bytes =
            serde_json::to_vec(&map).map_err(|e| DrillError::SerializationError(e.to_string()))?;
        write_atomic(path, &bytes)
    }

    /// Set (`Some`) or clear (`None`) an override. Returns whether anything
    /// changed.
    pub fn set(&mut self, id: &QuestionId, level: Option<Level>) -> bool {
        match level {
            Some(level) => self.levels.insert(id.clone(), level) != Some(level),
            None => self.levels.remove(id).is_some(),
        }
    }

    #[must_use]
    pub fn get(&self, id: &QuestionId) -> Option<Level> {
        self.levels.get(id).copied()
    }

    /// Rewrite the level of every overridden question in `deck`.
    pub fn apply_to(&self, deck: &mut [Question]) {
        for question in deck.iter_mut() {
            if let Some(level) = self.get(&question.id) {
                question.level = level;
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&QuestionId, &Level)> {
        self.levels.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}
