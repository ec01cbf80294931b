//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.
//!
//! Every command returns an [`Output`] holding both renderings; the caller
//! prints one of them depending on `--json`.

use super::Cli;
use crate::config::{AppConfig, SessionConfig};
use chrono::Utc;
use drill_core::{
    DrillError, DrillMode, FileRepository, Ingestor, LEVELS_FILE_NAME, LearnerId, Level,
    LevelOverrides, OrderParams, QuestionId, QuestionStat, SessionRecord, StageConfig,
    StageTracker, StoreFormat, Timestamp, build_order, config_for_record, format_timestamp,
    get_stage_config, load_deck, normalize_subject, parse_timestamp, stats_for,
};
use serde_json::{Value, json};
use std::fmt::Write as _;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum size of a session record file (10 MB).
const MAX_RECORD_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Maximum size of a deck file (50 MB).
const MAX_DECK_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Append-only session log inside a subject directory.
pub const RESULTS_FILE_NAME: &str = "results.ndjson";

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), DrillError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| DrillError::IoError(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(DrillError::IoError(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Resolve an input path and make sure it names a regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, DrillError> {
    let canonical = path.canonicalize().map_err(|e| {
        DrillError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(DrillError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

// =============================================================================
// CONTEXT & OUTPUT
// =============================================================================

/// Resolved settings shared by every command.
#[derive(Debug, Clone)]
pub struct Context {
    pub subject: String,
    /// `<data_dir>/<subject>`
    pub dir: PathBuf,
    pub store_format: StoreFormat,
    pub session: SessionConfig,
    pub json: bool,
}

impl Context {
    /// Merge command-line flags over the loaded configuration.
    #[must_use]
    pub fn new(cli: &Cli, config: &AppConfig) -> Self {
        let data_dir = cli
            .data_dir
            .clone()
            .unwrap_or_else(|| config.data_dir.clone());
        let subject = normalize_subject(
            cli.subject
                .as_deref()
                .unwrap_or(config.default_subject.as_str()),
        );
        Self {
            dir: data_dir.join(&subject),
            subject,
            store_format: config.store_format,
            session: config.session.clone(),
            json: cli.json,
        }
    }

    #[must_use]
    pub fn results_path(&self) -> PathBuf {
        self.dir.join(RESULTS_FILE_NAME)
    }

    #[must_use]
    pub fn levels_path(&self) -> PathBuf {
        self.dir.join(LEVELS_FILE_NAME)
    }

    #[must_use]
    pub fn repository(&self) -> FileRepository {
        FileRepository::in_dir(&self.dir, self.store_format)
    }

    #[must_use]
    pub fn stage_config(&self) -> &'static StageConfig {
        get_stage_config(&self.subject)
    }
}

/// Result of a command in both renderings.
#[derive(Debug, Clone, PartialEq)]
pub struct Output {
    pub json: Value,
    pub text: String,
}

impl Output {
    pub fn print(&self, json_mode: bool) {
        if json_mode {
            println!(
                "{}",
                serde_json::to_string_pretty(&self.json).unwrap_or_default()
            );
        } else {
            println!("{}", self.text.trim_end());
        }
    }
}

// =============================================================================
// SHARED HELPERS
// =============================================================================

/// Read the subject's results log. A missing log is empty.
///
/// Records written without a subject belong to the directory they live in.
pub fn read_log(ctx: &Context) -> Result<Vec<SessionRecord>, DrillError> {
    let path = ctx.results_path();
    let text = match std::fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut records = Ingestor::parse_log(&text);
    for record in &mut records {
        if record.subject.trim().is_empty() {
            record.subject.clone_from(&ctx.subject);
        }
    }
    tracing::debug!(path = %path.display(), records = records.len(), "read results log");
    Ok(records)
}

/// Tracker over the subject's store file, rebuilt from the log when needed.
fn open_tracker(ctx: &Context, now: Timestamp) -> Result<StageTracker<FileRepository>, DrillError> {
    StageTracker::load_or_rebuild(ctx.repository(), || read_log(ctx), now)
}

fn parse_question_id(raw: &str) -> Result<QuestionId, DrillError> {
    QuestionId::new(raw.trim())
}

fn parse_id_list(raw: &str) -> Vec<QuestionId> {
    raw.split(',')
        .filter_map(|part| QuestionId::new(part.trim()).ok())
        .collect()
}

fn format_optional(ts: Option<&Timestamp>) -> String {
    ts.map_or_else(|| "-".to_string(), format_timestamp)
}

fn stat_lines(stat: &QuestionStat) -> String {
    let mut text = String::new();
    let _ = writeln!(text, "{}", stat.id);
    let _ = writeln!(text, "  Stage:        {}", stat.stage);
    let _ = writeln!(text, "  Streak:       {}", stat.streak);
    let _ = writeln!(text, "  Answered:     {} ({} correct)", stat.answered, stat.correct);
    let _ = writeln!(text, "  Last correct: {}", format_optional(stat.last_correct_at.as_ref()));
    let _ = writeln!(text, "  Last wrong:   {}", format_optional(stat.last_wrong_at.as_ref()));
    let _ = writeln!(text, "  Next due:     {}", format_optional(stat.next_due_at.as_ref()));
    text
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<Value, DrillError> {
    serde_json::to_value(value).map_err(|e| DrillError::SerializationError(e.to_string()))
}

// =============================================================================
// RECORD COMMAND
// =============================================================================

/// Append session records to the results log and apply them to the store.
///
/// The file holds one record object or an array of them. Records without
/// `receivedAt` are stamped with the current time; records without a
/// subject get the active one.
pub fn cmd_record(ctx: &Context, file: &Path) -> Result<Output, DrillError> {
    let path = validate_file_path(file)?;
    validate_file_size(&path, MAX_RECORD_FILE_SIZE)?;

    let text = std::fs::read_to_string(&path)?;
    let value: Value = serde_json::from_str(&text)
        .map_err(|e| DrillError::DeserializationError(format!("{}: {}", file.display(), e)))?;
    let raws = match value {
        Value::Array(items) => items,
        other => vec![other],
    };

    let now = Utc::now();
    let received_at = format_timestamp(&now);

    // Validate everything before touching the log.
    let mut prepared = Vec::with_capacity(raws.len());
    for mut raw in raws {
        if let Some(obj) = raw.as_object_mut() {
            obj.entry("receivedAt")
                .or_insert_with(|| Value::String(received_at.clone()));
            let has_subject = obj
                .get("subject")
                .and_then(Value::as_str)
                .is_some_and(|s| !s.trim().is_empty());
            if !has_subject {
                obj.insert("subject".to_string(), Value::String(ctx.subject.clone()));
            }
        }
        let record = Ingestor::parse_record(&raw)?;
        prepared.push((raw, record));
    }

    // Load (or rebuild) before appending so new records are applied once.
    let mut tracker = open_tracker(ctx, now)?;

    std::fs::create_dir_all(&ctx.dir)?;
    let mut log = OpenOptions::new()
        .create(true)
        .append(true)
        .open(ctx.results_path())?;
    let mut changed = false;
    let mut attempts = 0usize;
    for (raw, record) in &prepared {
        let line = serde_json::to_string(raw)
            .map_err(|e| DrillError::SerializationError(e.to_string()))?;
        writeln!(log, "{}", line)?;
        attempts += record.attempts.len();
        changed |= tracker.record_session(record)?;
    }
    log.sync_all()?;

    tracing::info!(
        subject = %ctx.subject,
        records = prepared.len(),
        attempts,
        changed,
        "recorded session"
    );

    Ok(Output {
        json: json!({
            "subject": ctx.subject,
            "records": prepared.len(),
            "attempts": attempts,
            "changed": changed,
        }),
        text: format!(
            "Recorded {} session(s) with {} attempt(s) for '{}'{}",
            prepared.len(),
            attempts,
            ctx.subject,
            if changed { "" } else { " (no stage changes)" }
        ),
    })
}

// =============================================================================
// REBUILD COMMAND
// =============================================================================

/// Rebuild the store from the results log and save it.
pub fn cmd_rebuild(ctx: &Context) -> Result<Output, DrillError> {
    let now = Utc::now();
    let records = read_log(ctx)?;
    // The cached store is replaced wholesale, so a corrupt one is not fatal.
    let mut tracker = StageTracker::load_or_rebuild(ctx.repository(), || Ok(Vec::new()), now)?;
    tracker.rebuild(&records, now)?;

    let store = tracker.store();
    Ok(Output {
        json: json!({
            "subject": ctx.subject,
            "records": records.len(),
            "learners": store.learner_count(),
            "states": store.state_count(),
        }),
        text: format!(
            "Rebuilt '{}' from {} record(s): {} learner(s), {} state(s)",
            ctx.subject,
            records.len(),
            store.learner_count(),
            store.state_count()
        ),
    })
}

// =============================================================================
// STATE COMMANDS
// =============================================================================

/// Stat payload for one question.
pub fn cmd_state(ctx: &Context, learner: &str, id: &str) -> Result<Output, DrillError> {
    let id = parse_question_id(id)?;
    let mut stats = lookup_stats(ctx, &LearnerId::new(learner), std::slice::from_ref(&id))?;
    let stat = stats.pop().ok_or(DrillError::MissingQuestionId)?;

    Ok(Output {
        json: to_json(&stat)?,
        text: stat_lines(&stat),
    })
}

/// Stat payloads for a comma-separated id list, in the given order.
pub fn cmd_states(ctx: &Context, learner: &str, ids: &str) -> Result<Output, DrillError> {
    let ids = parse_id_list(ids);
    if ids.is_empty() {
        return Err(DrillError::MissingQuestionId);
    }
    let stats = lookup_stats(ctx, &LearnerId::new(learner), &ids)?;

    Ok(Output {
        json: to_json(&stats)?,
        text: stats.iter().map(stat_lines).collect::<Vec<_>>().join("\n"),
    })
}

fn lookup_stats(
    ctx: &Context,
    learner: &LearnerId,
    ids: &[QuestionId],
) -> Result<Vec<QuestionStat>, DrillError> {
    let now = Utc::now();
    let mut tracker = open_tracker(ctx, now)?;
    tracker.lookup_or_rebuild(learner, ids, || read_log(ctx), now)?;
    Ok(stats_for(tracker.store(), learner, ids, ctx.stage_config()))
}

// =============================================================================
// ORDER COMMAND
// =============================================================================

/// Arguments of the `order` command.
#[derive(Debug, Clone, Default)]
pub struct OrderArgs {
    pub deck: PathBuf,
    pub learner: String,
    pub count: Option<usize>,
    pub level: Option<String>,
    pub unit: Option<String>,
    pub mode: String,
    pub now: Option<String>,
}

/// Select and order the questions for one session.
pub fn cmd_order(ctx: &Context, args: &OrderArgs) -> Result<Output, DrillError> {
    let path = validate_file_path(&args.deck)?;
    validate_file_size(&path, MAX_DECK_FILE_SIZE)?;

    let now = match args.now.as_deref() {
        Some(raw) => {
            parse_timestamp(raw).ok_or_else(|| DrillError::InvalidTimestamp(raw.to_string()))?
        }
        None => Utc::now(),
    };
    let level = match args.level.as_deref() {
        Some(raw) => Level::parse_strict(raw).ok_or_else(|| {
            DrillError::InvalidRecord(format!("unknown level '{}' (expected Lv1, Lv2, Lv3)", raw))
        })?,
        None => ctx.session.level,
    };

    let mut deck = load_deck(&path)?;
    LevelOverrides::load(&ctx.levels_path())?.apply_to(&mut deck);

    let learner = LearnerId::new(&args.learner);
    let tracker = open_tracker(ctx, now)?;
    let stats = tracker
        .store()
        .learner_states(&learner)
        .cloned()
        .unwrap_or_default();

    let mut params = OrderParams::new(args.count.unwrap_or(ctx.session.count), level, now)
        .with_mode(DrillMode::parse(&args.mode));
    if let Some(unit) = args.unit.as_deref() {
        params = params.with_unit(unit);
    }

    // States written by math drills in another subject use the math ladder.
    let config = config_for_record(&ctx.subject, &args.mode);
    let result = build_order(&deck, &stats, &params, config);
    tracing::debug!(
        learner = %learner,
        deck = deck.len(),
        selected = result.len(),
        extras = result.fallback_extra_ids.len(),
        "built session order"
    );

    let mut text = String::new();
    let _ = writeln!(
        text,
        "Order for {} ({} of {} requested, level {})",
        learner,
        result.len(),
        params.desired_count,
        level
    );
    for (n, entry) in result.entries.iter().enumerate() {
        let bucket = entry
            .bucket
            .map_or_else(|| "-".to_string(), |b| b.to_string());
        let _ = writeln!(
            text,
            "{:>3}. {:<24} {:<18} streak {}",
            n + 1,
            entry.question_id,
            bucket,
            entry.streak
        );
    }
    if !result.fallback_extra_ids.is_empty() {
        let extras: Vec<&str> = result
            .fallback_extra_ids
            .iter()
            .map(QuestionId::as_str)
            .collect();
        let _ = writeln!(text, "Fallback extras: {}", extras.join(", "));
    }

    Ok(Output {
        json: to_json(&result)?,
        text,
    })
}

// =============================================================================
// CONFIG COMMAND
// =============================================================================

/// Show the stage configuration of the active subject.
pub fn cmd_config(ctx: &Context) -> Result<Output, DrillError> {
    let config = ctx.stage_config();

    let mut text = String::new();
    let _ = writeln!(text, "Stage configuration '{}' (subject '{}')", config.name, ctx.subject);
    let _ = writeln!(text, "Sequence: {}", config.sequence.join(" -> "));
    let _ = writeln!(text, "Default:  {}", config.default_stage);
    for (stage, rule) in config.rules {
        let condition = match (rule.min_streak, rule.required_gap_days) {
            (Some(streak), _) => format!("streak of {}", streak),
            (None, Some(days)) => format!("{} day gap", days),
            (None, None) => "any correct answer".to_string(),
        };
        match rule.next {
            Some(next) => {
                let _ = writeln!(text, "  {} -> {}  {}", stage, next, condition);
            }
            None => {
                let _ = writeln!(text, "  {}       terminal", stage);
            }
        }
    }

    Ok(Output {
        json: to_json(config)?,
        text,
    })
}

// =============================================================================
// ADMIN COMMANDS
// =============================================================================

/// Remove cached progress for a learner or a single question.
///
/// Only the store is touched; a later rebuild replays the log again.
pub fn cmd_reset(ctx: &Context, learner: &str, id: Option<&str>) -> Result<Output, DrillError> {
    let learner = LearnerId::new(learner);
    let mut tracker = StageTracker::open(ctx.repository())?;

    let removed = match id {
        Some(raw) => {
            let id = parse_question_id(raw)?;
            usize::from(tracker.reset_question(&learner, &id)?)
        }
        None => tracker.reset_learner(&learner)?,
    };
    tracing::info!(learner = %learner, removed, "reset stage progress");

    Ok(Output {
        json: json!({
            "learner": learner,
            "id": id,
            "removed": removed,
        }),
        text: format!("Removed {} state(s) for {}", removed, learner),
    })
}

/// Show, set or clear a question's level override.
pub fn cmd_level(
    ctx: &Context,
    id: &str,
    set: Option<&str>,
    clear: bool,
) -> Result<Output, DrillError> {
    let id = parse_question_id(id)?;
    let path = ctx.levels_path();
    let mut overrides = LevelOverrides::load(&path)?;

    let requested = match set {
        Some(raw) => Some(Some(Level::parse_strict(raw).ok_or_else(|| {
            DrillError::InvalidRecord(format!("unknown level '{}' (expected Lv1, Lv2, Lv3)", raw))
        })?)),
        None if clear => Some(None),
        None => None,
    };

    let changed = match requested {
        Some(level) => {
            let changed = overrides.set(&id, level);
            if changed {
                overrides.save(&path)?;
                tracing::info!(id = %id, level = ?level, "updated level override");
            }
            changed
        }
        None => false,
    };

    let current = overrides.get(&id);
    Ok(Output {
        json: json!({
            "id": id,
            "level": current,
            "changed": changed,
        }),
        text: match current {
            Some(level) => format!("{}: {}", id, level),
            None => format!("{}: no override", id),
        },
    })
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Counts and stage histogram of the cached store.
pub fn cmd_status(ctx: &Context) -> Result<Output, DrillError> {
    let tracker = StageTracker::open(ctx.repository())?;
    let store = tracker.store();
    let config = ctx.stage_config();
    let histogram = store.stage_histogram(config);

    let mut text = String::new();
    let _ = writeln!(text, "Drill Stage Status");
    let _ = writeln!(text, "==================");
    let _ = writeln!(text, "Subject:  {}", ctx.subject);
    let _ = writeln!(text, "Store:    {}", tracker.repository().path().display());
    let _ = writeln!(text, "Config:   {}", config.name);
    let _ = writeln!(text);
    let _ = writeln!(text, "Learners: {}", store.learner_count());
    let _ = writeln!(text, "States:   {}", store.state_count());
    let _ = writeln!(text);
    let _ = writeln!(text, "Stages:");
    for stage in config.sequence {
        let _ = writeln!(text, "  {}  {}", stage, histogram.get(stage).copied().unwrap_or(0));
    }

    Ok(Output {
        json: json!({
            "subject": ctx.subject,
            "store": tracker.repository().path().to_string_lossy(),
            "config": config.name,
            "learners": store.learner_count(),
            "states": store.state_count(),
            "stages": histogram,
        }),
        text,
    })
}
