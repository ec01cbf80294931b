//! # Order Builder
//!
//! Chooses and orders the questions of one session.
//!
//! Input is a deck, the learner's stage states and the session parameters;
//! output is at most `desired_count` deck positions, each with a bucket label
//! explaining why it was picked.
//!
//! ## Fill order
//!
//! 1. **Promotable**: neither default nor terminal stage, due at or before
//!    `now`. Least mastered stage first, then earliest due, then deck order.
//! 2. **Higher level**: above the level ceiling (fallback extras in normal
//!    mode). Grouped by level; within a level earliest due first with
//!    undated items last, then stage, then deck order.
//! 3. **Remaining**: everything else, in deck order.
//!
//! ## Fallback extras
//!
//! When the working set holds fewer default-stage questions than the session
//! needs, the shortfall is borrowed from above the ceiling. Borrowed
//! questions are treated as default stage for this session only; the stage
//! store is never touched.
//!
//! The builder is pure: the same deck, states and parameters always give the
//! same order.

use crate::stage::{StageConfig, StageState};
use crate::timestamp::Timestamp;
use crate::types::{DrillMode, Level, Question, QuestionId};
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

// =============================================================================
// PARAMETERS AND RESULTS
// =============================================================================

/// Session parameters for [`build_order`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderParams {
    pub desired_count: usize,
    pub level_ceiling: Level,
    /// Only questions of this unit (normal mode). Blank means no filter.
    pub unit_filter: Option<String>,
    pub mode: DrillMode,
    pub now: Timestamp,
}

impl OrderParams {
    #[must_use]
    pub fn new(desired_count: usize, level_ceiling: Level, now: Timestamp) -> Self {
        Self {
            desired_count,
            level_ceiling,
            unit_filter: None,
            mode: DrillMode::Normal,
            now,
        }
    }

    #[must_use]
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit_filter = Some(unit.into());
        self
    }

    #[must_use]
    pub fn with_mode(mut self, mode: DrillMode) -> Self {
        self.mode = mode;
        self
    }

    /// The unit filter in effect: trimmed, non-blank, normal mode only.
    fn effective_unit(&self) -> Option<&str> {
        match self.mode {
            DrillMode::Review => None,
            DrillMode::Normal => self
                .unit_filter
                .as_deref()
                .map(str::trim)
                .filter(|u| !u.is_empty()),
        }
    }
}

/// Why a question was selected. Display only; never fed back into scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    /// Due for promotion at this stage.
    Stage(&'static str),
    /// Borrowed from a level above the ceiling.
    LevelPriority(Level),
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bucket::Stage(stage) => write!(f, "Stage {}", stage),
            Bucket::LevelPriority(level) => write!(f, "Lv-priority ({})", level),
        }
    }
}

impl Serialize for Bucket {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One selected question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderEntry {
    /// Position in the deck passed to [`build_order`].
    pub deck_index: usize,
    pub bucket: Option<Bucket>,
    pub streak: u32,
    pub question_id: QuestionId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResult {
    pub entries: Vec<OrderEntry>,
    /// Above-ceiling questions admitted to fill a shortage, in selection
    /// priority order.
    pub fallback_extra_ids: Vec<QuestionId>,
}

impl OrderResult {
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// RULES
// =============================================================================

/// Number of above-ceiling questions to borrow.
///
/// `max(0, desired - min(stage_f_count, desired))`
#[must_use]
pub fn determine_quota(desired: usize, stage_f_count: usize) -> usize {
    desired.saturating_sub(stage_f_count.min(desired))
}

/// Whether a question at `stage` surfaces in the promotable bucket.
///
/// Default and terminal stages never do; neither does anything without a
/// due date.
#[must_use]
pub fn is_promotable(
    stage: &str,
    next_due: Option<Timestamp>,
    now: Timestamp,
    config: &StageConfig,
) -> bool {
    let stage = config.normalize_stage(stage);
    if stage == config.default_stage || config.is_terminal(stage) {
        return false;
    }
    next_due.is_some_and(|due| due <= now)
}

// =============================================================================
// BUILDER
// =============================================================================

/// Stage snapshot used while ordering.
#[derive(Debug, Clone, Copy)]
struct Resolved {
    stage: &'static str,
    streak: u32,
    next_due: Option<Timestamp>,
}

impl Resolved {
    fn from_stats(
        question: &Question,
        stats: &BTreeMap<QuestionId, StageState>,
        config: &StageConfig,
    ) -> Self {
        match stats.get(&question.id) {
            Some(state) => Self {
                stage: config.normalize_stage(&state.stage),
                streak: state.streak,
                next_due: state.next_due_at,
            },
            None => Self {
                stage: config.default_stage,
                streak: 0,
                next_due: None,
            },
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    index: usize,
    stat: Resolved,
}

/// Build the ordered selection for one session.
#[must_use]
pub fn build_order(
    deck: &[Question],
    stats: &BTreeMap<QuestionId, StageState>,
    params: &OrderParams,
    config: &StageConfig,
) -> OrderResult {
    let desired = params.desired_count;
    if desired == 0 {
        return OrderResult::default();
    }

    let ceiling = params.level_ceiling;
    let unit = params.effective_unit();
    let unit_matches = |q: &Question| unit.is_none_or(|u| q.unit_key() == u);

    // Working set.
    let working: Vec<usize> = deck
        .iter()
        .enumerate()
        .filter(|(_, q)| match params.mode {
            DrillMode::Review => true,
            DrillMode::Normal => q.level <= ceiling && unit_matches(*q),
        })
        .map(|(index, _)| index)
        .collect();

    let mut candidates: Vec<Candidate> = working
        .iter()
        .map(|&index| Candidate {
            index,
            stat: Resolved::from_stats(&deck[index], stats, config),
        })
        .collect();

    // Shortage.
    let stage_f_count = candidates
        .iter()
        .filter(|c| deck[c.index].level <= ceiling && c.stat.stage == config.default_stage)
        .count();
    let quota = determine_quota(desired, stage_f_count);

    // Fallback extras.
    let mut fallback_extras: Vec<usize> = Vec::new();
    if quota > 0 {
        let mut seen: BTreeSet<&QuestionId> = working.iter().map(|&i| &deck[i].id).collect();
        fallback_extras = deck
            .iter()
            .enumerate()
            .filter(|(_, q)| q.level > ceiling && unit_matches(*q))
            .filter(|(_, q)| seen.insert(&q.id))
            .map(|(index, _)| index)
            .collect();
        fallback_extras.sort_by(|&a, &b| {
            let (qa, qb) = (&deck[a], &deck[b]);
            (qa.level, &qa.display_text, &qa.id).cmp(&(qb.level, &qb.display_text, &qb.id))
        });
        fallback_extras.truncate(quota);
    }
    if !fallback_extras.is_empty() {
        tracing::debug!(
            quota,
            admitted = fallback_extras.len(),
            "borrowing questions above the level ceiling"
        );
    }

    candidates.extend(fallback_extras.iter().map(|&index| {
        let mut stat = Resolved::from_stats(&deck[index], stats, config);
        stat.stage = config.default_stage;
        Candidate { index, stat }
    }));

    // Classification.
    let mut promotable: Vec<Candidate> = Vec::new();
    let mut higher_level: BTreeMap<Level, Vec<Candidate>> = BTreeMap::new();
    let mut remaining: Vec<Candidate> = Vec::new();
    for candidate in candidates {
        let level = deck[candidate.index].level;
        if is_promotable(candidate.stat.stage, candidate.stat.next_due, params.now, config) {
            promotable.push(candidate);
        } else if level > ceiling {
            higher_level.entry(level).or_default().push(candidate);
        } else {
            remaining.push(candidate);
        }
    }

    promotable.sort_by_key(|c| (config.rank(c.stat.stage), c.stat.next_due, c.index));
    for group in higher_level.values_mut() {
        group.sort_by_key(|c| {
            (
                c.stat.next_due.is_none(),
                c.stat.next_due,
                config.rank(c.stat.stage),
                c.index,
            )
        });
    }
    remaining.sort_by_key(|c| c.index);

    // Fill.
    let mut filler = Filler::new(deck, desired);
    for candidate in &promotable {
        filler.push(candidate, Some(Bucket::Stage(candidate.stat.stage)));
    }
    for (level, group) in &higher_level {
        for candidate in group {
            filler.push(candidate, Some(Bucket::LevelPriority(*level)));
        }
    }
    for candidate in &remaining {
        filler.push(candidate, None);
    }

    OrderResult {
        entries: filler.entries,
        fallback_extra_ids: fallback_extras
            .iter()
            .map(|&index| deck[index].id.clone())
            .collect(),
    }
}

/// Appends entries until full, never picking a deck position twice.
struct Filler<'a> {
    deck: &'a [Question],
    desired: usize,
    chosen: BTreeSet<usize>,
    entries: Vec<OrderEntry>,
}

impl<'a> Filler<'a> {
    fn new(deck: &'a [Question], desired: usize) -> Self {
        Self {
            deck,
            desired,
            chosen: BTreeSet::new(),
            entries: Vec::with_capacity(desired.min(deck.len())),
        }
    }

    fn push(&mut self, candidate: &Candidate, bucket: Option<Bucket>) {
        if self.entries.len() >= self.desired || !self.chosen.insert(candidate.index) {
            return;
        }
        self.entries.push(OrderEntry {
            deck_index: candidate.index,
            bucket,
            streak: candidate.stat.streak,
            question_id: self.deck[candidate.index].id.clone(),
        });
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::{DEFAULT_STAGE_CONFIG, MATH_STAGE_CONFIG};
    use crate::timestamp::parse_timestamp;
    use crate::types::QuestionType;
    use chrono::Duration;

    fn now() -> Timestamp {
        parse_timestamp("2024-06-01T12:00:00Z").expect("now")
    }

    fn question(id: &str, level: Level) -> Question {
        Question::new(
            QuestionId::new(id).expect("id"),
            QuestionType::Reorder,
            level,
            "",
        )
    }

    fn staged(stage: &str, due_offset_days: Option<i64>) -> StageState {
        StageState {
            stage: stage.to_string(),
            streak: 2,
            next_due_at: due_offset_days.map(|d| now() + Duration::days(d)),
            ..StageState::new(&DEFAULT_STAGE_CONFIG)
        }
    }

    fn stats(entries: &[(&str, StageState)]) -> BTreeMap<QuestionId, StageState> {
        entries
            .iter()
            .map(|(id, state)| (QuestionId::new(*id).expect("id"), state.clone()))
            .collect()
    }

    fn ids(result: &OrderResult) -> Vec<&str> {
        result.entries.iter().map(|e| e.question_id.as_str()).collect()
    }

    #[test]
    fn quota_law() {
        assert_eq!(determine_quota(7, 5), 2);
        assert_eq!(determine_quota(7, 10), 0);
        assert_eq!(determine_quota(7, 0), 7);
        assert_eq!(determine_quota(0, 3), 0);
    }

    #[test]
    fn promotable_requires_due_non_default_non_terminal() {
        let c = &DEFAULT_STAGE_CONFIG;
        let past = Some(now() - Duration::days(1));
        assert!(is_promotable("C", past, now(), c));
        assert!(is_promotable("C", Some(now()), now(), c));
        assert!(!is_promotable("C", Some(now() + Duration::seconds(1)), now(), c));
        assert!(!is_promotable("C", None, now(), c));
        assert!(!is_promotable("F", past, now(), c));
        assert!(!is_promotable("A", past, now(), c));
        assert!(!is_promotable("E", past, now(), &MATH_STAGE_CONFIG));
    }

    #[test]
    fn zero_desired_is_empty() {
        let deck = vec![question("a", Level::Lv1)];
        let params = OrderParams::new(0, Level::Lv1, now());
        assert!(build_order(&deck, &BTreeMap::new(), &params, &DEFAULT_STAGE_CONFIG).is_empty());
    }

    #[test]
    fn enough_default_stage_questions_borrow_nothing() {
        let mut deck: Vec<Question> = (0..5).map(|i| question(&format!("f{}", i), Level::Lv1)).collect();
        deck.push(question("h1", Level::Lv2));
        deck.push(question("h2", Level::Lv2));
        let stats = stats(&[("h1", staged("A", None)), ("h2", staged("A", None))]);

        let params = OrderParams::new(3, Level::Lv1, now());
        let result = build_order(&deck, &stats, &params, &DEFAULT_STAGE_CONFIG);
        assert_eq!(ids(&result), vec!["f0", "f1", "f2"]);
        assert!(result.fallback_extra_ids.is_empty());
        assert!(result.entries.iter().all(|e| e.bucket.is_none()));
    }

    #[test]
    fn due_question_comes_first() {
        let deck = vec![
            question("f1", Level::Lv1),
            question("f2", Level::Lv1),
            question("due", Level::Lv1),
        ];
        let stats = stats(&[("due", staged("B", Some(-1)))]);
        let params = OrderParams::new(2, Level::Lv1, now());
        let result = build_order(&deck, &stats, &params, &DEFAULT_STAGE_CONFIG);

        assert_eq!(ids(&result), vec!["due", "f1"]);
        assert_eq!(result.entries[0].bucket, Some(Bucket::Stage("B")));
        assert_eq!(result.entries[0].bucket.map(|b| b.to_string()), Some("Stage B".to_string()));
        assert_eq!(result.entries[0].deck_index, 2);
        assert_eq!(result.entries[0].streak, 2);
    }

    #[test]
    fn promotable_sorted_by_stage_then_due_then_index() {
        let deck = vec![
            question("c-late", Level::Lv1),
            question("b", Level::Lv1),
            question("c-early", Level::Lv1),
            question("e", Level::Lv1),
        ];
        let stats = stats(&[
            ("c-late", staged("C", Some(-1))),
            ("b", staged("B", Some(-5))),
            ("c-early", staged("C", Some(-3))),
            ("e", staged("E", Some(0))),
        ]);
        let params = OrderParams::new(4, Level::Lv1, now());
        let result = build_order(&deck, &stats, &params, &DEFAULT_STAGE_CONFIG);
        assert_eq!(ids(&result), vec!["e", "c-early", "c-late", "b"]);
    }

    #[test]
    fn shortage_borrows_from_higher_levels() {
        let deck = vec![
            question("low", Level::Lv1),
            question("mastered", Level::Lv1),
            question("lv3", Level::Lv3).with_text("alpha"),
            question("lv2-b", Level::Lv2).with_text("beta"),
            question("lv2-a", Level::Lv2).with_text("alpha"),
        ];
        let stats = stats(&[("mastered", staged("A", None)), ("lv2-b", staged("B", Some(-1)))]);
        let params = OrderParams::new(3, Level::Lv1, now());
        let result = build_order(&deck, &stats, &params, &DEFAULT_STAGE_CONFIG);

        // stage_f_count = 1 -> quota 2, taken by (level, text, id).
        let extras: Vec<_> = result.fallback_extra_ids.iter().map(QuestionId::as_str).collect();
        assert_eq!(extras, vec!["lv2-a", "lv2-b"]);

        // lv2-b is due but treated as default stage for the session.
        assert_eq!(ids(&result), vec!["lv2-b", "lv2-a", "low"]);
        assert_eq!(result.entries[0].bucket, Some(Bucket::LevelPriority(Level::Lv2)));
        assert_eq!(
            result.entries[0].bucket.map(|b| b.to_string()),
            Some("Lv-priority (Lv2)".to_string())
        );
        assert_eq!(result.entries[2].bucket, None);
    }

    #[test]
    fn unit_filter_applies_to_working_set_and_extras() {
        let deck = vec![
            Question::new(QuestionId::new("u1").expect("id"), QuestionType::Vocab, Level::Lv1, " U1 "),
            Question::new(QuestionId::new("u2").expect("id"), QuestionType::Vocab, Level::Lv1, "U2"),
            Question::new(QuestionId::new("x1").expect("id"), QuestionType::Vocab, Level::Lv2, "U1"),
            Question::new(QuestionId::new("x2").expect("id"), QuestionType::Vocab, Level::Lv2, "U2"),
        ];
        let params = OrderParams::new(5, Level::Lv1, now()).with_unit("U1");
        let result = build_order(&deck, &BTreeMap::new(), &params, &DEFAULT_STAGE_CONFIG);
        assert_eq!(ids(&result), vec!["x1", "u1"]);
    }

    #[test]
    fn review_mode_uses_whole_deck() {
        let deck = vec![
            question("a", Level::Lv1),
            question("b", Level::Lv3),
            question("c", Level::Lv1),
        ];
        let params = OrderParams::new(10, Level::Lv1, now())
            .with_unit("nothing matches")
            .with_mode(DrillMode::Review);
        let result = build_order(&deck, &BTreeMap::new(), &params, &DEFAULT_STAGE_CONFIG);
        assert_eq!(result.len(), 3);
        assert!(result.fallback_extra_ids.is_empty());
        assert_eq!(ids(&result), vec!["b", "a", "c"]);
    }

    #[test]
    fn duplicate_ids_above_ceiling_are_borrowed_once() {
        let deck = vec![question("x", Level::Lv2), question("x", Level::Lv2)];
        let params = OrderParams::new(5, Level::Lv1, now());
        let result = build_order(&deck, &BTreeMap::new(), &params, &DEFAULT_STAGE_CONFIG);
        assert_eq!(result.len(), 1);
        assert_eq!(result.entries[0].deck_index, 0);
    }

    #[test]
    fn entries_serialize_with_labels() {
        let deck = vec![question("due", Level::Lv1)];
        let stats = stats(&[("due", staged("D", Some(-1)))]);
        let params = OrderParams::new(1, Level::Lv1, now());
        let result = build_order(&deck, &stats, &params, &DEFAULT_STAGE_CONFIG);
        let json = serde_json::to_value(&result).expect("serialize");
        assert_eq!(json["entries"][0]["bucket"], "Stage D");
        assert_eq!(json["entries"][0]["deckIndex"], 0);
        assert_eq!(json["entries"][0]["questionId"], "due");
    }
}
