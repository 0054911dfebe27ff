//! # Result Accumulator
//!
//! Per-round state: the result list in arrival order plus three annotation
//! slots (remembered fact, sources, summary) that sit above the results.
//!
//! [`RoundState::resort`] orders results by score, highest first, keeping
//! arrival order among equal scores, and [`RoundState::presented`] lays the
//! round out as `[remembered?, sources?, summary?, ...results]`.

use nlweb_core::{MessageContent, ResultItem};
use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Annotations
// ─────────────────────────────────────────────────────────────────────────────

/// Kind of non-result content published during a round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationKind {
    /// A fact the assistant remembers.
    Remember,
    /// Details about one item, or the final answer text.
    ItemDetails,
    /// Which sites are being consulted.
    Sources,
    /// Summary of the results.
    Summary,
    /// The selected site cannot answer.
    SiteIrrelevant,
    /// The server needs more input.
    AskUser,
    /// Transient progress text.
    Intermediate,
}

/// Non-result content for the current round.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// What the content is.
    pub kind: AnnotationKind,
    /// The content.
    pub content: MessageContent,
}

impl Annotation {
    /// Create an annotation.
    #[must_use]
    pub fn new(kind: AnnotationKind, content: MessageContent) -> Self {
        Self { kind, content }
    }
}

/// One entry in the presented order of a round.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PresentedBlock<'a> {
    /// An annotation slot.
    Annotation(&'a Annotation),
    /// A result item.
    Result(&'a ResultItem),
}

// ─────────────────────────────────────────────────────────────────────────────
// RoundState
// ─────────────────────────────────────────────────────────────────────────────

/// Everything accumulated for one query.
#[derive(Clone, Debug, PartialEq)]
pub struct RoundState {
    is_first_event_pending: bool,
    results: Vec<ResultItem>,
    remembered: Option<Annotation>,
    sources: Option<Annotation>,
    summary: Option<Annotation>,
    is_terminated: bool,
    sent_count: usize,
    items_to_remember: Vec<String>,
    decontextualized_query: Option<String>,
}

impl Default for RoundState {
    fn default() -> Self {
        Self::new()
    }
}

impl RoundState {
    /// A fresh round awaiting its first event.
    #[must_use]
    pub fn new() -> Self {
        Self {
            is_first_event_pending: true,
            results: Vec::new(),
            remembered: None,
            sources: None,
            summary: None,
            is_terminated: false,
            sent_count: 0,
            items_to_remember: Vec::new(),
            decontextualized_query: None,
        }
    }

    /// Whether no event has been processed yet.
    #[must_use]
    pub fn is_first_event_pending(&self) -> bool {
        self.is_first_event_pending
    }

    /// Results, in arrival order until the next resort.
    #[must_use]
    pub fn results(&self) -> &[ResultItem] {
        &self.results
    }

    /// Remembered-fact slot.
    #[must_use]
    pub fn remembered(&self) -> Option<&Annotation> {
        self.remembered.as_ref()
    }

    /// Sources slot.
    #[must_use]
    pub fn sources(&self) -> Option<&Annotation> {
        self.sources.as_ref()
    }

    /// Summary slot.
    #[must_use]
    pub fn summary(&self) -> Option<&Annotation> {
        self.summary.as_ref()
    }

    /// Whether the round has ended; a terminated round never changes.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.is_terminated
    }

    /// Number of items received through result batches.
    #[must_use]
    pub fn sent_count(&self) -> usize {
        self.sent_count
    }

    /// Facts the server asked to remember during this round.
    #[must_use]
    pub fn items_to_remember(&self) -> &[String] {
        &self.items_to_remember
    }

    /// The server's standalone rewrite of the query.
    #[must_use]
    pub fn decontextualized_query(&self) -> Option<&str> {
        self.decontextualized_query.as_deref()
    }

    /// Leave the awaiting state: fresh results buffer, annotation slots
    /// cleared.
    pub(crate) fn begin_round(&mut self) {
        self.is_first_event_pending = false;
        self.results.clear();
        self.remembered = None;
        self.sources = None;
        self.summary = None;
    }

    /// Append result-batch items and count them.
    pub(crate) fn append_batch(&mut self, items: Vec<ResultItem>) {
        self.sent_count += items.len();
        self.results.extend(items);
    }

    /// Append items without counting them as sent.
    pub(crate) fn append_items(&mut self, items: Vec<ResultItem>) {
        self.results.extend(items);
    }

    pub(crate) fn set_remembered(&mut self, annotation: Annotation) {
        self.remembered = Some(annotation);
    }

    pub(crate) fn set_sources(&mut self, annotation: Annotation) {
        self.sources = Some(annotation);
    }

    pub(crate) fn set_summary(&mut self, annotation: Annotation) {
        self.summary = Some(annotation);
    }

    pub(crate) fn push_item_to_remember(&mut self, item: String) {
        self.items_to_remember.push(item);
    }

    pub(crate) fn set_decontextualized_query(&mut self, query: String) {
        self.decontextualized_query = Some(query);
    }

    pub(crate) fn terminate(&mut self) {
        self.is_terminated = true;
    }

    /// Order results by score, highest first.
    ///
    /// The sort is stable, so equal scores keep arrival order. Returns
    /// `false` without touching anything when there are no results.
    pub fn resort(&mut self) -> bool {
        if self.results.is_empty() {
            return false;
        }
        self.results.sort_by(|a, b| b.score.total_cmp(&a.score));
        true
    }

    /// The round in display order: set annotation slots, then results.
    #[must_use]
    pub fn presented(&self) -> Vec<PresentedBlock<'_>> {
        [&self.remembered, &self.sources, &self.summary]
            .into_iter()
            .flatten()
            .map(PresentedBlock::Annotation)
            .chain(self.results.iter().map(PresentedBlock::Result))
            .collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
