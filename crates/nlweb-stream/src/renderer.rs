//! # Renderer
//!
//! The presentation seam. The engine calls a [`Renderer`] as the round
//! evolves; the renderer only ever sees shared references and cannot reach
//! back into the session.
//!
//! Content model:
//! - [`on_round_reset`](Renderer::on_round_reset) starts a fresh answer area
//!   and clears the "awaiting" placeholder.
//! - [`on_annotation`](Renderer::on_annotation) appends one block.
//! - [`on_results_reordered`](Renderer::on_results_reordered) replaces the
//!   answer area with the given blocks.
//! - [`on_terminal_state`](Renderer::on_terminal_state) reports how the round
//!   ended, exactly once.

use nlweb_core::ResultItem;
use serde::Serialize;

use crate::accumulator::{Annotation, PresentedBlock};

/// How a query session ended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SessionOutcome {
    /// The server sent `complete`.
    Completed {
        /// Results accumulated in the round.
        result_count: usize,
    },
    /// The session was cancelled by the caller or a newer query.
    Cancelled,
    /// The connection failed permanently.
    Failed {
        /// Retries made before giving up.
        retries: u32,
    },
}

impl SessionOutcome {
    /// Completed without any result.
    #[must_use]
    pub fn is_insufficient(&self) -> bool {
        matches!(self, Self::Completed { result_count: 0 })
    }
}

/// Receives round updates.
pub trait Renderer: Send {
    /// The first event of a round arrived.
    fn on_round_reset(&mut self);

    /// Append an annotation block.
    fn on_annotation(&mut self, annotation: &Annotation);

    /// Replace the answer area with `view`.
    fn on_results_reordered(&mut self, view: &[PresentedBlock<'_>]);

    /// The session ended.
    fn on_terminal_state(&mut self, outcome: &SessionOutcome);
}

// ─────────────────────────────────────────────────────────────────────────────
// RecordingRenderer
// ─────────────────────────────────────────────────────────────────────────────

/// Owned copy of a [`PresentedBlock`].
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "block", rename_all = "snake_case")]
pub enum RenderedBlock {
    /// An annotation slot.
    Annotation(Annotation),
    /// A result item.
    Result(ResultItem),
}

impl From<&PresentedBlock<'_>> for RenderedBlock {
    fn from(block: &PresentedBlock<'_>) -> Self {
        match block {
            PresentedBlock::Annotation(a) => Self::Annotation((*a).clone()),
            PresentedBlock::Result(r) => Self::Result((*r).clone()),
        }
    }
}

/// One renderer call.
#[derive(Clone, Debug, PartialEq)]
pub enum RenderRecord {
    /// [`Renderer::on_round_reset`].
    RoundReset,
    /// [`Renderer::on_annotation`].
    Annotation(Annotation),
    /// [`Renderer::on_results_reordered`].
    Reordered(Vec<RenderedBlock>),
    /// [`Renderer::on_terminal_state`].
    Terminal(SessionOutcome),
}

/// A [`Renderer`] that records every call.
///
/// Used by tests and by hosts that want the final view as data.
#[derive(Clone, Debug, Default)]
pub struct RecordingRenderer {
    /// Calls in order.
    pub records: Vec<RenderRecord>,
}

impl RecordingRenderer {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recent full view.
    #[must_use]
    pub fn last_view(&self) -> Option<&[RenderedBlock]> {
        self.records.iter().rev().find_map(|r| match r {
            RenderRecord::Reordered(view) => Some(view.as_slice()),
            _ => None,
        })
    }

    /// Result items of the most recent view, in order.
    #[must_use]
    pub fn last_results(&self) -> Vec<&ResultItem> {
        self.last_view()
            .unwrap_or_default()
            .iter()
            .filter_map(|b| match b {
                RenderedBlock::Result(r) => Some(r),
                RenderedBlock::Annotation(_) => None,
            })
            .collect()
    }

    /// Appended annotations, in order.
    #[must_use]
    pub fn annotations(&self) -> Vec<&Annotation> {
        self.records
            .iter()
            .filter_map(|r| match r {
                RenderRecord::Annotation(a) => Some(a),
                _ => None,
            })
            .collect()
    }

    /// Terminal outcomes, in order.
    #[must_use]
    pub fn outcomes(&self) -> Vec<&SessionOutcome> {
        self.records
            .iter()
            .filter_map(|r| match r {
                RenderRecord::Terminal(o) => Some(o),
                _ => None,
            })
            .collect()
    }

    /// Number of round resets.
    #[must_use]
    pub fn round_resets(&self) -> usize {
        self.records
            .iter()
            .filter(|r| matches!(r, RenderRecord::RoundReset))
            .count()
    }
}

impl Renderer for RecordingRenderer {
    fn on_round_reset(&mut self) {
        self.records.push(RenderRecord::RoundReset);
    }

    fn on_annotation(&mut self, annotation: &Annotation) {
        self.records.push(RenderRecord::Annotation(annotation.clone()));
    }

    fn on_results_reordered(&mut self, view: &[PresentedBlock<'_>]) {
        self.records
            .push(RenderRecord::Reordered(view.iter().map(RenderedBlock::from).collect()));
    }

    fn on_terminal_state(&mut self, outcome: &SessionOutcome) {
        self.records.push(RenderRecord::Terminal(outcome.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accumulator::AnnotationKind;

    #[test]
    fn records_calls_and_exposes_last_view() {
        let mut renderer = RecordingRenderer::new();
        let note = Annotation::new(AnnotationKind::Summary, "sum".into());
        let first = ResultItem {
            url: "https://a".into(),
            score: 0.2,
            ..ResultItem::default()
        };
        let second = ResultItem {
            url: "https://b".into(),
            score: 0.9,
            ..ResultItem::default()
        };

        renderer.on_round_reset();
        renderer.on_results_reordered(&[PresentedBlock::Result(&first)]);
        renderer.on_results_reordered(&[
            PresentedBlock::Annotation(&note),
            PresentedBlock::Result(&second),
            PresentedBlock::Result(&first),
        ]);
        renderer.on_terminal_state(&SessionOutcome::Completed { result_count: 2 });

        assert_eq!(renderer.round_resets(), 1);
        assert_eq!(renderer.last_view().unwrap().len(), 3);
        let urls: Vec<&str> = renderer.last_results().iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, vec!["https://b", "https://a"]);
        assert_eq!(
            renderer.outcomes(),
            vec![&SessionOutcome::Completed { result_count: 2 }]
        );
    }

    #[test]
    fn insufficient_only_for_empty_completion() {
        assert!(SessionOutcome::Completed { result_count: 0 }.is_insufficient());
        assert!(!SessionOutcome::Completed { result_count: 1 }.is_insufficient());
        assert!(!SessionOutcome::Cancelled.is_insufficient());
        assert!(!SessionOutcome::Failed { retries: 3 }.is_insufficient());
    }

    #[test]
    fn outcome_serializes_with_tag() {
        let json = serde_json::to_value(SessionOutcome::Failed { retries: 3 }).unwrap();
        assert_eq!(json, serde_json::json!({"outcome": "failed", "retries": 3}));
    }

    #[test]
    fn rendered_block_serializes_with_tag() {
        let block = RenderedBlock::Result(ResultItem {
            url: "https://a".into(),
            ..ResultItem::default()
        });
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["block"], "result");
        assert_eq!(json["url"], "https://a");
    }
}
