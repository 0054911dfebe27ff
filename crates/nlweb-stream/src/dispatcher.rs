//! # Message Dispatcher
//!
//! Decodes raw event payloads and applies each message kind's effect to the
//! round, notifying the renderer.
//!
//! Events are dropped without any state change when the payload does not
//! decode, when the event belongs to another query, or when the round has
//! already terminated. The first accepted event of a round resets the
//! presentation and clears the previous round's content.

use nlweb_core::{MessageContent, StreamEvent, StreamMessage};
use tracing::{debug, trace};

use crate::accumulator::{Annotation, AnnotationKind, PresentedBlock, RoundState};
use crate::correlator::SessionCorrelator;
use crate::renderer::Renderer;

/// What happened to one event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// The event was applied to the round.
    Applied,
    /// The event was `complete`; the round is terminated and the connection
    /// closed.
    Completed,
    /// The event was ignored.
    Dropped(DropReason),
}

/// Why an event was ignored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropReason {
    /// The payload is not a known event.
    Malformed,
    /// The event carries another query's ID.
    Mismatched,
    /// The round already terminated.
    Terminated,
}

/// Routes events to their effect on a [`RoundState`].
#[derive(Clone, Copy, Debug, Default)]
pub struct MessageDispatcher;

impl MessageDispatcher {
    /// Create a dispatcher.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Decode and apply one raw payload.
    pub fn dispatch(
        &self,
        raw: &str,
        round: &mut RoundState,
        correlator: &mut SessionCorrelator,
        renderer: &mut dyn Renderer,
    ) -> Dispatch {
        match StreamEvent::from_json(raw) {
            Ok(event) => self.apply(event, round, correlator, renderer),
            Err(e) => {
                debug!(error = %e, payload_len = raw.len(), "dropping undecodable event");
                Dispatch::Dropped(DropReason::Malformed)
            }
        }
    }

    /// Apply one decoded event.
    pub fn apply(
        &self,
        event: StreamEvent,
        round: &mut RoundState,
        correlator: &mut SessionCorrelator,
        renderer: &mut dyn Renderer,
    ) -> Dispatch {
        let kind = event.message.kind();
        if round.is_terminated() {
            debug!(kind, "dropping event after termination");
            return Dispatch::Dropped(DropReason::Terminated);
        }
        if !correlator.correlate(event.query_id.as_deref()).accepts() {
            debug!(
                kind,
                event_query_id = event.query_id.as_deref().unwrap_or_default(),
                active_query_id = %correlator.query_id(),
                "dropping event for another query"
            );
            return Dispatch::Dropped(DropReason::Mismatched);
        }

        if round.is_first_event_pending() {
            renderer.on_round_reset();
            round.begin_round();
        }
        trace!(kind, "applying event");

        match event.message {
            StreamMessage::QueryAnalysis {
                item_to_remember,
                decontextualized_query,
            } => {
                if let Some(query) = decontextualized_query {
                    round.set_decontextualized_query(query);
                }
                if let Some(item) = item_to_remember.filter(|i| !i.trim().is_empty()) {
                    round.push_item_to_remember(item.clone());
                    publish_slot(round, renderer, AnnotationKind::Remember, item.into());
                }
            }
            StreamMessage::Remember { message } => {
                publish_slot(round, renderer, AnnotationKind::Remember, message);
            }
            StreamMessage::ItemDetails { message } => {
                publish_slot(round, renderer, AnnotationKind::ItemDetails, message);
            }
            StreamMessage::AskingSites { message } => {
                let annotation = Annotation::new(AnnotationKind::Sources, message);
                renderer.on_annotation(&annotation);
                round.set_sources(annotation);
            }
            StreamMessage::SiteIsIrrelevantToQuery { message } => {
                renderer.on_annotation(&Annotation::new(AnnotationKind::SiteIrrelevant, message));
            }
            StreamMessage::AskUser { message } => {
                renderer.on_annotation(&Annotation::new(AnnotationKind::AskUser, message));
            }
            StreamMessage::IntermediateMessage { message } => {
                renderer.on_annotation(&Annotation::new(AnnotationKind::Intermediate, message));
            }
            StreamMessage::ResultBatch { results } => {
                round.append_batch(results);
                resort_and_render(round, renderer);
            }
            StreamMessage::Summary { message } => {
                round.set_summary(Annotation::new(AnnotationKind::Summary, message));
                resort_and_render(round, renderer);
            }
            StreamMessage::Nlws { answer, items } => {
                let has_answer = !answer.is_empty();
                if has_answer {
                    round.set_remembered(Annotation::new(AnnotationKind::ItemDetails, answer));
                }
                let start = round.results().len();
                round.append_items(items);

                let answer_block = round
                    .remembered()
                    .filter(|_| has_answer)
                    .map(PresentedBlock::Annotation);
                let view: Vec<PresentedBlock<'_>> = answer_block
                    .into_iter()
                    .chain(round.results()[start..].iter().map(PresentedBlock::Result))
                    .collect();
                renderer.on_results_reordered(&view);
            }
            StreamMessage::Complete => {
                resort_and_render(round, renderer);
                round.terminate();
                correlator.close();
                debug!(results = round.results().len(), "round complete");
                return Dispatch::Completed;
            }
        }
        Dispatch::Applied
    }
}

/// Publish into the remembered slot; empty content publishes nothing.
fn publish_slot(
    round: &mut RoundState,
    renderer: &mut dyn Renderer,
    kind: AnnotationKind,
    content: MessageContent,
) {
    if content.is_empty() {
        return;
    }
    let annotation = Annotation::new(kind, content);
    renderer.on_annotation(&annotation);
    round.set_remembered(annotation);
}

fn resort_and_render(round: &mut RoundState, renderer: &mut dyn Renderer) {
    if round.resort() {
        renderer.on_results_reordered(&round.presented());
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
