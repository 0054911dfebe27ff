//! Terminal rendering of a streaming round.
//!
//! A terminal cannot redraw earlier output, so annotations print as they
//! arrive while the ordered result view is held and printed once the round
//! ends.

use std::io::Write;

use nlweb_core::ResultItem;
use nlweb_stream::{
    Annotation, AnnotationKind, PresentedBlock, RenderedBlock, Renderer, SessionOutcome,
};
use serde_json::Value;

/// Shown when a round completes without results.
pub const INSUFFICIENT_RESULTS: &str =
    "I couldn't find any results that are relevant to your query.";

const LISTING_TYPES: [&str; 6] = [
    "SingleFamilyResidence",
    "Apartment",
    "Townhouse",
    "House",
    "Condominium",
    "RealEstateListing",
];

/// Plain-text [`Renderer`] writing to any [`Write`].
pub struct TerminalRenderer<W> {
    out: W,
    view: Vec<RenderedBlock>,
}

impl<W: Write + Send> TerminalRenderer<W> {
    /// Render into `out`.
    pub fn new(out: W) -> Self {
        Self {
            out,
            view: Vec::new(),
        }
    }

    /// Recover the writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, text: &str) {
        if let Err(e) = writeln!(self.out, "{text}") {
            tracing::debug!(error = %e, "terminal write failed");
        }
    }

    fn print_view(&mut self) {
        let view = std::mem::take(&mut self.view);
        let mut rank = 0;
        for block in &view {
            match block {
                RenderedBlock::Annotation(annotation) => self.line(&annotation_line(annotation)),
                RenderedBlock::Result(item) => {
                    rank += 1;
                    for line in result_lines(rank, item) {
                        self.line(&line);
                    }
                }
            }
        }
        let _ = self.out.flush();
    }
}

impl<W: Write + Send> Renderer for TerminalRenderer<W> {
    fn on_round_reset(&mut self) {
        self.view.clear();
        self.line("");
    }

    fn on_annotation(&mut self, annotation: &Annotation) {
        self.line(&annotation_line(annotation));
        let _ = self.out.flush();
    }

    fn on_results_reordered(&mut self, view: &[PresentedBlock<'_>]) {
        self.view = view.iter().map(RenderedBlock::from).collect();
    }

    fn on_terminal_state(&mut self, outcome: &SessionOutcome) {
        self.print_view();
        match outcome {
            SessionOutcome::Completed { result_count: 0 } => self.line(INSUFFICIENT_RESULTS),
            SessionOutcome::Completed { .. } => {}
            SessionOutcome::Cancelled => self.line("(cancelled)"),
            SessionOutcome::Failed { retries } => self.line(&format!(
                "Lost connection to the server after {retries} retries. Please try again."
            )),
        }
        let _ = self.out.flush();
    }
}

fn annotation_line(annotation: &Annotation) -> String {
    let tag = match annotation.kind {
        AnnotationKind::Remember => "remembered",
        AnnotationKind::ItemDetails => "details",
        AnnotationKind::Sources => "sources",
        AnnotationKind::Summary => "summary",
        AnnotationKind::SiteIrrelevant => "note",
        AnnotationKind::AskUser => "question",
        AnnotationKind::Intermediate => "status",
    };
    format!("[{tag}] {}", annotation.content)
}

fn result_lines(rank: usize, item: &ResultItem) -> Vec<String> {
    let mut heading = format!("{rank}. {}", item.display_name());
    if let Some(site) = item.site.as_deref().filter(|s| !s.is_empty()) {
        heading.push_str(&format!("  [{site}]"));
    }
    heading.push_str(&format!("  ({:.2})", item.score));

    let mut lines = vec![heading, format!("   {}", item.url)];
    let extra = [item.explanation.as_deref(), item.description.as_deref()];
    lines.extend(
        extra
            .into_iter()
            .flatten()
            .filter(|t| !t.is_empty())
            .map(|t| format!("   {t}")),
    );
    if let Some(image) = item.image_url() {
        lines.push(format!("   image: {image}"));
    }
    lines.extend(listing_details(item).into_iter().map(|l| format!("   {l}")));
    lines
}

/// Address, room and price lines for real-estate listings.
pub fn listing_details(item: &ResultItem) -> Vec<String> {
    let Some(schema) = item.schema() else {
        return Vec::new();
    };
    if !item.schema_type().is_some_and(|t| LISTING_TYPES.contains(&t)) {
        return Vec::new();
    }

    let mut lines = Vec::new();
    let address = schema.get("address");
    let street = address.and_then(|a| a.get("streetAddress")).and_then(Value::as_str);
    let locality = address.and_then(|a| a.get("addressLocality")).and_then(Value::as_str);
    if let (Some(street), Some(locality)) = (street, locality) {
        lines.push(format!("{street}, {locality}"));
    }

    let bedrooms = schema.get("numberOfRooms").and_then(display_value);
    let bathrooms = schema.get("numberOfBathroomsTotal").and_then(display_value);
    let sqft = schema
        .get("floorSize")
        .and_then(|f| f.get("value"))
        .and_then(display_value);
    if let (Some(bedrooms), Some(bathrooms), Some(sqft)) = (bedrooms, bathrooms, sqft) {
        lines.push(format!("{bedrooms} bedrooms, {bathrooms} bathrooms, {sqft} sqft"));
    }

    if let Some(price) = schema.get("price").and_then(listing_price) {
        lines.push(format!("Listed at {price}"));
    }
    lines
}

/// Non-empty, non-zero scalar as text.
fn display_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        _ => None,
    }
}

/// A bare price is shown as sent; a price object is rounded to the nearest
/// 100,000 and grouped with commas.
fn listing_price(price: &Value) -> Option<String> {
    match price {
        Value::Object(map) => {
            let amount = map.get("price").or_else(|| map.get("value"))?;
            let amount = match amount {
                Value::Number(n) => n.as_f64()?,
                Value::String(s) => s.trim().parse().ok()?,
                _ => return None,
            };
            #[allow(clippy::cast_possible_truncation)]
            let rounded = ((amount / 100_000.0).round() * 100_000.0) as i64;
            Some(group_thousands(rounded))
        }
        other => display_value(other),
    }
}

fn group_thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
