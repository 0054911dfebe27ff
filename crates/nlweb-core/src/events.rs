//! Wire types for the inbound event stream.
//!
//! Every SSE `data:` payload is a JSON object decoded into a [`StreamEvent`]:
//! an optional `query_id` for correlation plus a [`StreamMessage`] selected by
//! the `message_type` tag. The set of message kinds is closed; a payload with
//! an unknown `message_type` fails to decode and is dropped by the engine.
//!
//! Free-form `message` fields decode into [`MessageContent`], which keeps a
//! structured result list apart from plain text based on the JSON shape.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// ─────────────────────────────────────────────────────────────────────────────
// StreamEvent envelope
// ─────────────────────────────────────────────────────────────────────────────

/// One decoded server event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    /// Query this event belongs to. Absent IDs are accepted without
    /// correlation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_id: Option<String>,
    /// Kind-specific payload.
    #[serde(flatten)]
    pub message: StreamMessage,
}

impl StreamEvent {
    /// Decode a raw `data:` payload.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// StreamMessage: closed set of message kinds
// ─────────────────────────────────────────────────────────────────────────────

/// Message kinds the server can stream for a query.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "message_type", rename_all = "snake_case")]
pub enum StreamMessage {
    /// Server's reading of the query.
    QueryAnalysis {
        /// Fact the user asked to be remembered, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        item_to_remember: Option<String>,
        /// Query rewritten to stand alone without conversation context.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        decontextualized_query: Option<String>,
    },

    /// A remembered fact to display.
    Remember {
        /// Fact text.
        #[serde(default)]
        message: MessageContent,
    },

    /// Which sites are being consulted.
    AskingSites {
        /// Sources text.
        #[serde(default)]
        message: MessageContent,
    },

    /// The selected site cannot answer this query.
    SiteIsIrrelevantToQuery {
        /// Explanation text.
        #[serde(default)]
        message: MessageContent,
    },

    /// The server needs more input from the user.
    AskUser {
        /// Prompt text.
        #[serde(default)]
        message: MessageContent,
    },

    /// Details about a single item.
    ItemDetails {
        /// Details text.
        #[serde(default)]
        message: MessageContent,
    },

    /// A batch of ranked results.
    ResultBatch {
        /// Items in server order.
        #[serde(default, deserialize_with = "lenient_items")]
        results: Vec<ResultItem>,
    },

    /// Progress or status text.
    IntermediateMessage {
        /// Status text.
        #[serde(default)]
        message: MessageContent,
    },

    /// Summary of the results.
    Summary {
        /// Summary text.
        #[serde(default)]
        message: MessageContent,
    },

    /// Authoritative final answer with its supporting items.
    Nlws {
        /// Answer text.
        #[serde(default)]
        answer: MessageContent,
        /// Supporting items.
        #[serde(default, deserialize_with = "lenient_items")]
        items: Vec<ResultItem>,
    },

    /// The server is done with this query.
    Complete,
}

impl StreamMessage {
    /// Wire name of the message kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::QueryAnalysis { .. } => "query_analysis",
            Self::Remember { .. } => "remember",
            Self::AskingSites { .. } => "asking_sites",
            Self::SiteIsIrrelevantToQuery { .. } => "site_is_irrelevant_to_query",
            Self::AskUser { .. } => "ask_user",
            Self::ItemDetails { .. } => "item_details",
            Self::ResultBatch { .. } => "result_batch",
            Self::IntermediateMessage { .. } => "intermediate_message",
            Self::Summary { .. } => "summary",
            Self::Nlws { .. } => "nlws",
            Self::Complete => "complete",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MessageContent
// ─────────────────────────────────────────────────────────────────────────────

/// Free-form message payload.
///
/// A JSON array that decodes as result items becomes [`Items`](Self::Items);
/// a JSON string becomes [`Text`](Self::Text). `null` becomes empty text and
/// any other shape is kept as its compact JSON text.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Structured result list.
    Items(Vec<ResultItem>),
    /// Plain text.
    Text(String),
}

impl MessageContent {
    /// Classify an arbitrary JSON value.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Null => Self::Text(String::new()),
            Value::String(s) => Self::Text(s),
            Value::Array(values) => {
                match serde_json::from_value::<Vec<ResultItem>>(Value::Array(values.clone())) {
                    Ok(items) => Self::Items(items),
                    Err(_) => Self::Text(Value::Array(values).to_string()),
                }
            }
            other => Self::Text(other.to_string()),
        }
    }

    /// Whether there is nothing to show.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Items(items) => items.is_empty(),
            Self::Text(text) => text.is_empty(),
        }
    }

    /// The text, if this is plain text.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Items(_) => None,
        }
    }
}

impl Default for MessageContent {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl From<&str> for MessageContent {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for MessageContent {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl<'de> Deserialize<'de> for MessageContent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Self::from_value(Value::deserialize(deserializer)?))
    }
}

impl fmt::Display for MessageContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Items(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_str(item.display_name())?;
                }
                Ok(())
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ResultItem
// ─────────────────────────────────────────────────────────────────────────────

/// One ranked result. Immutable once received.
///
/// Fields decode leniently: text fields accept numbers and arrays, and the
/// score accepts numeric strings, so one loosely typed field never costs the
/// whole item.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultItem {
    /// Link to the item.
    #[serde(default, deserialize_with = "lenient_text")]
    pub url: String,
    /// Title.
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub name: Option<String>,
    /// Short description.
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<String>,
    /// Ranking score; higher is better. Missing or unreadable scores are 0.
    #[serde(default, deserialize_with = "lenient_score")]
    pub score: f64,
    /// Why the item matched.
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub explanation: Option<String>,
    /// Publication or event time, as sent.
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub time: Option<String>,
    /// Schema.org-style structured data (object or array of objects).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_object: Option<Value>,
    /// Site label.
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub site: Option<String>,
    /// Site home page.
    #[serde(
        default,
        rename = "siteUrl",
        alias = "site_url",
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub site_url: Option<String>,
}

impl ResultItem {
    /// Name to show: `name`, else `schema_object.keywords`, else the URL.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if let Some(name) = self.name.as_deref().filter(|n| !n.is_empty()) {
            return name;
        }
        if let Some(keywords) = self
            .schema()
            .and_then(|s| s.get("keywords"))
            .and_then(Value::as_str)
            .filter(|k| !k.is_empty())
        {
            return keywords;
        }
        &self.url
    }

    /// Primary structured-data object. For an array, the first element.
    #[must_use]
    pub fn schema(&self) -> Option<&serde_json::Map<String, Value>> {
        match self.schema_object.as_ref()? {
            Value::Object(map) => Some(map),
            Value::Array(values) => values.first().and_then(Value::as_object),
            _ => None,
        }
    }

    /// Schema.org `@type` of the primary structured-data object.
    #[must_use]
    pub fn schema_type(&self) -> Option<&str> {
        self.schema()?.get("@type").and_then(Value::as_str)
    }

    /// Image URL from `schema_object.image`, if one can be found.
    #[must_use]
    pub fn image_url(&self) -> Option<&str> {
        extract_image(self.schema()?.get("image")?)
    }
}

/// Resolve an image reference: a URL string, an object with `url` or
/// `contentUrl`, or the first element of an array of either.
fn extract_image(image: &Value) -> Option<&str> {
    match image {
        Value::String(url) => Some(url),
        Value::Object(map) => map
            .get("url")
            .or_else(|| map.get("contentUrl"))
            .and_then(Value::as_str),
        Value::Array(values) => values.first().and_then(extract_image),
        _ => None,
    }
}

/// Text for a loosely typed JSON value. Arrays join their elements.
fn value_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Array(values) => Some(
            values
                .into_iter()
                .filter_map(value_text)
                .collect::<Vec<_>>()
                .join(", "),
        ),
        other => Some(other.to_string()),
    }
}

/// Accept any JSON shape for optional text fields.
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<Value>::deserialize(deserializer)?.and_then(value_text))
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(lenient_string(deserializer)?.unwrap_or_default())
}

/// Accept a number, a numeric string or a boolean; anything else scores 0.
fn lenient_score<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let score = match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        Some(Value::Bool(b)) => f64::from(u8::from(b)),
        _ => 0.0,
    };
    Ok(if score.is_finite() { score } else { 0.0 })
}

/// Decode a result list item by item, skipping entries that are not objects.
fn lenient_items<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<ResultItem>, D::Error> {
    let values = match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(values)) => values,
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(other) => {
            tracing::debug!(value = %other, "result list is not an array, ignoring");
            return Ok(Vec::new());
        }
    };
    Ok(values
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<ResultItem>(value) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::debug!(error = %e, "skipping undecodable result item");
                None
            }
        })
        .collect())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
