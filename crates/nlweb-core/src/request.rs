//! Outbound query request.
//!
//! A [`QueryRequest`] is built once per user query and never mutated after
//! it is sent. [`QueryRequest::query_pairs`] produces the query-string
//! parameters the `/ask` endpoint expects, in the order the server logs
//! them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ids::QueryId;

/// How the server should shape its answer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerateMode {
    /// Ranked list of matching items.
    #[default]
    List,
    /// Ranked list plus a summary.
    Summarize,
    /// Generated natural-language answer.
    Generate,
}

impl GenerateMode {
    /// All modes, in the order offered to users.
    pub const ALL: [Self; 3] = [Self::List, Self::Summarize, Self::Generate];

    /// Wire name of the mode.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Summarize => "summarize",
            Self::Generate => "generate",
        }
    }
}

impl fmt::Display for GenerateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown generate mode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownGenerateMode(pub String);

impl fmt::Display for UnknownGenerateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown generate mode '{}' (expected list, summarize, or generate)",
            self.0
        )
    }
}

impl std::error::Error for UnknownGenerateMode {}

impl FromStr for GenerateMode {
    type Err = UnknownGenerateMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "list" => Ok(Self::List),
            "summarize" => Ok(Self::Summarize),
            "generate" => Ok(Self::Generate),
            _ => Err(UnknownGenerateMode(s.to_owned())),
        }
    }
}

/// One user query, as sent to the server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Correlation ID echoed by the server in every event.
    pub query_id: QueryId,
    /// The natural-language query text.
    pub query: String,
    /// Site to restrict the search to.
    pub site: Option<String>,
    /// Answer shape.
    pub generate_mode: GenerateMode,
    /// Earlier queries in the same conversation, oldest first.
    pub prior_turns: Vec<String>,
    /// Fact the user asked the assistant to remember.
    pub item_to_remember: Option<String>,
    /// Page the query was issued from.
    pub context_url: Option<String>,
}

impl QueryRequest {
    /// Create a request for `query` with a freshly generated [`QueryId`].
    #[must_use]
    pub fn new(query: impl Into<String>, generate_mode: GenerateMode) -> Self {
        Self {
            query_id: QueryId::new(),
            query: query.into(),
            site: None,
            generate_mode,
            prior_turns: Vec::new(),
            item_to_remember: None,
            context_url: None,
        }
    }

    /// Restrict to a site. Empty strings are treated as "no site".
    #[must_use]
    pub fn with_site(mut self, site: Option<String>) -> Self {
        self.site = site.filter(|s| !s.is_empty());
        self
    }

    /// Attach prior conversation turns.
    #[must_use]
    pub fn with_prior_turns(mut self, turns: Vec<String>) -> Self {
        self.prior_turns = turns;
        self
    }

    /// Attach a fact to remember.
    #[must_use]
    pub fn with_item_to_remember(mut self, item: Option<String>) -> Self {
        self.item_to_remember = item;
        self
    }

    /// Attach the originating page URL.
    #[must_use]
    pub fn with_context_url(mut self, url: Option<String>) -> Self {
        self.context_url = url;
        self
    }

    /// Encode as query-string parameters.
    ///
    /// `site` is omitted when unset; `item_to_remember` and `context_url`
    /// are always sent, as empty strings when unset. `prev` is the
    /// JSON-encoded array of prior turns.
    pub fn query_pairs(&self) -> Result<Vec<(&'static str, String)>, serde_json::Error> {
        let prev = serde_json::to_string(&self.prior_turns)?;
        let mut pairs = Vec::with_capacity(7);
        pairs.push(("query_id", self.query_id.to_string()));
        pairs.push(("query", self.query.clone()));
        if let Some(site) = &self.site {
            pairs.push(("site", site.clone()));
        }
        pairs.push(("generate_mode", self.generate_mode.to_string()));
        pairs.push(("prev", prev));
        pairs.push((
            "item_to_remember",
            self.item_to_remember.clone().unwrap_or_default(),
        ));
        pairs.push(("context_url", self.context_url.clone().unwrap_or_default()));
        Ok(pairs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
