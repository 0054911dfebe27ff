//! Query identifier newtype.
//!
//! Every outbound request carries a [`QueryId`] that the server echoes back
//! in each event. The client uses it to drop events that belong to a stale
//! or cancelled query.
//!
//! IDs follow the `query_<unix-millis>_<suffix>` shape the server already
//! logs, so they are readable in server traces. The suffix is a UUID v7 in
//! simple form, which keeps IDs unique even within one millisecond.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier stamped on one query and every event streamed for it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryId(String);

impl QueryId {
    /// Generate a fresh ID from the current time and a UUID v7 suffix.
    #[must_use]
    pub fn new() -> Self {
        let millis = chrono::Utc::now().timestamp_millis();
        Self(format!("query_{millis}_{}", Uuid::now_v7().simple()))
    }

    /// Create from an existing string value.
    #[must_use]
    pub fn from_string(s: String) -> Self {
        Self(s)
    }

    /// Return the inner string as a slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume self and return the inner `String`.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Default for QueryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for QueryId {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for QueryId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for QueryId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for QueryId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl PartialEq<str> for QueryId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn new_has_query_prefix_and_three_parts() {
        let id = QueryId::new();
        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "query");
        assert!(parts[1].parse::<i64>().is_ok());
        let suffix = Uuid::parse_str(parts[2]).unwrap();
        assert_eq!(suffix.get_version(), Some(uuid::Version::SortRand));
    }

    #[test]
    fn new_is_unique_within_a_burst() {
        let ids: HashSet<QueryId> = (0..2000).map(|_| QueryId::new()).collect();
        assert_eq!(ids.len(), 2000);
    }

    #[test]
    fn serde_is_transparent() {
        let id = QueryId::from("query_1_2");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"query_1_2\"");
        let back: QueryId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn compares_against_str() {
        let id = QueryId::from("q1");
        assert!(id == *"q1");
        assert_eq!(id.as_str(), "q1");
        assert_eq!(id.to_string(), "q1");
    }
}
