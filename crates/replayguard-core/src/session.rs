//! Session data model (spec §3, file format in spec §6.1).
//!
//! Grounded on the teacher's `record_replay.rs::RecordedRequest` serde shape,
//! generalized from a single request/response pair per fixture file to an
//! ordered session of many interactions, matching spec.md's session format.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tokio::fs;

/// A query parameter value: either a single string or a repeated list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryValue {
    /// `?a=1`
    Single(String),
    /// `?a=1&a=2`
    Multi(Vec<String>),
}

impl QueryValue {
    /// Convert to a [`serde_json::Value`] for canonicalization.
    pub fn to_value(&self) -> serde_json::Value {
        match self {
            Self::Single(s) => serde_json::Value::String(s.clone()),
            Self::Multi(items) => {
                serde_json::Value::Array(items.iter().cloned().map(serde_json::Value::String).collect())
            }
        }
    }
}

/// A captured HTTP request (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    /// Always stored/compared uppercased.
    pub method: String,
    /// Request path, excluding query string.
    pub path: String,
    /// Query parameters.
    #[serde(default)]
    pub query: BTreeMap<String, QueryValue>,
    /// Headers, with sensitive keys redacted at capture time.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Request body, or `None` if there was none.
    #[serde(default)]
    pub body: Option<serde_json::Value>,
}

/// A captured or replayed HTTP response (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    /// HTTP status code.
    pub status_code: u16,
    /// Optional status line message (e.g. "Not Found").
    #[serde(default)]
    pub status_message: Option<String>,
    /// Response headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Response body: structured value, raw string, or `None`.
    #[serde(default)]
    pub body: Option<serde_json::Value>,
}

/// One request/response pair within a session (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interaction {
    /// Capture timestamp.
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Canonical fingerprint computed at record time (spec §4.B).
    pub request_hash: String,
    /// Free-form tags attached at capture time.
    #[serde(default)]
    pub tags: Vec<String>,
    /// The recorded request.
    pub request: Request,
    /// The recorded (baseline) response.
    pub response: Response,
    /// Recorded wall-clock duration of the original call, if known.
    #[serde(default)]
    pub duration: Option<f64>,
}

/// Session-level metadata (spec §3, §6.1).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetadata {
    /// Free-form tags for the whole session.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// When the session was created.
    #[serde(default)]
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    /// The environment the baseline was captured against (e.g. "staging").
    #[serde(default)]
    pub environment: Option<String>,
    /// Who or what produced the session.
    #[serde(default)]
    pub creator: Option<String>,
    /// Any other metadata the capture middleware attached.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// An immutable, ordered recording of HTTP interactions (spec §3, §6.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Stable session identifier.
    pub session_id: String,
    /// When the session file was written.
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Session-level metadata.
    #[serde(default)]
    pub metadata: SessionMetadata,
    /// Interactions, in recording order.
    pub interactions: Vec<Interaction>,
}

impl Session {
    /// Load a session from a JSON file on disk.
    pub async fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| Error::input(format!("failed to read session {}: {e}", path.display())))?;
        let session: Self = serde_json::from_str(&content)
            .map_err(|e| Error::input(format!("failed to parse session {}: {e}", path.display())))?;
        Ok(session)
    }

    /// Number of interactions in the session.
    pub fn len(&self) -> usize {
        self.interactions.len()
    }

    /// Whether the session has no interactions.
    pub fn is_empty(&self) -> bool {
        self.interactions.is_empty()
    }
}

/// List every `*.json` session file under a directory, newest first.
///
/// Grounded on the teacher's `record_replay.rs::list_fixtures`, generalized
/// from a single-response fixture tree to whole session files.
pub async fn list_sessions(dir: &Path) -> Result<Vec<Session>> {
    let mut sessions = Vec::new();

    if !dir.exists() {
        return Ok(sessions);
    }

    let walker = globwalk::GlobWalkerBuilder::from_patterns(dir, &["*.json"])
        .build()
        .map_err(|e| Error::generic(format!("failed to build glob walker: {e}")))?;

    for entry in walker {
        let entry = entry.map_err(|e| Error::generic(format!("failed to read directory entry: {e}")))?;
        let path = entry.path();
        if path.is_file() {
            if let Ok(content) = fs::read_to_string(&path).await {
                if let Ok(session) = serde_json::from_str::<Session>(&content) {
                    sessions.push(session);
                }
            }
        }
    }

    sessions.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    Ok(sessions)
}

/// A one-line summary of a session, for `session list`.
pub fn session_summary(session: &Session) -> String {
    format!(
        "{} ({} interactions, captured {})",
        session.session_id,
        session.len(),
        session.timestamp.to_rfc3339()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_value_round_trips_single_and_multi() {
        let single: QueryValue = serde_json::from_str("\"a\"").unwrap();
        assert_eq!(single, QueryValue::Single("a".to_string()));
        let multi: QueryValue = serde_json::from_str("[\"a\", \"b\"]").unwrap();
        assert_eq!(multi, QueryValue::Multi(vec!["a".to_string(), "b".to_string()]));
    }

    #[tokio::test]
    async fn load_rejects_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        tokio::fs::write(&path, "{not json").await.unwrap();
        let result = Session::load(&path).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn list_sessions_sorts_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let make = |id: &str, ts: &str| {
            serde_json::json!({
                "sessionId": id,
                "timestamp": ts,
                "metadata": {},
                "interactions": [],
            })
            .to_string()
        };
        tokio::fs::write(dir.path().join("old.json"), make("old", "2023-01-01T00:00:00Z"))
            .await
            .unwrap();
        tokio::fs::write(dir.path().join("new.json"), make("new", "2024-01-01T00:00:00Z"))
            .await
            .unwrap();

        let sessions = list_sessions(dir.path()).await.unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].session_id, "new");
    }
}
