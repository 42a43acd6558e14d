//! Shared data model: credentials, recordings, blob keys and replay events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::FeedError;

/// Project credentials supplied by the user.
///
/// Serialized as `{projectId, apiKey}` to match the wire format of the
/// internal endpoints and the local credential store.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub api_key: String,
}

impl Credentials {
    pub fn new(project_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            api_key: api_key.into(),
        }
    }

    /// Trim both fields and reject the pair if either one is empty.
    pub fn validated(self) -> Result<Self, FeedError> {
        let project_id = self.project_id.trim().to_string();
        let api_key = self.api_key.trim().to_string();
        if project_id.is_empty() || api_key.is_empty() {
            return Err(FeedError::CredentialsMissing);
        }
        Ok(Self {
            project_id,
            api_key,
        })
    }

    /// Value for the upstream `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.api_key)
    }
}

// The API key never ends up in logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("project_id", &self.project_id)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// One session recording as listed by the upstream catalog.
///
/// Fields the feed does not interpret are kept in `extra` so they are
/// forwarded to the client untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distinct_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub person: Option<Value>,
    #[serde(default)]
    pub recording_duration: Option<f64>,
    #[serde(default)]
    pub click_count: Option<u64>,
    #[serde(default)]
    pub keypress_count: Option<u64>,
    #[serde(default)]
    pub start_url: Option<String>,
    #[serde(default)]
    pub ongoing: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Recording {
    pub fn duration_secs(&self) -> f64 {
        self.recording_duration.unwrap_or(0.0)
    }

    /// Clicks plus keypresses; missing counters count as zero.
    pub fn interaction_count(&self) -> u64 {
        self.click_count
            .unwrap_or(0)
            .saturating_add(self.keypress_count.unwrap_or(0))
    }

    pub fn is_ongoing(&self) -> bool {
        self.ongoing.unwrap_or(false)
    }
}

/// One page of the recording catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordingPage {
    #[serde(default)]
    pub count: usize,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    #[serde(default)]
    pub results: Vec<Recording>,
}

/// Ordinal of one upstream blob within a recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobKey(pub u64);

impl fmt::Display for BlobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single replay event.
///
/// `data` is always a plain JSON value once the event has gone through
/// [`crate::decode`]; compressed payloads never leave the decoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: i64,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Event {
    /// Ordering key: a missing timestamp sorts as 0.
    pub fn sort_timestamp(&self) -> i64 {
        self.timestamp.unwrap_or(0)
    }
}

/// Timestamp-ordered events of one recording.
///
/// Only constructible through [`crate::merge`], which enforces the ordering.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct EventStream {
    events: Vec<Event>,
}

impl EventStream {
    pub(crate) fn from_sorted(events: Vec<Event>) -> Self {
        Self { events }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn into_events(self) -> Vec<Event> {
        self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Milliseconds between the first and last event timestamps.
    pub fn span_ms(&self) -> i64 {
        match (self.events.first(), self.events.last()) {
            (Some(first), Some(last)) => last.sort_timestamp() - first.sort_timestamp(),
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn credentials_are_trimmed_and_required() {
        let creds = Credentials::new("  42 ", " phx_key\n").validated().unwrap();
        assert_eq!(creds.project_id, "42");
        assert_eq!(creds.api_key, "phx_key");
        assert_eq!(creds.bearer(), "Bearer phx_key");

        assert!(matches!(
            Credentials::new("42", "  ").validated(),
            Err(FeedError::CredentialsMissing)
        ));
        assert!(matches!(
            Credentials::new("", "key").validated(),
            Err(FeedError::CredentialsMissing)
        ));
    }

    #[test]
    fn credentials_debug_hides_api_key() {
        let rendered = format!("{:?}", Credentials::new("1", "secret-key"));
        assert!(!rendered.contains("secret-key"));
        assert!(rendered.contains("redacted"));
    }

    #[test]
    fn credentials_use_camel_case_on_the_wire() {
        let creds: Credentials =
            serde_json::from_value(json!({"projectId": "7", "apiKey": "k"})).unwrap();
        assert_eq!(creds, Credentials::new("7", "k"));
    }

    #[test]
    fn recording_keeps_unknown_fields() {
        let recording: Recording = serde_json::from_value(json!({
            "id": "abc",
            "recording_duration": 42,
            "click_count": null,
            "keypress_count": 3,
            "viewed": true
        }))
        .unwrap();

        assert_eq!(recording.duration_secs(), 42.0);
        assert_eq!(recording.interaction_count(), 3);
        assert!(!recording.is_ongoing());
        assert_eq!(recording.extra.get("viewed"), Some(&json!(true)));

        let back = serde_json::to_value(&recording).unwrap();
        assert_eq!(back["viewed"], json!(true));
    }

    #[test]
    fn event_round_trips_extra_fields() {
        let event: Event = serde_json::from_value(json!({
            "type": 3,
            "data": {"source": 1},
            "timestamp": 1700000000000i64,
            "windowId": "w1"
        }))
        .unwrap();
        assert_eq!(event.event_type, 3);
        assert_eq!(event.delay, None);
        assert_eq!(event.extra.get("windowId"), Some(&json!("w1")));
    }
}
