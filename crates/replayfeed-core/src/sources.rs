//! Snapshot source listing.
//!
//! The listing endpoint has answered with four different body shapes over
//! time. They are checked in a fixed order and the first match wins:
//!
//! 1. `{"snapshot_data_by_window_id": {window: [event, ...]}}` (inline events)
//! 2. `{"sources": [{"source": "blob_v2", "blob_key": "0"}, ...]}`
//! 3. `[{"source": ..., "blob_key": ...}, ...]` (bare sources array)
//! 4. `{"snapshots": [event, ...]}` (inline events)
//!
//! This is an upstream inconsistency rather than a contract; anything else is
//! treated as an empty listing.

use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeSet;

use crate::types::BlobKey;

/// Source tag of blob-chunked recordings.
pub const BLOB_V2_SOURCE: &str = "blob_v2";

/// One entry of a sources array.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SourceEntry {
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub blob_key: Option<Value>,
}

impl SourceEntry {
    /// Blob key of a `blob_v2` entry; numeric strings and integers are accepted.
    pub fn blob_key(&self) -> Option<BlobKey> {
        if self.source.as_deref() != Some(BLOB_V2_SOURCE) {
            return None;
        }
        match self.blob_key.as_ref()? {
            Value::Number(n) => n.as_u64().map(BlobKey),
            Value::String(s) => s.trim().parse::<u64>().ok().map(BlobKey),
            _ => None,
        }
    }
}

/// Parsed listing body.
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotListing {
    InlineByWindow(Map<String, Value>),
    Sources(Vec<SourceEntry>),
    InlineEvents(Vec<Value>),
    Unrecognized,
}

impl SnapshotListing {
    pub fn from_value(body: Value) -> Self {
        match body {
            Value::Object(mut object) => {
                if let Some(Value::Object(by_window)) = object.remove("snapshot_data_by_window_id")
                {
                    return Self::InlineByWindow(by_window);
                }
                if let Some(Value::Array(entries)) = object.remove("sources") {
                    return Self::Sources(parse_entries(entries));
                }
                if let Some(Value::Array(events)) = object.remove("snapshots") {
                    return Self::InlineEvents(events);
                }
                Self::Unrecognized
            }
            Value::Array(entries) => Self::Sources(parse_entries(entries)),
            _ => Self::Unrecognized,
        }
    }

    /// Unique blob keys in ascending order. Empty for inline shapes.
    pub fn blob_keys(&self) -> Vec<BlobKey> {
        match self {
            Self::Sources(entries) => entries
                .iter()
                .filter_map(SourceEntry::blob_key)
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Raw inline events, window by window, for the inline shapes.
    pub fn into_inline_events(self) -> Option<Vec<Value>> {
        match self {
            Self::InlineByWindow(by_window) => Some(
                by_window
                    .into_iter()
                    .flat_map(|(_, events)| match events {
                        Value::Array(events) => events,
                        _ => Vec::new(),
                    })
                    .collect(),
            ),
            Self::InlineEvents(events) => Some(events),
            Self::Sources(_) | Self::Unrecognized => None,
        }
    }

    pub fn shape(&self) -> &'static str {
        match self {
            Self::InlineByWindow(_) => "snapshot_data_by_window_id",
            Self::Sources(_) => "sources",
            Self::InlineEvents(_) => "snapshots",
            Self::Unrecognized => "unrecognized",
        }
    }
}

// Entries that do not look like sources are skipped individually.
fn parse_entries(entries: Vec<Value>) -> Vec<SourceEntry> {
    entries
        .into_iter()
        .filter_map(|entry| serde_json::from_value(entry).ok())
        .collect()
}
