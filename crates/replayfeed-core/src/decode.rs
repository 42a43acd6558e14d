//! Snapshot line decoding.
//!
//! Each blob batch arrives as newline-delimited JSON where every line is a
//! `[window_id, event]` pair. Event payloads may be gzip-compressed and carried
//! as a byte string (one char per byte). A bad line is dropped with a warning;
//! it never takes the rest of the batch down with it.

use flate2::read::GzDecoder;
use serde_json::Value;
use std::io::Read;
use thiserror::Error;
use tracing::warn;

use crate::types::Event;

/// First two bytes of every gzip stream.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Why a single snapshot line was rejected.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("line is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("expected a [window_id, event] pair, got {0}")]
    NotAPair(String),

    #[error("event does not have the replay event shape: {0}")]
    InvalidEvent(#[source] serde_json::Error),

    #[error("compressed payload contains non-byte character U+{0:04X}")]
    NonByteChar(u32),

    #[error("gzip decompression failed: {0}")]
    Gzip(#[source] std::io::Error),

    #[error("decompressed payload is not valid JSON: {0}")]
    PayloadJson(#[source] serde_json::Error),
}

/// An event's `data` field before it is handed out.
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    /// Gzip bytes recovered from a byte string.
    Compressed(Vec<u8>),
    /// Already plain JSON.
    Decoded(Value),
}

impl EventPayload {
    /// Sniff the gzip magic on a raw `data` value.
    pub fn classify(data: Value) -> Result<Self, DecodeError> {
        match data {
            Value::String(text) if has_gzip_magic(&text) => {
                Ok(Self::Compressed(byte_string_to_bytes(&text)?))
            }
            other => Ok(Self::Decoded(other)),
        }
    }

    /// Resolve to the plain JSON value, decompressing if necessary.
    pub fn into_value(self) -> Result<Value, DecodeError> {
        match self {
            Self::Decoded(value) => Ok(value),
            Self::Compressed(bytes) => {
                let mut text = String::new();
                GzDecoder::new(bytes.as_slice())
                    .read_to_string(&mut text)
                    .map_err(DecodeError::Gzip)?;
                serde_json::from_str(&text).map_err(DecodeError::PayloadJson)
            }
        }
    }
}

fn has_gzip_magic(text: &str) -> bool {
    let mut chars = text.chars();
    chars.next() == Some(char::from(GZIP_MAGIC[0]))
        && chars.next() == Some(char::from(GZIP_MAGIC[1]))
}

fn byte_string_to_bytes(text: &str) -> Result<Vec<u8>, DecodeError> {
    text.chars()
        .map(|c| {
            let code = u32::from(c);
            u8::try_from(code).map_err(|_| DecodeError::NonByteChar(code))
        })
        .collect()
}

/// One accepted snapshot line.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedLine {
    pub window_id: Option<String>,
    pub event: Event,
}

/// Decode a single event object and resolve its payload.
pub fn decode_event(value: Value) -> Result<Event, DecodeError> {
    let mut event: Event = serde_json::from_value(value).map_err(DecodeError::InvalidEvent)?;
    let raw = std::mem::take(&mut event.data);
    event.data = EventPayload::classify(raw)?.into_value()?;
    Ok(event)
}

/// Decode one `[window_id, event]` line.
pub fn decode_line(line: &str) -> Result<DecodedLine, DecodeError> {
    let value: Value = serde_json::from_str(line).map_err(DecodeError::InvalidJson)?;

    let mut pair = match value {
        Value::Array(items) if items.len() == 2 => items,
        Value::Array(items) => {
            return Err(DecodeError::NotAPair(format!(
                "array of {} elements",
                items.len()
            )))
        }
        other => return Err(DecodeError::NotAPair(json_kind(&other).to_string())),
    };

    // len == 2 checked above
    let event_value = pair.pop().unwrap_or(Value::Null);
    let window_id = pair.pop().and_then(|v| match v {
        Value::String(s) => Some(s),
        Value::Null => None,
        other => Some(other.to_string()),
    });

    Ok(DecodedLine {
        window_id,
        event: decode_event(event_value)?,
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Result of decoding one batch response body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchDecode {
    pub events: Vec<Event>,
    pub dropped: usize,
}

/// Decode a newline-delimited batch body, dropping malformed lines.
pub fn decode_batch_body(body: &str) -> BatchDecode {
    let mut out = BatchDecode::default();

    for (index, line) in body.split('\n').enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match decode_line(line) {
            Ok(decoded) => out.events.push(decoded.event),
            Err(e) => {
                out.dropped += 1;
                warn!(line = index + 1, error = %e, "Dropping malformed snapshot line");
            }
        }
    }

    out
}
