//! Error taxonomy for the recording feed.
//!
//! Per-line decode failures are not represented here: they are recovered inside
//! the decoder (see [`crate::decode::DecodeError`]) and never reach callers.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum FeedError {
    /// 400 - Project id or API key absent
    #[error("project id and API key are required")]
    CredentialsMissing,

    /// Upstream recording catalog returned a non-2xx status
    #[error("failed to fetch recordings: upstream returned HTTP {status}")]
    UpstreamList { status: u16, body: Option<Value> },

    /// Upstream snapshot source listing returned a non-2xx status
    #[error("failed to fetch snapshot sources for recording {recording_id}: upstream returned HTTP {status}")]
    UpstreamSnapshot {
        recording_id: String,
        status: u16,
        body: Option<Value>,
    },

    /// Pipeline finished without a single decodable event
    #[error("recording {recording_id} has no playable events")]
    EmptySnapshot { recording_id: String },

    /// Upstream could not be reached at all
    #[error("upstream request failed: {0}")]
    Transport(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl FeedError {
    /// HTTP status used when this error is returned by the server.
    ///
    /// Upstream statuses are forwarded when they are client or server errors;
    /// anything else upstream sends on failure is reported as a bad gateway.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::CredentialsMissing => 400,
            Self::UpstreamList { status, .. } | Self::UpstreamSnapshot { status, .. } => {
                if (400..=599).contains(status) {
                    *status
                } else {
                    502
                }
            }
            Self::EmptySnapshot { .. } => 404,
            Self::Transport(_) => 502,
            Self::Internal(_) => 500,
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            Self::CredentialsMissing => "CredentialsMissing",
            Self::UpstreamList { .. } => "UpstreamListError",
            Self::UpstreamSnapshot { .. } => "UpstreamSnapshotError",
            Self::EmptySnapshot { .. } => "EmptySnapshotError",
            Self::Transport(_) => "UpstreamUnavailable",
            Self::Internal(_) => "InternalError",
        }
    }

    /// Upstream error body, if the upstream sent one.
    pub fn details(&self) -> Option<&Value> {
        match self {
            Self::UpstreamList { body, .. } | Self::UpstreamSnapshot { body, .. } => body.as_ref(),
            _ => None,
        }
    }

    /// Whether re-running the same fetch could succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::CredentialsMissing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn upstream_status_is_forwarded() {
        let err = FeedError::UpstreamList {
            status: 401,
            body: Some(json!({"detail": "Invalid API key"})),
        };
        assert_eq!(err.status_code(), 401);
        assert_eq!(err.details(), Some(&json!({"detail": "Invalid API key"})));

        let redirect = FeedError::UpstreamSnapshot {
            recording_id: "r1".into(),
            status: 302,
            body: None,
        };
        assert_eq!(redirect.status_code(), 502);
    }

    #[test]
    fn local_errors_have_fixed_statuses() {
        assert_eq!(FeedError::CredentialsMissing.status_code(), 400);
        assert_eq!(FeedError::Internal("boom".into()).status_code(), 500);
        assert_eq!(FeedError::Transport("refused".into()).status_code(), 502);
        assert!(!FeedError::CredentialsMissing.is_retryable());
        assert!(FeedError::EmptySnapshot {
            recording_id: "r".into()
        }
        .is_retryable());
    }
}
