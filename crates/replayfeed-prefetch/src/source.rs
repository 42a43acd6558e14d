//! Where the scheduler gets recordings from.

use async_trait::async_trait;
use replayfeed_client::{HttpClient, SnapshotPipeline};
use replayfeed_core::{Credentials, EventStream, FeedError};

/// Produces the full event stream of one recording.
#[async_trait]
pub trait SnapshotSource: Send + Sync + 'static {
    async fn fetch(&self, recording_id: &str) -> Result<EventStream, FeedError>;
}

/// A snapshot pipeline bound to one set of credentials.
pub struct CredentialedSource<T: HttpClient> {
    pipeline: SnapshotPipeline<T>,
    credentials: Credentials,
}

impl<T: HttpClient> CredentialedSource<T> {
    pub fn new(pipeline: SnapshotPipeline<T>, credentials: Credentials) -> Self {
        Self {
            pipeline,
            credentials,
        }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }
}

#[async_trait]
impl<T: HttpClient + 'static> SnapshotSource for CredentialedSource<T> {
    async fn fetch(&self, recording_id: &str) -> Result<EventStream, FeedError> {
        self.pipeline
            .fetch_event_stream(&self.credentials, recording_id)
            .await
    }
}
