// Snapshot acquisition pipeline
//
// Resolves blob keys, fetches blob ranges one after another, decodes every line
// and merges the result into a single timestamp-ordered EventStream.

use crate::api::UpstreamApi;
use crate::http::HttpClient;
use metrics::{counter, histogram};
use replayfeed_core::{
    decode_batch_body, decode_event, merge_batches, partition_keys, Credentials, EventStream,
    FeedError, SnapshotListing, DEFAULT_BATCH_SIZE,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Turns a recording id into its full event stream.
pub struct SnapshotPipeline<T: HttpClient> {
    api: Arc<UpstreamApi<T>>,
    batch_size: usize,
}

impl<T: HttpClient> Clone for SnapshotPipeline<T> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            batch_size: self.batch_size,
        }
    }
}

impl<T: HttpClient> SnapshotPipeline<T> {
    pub fn new(api: Arc<UpstreamApi<T>>) -> Self {
        Self {
            api,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn api(&self) -> &UpstreamApi<T> {
        &self.api
    }

    /// Fetch and reassemble one recording.
    ///
    /// Only the source listing can fail the pipeline. Failed batches and
    /// malformed lines are logged and skipped, so the stream may be partial or
    /// empty; deciding what an empty stream means is left to the caller.
    #[instrument(skip(self, credentials), fields(project_id = %credentials.project_id))]
    pub async fn fetch_event_stream(
        &self,
        credentials: &Credentials,
        recording_id: &str,
    ) -> Result<EventStream, FeedError> {
        let started = Instant::now();
        let listing = self
            .api
            .list_snapshot_sources(credentials, recording_id)
            .await?;

        let stream = match listing {
            SnapshotListing::Sources(_) => {
                self.fetch_blob_events(credentials, recording_id, &listing)
                    .await
            }
            SnapshotListing::InlineByWindow(_) | SnapshotListing::InlineEvents(_) => {
                debug!(shape = listing.shape(), "Listing carries inline events");
                decode_inline(listing.into_inline_events().unwrap_or_default())
            }
            SnapshotListing::Unrecognized => {
                warn!(
                    recording_id,
                    "Snapshot listing has an unrecognized shape, treating it as empty"
                );
                EventStream::empty()
            }
        };

        histogram!(
            "replayfeed.pipeline.duration_ms",
            started.elapsed().as_secs_f64() * 1000.0
        );
        info!(
            recording_id,
            events = stream.len(),
            span_ms = stream.span_ms(),
            "Recording reassembled"
        );
        Ok(stream)
    }

    async fn fetch_blob_events(
        &self,
        credentials: &Credentials,
        recording_id: &str,
        listing: &SnapshotListing,
    ) -> EventStream {
        let keys = listing.blob_keys();
        if keys.is_empty() {
            debug!(recording_id, "No blob_v2 sources listed");
            return EventStream::empty();
        }

        let batches = partition_keys(&keys, self.batch_size);
        debug!(
            recording_id,
            keys = keys.len(),
            batches = batches.len(),
            "Fetching blob batches"
        );

        let mut decoded = Vec::with_capacity(batches.len());
        // Strictly sequential: one blob range in flight per recording.
        for batch in &batches {
            match self
                .api
                .fetch_blob_batch(credentials, recording_id, batch)
                .await
            {
                Ok(body) => {
                    let result = decode_batch_body(&body);
                    counter!("replayfeed.batches.fetched", 1);
                    if result.dropped > 0 {
                        counter!("replayfeed.lines.dropped", result.dropped as u64);
                    }
                    decoded.push(result.events);
                }
                Err(e) => {
                    counter!("replayfeed.batches.failed", 1);
                    warn!(
                        recording_id,
                        start = %batch.start(),
                        end = %batch.end(),
                        error = %e,
                        "Skipping failed blob batch"
                    );
                }
            }
        }

        merge_batches(decoded)
    }
}

fn decode_inline(raw_events: Vec<Value>) -> EventStream {
    let mut events = Vec::with_capacity(raw_events.len());
    let mut dropped = 0u64;

    for raw in raw_events {
        match decode_event(raw) {
            Ok(event) => events.push(event),
            Err(e) => {
                dropped += 1;
                warn!(error = %e, "Dropping malformed inline event");
            }
        }
    }

    if dropped > 0 {
        counter!("replayfeed.lines.dropped", dropped);
    }
    merge_batches([events])
}
