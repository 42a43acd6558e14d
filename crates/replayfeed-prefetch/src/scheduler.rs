//! Recording cache and prefetch scheduler.
//!
//! The scheduler keeps its state behind one lock: the cache of reassembled
//! streams, the set of recording ids currently being fetched, and the current
//! recording with its active error.
//! An id is reserved in the in-flight set before any network call and released
//! when the fetch ends, whatever the outcome. Two callers asking for the same
//! recording therefore start one pipeline between them.
//!
//! The lock is only taken in short synchronous sections and never across an
//! await point.

use crate::source::SnapshotSource;
use futures::future::join_all;
use metrics::counter;
use parking_lot::Mutex;
use replayfeed_core::{EventStream, FeedError};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Notify, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub const DEFAULT_PREFETCH_WINDOW: usize = 5;
pub const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 5;

/// What `ensure_fetched` ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Already cached; nothing fetched.
    Cached,
    /// Another caller is fetching it; nothing started.
    InFlight,
    /// Fetched and stored in the cache.
    Stored,
    /// Background fetch failed or came back empty; the slot stays empty.
    Discarded,
}

/// Failure of the recording the user is looking at.
#[derive(Debug, Clone)]
pub struct PrimaryError {
    pub recording_id: String,
    pub error: FeedError,
}

#[derive(Default)]
struct FetchState {
    cache: HashMap<String, Arc<EventStream>>,
    in_flight: HashSet<String>,
    /// Recording most recently requested as primary.
    primary: Option<String>,
    active_error: Option<PrimaryError>,
}

impl FetchState {
    /// Record a failure, but only while it belongs to the current recording.
    fn report_failure(&mut self, recording_id: &str, error: &FeedError) -> bool {
        if self.primary.as_deref() != Some(recording_id) {
            return false;
        }
        self.active_error = Some(PrimaryError {
            recording_id: recording_id.to_string(),
            error: error.clone(),
        });
        true
    }
}

/// Releases an in-flight reservation on drop, so cancelled or panicking
/// fetches never leave an id stuck.
struct Reservation {
    state: Arc<Mutex<FetchState>>,
    released: Arc<Notify>,
    recording_id: String,
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.state.lock().in_flight.remove(&self.recording_id);
        self.released.notify_waiters();
    }
}

/// Join handles for one prefetch window.
#[derive(Debug, Default)]
pub struct PrefetchHandle {
    primary: Option<JoinHandle<Result<FetchOutcome, FeedError>>>,
    background: Vec<JoinHandle<Result<FetchOutcome, FeedError>>>,
}

impl PrefetchHandle {
    /// Number of recordings covered by the window.
    pub fn len(&self) -> usize {
        self.background.len() + usize::from(self.primary.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait for the primary recording only; background fetches keep running.
    pub async fn primary(&mut self) -> Option<Result<FetchOutcome, FeedError>> {
        let handle = self.primary.take()?;
        Some(flatten_join(handle.await))
    }

    /// Wait for every fetch in the window. Primary first, then background in
    /// window order.
    pub async fn join(self) -> Vec<Result<FetchOutcome, FeedError>> {
        let handles = self.primary.into_iter().chain(self.background);
        join_all(handles).await.into_iter().map(flatten_join).collect()
    }
}

fn flatten_join(
    joined: Result<Result<FetchOutcome, FeedError>, tokio::task::JoinError>,
) -> Result<FetchOutcome, FeedError> {
    joined.unwrap_or_else(|e| Err(FeedError::Internal(format!("fetch task failed: {}", e))))
}

/// Cache plus prefetch policy for one credentials session.
pub struct PrefetchScheduler<S: SnapshotSource> {
    source: Arc<S>,
    state: Arc<Mutex<FetchState>>,
    released: Arc<Notify>,
    permits: Arc<Semaphore>,
    window: usize,
}

impl<S: SnapshotSource> Clone for PrefetchScheduler<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            state: Arc::clone(&self.state),
            released: Arc::clone(&self.released),
            permits: Arc::clone(&self.permits),
            window: self.window,
        }
    }
}

impl<S: SnapshotSource> PrefetchScheduler<S> {
    pub fn new(source: S) -> Self {
        Self::with_limits(source, DEFAULT_PREFETCH_WINDOW, DEFAULT_MAX_CONCURRENT_FETCHES)
    }

    pub fn with_limits(source: S, window: usize, max_concurrent_fetches: usize) -> Self {
        Self {
            source: Arc::new(source),
            state: Arc::new(Mutex::new(FetchState::default())),
            released: Arc::new(Notify::new()),
            permits: Arc::new(Semaphore::new(max_concurrent_fetches.max(1))),
            window: window.max(1),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Cached stream for a recording, if it has been fetched.
    pub fn get(&self, recording_id: &str) -> Option<Arc<EventStream>> {
        let hit = self.state.lock().cache.get(recording_id).cloned();
        if hit.is_some() {
            counter!("replayfeed.cache.hits", 1);
        } else {
            counter!("replayfeed.cache.misses", 1);
        }
        hit
    }

    pub fn is_cached(&self, recording_id: &str) -> bool {
        self.state.lock().cache.contains_key(recording_id)
    }

    pub fn is_in_flight(&self, recording_id: &str) -> bool {
        self.state.lock().in_flight.contains(recording_id)
    }

    pub fn cached_count(&self) -> usize {
        self.state.lock().cache.len()
    }

    /// Last failure of the current recording, until it is retried or the
    /// user moves to another recording.
    pub fn active_error(&self) -> Option<PrimaryError> {
        self.state.lock().active_error.clone()
    }

    /// Wait until no fetch of `recording_id` is in flight, then return what
    /// the cache holds for it.
    pub async fn wait_for(&self, recording_id: &str) -> Option<Arc<EventStream>> {
        loop {
            let released = self.released.notified();
            tokio::pin!(released);
            // Register before checking so a release in between is not missed.
            released.as_mut().enable();

            if !self.is_in_flight(recording_id) {
                return self.get(recording_id);
            }
            released.await;
        }
    }

    /// Make sure a recording is cached, fetching it unless it is cached or
    /// already being fetched.
    ///
    /// A primary request makes `recording_id` the current recording and clears
    /// the previous active error, even when nothing needs fetching.
    ///
    /// Errors are returned for primary fetches only. A failure becomes the
    /// active error whenever the recording is current by the time the fetch
    /// ends, including a background fetch the user caught up with. Other
    /// background failures are logged and reported as `Discarded`.
    pub async fn ensure_fetched(
        &self,
        recording_id: &str,
        is_primary: bool,
    ) -> Result<FetchOutcome, FeedError> {
        let reservation = {
            let mut state = self.state.lock();
            if is_primary {
                state.primary = Some(recording_id.to_string());
                state.active_error = None;
            }
            if state.cache.contains_key(recording_id) {
                return Ok(FetchOutcome::Cached);
            }
            if !state.in_flight.insert(recording_id.to_string()) {
                return Ok(FetchOutcome::InFlight);
            }
            Reservation {
                state: Arc::clone(&self.state),
                released: Arc::clone(&self.released),
                recording_id: recording_id.to_string(),
            }
        };

        let result = self.run_pipeline(recording_id).await;

        let outcome = match result {
            Ok(stream) => {
                debug!(recording_id, events = stream.len(), "Caching recording");
                self.state
                    .lock()
                    .cache
                    .insert(recording_id.to_string(), Arc::new(stream));
                Ok(FetchOutcome::Stored)
            }
            Err(error) => {
                let current = self.state.lock().report_failure(recording_id, &error);
                if current {
                    warn!(recording_id, error = %error, "Current recording failed");
                    counter!("replayfeed.fetch.primary_failures", 1);
                } else {
                    debug!(recording_id, error = %error, "Background prefetch discarded");
                    counter!("replayfeed.fetch.background_failures", 1);
                }
                if is_primary {
                    Err(error)
                } else {
                    Ok(FetchOutcome::Discarded)
                }
            }
        };

        drop(reservation);
        outcome
    }

    async fn run_pipeline(&self, recording_id: &str) -> Result<EventStream, FeedError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| FeedError::Internal(format!("fetch limiter closed: {}", e)))?;

        let stream = self.source.fetch(recording_id).await?;
        if stream.is_empty() {
            return Err(FeedError::EmptySnapshot {
                recording_id: recording_id.to_string(),
            });
        }
        Ok(stream)
    }

    /// Start fetches for `[from, min(from + window, len))`. Only the recording
    /// at `from` is primary.
    ///
    /// Fetches run as spawned tasks; the caller may drop the handle without
    /// cancelling them.
    pub fn prefetch_from<I: AsRef<str>>(
        &self,
        recording_ids: &[I],
        from: usize,
    ) -> PrefetchHandle {
        let end = from.saturating_add(self.window).min(recording_ids.len());
        if from >= end {
            return PrefetchHandle::default();
        }

        info!(from, end, total = recording_ids.len(), "Prefetching window");
        let mut handle = PrefetchHandle::default();
        for (index, id) in recording_ids[from..end].iter().enumerate() {
            let is_primary = index == 0;
            let task = self.spawn_fetch(id.as_ref().to_string(), is_primary);
            if is_primary {
                handle.primary = Some(task);
            } else {
                handle.background.push(task);
            }
        }
        handle
    }

    fn spawn_fetch(
        &self,
        recording_id: String,
        is_primary: bool,
    ) -> JoinHandle<Result<FetchOutcome, FeedError>> {
        let scheduler = self.clone();
        tokio::spawn(async move { scheduler.ensure_fetched(&recording_id, is_primary).await })
    }

    /// Re-run the primary fetch of one recording after a failure.
    pub async fn retry(&self, recording_id: &str) -> Result<FetchOutcome, FeedError> {
        info!(recording_id, "Retrying recording");
        self.ensure_fetched(recording_id, true).await
    }
}
