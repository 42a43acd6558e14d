//! Feed navigation for one set of credentials.

use crate::scheduler::{PrefetchHandle, PrefetchScheduler};
use crate::source::SnapshotSource;
use replayfeed_core::{Credentials, EventStream, Recording};
use std::sync::Arc;
use tracing::info;

/// A filtered recording list, the current position in it, and the scheduler
/// that keeps the upcoming recordings warm.
pub struct FeedSession<S: SnapshotSource> {
    credentials: Credentials,
    recordings: Vec<Recording>,
    ids: Vec<String>,
    position: usize,
    scheduler: PrefetchScheduler<S>,
}

impl<S: SnapshotSource> FeedSession<S> {
    pub fn new(credentials: Credentials, scheduler: PrefetchScheduler<S>) -> Self {
        Self {
            credentials,
            recordings: Vec::new(),
            ids: Vec::new(),
            position: 0,
            scheduler,
        }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn scheduler(&self) -> &PrefetchScheduler<S> {
        &self.scheduler
    }

    pub fn recordings(&self) -> &[Recording] {
        &self.recordings
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Replace the recording list and go back to the first recording.
    pub fn load(&mut self, recordings: Vec<Recording>) {
        self.ids = recordings.iter().map(|r| r.id.clone()).collect();
        self.recordings = recordings;
        self.position = 0;
    }

    pub fn current(&self) -> Option<&Recording> {
        self.recordings.get(self.position)
    }

    /// Stream of the current recording, once it is cached.
    pub fn current_stream(&self) -> Option<Arc<EventStream>> {
        self.current()
            .and_then(|recording| self.scheduler.get(&recording.id))
    }

    /// Prefetch the window at the current position.
    pub fn refresh(&self) -> PrefetchHandle {
        self.scheduler.prefetch_from(&self.ids, self.position)
    }

    /// Jump to `index` and prefetch from there. Out-of-range indexes are
    /// clamped to the last recording.
    pub fn go_to(&mut self, index: usize) -> PrefetchHandle {
        self.position = index.min(self.ids.len().saturating_sub(1));
        self.refresh()
    }

    /// Move to the next recording. Returns `None` at the end of the list.
    pub fn advance(&mut self) -> Option<PrefetchHandle> {
        if self.position + 1 >= self.ids.len() {
            return None;
        }
        self.position += 1;
        Some(self.refresh())
    }
}

/// Holds at most one session and replaces it when credentials change.
pub struct SessionSlot<S: SnapshotSource> {
    session: Option<FeedSession<S>>,
}

impl<S: SnapshotSource> Default for SessionSlot<S> {
    fn default() -> Self {
        Self { session: None }
    }
}

impl<S: SnapshotSource> SessionSlot<S> {
    /// Session bound to `credentials`. A session for other credentials is
    /// dropped along with its cache, and a fresh scheduler is built.
    pub fn session_for<F>(
        &mut self,
        credentials: &Credentials,
        make_scheduler: F,
    ) -> &mut FeedSession<S>
    where
        F: FnOnce(&Credentials) -> PrefetchScheduler<S>,
    {
        let stale = self
            .session
            .as_ref()
            .is_some_and(|session| session.credentials() != credentials);
        if stale {
            info!("Credentials changed, discarding feed session");
            self.session = None;
        }

        self.session.get_or_insert_with(|| {
            FeedSession::new(credentials.clone(), make_scheduler(credentials))
        })
    }

    pub fn current(&self) -> Option<&FeedSession<S>> {
        self.session.as_ref()
    }

    pub fn clear(&mut self) {
        self.session = None;
    }
}
