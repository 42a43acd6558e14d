// replayfeed-prefetch - Recording cache and prefetch scheduling
//
// PrefetchScheduler keeps decoded recordings in memory and fetches the current
// recording plus the next few ahead of the viewer, with at most one pipeline in
// flight per recording. FeedSession tracks the position in a recording list for
// one set of credentials.

pub mod scheduler;
pub mod session;
pub mod source;

pub use scheduler::{
    FetchOutcome, PrefetchHandle, PrefetchScheduler, PrimaryError, DEFAULT_MAX_CONCURRENT_FETCHES,
    DEFAULT_PREFETCH_WINDOW,
};
pub use session::{FeedSession, SessionSlot};
pub use source::{CredentialedSource, SnapshotSource};
