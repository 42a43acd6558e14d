// replayfeed-core - Session replay data model and snapshot reassembly
//
// Pure transformation logic shared by the client, scheduler and server crates:
// - Recording catalog types and the watchability filter
// - Blob key listing shapes and batch partitioning
// - Per-line snapshot decoding (with gzip payload sniffing)
// - Timestamp merge into a single EventStream
//
// Nothing here performs I/O; the HTTP side lives in replayfeed-client.

pub mod decode;
pub mod error;
pub mod filter;
pub mod merge;
pub mod partition;
pub mod sources;
pub mod types;

pub use decode::{
    decode_batch_body, decode_event, decode_line, BatchDecode, DecodeError, DecodedLine,
    EventPayload,
};
pub use error::FeedError;
pub use filter::RecordingFilter;
pub use merge::merge_batches;
pub use partition::{partition_keys, BlobBatch, DEFAULT_BATCH_SIZE};
pub use sources::{SnapshotListing, SourceEntry, BLOB_V2_SOURCE};
pub use types::{BlobKey, Credentials, Event, EventStream, Recording, RecordingPage};
