//! Blob key batching.
//!
//! Keys are grouped by position in the sorted sequence, not by numeric range:
//! a batch of 20 keys may span far more than 20 integers when upstream skipped
//! some ordinals.

use crate::types::BlobKey;

/// Blob keys requested per upstream batch call.
pub const DEFAULT_BATCH_SIZE: usize = 20;

/// A contiguous run of sorted blob keys fetched with one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobBatch {
    keys: Vec<BlobKey>,
}

impl BlobBatch {
    /// Inclusive lower bound sent as `start_blob_key`.
    pub fn start(&self) -> BlobKey {
        self.keys[0]
    }

    /// Inclusive upper bound sent as `end_blob_key`.
    pub fn end(&self) -> BlobKey {
        self.keys[self.keys.len() - 1]
    }

    pub fn keys(&self) -> &[BlobKey] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Split sorted keys into batches of at most `batch_size`.
///
/// A `batch_size` of zero is treated as one.
pub fn partition_keys(sorted_keys: &[BlobKey], batch_size: usize) -> Vec<BlobBatch> {
    sorted_keys
        .chunks(batch_size.max(1))
        .map(|chunk| BlobBatch {
            keys: chunk.to_vec(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(values: impl IntoIterator<Item = u64>) -> Vec<BlobKey> {
        values.into_iter().map(BlobKey).collect()
    }

    #[test]
    fn partition_covers_every_key_once_in_order() {
        for n in [0usize, 1, 19, 20, 21, 40, 57] {
            let input = keys((0..n as u64).map(|k| k * 3));
            let batches = partition_keys(&input, DEFAULT_BATCH_SIZE);

            assert_eq!(batches.len(), n.div_ceil(DEFAULT_BATCH_SIZE), "n={}", n);
            assert!(batches.iter().all(|b| !b.is_empty() && b.len() <= 20));

            let flattened: Vec<BlobKey> = batches.iter().flat_map(|b| b.keys().to_vec()).collect();
            assert_eq!(flattened, input, "n={}", n);
        }
    }

    #[test]
    fn bounds_follow_position_not_value() {
        let input = keys([0, 1, 2, 100, 250]);
        let batches = partition_keys(&input, 2);
        assert_eq!(batches.len(), 3);
        assert_eq!((batches[0].start(), batches[0].end()), (BlobKey(0), BlobKey(1)));
        assert_eq!((batches[1].start(), batches[1].end()), (BlobKey(2), BlobKey(100)));
        assert_eq!((batches[2].start(), batches[2].end()), (BlobKey(250), BlobKey(250)));
    }

    #[test]
    fn zero_batch_size_does_not_panic() {
        let batches = partition_keys(&keys([1, 2]), 0);
        assert_eq!(batches.len(), 2);
    }
}
