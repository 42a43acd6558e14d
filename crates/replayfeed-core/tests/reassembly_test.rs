// Integration tests for replayfeed-core
//
// Tests the reassembly path from raw batch bodies to a sorted EventStream

use flate2::write::GzEncoder;
use flate2::Compression;
use replayfeed_core::{
    decode_batch_body, merge_batches, partition_keys, BlobKey, SnapshotListing, DEFAULT_BATCH_SIZE,
};
use serde_json::{json, Value};
use std::io::Write;

fn compressed(payload: &Value) -> String {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
    encoder.write_all(payload.to_string().as_bytes()).unwrap();
    encoder.finish().unwrap().into_iter().map(char::from).collect()
}

fn line(window: &str, event: Value) -> String {
    json!([window, event]).to_string()
}

#[test]
fn test_listing_to_batches() {
    let entries: Vec<Value> = (0..45u64)
        .rev()
        .map(|k| json!({"source": "blob_v2", "blob_key": k.to_string()}))
        .collect();
    let listing = SnapshotListing::from_value(json!({ "sources": entries }));
    let keys = listing.blob_keys();
    assert_eq!(keys.first(), Some(&BlobKey(0)));
    assert_eq!(keys.last(), Some(&BlobKey(44)));

    let batches = partition_keys(&keys, DEFAULT_BATCH_SIZE);
    let bounds: Vec<(u64, u64)> = batches.iter().map(|b| (b.start().0, b.end().0)).collect();
    assert_eq!(bounds, vec![(0, 19), (20, 39), (40, 44)]);
}

#[test]
fn test_batches_merge_into_sorted_stream() {
    let batch_one = [
        line("w1", json!({"type": 4, "data": {"href": "https://a"}, "timestamp": 100})),
        line("w1", json!({"type": 3, "data": compressed(&json!({"source": 1})), "timestamp": 300})),
        "[\"w1\"]".to_string(),
    ]
    .join("\n");
    let batch_two = [
        line("w1", json!({"type": 2, "data": compressed(&json!({"node": {"id": 1}})), "timestamp": 200})),
        "{not json".to_string(),
        line("w2", json!({"type": 3, "data": {"source": 2}, "timestamp": 300})),
    ]
    .join("\n");

    let first = decode_batch_body(&batch_one);
    let second = decode_batch_body(&batch_two);
    assert_eq!(first.dropped + second.dropped, 2);

    let stream = merge_batches(vec![first.events, second.events]);
    let order: Vec<(i64, Option<i64>)> = stream
        .events()
        .iter()
        .map(|e| (e.event_type, e.timestamp))
        .collect();
    assert_eq!(
        order,
        vec![(4, Some(100)), (2, Some(200)), (3, Some(300)), (3, Some(300))]
    );

    // Decompressed payloads are plain JSON, and the tie at 300 keeps batch order.
    assert_eq!(stream.events()[1].data, json!({"node": {"id": 1}}));
    assert_eq!(stream.events()[2].data, json!({"source": 1}));
    assert_eq!(stream.events()[3].data, json!({"source": 2}));
    assert!(stream
        .events()
        .iter()
        .all(|e| !matches!(&e.data, Value::String(s) if s.starts_with('\u{1f}'))));
}
