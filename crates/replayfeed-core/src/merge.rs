//! Merge decoded batches into one timestamp-ordered EventStream.

use crate::types::{Event, EventStream};

impl EventStream {
    /// Stable-sort `events` by timestamp; equal timestamps keep their order.
    pub fn from_unsorted(mut events: Vec<Event>) -> Self {
        // slice::sort_by_key is stable
        events.sort_by_key(Event::sort_timestamp);
        Self::from_sorted(events)
    }
}

/// Concatenate per-batch events in batch order and sort the result.
pub fn merge_batches<I>(batches: I) -> EventStream
where
    I: IntoIterator<Item = Vec<Event>>,
{
    let events: Vec<Event> = batches.into_iter().flatten().collect();
    EventStream::from_unsorted(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn event(event_type: i64, timestamp: Option<i64>) -> Event {
        Event {
            event_type,
            data: json!({}),
            timestamp,
            delay: None,
            extra: Map::new(),
        }
    }

    #[test]
    fn merge_sorts_across_batches() {
        let stream = merge_batches(vec![
            vec![event(1, Some(30)), event(2, Some(10))],
            vec![event(3, Some(20))],
        ]);
        let timestamps: Vec<_> = stream.events().iter().map(|e| e.timestamp).collect();
        assert_eq!(timestamps, vec![Some(10), Some(20), Some(30)]);
        assert_eq!(stream.span_ms(), 20);
    }

    #[test]
    fn equal_timestamps_keep_encounter_order() {
        let stream = merge_batches(vec![
            vec![event(1, Some(5)), event(2, Some(1))],
            vec![event(3, Some(5)), event(4, Some(5))],
        ]);
        let types: Vec<_> = stream.events().iter().map(|e| e.event_type).collect();
        assert_eq!(types, vec![2, 1, 3, 4]);
    }

    #[test]
    fn missing_timestamp_sorts_first_without_being_filled_in() {
        let stream = merge_batches(vec![vec![event(1, Some(7)), event(2, None)]]);
        assert_eq!(stream.events()[0].event_type, 2);
        assert_eq!(stream.events()[0].timestamp, None);
    }

    #[test]
    fn empty_input_gives_empty_stream() {
        let stream = merge_batches(Vec::<Vec<Event>>::new());
        assert!(stream.is_empty());
        assert_eq!(stream.span_ms(), 0);
    }
}
