//! Recording watchability filter.

use crate::types::{Recording, RecordingPage};

/// Keeps recordings that are long enough, saw some interaction, and are finished.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordingFilter {
    pub min_duration_secs: f64,
    pub min_interactions: u64,
}

impl Default for RecordingFilter {
    fn default() -> Self {
        Self {
            min_duration_secs: 30.0,
            min_interactions: 1,
        }
    }
}

impl RecordingFilter {
    pub fn accepts(&self, recording: &Recording) -> bool {
        recording.duration_secs() >= self.min_duration_secs
            && recording.interaction_count() >= self.min_interactions
            && !recording.is_ongoing()
    }

    /// Filter a page in place. `count` becomes the filtered count; the
    /// upstream pagination cursors are kept as-is.
    pub fn apply(&self, page: RecordingPage) -> RecordingPage {
        let results: Vec<Recording> = page
            .results
            .into_iter()
            .filter(|recording| self.accepts(recording))
            .collect();

        RecordingPage {
            count: results.len(),
            next: page.next,
            previous: page.previous,
            results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page(results: serde_json::Value) -> RecordingPage {
        serde_json::from_value(json!({
            "count": 120,
            "next": "https://upstream/next",
            "previous": null,
            "results": results
        }))
        .unwrap()
    }

    #[test]
    fn keeps_only_watchable_recordings() {
        let filtered = RecordingFilter::default().apply(page(json!([
            {"id": "short", "recording_duration": 10, "click_count": 5, "keypress_count": 5, "ongoing": false},
            {"id": "idle", "recording_duration": 40, "click_count": 0, "keypress_count": 0, "ongoing": false},
            {"id": "good", "recording_duration": 40, "click_count": 1, "keypress_count": 0, "ongoing": false}
        ])));

        assert_eq!(filtered.count, 1);
        assert_eq!(filtered.results[0].id, "good");
        assert_eq!(filtered.next.as_deref(), Some("https://upstream/next"));
        assert_eq!(filtered.previous, None);
    }

    #[test]
    fn ongoing_recordings_are_dropped() {
        let filtered = RecordingFilter::default().apply(page(json!([
            {"id": "live", "recording_duration": 300, "click_count": 4, "ongoing": true},
            {"id": "done", "recording_duration": 300, "keypress_count": 2}
        ])));
        let ids: Vec<_> = filtered.results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["done"]);
    }

    #[test]
    fn boundaries_are_inclusive() {
        let filter = RecordingFilter::default();
        let recording: Recording = serde_json::from_value(json!({
            "id": "edge", "recording_duration": 30, "click_count": 0, "keypress_count": 1
        }))
        .unwrap();
        assert!(filter.accepts(&recording));
    }
}
