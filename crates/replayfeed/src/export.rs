//! Walk the feed and write each recording's event stream to disk.

use anyhow::{Context, Result};
use replayfeed_client::{list_watchable, HttpClient, UpstreamApi};
use replayfeed_core::{Credentials, EventStream, Recording, RecordingFilter};
use replayfeed_prefetch::{FeedSession, PrefetchHandle, SnapshotSource};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Index in the filtered feed to start from
    pub start: usize,
    pub count: usize,
    pub output: PathBuf,
}

#[derive(Debug, Default)]
pub struct ExportSummary {
    pub written: Vec<PathBuf>,
    /// Recording id and the reason it was skipped
    pub failed: Vec<(String, String)>,
}

/// Collect filtered recordings page by page until `needed` are known or the
/// catalog runs out.
pub async fn collect_recordings<T: HttpClient>(
    api: &UpstreamApi<T>,
    credentials: &Credentials,
    filter: &RecordingFilter,
    needed: usize,
    page_size: usize,
) -> Result<Vec<Recording>> {
    let mut recordings = Vec::new();
    let mut offset = 0;

    loop {
        let page = list_watchable(api, credentials, Some(offset), filter).await?;
        recordings.extend(page.results);

        if recordings.len() >= needed || page.next.is_none() {
            break;
        }
        offset += page_size;
    }

    Ok(recordings)
}

/// Export `options.count` recordings starting at `options.start`, advancing
/// through the session so the prefetch window stays ahead of the writer.
pub async fn export_feed<S: SnapshotSource>(
    session: &mut FeedSession<S>,
    options: &ExportOptions,
) -> Result<ExportSummary> {
    fs::create_dir_all(&options.output).with_context(|| {
        format!(
            "Failed to create output directory {}",
            options.output.display()
        )
    })?;

    let mut summary = ExportSummary::default();
    if options.start >= session.recordings().len() || options.count == 0 {
        return Ok(summary);
    }

    let mut handle = session.go_to(options.start);
    for exported in 0..options.count {
        let Some(recording_id) = session.current().map(|r| r.id.clone()) else {
            break;
        };

        match current_stream(session, &recording_id, &mut handle).await {
            Ok(stream) => {
                let path = write_stream(&options.output, &recording_id, &stream)?;
                info!(
                    recording_id = %recording_id,
                    events = stream.len(),
                    path = %path.display(),
                    "Exported recording"
                );
                summary.written.push(path);
            }
            Err(reason) => {
                warn!(recording_id = %recording_id, reason = %reason, "Skipping recording");
                summary.failed.push((recording_id, reason));
            }
        }

        if exported + 1 == options.count {
            break;
        }
        match session.advance() {
            Some(next) => handle = next,
            None => break,
        }
    }

    Ok(summary)
}

/// Stream of the current recording, retrying the primary fetch once.
async fn current_stream<S: SnapshotSource>(
    session: &FeedSession<S>,
    recording_id: &str,
    handle: &mut PrefetchHandle,
) -> Result<Arc<EventStream>, String> {
    let scheduler = session.scheduler();

    if let Some(Err(e)) = handle.primary().await {
        warn!(recording_id, error = %e, "Primary fetch failed, retrying once");
    }
    if let Some(stream) = scheduler.wait_for(recording_id).await {
        return Ok(stream);
    }

    scheduler
        .retry(recording_id)
        .await
        .map_err(|e| e.to_string())?;
    scheduler
        .wait_for(recording_id)
        .await
        .ok_or_else(|| "recording was not cached after retry".to_string())
}

fn write_stream(dir: &Path, recording_id: &str, stream: &EventStream) -> Result<PathBuf> {
    let file_name: String = recording_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let path = dir.join(format!("{}.json", file_name));

    let content = serde_json::to_vec(stream).context("Failed to serialize event stream")?;
    fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fixed_source::Fixed;
    use replayfeed_prefetch::PrefetchScheduler;
    use serde_json::{json, Value};

    fn recordings(ids: &[&str]) -> Vec<Recording> {
        ids.iter()
            .map(|id| serde_json::from_value(json!({ "id": id })).unwrap())
            .collect()
    }

    fn session(ids: &[&str], empty: &[&str]) -> FeedSession<Fixed> {
        let mut session = FeedSession::new(
            Credentials::new("1", "k"),
            PrefetchScheduler::with_limits(Fixed::new(empty), 3, 3),
        );
        session.load(recordings(ids));
        session
    }

    #[tokio::test]
    async fn test_exports_requested_range() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(&["a", "b", "c", "d"], &[]);
        let options = ExportOptions {
            start: 1,
            count: 2,
            output: dir.path().to_path_buf(),
        };

        let summary = export_feed(&mut session, &options).await.unwrap();
        assert_eq!(
            summary.written,
            vec![dir.path().join("b.json"), dir.path().join("c.json")]
        );
        assert!(summary.failed.is_empty());

        let written: Value =
            serde_json::from_slice(&fs::read(dir.path().join("b.json")).unwrap()).unwrap();
        assert_eq!(written[0]["timestamp"], json!(1));
    }

    #[tokio::test]
    async fn test_empty_recording_is_reported_and_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(&["a", "b", "c"], &["b"]);
        let options = ExportOptions {
            start: 0,
            count: 10,
            output: dir.path().to_path_buf(),
        };

        let summary = export_feed(&mut session, &options).await.unwrap();
        assert_eq!(summary.written.len(), 2);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].0, "b");
        assert!(!dir.path().join("b.json").exists());
    }

    #[test]
    fn test_file_names_are_sanitized() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_stream(dir.path(), "../evil id", &EventStream::empty()).unwrap();
        assert_eq!(path, dir.path().join("___evil_id.json"));
    }

    /// Snapshot source returning one event per recording, or none for ids in `empty`.
    mod fixed_source {
        use replayfeed_core::{EventStream, FeedError};
        use replayfeed_prefetch::SnapshotSource;
        use std::collections::HashSet;

        pub struct Fixed {
            empty: HashSet<String>,
        }

        impl Fixed {
            pub fn new(empty: &[&str]) -> Self {
                Self {
                    empty: empty.iter().map(|s| s.to_string()).collect(),
                }
            }
        }

        #[async_trait::async_trait]
        impl SnapshotSource for Fixed {
            async fn fetch(&self, recording_id: &str) -> Result<EventStream, FeedError> {
                if self.empty.contains(recording_id) {
                    return Ok(EventStream::empty());
                }
                let event = serde_json::from_value(serde_json::json!({
                    "type": 2, "data": {}, "timestamp": 1
                }))
                .map_err(|e| FeedError::Internal(e.to_string()))?;
                Ok(EventStream::from_unsorted(vec![event]))
            }
        }
    }
}
