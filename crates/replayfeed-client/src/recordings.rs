//! Filtered recording catalog.

use crate::api::UpstreamApi;
use crate::http::HttpClient;
use replayfeed_core::{Credentials, FeedError, RecordingFilter, RecordingPage};
use tracing::debug;

/// Fetch one catalog page and keep only watchable recordings.
pub async fn list_watchable<T: HttpClient>(
    api: &UpstreamApi<T>,
    credentials: &Credentials,
    offset: Option<usize>,
    filter: &RecordingFilter,
) -> Result<RecordingPage, FeedError> {
    let page = api.list_recordings(credentials, offset).await?;
    let upstream_count = page.results.len();
    let filtered = filter.apply(page);

    debug!(
        upstream = upstream_count,
        kept = filtered.count,
        "Filtered recording page"
    );
    Ok(filtered)
}
