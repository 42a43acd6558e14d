// replayfeed-client - Upstream access for the recording feed
//
// - HttpClient abstraction with a reqwest implementation
// - UpstreamApi: recording catalog, snapshot source listing, blob range fetches
// - SnapshotPipeline: keys -> sequential batches -> decode -> merge
// - list_watchable: catalog page plus the watchability filter

pub mod api;
pub mod http;
pub mod pipeline;
pub mod recordings;

pub use api::UpstreamApi;
pub use http::{HttpClient, HttpResponse, ReqwestHttpClient};
pub use pipeline::SnapshotPipeline;
pub use recordings::list_watchable;

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

/// Production pipeline over reqwest.
pub fn build_pipeline(
    base_url: &str,
    timeout: Duration,
    page_size: usize,
    batch_size: usize,
) -> Result<SnapshotPipeline<ReqwestHttpClient>> {
    let http = ReqwestHttpClient::new(timeout)?;
    let api = Arc::new(UpstreamApi::new(http, base_url, page_size));
    Ok(SnapshotPipeline::new(api).with_batch_size(batch_size))
}
