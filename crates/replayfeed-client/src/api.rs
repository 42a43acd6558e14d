//! Upstream session recording API
//!
//! Thin wrapper over the three upstream calls the feed needs: the recording
//! catalog, the snapshot source listing, and blob range fetches.

use crate::http::{HttpClient, HttpResponse};
use anyhow::{anyhow, Result};
use replayfeed_core::{BlobBatch, Credentials, FeedError, RecordingPage, SnapshotListing};
use serde_json::Value;
use tracing::{debug, instrument};

/// Upstream API client.
///
/// Generic over HttpClient so tests can substitute canned responses.
pub struct UpstreamApi<T: HttpClient> {
    http: T,
    /// Base URL without trailing slash (e.g., "https://us.posthog.com")
    base_url: String,
    /// `limit` sent to the recording catalog
    page_size: usize,
}

impl<T: HttpClient> UpstreamApi<T> {
    pub fn new(http: T, base_url: impl Into<String>, page_size: usize) -> Self {
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        Self {
            http,
            base_url,
            page_size,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn recordings_url(&self, credentials: &Credentials) -> String {
        format!(
            "{}/api/projects/{}/session_recordings",
            self.base_url,
            urlencoding::encode(&credentials.project_id)
        )
    }

    fn snapshots_url(&self, credentials: &Credentials, recording_id: &str) -> String {
        format!(
            "{}/{}/snapshots",
            self.recordings_url(credentials),
            urlencoding::encode(recording_id)
        )
    }

    fn headers(credentials: &Credentials) -> Vec<(String, String)> {
        vec![
            ("Authorization".to_string(), credentials.bearer()),
            ("Accept".to_string(), "application/json".to_string()),
        ]
    }

    async fn get(&self, url: &str, credentials: &Credentials) -> Result<HttpResponse, FeedError> {
        self.http
            .get(url, Self::headers(credentials))
            .await
            .map_err(|e| FeedError::Transport(format!("{:#}", e)))
    }

    /// List one page of recordings, unfiltered.
    ///
    /// Calls: GET /api/projects/{project}/session_recordings?limit={page_size}
    #[instrument(skip(self, credentials), fields(project_id = %credentials.project_id))]
    pub async fn list_recordings(
        &self,
        credentials: &Credentials,
        offset: Option<usize>,
    ) -> Result<RecordingPage, FeedError> {
        let mut url = format!("{}?limit={}", self.recordings_url(credentials), self.page_size);
        if let Some(offset) = offset {
            url.push_str(&format!("&offset={}", offset));
        }

        debug!("Listing recordings from: {}", url);
        let response = self.get(&url, credentials).await?;

        if !response.is_success() {
            return Err(FeedError::UpstreamList {
                status: response.status,
                body: response.error_body(),
            });
        }

        response
            .json::<RecordingPage>()
            .map_err(|e| FeedError::Internal(format!("invalid recordings response: {}", e)))
    }

    /// List the snapshot sources of a recording.
    ///
    /// Calls: GET .../session_recordings/{id}/snapshots?blob_v2=true
    #[instrument(skip(self, credentials), fields(project_id = %credentials.project_id))]
    pub async fn list_snapshot_sources(
        &self,
        credentials: &Credentials,
        recording_id: &str,
    ) -> Result<SnapshotListing, FeedError> {
        let url = format!("{}?blob_v2=true", self.snapshots_url(credentials, recording_id));

        debug!("Listing snapshot sources from: {}", url);
        let response = self.get(&url, credentials).await?;

        if !response.is_success() {
            return Err(FeedError::UpstreamSnapshot {
                recording_id: recording_id.to_string(),
                status: response.status,
                body: response.error_body(),
            });
        }

        let body: Value = response.json().map_err(|e| {
            FeedError::Internal(format!("invalid snapshot source listing: {}", e))
        })?;
        Ok(SnapshotListing::from_value(body))
    }

    /// Fetch the raw newline-delimited body of one blob range.
    ///
    /// Calls: GET .../snapshots?source=blob_v2&start_blob_key={start}&end_blob_key={end}
    #[instrument(
        skip(self, credentials, batch),
        fields(start = %batch.start(), end = %batch.end())
    )]
    pub async fn fetch_blob_batch(
        &self,
        credentials: &Credentials,
        recording_id: &str,
        batch: &BlobBatch,
    ) -> Result<String> {
        let url = format!(
            "{}?source=blob_v2&start_blob_key={}&end_blob_key={}",
            self.snapshots_url(credentials, recording_id),
            batch.start(),
            batch.end()
        );

        let response = self
            .http
            .get(&url, Self::headers(credentials))
            .await?;

        if !response.is_success() {
            return Err(anyhow!(
                "blob range {}..={} returned HTTP {}",
                batch.start(),
                batch.end(),
                response.status
            ));
        }

        Ok(response.body_string())
    }
}

#[cfg(test)]
impl UpstreamApi<mock::MockHttpClient> {
    pub(crate) fn http_urls(&self) -> Vec<String> {
        self.http.urls()
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use crate::http::{HttpClient, HttpResponse};
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Mock HTTP client replaying canned responses in order.
    /// `Err` entries simulate transport failures.
    pub(crate) struct MockHttpClient {
        responses: Mutex<VecDeque<Result<HttpResponse, String>>>,
        pub(crate) requests: Mutex<Vec<(String, Vec<(String, String)>)>>,
    }

    impl MockHttpClient {
        pub(crate) fn new(responses: Vec<Result<HttpResponse, String>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn urls(&self) -> Vec<String> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .map(|(url, _)| url.clone())
                .collect()
        }
    }

    pub(crate) fn ok(body: impl Into<Vec<u8>>) -> Result<HttpResponse, String> {
        status(200, body)
    }

    pub(crate) fn status(code: u16, body: impl Into<Vec<u8>>) -> Result<HttpResponse, String> {
        Ok(HttpResponse {
            status: code,
            headers: Vec::new(),
            body: body.into(),
        })
    }

    #[async_trait]
    impl HttpClient for MockHttpClient {
        async fn request(
            &self,
            _method: &str,
            url: &str,
            headers: Vec<(String, String)>,
            _body: Option<Vec<u8>>,
        ) -> Result<HttpResponse> {
            self.requests
                .lock()
                .unwrap()
                .push((url.to_string(), headers));
            match self.responses.lock().unwrap().pop_front() {
                Some(Ok(response)) => Ok(response),
                Some(Err(message)) => Err(anyhow!(message)),
                None => Err(anyhow!("No more mock responses")),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::{ok, status, MockHttpClient};
    use super::*;
    use replayfeed_core::{partition_keys, BlobKey};
    use serde_json::json;

    fn creds() -> Credentials {
        Credentials::new("12345", "phx_secret")
    }

    #[tokio::test]
    async fn test_list_recordings_request_shape() {
        let body = json!({"count": 1, "next": null, "previous": null, "results": [{"id": "r1"}]});
        let api = UpstreamApi::new(
            MockHttpClient::new(vec![ok(body.to_string())]),
            "https://us.posthog.com/",
            50,
        );

        let page = api.list_recordings(&creds(), Some(100)).await.unwrap();
        assert_eq!(page.results.len(), 1);

        let requests = api.http.requests.lock().unwrap();
        let (url, headers) = &requests[0];
        assert_eq!(
            url,
            "https://us.posthog.com/api/projects/12345/session_recordings?limit=50&offset=100"
        );
        assert!(headers
            .iter()
            .any(|(k, v)| k == "Authorization" && v == "Bearer phx_secret"));
    }

    #[tokio::test]
    async fn test_list_recordings_forwards_upstream_status() {
        let api = UpstreamApi::new(
            MockHttpClient::new(vec![status(401, r#"{"detail":"bad key"}"#)]),
            "https://us.posthog.com",
            50,
        );

        match api.list_recordings(&creds(), None).await {
            Err(FeedError::UpstreamList { status, body }) => {
                assert_eq!(status, 401);
                assert_eq!(body, Some(json!({"detail": "bad key"})));
            }
            other => panic!("expected UpstreamList error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_transport_failure_is_reported() {
        let api = UpstreamApi::new(
            MockHttpClient::new(vec![Err("connection refused".to_string())]),
            "https://us.posthog.com",
            50,
        );
        assert!(matches!(
            api.list_snapshot_sources(&creds(), "r1").await,
            Err(FeedError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_snapshot_urls() {
        let api = UpstreamApi::new(
            MockHttpClient::new(vec![
                ok(json!({"sources": []}).to_string()),
                ok("line"),
            ]),
            "http://localhost:8000",
            50,
        );

        let listing = api.list_snapshot_sources(&creds(), "rec/1").await.unwrap();
        assert!(listing.blob_keys().is_empty());

        let batch = &partition_keys(&[BlobKey(3), BlobKey(9)], 20)[0];
        let body = api.fetch_blob_batch(&creds(), "rec/1", batch).await.unwrap();
        assert_eq!(body, "line");

        assert_eq!(
            api.http.urls(),
            vec![
                "http://localhost:8000/api/projects/12345/session_recordings/rec%2F1/snapshots?blob_v2=true",
                "http://localhost:8000/api/projects/12345/session_recordings/rec%2F1/snapshots?source=blob_v2&start_blob_key=3&end_blob_key=9",
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_blob_batch_is_an_error() {
        let api = UpstreamApi::new(
            MockHttpClient::new(vec![status(500, "oops")]),
            "http://localhost:8000",
            50,
        );
        let batch = &partition_keys(&[BlobKey(0)], 20)[0];
        let err = api.fetch_blob_batch(&creds(), "r", batch).await.unwrap_err();
        assert!(err.to_string().contains("HTTP 500"));
    }
}
