// Configuration validation
//
// Validates that required fields are present and values are sensible

use crate::*;
use anyhow::{bail, Result};
use tracing::warn;

pub fn validate_config(config: &RuntimeConfig) -> Result<()> {
    validate_server_config(&config.server)?;
    validate_request_config(&config.request)?;
    validate_upstream_config(&config.upstream)?;
    validate_snapshot_config(&config.snapshot)?;
    validate_feed_config(&config.feed)?;

    if config.credentials.path.trim().is_empty() {
        bail!("credentials.path must not be empty");
    }

    Ok(())
}

fn validate_server_config(config: &ServerConfig) -> Result<()> {
    if config.listen_addr.is_empty() {
        bail!("server.listen_addr must not be empty");
    }

    // Basic validation that it looks like an address
    if !config.listen_addr.contains(':') {
        bail!("server.listen_addr must be in format 'host:port'");
    }

    Ok(())
}

fn validate_request_config(config: &RequestConfig) -> Result<()> {
    if config.max_payload_bytes == 0 {
        bail!("request.max_payload_bytes must be greater than 0");
    }

    Ok(())
}

fn validate_upstream_config(config: &UpstreamConfig) -> Result<()> {
    let base_url = config.base_url.trim();
    if base_url.is_empty() {
        bail!("upstream.base_url must not be empty");
    }

    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        bail!("upstream.base_url must start with http:// or https://");
    }

    if config.timeout_secs == 0 {
        bail!("upstream.timeout_secs must be greater than 0");
    }

    if config.list_page_size == 0 {
        bail!("upstream.list_page_size must be greater than 0");
    }

    Ok(())
}

fn validate_snapshot_config(config: &SnapshotConfig) -> Result<()> {
    if config.batch_size == 0 {
        bail!("snapshot.batch_size must be greater than 0");
    }

    // Large ranges make single upstream responses huge
    if config.batch_size > 100 {
        warn!(
            batch_size = config.batch_size,
            "snapshot.batch_size is very large; upstream responses may be slow"
        );
    }

    Ok(())
}

fn validate_feed_config(config: &FeedConfig) -> Result<()> {
    if config.prefetch_window == 0 {
        bail!("feed.prefetch_window must be greater than 0");
    }

    if config.max_concurrent_fetches == 0 {
        bail!("feed.max_concurrent_fetches must be greater than 0");
    }

    if !config.min_duration_secs.is_finite() || config.min_duration_secs < 0.0 {
        bail!("feed.min_duration_secs must be a non-negative number");
    }

    if config.max_concurrent_fetches < config.prefetch_window {
        warn!(
            max_concurrent_fetches = config.max_concurrent_fetches,
            prefetch_window = config.prefetch_window,
            "feed.max_concurrent_fetches is smaller than the prefetch window; prefetches will queue"
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&RuntimeConfig::default()).is_ok());
    }

    #[test]
    fn test_validate_zero_sizes() {
        let mut config = RuntimeConfig::default();
        config.snapshot.batch_size = 0;
        assert!(validate_config(&config)
            .unwrap_err()
            .to_string()
            .contains("snapshot.batch_size"));

        let mut config = RuntimeConfig::default();
        config.feed.prefetch_window = 0;
        assert!(validate_config(&config).is_err());

        let mut config = RuntimeConfig::default();
        config.upstream.list_page_size = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_upstream_url() {
        let mut config = RuntimeConfig::default();
        config.upstream.base_url = "us.posthog.com".to_string();
        assert!(validate_config(&config).is_err());

        config.upstream.base_url = "http://localhost:8000".to_string();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_listen_addr() {
        let mut config = RuntimeConfig::default();
        config.server.listen_addr = "localhost".to_string();
        assert!(validate_config(&config).is_err());
    }
}
