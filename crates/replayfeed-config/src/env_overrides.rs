use super::{LogFormat, RuntimeConfig};
use anyhow::{anyhow, Result};
use std::str::FromStr;

pub const ENV_PREFIX: &str = "REPLAYFEED_";

/// Abstraction over environment-variable lookups so tests and embedders can
/// supply their own source of overrides.
pub trait EnvSource {
    fn get(&self, key: &str) -> Option<String>;

    /// Get an environment variable WITHOUT the REPLAYFEED_ prefix
    /// Used for the upstream's own conventional variables (POSTHOG_HOST)
    fn get_raw(&self, key: &str) -> Option<String>;
}

/// Apply environment-variable overrides (highest priority) to the runtime config.
pub fn apply_env_overrides<E: EnvSource>(config: &mut RuntimeConfig, env: &E) -> Result<()> {
    // Server configuration (listen addr, log level/format)
    if let Some(addr) = env.get("LISTEN_ADDR") {
        config.server.listen_addr = addr;
    }
    if let Some(level) = env.get("LOG_LEVEL") {
        config.server.log_level = level;
    }
    if let Some(format) = env.get("LOG_FORMAT") {
        config.server.log_format = match format.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        };
    }

    // Request configuration
    if let Some(val) = get_env_parsed(env, "MAX_PAYLOAD_BYTES")? {
        config.request.max_payload_bytes = val;
    }

    // Upstream API; the prefixed variable beats the conventional one
    if let Some(url) = env.get("UPSTREAM_URL").or_else(|| env.get_raw("POSTHOG_HOST")) {
        config.upstream.base_url = url;
    }
    if let Some(val) = get_env_parsed(env, "UPSTREAM_TIMEOUT_SECS")? {
        config.upstream.timeout_secs = val;
    }
    if let Some(val) = get_env_parsed(env, "LIST_PAGE_SIZE")? {
        config.upstream.list_page_size = val;
    }

    // Snapshot acquisition
    if let Some(val) = get_env_parsed(env, "SNAPSHOT_BATCH_SIZE")? {
        config.snapshot.batch_size = val;
    }

    // Feed
    if let Some(val) = get_env_parsed(env, "PREFETCH_WINDOW")? {
        config.feed.prefetch_window = val;
    }
    if let Some(val) = get_env_parsed(env, "MIN_DURATION_SECS")? {
        config.feed.min_duration_secs = val;
    }
    if let Some(val) = get_env_parsed(env, "MIN_INTERACTIONS")? {
        config.feed.min_interactions = val;
    }
    if let Some(val) = get_env_parsed(env, "MAX_CONCURRENT_FETCHES")? {
        config.feed.max_concurrent_fetches = val;
    }

    // Credential store
    if let Some(path) = env.get("CREDENTIALS_PATH") {
        config.credentials.path = path;
    }

    Ok(())
}

fn get_env_parsed<E, T>(env: &E, key: &str) -> Result<Option<T>>
where
    E: EnvSource,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env.get(key) {
        Some(val) => {
            let parsed = val
                .trim()
                .parse::<T>()
                .map_err(|e| anyhow!("Failed to parse {}{}: {}", ENV_PREFIX, key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}
