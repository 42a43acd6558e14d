//! Local credential storage for the command-line client.
//!
//! Credentials live in a small JSON document under a fixed key, next to any
//! other keys the document may already hold. No key means logged out.

use anyhow::{Context, Result};
use replayfeed_core::Credentials;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const CREDENTIALS_KEY: &str = "replayfeed.credentials";

pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored credentials, or `None` when logged out.
    pub fn load(&self) -> Result<Option<Credentials>> {
        let mut document = self.read_document()?;
        let Some(stored) = document.remove(CREDENTIALS_KEY) else {
            return Ok(None);
        };

        let credentials: Credentials = serde_json::from_value(stored).with_context(|| {
            format!("Malformed credentials in {}", self.path.display())
        })?;
        Ok(Some(credentials))
    }

    pub fn save(&self, credentials: &Credentials) -> Result<()> {
        let mut document = self.read_document()?;
        document.insert(
            CREDENTIALS_KEY.to_string(),
            serde_json::to_value(credentials).context("Failed to serialize credentials")?,
        );
        self.write_document(&document)?;
        debug!(path = %self.path.display(), "Saved credentials");
        Ok(())
    }

    /// Remove stored credentials. Returns whether any were present.
    pub fn clear(&self) -> Result<bool> {
        let mut document = self.read_document()?;
        if document.remove(CREDENTIALS_KEY).is_none() {
            return Ok(false);
        }
        self.write_document(&document)?;
        Ok(true)
    }

    fn read_document(&self) -> Result<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }

        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        if content.trim().is_empty() {
            return Ok(Map::new());
        }

        match serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", self.path.display()))?
        {
            Value::Object(map) => Ok(map),
            _ => anyhow::bail!("{} is not a JSON object", self.path.display()),
        }
    }

    fn write_document(&self, document: &Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let content =
            serde_json::to_string_pretty(document).context("Failed to serialize credential store")?;
        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }
}
