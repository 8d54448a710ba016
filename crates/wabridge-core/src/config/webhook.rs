//! Persisted webhook record: read-through on every relay decision,
//! write-through on every update.

use crate::error::BridgeError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// Webhook endpoint and the token sent with every call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookConfig {
    #[serde(rename = "webhook_url", default)]
    pub url: String,
    #[serde(rename = "webhook_token", default)]
    pub token: String,
}

impl WebhookConfig {
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
        }
    }

    /// Both fields are present; the relay refuses to run otherwise.
    pub fn is_complete(&self) -> bool {
        !self.url.trim().is_empty() && !self.token.trim().is_empty()
    }
}

/// File-backed store for the webhook record.
///
/// Nothing is cached: each `load` reads the file, so updates are visible to
/// the next reader. Writes go to a temp file that is renamed into place, so
/// a concurrent reader sees either the old or the new record.
#[derive(Debug, Clone)]
pub struct WebhookStore {
    path: PathBuf,
}

impl WebhookStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the record. `Ok(None)` when the file is absent or a field is blank.
    pub fn load(&self) -> Result<Option<WebhookConfig>, BridgeError> {
        if !self.path.exists() {
            debug!("no webhook record at {}", self.path.display());
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)?;
        let record: WebhookConfig = toml::from_str(&content).map_err(|e| {
            BridgeError::Config(format!(
                "failed to parse {}: {e}",
                self.path.display()
            ))
        })?;
        Ok(record.is_complete().then_some(record))
    }

    /// Persist the record, replacing any previous one.
    pub fn save(&self, record: &WebhookConfig) -> Result<(), BridgeError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string(record)
            .map_err(|e| BridgeError::Config(format!("failed to encode webhook record: {e}")))?;

        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "webhook.toml".to_string());
        let tmp = self
            .path
            .with_file_name(format!(".{file_name}.{}.tmp", Uuid::new_v4()));

        std::fs::write(&tmp, content)?;
        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }
}
