#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]

//! # store
//!
//! File-backed key-value store for OAuth sessions and tokens.
//!
//! One JSON file holds the whole map; every operation is a whole-file
//! read or rewrite. This stands in for a session database and makes no
//! concurrency guarantees.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::fs;
use tracing::debug;

/// Errors from the session store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to read store file '{path}': {reason}")]
    FileRead { path: String, reason: String },

    #[error("Failed to write store file '{path}': {reason}")]
    FileWrite { path: String, reason: String },

    #[error("Store file '{path}' is corrupt: {reason}")]
    Corrupt { path: String, reason: String },
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// One OAuth session: which platform it belongs to, the pending OAuth state
/// (pre-callback), and the token payload once the code exchange completed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Platform key ("asana", "clickup", "linear")
    pub platform: String,
    /// OAuth state parameter, present until the callback resolves it
    #[serde(default)]
    pub state: Option<String>,
    /// Token payload returned by the provider, absent until exchanged
    #[serde(default)]
    pub token: Option<Value>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl SessionRecord {
    /// A fresh pre-callback record.
    pub fn pending(platform: impl Into<String>, state: Option<String>) -> Self {
        Self {
            platform: platform.into(),
            state,
            token: None,
            created_at: Utc::now(),
        }
    }

    /// Whether the OAuth exchange has completed for this record.
    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }
}

/// File-backed session store.
#[derive(Debug, Clone)]
pub struct SessionStore {
    file: PathBuf,
}

impl SessionStore {
    /// Create a store rooted at `dir`; records live in `dir/sessions.json`.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            file: dir.as_ref().join("sessions.json"),
        }
    }

    /// Upsert a record.
    pub async fn save(&self, uuid: &str, record: SessionRecord) -> StoreResult<()> {
        let mut map = self.read_all().await?;
        map.insert(uuid.to_string(), record);
        self.write_all(&map).await
    }

    /// Fetch a record by session id.
    pub async fn get(&self, uuid: &str) -> StoreResult<Option<SessionRecord>> {
        Ok(self.read_all().await?.remove(uuid))
    }

    /// Scan for the record carrying the given OAuth state.
    pub async fn find_by_state(&self, state: &str) -> StoreResult<Option<(String, SessionRecord)>> {
        let map = self.read_all().await?;
        Ok(map
            .into_iter()
            .find(|(_, record)| record.state.as_deref() == Some(state)))
    }

    /// Most recent tokenless record for a platform. Covers providers whose
    /// callback carries no state parameter (ClickUp).
    pub async fn find_pending(
        &self,
        platform: &str,
    ) -> StoreResult<Option<(String, SessionRecord)>> {
        let map = self.read_all().await?;
        Ok(map
            .into_iter()
            .filter(|(_, record)| record.platform == platform && !record.has_token())
            .max_by_key(|(_, record)| record.created_at))
    }

    /// Remove a record.
    pub async fn delete(&self, uuid: &str) -> StoreResult<()> {
        let mut map = self.read_all().await?;
        if map.remove(uuid).is_some() {
            self.write_all(&map).await?;
        }
        Ok(())
    }

    async fn read_all(&self) -> StoreResult<HashMap<String, SessionRecord>> {
        match fs::read_to_string(&self.file).await {
            Ok(content) => {
                serde_json::from_str(&content).map_err(|e| StoreError::Corrupt {
                    path: self.file.display().to_string(),
                    reason: e.to_string(),
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(StoreError::FileRead {
                path: self.file.display().to_string(),
                reason: e.to_string(),
            }),
        }
    }

    async fn write_all(&self, map: &HashMap<String, SessionRecord>) -> StoreResult<()> {
        if let Some(parent) = self.file.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::FileWrite {
                    path: self.file.display().to_string(),
                    reason: e.to_string(),
                })?;
        }

        let content = serde_json::to_string_pretty(map).map_err(|e| StoreError::FileWrite {
            path: self.file.display().to_string(),
            reason: e.to_string(),
        })?;

        debug!(path = %self.file.display(), records = map.len(), "Writing session store");

        fs::write(&self.file, content)
            .await
            .map_err(|e| StoreError::FileWrite {
                path: self.file.display().to_string(),
                reason: e.to_string(),
            })
    }
}
