//! Per-device chat state kept next to the client config.
//!
//! The file is plain JSON with one section per concern, each keyed by the
//! conversation key string (`task:<id>`, `user:<id>`). A missing or
//! unreadable file is treated as empty.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::ConversationKey;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreData {
    #[serde(default)]
    chat_clear: BTreeMap<String, DateTime<Utc>>,
    #[serde(default)]
    chat_last_read: BTreeMap<String, DateTime<Utc>>,
    #[serde(default)]
    chat_title_overrides: BTreeMap<String, String>,
}

pub struct LocalStore {
    path: PathBuf,
    data: StoreData,
}

impl LocalStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let data = Self::read(&path).unwrap_or_else(|e| {
            if path.exists() {
                tracing::warn!("Ignoring unreadable local store {}: {}", path.display(), e);
            }
            StoreData::default()
        });
        Self { path, data }
    }

    fn read(path: &Path) -> Result<StoreData> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&self.data)?)?;
        Ok(())
    }

    pub fn cleared_at(&self, key: ConversationKey) -> Option<DateTime<Utc>> {
        self.data.chat_clear.get(&key.to_string()).copied()
    }

    pub fn set_cleared(&mut self, key: ConversationKey, at: DateTime<Utc>) -> Result<()> {
        self.data.chat_clear.insert(key.to_string(), at);
        self.save()
    }

    pub fn last_read(&self, key: ConversationKey) -> Option<DateTime<Utc>> {
        self.data.chat_last_read.get(&key.to_string()).copied()
    }

    pub fn set_last_read(&mut self, key: ConversationKey, at: DateTime<Utc>) -> Result<()> {
        self.data.chat_last_read.insert(key.to_string(), at);
        self.save()
    }

    pub fn title_override(&self, key: ConversationKey) -> Option<&str> {
        self.data
            .chat_title_overrides
            .get(&key.to_string())
            .map(String::as_str)
    }

    /// An empty value removes the override.
    pub fn set_title_override(&mut self, key: ConversationKey, value: &str) -> Result<()> {
        let key = key.to_string();
        if value.is_empty() {
            self.data.chat_title_overrides.remove(&key);
        } else {
            self.data.chat_title_overrides.insert(key, value.to_string());
        }
        self.save()
    }
}
