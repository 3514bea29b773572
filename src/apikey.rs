//! Completion API key storage.
//!
//! A key set at runtime with /setkey is written to `api_key.json` in the data
//! directory and wins over the key from the config file.

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

const KEY_FILE: &str = "api_key.json";

#[derive(Serialize, Deserialize)]
struct KeyFile {
    api_key: String,
}

pub struct ApiKeyStore {
    path: PathBuf,
    fallback: Option<String>,
    stored: RwLock<Option<String>>,
}

impl ApiKeyStore {
    /// Load a previously stored key from `data_dir`, if any.
    pub fn load(data_dir: &Path, fallback: Option<String>) -> Self {
        let path = data_dir.join(KEY_FILE);
        let stored = match std::fs::read_to_string(&path) {
            Ok(json) => match serde_json::from_str::<KeyFile>(&json) {
                Ok(file) => non_empty(file.api_key),
                Err(e) => {
                    warn!("Ignoring unreadable {}: {e}", path.display());
                    None
                }
            },
            Err(_) => None,
        };
        if stored.is_some() {
            info!("Loaded completion API key from {}", path.display());
        }

        Self {
            path,
            fallback: fallback.and_then(non_empty),
            stored: RwLock::new(stored),
        }
    }

    pub fn get(&self) -> Option<String> {
        self.stored
            .read()
            .expect("api key lock poisoned")
            .clone()
            .or_else(|| self.fallback.clone())
    }

    pub fn set(&self, value: &str) -> Result<(), String> {
        let key = value.trim().to_string();
        if key.is_empty() {
            return Err("API key cannot be empty".to_string());
        }

        let json = serde_json::to_string_pretty(&KeyFile { api_key: key.clone() })
            .map_err(|e| format!("Failed to serialize: {e}"))?;
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| format!("Failed to create data dir: {e}"))?;
        }
        std::fs::write(&self.path, json).map_err(|e| format!("Failed to write: {e}"))?;

        *self.stored.write().expect("api key lock poisoned") = Some(key);
        info!("💾 Saved completion API key to {}", self.path.display());
        Ok(())
    }
}

fn non_empty(s: String) -> Option<String> {
    let s = s.trim().to_string();
    if s.is_empty() { None } else { Some(s) }
}
