use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    db::{DuplicatePolicy, StorageKind},
    remote::{FirestoreConfig, RemoteKind},
    selector::SelectionPolicy,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageKind,
    pub path: PathBuf,
    pub duplicate_policy: DuplicatePolicy,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageKind::Sqlite,
            path: PathBuf::from("lab.db"),
            duplicate_policy: DuplicatePolicy::Reject,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    pub policy: SelectionPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub backend: RemoteKind,
    /// Start the memory remote unreachable, to exercise offline labeling.
    pub offline: bool,
    pub firestore: FirestoreConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub selection: SelectionConfig,
    pub remote: RemoteConfig,
    pub catalog_path: PathBuf,
    pub event_capacity: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            selection: SelectionConfig::default(),
            remote: RemoteConfig::default(),
            catalog_path: PathBuf::from("catalog.json"),
            event_capacity: 64,
        }
    }
}

impl AppConfig {
    /// Read the JSON config at `path`. A missing file yields the defaults; a
    /// malformed one is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) if path.exists() => {
                let contents = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config from {}", path.display()))?;
                serde_json::from_str(&contents)
                    .with_context(|| format!("Failed to parse config {}", path.display()))?
            }
            _ => AppConfig::default(),
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `ROILABEL_*` overrides from `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("ROILABEL_DB_PATH") {
            self.storage.path = PathBuf::from(path);
        }
        if let Some(policy) = lookup("ROILABEL_POLICY") {
            self.selection.policy = serde_json::from_value(serde_json::Value::String(
                policy.to_ascii_lowercase(),
            ))
            .with_context(|| format!("ROILABEL_POLICY has unknown value '{policy}'"))?;
        }
        if let Some(offline) = lookup("ROILABEL_OFFLINE") {
            let offline = offline == "1" || offline.eq_ignore_ascii_case("true");
            self.remote.offline = offline;
            if offline {
                self.remote.backend = RemoteKind::Memory;
            }
        }
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let serialized = serde_json::to_string_pretty(self)?;
        fs::write(path, serialized)
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }
}
