//! CLI settings management.
//!
//! Remembers the store backend and the last username between runs.
//! Stored at `~/.config/authkeep/cli.json`.

use std::path::PathBuf;

use anyhow::Result;
use authkeep_core::config::config_dir;
use serde::{Deserialize, Serialize};

use crate::cli::StoreBackend;

/// Settings file name
const SETTINGS_FILE: &str = "cli.json";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CliSettings {
    pub store: Option<StoreBackend>,
    pub last_username: Option<String>,
}

impl CliSettings {
    pub fn load() -> Result<Self> {
        let path = Self::settings_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::settings_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn settings_path() -> Result<PathBuf> {
        Ok(config_dir()?.join(SETTINGS_FILE))
    }

    pub fn store_backend(&self) -> StoreBackend {
        self.store.unwrap_or(StoreBackend::Keyring)
    }
}
