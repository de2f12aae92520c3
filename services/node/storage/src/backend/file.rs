//! File-based configuration store (one JSON document)

use crate::{ConfigStore, NodeConfig, StorageError};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Configuration persisted as pretty-printed JSON.
///
/// Saves write a sibling temporary file and rename it over the target, so a
/// crash mid-save leaves either the old or the new document.
#[derive(Debug)]
pub struct FileConfigStore {
    path: PathBuf,
    config: NodeConfig,
}

impl FileConfigStore {
    /// Open the store at `path`.
    ///
    /// A missing file is created with defaults. A file that cannot be parsed
    /// is left untouched and defaults are used until the next save.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut store = Self {
            config: NodeConfig::default(),
            path,
        };

        match std::fs::read_to_string(&store.path) {
            Ok(content) => match Self::parse(&store.path, &content) {
                Ok(config) => {
                    info!(path = %store.path.display(), node_id = config.node_id, "Loaded node configuration");
                    store.config = config;
                }
                Err(e) => {
                    warn!(path = %store.path.display(), "Using defaults: {}", e);
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %store.path.display(), "No saved configuration, writing defaults");
                store.save()?;
            }
            Err(e) => return Err(e.into()),
        }

        Ok(store)
    }

    /// Location of the configuration file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parse(path: &Path, content: &str) -> Result<NodeConfig, StorageError> {
        serde_json::from_str(content).map_err(|e| {
            StorageError::Corruption(format!("Invalid config file {}: {}", path.display(), e))
        })
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl ConfigStore for FileConfigStore {
    fn config(&self) -> &NodeConfig {
        &self.config
    }

    fn config_mut(&mut self) -> &mut NodeConfig {
        &mut self.config
    }

    fn save(&mut self) -> Result<(), StorageError> {
        let content = serde_json::to_string_pretty(&self.config)?;
        let temp = self.temp_path();
        std::fs::write(&temp, content)?;
        std::fs::rename(&temp, &self.path)?;
        debug!(path = %self.path.display(), "Configuration saved");
        Ok(())
    }

    fn factory_reset(&mut self) -> Result<(), StorageError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        info!(path = %self.path.display(), "Configuration wiped, restoring defaults");
        self.config = NodeConfig::default();
        self.save()
    }
}
