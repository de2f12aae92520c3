//! In-memory configuration store for development and testing

use crate::{ConfigStore, NodeConfig, StorageError};
use tracing::debug;

/// Configuration held in memory; "persisted" state is a second copy
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigStore {
    config: NodeConfig,
    persisted: Option<NodeConfig>,
    saves: usize,
    fail_saves: bool,
}

impl MemoryConfigStore {
    /// Store holding the default configuration, nothing persisted yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Store holding `config`, nothing persisted yet
    pub fn with_config(config: NodeConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Make every following save fail (or succeed again)
    pub fn set_fail_saves(&mut self, fail: bool) {
        self.fail_saves = fail;
    }

    /// Number of successful saves
    pub fn save_count(&self) -> usize {
        self.saves
    }

    /// Configuration as of the last successful save
    pub fn persisted(&self) -> Option<&NodeConfig> {
        self.persisted.as_ref()
    }
}

impl ConfigStore for MemoryConfigStore {
    fn config(&self) -> &NodeConfig {
        &self.config
    }

    fn config_mut(&mut self) -> &mut NodeConfig {
        &mut self.config
    }

    fn save(&mut self) -> Result<(), StorageError> {
        if self.fail_saves {
            return Err(StorageError::Backend("save disabled".to_string()));
        }
        self.persisted = Some(self.config.clone());
        self.saves += 1;
        debug!(saves = self.saves, "Configuration saved in memory");
        Ok(())
    }

    fn factory_reset(&mut self) -> Result<(), StorageError> {
        self.persisted = None;
        self.config = NodeConfig::default();
        self.save()
    }
}
