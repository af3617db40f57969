//! Engine configuration options.

use crate::instrument::ESSENTIAL_SYMBOLS;
use crate::instrument::RegistryError;
use crate::types::Leverage;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory of per-symbol data folders scanned once at construction.
    pub symbol_data_dir: Option<PathBuf>,
    /// Registered when the data directory is absent or unreadable.
    pub essential_symbols: Vec<String>,
    /// Leverage given to new accounts.
    pub default_leverage: Leverage,
    /// Account numbers look like `PREFIX-000001`.
    pub account_number_prefix: String,
    /// Currency stamped on ledger entries.
    pub currency: String,
    /// Upper bound on any history read. `0` requests are clamped to this.
    pub max_history_limit: usize,
    /// Period of the background mark-to-market pass.
    pub mark_to_market_interval_ms: u64,
    /// Snapshot batches buffered for a slow consumer before new ones are dropped.
    pub snapshot_buffer: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            symbol_data_dir: Some(PathBuf::from("./data/ticks")),
            essential_symbols: ESSENTIAL_SYMBOLS.iter().map(|s| s.to_string()).collect(),
            default_leverage: Leverage::default(),
            account_number_prefix: "RTX".to_string(),
            currency: "USD".to_string(),
            max_history_limit: 1_000,
            mark_to_market_interval_ms: 200,
            snapshot_buffer: 16,
        }
    }
}

impl EngineConfig {
    /// No bootstrap directory; only the essential symbols are registered.
    pub fn in_memory() -> Self {
        Self {
            symbol_data_dir: None,
            ..Self::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, RegistryError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn mark_to_market_interval(&self) -> Duration {
        Duration::from_millis(self.mark_to_market_interval_ms.max(1))
    }

    pub(crate) fn clamp_limit(&self, limit: usize) -> usize {
        if limit == 0 || limit > self.max_history_limit {
            self.max_history_limit
        } else {
            limit
        }
    }
}
