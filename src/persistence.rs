//! Initialization snapshot file
//!
//! The initialization map handed to the host is also kept on disk so a restart
//! can log what the previous run started from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitSnapshot {
    pub block: u64,
    pub values: BTreeMap<String, String>,
    pub timestamp: DateTime<Utc>,
}

impl InitSnapshot {
    pub fn new(block: u64, values: BTreeMap<String, String>) -> Self {
        Self {
            block,
            values,
            timestamp: Utc::now(),
        }
    }
}

/// Save snapshot to JSON file
pub fn save_snapshot(snapshot: &InitSnapshot, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(snapshot)?;
    fs::write(path, json)?;

    log::debug!("Saved initialization snapshot (block {}) to {}", snapshot.block, path.display());
    Ok(())
}

/// Load snapshot from JSON file, `None` when no file exists yet
pub fn load_snapshot(path: impl AsRef<Path>) -> Result<Option<InitSnapshot>, Box<dyn std::error::Error>> {
    let path = path.as_ref();
    if !path.exists() {
        log::info!("No existing snapshot file found: {}", path.display());
        return Ok(None);
    }

    let json = fs::read_to_string(path)?;
    let snapshot: InitSnapshot = serde_json::from_str(&json)?;

    log::info!(
        "Loaded snapshot from {} (block {}, taken {})",
        path.display(),
        snapshot.block,
        snapshot.timestamp.to_rfc3339()
    );
    Ok(Some(snapshot))
}
