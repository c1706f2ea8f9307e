//! Finding model emitted by both detector pipelines

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Vault balance drift between two sampling windows
pub const ALERT_VAULT_BALANCE_CHANGE: &str = "HUGE-VAULT-BALANCE-CHANGE";

/// Human-facing narrative of all huge transfers in one transaction
pub const ALERT_HUGE_TRANSFERS_IN_TX: &str = "HUGE-TOKEN-TRANSFERS-IN-SINGLE-TX";

/// Per-pattern technical record. Not for the human alert channel.
pub const ALERT_HUGE_TRANSFERS_TECH: &str = "HUGE-TOKEN-TRANSFERS-TECH";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FindingSeverity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FindingType {
    Info,
    Suspicious,
    Degraded,
}

/// One alert record handed to the sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub name: String,
    pub description: String,
    pub alert_id: String,
    pub severity: FindingSeverity,
    #[serde(rename = "type")]
    pub finding_type: FindingType,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl Finding {
    /// Informational finding without metadata
    pub fn info(name: impl Into<String>, description: impl Into<String>, alert_id: &str) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            alert_id: alert_id.to_string(),
            severity: FindingSeverity::Info,
            finding_type: FindingType::Info,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }
}
