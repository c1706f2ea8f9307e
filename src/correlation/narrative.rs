//! Narrative aggregation: ordered human text per transaction plus one
//! technical record per matched pattern

use super::normalizer::TransferEvent;
use crate::chain::{format_address, format_hash};
use crate::findings::{Finding, ALERT_HUGE_TRANSFERS_IN_TX, ALERT_HUGE_TRANSFERS_TECH};
use crate::registry::Registry;
use ethers::types::H256;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const NARRATIVE_FINDING_NAME: &str = "Huge token(s) transfer of Lido interest in a single TX";
pub const TECH_FINDING_NAME: &str = "Huge token transfer of Lido interest (tech)";
pub const TECH_FINDING_NOTE: &str = "NOTE: This is tech alert. Do not route it to the alerts channel!";

/// One narrative line, positioned by the log index it stems from
#[derive(Debug, Clone, PartialEq)]
pub struct TransferText {
    pub log_index: u64,
    pub text: String,
}

impl TransferText {
    pub fn new(log_index: u64, text: impl Into<String>) -> Self {
        Self {
            log_index,
            text: text.into(),
        }
    }
}

/// String-only record routed to downstream systems
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferEventMetadata {
    pub from: String,
    pub from_name: String,
    pub to: String,
    pub to_name: String,
    pub amount: String,
    pub token: String,
    pub token_name: String,
    pub log_index: String,
    pub comment: String,
    /// Pattern-specific keys (exchange counter-leg, template name, ...)
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

impl TransferEventMetadata {
    pub fn for_transfer(transfer: &TransferEvent, registry: &Registry, comment: &str) -> Self {
        Self {
            from: format_address(&transfer.from),
            from_name: registry.address_name(&transfer.from),
            to: format_address(&transfer.to),
            to_name: registry.address_name(&transfer.to),
            amount: transfer.amount.to_string(),
            token: format_address(&transfer.token),
            token_name: registry.token_symbol(&transfer.token),
            log_index: transfer.log_index.to_string(),
            comment: comment.to_string(),
            extra: BTreeMap::new(),
        }
    }

    pub fn with_extra(mut self, key: &str, value: impl Into<String>) -> Self {
        self.extra.insert(key.to_string(), value.into());
        self
    }

    /// Flatten into finding metadata
    pub fn into_fields(self) -> BTreeMap<String, String> {
        let mut fields = self.extra;
        fields.insert("from".to_string(), self.from);
        fields.insert("fromName".to_string(), self.from_name);
        fields.insert("to".to_string(), self.to);
        fields.insert("toName".to_string(), self.to_name);
        fields.insert("amount".to_string(), self.amount);
        fields.insert("token".to_string(), self.token);
        fields.insert("tokenName".to_string(), self.token_name);
        fields.insert("logIndex".to_string(), self.log_index);
        fields.insert("comment".to_string(), self.comment);
        fields
    }
}

/// First line of a narrative comment with `*` emphasis removed
pub fn clean_comment(comment: &str) -> String {
    comment.split('\n').next().unwrap_or_default().replace('*', "")
}

pub struct NarrativeAggregator {
    explorer_tx_url: String,
}

impl NarrativeAggregator {
    pub fn new(explorer_tx_url: impl Into<String>) -> Self {
        Self {
            explorer_tx_url: explorer_tx_url.into(),
        }
    }

    pub fn tx_link(&self, tx_hash: &H256) -> String {
        format!("{}{}", self.explorer_tx_url, format_hash(tx_hash))
    }

    /// Build the narrative finding (if any text) and one tech finding per record
    pub fn aggregate(
        &self,
        tx_hash: &H256,
        mut texts: Vec<TransferText>,
        metadata: Vec<TransferEventMetadata>,
    ) -> Vec<Finding> {
        let mut findings = Vec::with_capacity(metadata.len() + 1);
        let link = self.tx_link(tx_hash);

        // sort_by_key is stable: equal log indices keep production order
        texts.sort_by_key(|t| t.log_index);

        if !texts.is_empty() {
            let narrative = texts
                .iter()
                .map(|t| t.text.as_str())
                .collect::<Vec<_>>()
                .join("\n");
            findings.push(Finding::info(
                NARRATIVE_FINDING_NAME,
                format!("{}\n{}", narrative, link),
                ALERT_HUGE_TRANSFERS_IN_TX,
            ));
        }

        for mut meta in metadata {
            meta.comment = clean_comment(&meta.comment);
            let description = format!("{}\n{}\n{}", meta.comment, link, TECH_FINDING_NOTE);
            findings.push(
                Finding::info(TECH_FINDING_NAME, description, ALERT_HUGE_TRANSFERS_TECH)
                    .with_metadata(meta.into_fields()),
            );
        }

        findings
    }
}
