//! Per-token materiality thresholds for transfers left after pattern matching

use super::narrative::{TransferEventMetadata, TransferText};
use super::normalizer::TransferEvent;
use crate::registry::{MonitoringTier, Registry};

pub struct MaterialityFilter<'a> {
    registry: &'a Registry,
}

impl<'a> MaterialityFilter<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self { registry }
    }

    /// Strictly above the token threshold; partial-tier tokens additionally
    /// need a labelled address on one side
    ///
    /// Compared in raw units: the decimal `amount` cannot tell the threshold
    /// from one unit above it.
    pub fn is_material(&self, transfer: &TransferEvent) -> bool {
        let Some(info) = self.registry.token(&transfer.token) else {
            return false;
        };

        if transfer.raw_amount <= info.raw_threshold {
            return false;
        }

        match info.tier {
            MonitoringTier::Full => true,
            MonitoringTier::Partial => {
                self.registry.is_known(&transfer.from) || self.registry.is_known(&transfer.to)
            }
        }
    }

    /// Narrative line for a simple transfer
    pub fn transfer_text(&self, transfer: &TransferEvent) -> TransferText {
        let text = format!(
            "*{:.2} {}* transferred from {} to {}",
            transfer.amount,
            self.registry.token_symbol(&transfer.token),
            self.registry.address_name(&transfer.from),
            self.registry.address_name(&transfer.to)
        );
        TransferText::new(transfer.log_index, text)
    }

    /// Texts for every material transfer, and metadata for those not of the
    /// governance token
    pub fn classify(&self, remaining: &[TransferEvent]) -> (Vec<TransferText>, Vec<TransferEventMetadata>) {
        let mut texts = Vec::new();
        let mut metadata = Vec::new();

        for transfer in remaining {
            if !self.is_material(transfer) {
                log::debug!(
                    "Dropping immaterial transfer: log={} token={} amount={:.4}",
                    transfer.log_index,
                    self.registry.token_symbol(&transfer.token),
                    transfer.amount
                );
                continue;
            }

            let text = self.transfer_text(transfer);
            if !self.registry.is_governance_token(&transfer.token) {
                metadata.push(TransferEventMetadata::for_transfer(transfer, self.registry, &text.text));
            }
            texts.push(text);
        }

        (texts, metadata)
    }
}
