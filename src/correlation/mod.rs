//! Correlation Engine - per-transaction transfer pattern matching
//!
//! Turns the `Transfer` logs of one transaction into findings. Matchers never
//! mutate the working set: each one reads it, returns the indices it consumed,
//! and the engine builds the next working set by exclusion.
//!
//! # Architecture
//!
//! ```text
//! TransactionEvent
//!     ↓
//! normalizer::normalize_transaction → WorkingSet
//!     ↓
//! CurveExchangeMatcher (pools)      → consumed + texts + metadata
//!     ↓
//! ExchangeMatcher (venues)          → consumed + texts + metadata
//!     ↓
//! TemplateMatcher (per template)    → consumed + texts + metadata
//!     ↓
//! MaterialityFilter (remainder)     → texts + metadata
//!     ↓
//! NarrativeAggregator               → Vec<Finding>
//! ```

pub mod curve;
pub mod exchange;
pub mod materiality;
pub mod narrative;
pub mod normalizer;
pub mod template;

pub use curve::{decode_curve_exchanges, CurveExchange, CurveExchangeMatcher};
pub use exchange::ExchangeMatcher;
pub use materiality::MaterialityFilter;
pub use narrative::{NarrativeAggregator, TransferEventMetadata, TransferText};
pub use normalizer::{normalize, normalize_transaction, NormalizeError, TransferEvent};
pub use template::{AddressPattern, ComplexTransferTemplate, LegPattern, TemplateMatcher, TokenPattern};

use crate::chain::TransactionEvent;
use crate::findings::Finding;
use crate::registry::Registry;
use std::collections::HashSet;
use std::sync::Arc;

/// Transfers of one transaction not yet claimed by any pattern, in input order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkingSet {
    events: Vec<TransferEvent>,
}

impl WorkingSet {
    pub fn new(events: Vec<TransferEvent>) -> Self {
        Self { events }
    }

    pub fn events(&self) -> &[TransferEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Next working set: everything except `consumed`, order preserved
    pub fn exclude(self, consumed: &[usize]) -> WorkingSet {
        if consumed.is_empty() {
            return self;
        }
        let consumed: HashSet<usize> = consumed.iter().copied().collect();
        let events = self
            .events
            .into_iter()
            .enumerate()
            .filter(|(i, _)| !consumed.contains(i))
            .map(|(_, event)| event)
            .collect();
        WorkingSet { events }
    }
}

/// One recognized pattern: the working-set indices it claims and its output
#[derive(Debug, Clone, PartialEq)]
pub struct PatternMatch {
    pub legs: Vec<usize>,
    pub text: TransferText,
    pub metadata: TransferEventMetadata,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchOutcome {
    pub matches: Vec<PatternMatch>,
}

impl MatchOutcome {
    pub fn consumed(&self) -> Vec<usize> {
        self.matches.iter().flat_map(|m| m.legs.iter().copied()).collect()
    }
}

pub struct CorrelationEngine {
    registry: Arc<Registry>,
    aggregator: NarrativeAggregator,
}

impl CorrelationEngine {
    pub fn new(registry: Arc<Registry>, explorer_tx_url: &str) -> Self {
        Self {
            registry,
            aggregator: NarrativeAggregator::new(explorer_tx_url),
        }
    }

    /// Run the whole per-transaction pipeline
    ///
    /// Either every finding of the transaction is returned or, on a malformed
    /// log, none.
    pub fn process_transaction(&self, tx: &TransactionEvent) -> Result<Vec<Finding>, NormalizeError> {
        let registry = self.registry.as_ref();
        let events = normalize_transaction(tx, registry)?;
        let exchanges = decode_curve_exchanges(tx, registry)?;
        if events.is_empty() {
            return Ok(Vec::new());
        }

        let materiality = MaterialityFilter::new(registry);
        let mut texts = Vec::new();
        let mut metadata = Vec::new();
        let mut working = WorkingSet::new(events);

        if !exchanges.is_empty() {
            let outcome = CurveExchangeMatcher::new(registry).match_exchanges(working.events(), &exchanges);
            working = absorb(working, outcome, &materiality, &mut texts, &mut metadata);
        }

        let outcome = ExchangeMatcher::new(registry).match_exchanges(working.events(), tx.from);
        working = absorb(working, outcome, &materiality, &mut texts, &mut metadata);

        let template_matcher = TemplateMatcher::new(registry);
        for template in registry.templates() {
            if working.is_empty() {
                break;
            }
            let outcome = template_matcher.match_template(working.events(), template, tx.from);
            working = absorb(working, outcome, &materiality, &mut texts, &mut metadata);
        }

        let (simple_texts, simple_metadata) = materiality.classify(working.events());
        texts.extend(simple_texts);
        metadata.extend(simple_metadata);

        Ok(self.aggregator.aggregate(&tx.hash, texts, metadata))
    }
}

/// Collect the output of material matches and drop every matched leg
///
/// A match whose legs are all below threshold still consumes its legs, so a
/// small wrap never resurfaces as two simple transfers.
fn absorb(
    working: WorkingSet,
    outcome: MatchOutcome,
    materiality: &MaterialityFilter,
    texts: &mut Vec<TransferText>,
    metadata: &mut Vec<TransferEventMetadata>,
) -> WorkingSet {
    let consumed = outcome.consumed();

    for m in outcome.matches {
        let material = m.legs.iter().any(|&i| materiality.is_material(&working.events()[i]));
        if material {
            texts.push(m.text);
            metadata.push(m.metadata);
        } else {
            log::debug!("Dropping immaterial pattern match: {}", m.text.text);
        }
    }

    working.exclude(&consumed)
}
