//! Complex transfer templates: declarative multi-leg patterns matched as one
//! logical transfer (wrap, deposit + mint, liquidity add, ...)

use super::narrative::{TransferEventMetadata, TransferText};
use super::normalizer::TransferEvent;
use super::{MatchOutcome, PatternMatch};
use crate::registry::Registry;
use ethers::types::Address;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenPattern {
    One(Address),
    AnyOf(Vec<Address>),
}

impl TokenPattern {
    pub fn matches(&self, token: &Address) -> bool {
        match self {
            TokenPattern::One(t) => t == token,
            TokenPattern::AnyOf(set) => set.contains(token),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressPattern {
    Any,
    /// Mint source / burn destination
    Zero,
    Exact(Address),
    /// Binds to the first address it meets; every later use of the same slot
    /// must see that same address
    Party(usize),
    /// The transaction originator
    Originator,
}

/// One event shape: token plus sender and recipient roles
#[derive(Debug, Clone, PartialEq)]
pub struct LegPattern {
    pub token: TokenPattern,
    pub from: AddressPattern,
    pub to: AddressPattern,
}

impl LegPattern {
    pub fn new(token: TokenPattern, from: AddressPattern, to: AddressPattern) -> Self {
        Self { token, from, to }
    }
}

/// Narrative text for a match; legs are in template order
pub type NarrativeFn = fn(&[&TransferEvent], &Registry) -> String;

pub struct ComplexTransferTemplate {
    pub name: String,
    pub legs: Vec<LegPattern>,
    pub narrative: NarrativeFn,
}

impl ComplexTransferTemplate {
    pub fn new(name: &str, legs: Vec<LegPattern>, narrative: NarrativeFn) -> Self {
        Self {
            name: name.to_string(),
            legs,
            narrative,
        }
    }

    fn party_slots(&self) -> usize {
        self.legs
            .iter()
            .flat_map(|leg| [leg.from, leg.to])
            .filter_map(|p| match p {
                AddressPattern::Party(slot) => Some(slot + 1),
                _ => None,
            })
            .max()
            .unwrap_or(0)
    }
}

impl std::fmt::Debug for ComplexTransferTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComplexTransferTemplate")
            .field("name", &self.name)
            .field("legs", &self.legs)
            .finish()
    }
}

fn bind(
    pattern: AddressPattern,
    address: Address,
    originator: Address,
    parties: &mut [Option<Address>],
) -> bool {
    match pattern {
        AddressPattern::Any => true,
        AddressPattern::Zero => address.is_zero(),
        AddressPattern::Exact(expected) => expected == address,
        AddressPattern::Originator => originator == address,
        AddressPattern::Party(slot) => match parties[slot] {
            Some(bound) => bound == address,
            None => {
                parties[slot] = Some(address);
                true
            }
        },
    }
}

pub struct TemplateMatcher<'a> {
    registry: &'a Registry,
}

impl<'a> TemplateMatcher<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self { registry }
    }

    /// Consume every non-overlapping match of `template` in `events`
    ///
    /// Each round takes the first match in log-index order (leg 1 earliest,
    /// then leg 2, ...) among events not consumed by an earlier round.
    pub fn match_template(
        &self,
        events: &[TransferEvent],
        template: &ComplexTransferTemplate,
        originator: Address,
    ) -> MatchOutcome {
        let mut outcome = MatchOutcome::default();
        if template.legs.is_empty() {
            return outcome;
        }

        let order = log_order(events);
        let mut used = vec![false; events.len()];

        while let Some(legs) = self.find_first(events, &order, &used, template, originator) {
            for &i in &legs {
                used[i] = true;
            }
            outcome.matches.push(self.build_match(events, legs, template));
        }

        outcome
    }

    fn find_first(
        &self,
        events: &[TransferEvent],
        order: &[usize],
        used: &[bool],
        template: &ComplexTransferTemplate,
        originator: Address,
    ) -> Option<Vec<usize>> {
        let mut chosen = Vec::with_capacity(template.legs.len());
        let parties = vec![None; template.party_slots()];
        if search(events, order, used, &template.legs, originator, &parties, &mut chosen) {
            Some(chosen)
        } else {
            None
        }
    }

    fn build_match(
        &self,
        events: &[TransferEvent],
        legs: Vec<usize>,
        template: &ComplexTransferTemplate,
    ) -> PatternMatch {
        let matched: Vec<&TransferEvent> = legs.iter().map(|&i| &events[i]).collect();
        let text = (template.narrative)(&matched, self.registry);
        let log_index = matched.iter().map(|e| e.log_index).min().unwrap_or_default();

        let metadata = TransferEventMetadata::for_transfer(matched[0], self.registry, &text)
            .with_extra("template", template.name.clone())
            .with_extra("legs", matched.len().to_string());

        PatternMatch {
            legs,
            text: TransferText::new(log_index, text),
            metadata,
        }
    }
}

/// Depth-first search over legs in template order, candidates in log order
fn search(
    events: &[TransferEvent],
    order: &[usize],
    used: &[bool],
    legs: &[LegPattern],
    originator: Address,
    parties: &[Option<Address>],
    chosen: &mut Vec<usize>,
) -> bool {
    let Some(leg) = legs.get(chosen.len()) else {
        return true;
    };

    for &i in order {
        if used[i] || chosen.contains(&i) {
            continue;
        }
        let event = &events[i];
        if !leg.token.matches(&event.token) {
            continue;
        }

        let mut bound = parties.to_vec();
        if !bind(leg.from, event.from, originator, &mut bound)
            || !bind(leg.to, event.to, originator, &mut bound)
        {
            continue;
        }

        chosen.push(i);
        if search(events, order, used, legs, originator, &bound, chosen) {
            return true;
        }
        chosen.pop();
    }

    false
}

/// Indices of `events` ordered by log index, ties by position
pub(crate) fn log_order(events: &[TransferEvent]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..events.len()).collect();
    order.sort_by_key(|&i| events[i].log_index);
    order
}
