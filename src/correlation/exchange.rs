//! Exchange matching: one listed token goes into a venue and a different listed
//! token comes back out to the same party within the same transaction

use super::narrative::{TransferEventMetadata, TransferText};
use super::normalizer::TransferEvent;
use super::template::log_order;
use super::{MatchOutcome, PatternMatch};
use crate::chain::format_address;
use crate::registry::{ExchangeVenue, Registry};
use ethers::types::Address;

pub struct ExchangeMatcher<'a> {
    registry: &'a Registry,
}

impl<'a> ExchangeMatcher<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self { registry }
    }

    /// Pair in-legs with out-legs for every registered venue
    ///
    /// Venues are visited in registry order, in-legs in ascending log index, and
    /// each in-leg takes the earliest free out-leg. The out-leg recipient must be
    /// the in-leg sender or the transaction originator.
    pub fn match_exchanges(&self, events: &[TransferEvent], originator: Address) -> MatchOutcome {
        let mut outcome = MatchOutcome::default();
        let order = log_order(events);
        let mut used = vec![false; events.len()];

        for venue in self.registry.venues() {
            for &i in &order {
                if used[i] || !is_in_leg(&events[i], venue) {
                    continue;
                }
                let leg_in = &events[i];

                let leg_out = order.iter().copied().find(|&j| {
                    !used[j]
                        && j != i
                        && is_out_leg(&events[j], venue)
                        && events[j].token != leg_in.token
                        && (events[j].to == leg_in.from || events[j].to == originator)
                });

                if let Some(j) = leg_out {
                    used[i] = true;
                    used[j] = true;
                    outcome.matches.push(self.build_match(events, i, j, venue));
                }
            }
        }

        outcome
    }

    fn build_match(
        &self,
        events: &[TransferEvent],
        i: usize,
        j: usize,
        venue: &ExchangeVenue,
    ) -> PatternMatch {
        let leg_in = &events[i];
        let leg_out = &events[j];
        let symbol_in = self.registry.token_symbol(&leg_in.token);
        let symbol_out = self.registry.token_symbol(&leg_out.token);

        let text = format!(
            "*{:.2} {}* exchanged for *{:.2} {}* by {} via {}",
            leg_in.amount,
            symbol_in,
            leg_out.amount,
            symbol_out,
            self.registry.address_name(&leg_in.from),
            venue.name
        );

        let metadata = TransferEventMetadata::for_transfer(leg_in, self.registry, &text)
            .with_extra("exchange", venue.name.clone())
            .with_extra("tokenOut", format_address(&leg_out.token))
            .with_extra("tokenOutName", symbol_out)
            .with_extra("amountOut", leg_out.amount.to_string())
            .with_extra("recipient", format_address(&leg_out.to))
            .with_extra("recipientName", self.registry.address_name(&leg_out.to));

        PatternMatch {
            legs: vec![i, j],
            text: TransferText::new(leg_in.log_index.min(leg_out.log_index), text),
            metadata,
        }
    }
}

fn is_in_leg(event: &TransferEvent, venue: &ExchangeVenue) -> bool {
    event.to == venue.address && venue.lists(&event.token)
}

fn is_out_leg(event: &TransferEvent, venue: &ExchangeVenue) -> bool {
    event.from == venue.address && venue.lists(&event.token)
}
