//! Curve swaps: a `TokenExchange` log of a registered pool claims the
//! `Transfer` legs of its ERC-20 coins
//!
//! Native ETH moves without a `Transfer` log, so the exchange log is the only
//! place the ETH side of a stETH/ETH swap shows up.

use super::narrative::{TransferEventMetadata, TransferText};
use super::normalizer::{to_decimal_amount, NormalizeError, TransferEvent};
use super::template::log_order;
use super::{MatchOutcome, PatternMatch};
use crate::chain::{format_address, TransactionEvent};
use crate::registry::{CurvePool, Registry};
use ethers::types::{Address, Log, U256};

/// One decoded `TokenExchange` of a registered pool
#[derive(Debug, Clone, PartialEq)]
pub struct CurveExchange {
    pub pool: Address,
    pub buyer: Address,
    pub sold: usize,
    pub sold_amount: f64,
    pub bought: usize,
    pub bought_amount: f64,
    pub log_index: u64,
}

fn invalid(pool: Address, reason: impl Into<String>) -> NormalizeError {
    NormalizeError::InvalidExchangeLog {
        pool,
        reason: reason.into(),
    }
}

fn word(data: &[u8], i: usize) -> &[u8] {
    &data[i * 32..(i + 1) * 32]
}

/// Coin index from an `int128` word; negative or unknown indices are rejected
fn coin_index(word: &[u8], pool: &CurvePool) -> Result<usize, NormalizeError> {
    let raw = U256::from_big_endian(word);
    if raw >= U256::from(pool.coins.len()) {
        return Err(invalid(pool.address, format!("coin index {} out of range", raw)));
    }
    Ok(raw.as_usize())
}

pub fn decode_exchange(log: &Log, pool: &CurvePool) -> Result<CurveExchange, NormalizeError> {
    if log.topics.len() != 2 {
        return Err(invalid(pool.address, format!("{} topics, expected 2", log.topics.len())));
    }
    if log.data.len() != 128 {
        return Err(invalid(pool.address, format!("{} data bytes, expected 128", log.data.len())));
    }
    let log_index = log
        .log_index
        .filter(|i| *i <= U256::from(u64::MAX))
        .ok_or_else(|| invalid(pool.address, "missing log index"))?;

    let data: &[u8] = &log.data;
    let sold = coin_index(word(data, 0), pool)?;
    let bought = coin_index(word(data, 2), pool)?;
    let sold_amount = to_decimal_amount(U256::from_big_endian(word(data, 1)), pool.coins[sold].decimals)?;
    let bought_amount = to_decimal_amount(U256::from_big_endian(word(data, 3)), pool.coins[bought].decimals)?;

    Ok(CurveExchange {
        pool: pool.address,
        buyer: Address::from_slice(&log.topics[1].as_bytes()[12..]),
        sold,
        sold_amount,
        bought,
        bought_amount,
        log_index: log_index.low_u64(),
    })
}

/// Decode every `TokenExchange` of a registered pool, in log order
///
/// Logs of other contracts are skipped; a malformed log of a registered pool
/// fails the transaction.
pub fn decode_curve_exchanges(
    tx: &TransactionEvent,
    registry: &Registry,
) -> Result<Vec<CurveExchange>, NormalizeError> {
    let mut exchanges = tx
        .token_exchange_logs()
        .filter_map(|log| registry.curve_pool(&log.address).map(|pool| decode_exchange(log, pool)))
        .collect::<Result<Vec<_>, _>>()?;
    exchanges.sort_by_key(|e| e.log_index);
    Ok(exchanges)
}

pub struct CurveExchangeMatcher<'a> {
    registry: &'a Registry,
}

impl<'a> CurveExchangeMatcher<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self { registry }
    }

    /// Claim the `Transfer` legs of every exchange
    ///
    /// Each ERC-20 side takes the latest free transfer of its coin into (sold)
    /// or out of (bought) the pool logged before the exchange. An exchange
    /// whose ERC-20 side has no such transfer claims nothing.
    pub fn match_exchanges(&self, events: &[TransferEvent], exchanges: &[CurveExchange]) -> MatchOutcome {
        let mut outcome = MatchOutcome::default();
        let order = log_order(events);
        let mut used = vec![false; events.len()];

        for exchange in exchanges {
            let Some(pool) = self.registry.curve_pool(&exchange.pool) else {
                continue;
            };

            let find_leg = |coin: usize, into_pool: bool, used: &[bool]| -> Option<Option<usize>> {
                let Some(token) = pool.coin(coin)?.token else {
                    return Some(None);
                };
                order
                    .iter()
                    .rev()
                    .copied()
                    .find(|&i| {
                        let e = &events[i];
                        !used[i]
                            && e.token == token
                            && e.log_index < exchange.log_index
                            && if into_pool { e.to == pool.address } else { e.from == pool.address }
                    })
                    .map(Some)
            };

            let Some(sold_leg) = find_leg(exchange.sold, true, &used) else {
                continue;
            };
            let Some(bought_leg) = find_leg(exchange.bought, false, &used) else {
                continue;
            };

            let mut legs: Vec<usize> = sold_leg.into_iter().chain(bought_leg).collect();
            if legs.is_empty() {
                continue;
            }
            legs.sort_by_key(|&i| events[i].log_index);
            for &i in &legs {
                used[i] = true;
            }
            outcome.matches.push(self.build_match(events, legs, exchange, pool));
        }

        outcome
    }

    fn build_match(
        &self,
        events: &[TransferEvent],
        legs: Vec<usize>,
        exchange: &CurveExchange,
        pool: &CurvePool,
    ) -> PatternMatch {
        let (sold, bought) = (&pool.coins[exchange.sold], &pool.coins[exchange.bought]);
        let buyer = self.registry.address_name(&exchange.buyer);

        let text = format!(
            "*{:.2} {}* exchanged for *{:.2} {}* by {} on {}",
            exchange.sold_amount, sold.symbol, exchange.bought_amount, bought.symbol, buyer, pool.name
        );

        let first = &events[legs[0]];
        let metadata = TransferEventMetadata::for_transfer(first, self.registry, &text)
            .with_extra("exchange", pool.name.clone())
            .with_extra("tokenInName", sold.symbol.clone())
            .with_extra("amountIn", exchange.sold_amount.to_string())
            .with_extra("tokenOutName", bought.symbol.clone())
            .with_extra("amountOut", exchange.bought_amount.to_string())
            .with_extra("buyer", format_address(&exchange.buyer))
            .with_extra("buyerName", buyer);

        PatternMatch {
            text: TransferText::new(first.log_index, text),
            legs,
            metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::token_exchange_topic;
    use crate::registry::{CurveCoin, MonitoringTier, TokenInfo};
    use ethers::types::{Bytes, H256};

    fn addr(b: u8) -> Address {
        Address::repeat_byte(b)
    }

    fn steth() -> Address {
        addr(0xa1)
    }

    fn pool_address() -> Address {
        addr(0xcc)
    }

    fn registry() -> Registry {
        Registry::new()
            .with_token(TokenInfo::new(steth(), "stETH", 18, MonitoringTier::Full, 10_000.0).unwrap())
            .with_known_address(pool_address(), "Curve pool")
            .with_curve_pool(CurvePool {
                name: "Curve pool".to_string(),
                address: pool_address(),
                coins: vec![
                    CurveCoin {
                        symbol: "ETH".to_string(),
                        token: None,
                        decimals: 18,
                    },
                    CurveCoin {
                        symbol: "stETH".to_string(),
                        token: Some(steth()),
                        decimals: 18,
                    },
                ],
            })
    }

    fn whole(tokens: u64) -> U256 {
        U256::exp10(18) * U256::from(tokens)
    }

    fn exchange_log(buyer: Address, sold: u64, sold_amount: U256, bought: u64, bought_amount: U256, log_index: u64) -> Log {
        let mut data = vec![0u8; 128];
        U256::from(sold).to_big_endian(&mut data[0..32]);
        sold_amount.to_big_endian(&mut data[32..64]);
        U256::from(bought).to_big_endian(&mut data[64..96]);
        bought_amount.to_big_endian(&mut data[96..128]);
        Log {
            address: pool_address(),
            topics: vec![token_exchange_topic(), H256::from(buyer)],
            data: Bytes::from(data),
            log_index: Some(U256::from(log_index)),
            ..Default::default()
        }
    }

    fn transfer(from: Address, to: Address, tokens: u64, log_index: u64) -> TransferEvent {
        TransferEvent {
            token: steth(),
            from,
            to,
            raw_amount: whole(tokens),
            amount: tokens as f64,
            log_index,
            tx_hash: H256::zero(),
        }
    }

    fn exchange(sold: usize, sold_amount: f64, bought: usize, bought_amount: f64, log_index: u64) -> CurveExchange {
        CurveExchange {
            pool: pool_address(),
            buyer: addr(1),
            sold,
            sold_amount,
            bought,
            bought_amount,
            log_index,
        }
    }

    #[test]
    fn test_decode_exchange() {
        let registry = registry();
        let pool = registry.curve_pool(&pool_address()).unwrap();

        let decoded = decode_exchange(&exchange_log(addr(1), 1, whole(20_000), 0, whole(19_950), 6), pool).unwrap();

        assert_eq!(decoded, exchange(1, 20_000.0, 0, 19_950.0, 6));
    }

    #[test]
    fn test_decode_rejects_unknown_coin() {
        let registry = registry();
        let pool = registry.curve_pool(&pool_address()).unwrap();

        let err = decode_exchange(&exchange_log(addr(1), 2, whole(1), 0, whole(1), 6), pool).unwrap_err();
        assert!(matches!(err, NormalizeError::InvalidExchangeLog { .. }));

        let mut short = exchange_log(addr(1), 1, whole(1), 0, whole(1), 6);
        short.data = Bytes::from(vec![0u8; 64]);
        assert!(decode_exchange(&short, pool).is_err());
    }

    #[test]
    fn test_steth_sold_for_eth() {
        let registry = registry();
        let events = vec![transfer(addr(1), pool_address(), 20_000, 5)];

        let outcome = CurveExchangeMatcher::new(&registry)
            .match_exchanges(&events, &[exchange(1, 20_000.0, 0, 19_950.0, 6)]);

        assert_eq!(outcome.matches.len(), 1);
        let m = &outcome.matches[0];
        assert_eq!(m.legs, vec![0]);
        assert_eq!(m.text.log_index, 5);
        assert_eq!(
            m.text.text,
            "*20000.00 stETH* exchanged for *19950.00 ETH* by 0x0101010101010101010101010101010101010101 on Curve pool"
        );
        assert_eq!(m.metadata.extra["tokenOutName"], "ETH");
        assert_eq!(m.metadata.extra["amountOut"], "19950");
    }

    #[test]
    fn test_eth_sold_for_steth_claims_outgoing_leg() {
        let registry = registry();
        let events = vec![
            transfer(pool_address(), addr(1), 30_000, 2),
            transfer(addr(1), pool_address(), 30_000, 9),
        ];

        let outcome = CurveExchangeMatcher::new(&registry)
            .match_exchanges(&events, &[exchange(0, 30_010.0, 1, 30_000.0, 3)]);

        assert_eq!(outcome.matches.len(), 1);
        assert_eq!(outcome.matches[0].legs, vec![0]);
    }

    #[test]
    fn test_leg_after_exchange_not_claimed() {
        let registry = registry();
        let events = vec![transfer(addr(1), pool_address(), 20_000, 8)];

        let outcome = CurveExchangeMatcher::new(&registry)
            .match_exchanges(&events, &[exchange(1, 20_000.0, 0, 19_950.0, 6)]);

        assert!(outcome.matches.is_empty());
    }

    #[test]
    fn test_each_leg_claimed_once() {
        let registry = registry();
        let events = vec![
            transfer(addr(1), pool_address(), 20_000, 1),
            transfer(addr(1), pool_address(), 15_000, 3),
        ];

        let outcome = CurveExchangeMatcher::new(&registry).match_exchanges(
            &events,
            &[exchange(1, 15_000.0, 0, 14_990.0, 4), exchange(1, 20_000.0, 0, 19_980.0, 5)],
        );

        assert_eq!(outcome.matches.len(), 2);
        assert_eq!(outcome.matches[0].legs, vec![1]);
        assert_eq!(outcome.matches[1].legs, vec![0]);
    }
}
