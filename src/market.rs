//! Cross-settlement trade: opportunity discovery and bounded execution
//!
//! Discovery is a full pair scan over settlements and goods; an opportunity
//! exists where one settlement prices a good sufficiently above another.
//! Execution walks the ranked list, re-checking each opportunity against
//! live state (prices and stock may have moved since discovery) and moving
//! probe-sized quantities so convergence stays gradual.

use std::fmt;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::goods::GoodRegistry;
use crate::items::{ItemInstance, TradeStep};
use crate::params::SimParams;
use crate::settlement::Settlement;
use crate::types::{GoodId, SettlementId, EPSILON};

/// Fraction of the requested quantity a transfer must reach to count
const FULFILMENT_TOLERANCE: f32 = 0.99;

/// Smallest quantity a trade will move
const MIN_TRADE_QUANTITY: f32 = 0.01;

/// A candidate arbitrage between two settlements for one good
#[derive(Clone, Debug, PartialEq)]
pub struct TradeOpportunity {
    pub seller: SettlementId,
    pub buyer: SettlementId,
    pub good: GoodId,
    pub profit_per_unit: f32,
    /// Tentative tradeable quantity; re-checked at execution
    pub potential_qty: f32,
    pub seller_price: f32,
    pub buyer_price: f32,
}

/// Record of one executed trade, the unit of `recent_trades`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TradeRecord {
    pub tick: u64,
    pub seller: SettlementId,
    pub buyer: SettlementId,
    pub seller_name: String,
    pub buyer_name: String,
    pub good: GoodId,
    pub good_name: String,
    pub quantity: f32,
    /// Unit price the trade settled at (the seller's local price)
    pub price: f32,
    pub buyer_price: f32,
    pub profit_per_unit: f32,
}

impl fmt::Display for TradeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "T{}: {} -> {}, {:.2} {} @ {:.2}",
            self.tick, self.seller_name, self.buyer_name, self.quantity, self.good_name, self.price
        )
    }
}

/// Counters accumulated over a world's lifetime
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct WorldStats {
    pub total_trades: u64,
    /// Trades where the goods left the seller but could not be stored by
    /// the buyer (see `execute_trades`)
    pub failed_deliveries: u64,
    pub total_production_cycles: u64,
}

/// Scan every unordered settlement pair and every good both have priced,
/// collecting opportunities where the dearer price exceeds the cheaper one
/// by the configured margin. Results are sorted by descending profit per
/// unit, stable by discovery order.
///
/// Deliberately O(settlements^2 x goods); fine for moderate world sizes.
pub fn find_trade_opportunities(
    settlements: &[Settlement],
    goods: &GoodRegistry,
    params: &SimParams,
) -> Vec<TradeOpportunity> {
    let mut opportunities = Vec::new();
    let margin = params.trade_profit_margin_threshold;

    for i in 0..settlements.len() {
        for j in (i + 1)..settlements.len() {
            let (a, b) = (&settlements[i], &settlements[j]);
            for good in goods.iter() {
                let (Some(&price_a), Some(&price_b)) =
                    (a.local_prices.get(&good.id), b.local_prices.get(&good.id))
                else {
                    continue;
                };

                let (seller, buyer, seller_price, buyer_price) = if price_b > price_a * margin {
                    (a, b, price_a, price_b)
                } else if price_a > price_b * margin {
                    (b, a, price_b, price_a)
                } else {
                    continue;
                };

                let profit_per_unit = buyer_price - seller_price;
                let qty_available = seller.get_total_stored(good.id);
                if profit_per_unit <= EPSILON || qty_available <= EPSILON || buyer.wealth <= 0.0 {
                    continue;
                }

                // Bulk trades probe with a single unit; non-bulk trades can
                // never promise more than the seller's smallest batch
                let mut potential_qty = if good.is_bulk {
                    1.0
                } else {
                    seller.storage.smallest_batch(good.id).unwrap_or(0.0)
                };
                potential_qty = potential_qty.min(qty_available);
                if potential_qty <= EPSILON {
                    continue;
                }

                opportunities.push(TradeOpportunity {
                    seller: seller.id,
                    buyer: buyer.id,
                    good: good.id,
                    profit_per_unit,
                    potential_qty,
                    seller_price,
                    buyer_price,
                });
            }
        }
    }

    // Stable sort keeps discovery order among equal profits
    opportunities.sort_by(|x, y| {
        y.profit_per_unit
            .partial_cmp(&x.profit_per_unit)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    opportunities
}

/// Execute the ranked opportunities, at most `max_trades_per_tick` of them,
/// skipping any that fail a live re-check. Settlement ids double as indices
/// into the slice.
///
/// The transfer is seller-first: goods leave the seller, then the buyer
/// stores them, and only then does payment settle. If the buyer's storage
/// rejects the delivery the goods are NOT returned to the seller; the loss
/// is logged on both parties and counted, nothing more.
pub fn execute_trades(
    settlements: &mut [Settlement],
    goods: &GoodRegistry,
    params: &SimParams,
    opportunities: &[TradeOpportunity],
    tick: u64,
    stats: &mut WorldStats,
) -> Vec<TradeRecord> {
    let mut records = Vec::new();

    for op in opportunities {
        if records.len() >= params.max_trades_per_tick {
            break;
        }
        let good = goods.get(op.good);
        let seller_idx = op.seller.0 as usize;
        let buyer_idx = op.buyer.0 as usize;
        debug_assert_eq!(settlements[seller_idx].id, op.seller);
        debug_assert_eq!(settlements[buyer_idx].id, op.buyer);

        let mut trade_qty = op.potential_qty.min(params.max_trade_quantity);
        if !good.is_bulk {
            // The opportunity may be stale; narrow to the smallest batch
            // the seller still holds
            match settlements[seller_idx].storage.smallest_batch(op.good) {
                Some(batch) => trade_qty = batch,
                None => continue,
            }
        }
        let trade_qty = trade_qty.max(MIN_TRADE_QUANTITY);

        let cost = op.seller_price * trade_qty;
        if settlements[buyer_idx].wealth < cost {
            continue;
        }
        if settlements[seller_idx].get_total_stored(op.good) < trade_qty {
            continue;
        }

        let (removed, fragments) = settlements[seller_idx].remove_from_storage(op.good, trade_qty);
        if removed < trade_qty * FULFILMENT_TOLERANCE {
            continue;
        }

        let added = if good.is_bulk {
            settlements[buyer_idx].add_to_storage(good, removed)
        } else {
            let Some(fragment) = fragments.into_iter().next() else {
                continue;
            };
            let delivery = delivery_batch(fragment, removed, op.seller, op.seller_price, tick);
            settlements[buyer_idx].storage.add_instance(delivery)
        };

        if added >= removed * FULFILMENT_TOLERANCE {
            let settled = op.seller_price * added;
            settlements[seller_idx].wealth += settled;
            settlements[buyer_idx].wealth -= settled;
            let record = TradeRecord {
                tick,
                seller: op.seller,
                buyer: op.buyer,
                seller_name: settlements[seller_idx].name.clone(),
                buyer_name: settlements[buyer_idx].name.clone(),
                good: op.good,
                good_name: good.name.clone(),
                quantity: added,
                price: op.seller_price,
                buyer_price: op.buyer_price,
                profit_per_unit: op.profit_per_unit,
            };
            debug!("{}", record);
            stats.total_trades += 1;
            records.push(record);
        } else {
            // Known lossy edge: the seller was already debited and the
            // stock is gone. Surfaced, not rolled back.
            warn!(
                "delivery of {:.2} {} from {} to {} lost: buyer storage full",
                removed, good.name, settlements[seller_idx].name, settlements[buyer_idx].name
            );
            let buyer_name = settlements[buyer_idx].name.clone();
            let seller_name = settlements[seller_idx].name.clone();
            settlements[seller_idx].add_log(
                tick,
                &format!(
                    "trade to {} failed in transit, {:.1} {} lost",
                    buyer_name, removed, good.name
                ),
            );
            settlements[buyer_idx].add_log(
                tick,
                &format!("trade from {} rejected, storage full", seller_name),
            );
            stats.failed_deliveries += 1;
        }
    }

    records
}

/// Buyer-side batch for a non-bulk delivery: same id, origin, and quality
/// as the fragment the seller gave up, with this sale appended to the
/// history.
fn delivery_batch(
    fragment: ItemInstance,
    quantity: f32,
    seller: SettlementId,
    price: f32,
    tick: u64,
) -> ItemInstance {
    let mut delivery = fragment;
    delivery.quantity = quantity;
    delivery.trade_history.push(TradeStep {
        settlement: seller,
        price,
        tick,
    });
    delivery
}
