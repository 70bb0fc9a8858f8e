//! Discrete item batches and their owning arena
//!
//! Non-bulk goods are tracked as `ItemInstance` batches carrying provenance
//! and trade history. Each settlement owns one `ItemArena`: instances live
//! in the arena keyed by id, with a per-good FIFO index deciding removal
//! order ("sell oldest stock first"). Moving a batch between settlements
//! transfers it from one arena to another; it is never shared.

use std::collections::{BTreeMap, HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::types::{GoodId, ItemInstanceId, SettlementId, EPSILON};

/// One hop in a batch's trade history
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TradeStep {
    /// Settlement that sold the batch
    pub settlement: SettlementId,
    /// Unit price the hop settled at
    pub price: f32,
    pub tick: u64,
}

/// A specific batch of a non-bulk good
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ItemInstance {
    pub instance_id: ItemInstanceId,
    pub good_id: GoodId,
    /// Where the batch was produced; never changes
    pub origin_settlement_id: SettlementId,
    /// Which settlement's arena currently holds the batch
    pub current_location_settlement_id: SettlementId,
    pub quantity: f32,
    /// Quality multiplier, 1.0 for ordinary stock
    pub quality: f32,
    /// Append-only record of every sale the batch passed through
    pub trade_history: Vec<TradeStep>,
}

impl ItemInstance {
    /// Copy of this batch representing `quantity` units split off it.
    /// The fragment keeps the source id and history so provenance survives
    /// partial removal.
    pub fn split_fragment(&self, quantity: f32) -> ItemInstance {
        ItemInstance {
            instance_id: self.instance_id,
            good_id: self.good_id,
            origin_settlement_id: self.origin_settlement_id,
            current_location_settlement_id: self.current_location_settlement_id,
            quantity,
            quality: self.quality,
            trade_history: self.trade_history.clone(),
        }
    }
}

/// Arena of item batches owned by one settlement.
///
/// Instance lifetime is explicit: batches are created here (production,
/// capped bulk additions of non-bulk goods), relocated here (trade), and
/// destroyed here when drained below epsilon.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ItemArena {
    owner: SettlementId,
    instances: HashMap<ItemInstanceId, ItemInstance>,
    /// FIFO index per good; front is the oldest batch
    by_good: BTreeMap<GoodId, VecDeque<ItemInstanceId>>,
    next_serial: u64,
}

impl ItemArena {
    pub fn new(owner: SettlementId) -> Self {
        ItemArena {
            owner,
            instances: HashMap::new(),
            by_good: BTreeMap::new(),
            next_serial: 0,
        }
    }

    fn mint_id(&mut self) -> ItemInstanceId {
        let id = ItemInstanceId {
            minted_by: self.owner,
            serial: self.next_serial,
        };
        self.next_serial += 1;
        id
    }

    /// Create a fresh batch originating at the owning settlement
    pub fn create(&mut self, good_id: GoodId, quantity: f32, quality: f32) -> ItemInstanceId {
        let id = self.mint_id();
        self.instances.insert(
            id,
            ItemInstance {
                instance_id: id,
                good_id,
                origin_settlement_id: self.owner,
                current_location_settlement_id: self.owner,
                quantity,
                quality,
                trade_history: Vec::new(),
            },
        );
        self.by_good.entry(good_id).or_default().push_back(id);
        id
    }

    /// Take ownership of a batch arriving from elsewhere. If a batch with
    /// the same id already lives here (a second fragment of the same source
    /// batch), the newcomer is re-minted under a fresh id; its origin and
    /// history are untouched.
    pub fn insert(&mut self, mut instance: ItemInstance) -> ItemInstanceId {
        instance.current_location_settlement_id = self.owner;
        if self.instances.contains_key(&instance.instance_id) {
            instance.instance_id = self.mint_id();
        }
        let id = instance.instance_id;
        self.by_good
            .entry(instance.good_id)
            .or_default()
            .push_back(id);
        self.instances.insert(id, instance);
        id
    }

    /// Total quantity held for one good
    pub fn total_of(&self, good_id: GoodId) -> f32 {
        self.by_good
            .get(&good_id)
            .map(|queue| {
                queue
                    .iter()
                    .map(|id| self.instances[id].quantity)
                    .sum::<f32>()
            })
            .unwrap_or(0.0)
    }

    /// Total quantity held across all goods
    pub fn total(&self) -> f32 {
        self.by_good
            .keys()
            .map(|&good| self.total_of(good))
            .sum()
    }

    /// Smallest batch currently held for a good, if any
    pub fn smallest_batch(&self, good_id: GoodId) -> Option<f32> {
        self.by_good.get(&good_id).and_then(|queue| {
            queue
                .iter()
                .map(|id| self.instances[id].quantity)
                .min_by(|a, b| a.partial_cmp(b).expect("batch quantity is finite"))
        })
    }

    /// Batches of a good in FIFO order
    pub fn batches_of(&self, good_id: GoodId) -> impl Iterator<Item = &ItemInstance> {
        self.by_good
            .get(&good_id)
            .into_iter()
            .flat_map(move |queue| queue.iter().map(move |id| &self.instances[id]))
    }

    /// Remove up to `quantity` units of a good, draining batches oldest
    /// first and splitting the last one touched. Returns the quantity
    /// actually removed plus one fragment per batch drawn from; batches
    /// drained below epsilon are destroyed.
    pub fn drain_fifo(&mut self, good_id: GoodId, quantity: f32) -> (f32, Vec<ItemInstance>) {
        let mut removed = 0.0;
        let mut fragments = Vec::new();
        let mut remaining = quantity;

        let Some(queue) = self.by_good.get_mut(&good_id) else {
            return (0.0, fragments);
        };

        while remaining > EPSILON {
            let Some(&head_id) = queue.front() else {
                break;
            };
            let head = self
                .instances
                .get_mut(&head_id)
                .expect("FIFO index entries always resolve");
            let take = remaining.min(head.quantity);
            fragments.push(head.split_fragment(take));
            head.quantity -= take;
            removed += take;
            remaining -= take;
            if head.quantity < EPSILON {
                self.instances.remove(&head_id);
                queue.pop_front();
            }
        }
        if queue.is_empty() {
            self.by_good.remove(&good_id);
        }
        (removed, fragments)
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}
