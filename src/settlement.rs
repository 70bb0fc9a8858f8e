//! Settlements: storage, consumption, and price discovery
//!
//! A settlement is the core economic actor. Its `Storage` splits fungible
//! bulk goods (a scalar per good) from discrete item batches (the arena in
//! `items`), with one shared capacity covering both. Every storage
//! operation reports the quantity it actually moved; callers compare that
//! against what they asked for and treat shortfalls as normal outcomes.

use std::collections::{BTreeMap, VecDeque};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::goods::{Good, GoodRegistry};
use crate::items::{ItemArena, ItemInstance};
use crate::params::SimParams;
use crate::types::{GoodId, RegionId, SettlementId, EPSILON};

/// Entries kept in a settlement's event log
const LOG_CAPACITY: usize = 10;

/// Demand threshold below which consumption is skipped entirely
const CONSUMPTION_FLOOR: f32 = 0.01;

/// Capacity-bounded store mixing bulk quantities and item batches
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Storage {
    /// Fungible stock, a scalar per good
    bulk: BTreeMap<GoodId, f32>,
    /// Discrete batches for non-bulk goods
    items: ItemArena,
    /// Shared ceiling across bulk and item stock
    pub capacity: f32,
}

impl Storage {
    pub fn new(owner: SettlementId, capacity: f32) -> Self {
        Storage {
            bulk: BTreeMap::new(),
            items: ItemArena::new(owner),
            capacity,
        }
    }

    /// Bulk amount plus all batch quantities for one good
    pub fn total_stored(&self, good_id: GoodId) -> f32 {
        self.bulk.get(&good_id).copied().unwrap_or(0.0) + self.items.total_of(good_id)
    }

    /// Total stored across all goods
    pub fn current_load(&self) -> f32 {
        self.bulk.values().sum::<f32>() + self.items.total()
    }

    pub fn available_capacity(&self) -> f32 {
        (self.capacity - self.current_load()).max(0.0)
    }

    /// Add up to `quantity` of a good, capped by free capacity. Bulk goods
    /// increment the scalar; non-bulk goods become a fresh batch. Returns
    /// the quantity actually admitted (0 when the store is full).
    pub fn add(&mut self, good: &Good, quantity: f32) -> f32 {
        let available = self.available_capacity();
        if available <= EPSILON {
            return 0.0;
        }
        let amount = quantity.min(available);
        if amount <= EPSILON {
            return 0.0;
        }
        if good.is_bulk {
            *self.bulk.entry(good.id).or_insert(0.0) += amount;
        } else {
            self.items.create(good.id, amount, 1.0);
        }
        amount
    }

    /// Admit an existing batch whole, or reject it entirely: batches are
    /// never split on the way in. Returns the admitted quantity; a rejected
    /// batch is dropped by the caller's choice of what to do with the
    /// returned zero.
    pub fn add_instance(&mut self, instance: ItemInstance) -> f32 {
        let available = self.available_capacity();
        if available <= EPSILON || instance.quantity > available {
            return 0.0;
        }
        let quantity = instance.quantity;
        self.items.insert(instance);
        quantity
    }

    /// Remove up to `quantity` of a good: bulk stock drains first, then
    /// item batches oldest-first with splitting. Returns the quantity
    /// actually removed plus the batch fragments consumed; the caller must
    /// compare against the requested amount, under-fulfilment is valid.
    pub fn remove(&mut self, good_id: GoodId, quantity: f32) -> (f32, Vec<ItemInstance>) {
        let mut removed = 0.0;
        if let Some(stock) = self.bulk.get_mut(&good_id) {
            let take = quantity.min(*stock);
            *stock -= take;
            removed += take;
            if *stock < EPSILON {
                self.bulk.remove(&good_id);
            }
        }
        let remaining = quantity - removed;
        let mut fragments = Vec::new();
        if remaining > EPSILON {
            let (from_items, item_fragments) = self.items.drain_fifo(good_id, remaining);
            removed += from_items;
            fragments = item_fragments;
        }
        (removed, fragments)
    }

    /// Smallest item batch held for a good, if any
    pub fn smallest_batch(&self, good_id: GoodId) -> Option<f32> {
        self.items.smallest_batch(good_id)
    }

    /// Item batches of a good in FIFO order
    pub fn batches_of(&self, good_id: GoodId) -> impl Iterator<Item = &ItemInstance> {
        self.items.batches_of(good_id)
    }
}

/// A settlement: population, terrain, wealth, labor, storage, local prices
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Settlement {
    pub id: SettlementId,
    pub name: String,
    pub region_id: RegionId,
    pub population: u32,
    /// Single terrain tag matched against recipe restrictions
    pub terrain_type: String,
    pub wealth: f32,
    /// Labor ceiling, fixed at creation from population
    pub max_labor_pool: f32,
    /// Labor left this tick; reset to max at the start of production
    pub current_labor_pool: f32,
    pub storage: Storage,
    /// Demand multipliers; goods without an entry default to 1.0
    consumption_needs: BTreeMap<GoodId, f32>,
    /// Spot prices computed by the pricing phase, keyed lazily
    pub local_prices: BTreeMap<GoodId, f32>,
    /// Human-readable event ring, informational only
    log: VecDeque<String>,
}

impl Settlement {
    pub fn new(
        id: SettlementId,
        name: &str,
        region_id: RegionId,
        population: u32,
        terrain_type: &str,
        params: &SimParams,
        initial_wealth: Option<f32>,
    ) -> Self {
        let base_capacity = population as f32 * params.storage_capacity_per_pop;
        let capacity = if params.is_city(population) {
            base_capacity * params.city_storage_multiplier
        } else {
            base_capacity
        };
        let max_labor_pool = population as f32 * params.labor_per_pop;
        Settlement {
            id,
            name: name.to_string(),
            region_id,
            population,
            terrain_type: terrain_type.to_string(),
            wealth: initial_wealth.unwrap_or(params.default_initial_wealth),
            max_labor_pool,
            current_labor_pool: max_labor_pool,
            storage: Storage::new(id, capacity),
            consumption_needs: BTreeMap::new(),
            local_prices: BTreeMap::new(),
            log: VecDeque::with_capacity(LOG_CAPACITY),
        }
    }

    /// Append an event line, keeping the last `LOG_CAPACITY` entries
    pub fn add_log(&mut self, tick: u64, message: &str) {
        self.log.push_back(format!("T{}: {}", tick, message));
        while self.log.len() > LOG_CAPACITY {
            self.log.pop_front();
        }
    }

    /// Event log, oldest first
    pub fn log_entries(&self) -> impl Iterator<Item = &str> {
        self.log.iter().map(String::as_str)
    }

    /// Demand multiplier for a good; unseen goods default to 1.0
    pub fn demand_modifier(&self, good_id: GoodId) -> f32 {
        self.consumption_needs.get(&good_id).copied().unwrap_or(1.0)
    }

    pub fn set_demand_modifier(&mut self, good_id: GoodId, modifier: f32) {
        self.consumption_needs.insert(good_id, modifier);
    }

    // Storage accessors used by the orchestrator and presentation layers

    pub fn get_total_stored(&self, good_id: GoodId) -> f32 {
        self.storage.total_stored(good_id)
    }

    pub fn get_current_storage_load(&self) -> f32 {
        self.storage.current_load()
    }

    pub fn add_to_storage(&mut self, good: &Good, quantity: f32) -> f32 {
        self.storage.add(good, quantity)
    }

    pub fn remove_from_storage(&mut self, good_id: GoodId, quantity: f32) -> (f32, Vec<ItemInstance>) {
        self.storage.remove(good_id, quantity)
    }

    /// Consumption phase: the population draws down stock of every consumed
    /// good. Shortfall is silently accepted; scarcity only shows up through
    /// the pricing phase.
    pub fn consume<R: Rng>(&mut self, goods: &GoodRegistry, params: &SimParams, rng: &mut R) {
        for good in goods.iter() {
            if !params.is_consumed(&good.key) {
                continue;
            }
            let noise = if params.consumption_noise > 0.0 {
                rng.gen_range(-params.consumption_noise..=params.consumption_noise)
            } else {
                0.0
            };
            let amount_needed = (params.base_consumption_rate
                * self.population as f32
                * self.demand_modifier(good.id)
                * (1.0 + noise))
                .max(0.0);
            if amount_needed <= CONSUMPTION_FLOOR {
                continue;
            }
            let available = self.storage.total_stored(good.id);
            let amount = amount_needed.min(available);
            if amount > CONSUMPTION_FLOOR {
                self.storage.remove(good.id, amount);
            }
        }
    }

    /// Pricing phase: memoryless spot price per good from the supply /
    /// demand ratio, clamped to `[min, max] x base_value`. Goods excluded
    /// from consumption get a constant demand floor so hoarded inputs stay
    /// cheap.
    pub fn update_prices(&mut self, goods: &GoodRegistry, params: &SimParams) {
        for good in goods.iter() {
            let supply = self.storage.total_stored(good.id).max(0.01);
            let demand_estimate = if params.is_consumed(&good.key) {
                (params.base_consumption_rate
                    * self.population as f32
                    * self.demand_modifier(good.id))
                .max(0.01)
            } else {
                0.01
            };
            let ratio = supply / demand_estimate;
            let price = good.base_value * ratio.powf(-params.price_sensitivity);
            let min_price = good.base_value * params.min_price_multiplier;
            let max_price = good.base_value * params.max_price_multiplier;
            self.local_prices
                .insert(good.id, price.clamp(min_price, max_price));
        }
    }
}
