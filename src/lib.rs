//! Settlement economy simulation library
//!
//! A tick-based multi-settlement economy: settlements produce goods from
//! terrain-gated recipes, their populations consume stock, local spot
//! prices react to supply and demand, and arbitrage trades move goods
//! between settlements. Re-exports the core types for use by binaries and
//! presentation layers.

pub mod goods;
pub mod items;
pub mod loader;
pub mod market;
pub mod params;
pub mod production;
pub mod settlement;
pub mod types;
pub mod world;

pub use goods::{Good, GoodRegistry, Recipe, RecipeError};
pub use items::{ItemInstance, TradeStep};
pub use loader::{load_world, WorldLoadError};
pub use market::{TradeOpportunity, TradeRecord, WorldStats};
pub use params::SimParams;
pub use settlement::{Settlement, Storage};
pub use types::{CivilizationId, GoodId, ItemInstanceId, RegionId, SettlementId};
pub use world::{Civilization, Region, World};
