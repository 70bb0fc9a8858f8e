//! Configuration parameters for the economy simulation

use serde::{Deserialize, Serialize};

/// Main configuration for the simulation.
///
/// Passed into `World` construction so different worlds (and tests) can run
/// with different tuning without touching global state.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SimParams {
    // Settlements
    /// Storage capacity granted per point of population
    pub storage_capacity_per_pop: f32,
    /// Labor pool granted per point of population, refilled each tick
    pub labor_per_pop: f32,
    /// Starting wealth when a settlement has no explicit override
    pub default_initial_wealth: f32,
    /// Population at which a settlement counts as a city
    pub city_population_threshold: u32,
    /// Storage capacity multiplier applied to cities at creation
    pub city_storage_multiplier: f32,

    // Consumption
    /// Goods consumed per population per tick, before demand modifiers
    pub base_consumption_rate: f32,
    /// Symmetric random perturbation applied to each demand draw (0.1 = ±10%)
    pub consumption_noise: f32,
    /// Raw/industrial goods the population never consumes directly
    pub non_consumed_goods: Vec<String>,

    // Pricing
    /// Elasticity exponent amplifying scarcity and glut signals
    pub price_sensitivity: f32,
    /// Price floor as a fraction of a good's base value
    pub min_price_multiplier: f32,
    /// Price ceiling as a multiple of a good's base value
    pub max_price_multiplier: f32,

    // Production
    /// Upper bound on full production sweeps per tick
    pub max_production_passes: usize,

    // Trade
    /// Buyer price must exceed seller price by this factor for a trade
    pub trade_profit_margin_threshold: f32,
    /// Probe size: maximum units moved by a single trade
    pub max_trade_quantity: f32,
    /// Maximum trades executed per tick across the whole world
    pub max_trades_per_tick: usize,

    // Upkeep
    /// Wealth paid per stored unit per tick (0 disables the upkeep phase)
    pub storage_upkeep_per_unit: f32,
}

impl Default for SimParams {
    fn default() -> Self {
        SimParams {
            storage_capacity_per_pop: 10.0,
            labor_per_pop: 0.5,
            default_initial_wealth: 500.0,
            city_population_threshold: 150,
            city_storage_multiplier: 1.5,

            base_consumption_rate: 0.1,
            consumption_noise: 0.1,
            non_consumed_goods: vec!["iron_ore".to_string(), "seed".to_string()],

            price_sensitivity: 2.0,
            min_price_multiplier: 0.1,
            max_price_multiplier: 10.0,

            max_production_passes: 5,

            trade_profit_margin_threshold: 1.05,
            max_trade_quantity: 1.0,
            max_trades_per_tick: 5,

            storage_upkeep_per_unit: 0.0,
        }
    }
}

impl SimParams {
    /// Whether a settlement of this population counts as a city
    pub fn is_city(&self, population: u32) -> bool {
        population >= self.city_population_threshold
    }

    /// Whether the population of a settlement consumes this good
    pub fn is_consumed(&self, good_key: &str) -> bool {
        !self.non_consumed_goods.iter().any(|k| k == good_key)
    }

    /// Params with randomness and trade friction removed, for exact asserts
    pub fn fast_test() -> Self {
        let mut params = Self::default();
        params.consumption_noise = 0.0;
        params.trade_profit_margin_threshold = 1.0;
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_city_threshold() {
        let params = SimParams::default();
        assert!(!params.is_city(149));
        assert!(params.is_city(150));
        assert!(params.is_city(400));
    }

    #[test]
    fn test_consumption_exclusions() {
        let params = SimParams::default();
        assert!(params.is_consumed("grain"));
        assert!(!params.is_consumed("iron_ore"));
        assert!(!params.is_consumed("seed"));
    }

    #[test]
    fn test_params_roundtrip_with_partial_json() {
        let parsed: SimParams =
            serde_json::from_str(r#"{"price_sensitivity": 3.5, "max_trades_per_tick": 2}"#)
                .unwrap();
        assert_eq!(parsed.price_sensitivity, 3.5);
        assert_eq!(parsed.max_trades_per_tick, 2);
        // Unspecified fields fall back to defaults
        assert_eq!(parsed.labor_per_pop, SimParams::default().labor_per_pop);
    }
}
