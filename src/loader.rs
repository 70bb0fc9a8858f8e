//! External boundary: building a `World` from JSON definition files
//!
//! Two documents drive construction: a world config (parameters, goods in
//! registry order, regions, civilizations, settlements with starting stock)
//! and a recipe set keyed by the good each recipe produces. Every
//! configuration problem aborts construction with a `WorldLoadError`;
//! nothing here is tolerated at runtime.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::info;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

use crate::goods::{Recipe, RecipeError};
use crate::params::SimParams;
use crate::types::GoodId;
use crate::world::World;

#[derive(Debug, Error)]
pub enum WorldLoadError {
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed JSON in {path}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("world defines no goods")]
    NoGoods,
    #[error("duplicate good key \"{0}\"")]
    DuplicateGood(String),
    #[error("good \"{key}\" has non-positive base value {base_value}")]
    InvalidBaseValue { key: String, base_value: f32 },
    #[error("unknown good \"{key}\" referenced by {context}")]
    UnknownGood { key: String, context: String },
    #[error("unknown region \"{key}\" referenced by {context}")]
    UnknownRegion { key: String, context: String },
    #[error("invalid recipe for \"{key}\"")]
    Recipe {
        key: String,
        #[source]
        source: RecipeError,
    },
}

/// Top-level world definition document
#[derive(Clone, Debug, Deserialize)]
pub struct WorldConfig {
    #[serde(default)]
    pub simulation_parameters: SimParams,
    /// Goods in registry order; the production sweep follows this order
    pub goods: Vec<GoodDef>,
    #[serde(default)]
    pub regions: Vec<RegionDef>,
    #[serde(default)]
    pub civilizations: Vec<CivilizationDef>,
    #[serde(default)]
    pub settlements: Vec<SettlementDef>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct GoodDef {
    pub key: String,
    pub name: String,
    pub base_value: f32,
    #[serde(default = "default_true")]
    pub is_bulk: bool,
    #[serde(default)]
    pub is_producible: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, Deserialize)]
pub struct RegionDef {
    /// Stable key settlements and civilizations refer to
    pub key: String,
    pub name: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CivilizationDef {
    pub name: String,
    pub regions: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SettlementDef {
    pub name: String,
    pub region: String,
    pub population: u32,
    pub terrain_type: String,
    /// Overrides the parameter default when present
    #[serde(default)]
    pub initial_wealth: Option<f32>,
    /// Starting stock, good key to quantity; capacity rules apply
    #[serde(default)]
    pub initial_stock: BTreeMap<String, f32>,
    /// Demand multipliers; goods left out default to 1.0
    #[serde(default)]
    pub demand_modifiers: BTreeMap<String, f32>,
}

/// Recipe definitions keyed by the good each one produces
pub type RecipeSet = BTreeMap<String, RecipeDef>;

#[derive(Clone, Debug, Deserialize)]
pub struct RecipeDef {
    #[serde(default)]
    pub inputs: BTreeMap<String, f32>,
    pub outputs: BTreeMap<String, f32>,
    #[serde(default)]
    pub labor: f32,
    #[serde(default)]
    pub required_terrain: HashSet<String>,
    #[serde(default)]
    pub wealth_cost: f32,
}

/// Load a world from a config document and a recipe document on disk
pub fn load_world(
    config_path: &Path,
    recipes_path: &Path,
    seed: u64,
) -> Result<World, WorldLoadError> {
    let config: WorldConfig = read_json(config_path)?;
    let recipes: RecipeSet = read_json(recipes_path)?;
    build_world(config, recipes, seed)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, WorldLoadError> {
    let text = fs::read_to_string(path).map_err(|source| WorldLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| WorldLoadError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Build a world from already-parsed definitions. Fails fast on the first
/// configuration error; a partially built world is never returned.
pub fn build_world(
    config: WorldConfig,
    recipes: RecipeSet,
    seed: u64,
) -> Result<World, WorldLoadError> {
    if config.goods.is_empty() {
        return Err(WorldLoadError::NoGoods);
    }
    let mut world = World::new(config.simulation_parameters, seed);

    for def in &config.goods {
        if !(def.base_value > 0.0) {
            return Err(WorldLoadError::InvalidBaseValue {
                key: def.key.clone(),
                base_value: def.base_value,
            });
        }
        if world.goods.lookup(&def.key).is_some() {
            return Err(WorldLoadError::DuplicateGood(def.key.clone()));
        }
        world.add_good(&def.key, &def.name, def.base_value, def.is_bulk, def.is_producible);
    }

    for (key, def) in &recipes {
        let good_id = resolve_good(&world, key, "the recipe set")?;
        let context = format!("the recipe for \"{key}\"");
        let inputs = resolve_quantities(&world, &def.inputs, &context)?;
        let outputs = resolve_quantities(&world, &def.outputs, &context)?;
        let recipe = Recipe::new(
            inputs,
            outputs,
            def.labor,
            def.required_terrain.clone(),
            def.wealth_cost,
        )
        .map_err(|source| WorldLoadError::Recipe {
            key: key.clone(),
            source,
        })?;
        world
            .attach_recipe(good_id, recipe)
            .map_err(|source| WorldLoadError::Recipe {
                key: key.clone(),
                source,
            })?;
    }

    let mut region_ids = HashMap::new();
    for def in &config.regions {
        region_ids.insert(def.key.clone(), world.add_region(&def.name));
    }

    for def in &config.civilizations {
        let mut resolved = Vec::with_capacity(def.regions.len());
        for key in &def.regions {
            let id = region_ids
                .get(key)
                .copied()
                .ok_or_else(|| WorldLoadError::UnknownRegion {
                    key: key.clone(),
                    context: format!("civilization \"{}\"", def.name),
                })?;
            resolved.push(id);
        }
        world.add_civilization(&def.name, resolved);
    }

    for def in &config.settlements {
        let region = region_ids
            .get(&def.region)
            .copied()
            .ok_or_else(|| WorldLoadError::UnknownRegion {
                key: def.region.clone(),
                context: format!("settlement \"{}\"", def.name),
            })?;
        let id = world.add_settlement(
            &def.name,
            region,
            def.population,
            &def.terrain_type,
            def.initial_wealth,
        );
        for (good_key, &quantity) in &def.initial_stock {
            let context = format!("initial stock of \"{}\"", def.name);
            let good = resolve_good(&world, good_key, &context)?;
            world.add_initial_stock(id, good, quantity);
        }
        for (good_key, &modifier) in &def.demand_modifiers {
            let context = format!("demand modifiers of \"{}\"", def.name);
            let good = resolve_good(&world, good_key, &context)?;
            world.settlement_mut(id).set_demand_modifier(good, modifier);
        }
    }

    info!(
        "loaded world: {} goods, {} settlements, {} regions, seed {}",
        world.goods.len(),
        world.get_all_settlements().len(),
        world.regions.len(),
        seed
    );
    Ok(world)
}

fn resolve_good(world: &World, key: &str, context: &str) -> Result<GoodId, WorldLoadError> {
    world
        .goods
        .lookup(key)
        .ok_or_else(|| WorldLoadError::UnknownGood {
            key: key.to_string(),
            context: context.to_string(),
        })
}

fn resolve_quantities(
    world: &World,
    quantities: &BTreeMap<String, f32>,
    context: &str,
) -> Result<Vec<(GoodId, f32)>, WorldLoadError> {
    let mut resolved = Vec::with_capacity(quantities.len());
    for (key, &quantity) in quantities {
        resolved.push((resolve_good(world, key, context)?, quantity));
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SettlementId;

    const CONFIG: &str = r#"{
        "simulation_parameters": { "consumption_noise": 0.0 },
        "goods": [
            { "key": "seed", "name": "Seed", "base_value": 1.0 },
            { "key": "grain", "name": "Grain", "base_value": 2.0, "is_producible": true },
            { "key": "tools", "name": "Tools", "base_value": 12.0, "is_bulk": false, "is_producible": true }
        ],
        "regions": [
            { "key": "valley", "name": "Green Valley" }
        ],
        "civilizations": [
            { "name": "The Settlers", "regions": ["valley"] }
        ],
        "settlements": [
            {
                "name": "Farmstead",
                "region": "valley",
                "population": 100,
                "terrain_type": "Grassland",
                "initial_stock": { "seed": 20.0, "grain": 50.0 },
                "demand_modifiers": { "grain": 1.2 }
            },
            {
                "name": "Craftburg",
                "region": "valley",
                "population": 120,
                "terrain_type": "Hills",
                "initial_wealth": 1000.0
            }
        ]
    }"#;

    const RECIPES: &str = r#"{
        "grain": {
            "inputs": { "seed": 1.0 },
            "outputs": { "grain": 3.0 },
            "labor": 2.0,
            "required_terrain": ["Grassland", "Plains"]
        }
    }"#;

    fn parse(config: &str, recipes: &str) -> Result<World, WorldLoadError> {
        let config: WorldConfig = serde_json::from_str(config).unwrap();
        let recipes: RecipeSet = serde_json::from_str(recipes).unwrap();
        build_world(config, recipes, 42)
    }

    #[test]
    fn test_full_config_loads() {
        let world = parse(CONFIG, RECIPES).unwrap();
        assert_eq!(world.goods.len(), 3);
        assert_eq!(world.get_all_settlements().len(), 2);
        assert_eq!(world.regions.len(), 1);
        assert_eq!(world.civilizations.len(), 1);
        assert_eq!(world.seed(), 42);
        // Parameter overrides from the document take effect
        assert_eq!(world.params.consumption_noise, 0.0);

        let grain = world.goods.lookup("grain").unwrap();
        let farm = world.settlement(SettlementId(0));
        assert_eq!(farm.get_total_stored(grain), 50.0);
        assert_eq!(farm.demand_modifier(grain), 1.2);
        assert_eq!(farm.terrain_type, "Grassland");

        let town = world.settlement(SettlementId(1));
        assert_eq!(town.wealth, 1000.0);

        let recipe = world.goods.get(grain).recipe.as_ref().unwrap();
        assert_eq!(recipe.labor, 2.0);
        assert!(recipe.allows_terrain("Plains"));
        assert!(!recipe.allows_terrain("Mountain"));
    }

    #[test]
    fn test_registry_order_follows_document_order() {
        let world = parse(CONFIG, RECIPES).unwrap();
        let keys: Vec<&str> = world.goods.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, vec!["seed", "grain", "tools"]);
    }

    #[test]
    fn test_rejects_empty_good_list() {
        let err = parse(r#"{ "goods": [] }"#, "{}").unwrap_err();
        assert!(matches!(err, WorldLoadError::NoGoods));
    }

    #[test]
    fn test_rejects_duplicate_good_key() {
        let config = r#"{ "goods": [
            { "key": "grain", "name": "Grain", "base_value": 2.0 },
            { "key": "grain", "name": "Grain Again", "base_value": 3.0 }
        ] }"#;
        let err = parse(config, "{}").unwrap_err();
        assert!(matches!(err, WorldLoadError::DuplicateGood(key) if key == "grain"));
    }

    #[test]
    fn test_rejects_non_positive_base_value() {
        let config = r#"{ "goods": [
            { "key": "grain", "name": "Grain", "base_value": 0.0 }
        ] }"#;
        let err = parse(config, "{}").unwrap_err();
        assert!(matches!(err, WorldLoadError::InvalidBaseValue { .. }));
    }

    #[test]
    fn test_rejects_recipe_for_unknown_good() {
        let recipes = r#"{ "bread": { "outputs": { "bread": 1.0 } } }"#;
        let err = parse(CONFIG, recipes).unwrap_err();
        assert!(matches!(err, WorldLoadError::UnknownGood { key, .. } if key == "bread"));
    }

    #[test]
    fn test_rejects_recipe_with_unknown_input() {
        let recipes = r#"{ "grain": {
            "inputs": { "water": 1.0 },
            "outputs": { "grain": 3.0 }
        } }"#;
        let err = parse(CONFIG, recipes).unwrap_err();
        assert!(matches!(err, WorldLoadError::UnknownGood { key, .. } if key == "water"));
    }

    #[test]
    fn test_rejects_recipe_with_empty_outputs() {
        let recipes = r#"{ "grain": { "outputs": {} } }"#;
        let err = parse(CONFIG, recipes).unwrap_err();
        assert!(matches!(
            err,
            WorldLoadError::Recipe {
                source: RecipeError::EmptyOutputs,
                ..
            }
        ));
    }

    #[test]
    fn test_rejects_recipe_on_non_producible_good() {
        let recipes = r#"{ "seed": { "outputs": { "seed": 2.0 } } }"#;
        let err = parse(CONFIG, recipes).unwrap_err();
        assert!(matches!(
            err,
            WorldLoadError::Recipe {
                source: RecipeError::NotProducible,
                ..
            }
        ));
    }

    #[test]
    fn test_rejects_unknown_region_reference() {
        let config = r#"{
            "goods": [ { "key": "grain", "name": "Grain", "base_value": 2.0 } ],
            "settlements": [
                { "name": "Lost Town", "region": "nowhere", "population": 10, "terrain_type": "Plains" }
            ]
        }"#;
        let err = parse(config, "{}").unwrap_err();
        assert!(matches!(err, WorldLoadError::UnknownRegion { key, .. } if key == "nowhere"));
    }

    #[test]
    fn test_rejects_unknown_stock_good() {
        let config = r#"{
            "goods": [ { "key": "grain", "name": "Grain", "base_value": 2.0 } ],
            "regions": [ { "key": "valley", "name": "Valley" } ],
            "settlements": [
                {
                    "name": "Farm", "region": "valley", "population": 10,
                    "terrain_type": "Plains", "initial_stock": { "gold": 5.0 }
                }
            ]
        }"#;
        let err = parse(config, "{}").unwrap_err();
        assert!(matches!(err, WorldLoadError::UnknownGood { key, .. } if key == "gold"));
    }

    #[test]
    fn test_missing_file_reports_io_error() {
        let err = load_world(
            Path::new("/definitely/not/here/config.json"),
            Path::new("/definitely/not/here/recipes.json"),
            1,
        )
        .unwrap_err();
        assert!(matches!(err, WorldLoadError::Io { .. }));
    }
}
