//! Goods and production recipes
//!
//! `GoodRegistry` is the ordered, immutable-after-load catalogue of
//! everything tradable. Registry order matters: the production sweep visits
//! producible goods in insertion order, so loading order is part of world
//! definition.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::GoodId;

/// Validation failures for recipe construction or attachment.
///
/// These are configuration errors: they abort world construction rather
/// than being tolerated at runtime.
#[derive(Debug, Error, PartialEq)]
pub enum RecipeError {
    #[error("recipe must have at least one output")]
    EmptyOutputs,
    #[error("recipe labor must be >= 0, got {0}")]
    NegativeLabor(f32),
    #[error("recipe wealth cost must be >= 0, got {0}")]
    NegativeWealthCost(f32),
    #[error("recipe quantity for {good} must be > 0, got {quantity}")]
    NonPositiveQuantity { good: GoodId, quantity: f32 },
    #[error("good is not producible")]
    NotProducible,
}

/// A production rule converting inputs + labor + wealth into outputs,
/// optionally gated on the settlement's terrain.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Recipe {
    /// Required input quantities per cycle (may be empty)
    pub inputs: Vec<(GoodId, f32)>,
    /// Produced output quantities per cycle (never empty)
    pub outputs: Vec<(GoodId, f32)>,
    /// Labor units consumed per cycle
    pub labor: f32,
    /// Terrain tags the settlement must match; empty means no restriction
    pub required_terrain: HashSet<String>,
    /// Currency consumed per cycle
    pub wealth_cost: f32,
}

impl Recipe {
    /// Build a validated recipe. Input/output lists are sorted by good id so
    /// later iteration order is stable regardless of definition order.
    pub fn new(
        mut inputs: Vec<(GoodId, f32)>,
        mut outputs: Vec<(GoodId, f32)>,
        labor: f32,
        required_terrain: HashSet<String>,
        wealth_cost: f32,
    ) -> Result<Self, RecipeError> {
        if outputs.is_empty() {
            return Err(RecipeError::EmptyOutputs);
        }
        if !(labor >= 0.0) {
            return Err(RecipeError::NegativeLabor(labor));
        }
        if !(wealth_cost >= 0.0) {
            return Err(RecipeError::NegativeWealthCost(wealth_cost));
        }
        for &(good, quantity) in inputs.iter().chain(outputs.iter()) {
            if !(quantity > 0.0) {
                return Err(RecipeError::NonPositiveQuantity { good, quantity });
            }
        }
        inputs.sort_by_key(|&(good, _)| good);
        outputs.sort_by_key(|&(good, _)| good);
        Ok(Recipe {
            inputs,
            outputs,
            labor,
            required_terrain,
            wealth_cost,
        })
    }

    /// Whether a settlement on this terrain may run the recipe
    pub fn allows_terrain(&self, terrain: &str) -> bool {
        self.required_terrain.is_empty() || self.required_terrain.contains(terrain)
    }

    /// Total input quantity per cycle, across all input goods
    pub fn total_input_quantity(&self) -> f32 {
        self.inputs.iter().map(|&(_, quantity)| quantity).sum()
    }
}

/// A type of tradable good, potentially with a production recipe
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Good {
    pub id: GoodId,
    /// Stable external key ("grain", "iron_ore") used by config files
    pub key: String,
    /// Display name
    pub name: String,
    /// Reference price the local price oscillates around
    pub base_value: f32,
    /// Fungible scalar quantity vs. discrete batches with provenance
    pub is_bulk: bool,
    pub is_producible: bool,
    pub recipe: Option<Recipe>,
}

/// Insertion-ordered registry of goods, read-only once the world is built
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GoodRegistry {
    goods: Vec<Good>,
    by_key: HashMap<String, GoodId>,
}

impl GoodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a good. The returned id doubles as the registry index.
    /// Re-registering an existing key replaces nothing and returns the
    /// existing id; the loader treats duplicates as an error before this.
    pub fn add(
        &mut self,
        key: &str,
        name: &str,
        base_value: f32,
        is_bulk: bool,
        is_producible: bool,
    ) -> GoodId {
        if let Some(&id) = self.by_key.get(key) {
            return id;
        }
        let id = GoodId(self.goods.len() as u32);
        self.goods.push(Good {
            id,
            key: key.to_string(),
            name: name.to_string(),
            base_value,
            is_bulk,
            is_producible,
            recipe: None,
        });
        self.by_key.insert(key.to_string(), id);
        id
    }

    /// Attach a recipe to a producible good (one-time, at load)
    pub fn attach_recipe(&mut self, id: GoodId, recipe: Recipe) -> Result<(), RecipeError> {
        let good = &mut self.goods[id.0 as usize];
        if !good.is_producible {
            return Err(RecipeError::NotProducible);
        }
        good.recipe = Some(recipe);
        Ok(())
    }

    pub fn get(&self, id: GoodId) -> &Good {
        &self.goods[id.0 as usize]
    }

    pub fn lookup(&self, key: &str) -> Option<GoodId> {
        self.by_key.get(key).copied()
    }

    /// Goods in registry (insertion) order
    pub fn iter(&self) -> impl Iterator<Item = &Good> {
        self.goods.iter()
    }

    /// Producible goods with a recipe, in registry order
    pub fn producible(&self) -> impl Iterator<Item = &Good> {
        self.goods
            .iter()
            .filter(|g| g.is_producible && g.recipe.is_some())
    }

    pub fn len(&self) -> usize {
        self.goods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.goods.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terrain(tags: &[&str]) -> HashSet<String> {
        tags.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_registry_preserves_insertion_order() {
        let mut registry = GoodRegistry::new();
        let grain = registry.add("grain", "Grain", 2.0, true, true);
        let wood = registry.add("wood", "Wood", 1.5, true, true);
        let tools = registry.add("tools", "Tools", 12.0, false, true);

        let order: Vec<GoodId> = registry.iter().map(|g| g.id).collect();
        assert_eq!(order, vec![grain, wood, tools]);
        assert_eq!(registry.lookup("wood"), Some(wood));
        assert_eq!(registry.get(tools).name, "Tools");
    }

    #[test]
    fn test_recipe_requires_outputs() {
        let err = Recipe::new(vec![], vec![], 1.0, HashSet::new(), 0.0).unwrap_err();
        assert_eq!(err, RecipeError::EmptyOutputs);
    }

    #[test]
    fn test_recipe_rejects_bad_quantities() {
        let err = Recipe::new(
            vec![(GoodId(0), -2.0)],
            vec![(GoodId(1), 1.0)],
            1.0,
            HashSet::new(),
            0.0,
        )
        .unwrap_err();
        assert!(matches!(err, RecipeError::NonPositiveQuantity { .. }));

        let err = Recipe::new(vec![], vec![(GoodId(1), 1.0)], -1.0, HashSet::new(), 0.0)
            .unwrap_err();
        assert_eq!(err, RecipeError::NegativeLabor(-1.0));
    }

    #[test]
    fn test_recipe_terrain_gate() {
        let recipe = Recipe::new(
            vec![],
            vec![(GoodId(0), 1.0)],
            1.0,
            terrain(&["Forest"]),
            0.0,
        )
        .unwrap();
        assert!(recipe.allows_terrain("Forest"));
        assert!(!recipe.allows_terrain("Plains"));

        let open = Recipe::new(vec![], vec![(GoodId(0), 1.0)], 1.0, HashSet::new(), 0.0).unwrap();
        assert!(open.allows_terrain("Anywhere"));
    }

    #[test]
    fn test_attach_recipe_rejects_non_producible() {
        let mut registry = GoodRegistry::new();
        let ore = registry.add("iron_ore", "Iron Ore", 3.0, true, false);
        let recipe = Recipe::new(vec![], vec![(ore, 1.0)], 1.0, HashSet::new(), 0.0).unwrap();
        assert_eq!(
            registry.attach_recipe(ore, recipe),
            Err(RecipeError::NotProducible)
        );
    }
}
