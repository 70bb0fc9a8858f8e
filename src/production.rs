//! Production phase: recipe cycles under labor, wealth, input, and
//! capacity bounds
//!
//! Each cycle is compute-then-commit: every precondition (terrain, labor,
//! wealth, input stock, output capacity) is validated before any state is
//! touched, so a cycle either applies completely or not at all and no
//! compensating rollback path exists.

use log::trace;

use crate::goods::{GoodRegistry, Recipe};
use crate::params::SimParams;
use crate::settlement::Settlement;
use crate::types::EPSILON;

/// Fraction of a requested quantity that must fit for a cycle to count as
/// fulfilled; matches the tolerance used by the trade executor.
const FULFILMENT_TOLERANCE: f32 = 0.99;

/// Run the production phase for one settlement. Resets the labor pool,
/// then sweeps producible goods in registry order, running each recipe as
/// many times as its bounds allow; sweeps repeat while any cycle succeeded,
/// up to `max_production_passes`. Returns the number of completed cycles.
pub fn run_production(
    settlement: &mut Settlement,
    goods: &GoodRegistry,
    params: &SimParams,
) -> u32 {
    settlement.current_labor_pool = settlement.max_labor_pool;
    let mut total_cycles = 0;

    for _pass in 0..params.max_production_passes {
        let mut cycles_this_pass = 0;
        for good in goods.producible() {
            let recipe = good
                .recipe
                .as_ref()
                .expect("producible() only yields goods with a recipe");
            // First failing check stops this recipe until the next sweep
            while attempt_cycle(settlement, goods, recipe) {
                cycles_this_pass += 1;
            }
        }
        total_cycles += cycles_this_pass;
        if cycles_this_pass == 0 {
            break;
        }
    }

    if total_cycles > 0 {
        trace!(
            "{} completed {} production cycles",
            settlement.name,
            total_cycles
        );
    }
    total_cycles
}

/// Validate and, if possible, apply one recipe cycle. Checks run in the
/// fixed order terrain, labor, wealth, inputs, output capacity; only when
/// all pass does any state change.
fn attempt_cycle(settlement: &mut Settlement, goods: &GoodRegistry, recipe: &Recipe) -> bool {
    if !recipe.allows_terrain(&settlement.terrain_type) {
        return false;
    }
    if settlement.current_labor_pool < recipe.labor {
        return false;
    }
    if settlement.wealth < recipe.wealth_cost {
        return false;
    }
    for &(input_id, required) in &recipe.inputs {
        if settlement.get_total_stored(input_id) < required {
            return false;
        }
    }
    if !outputs_fit(settlement, recipe) {
        return false;
    }

    // Commit: every precondition held, so each step moves the full amount
    settlement.current_labor_pool -= recipe.labor;
    settlement.wealth -= recipe.wealth_cost;
    for &(input_id, required) in &recipe.inputs {
        let (removed, _) = settlement.remove_from_storage(input_id, required);
        debug_assert!(
            removed >= required * FULFILMENT_TOLERANCE,
            "validated input {input_id} under-fulfilled: {removed} < {required}"
        );
    }
    for &(output_id, produced) in &recipe.outputs {
        let added = settlement.add_to_storage(goods.get(output_id), produced);
        debug_assert!(
            added >= produced * FULFILMENT_TOLERANCE,
            "validated output {output_id} under-fulfilled: {added} < {produced}"
        );
    }
    true
}

/// Whether the recipe's outputs fit in storage once its inputs have left.
/// Mirrors the admission path: bulk additions may be capped, so each output
/// must fit to at least the fulfilment tolerance.
fn outputs_fit(settlement: &Settlement, recipe: &Recipe) -> bool {
    let load_after_inputs =
        (settlement.get_current_storage_load() - recipe.total_input_quantity()).max(0.0);
    let mut projected = load_after_inputs;
    for &(_, produced) in &recipe.outputs {
        let available = (settlement.storage.capacity - projected).max(0.0);
        if available <= EPSILON {
            return false;
        }
        let fits = produced.min(available);
        if fits < produced * FULFILMENT_TOLERANCE {
            return false;
        }
        projected += fits;
    }
    true
}
