//! Ingot yield calculator
//!
//! Yield is computed per recipe against the stock currently on hand. A recipe
//! whose prerequisite ingot is short is limited by the ingots already stored;
//! producing that prerequisite first is not simulated.

use std::fmt;

use crate::inventory::Inventory;
use crate::models::{Recipe, ResourceKey};
use crate::recipes::RecipeGraph;

/// Which input limits a recipe's yield
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    Fuel,
    Ore,
    Prerequisite,
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Constraint::Fuel => "coal",
            Constraint::Ore => "ore",
            Constraint::Prerequisite => "ingot",
        })
    }
}

/// Units affordable from `available`, or `None` when nothing is required
fn affordable(available: u64, per_unit: u64) -> Option<u64> {
    (per_unit > 0).then(|| available / per_unit)
}

/// Independent limit imposed by each input that has a positive per-unit cost
fn constraint_limits(
    graph: &RecipeGraph,
    recipe: &Recipe,
    inventory: &Inventory,
) -> Vec<(Constraint, u64)> {
    let req = &recipe.requirements;
    let mut limits = Vec::with_capacity(3);

    if let Some(n) = affordable(inventory.get(&ResourceKey::Coal), req.coal) {
        limits.push((Constraint::Fuel, n));
    }
    if let Some(n) = affordable(inventory.get(&ResourceKey::Ore(req.ore_type)), req.ore) {
        limits.push((Constraint::Ore, n));
    }
    if let (Some(prev), Some(key)) = (&req.previous_ingot, graph.prerequisite_key(recipe)) {
        if let Some(n) = affordable(inventory.get(&key), prev.amount) {
            limits.push((Constraint::Prerequisite, n));
        }
    }

    limits
}

/// The tightest constraint, first declared winning ties
fn binding_constraint(
    graph: &RecipeGraph,
    recipe: &Recipe,
    inventory: &Inventory,
) -> Option<(Constraint, u64)> {
    constraint_limits(graph, recipe, inventory)
        .into_iter()
        .reduce(|best, next| if next.1 < best.1 { next } else { best })
}

/// Largest number of units of `recipe` the inventory can pay for.
///
/// A recipe with no positive requirement yields 0.
pub fn recipe_max_units(graph: &RecipeGraph, recipe: &Recipe, inventory: &Inventory) -> u64 {
    binding_constraint(graph, recipe, inventory).map_or(0, |(_, n)| n)
}

/// Largest number of units of the recipe with id `recipe_id` the inventory
/// can pay for. Unknown ids yield 0.
pub fn max_units(graph: &RecipeGraph, recipe_id: &str, inventory: &Inventory) -> u64 {
    graph
        .get(recipe_id)
        .map_or(0, |recipe| recipe_max_units(graph, recipe, inventory))
}

/// Maximum yield of one recipe and what reaching it would consume
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YieldRow {
    pub recipe_id: String,
    pub name: String,
    pub max_units: u64,
    pub coal_used: u64,
    pub ore_used: u64,
    pub prerequisite_used: u64,
    pub total_minutes: u64,
    pub binding: Option<Constraint>,
}

impl YieldRow {
    pub fn for_recipe(graph: &RecipeGraph, recipe: &Recipe, inventory: &Inventory) -> Self {
        let req = &recipe.requirements;
        let binding = binding_constraint(graph, recipe, inventory);
        let max_units = binding.map_or(0, |(_, n)| n);
        let prerequisite_amount = req.previous_ingot.as_ref().map_or(0, |p| p.amount);

        Self {
            recipe_id: recipe.id.clone(),
            name: recipe.name.clone(),
            max_units,
            coal_used: req.coal.saturating_mul(max_units),
            ore_used: req.ore.saturating_mul(max_units),
            prerequisite_used: prerequisite_amount.saturating_mul(max_units),
            total_minutes: req.crafting_time_minutes.saturating_mul(max_units),
            binding: binding.map(|(c, _)| c),
        }
    }
}

/// One row per recipe, in table order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YieldTable {
    pub rows: Vec<YieldRow>,
}

pub fn yield_table(graph: &RecipeGraph, inventory: &Inventory) -> YieldTable {
    YieldTable {
        rows: graph
            .iter()
            .map(|recipe| YieldRow::for_recipe(graph, recipe, inventory))
            .collect(),
    }
}

impl YieldTable {
    pub fn row(&self, recipe_id: &str) -> Option<&YieldRow> {
        self.rows.iter().find(|r| r.recipe_id == recipe_id)
    }
}

impl fmt::Display for YieldTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Possible Yield ===")?;
        writeln!(
            f,
            "{:<22} {:>8} {:>12} {:>12} {:>8} {:>10}  {}",
            "Recipe", "Yield", "Coal", "Ore", "Ingots", "Minutes", "Limited by"
        )?;
        writeln!(f, "{}", "-".repeat(88))?;
        for row in &self.rows {
            let limit = row
                .binding
                .map_or_else(|| "-".to_string(), |c| c.to_string());
            writeln!(
                f,
                "{:<22} {:>8} {:>12} {:>12} {:>8} {:>10}  {}",
                row.name,
                row.max_units,
                row.coal_used,
                row.ore_used,
                row.prerequisite_used,
                row.total_minutes,
                limit
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OreKind;
    use crate::recipes::{PrerequisiteDef, RecipeDef};

    fn product(id: &str) -> ResourceKey {
        ResourceKey::Product(id.to_string())
    }

    fn single(coal: u64, ore: u64) -> RecipeGraph {
        RecipeGraph::from_defs(vec![RecipeDef {
            id: "odd".to_string(),
            name: "Odd Ingot".to_string(),
            image: String::new(),
            color: String::new(),
            coal,
            ore,
            ore_type: OreKind::SilverOre,
            previous_ingot: None,
            crafting_time_minutes: 0,
        }])
        .unwrap()
    }

    #[test]
    fn copper_from_exact_stock() {
        let graph = RecipeGraph::reference();
        let inventory = Inventory::new()
            .with(ResourceKey::Coal, 200)
            .with(ResourceKey::Ore(OreKind::CopperOre), 150);
        assert_eq!(max_units(&graph, "copperIngot", &inventory), 1);
    }

    #[test]
    fn iron_limited_by_copper_ingots() {
        let graph = RecipeGraph::reference();
        let inventory = Inventory::new()
            .with(ResourceKey::Coal, 3000)
            .with(ResourceKey::Ore(OreKind::IronOre), 3000)
            .with(product("copperIngot"), 5);
        assert_eq!(max_units(&graph, "ironIngot", &inventory), 2);

        let row = YieldRow::for_recipe(&graph, graph.get("ironIngot").unwrap(), &inventory);
        assert_eq!(row.binding, Some(Constraint::Prerequisite));
        assert_eq!(row.coal_used, 600);
        assert_eq!(row.ore_used, 600);
        assert_eq!(row.prerequisite_used, 4);
        assert_eq!(row.total_minutes, 24);
    }

    #[test]
    fn unknown_recipe_yields_zero() {
        let graph = RecipeGraph::reference();
        let inventory = Inventory::new().with(ResourceKey::Coal, u64::MAX);
        assert_eq!(max_units(&graph, "nonexistent-id", &inventory), 0);
    }

    #[test]
    fn missing_prerequisite_stock_counts_as_zero() {
        let graph = RecipeGraph::reference();
        let inventory = Inventory::new()
            .with(ResourceKey::Coal, 3000)
            .with(ResourceKey::Ore(OreKind::IronOre), 3000);
        assert_eq!(max_units(&graph, "ironIngot", &inventory), 0);
    }

    #[test]
    fn zero_fuel_requirement_is_ignored() {
        let graph = single(0, 10);
        for coal in [0, 1, 999] {
            let inventory = Inventory::new()
                .with(ResourceKey::Coal, coal)
                .with(ResourceKey::Ore(OreKind::SilverOre), 35);
            assert_eq!(max_units(&graph, "odd", &inventory), 3);
        }
    }

    #[test]
    fn zero_ore_requirement_is_ignored() {
        let graph = single(100, 0);
        let inventory = Inventory::new().with(ResourceKey::Coal, 250);
        assert_eq!(max_units(&graph, "odd", &inventory), 2);
    }

    #[test]
    fn recipe_without_constraints_yields_zero() {
        let graph = single(0, 0);
        let inventory = Inventory::new()
            .with(ResourceKey::Coal, 1_000_000)
            .with(ResourceKey::Ore(OreKind::SilverOre), 1_000_000);
        assert_eq!(max_units(&graph, "odd", &inventory), 0);
        assert_eq!(
            YieldRow::for_recipe(&graph, graph.get("odd").unwrap(), &inventory).binding,
            None
        );
    }

    #[test]
    fn zero_prerequisite_amount_is_ignored() {
        let mut defs = vec![RecipeDef {
            id: "base".to_string(),
            name: "Base".to_string(),
            image: String::new(),
            color: String::new(),
            coal: 1,
            ore: 1,
            ore_type: OreKind::CopperOre,
            previous_ingot: None,
            crafting_time_minutes: 0,
        }];
        let mut top = defs[0].clone();
        top.id = "top".to_string();
        top.previous_ingot = Some(PrerequisiteDef {
            recipe: "base".to_string(),
            amount: 0,
        });
        defs.push(top);
        let graph = RecipeGraph::from_defs(defs).unwrap();

        let inventory = Inventory::new()
            .with(ResourceKey::Coal, 4)
            .with(ResourceKey::Ore(OreKind::CopperOre), 9);
        assert_eq!(max_units(&graph, "top", &inventory), 4);
    }

    #[test]
    fn chain_reads_stored_ingots_only() {
        let graph = RecipeGraph::reference();
        // plenty of raw material for silver, but no iron ingots stored
        let inventory = Inventory::new()
            .with(ResourceKey::Coal, 100_000)
            .with(ResourceKey::Ore(OreKind::IronOre), 100_000)
            .with(ResourceKey::Ore(OreKind::SilverOre), 100_000)
            .with(product("copperIngot"), 100)
            .with(product("ironIngot"), 0);

        assert_eq!(max_units(&graph, "ironIngot", &inventory), 50);
        assert_eq!(max_units(&graph, "silverIngot", &inventory), 0);
    }

    #[test]
    fn table_follows_graph_order() {
        let graph = RecipeGraph::reference();
        let inventory = Inventory::with_defaults(&graph)
            .with(ResourceKey::Coal, 1000)
            .with(ResourceKey::Ore(OreKind::CopperOre), 1000);
        let table = yield_table(&graph, &inventory);

        assert_eq!(table.rows.len(), 6);
        assert_eq!(table.rows[0].recipe_id, "copperIngot");
        assert_eq!(table.row("copperIngot").unwrap().max_units, 5);
        assert_eq!(table.row("copperIngot").unwrap().binding, Some(Constraint::Fuel));
        assert!(table.rows[1..].iter().all(|r| r.max_units == 0));

        let rendered = table.to_string();
        assert!(rendered.contains("Copper Ingot"));
        assert!(rendered.contains("Dragon Glass Ingot"));
    }

    #[test]
    fn ties_report_first_constraint() {
        let graph = RecipeGraph::reference();
        let inventory = Inventory::new()
            .with(ResourceKey::Coal, 400)
            .with(ResourceKey::Ore(OreKind::CopperOre), 300);
        let row = YieldRow::for_recipe(&graph, graph.get("copperIngot").unwrap(), &inventory);
        assert_eq!(row.max_units, 2);
        assert_eq!(row.binding, Some(Constraint::Fuel));
    }
}
