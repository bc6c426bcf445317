//! TerraX forge calculator
//!
//! Tracks a personal stockpile of coal, ores and ingots, computes how many
//! ingots of each tier the stockpile can produce, and keeps the marketplace
//! registry and listings in a local SQLite store.

pub mod calculator;
pub mod db;
pub mod inventory;
pub mod market;
pub mod models;
pub mod recipes;

pub use calculator::{max_units, recipe_max_units, yield_table, Constraint, YieldRow, YieldTable};
pub use inventory::{Inventory, InventoryStore};
pub use models::{OreKind, Recipe, ResourceKey};
pub use recipes::{RecipeError, RecipeGraph};
