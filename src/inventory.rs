//! Resource stockpile snapshot and the store that persists it

use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;
use rusqlite::Connection;
use tracing::{debug, warn};

use crate::db;
use crate::models::{OreKind, ResourceKey};
use crate::recipes::RecipeGraph;

/// Quantities on hand per resource kind.
///
/// A key that was never set reads as zero stock.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    quantities: BTreeMap<ResourceKey, u64>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Coal, every ore, and every product some recipe consumes, all at zero
    pub fn with_defaults(graph: &RecipeGraph) -> Self {
        let mut inventory = Self::new();
        inventory.set(ResourceKey::Coal, 0);
        for ore in OreKind::ALL {
            inventory.set(ResourceKey::Ore(ore), 0);
        }
        for key in graph.product_keys() {
            inventory.set(key, 0);
        }
        inventory
    }

    pub fn with(mut self, key: ResourceKey, quantity: u64) -> Self {
        self.set(key, quantity);
        self
    }

    pub fn get(&self, key: &ResourceKey) -> u64 {
        self.lookup(key).unwrap_or(0)
    }

    /// Distinguishes an untracked key from one holding zero
    pub fn lookup(&self, key: &ResourceKey) -> Option<u64> {
        self.quantities.get(key).copied()
    }

    pub fn set(&mut self, key: ResourceKey, quantity: u64) {
        self.quantities.insert(key, quantity);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ResourceKey, u64)> {
        self.quantities.iter().map(|(k, &q)| (k, q))
    }

    pub fn len(&self) -> usize {
        self.quantities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quantities.is_empty()
    }
}

/// Largest quantity the stock record can hold
pub const MAX_QUANTITY: u64 = i64::MAX as u64;

static LEADING_INTEGER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([+-]?)(\d+)").expect("valid regex"));

/// Read a quantity the way a numeric form field is read: leading digits are
/// taken, anything unparsable becomes 0, negatives become 0, and values too
/// large for `u64` saturate.
pub fn parse_quantity(input: &str) -> u64 {
    let Some(caps) = LEADING_INTEGER.captures(input) else {
        return 0;
    };
    if &caps[1] == "-" {
        return 0;
    }
    caps[2].parse().unwrap_or(u64::MAX)
}

/// Clamp a stored signed quantity into range
pub fn coerce_quantity(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

/// Split a `key=quantity` assignment
pub fn parse_assignment(input: &str) -> Option<(&str, u64)> {
    let (key, value) = input.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key, parse_quantity(value)))
}

/// Where an `InventoryStore` persists its entries
pub trait StockBackend {
    fn load(&self) -> Result<Vec<(String, i64)>>;
    fn save(&mut self, key: &str, quantity: u64) -> Result<()>;
    fn clear(&mut self) -> Result<()>;
}

/// Stock persisted in the local SQLite database
pub struct SqliteStock<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteStock<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl StockBackend for SqliteStock<'_> {
    fn load(&self) -> Result<Vec<(String, i64)>> {
        db::load_stock(self.conn)
    }

    fn save(&mut self, key: &str, quantity: u64) -> Result<()> {
        db::save_stock_entry(self.conn, key, quantity)
    }

    fn clear(&mut self) -> Result<()> {
        db::clear_stock(self.conn)
    }
}

/// Volatile backend, also counts writes
#[derive(Debug, Default)]
pub struct MemoryStock {
    pub entries: HashMap<String, i64>,
    pub saves: usize,
}

impl StockBackend for MemoryStock {
    fn load(&self) -> Result<Vec<(String, i64)>> {
        Ok(self.entries.iter().map(|(k, &v)| (k.clone(), v)).collect())
    }

    fn save(&mut self, key: &str, quantity: u64) -> Result<()> {
        self.entries
            .insert(key.to_string(), i64::try_from(quantity).unwrap_or(i64::MAX));
        self.saves += 1;
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        Ok(())
    }
}

/// Owns the live inventory and writes every change through to its backend
pub struct InventoryStore<B: StockBackend> {
    backend: B,
    inventory: Inventory,
    defaults: Inventory,
}

impl<B: StockBackend> InventoryStore<B> {
    /// Start from the default inventory and overlay whatever the backend holds.
    /// Entries whose key is unknown to `graph` are skipped.
    pub fn open(backend: B, graph: &RecipeGraph) -> Result<Self> {
        let defaults = Inventory::with_defaults(graph);
        let mut inventory = defaults.clone();

        for (key, value) in backend.load()? {
            match graph.resolve_key(&key) {
                Some(resource) => inventory.set(resource, coerce_quantity(value)),
                None => warn!(key = %key, "ignoring stock entry for unknown resource"),
            }
        }
        debug!(entries = inventory.len(), "inventory loaded");

        Ok(Self {
            backend,
            inventory,
            defaults,
        })
    }

    pub fn get(&self) -> &Inventory {
        &self.inventory
    }

    pub fn quantity(&self, key: &ResourceKey) -> u64 {
        self.inventory.get(key)
    }

    /// Quantities above `MAX_QUANTITY` are clamped so the live copy matches
    /// what the backend persists.
    pub fn set(&mut self, key: ResourceKey, quantity: u64) -> Result<()> {
        let quantity = quantity.min(MAX_QUANTITY);
        self.backend.save(key.storage_key(), quantity)?;
        debug!(key = %key, quantity, "stock updated");
        self.inventory.set(key, quantity);
        Ok(())
    }

    pub fn set_many<I>(&mut self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (ResourceKey, u64)>,
    {
        for (key, quantity) in entries {
            self.set(key, quantity)?;
        }
        Ok(())
    }

    /// Drop all persisted stock and return to the defaults
    pub fn reset(&mut self) -> Result<()> {
        self.backend.clear()?;
        self.inventory = self.defaults.clone();
        debug!("stock reset");
        Ok(())
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_reads_as_zero() {
        let inventory = Inventory::new();
        assert_eq!(inventory.get(&ResourceKey::Coal), 0);
        assert_eq!(inventory.lookup(&ResourceKey::Coal), None);
    }

    #[test]
    fn defaults_cover_original_stock_record() {
        let inventory = Inventory::with_defaults(&RecipeGraph::reference());
        // coal + 6 ores + 5 ingots that feed a later tier
        assert_eq!(inventory.len(), 12);
        assert_eq!(
            inventory.lookup(&ResourceKey::Product("adamantiumIngot".to_string())),
            Some(0)
        );
        assert_eq!(
            inventory.lookup(&ResourceKey::Product("dragonGlassIngot".to_string())),
            None
        );
    }

    #[test]
    fn quantity_parsing_matches_form_input() {
        assert_eq!(parse_quantity("150"), 150);
        assert_eq!(parse_quantity("  42 "), 42);
        assert_eq!(parse_quantity("12abc"), 12);
        assert_eq!(parse_quantity("+7"), 7);
        assert_eq!(parse_quantity("3.9"), 3);
        assert_eq!(parse_quantity("-5"), 0);
        assert_eq!(parse_quantity("-0"), 0);
        assert_eq!(parse_quantity(""), 0);
        assert_eq!(parse_quantity("abc"), 0);
        assert_eq!(parse_quantity("NaN"), 0);
        assert_eq!(parse_quantity("99999999999999999999999"), u64::MAX);
    }

    #[test]
    fn assignments() {
        assert_eq!(parse_assignment("coal=300"), Some(("coal", 300)));
        assert_eq!(parse_assignment(" ironOre = -3"), Some(("ironOre", 0)));
        assert_eq!(parse_assignment("=3"), None);
        assert_eq!(parse_assignment("coal"), None);
    }

    #[test]
    fn store_saves_on_every_write() {
        let graph = RecipeGraph::reference();
        let mut store = InventoryStore::open(MemoryStock::default(), &graph).unwrap();

        store.set(ResourceKey::Coal, 500).unwrap();
        store
            .set_many([
                (ResourceKey::Ore(OreKind::CopperOre), 150),
                (ResourceKey::Product("copperIngot".to_string()), 4),
            ])
            .unwrap();

        assert_eq!(store.backend().saves, 3);
        assert_eq!(store.backend().entries.get("coal"), Some(&500));
        assert_eq!(store.backend().entries.get("copperIngot"), Some(&4));
        assert_eq!(store.quantity(&ResourceKey::Ore(OreKind::CopperOre)), 150);
    }

    #[test]
    fn open_restores_persisted_entries() {
        let graph = RecipeGraph::reference();
        let mut backend = MemoryStock::default();
        backend.entries.insert("goldOre".to_string(), 1000);
        backend.entries.insert("coal".to_string(), -40);
        backend.entries.insert("unobtainium".to_string(), 9);

        let store = InventoryStore::open(backend, &graph).unwrap();
        assert_eq!(store.quantity(&ResourceKey::Ore(OreKind::GoldOre)), 1000);
        assert_eq!(store.get().lookup(&ResourceKey::Coal), Some(0));
        assert_eq!(store.get().len(), 12);
    }

    #[test]
    fn reset_clears_backend() {
        let graph = RecipeGraph::reference();
        let mut store = InventoryStore::open(MemoryStock::default(), &graph).unwrap();
        store.set(ResourceKey::Coal, 10).unwrap();
        store.reset().unwrap();

        assert!(store.backend().entries.is_empty());
        assert_eq!(store.quantity(&ResourceKey::Coal), 0);
        assert_eq!(store.get(), &Inventory::with_defaults(&graph));
    }

    #[test]
    fn sqlite_backend_persists_across_stores() {
        let conn = Connection::open_in_memory().unwrap();
        db::init_schema(&conn).unwrap();
        let graph = RecipeGraph::reference();

        let mut store = InventoryStore::open(SqliteStock::new(&conn), &graph).unwrap();
        store.set(ResourceKey::Ore(OreKind::IronOre), 3000).unwrap();
        store.set(ResourceKey::Ore(OreKind::IronOre), 2500).unwrap();
        drop(store);

        let store = InventoryStore::open(SqliteStock::new(&conn), &graph).unwrap();
        assert_eq!(store.quantity(&ResourceKey::Ore(OreKind::IronOre)), 2500);
    }

    #[test]
    fn oversized_quantity_is_clamped_consistently() {
        let conn = Connection::open_in_memory().unwrap();
        db::init_schema(&conn).unwrap();
        let graph = RecipeGraph::reference();
        let coal = ResourceKey::Coal;

        let mut store = InventoryStore::open(SqliteStock::new(&conn), &graph).unwrap();
        store
            .set(coal.clone(), parse_quantity("99999999999999999999999"))
            .unwrap();
        assert_eq!(store.quantity(&coal), MAX_QUANTITY);
        drop(store);

        let store = InventoryStore::open(SqliteStock::new(&conn), &graph).unwrap();
        assert_eq!(store.quantity(&coal), MAX_QUANTITY);

        let mut memory = InventoryStore::open(MemoryStock::default(), &graph).unwrap();
        memory.set(coal.clone(), u64::MAX).unwrap();
        assert_eq!(memory.quantity(&coal), MAX_QUANTITY);
        assert_eq!(memory.backend().entries["coal"], i64::MAX);
    }
}
