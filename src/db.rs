//! Database schema and operations

use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row};

use crate::models::{AuthorizedKey, MarketItemTemplate, NewSaleItem, SaleItem, Skin, UserRole};

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Personal resource stockpile, one row per resource key
        CREATE TABLE IF NOT EXISTS stock (
            key TEXT PRIMARY KEY,
            quantity INTEGER NOT NULL
        );

        -- Items admins allow to be listed
        CREATE TABLE IF NOT EXISTS market_templates (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            icon_url TEXT NOT NULL
        );

        -- Marketplace ads
        CREATE TABLE IF NOT EXISTS sale_listings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            template_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            price TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            image_url TEXT NOT NULL DEFAULT '',
            seller TEXT NOT NULL,
            seller_avatar TEXT,
            is_pro INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        );

        -- Login keys for admin and pro roles
        CREATE TABLE IF NOT EXISTS authorized_keys (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            role TEXT NOT NULL,
            key_value TEXT NOT NULL,
            display_name TEXT NOT NULL DEFAULT '',
            avatar_url TEXT NOT NULL DEFAULT ''
        );

        -- Custom recipe artwork
        CREATE TABLE IF NOT EXISTS skins (
            recipe_id TEXT PRIMARY KEY,
            image TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_sale_listings_created ON sale_listings(created_at);
        CREATE INDEX IF NOT EXISTS idx_authorized_keys_lookup ON authorized_keys(role, key_value);
        "#,
    )?;
    Ok(())
}

/// All persisted stock entries
pub fn load_stock(conn: &Connection) -> Result<Vec<(String, i64)>> {
    let mut stmt = conn.prepare("SELECT key, quantity FROM stock ORDER BY key")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

/// Insert or replace one stock entry
pub fn save_stock_entry(conn: &Connection, key: &str, quantity: u64) -> Result<()> {
    let quantity = i64::try_from(quantity).unwrap_or(i64::MAX);
    conn.execute(
        "INSERT OR REPLACE INTO stock (key, quantity) VALUES (?1, ?2)",
        (key, quantity),
    )?;
    Ok(())
}

pub fn clear_stock(conn: &Connection) -> Result<()> {
    conn.execute("DELETE FROM stock", [])?;
    Ok(())
}

fn template_from_row(row: &Row<'_>) -> rusqlite::Result<MarketItemTemplate> {
    Ok(MarketItemTemplate {
        id: row.get(0)?,
        name: row.get(1)?,
        icon_url: row.get(2)?,
    })
}

/// Insert a template, returning its id
pub fn insert_template(conn: &Connection, name: &str, icon_url: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO market_templates (name, icon_url) VALUES (?1, ?2)",
        (name, icon_url),
    )?;
    Ok(conn.last_insert_rowid())
}

/// List all templates ordered by name
pub fn list_templates(conn: &Connection) -> Result<Vec<MarketItemTemplate>> {
    let mut stmt =
        conn.prepare("SELECT id, name, icon_url FROM market_templates ORDER BY name, id")?;
    let rows = stmt.query_map([], template_from_row)?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

pub fn get_template(conn: &Connection, id: i64) -> Result<Option<MarketItemTemplate>> {
    Ok(conn
        .query_row(
            "SELECT id, name, icon_url FROM market_templates WHERE id = ?1",
            [id],
            template_from_row,
        )
        .optional()?)
}

/// Delete a template; returns whether a row was removed
pub fn delete_template(conn: &Connection, id: i64) -> Result<bool> {
    Ok(conn.execute("DELETE FROM market_templates WHERE id = ?1", [id])? > 0)
}

const LISTING_COLUMNS: &str = "id, template_id, name, price, description, image_url, \
                               seller, seller_avatar, is_pro, created_at";

fn listing_from_row(row: &Row<'_>) -> rusqlite::Result<SaleItem> {
    Ok(SaleItem {
        id: row.get(0)?,
        template_id: row.get(1)?,
        name: row.get(2)?,
        price: row.get(3)?,
        description: row.get(4)?,
        image_url: row.get(5)?,
        seller: row.get(6)?,
        seller_avatar: row.get(7)?,
        is_pro: row.get(8)?,
        created_at: row.get(9)?,
    })
}

/// Insert a listing, returning its id
pub fn insert_listing(conn: &Connection, listing: &NewSaleItem) -> Result<i64> {
    conn.execute(
        "INSERT INTO sale_listings (template_id, name, price, description, image_url, seller, seller_avatar, is_pro)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        (
            listing.template_id,
            &listing.name,
            &listing.price,
            &listing.description,
            &listing.image_url,
            &listing.seller,
            &listing.seller_avatar,
            listing.is_pro,
        ),
    )?;
    Ok(conn.last_insert_rowid())
}

/// List all listings, newest first
pub fn list_listings(conn: &Connection) -> Result<Vec<SaleItem>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {LISTING_COLUMNS} FROM sale_listings ORDER BY created_at DESC, id DESC"
    ))?;
    let rows = stmt.query_map([], listing_from_row)?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

pub fn get_listing(conn: &Connection, id: i64) -> Result<Option<SaleItem>> {
    Ok(conn
        .query_row(
            &format!("SELECT {LISTING_COLUMNS} FROM sale_listings WHERE id = ?1"),
            [id],
            listing_from_row,
        )
        .optional()?)
}

/// Delete a listing; returns whether a row was removed
pub fn delete_listing(conn: &Connection, id: i64) -> Result<bool> {
    Ok(conn.execute("DELETE FROM sale_listings WHERE id = ?1", [id])? > 0)
}

fn key_from_row(row: &Row<'_>) -> rusqlite::Result<AuthorizedKey> {
    Ok(AuthorizedKey {
        id: row.get(0)?,
        role: row.get(1)?,
        key_value: row.get(2)?,
        display_name: row.get(3)?,
        avatar_url: row.get(4)?,
    })
}

/// Insert an authorized key, returning its id
pub fn insert_key(
    conn: &Connection,
    role: UserRole,
    key_value: &str,
    display_name: &str,
    avatar_url: &str,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO authorized_keys (role, key_value, display_name, avatar_url)
         VALUES (?1, ?2, ?3, ?4)",
        (role, key_value, display_name, avatar_url),
    )?;
    Ok(conn.last_insert_rowid())
}

/// Find the key matching both role and value
pub fn find_key(
    conn: &Connection,
    role: UserRole,
    key_value: &str,
) -> Result<Option<AuthorizedKey>> {
    Ok(conn
        .query_row(
            "SELECT id, role, key_value, display_name, avatar_url
             FROM authorized_keys
             WHERE role = ?1 AND key_value = ?2
             ORDER BY id LIMIT 1",
            (role, key_value),
            key_from_row,
        )
        .optional()?)
}

pub fn list_keys(conn: &Connection) -> Result<Vec<AuthorizedKey>> {
    let mut stmt = conn.prepare(
        "SELECT id, role, key_value, display_name, avatar_url
         FROM authorized_keys ORDER BY role, id",
    )?;
    let rows = stmt.query_map([], key_from_row)?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

pub fn delete_key(conn: &Connection, id: i64) -> Result<bool> {
    Ok(conn.execute("DELETE FROM authorized_keys WHERE id = ?1", [id])? > 0)
}

/// Insert or replace the skin for a recipe
pub fn upsert_skin(conn: &Connection, recipe_id: &str, image: &str) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO skins (recipe_id, image) VALUES (?1, ?2)",
        (recipe_id, image),
    )?;
    Ok(())
}

pub fn get_skin(conn: &Connection, recipe_id: &str) -> Result<Option<String>> {
    Ok(conn
        .query_row(
            "SELECT image FROM skins WHERE recipe_id = ?1",
            [recipe_id],
            |row| row.get(0),
        )
        .optional()?)
}

pub fn list_skins(conn: &Connection) -> Result<Vec<Skin>> {
    let mut stmt = conn.prepare("SELECT recipe_id, image FROM skins ORDER BY recipe_id")?;
    let rows = stmt.query_map([], |row| {
        Ok(Skin {
            recipe_id: row.get(0)?,
            image: row.get(1)?,
        })
    })?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

/// Clear marketplace and registry data (stock and skins are kept)
pub fn clear_market_data(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        DELETE FROM sale_listings;
        DELETE FROM market_templates;
        DELETE FROM authorized_keys;
        "#,
    )?;
    Ok(())
}
