//! Data models for ores, recipes and marketplace records

use std::fmt;
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown ore kind '{0}'")]
pub struct UnknownOre(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown role '{0}' (expected guest, admin or pro)")]
pub struct UnknownRole(pub String);

/// Raw ores. Every recipe consumes exactly one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum OreKind {
    CopperOre,
    IronOre,
    SilverOre,
    GoldOre,
    AdamantiumOre,
    DragonGlassOre,
}

impl OreKind {
    pub const ALL: [OreKind; 6] = [
        OreKind::CopperOre,
        OreKind::IronOre,
        OreKind::SilverOre,
        OreKind::GoldOre,
        OreKind::AdamantiumOre,
        OreKind::DragonGlassOre,
    ];

    pub fn display_name(self) -> &'static str {
        match self {
            OreKind::CopperOre => "Copper Ore",
            OreKind::IronOre => "Iron Ore",
            OreKind::SilverOre => "Silver Ore",
            OreKind::GoldOre => "Gold Ore",
            OreKind::AdamantiumOre => "Adamantium Ore",
            OreKind::DragonGlassOre => "Dragon Glass Ore",
        }
    }

    /// Key used for this ore in the persisted stock record
    pub fn storage_key(self) -> &'static str {
        match self {
            OreKind::CopperOre => "copperOre",
            OreKind::IronOre => "ironOre",
            OreKind::SilverOre => "silverOre",
            OreKind::GoldOre => "goldOre",
            OreKind::AdamantiumOre => "adamantiumOre",
            OreKind::DragonGlassOre => "dragonGlassOre",
        }
    }

    pub fn from_storage_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|ore| ore.storage_key() == key)
    }
}

impl FromStr for OreKind {
    type Err = UnknownOre;

    /// Accepts either the display name ("Iron Ore") or the storage key ("ironOre").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|ore| ore.display_name().eq_ignore_ascii_case(s) || ore.storage_key() == s)
            .ok_or_else(|| UnknownOre(s.to_string()))
    }
}

impl TryFrom<String> for OreKind {
    type Error = UnknownOre;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for OreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.display_name())
    }
}

/// A kind of resource tracked in the inventory
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceKey {
    /// The shared fuel every recipe burns
    Coal,
    Ore(OreKind),
    /// Output of the recipe with this id
    Product(String),
}

impl ResourceKey {
    pub const COAL_KEY: &'static str = "coal";

    pub fn storage_key(&self) -> &str {
        match self {
            ResourceKey::Coal => Self::COAL_KEY,
            ResourceKey::Ore(ore) => ore.storage_key(),
            ResourceKey::Product(id) => id,
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.storage_key())
    }
}

/// Typed reference to a recipe by its position in a `RecipeGraph`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecipeIndex(pub usize);

/// An intermediate product consumed per unit produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prerequisite {
    pub recipe: RecipeIndex,
    pub amount: u64,
}

/// Per-unit inputs of a recipe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub coal: u64,
    pub ore: u64,
    pub ore_type: OreKind,
    pub previous_ingot: Option<Prerequisite>,
    pub crafting_time_minutes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipe {
    pub id: String,
    pub name: String,
    pub image: String,
    pub color: String,
    pub requirements: Requirement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UserRole {
    #[default]
    Guest,
    Admin,
    Pro,
}

impl UserRole {
    pub fn as_str(self) -> &'static str {
        match self {
            UserRole::Guest => "guest",
            UserRole::Admin => "admin",
            UserRole::Pro => "pro",
        }
    }
}

impl FromStr for UserRole {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "guest" => Ok(UserRole::Guest),
            "admin" => Ok(UserRole::Admin),
            "pro" => Ok(UserRole::Pro),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl ToSql for UserRole {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for UserRole {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: UnknownRole| FromSqlError::Other(Box::new(e)))
    }
}

/// An item admins have registered as listable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketItemTemplate {
    pub id: i64,
    pub name: String,
    pub icon_url: String,
}

/// A marketplace ad
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleItem {
    pub id: i64,
    pub template_id: i64,
    pub name: String,
    pub price: String,
    pub description: String,
    pub image_url: String,
    pub seller: String,
    pub seller_avatar: Option<String>,
    pub is_pro: bool,
    pub created_at: String,
}

/// Listing fields before the store assigns an id and timestamp
#[derive(Debug, Clone)]
pub struct NewSaleItem {
    pub template_id: i64,
    pub name: String,
    pub price: String,
    pub description: String,
    pub image_url: String,
    pub seller: String,
    pub seller_avatar: Option<String>,
    pub is_pro: bool,
}

/// A login credential for a privileged role
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizedKey {
    pub id: i64,
    pub role: UserRole,
    pub key_value: String,
    pub display_name: String,
    pub avatar_url: String,
}

/// Custom artwork overriding a recipe's default image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skin {
    pub recipe_id: String,
    pub image: String,
}
