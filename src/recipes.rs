//! The recipe table: built-in smelting chain, TOML definitions and validation

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::models::{OreKind, Prerequisite, Recipe, RecipeIndex, Requirement, ResourceKey};

#[derive(Debug, Error)]
pub enum RecipeError {
    #[error("recipe id must not be empty")]
    EmptyId,

    #[error("duplicate recipe id '{0}'")]
    DuplicateId(String),

    #[error("recipe '{recipe}' requires unknown ingot '{missing}'")]
    UnknownPrerequisite { recipe: String, missing: String },

    #[error("recipe '{0}' requires its own output")]
    SelfReference(String),

    #[error("recipe chain contains a cycle through '{0}'")]
    Cycle(String),

    #[error("failed to parse recipe table: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Prerequisite as written in a recipe file, by recipe id
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PrerequisiteDef {
    #[serde(rename = "type")]
    pub recipe: String,
    pub amount: u64,
}

/// Unresolved recipe definition
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RecipeDef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub color: String,
    pub coal: u64,
    pub ore: u64,
    pub ore_type: OreKind,
    #[serde(default)]
    pub previous_ingot: Option<PrerequisiteDef>,
    #[serde(default)]
    pub crafting_time_minutes: u64,
}

#[derive(Debug, Deserialize)]
struct RecipeFile {
    #[serde(rename = "recipe", default)]
    recipes: Vec<RecipeDef>,
}

/// Immutable, validated table of recipes in declaration order.
///
/// Prerequisites are stored as indices into the table and are guaranteed to
/// exist and to form no cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeGraph {
    recipes: Vec<Recipe>,
    index: HashMap<String, RecipeIndex>,
}

impl RecipeGraph {
    /// The six-tier smelting chain shipped with the game
    pub fn reference() -> Self {
        Self::from_defs(reference_defs()).expect("built-in recipe table is valid")
    }

    pub fn from_toml_str(source: &str) -> Result<Self, RecipeError> {
        let file: RecipeFile = toml::from_str(source)?;
        Self::from_defs(file.recipes)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, RecipeError> {
        let source = fs::read_to_string(path).map_err(|source| RecipeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let graph = Self::from_toml_str(&source)?;
        info!(path = %path.display(), recipes = graph.len(), "loaded recipe table");
        Ok(graph)
    }

    /// Resolve prerequisite ids to indices and reject malformed chains
    pub fn from_defs(defs: Vec<RecipeDef>) -> Result<Self, RecipeError> {
        let mut index = HashMap::with_capacity(defs.len());
        for (i, def) in defs.iter().enumerate() {
            if def.id.trim().is_empty() {
                return Err(RecipeError::EmptyId);
            }
            if index.insert(def.id.clone(), RecipeIndex(i)).is_some() {
                return Err(RecipeError::DuplicateId(def.id.clone()));
            }
        }

        let mut recipes = Vec::with_capacity(defs.len());
        for def in defs {
            let previous_ingot = match def.previous_ingot {
                Some(prev) => {
                    if prev.recipe == def.id {
                        return Err(RecipeError::SelfReference(def.id));
                    }
                    let recipe = *index.get(&prev.recipe).ok_or_else(|| {
                        RecipeError::UnknownPrerequisite {
                            recipe: def.id.clone(),
                            missing: prev.recipe.clone(),
                        }
                    })?;
                    Some(Prerequisite {
                        recipe,
                        amount: prev.amount,
                    })
                }
                None => None,
            };

            recipes.push(Recipe {
                id: def.id,
                name: def.name,
                image: def.image,
                color: def.color,
                requirements: Requirement {
                    coal: def.coal,
                    ore: def.ore,
                    ore_type: def.ore_type,
                    previous_ingot,
                    crafting_time_minutes: def.crafting_time_minutes,
                },
            });
        }

        check_acyclic(&recipes)?;
        debug!(recipes = recipes.len(), "recipe table validated");

        Ok(Self { recipes, index })
    }

    /// Look up a recipe by id. `None` is the not-found signal; lookups never fail.
    pub fn get(&self, id: &str) -> Option<&Recipe> {
        self.index.get(id).and_then(|&i| self.recipe(i))
    }

    pub fn position(&self, id: &str) -> Option<RecipeIndex> {
        self.index.get(id).copied()
    }

    pub fn recipe(&self, index: RecipeIndex) -> Option<&Recipe> {
        self.recipes.get(index.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Recipe> {
        self.recipes.iter()
    }

    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }

    /// Inventory key holding the output of the prerequisite, if the recipe has one
    pub fn prerequisite_key(&self, recipe: &Recipe) -> Option<ResourceKey> {
        let prev = recipe.requirements.previous_ingot.as_ref()?;
        self.recipe(prev.recipe)
            .map(|r| ResourceKey::Product(r.id.clone()))
    }

    /// Products that some recipe consumes, in table order
    pub fn product_keys(&self) -> Vec<ResourceKey> {
        self.recipes
            .iter()
            .enumerate()
            .filter(|(i, _)| {
                self.recipes.iter().any(|r| {
                    r.requirements
                        .previous_ingot
                        .as_ref()
                        .is_some_and(|p| p.recipe == RecipeIndex(*i))
                })
            })
            .map(|(_, r)| ResourceKey::Product(r.id.clone()))
            .collect()
    }

    /// Parse a stock key: "coal", an ore key, or the id of a recipe in this table
    pub fn resolve_key(&self, key: &str) -> Option<ResourceKey> {
        let key = key.trim();
        if key == ResourceKey::COAL_KEY {
            return Some(ResourceKey::Coal);
        }
        if let Some(ore) = OreKind::from_storage_key(key) {
            return Some(ResourceKey::Ore(ore));
        }
        self.get(key).map(|r| ResourceKey::Product(r.id.clone()))
    }
}

/// Each recipe has at most one prerequisite, so any walk longer than the
/// table itself must revisit a recipe.
fn check_acyclic(recipes: &[Recipe]) -> Result<(), RecipeError> {
    for start in recipes {
        let mut current = start;
        let mut steps = 0;
        while let Some(prev) = &current.requirements.previous_ingot {
            steps += 1;
            if steps > recipes.len() {
                return Err(RecipeError::Cycle(start.id.clone()));
            }
            current = &recipes[prev.recipe.0];
        }
    }
    Ok(())
}

fn reference_def(
    id: &str,
    name: &str,
    image: &str,
    color: &str,
    (coal, ore, ore_type): (u64, u64, OreKind),
    previous_ingot: Option<(&str, u64)>,
    crafting_time_minutes: u64,
) -> RecipeDef {
    RecipeDef {
        id: id.to_string(),
        name: name.to_string(),
        image: image.to_string(),
        color: color.to_string(),
        coal,
        ore,
        ore_type,
        previous_ingot: previous_ingot.map(|(recipe, amount)| PrerequisiteDef {
            recipe: recipe.to_string(),
            amount,
        }),
        crafting_time_minutes,
    }
}

/// Definitions behind `RecipeGraph::reference`
pub fn reference_defs() -> Vec<RecipeDef> {
    vec![
        reference_def(
            "copperIngot",
            "Copper Ingot",
            "https://images.unsplash.com/photo-1590502160462-0994f3162799?w=400&auto=format&fit=crop&q=60",
            "text-orange-400",
            (200, 150, OreKind::CopperOre),
            None,
            6,
        ),
        reference_def(
            "ironIngot",
            "Iron Ingot",
            "https://images.unsplash.com/photo-1558500224-8147d3d2fc49?w=400&auto=format&fit=crop&q=60",
            "text-slate-300",
            (300, 300, OreKind::IronOre),
            Some(("copperIngot", 2)),
            12,
        ),
        reference_def(
            "silverIngot",
            "Silver Ingot",
            "https://images.unsplash.com/photo-1582266255765-fa5cf1a1d501?w=400&auto=format&fit=crop&q=60",
            "text-zinc-400",
            (600, 400, OreKind::SilverOre),
            Some(("ironIngot", 4)),
            30,
        ),
        reference_def(
            "goldIngot",
            "Gold Ingot",
            "https://images.unsplash.com/photo-1610375461246-83df859d849d?w=400&auto=format&fit=crop&q=60",
            "text-yellow-400",
            (1200, 1000, OreKind::GoldOre),
            Some(("silverIngot", 4)),
            60,
        ),
        reference_def(
            "adamantiumIngot",
            "Adamantium Ingot",
            "https://images.unsplash.com/photo-1627163439134-7a8c47e08238?w=400&auto=format&fit=crop&q=60",
            "text-cyan-400",
            (2400, 1500, OreKind::AdamantiumOre),
            Some(("goldIngot", 6)),
            120,
        ),
        reference_def(
            "dragonGlassIngot",
            "Dragon Glass Ingot",
            "https://images.unsplash.com/photo-1551009175-8a68da93d5f9?w=400&auto=format&fit=crop&q=60",
            "text-purple-500",
            (4800, 2000, OreKind::DragonGlassOre),
            Some(("adamantiumIngot", 7)),
            240,
        ),
    ]
}
