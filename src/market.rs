//! Marketplace, item registry and role checks

use anyhow::Result;
use rusqlite::Connection;
use thiserror::Error;
use tracing::{info, warn};

use crate::db;
use crate::models::{MarketItemTemplate, NewSaleItem, Recipe, SaleItem, UserRole};
use crate::recipes::RecipeGraph;

pub const ADMIN_SELLER: &str = "System Admin";
pub const DEFAULT_PRO_SELLER: &str = "Pro User";
pub const DEFAULT_PRO_NAME: &str = "Pro Traveler";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarketError {
    #[error("{role} accounts may not {action}")]
    Unauthorized { action: &'static str, role: UserRole },

    #[error("invalid {0} key")]
    InvalidKey(UserRole),

    #[error("guests do not log in")]
    GuestLogin,

    #[error("no registry item with id {0}")]
    TemplateNotFound(i64),

    #[error("no listing with id {0}")]
    ListingNotFound(i64),

    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("unknown recipe '{0}'")]
    UnknownRecipe(String),
}

/// Who is acting
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Session {
    role: UserRole,
    name: Option<String>,
    avatar: Option<String>,
}

impl Session {
    pub fn guest() -> Self {
        Self::default()
    }

    pub fn new(role: UserRole, name: Option<String>, avatar: Option<String>) -> Self {
        Self { role, name, avatar }
    }

    pub fn role(&self) -> UserRole {
        self.role
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Label shown in the header
    pub fn display_name(&self) -> &str {
        match self.role {
            UserRole::Guest => "Guest",
            UserRole::Admin => "ROOT",
            UserRole::Pro => self.name().unwrap_or(DEFAULT_PRO_NAME),
        }
    }

    /// Seller recorded on listings this session posts
    pub fn seller_name(&self) -> &str {
        match self.role {
            UserRole::Admin => ADMIN_SELLER,
            _ => self.name().unwrap_or(DEFAULT_PRO_SELLER),
        }
    }

    pub fn can_post(&self) -> bool {
        matches!(self.role, UserRole::Admin | UserRole::Pro)
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Admins may remove any ad, pros only their own.
    ///
    /// Ownership is matched on the seller display name only.
    pub fn can_delete(&self, listing: &SaleItem) -> bool {
        match self.role {
            UserRole::Admin => true,
            UserRole::Pro => self.name() == Some(listing.seller.as_str()),
            UserRole::Guest => false,
        }
    }

    fn require_admin(&self, action: &'static str) -> Result<(), MarketError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(MarketError::Unauthorized {
                action,
                role: self.role,
            })
        }
    }
}

fn non_empty(value: &str, field: &'static str) -> Result<String, MarketError> {
    let value = value.trim();
    if value.is_empty() {
        Err(MarketError::MissingField(field))
    } else {
        Ok(value.to_string())
    }
}

/// Verify a key against the authorized key table
pub fn login(conn: &Connection, role: UserRole, key: &str, name: Option<&str>) -> Result<Session> {
    if role == UserRole::Guest {
        return Err(MarketError::GuestLogin.into());
    }
    let key = non_empty(key, "key")?;

    let Some(record) = db::find_key(conn, role, &key)? else {
        warn!(%role, "login rejected");
        return Err(MarketError::InvalidKey(role).into());
    };

    let name = match role {
        UserRole::Pro => {
            let chosen = name
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .or_else(|| Some(record.display_name.trim()).filter(|n| !n.is_empty()))
                .unwrap_or(DEFAULT_PRO_NAME);
            Some(chosen.to_string())
        }
        _ => None,
    };
    let avatar = Some(record.avatar_url).filter(|a| !a.is_empty());

    let session = Session::new(role, name, avatar);
    info!(%role, name = session.display_name(), "logged in");
    Ok(session)
}

/// Post an ad for a registered item
pub fn post_listing(
    conn: &Connection,
    session: &Session,
    template_id: i64,
    price: &str,
    description: &str,
) -> Result<SaleItem> {
    if !session.can_post() {
        return Err(MarketError::Unauthorized {
            action: "post listings",
            role: session.role(),
        }
        .into());
    }
    let template =
        db::get_template(conn, template_id)?.ok_or(MarketError::TemplateNotFound(template_id))?;
    let price = non_empty(price, "price")?;

    let id = db::insert_listing(
        conn,
        &NewSaleItem {
            template_id: template.id,
            name: template.name,
            price,
            description: description.trim().to_string(),
            image_url: template.icon_url,
            seller: session.seller_name().to_string(),
            seller_avatar: session.avatar.clone(),
            is_pro: session.role() == UserRole::Pro,
        },
    )?;
    info!(id, template_id, seller = session.seller_name(), "listing posted");

    db::get_listing(conn, id)?.ok_or_else(|| MarketError::ListingNotFound(id).into())
}

pub fn delete_listing(conn: &Connection, session: &Session, id: i64) -> Result<()> {
    let listing = db::get_listing(conn, id)?.ok_or(MarketError::ListingNotFound(id))?;
    if !session.can_delete(&listing) {
        return Err(MarketError::Unauthorized {
            action: "delete this listing",
            role: session.role(),
        }
        .into());
    }
    db::delete_listing(conn, id)?;
    info!(id, "listing deleted");
    Ok(())
}

/// Register a new listable item
pub fn add_template(
    conn: &Connection,
    session: &Session,
    name: &str,
    icon_url: &str,
) -> Result<MarketItemTemplate> {
    session.require_admin("register items")?;
    let name = non_empty(name, "name")?;
    let icon_url = non_empty(icon_url, "icon")?;

    let id = db::insert_template(conn, &name, &icon_url)?;
    info!(id, name = %name, "registry item added");
    Ok(MarketItemTemplate { id, name, icon_url })
}

pub fn delete_template(conn: &Connection, session: &Session, id: i64) -> Result<()> {
    session.require_admin("remove registry items")?;
    if !db::delete_template(conn, id)? {
        return Err(MarketError::TemplateNotFound(id).into());
    }
    info!(id, "registry item removed");
    Ok(())
}

/// Case-insensitive name filter, keeps input order
pub fn filter_templates<'a>(
    templates: &'a [MarketItemTemplate],
    query: &str,
) -> Vec<&'a MarketItemTemplate> {
    let query = query.trim().to_lowercase();
    templates
        .iter()
        .filter(|t| t.name.to_lowercase().contains(&query))
        .collect()
}

pub fn search_templates(conn: &Connection, query: &str) -> Result<Vec<MarketItemTemplate>> {
    let templates = db::list_templates(conn)?;
    Ok(filter_templates(&templates, query)
        .into_iter()
        .cloned()
        .collect())
}

/// Replace a recipe's artwork
pub fn set_skin(
    conn: &Connection,
    session: &Session,
    graph: &RecipeGraph,
    recipe_id: &str,
    image: &str,
) -> Result<()> {
    session.require_admin("change recipe artwork")?;
    let recipe = graph
        .get(recipe_id)
        .ok_or_else(|| MarketError::UnknownRecipe(recipe_id.to_string()))?;
    let image = non_empty(image, "image")?;

    db::upsert_skin(conn, &recipe.id, &image)?;
    info!(recipe = %recipe.id, "skin updated");
    Ok(())
}

/// Custom artwork if one is set, otherwise the recipe's own image
pub fn skin_for(conn: &Connection, recipe: &Recipe) -> Result<String> {
    Ok(db::get_skin(conn, &recipe.id)?.unwrap_or_else(|| recipe.image.clone()))
}
