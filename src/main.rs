//! TerraX command line
//!
//! Forge calculator and marketplace registry for TerraX.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use rusqlite::Connection;
use tracing_subscriber::EnvFilter;

use terrax::inventory::{parse_assignment, InventoryStore, SqliteStock, StockBackend};
use terrax::market::{self, Session};
use terrax::models::{MarketItemTemplate, ResourceKey, UserRole};
use terrax::{db, yield_table, RecipeGraph};

#[derive(Parser)]
#[command(name = "terrax")]
#[command(about = "Forge calculator and marketplace registry for TerraX")]
struct Cli {
    /// Path to the SQLite database
    #[arg(short, long, env = "TERRAX_DB", default_value = "terrax.db")]
    database: PathBuf,

    /// Recipe table to use instead of the built-in smelting chain (TOML)
    #[arg(long, env = "TERRAX_RECIPES")]
    recipes: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Credentials for role-gated commands
#[derive(Args)]
struct Credentials {
    /// Role to log in as (admin or pro)
    #[arg(long)]
    role: UserRole,

    /// Authorized key for the role
    #[arg(long)]
    key: String,

    /// Trader name shown on pro listings
    #[arg(long)]
    name: Option<String>,
}

impl Credentials {
    fn login(&self, conn: &Connection) -> Result<Session> {
        market::login(conn, self.role, &self.key, self.name.as_deref())
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize empty database with schema
    Init,

    /// Show or edit the personal stockpile
    Stock {
        #[command(subcommand)]
        action: StockCommand,
    },

    /// Calculate possible yield for every recipe, or one recipe
    Calc {
        /// Recipe id (e.g. "ironIngot")
        recipe: Option<String>,
    },

    /// List the recipe table
    Recipes,

    /// Check a key and show the resulting session
    Login(Credentials),

    /// Marketplace item registry
    Templates {
        #[command(subcommand)]
        action: TemplateCommand,
    },

    /// Marketplace ads
    Listings {
        #[command(subcommand)]
        action: ListingCommand,
    },

    /// Authorized login keys
    Keys {
        #[command(subcommand)]
        action: KeyCommand,
    },

    /// Custom recipe artwork
    Skins {
        #[command(subcommand)]
        action: SkinCommand,
    },

    /// Load sample registry, keys and listings for testing
    LoadSample,
}

#[derive(Subcommand)]
enum StockCommand {
    /// Print every tracked quantity
    Show,
    /// Set quantities, e.g. `coal=3000 ironOre=900 copperIngot=5`
    Set {
        #[arg(required = true)]
        assignments: Vec<String>,
    },
    /// Zero the stockpile
    Reset,
}

#[derive(Subcommand)]
enum TemplateCommand {
    List,
    /// Case-insensitive name search
    Search { query: String },
    Add {
        #[command(flatten)]
        auth: Credentials,
        /// Item name shown in the registry
        #[arg(value_name = "NAME")]
        item: String,
        /// Icon URL or data URL
        icon: String,
    },
    Remove {
        #[command(flatten)]
        auth: Credentials,
        id: i64,
    },
}

#[derive(Subcommand)]
enum ListingCommand {
    List,
    Post {
        #[command(flatten)]
        auth: Credentials,
        template_id: i64,
        price: String,
        #[arg(default_value = "")]
        description: String,
    },
    Remove {
        #[command(flatten)]
        auth: Credentials,
        id: i64,
    },
}

#[derive(Subcommand)]
enum KeyCommand {
    List,
    Add {
        role: UserRole,
        key: String,
        #[arg(long, default_value = "")]
        display_name: String,
        #[arg(long, default_value = "")]
        avatar: String,
    },
    Remove { id: i64 },
}

#[derive(Subcommand)]
enum SkinCommand {
    /// Artwork for every recipe, or only the custom overrides
    List {
        #[arg(long)]
        custom: bool,
    },
    Set {
        #[command(flatten)]
        auth: Credentials,
        recipe: String,
        image: String,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_graph(path: Option<&Path>) -> Result<RecipeGraph> {
    match path {
        Some(path) => RecipeGraph::from_toml_file(path)
            .with_context(|| format!("Failed to load recipes from {}", path.display())),
        None => Ok(RecipeGraph::reference()),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let graph = load_graph(cli.recipes.as_deref())?;
    let conn = Connection::open(&cli.database)
        .with_context(|| format!("Failed to open {}", cli.database.display()))?;
    db::init_schema(&conn)?;

    match cli.command {
        Commands::Init => {
            println!("Database initialized at: {}", cli.database.display());
        }

        Commands::Stock { action } => {
            let mut store = InventoryStore::open(SqliteStock::new(&conn), &graph)?;
            match action {
                StockCommand::Show => {}
                StockCommand::Set { assignments } => {
                    let mut updates = Vec::with_capacity(assignments.len());
                    for assignment in &assignments {
                        let Some((key, quantity)) = parse_assignment(assignment) else {
                            bail!("Expected key=quantity, got '{}'", assignment);
                        };
                        let Some(resource) = graph.resolve_key(key) else {
                            bail!("Unknown resource '{}'", key);
                        };
                        updates.push((resource, quantity));
                    }
                    store.set_many(updates)?;
                }
                StockCommand::Reset => store.reset()?,
            }
            print_stock(&store, &graph);
        }

        Commands::Calc { recipe } => {
            let store = InventoryStore::open(SqliteStock::new(&conn), &graph)?;
            let table = yield_table(&graph, store.get());
            match recipe {
                Some(id) => match table.row(&id) {
                    Some(row) => {
                        println!("{}: {} possible", row.name, row.max_units);
                        println!("  Coal used: {}", row.coal_used);
                        println!("  Ore used:  {}", row.ore_used);
                        if row.prerequisite_used > 0 {
                            println!("  Ingots used: {}", row.prerequisite_used);
                        }
                        println!("  Crafting time: {} min", row.total_minutes);
                        if let Some(binding) = row.binding {
                            println!("  Limited by: {}", binding);
                        }
                    }
                    None => println!("Recipe '{}' not found", id),
                },
                None => println!("{}", table),
            }
        }

        Commands::Recipes => {
            println!(
                "{:<20} {:<22} {:>6} {:>6} {:<17} {:<22} {:>6}",
                "Id", "Name", "Coal", "Ore", "Ore type", "Requires", "Min"
            );
            println!("{}", "-".repeat(105));
            for recipe in graph.iter() {
                let req = &recipe.requirements;
                let requires = match (&req.previous_ingot, graph.prerequisite_key(recipe)) {
                    (Some(prev), Some(key)) => format!("{}x {}", prev.amount, key),
                    _ => "-".to_string(),
                };
                println!(
                    "{:<20} {:<22} {:>6} {:>6} {:<17} {:<22} {:>6}",
                    recipe.id,
                    recipe.name,
                    req.coal,
                    req.ore,
                    req.ore_type,
                    requires,
                    req.crafting_time_minutes
                );
            }
        }

        Commands::Login(auth) => {
            let session = auth.login(&conn)?;
            println!("Logged in as {} ({})", session.display_name(), session.role());
        }

        Commands::Templates { action } => match action {
            TemplateCommand::List => print_templates(&db::list_templates(&conn)?),
            TemplateCommand::Search { query } => {
                let found = market::search_templates(&conn, &query)?;
                if found.is_empty() {
                    println!("No matches in global registry...");
                } else {
                    print_templates(&found);
                }
            }
            TemplateCommand::Add { auth, item, icon } => {
                let session = auth.login(&conn)?;
                let template = market::add_template(&conn, &session, &item, &icon)?;
                println!("Registered '{}' with id {}", template.name, template.id);
            }
            TemplateCommand::Remove { auth, id } => {
                let session = auth.login(&conn)?;
                market::delete_template(&conn, &session, id)?;
                println!("Removed registry item {}", id);
            }
        },

        Commands::Listings { action } => match action {
            ListingCommand::List => {
                let listings = db::list_listings(&conn)?;
                if listings.is_empty() {
                    println!("No listings yet.");
                }
                for l in listings {
                    let badge = if l.is_pro { " [PRO]" } else { "" };
                    println!("#{} {} - {} (by {}{})", l.id, l.name, l.price, l.seller, badge);
                    if !l.description.is_empty() {
                        println!("    {}", l.description);
                    }
                }
            }
            ListingCommand::Post {
                auth,
                template_id,
                price,
                description,
            } => {
                let session = auth.login(&conn)?;
                let listing =
                    market::post_listing(&conn, &session, template_id, &price, &description)?;
                println!("Posted listing #{} for {}", listing.id, listing.name);
            }
            ListingCommand::Remove { auth, id } => {
                let session = auth.login(&conn)?;
                market::delete_listing(&conn, &session, id)?;
                println!("Deleted listing #{}", id);
            }
        },

        Commands::Keys { action } => match action {
            KeyCommand::List => {
                println!("{:>4} {:<6} {:<20} {}", "Id", "Role", "Key", "Display name");
                for k in db::list_keys(&conn)? {
                    println!("{:>4} {:<6} {:<20} {}", k.id, k.role, k.key_value, k.display_name);
                }
            }
            KeyCommand::Add {
                role,
                key,
                display_name,
                avatar,
            } => {
                if role == UserRole::Guest {
                    bail!("Guest accounts do not use keys");
                }
                let id = db::insert_key(&conn, role, &key, &display_name, &avatar)?;
                println!("Added {} key with id {}", role, id);
            }
            KeyCommand::Remove { id } => {
                if db::delete_key(&conn, id)? {
                    println!("Removed key {}", id);
                } else {
                    println!("Key {} not found", id);
                }
            }
        },

        Commands::Skins { action } => match action {
            SkinCommand::List { custom: true } => {
                let skins = db::list_skins(&conn)?;
                if skins.is_empty() {
                    println!("No custom artwork set.");
                }
                for skin in skins {
                    println!("{:<20} {}", skin.recipe_id, skin.image);
                }
            }
            SkinCommand::List { custom: false } => {
                for recipe in graph.iter() {
                    println!("{:<20} {}", recipe.id, market::skin_for(&conn, recipe)?);
                }
            }
            SkinCommand::Set {
                auth,
                recipe,
                image,
            } => {
                let session = auth.login(&conn)?;
                market::set_skin(&conn, &session, &graph, &recipe, &image)?;
                println!("Updated artwork for {}", recipe);
            }
        },

        Commands::LoadSample => {
            load_sample_data(&conn)?;
            println!("Sample data loaded successfully!");
        }
    }

    Ok(())
}

fn print_stock<B: StockBackend>(store: &InventoryStore<B>, graph: &RecipeGraph) {
    println!("{:<20} {:>12}", "Resource", "Quantity");
    println!("{}", "-".repeat(33));
    for (key, quantity) in store.get().iter() {
        println!("{:<20} {:>12}", key, quantity);
    }
    let untracked: Vec<_> = graph
        .iter()
        .map(|r| ResourceKey::Product(r.id.clone()))
        .filter(|k| store.get().lookup(k).is_none())
        .collect();
    for key in untracked {
        println!("{:<20} {:>12}", key, "-");
    }
}

fn print_templates(templates: &[MarketItemTemplate]) {
    if templates.is_empty() {
        println!("Registry is empty. Run 'load-sample' or 'templates add' first.");
        return;
    }
    println!("{:>4} {:<30} {}", "Id", "Name", "Icon");
    for t in templates {
        println!("{:>4} {:<30} {}", t.id, t.name, t.icon_url);
    }
}

/// Load sample registry items, keys and listings for testing
fn load_sample_data(conn: &Connection) -> Result<()> {
    db::clear_market_data(conn)?;

    db::insert_key(conn, UserRole::Admin, "forge-root", "Root", "")?;
    db::insert_key(conn, UserRole::Pro, "forge-pro", "Sample Trader", "")?;

    let admin = market::login(conn, UserRole::Admin, "forge-root", None)?;
    let pro = market::login(conn, UserRole::Pro, "forge-pro", None)?;

    let samples = [
        ("Dragon Glass Blade", "https://example.invalid/icons/dragon-blade.png"),
        ("Adamantium Plate", "https://example.invalid/icons/adamantium-plate.png"),
        ("Gold Signet", "https://example.invalid/icons/gold-signet.png"),
        ("Iron Pickaxe", "https://example.invalid/icons/iron-pickaxe.png"),
    ];
    let mut templates = Vec::with_capacity(samples.len());
    for (name, icon) in samples {
        templates.push(market::add_template(conn, &admin, name, icon)?);
    }

    market::post_listing(conn, &admin, templates[3].id, "1200 coal", "Starter tool")?;
    market::post_listing(conn, &pro, templates[0].id, "15 gold ingots", "Freshly forged")?;

    println!(
        "Loaded {} sample registry items, 2 keys and 2 listings",
        templates.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Commands {
        let mut argv = vec!["terrax"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap().command
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn templates_add_keeps_item_name_apart_from_trader_name() {
        let cmd = parse(&[
            "templates",
            "add",
            "--role",
            "admin",
            "--key",
            "forge-root",
            "--name",
            "Root",
            "Iron Pickaxe",
            "https://example.invalid/pick.png",
        ]);
        let Commands::Templates {
            action: TemplateCommand::Add { auth, item, icon },
        } = cmd
        else {
            panic!("expected templates add");
        };
        assert_eq!(auth.role, UserRole::Admin);
        assert_eq!(auth.key, "forge-root");
        assert_eq!(auth.name.as_deref(), Some("Root"));
        assert_eq!(item, "Iron Pickaxe");
        assert_eq!(icon, "https://example.invalid/pick.png");
    }

    #[test]
    fn listings_post_defaults_description() {
        let cmd = parse(&[
            "listings", "post", "--role", "pro", "--key", "forge-pro", "--name", "Tess", "7",
            "15 gold",
        ]);
        let Commands::Listings {
            action:
                ListingCommand::Post {
                    auth,
                    template_id,
                    price,
                    description,
                },
        } = cmd
        else {
            panic!("expected listings post");
        };
        assert_eq!(auth.role, UserRole::Pro);
        assert_eq!(auth.name.as_deref(), Some("Tess"));
        assert_eq!(template_id, 7);
        assert_eq!(price, "15 gold");
        assert_eq!(description, "");
    }

    #[test]
    fn skins_set_and_list_flags() {
        let cmd = parse(&[
            "skins",
            "set",
            "--role",
            "admin",
            "--key",
            "forge-root",
            "goldIngot",
            "data:image/png;base64,AAAA",
        ]);
        let Commands::Skins {
            action: SkinCommand::Set {
                auth,
                recipe,
                image,
            },
        } = cmd
        else {
            panic!("expected skins set");
        };
        assert_eq!(auth.role, UserRole::Admin);
        assert_eq!(auth.name, None);
        assert_eq!(recipe, "goldIngot");
        assert_eq!(image, "data:image/png;base64,AAAA");

        assert!(matches!(
            parse(&["skins", "list", "--custom"]),
            Commands::Skins {
                action: SkinCommand::List { custom: true }
            }
        ));
        assert!(matches!(
            parse(&["skins", "list"]),
            Commands::Skins {
                action: SkinCommand::List { custom: false }
            }
        ));
    }

    #[test]
    fn role_gated_commands_require_credentials() {
        let argv = ["terrax", "listings", "post", "7", "15 gold"];
        assert!(Cli::try_parse_from(argv).is_err());
        let argv = ["terrax", "templates", "add", "--role", "root", "--key", "k", "a", "b"];
        assert!(Cli::try_parse_from(argv).is_err());
    }

    #[test]
    fn sample_data_reloads_cleanly() {
        let conn = Connection::open_in_memory().unwrap();
        db::init_schema(&conn).unwrap();
        load_sample_data(&conn).unwrap();
        load_sample_data(&conn).unwrap();

        assert_eq!(db::list_templates(&conn).unwrap().len(), 4);
        assert_eq!(db::list_listings(&conn).unwrap().len(), 2);
        assert_eq!(db::list_keys(&conn).unwrap().len(), 2);
    }
}
