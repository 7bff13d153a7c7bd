use anyhow::Result;
use clap::{Parser, Subcommand};
use footfall::config::Config;
use footfall::registry::{BanRegistry, ExclusionSource, SqliteBanRegistry, SqliteExclusionSource};
use footfall::storage::{SqliteVisitorStore, VisitorStore};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "footfall-admin")]
#[command(about = "Footfall tracking list management CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage banned IP addresses
    Ban {
        #[command(subcommand)]
        action: BanAction,
    },
    /// Manage excluded user-agent keywords
    ExcludeAgent {
        #[command(subcommand)]
        action: ListAction,
    },
    /// Manage excluded path prefixes
    ExcludePrefix {
        #[command(subcommand)]
        action: ListAction,
    },
}

#[derive(Subcommand)]
enum BanAction {
    /// Ban an IP address
    Add { ip_address: String },
    /// Lift a ban
    Remove { ip_address: String },
    /// List all banned IP addresses
    List,
}

#[derive(Subcommand)]
enum ListAction {
    /// Add an entry to the list
    Add { value: String },
    /// Remove an entry from the list
    Remove { value: String },
    /// List all entries
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let store =
        SqliteVisitorStore::new(&config.database.url, config.database.max_connections).await?;
    let pool = store.pool();

    // Ensure all tables exist before touching the lists
    store.init().await?;
    let bans = SqliteBanRegistry::new(Arc::clone(&pool));
    bans.init().await?;
    let exclusions = SqliteExclusionSource::new(pool);
    exclusions.init().await?;

    match cli.command {
        Commands::Ban { action } => match action {
            BanAction::Add { ip_address } => {
                bans.ban(&ip_address).await?;
                println!("✓ Banned '{}'", ip_address);
            }
            BanAction::Remove { ip_address } => {
                if bans.unban(&ip_address).await? {
                    println!("✓ Unbanned '{}'", ip_address);
                } else {
                    println!("⚠ '{}' was not banned", ip_address);
                }
            }
            BanAction::List => {
                let ips = bans.banned().await?;
                if ips.is_empty() {
                    println!("No banned IP addresses.");
                } else {
                    for ip in ips {
                        println!("{}", ip);
                    }
                }
            }
        },
        Commands::ExcludeAgent { action } => match action {
            ListAction::Add { value } => {
                exclusions.add_agent_keyword(&value).await?;
                println!("✓ Added user-agent keyword '{}'", value);
            }
            ListAction::Remove { value } => {
                if exclusions.remove_agent_keyword(&value).await? {
                    println!("✓ Removed user-agent keyword '{}'", value);
                } else {
                    println!("⚠ Keyword '{}' was not on the list", value);
                }
            }
            ListAction::List => {
                for keyword in exclusions.agent_keywords().await? {
                    println!("{}", keyword);
                }
            }
        },
        Commands::ExcludePrefix { action } => match action {
            ListAction::Add { value } => {
                exclusions.add_path_prefix(&value).await?;
                println!("✓ Added path prefix '{}'", value);
            }
            ListAction::Remove { value } => {
                if exclusions.remove_path_prefix(&value).await? {
                    println!("✓ Removed path prefix '{}'", value);
                } else {
                    println!("⚠ Prefix '{}' was not on the list", value);
                }
            }
            ListAction::List => {
                for prefix in exclusions.path_prefixes().await? {
                    println!("{}", prefix);
                }
            }
        },
    }

    Ok(())
}
