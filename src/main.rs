mod config;
mod database;
mod service;
mod wgconf;
mod wgctl;

use clap::{Parser, Subcommand};

use config::Config;
use database::Database;
use service::{AddOutcome, PeerManager};
use wgctl::WgCli;

#[derive(Debug, Parser)]
#[clap(about = "Wireguard peer management CLI")]
struct Cli {
    /// Path to the JSON configuration file.
    #[clap(
        long,
        short,
        env = "WGMAN_CONFIG",
        default_value = "config.json",
        value_parser
    )]
    config: String,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Add peer by name if not exists
    Add {
        #[clap(value_parser)]
        name: String,
    },
    /// Re-apply a stored peer to the running interface
    Update {
        #[clap(value_parser)]
        name: String,
    },
    /// Delete peer by name
    Delete {
        #[clap(value_parser)]
        name: String,
    },
    /// List peer names
    List,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    pretty_env_logger::init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    let database = Database::new(&config.database).await?;
    let wg = WgCli::new(config.interface.clone());
    let manager = PeerManager::new(config, database, Box::new(wg)).await?;

    match cli.command {
        Command::Add { name } => match manager.add(&name).await? {
            AddOutcome::Added(_) => {}
            AddOutcome::AlreadyExists => println!("Already exists"),
        },
        Command::Update { name } => {
            let record = manager.update(&name).await?;
            println!("{record}");
        }
        Command::Delete { name } => manager.delete(&name).await?,
        Command::List => {
            for name in manager.list().await? {
                println!("{name}");
            }
        }
    }

    Ok(())
}
