//! Shoploader CLI - bulk CSV import service
//!
//! # Commands
//!
//! ```bash
//! shoploader serve                 # Start HTTP server (port 3000)
//! shoploader modules               # List registered import modules
//! shoploader providers             # Show AI provider configuration status
//! ```

use clap::{Parser, Subcommand};
use shoploader::{available_providers, modules, MemoryStore};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "shoploader")]
#[command(about = "Bulk CSV import with AI-assisted column mapping", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },

    /// List registered import modules
    Modules,

    /// Show AI provider configuration status
    Providers,
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve { port } => cmd_serve(port).await,
        Commands::Modules => cmd_modules(),
        Commands::Providers => cmd_providers(),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn cmd_serve(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    // TODO: wire a real database-backed RecordStore; the in-memory store
    // only supports local development runs
    let store = Arc::new(MemoryStore::new());
    shoploader::server::start_server(port, store).await
}

fn cmd_modules() -> Result<(), Box<dyn std::error::Error>> {
    for name in modules::module_names() {
        let config = modules::module_config(name).ok_or("module registry inconsistent")?;
        println!("{} -> table '{}'", name, config.table_name);
        for field in &config.schema {
            let required = if field.required { " (required)" } else { "" };
            println!("    {}{}", field.name, required);
        }
    }
    Ok(())
}

fn cmd_providers() -> Result<(), Box<dyn std::error::Error>> {
    for info in available_providers() {
        let status = if info.available {
            "configured"
        } else {
            "missing API key"
        };
        println!("{} ({}) - {}", info.name, info.default_model, status);
    }
    Ok(())
}
