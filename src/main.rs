//! schemasync CLI
//!
//! Command-line tool for synchronizing a SQLite database with a desired
//! schema script.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::ConnectOptions;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use schemasync::prelude::*;

/// Declarative schema synchronization for SQLite.
#[derive(Parser)]
#[command(name = "schemasync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database path or connection string.
    #[arg(short, long, env = "DATABASE_URL", default_value = "sqlite:db.sqlite3")]
    database: String,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a desired schema to the database.
    Sync {
        /// Path to the desired schema script.
        schema: PathBuf,
    },

    /// Show the plan for a desired schema without applying it.
    Plan {
        /// Path to the desired schema script.
        schema: PathBuf,

        /// Print the plan as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Dump the live schema catalog.
    Inspect {
        /// Print the catalog as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // A single write connection: the synchronizer owns it for the whole
    // call, as required by the single-writer layout.
    let url = cli.database.trim_start_matches("sqlite:");
    let mut conn = SqliteConnectOptions::new()
        .filename(url)
        .create_if_missing(matches!(cli.command, Commands::Sync { .. }))
        .connect()
        .await?;

    match cli.command {
        Commands::Sync { schema } => {
            let schema_text = std::fs::read_to_string(&schema)?;
            synchronize(&mut conn, &schema_text).await?;
            info!("Database is in sync with {}", schema.display());
        }

        Commands::Plan { schema, json } => {
            let schema_text = std::fs::read_to_string(&schema)?;
            let plan = plan(&mut conn, &schema_text).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&plan)?);
            } else {
                println!("{plan}");
            }
        }

        Commands::Inspect { json } => {
            let catalog = capture(&mut conn).await?;
            let objects: Vec<&SchemaObject> = catalog.objects().collect();
            if json {
                println!("{}", serde_json::to_string_pretty(&objects)?);
            } else if objects.is_empty() {
                println!("(empty schema)");
            } else {
                for object in objects {
                    println!("{} {}", object.kind, object.name);
                    println!("  {}", object.definition.replace('\n', "\n  "));
                }
            }
        }
    }

    Ok(())
}
