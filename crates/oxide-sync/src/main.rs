//! oxide-sync CLI
//!
//! Command-line tool for syncing collection record tables.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sqlx::sqlite::SqlitePoolOptions;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use oxide_sync::introspect;
use oxide_sync::prelude::*;
use oxide_sync::store::read_collection_file;

/// Keeps collection record tables in sync with their definitions.
#[derive(Parser)]
#[command(name = "oxide-sync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database URL (SQLite path or connection string).
    #[arg(short, long, env = "DATABASE_URL", default_value = "sqlite:data.db?mode=rwc")]
    database: String,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the collection metadata table.
    Init,

    /// Save a collection and sync its record table.
    Apply {
        /// Collection JSON file.
        file: PathBuf,
    },

    /// Show the SQL `apply` would execute, without executing it.
    Sql {
        /// Collection JSON file.
        file: PathBuf,
    },

    /// List stored collections.
    List,

    /// Show the columns and indexes of a table.
    Inspect {
        /// Table name.
        table: String,
    },

    /// Delete a collection and its record table.
    Delete {
        /// Collection name or id.
        name_or_id: String,
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

    // Connect to database
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&cli.database)
        .await?;

    let sync = SchemaSync::new(pool);

    match cli.command {
        Commands::Init => {
            info!("Initializing collections table...");
            sync.init().await?;
            info!("Collections table created successfully.");
        }

        Commands::Apply { file } => {
            sync.init().await?;
            let collection = read_collection_file(&file)?;

            match sync.save_collection(&collection).await {
                Ok(()) => info!(collection = %collection.name, "Collection applied."),
                Err(SyncError::Validation(errors)) => {
                    println!("{}", serde_json::to_string_pretty(&errors)?);
                    anyhow::bail!(
                        "collection '{}' saved, but {} index(es) were rejected",
                        collection.name,
                        errors.len()
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }

        Commands::Sql { file } => {
            sync.init().await?;
            let collection = read_collection_file(&file)?;

            let mut conn = sync.pool().acquire().await?;
            let old = sync.store().find_by_id(&mut conn, &collection.id).await?;
            let plan = sync.plan(&collection, old.as_ref())?;

            println!("-- {} collection '{}'", plan.mode, plan.collection);
            for step in &plan.steps {
                if step.operations.is_empty() {
                    continue;
                }
                println!("\n-- {}", step.step);
                for operation in &step.operations {
                    for sql in sync.executor().sql_for(operation) {
                        println!("{sql};");
                    }
                }
            }
            if !plan.index_errors.is_empty() {
                println!("\n-- rejected indexes:\n{}", plan.index_errors);
            }
        }

        Commands::List => {
            sync.init().await?;
            let mut conn = sync.pool().acquire().await?;
            let collections = sync.store().list(&mut conn).await?;

            if collections.is_empty() {
                info!("No collections have been saved yet.");
            } else {
                println!("\nCollections:");
                println!("{:-<60}", "");

                for stored in &collections {
                    let collection = &stored.collection;
                    println!(
                        " {:<20} {:<5} {:>3} field(s)  {} ({})",
                        collection.name,
                        collection.kind,
                        collection.fields.len(),
                        collection.id,
                        stored.updated.format("%Y-%m-%d %H:%M:%S")
                    );
                }
                println!();
            }
        }

        Commands::Inspect { table } => {
            let mut conn = sync.pool().acquire().await?;
            let columns = introspect::table_info(&mut conn, &table).await?;
            let indexes = introspect::table_indexes(&mut conn, &table).await?;

            println!("\nTable {table}:");
            println!("{:-<60}", "");
            for column in &columns {
                println!(
                    " {:<24} {:<8} {}{}",
                    column.name,
                    column.kind,
                    if column.not_null { "NOT NULL " } else { "" },
                    column
                        .default_value
                        .as_deref()
                        .map(|value| format!("DEFAULT {value}"))
                        .unwrap_or_default()
                );
            }

            if !indexes.is_empty() {
                println!("\nIndexes:");
                for sql in indexes.values() {
                    println!(" {sql}");
                }
            }
            println!();
        }

        Commands::Delete { name_or_id } => {
            sync.init().await?;
            sync.delete_collection(&name_or_id).await?;
            info!(collection = %name_or_id, "Collection deleted.");
        }
    }

    Ok(())
}
