//! quarry: extract cloud resource snapshots and query them
//!
//! Usage:
//!   # Extract resources from a JSON lines file into ./snapshots
//!   quarry extract resources.jsonl --target-dir ./snapshots
//!
//!   # Extract from stdin
//!   echo '{"id": "vm-1", "name": "a", "type": "X/Y"}' | quarry extract
//!
//!   # Inspect the latest snapshot
//!   quarry tables
//!   quarry describe microsoft_compute_virtualmachines
//!   quarry query "SELECT name FROM resources LIMIT 5"

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use quarry::repository::MemoryRepository;
use quarry::snapshot;
use quarry::source::{JsonLinesSource, ResourceSource};
use quarry::target::SqliteTarget;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "quarry")]
#[command(about = "Discover resources and snapshot them as relational tables", long_about = None)]
struct Args {
    /// Folder where snapshot files live
    #[arg(long, short = 't', default_value = ".", env = "QUARRY_TARGET_DIR", global = true)]
    target_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract resources from a JSON lines stream into a new snapshot
    Extract {
        /// Input file with one JSON resource per line (stdin if omitted)
        #[arg(value_name = "FILE")]
        input: Option<PathBuf>,

        /// Prefix prepended to every created table name
        #[arg(long, default_value = "")]
        type_prefix: String,
    },

    /// List tables in a snapshot
    Tables {
        /// Snapshot file (defaults to the latest in the target folder)
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Show a table's columns with sample values
    Describe {
        table: String,

        /// Snapshot file (defaults to the latest in the target folder)
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Run a read-only SELECT query against a snapshot
    Query {
        sql: String,

        /// Snapshot file (defaults to the latest in the target folder)
        #[arg(long)]
        db: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match args.command {
        Command::Extract { input, type_prefix } => extract(&args.target_dir, input, &type_prefix),
        Command::Tables { db } => {
            let db = resolve_db(&args.target_dir, db)?;
            for table in snapshot::list_tables(&db)? {
                println!("{}", table);
            }
            Ok(())
        }
        Command::Describe { table, db } => {
            let db = resolve_db(&args.target_dir, db)?;
            for column in snapshot::describe_table(&db, &table)? {
                println!(
                    "{} {}, values examples: {}",
                    column.name,
                    column.declared_type,
                    column.sample_values.join(", ")
                );
            }
            Ok(())
        }
        Command::Query { sql, db } => {
            let db = resolve_db(&args.target_dir, db)?;
            let output = snapshot::execute_select(&db, &sql)?;
            println!("{}", output.columns.join("\t"));
            for row in output.rows {
                println!("{}", row.join("\t"));
            }
            Ok(())
        }
    }
}

fn extract(target_dir: &Path, input: Option<PathBuf>, type_prefix: &str) -> Result<()> {
    let reader: Box<dyn BufRead> = match &input {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("failed to open {}", path.display()))?,
        )),
        None => Box::new(BufReader::new(std::io::stdin())),
    };

    let mut repository = MemoryRepository::new();
    let mut source = JsonLinesSource::new(reader).with_type_prefix(type_prefix);
    source.extract(&mut repository)?;

    let timestamp = Local::now().format("%Y%m%d%H%M%S");
    let db_path = target_dir.join(format!("extract_{}.db", timestamp));
    let mut target = SqliteTarget::create(&db_path)?;
    repository.save_to(&mut target)?;
    target.close()?;

    println!("{}", db_path.display());
    Ok(())
}

fn resolve_db(target_dir: &Path, db: Option<PathBuf>) -> Result<PathBuf> {
    match db {
        Some(path) => Ok(path),
        None => Ok(snapshot::latest_snapshot(target_dir)?),
    }
}
