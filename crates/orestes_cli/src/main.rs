//! Orestes CLI
//!
//! Command-line tools for working with Orestes schemas and entity documents
//! offline.
//!
//! # Commands
//!
//! - `schema` - Describe the types of a schema file
//! - `normalize` - Map an entity document through the metamodel and print
//!   the normalized wire form

mod commands;
mod error;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Orestes command-line tools.
#[derive(Parser)]
#[command(name = "orestes")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the schema file (a JSON list of type documents)
    #[arg(global = true, short, long)]
    schema: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Describe the types of a schema file
    Schema {
        /// Only show this type
        #[arg(short = 't', long = "type")]
        type_name: Option<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Map an entity document through the metamodel and print the result
    Normalize {
        /// Entity type of the document
        #[arg(short = 't', long = "type")]
        type_name: String,

        /// Path to the entity document
        document: PathBuf,

        /// Fail on malformed map records instead of reconciling them
        #[arg(long)]
        strict: bool,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut stdout = std::io::stdout().lock();
    match cli.command {
        Commands::Schema { type_name, format } => {
            let path = cli.schema.ok_or("Schema path required for schema")?;
            commands::schema::run(&path, type_name.as_deref(), &format, &mut stdout)?;
        }
        Commands::Normalize {
            type_name,
            document,
            strict,
        } => {
            let path = cli.schema.ok_or("Schema path required for normalize")?;
            commands::normalize::run(&path, &type_name, &document, strict, &mut stdout)?;
        }
        Commands::Version => {
            println!("Orestes CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
