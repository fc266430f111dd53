//! Normalizr CLI
//!
//! Normalizes and denormalizes JSON documents against a schema definition file.

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use schema_normalizr::config::OutputFormat;
use schema_normalizr::{Definition, IdAttribute, NormalizrConfig};
use serde::Deserialize;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "normalizr")]
#[command(about = "Normalize nested JSON into entity tables and back")]
struct Cli {
    /// Config file layered over the default locations
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print single-line JSON
    #[arg(long, global = true)]
    compact: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Flatten a document into {result, entities}
    Normalize {
        /// Schema definition (JSON)
        #[arg(short, long)]
        definition: PathBuf,
        /// Input document; stdin when omitted
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Rebuild a document from {result, entities}
    Denormalize {
        /// Schema definition (JSON)
        #[arg(short, long)]
        definition: PathBuf,
        /// Normalized document; stdin when omitted
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Show the entities and recursive groups of a definition
    Inspect {
        /// Schema definition (JSON)
        #[arg(short, long)]
        definition: PathBuf,
    },
}

/// Shape read by `denormalize`, as printed by `normalize`
#[derive(Deserialize)]
struct NormalizedInput {
    result: Value,
    #[serde(default)]
    entities: Value,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref().map(|p| p.to_string_lossy().into_owned());
    let mut config = NormalizrConfig::load_from(config_path.as_deref())
        .context("Failed to load configuration")?;
    if cli.compact {
        config.output.format = OutputFormat::Compact;
    }

    match cli.command {
        Commands::Normalize { definition, input } => {
            let compiled = load_definition(&definition)?.build(&config.definition)?;
            let data = read_json(input.as_deref())?;

            let normalized = compiled.normalize(&data, config.normalize_options())?;
            if !normalized.diagnostics.is_empty() {
                eprintln!("⚠️  {} diagnostic(s)", normalized.diagnostics.len());
                eprint!("{}", normalized.diagnostics.format_all());
            }
            println!("{}", config.render(&serde_json::to_value(&normalized)?)?);
            Ok(())
        }

        Commands::Denormalize { definition, input } => {
            let compiled = load_definition(&definition)?.build(&config.definition)?;
            let NormalizedInput { result, entities } =
                serde_json::from_value(read_json(input.as_deref())?)
                    .context("Expected an object with 'result' and 'entities'")?;

            let denormalized = compiled.denormalize(&result, &entities)?;
            println!("{}", config.render(&denormalized)?);
            Ok(())
        }

        Commands::Inspect { definition } => {
            let compiled = load_definition(&definition)?.build(&config.definition)?;

            println!("📦 Entities:");
            for entity in compiled.entities() {
                let id = match entity.id_attribute() {
                    IdAttribute::Field(name) => name.as_str(),
                    IdAttribute::Function(_) => "<fn>",
                };
                let fields = entity.fields();
                if fields.is_empty() {
                    println!("  {} [{}]", entity.key(), id);
                } else {
                    let names: Vec<&str> = fields.keys().map(String::as_str).collect();
                    println!("  {} [{}] -> {}", entity.key(), id, names.join(", "));
                }
            }

            match compiled.root() {
                Some(root) => println!("\n🌳 Root: {}", root.kind()),
                None => println!("\n🌳 Root: (none)"),
            }

            if compiled.recursive_groups().is_empty() {
                println!("\n✅ No recursive entities");
            } else {
                println!("\n🔁 Recursive groups:");
                for group in compiled.recursive_groups() {
                    println!("  [{}]", group.join(", "));
                }
            }
            Ok(())
        }
    }
}

fn load_definition(path: &Path) -> Result<Definition> {
    Definition::from_path(path)
        .with_context(|| format!("Failed to load definition {}", path.display()))
}

fn read_json(path: Option<&Path>) -> Result<Value> {
    let content = match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            std::io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };
    serde_json::from_str(&content).context("Input is not valid JSON")
}
