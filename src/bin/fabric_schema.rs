//! Fabric Schema CLI
//!
//! Checks schemas, validates and merges data files, and exports schemas.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use fabric_schema::export::{self, ExportFormat};
use fabric_schema::store::read_document;
use fabric_schema::{merge_all, EngineConfig, ListMergeStrategy, MergeOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fabric-schema")]
#[command(about = "Validate, convert and merge structured fabric data")]
struct Cli {
    /// Explicit config file, layered over the default locations
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Meta-validate and resolve a schema
    Check {
        schema: PathBuf,
    },

    /// Convert and validate data files against a schema
    Validate {
        schema: PathBuf,
        #[arg(required = true)]
        data: Vec<PathBuf>,
    },

    /// Merge data files in order and print the result as YAML
    Merge {
        schema: PathBuf,
        #[arg(required = true)]
        data: Vec<PathBuf>,
        /// Strategy for lists without a primary key (default from config)
        #[arg(short, long)]
        strategy: Option<ListMergeStrategy>,
    },

    /// Export a schema as documentation, JSON Schema or form fields
    Export {
        schema: PathBuf,
        #[arg(short, long, default_value = "documentation")]
        format: ExportFormat,
        /// Dotted path of the subschema to export, e.g. `vlans.0`
        #[arg(short, long)]
        path: Option<String>,
    },

    /// Show or write the configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Write the default configuration to a file
    Init {
        #[arg(default_value = "fabric-schema.toml")]
        output: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = EngineConfig::load_from(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Commands::Check { schema } => {
            let loader = config.schema_loader()?;
            let loaded = loader
                .load_file(&schema)
                .with_context(|| format!("loading {}", schema.display()))?;
            println!("✅ {} is a valid schema", schema.display());
            println!("   fingerprint: {}", loaded.fingerprint());
            println!("   store entries: {}", loader.store().len());
            Ok(())
        }

        Commands::Validate { schema, data } => {
            let loaded = Arc::new(config.schema_loader()?.load_file(&schema)?);
            let mut failures = 0;

            for path in &data {
                let mut document = read_document(path)?;
                let tools = config.tools(Arc::clone(&loaded), host_name(path));
                let report = tools.convert_and_validate(&mut document);

                if report.is_clean() && !report.failed {
                    println!("✅ {}", path.display());
                    continue;
                }
                failures += 1;
                println!("❌ {} - {} errors", path.display(), report.errors.len());
                for error in &report.errors {
                    println!("   └─ [{}] {}", error.kind, error);
                }
            }

            if failures > 0 {
                bail!("{} of {} files failed validation", failures, data.len());
            }
            Ok(())
        }

        Commands::Merge {
            schema,
            data,
            strategy,
        } => {
            let loaded = config.schema_loader()?.load_file(&schema)?;
            let options = MergeOptions {
                list_strategy: strategy.unwrap_or(config.merge.list_strategy),
                ..config.merge_options()
            };

            let documents = data
                .iter()
                .map(|path| read_document(path))
                .collect::<Result<Vec<_>, _>>()?;
            let merged = merge_all(documents, Some(loaded.root()), &options)?;
            print!("{}", serde_yaml::to_string(&merged)?);
            Ok(())
        }

        Commands::Export {
            schema,
            format,
            path,
        } => {
            let loaded = config.schema_loader()?.load_file(&schema)?;
            let (node, name) = match path.as_deref() {
                Some(path) => (
                    loaded.subschema_dotted(path)?,
                    path.rsplit('.').next().unwrap_or(path),
                ),
                None => (loaded.root(), "root"),
            };
            println!("{}", export::render(node, name, format)?);
            Ok(())
        }

        Commands::Config { action } => match action {
            ConfigAction::Show => {
                print!("{}", toml::to_string_pretty(&config)?);
                Ok(())
            }
            ConfigAction::Init { output } => {
                if output.exists() {
                    bail!("{} already exists", output.display());
                }
                EngineConfig::default().save(&output)?;
                println!("✅ Wrote {}", output.display());
                Ok(())
            }
        },
    }
}

/// Host name for log lines: the data file stem
fn host_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown")
        .to_string()
}
