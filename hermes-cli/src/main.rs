//! Hermes CLI - list and run research tools from the command line

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hermes_core::prelude::*;
use hermes_core::research::DEFAULT_CALLER;

#[derive(Parser)]
#[command(name = "hermes")]
#[command(about = "Hermes research tools CLI", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to hermes.toml plus HERMES_* variables)
    #[arg(short, long, global = true, env = "HERMES_CONFIG_PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Research tool commands
    Tools {
        #[command(subcommand)]
        command: ToolCommands,
    },
    /// Print the persistent store key for a record
    Key {
        /// Data type segment
        data_type: String,
        /// Level segment
        level: String,
        /// Identifier segment
        identifier: String,
    },
    /// Version information
    Version,
}

#[derive(Subcommand)]
enum ToolCommands {
    /// List registered tools
    List {
        /// Only tools this caller may execute
        #[arg(long)]
        caller: Option<String>,
    },
    /// Show a tool's declaration as JSON
    Show {
        /// Tool name
        name: String,
    },
    /// Find tools by name or description
    Search {
        /// Search text
        query: String,
    },
    /// Execute a tool through the pipeline
    Run {
        /// Tool name
        name: String,
        /// Execution context as a JSON object
        #[arg(long, default_value = "{}")]
        ctx: String,
        /// Run identifier (random when omitted)
        #[arg(long)]
        run_id: Option<String>,
        /// Caller identity checked against the tool's allowed callers
        #[arg(long, default_value = DEFAULT_CALLER)]
        caller: String,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<HermesConfig> {
    let config = match path {
        Some(path) => HermesConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => HermesConfig::load()?,
    };
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Version => {
            println!("hermes {}", env!("CARGO_PKG_VERSION"));
            println!("hermes-core {}", hermes_core::VERSION);
        }
        Commands::Key {
            data_type,
            level,
            identifier,
        } => {
            println!("{}", build_key(&data_type, &level, &identifier));
        }
        Commands::Tools { command } => {
            let config = load_config(cli.config.as_ref())?;
            let registry = default_registry(&config, &EnvSecrets);

            match command {
                ToolCommands::List { caller } => {
                    let tools: Vec<&BoxedTool> = match &caller {
                        Some(caller) => registry.available_to(caller),
                        None => registry.all().collect(),
                    };
                    for tool in tools {
                        let spec = tool.spec();
                        println!(
                            "{:<40} {:<8} {:<16} ttl={}s",
                            spec.name, spec.scope, spec.output, spec.ttl_secs
                        );
                    }
                }
                ToolCommands::Show { name } => {
                    let tool = registry.get_by_name(&name)?;
                    let summary = ToolSummary::from(tool.as_ref());
                    println!("{}", serde_json::to_string_pretty(&summary)?);
                }
                ToolCommands::Search { query } => {
                    for found in registry.discover(&query) {
                        println!("{:<40} {:.2}", found.tool.name(), found.score);
                    }
                }
                ToolCommands::Run {
                    name,
                    ctx,
                    run_id,
                    caller,
                } => {
                    let tool = registry.get_by_name(&name)?;
                    let value: serde_json::Value =
                        serde_json::from_str(&ctx).context("--ctx must be valid JSON")?;
                    let ctx = ExecutionContext::from_value(value)?;
                    let run_id = run_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

                    let pipeline = ExecutionPipeline::from_config(&config);
                    let result = pipeline
                        .execute(tool.as_ref(), &ctx, &run_id, &caller)
                        .await?;

                    if !result.is_success() {
                        tracing::warn!(tool = %name, errors = ?result.errors, "tool reported errors");
                    }
                    println!("{}", serde_json::to_string_pretty(&result)?);
                }
            }
        }
    }

    Ok(())
}
