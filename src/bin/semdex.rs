//! Semdex CLI - incremental source-code indexer.
//!
//! Loads a configuration, runs the initial full index, and keeps watching
//! the configured trees until interrupted, publishing every parsed entity
//! as semantic triples.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::info;

use semdex::core::config::IndexerConfig;
use semdex::index::orchestrator::Indexer;
use semdex::index::publisher::LoggingPublisher;
use semdex::lang::registry::default_registry;

#[derive(Parser)]
#[command(name = "semdex", version, about = "Incremental multi-language source-code indexer")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the indexer: initial index, watchers, periodic re-index
    Run(ConfigArgs),
    /// Run one full index pass and exit
    Index(ConfigArgs),
    /// Validate a configuration file
    ValidateConfig(ConfigArgs),
    /// Print the default configuration as YAML
    PrintDefaultConfig,
    /// List registered language parsers and their extensions
    ListLanguages,
}

#[derive(clap::Args)]
struct ConfigArgs {
    /// Configuration file (YAML or JSON)
    #[arg(short, long, env = "SEMDEX_CONFIG", default_value = "semdex.yaml")]
    config: PathBuf,
}

fn load_config(args: &ConfigArgs) -> anyhow::Result<IndexerConfig> {
    let config = match args.config.extension().and_then(|e| e.to_str()) {
        Some("json") => IndexerConfig::from_json_file(&args.config)?,
        _ => IndexerConfig::from_yaml_file(&args.config)?,
    };
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Run(args) => {
            let config = load_config(&args)?;
            let mut indexer =
                Indexer::new(config, default_registry(), Arc::new(LoggingPublisher))?;
            indexer.initialize()?;
            indexer.start().await?;
            info!("indexer running, press Ctrl-C to stop");
            tokio::signal::ctrl_c().await?;
            indexer.stop(Duration::from_secs(5)).await?;
        }
        Commands::Index(args) => {
            let config = load_config(&args)?;
            let mut indexer =
                Indexer::new(config, default_registry(), Arc::new(LoggingPublisher))?;
            indexer.index_once().await?;
            let metrics = indexer.metrics();
            println!(
                "indexed {} entities ({} parse failures, {} errors)",
                metrics.entities_indexed(),
                metrics.parse_failures(),
                metrics.errors()
            );
        }
        Commands::ValidateConfig(args) => {
            let config = load_config(&args)?;
            config.validate(default_registry())?;
            println!("configuration OK: {}", args.config.display());
        }
        Commands::PrintDefaultConfig => {
            print!("{}", IndexerConfig::default().to_yaml()?);
        }
        Commands::ListLanguages => {
            let registry = default_registry();
            for name in registry.list_parsers() {
                let extensions = registry.extensions_for(&name).join(", ");
                println!("{name}: {extensions}");
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing_run_default_config() {
        let cli = Cli::parse_from(["semdex", "run"]);
        assert!(!cli.verbose);
        match cli.command {
            Commands::Run(args) => assert_eq!(args.config, PathBuf::from("semdex.yaml")),
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn test_cli_parsing_verbose_index() {
        let cli = Cli::parse_from(["semdex", "-v", "index", "--config", "custom.json"]);
        assert!(cli.verbose);
        match cli.command {
            Commands::Index(args) => assert_eq!(args.config, PathBuf::from("custom.json")),
            _ => panic!("expected index command"),
        }
    }
}
