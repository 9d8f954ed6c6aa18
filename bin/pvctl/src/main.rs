//! ---
//! pv_section: "04-tooling"
//! pv_subsection: "binary"
//! pv_type: "source"
//! pv_scope: "code"
//! pv_description: "Control CLI for graph files and engine sessions."
//! pv_version: "v0.0.0-prealpha"
//! pv_owner: "tbd"
//! ---
use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use pv_common::config::AppConfig;
use pv_common::logging;

mod engine;
mod graph;

const DEFAULT_CONFIG: &str = "papervision.toml";

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "PaperVision graph and engine utility",
    long_about = None
)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_name = "FILE",
        env = "PAPERVISION_CONFIG",
        help = "Path to configuration file"
    )]
    config: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        help = "Also write structured logs to the configured log directory"
    )]
    log_to_file: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(subcommand, about = "Inspect and validate graph files")]
    Graph(graph::GraphCommand),
    #[command(subcommand, about = "Drive a loopback engine session")]
    Engine(engine::EngineCommand),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut candidates = Vec::new();
    if let Some(path) = &cli.config {
        if !path.exists() {
            bail!("configuration file {} does not exist", path.display());
        }
        candidates.push(path.clone());
    }
    candidates.push(PathBuf::from(DEFAULT_CONFIG));
    let loaded = AppConfig::load_with_source(&candidates)?;

    if cli.log_to_file {
        logging::init_tracing("pvctl", &loaded.config.logging)?;
    } else {
        logging::init();
    }
    if let Some(source) = &loaded.source {
        tracing::debug!(config = %source.display(), "configuration loaded");
    }

    match cli.command {
        Commands::Graph(cmd) => graph::run(cmd)?,
        Commands::Engine(cmd) => engine::run(cmd, &loaded.config)?,
    }
    Ok(())
}
