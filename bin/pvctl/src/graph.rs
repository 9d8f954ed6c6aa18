//! ---
//! pv_section: "04-tooling"
//! pv_subsection: "binary"
//! pv_type: "source"
//! pv_scope: "code"
//! pv_description: "Control CLI for graph files and engine sessions."
//! pv_version: "v0.0.0-prealpha"
//! pv_owner: "tbd"
//! ---
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use pv_serialization::GraphData;

/// Graph file commands.
#[derive(Debug, Subcommand)]
pub enum GraphCommand {
    /// Print a summary of every node, its attributes and the links.
    Inspect(GraphFile),
    /// Check a graph file for structural problems.
    Validate(GraphFile),
}

/// Graph file argument shared by graph commands.
#[derive(Debug, Args)]
pub struct GraphFile {
    /// Path to a graph JSON file.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

/// Execute the supplied graph command.
pub fn run(command: GraphCommand) -> Result<()> {
    match command {
        GraphCommand::Inspect(args) => {
            let graph = load(&args.file)?;
            print!("{}", render_summary(&graph));
        }
        GraphCommand::Validate(args) => {
            let graph = load(&args.file)?;
            graph
                .validate()
                .with_context(|| format!("{} is not a valid graph", args.file.display()))?;
            println!(
                "{}: ok ({} nodes, {} links)",
                args.file.display(),
                graph.nodes.len(),
                graph.links.len()
            );
        }
    }
    Ok(())
}

fn load(path: &Path) -> Result<GraphData> {
    GraphData::from_path(path).with_context(|| format!("failed to load graph {}", path.display()))
}

fn render_summary(graph: &GraphData) -> String {
    let mut out = format!(
        "{} nodes, {} links\n",
        graph.nodes.len(),
        graph.links.len()
    );
    for node in &graph.nodes {
        let pos = node.data.node_pos;
        out.push_str(&format!(
            "node {} {} @ ({:.1}, {:.1})\n",
            node.id(),
            node.type_name(),
            pos.x,
            pos.y
        ));
        for (name, attribute) in node.attributes() {
            out.push_str(&format!(
                "  attr {} {}: {}\n",
                attribute.data.id,
                name,
                pv_serialization::short_class_name(&attribute.object_class)
            ));
        }
    }
    for link in &graph.links {
        out.push_str(&format!(
            "link {}: {} -> {}\n",
            link.data.id, link.data.a, link.data.b
        ));
    }
    out
}
