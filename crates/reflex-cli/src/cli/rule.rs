use std::path::PathBuf;

use clap::{Args, Subcommand};
use reflex_core::GraphFormat;

use super::parsers::parse_graph_format;

#[derive(Debug, Args)]
pub struct RuleArgs {
    #[command(subcommand)]
    pub command: RuleCommand,
}

#[derive(Debug, Subcommand)]
pub enum RuleCommand {
    /// Compile a graph and store it as a rule. New rules start inactive.
    Save {
        #[arg(long)]
        graph: PathBuf,
        #[arg(long, value_parser = parse_graph_format)]
        format: Option<GraphFormat>,
        #[arg(long)]
        name: String,
        #[arg(long)]
        uid: Option<String>,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        priority: i64,
    },
    /// Save every `.json`/`.yaml`/`.yml` graph under a directory, one rule
    /// per file named after its stem.
    Import {
        #[arg(long)]
        dir: PathBuf,
        #[arg(long, default_value_t = false)]
        publish: bool,
    },
    List,
    Show {
        #[arg(long)]
        uid: String,
    },
    Export {
        #[arg(long)]
        uid: String,
    },
    Publish {
        #[arg(long)]
        uid: String,
    },
    Deactivate {
        #[arg(long)]
        uid: String,
    },
    Delete {
        #[arg(long)]
        uid: String,
    },
}
