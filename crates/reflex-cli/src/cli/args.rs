use std::path::PathBuf;

use clap::Args;
use reflex_core::GraphFormat;

use super::parsers::{parse_graph_format, parse_min_one_usize};

#[derive(Debug, Args)]
pub struct CompileArgs {
    #[arg(long)]
    pub graph: PathBuf,
    /// Graph document format; picked from the file extension when omitted.
    #[arg(long, value_parser = parse_graph_format)]
    pub format: Option<GraphFormat>,
}

#[derive(Debug, Args)]
pub struct SampleArgs {
    /// JSON sample record (`sample_uid`, `sample_type_uid`, `analyses`).
    #[arg(long)]
    pub sample: PathBuf,
}

#[derive(Debug, Args)]
pub struct RetryArgs {
    #[arg(long)]
    pub sample: PathBuf,
    /// Run report, apply report or failed-action list from an earlier pass.
    #[arg(long)]
    pub failed: PathBuf,
}

#[derive(Debug, Args)]
pub struct LogsArgs {
    #[arg(long, default_value_t = 100, value_parser = parse_min_one_usize)]
    pub limit: usize,
}
