use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod args;
mod parsers;
mod rule;

#[cfg(test)]
mod tests;

pub use args::{CompileArgs, LogsArgs, RetryArgs, SampleArgs};
pub use rule::{RuleArgs, RuleCommand};

#[derive(Debug, Parser)]
#[command(name = "reflex-cli")]
#[command(about = "Reflex rule engine: compile, publish and run reflex rules", version)]
pub struct Cli {
    #[arg(long, default_value = ".reflex")]
    pub root: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Compile a graph file and print the tree with its validation report.
    Compile(CompileArgs),
    Rule(RuleArgs),
    /// Preview the decisions that would fire for a sample file.
    Evaluate(SampleArgs),
    /// Evaluate and apply reflex actions, writing the sample file back.
    Run(SampleArgs),
    /// Re-run the failed actions of an earlier report, writing the sample
    /// file back.
    Retry(RetryArgs),
    Logs(LogsArgs),
}
