use std::path::Path;

use anyhow::{Context, Result};
use reflex_core::models::ReflexRunReport;
use reflex_core::{ReflexEngine, RuleDraft};

use crate::cli::{Commands, RuleCommand};

mod import;
mod retry;
mod sample_file;
mod support;

#[cfg(test)]
mod tests;

use self::import::import_rules;
use self::retry::retry_sample_file;
use self::sample_file::SampleFile;
use self::support::{load_graph, print_json, rule_summaries};

pub(crate) fn run_from_root(root: &Path, command: Commands) -> Result<()> {
    let engine = ReflexEngine::open(root)
        .with_context(|| format!("failed to open reflex root {}", root.display()))?;
    run_validated(&engine, command)
}

fn run_validated(engine: &ReflexEngine, command: Commands) -> Result<()> {
    match command {
        Commands::Compile(args) => {
            let graph = load_graph(&args.graph, args.format)?;
            let output = engine.compile_graph(&graph)?;
            print_json(&output)?;
        }
        Commands::Rule(args) => run_rule_command(engine, args.command)?,
        Commands::Evaluate(args) => {
            let sample = SampleFile::load(&args.sample)?;
            let fired = engine.evaluate_sample(sample.sample_uid(), sample.store())?;
            print_json(&fired)?;
        }
        Commands::Run(args) => {
            print_json(&run_sample_file(engine, &args.sample)?)?;
        }
        Commands::Retry(args) => {
            print_json(&retry_sample_file(engine, &args.sample, &args.failed)?)?;
        }
        Commands::Logs(args) => {
            let entries = engine.list_request_logs(args.limit)?;
            print_json(&entries)?;
        }
    }
    Ok(())
}

fn run_sample_file(engine: &ReflexEngine, path: &Path) -> Result<ReflexRunReport> {
    let sample = SampleFile::load(path)?;
    let outcome = engine.run_sample(sample.sample_uid(), sample.store(), sample.store());
    // Actions may have landed before a failure; persist them either way.
    sample.save()?;
    Ok(outcome?)
}

fn run_rule_command(engine: &ReflexEngine, command: RuleCommand) -> Result<()> {
    match command {
        RuleCommand::Save {
            graph,
            format,
            name,
            uid,
            description,
            priority,
        } => {
            let graph = load_graph(&graph, format)?;
            let saved = engine.save_rule(
                RuleDraft {
                    uid,
                    name,
                    description,
                    priority,
                },
                &graph,
            )?;
            print_json(&saved)?;
        }
        RuleCommand::Import { dir, publish } => {
            let report = import_rules(engine, &dir, publish)?;
            print_json(&report)?;
        }
        RuleCommand::List => {
            let rules = engine.list_rules()?;
            print_json(&rule_summaries(&rules))?;
        }
        RuleCommand::Show { uid } => {
            print_json(&engine.get_rule(&uid)?)?;
        }
        RuleCommand::Export { uid } => {
            print_json(&engine.export_rule_graph(&uid)?)?;
        }
        RuleCommand::Publish { uid } => {
            print_json(&engine.publish_rule(&uid)?)?;
        }
        RuleCommand::Deactivate { uid } => {
            print_json(&engine.deactivate_rule(&uid)?)?;
        }
        RuleCommand::Delete { uid } => {
            let deleted = engine.delete_rule(&uid)?;
            print_json(&serde_json::json!({
                "status": if deleted { "ok" } else { "not_found" },
                "uid": uid,
                "deleted": deleted,
            }))?;
        }
    }
    Ok(())
}
