use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use reflex_core::models::ReflexRule;
use reflex_core::{GraphFormat, ReflexGraph, parse_graph};
use serde::Serialize;

pub(super) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}

/// Reads a graph document, with the format taken from the extension unless
/// given explicitly.
pub(super) fn load_graph(path: &Path, format: Option<GraphFormat>) -> Result<ReflexGraph> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read graph {}", path.display()))?;
    let format = format.unwrap_or_else(|| GraphFormat::from_path(path));
    parse_graph(&raw, format).with_context(|| format!("invalid graph {}", path.display()))
}

#[derive(Debug, Serialize)]
pub(super) struct RuleSummary<'a> {
    uid: &'a str,
    name: &'a str,
    is_active: bool,
    priority: i64,
    triggers: usize,
    decisions: usize,
}

pub(super) fn rule_summaries(rules: &[ReflexRule]) -> Vec<RuleSummary<'_>> {
    rules
        .iter()
        .map(|rule| RuleSummary {
            uid: &rule.uid,
            name: &rule.name,
            is_active: rule.is_active,
            priority: rule.priority,
            triggers: rule.triggers.len(),
            decisions: rule
                .triggers
                .iter()
                .map(|trigger| trigger.decisions.len())
                .sum(),
        })
        .collect()
}
