use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use reflex_core::{GraphFormat, ReflexEngine, RuleDraft};
use serde::Serialize;
use walkdir::WalkDir;

use super::support::load_graph;

#[derive(Debug, Serialize)]
pub(super) struct ImportReport {
    pub(super) imported: Vec<ImportedRule>,
    pub(super) failed: Vec<ImportFailure>,
}

#[derive(Debug, Serialize)]
pub(super) struct ImportedRule {
    pub(super) path: PathBuf,
    pub(super) uid: String,
    pub(super) is_active: bool,
    pub(super) errors: usize,
    pub(super) warnings: usize,
}

#[derive(Debug, Serialize)]
pub(super) struct ImportFailure {
    pub(super) path: PathBuf,
    pub(super) error: String,
}

/// Saves each graph file under `dir` as the rule named after its file stem.
/// One bad file does not stop the others.
pub(super) fn import_rules(
    engine: &ReflexEngine,
    dir: &Path,
    publish: bool,
) -> Result<ImportReport> {
    if !dir.is_dir() {
        anyhow::bail!("import directory not found: {}", dir.display());
    }

    let mut report = ImportReport {
        imported: Vec::new(),
        failed: Vec::new(),
    };
    for path in graph_files(dir)? {
        match import_one(engine, &path, publish) {
            Ok(imported) => report.imported.push(imported),
            Err(err) => report.failed.push(ImportFailure {
                path,
                error: format!("{err:#}"),
            }),
        }
    }
    Ok(report)
}

fn graph_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(false).sort_by_file_name() {
        let entry = entry.with_context(|| format!("failed to walk {}", dir.display()))?;
        if entry.file_type().is_file() && GraphFormat::is_graph_file(entry.path()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn import_one(engine: &ReflexEngine, path: &Path, publish: bool) -> Result<ImportedRule> {
    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::trim)
        .filter(|stem| !stem.is_empty())
        .with_context(|| format!("cannot derive a rule uid from {}", path.display()))?;
    let graph = load_graph(path, None)?;
    let saved = engine.save_rule(
        RuleDraft {
            uid: Some(stem.to_string()),
            name: stem.to_string(),
            ..RuleDraft::default()
        },
        &graph,
    )?;

    let mut imported = ImportedRule {
        path: path.to_path_buf(),
        uid: saved.rule.uid.clone(),
        is_active: saved.rule.is_active,
        errors: saved.report.errors.len(),
        warnings: saved.report.warnings.len(),
    };
    if publish && saved.report.is_publishable(engine.config().strict_publish) {
        imported.is_active = engine.publish_rule(&saved.rule.uid)?.rule.is_active;
    }
    Ok(imported)
}
