use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use reflex_core::ReflexEngine;
use reflex_core::models::{ApplyReport, FailedAction, ReflexRunReport};
use serde::Deserialize;

use super::sample_file::SampleFile;

/// Documents a failed-action list can be read from: the output of `run`,
/// a single apply report or a bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FailedActionSource {
    Run(ReflexRunReport),
    Apply(ApplyReport),
    List(Vec<FailedAction>),
}

pub(super) fn load_failed_actions(path: &Path, sample_uid: &str) -> Result<Vec<FailedAction>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read report {}", path.display()))?;
    let source = serde_json::from_str::<FailedActionSource>(&raw).with_context(|| {
        format!(
            "{} is not a run report, apply report or failed-action list",
            path.display()
        )
    })?;
    match source {
        FailedActionSource::Run(report) => {
            if report.sample_uid != sample_uid {
                anyhow::bail!(
                    "report {} belongs to sample {}, not {sample_uid}",
                    path.display(),
                    report.sample_uid
                );
            }
            Ok(report.failed().into_iter().cloned().collect())
        }
        FailedActionSource::Apply(report) => Ok(report.failed),
        FailedActionSource::List(failed) => Ok(failed),
    }
}

/// Re-runs the failed actions of an earlier report against a sample file and
/// writes whatever landed back to it.
pub(super) fn retry_sample_file(
    engine: &ReflexEngine,
    sample_path: &Path,
    failed_path: &Path,
) -> Result<ApplyReport> {
    let sample = SampleFile::load(sample_path)?;
    let failed = load_failed_actions(failed_path, sample.sample_uid())?;
    if failed.is_empty() {
        return Ok(ApplyReport::default());
    }
    let outcome = engine.retry_failed(sample.sample_uid(), sample.store(), &failed);
    sample.save()?;
    Ok(outcome?)
}
