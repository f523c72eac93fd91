use crate::apply::ActionApplier;
use crate::error::Result;
use crate::evaluate::{EvaluationOptions, SampleResultProvider, evaluate_level, trigger_levels};
use crate::models::{ApplyReport, LevelRunOutcome, ReflexRunReport, ReflexTrigger};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub evaluation: EvaluationOptions,
    pub max_level_passes: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            evaluation: EvaluationOptions::default(),
            max_level_passes: 16,
        }
    }
}

/// One level-staged reflex pass over a sample.
///
/// Levels run in ascending order. Before each level the sample snapshot is
/// fetched again, so analyses added or finalized by a lower level are visible
/// to the rules of every higher level.
pub fn run_reflex_pass(
    triggers: &[ReflexTrigger],
    sample_uid: &str,
    provider: &dyn SampleResultProvider,
    applier: &ActionApplier<'_>,
    options: RunOptions,
) -> Result<ReflexRunReport> {
    let levels = trigger_levels(triggers);
    let budget = options.max_level_passes.max(1);
    let mut report = ReflexRunReport {
        sample_uid: sample_uid.to_string(),
        levels: Vec::new(),
        truncated: levels.len() > budget,
    };

    for level in levels.into_iter().take(budget) {
        let view = provider.sample_view(sample_uid)?;
        let fired = evaluate_level(triggers, level, &view, options.evaluation);
        let applied = if fired.is_empty() {
            ApplyReport::default()
        } else {
            applier.apply(sample_uid, &fired)?
        };
        report.levels.push(LevelRunOutcome {
            level,
            fired,
            report: applied,
        });
    }
    Ok(report)
}
