use std::time::Instant;

use serde_json::json;

use crate::apply::{ActionApplier, AnalysisStore};
use crate::error::Result;
use crate::evaluate::{SampleResultProvider, evaluate_with};
use crate::models::{ApplyReport, FailedAction, FiredDecision, ReflexRunReport};
use crate::runner::{RunOptions, run_reflex_pass};

use super::ReflexEngine;

impl ReflexEngine {
    /// Side-effect-free preview: every level evaluated against one snapshot.
    pub fn evaluate_sample(
        &self,
        sample_uid: &str,
        provider: &dyn SampleResultProvider,
    ) -> Result<Vec<FiredDecision>> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let started = Instant::now();
        let output = self.active_triggers().and_then(|triggers| {
            let view = provider.sample_view(sample_uid)?;
            Ok(evaluate_with(&triggers, &view, self.config.evaluation()))
        });
        self.log_outcome(
            request_id,
            "reflex.evaluate",
            started,
            Some(sample_uid.to_string()),
            &output,
            |fired| ("ok", Some(json!({ "fired": fired.len() }))),
        );
        output
    }

    /// Level-staged evaluation and application for one sample. A second pass
    /// on the same sample is refused with `Conflict` while one is running.
    pub fn run_sample(
        &self,
        sample_uid: &str,
        provider: &dyn SampleResultProvider,
        store: &dyn AnalysisStore,
    ) -> Result<ReflexRunReport> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let started = Instant::now();

        let output = (|| -> Result<ReflexRunReport> {
            let _guard = self.claim_sample(sample_uid)?;
            let triggers = self.active_triggers()?;
            let applier = ActionApplier::new(store, self.ledger.as_ref());
            run_reflex_pass(
                &triggers,
                sample_uid,
                provider,
                &applier,
                RunOptions {
                    evaluation: self.config.evaluation(),
                    max_level_passes: self.config.max_level_passes,
                },
            )
        })();

        self.log_outcome(
            request_id,
            "reflex.run",
            started,
            Some(sample_uid.to_string()),
            &output,
            |report| {
                let failed = report.failed().len();
                let status = if failed > 0 || report.truncated {
                    "warning"
                } else {
                    "ok"
                };
                (
                    status,
                    Some(json!({
                        "levels": report.levels.len(),
                        "fired": report.fired_count(),
                        "applied": report.applied_count(),
                        "failed": failed,
                        "truncated": report.truncated,
                    })),
                )
            },
        );
        output
    }

    /// Re-runs exactly the given failed actions.
    pub fn retry_failed(
        &self,
        sample_uid: &str,
        store: &dyn AnalysisStore,
        failed: &[FailedAction],
    ) -> Result<ApplyReport> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let started = Instant::now();

        let output = self.claim_sample(sample_uid).map(|_guard| {
            ActionApplier::new(store, self.ledger.as_ref()).retry_failed(sample_uid, failed)
        });

        self.log_outcome(
            request_id,
            "reflex.retry",
            started,
            Some(sample_uid.to_string()),
            &output,
            |report| {
                (
                    if report.failed.is_empty() { "ok" } else { "warning" },
                    Some(json!({
                        "applied": report.applied.len(),
                        "failed": report.failed.len(),
                    })),
                )
            },
        );
        output
    }
}
