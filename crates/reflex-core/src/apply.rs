use std::collections::HashSet;
use std::sync::Mutex;

use crate::error::{ReflexError, Result};
use crate::models::{
    Analysis, AppliedAction, ApplyReport, FailedAction, FiredDecision, ReflexAction, ResultValue,
};

/// External sample/analysis store that reflex actions are handed off to.
pub trait AnalysisStore {
    fn create_analyses(
        &self,
        sample_uid: &str,
        analysis_uid: &str,
        count: u32,
    ) -> Result<Vec<Analysis>>;

    fn finalize_analysis(
        &self,
        sample_uid: &str,
        analysis_uid: &str,
        value: &ResultValue,
    ) -> Result<Analysis>;
}

/// Remembers which decisions were already applied to which sample. A
/// decision is identified by its owning rule and its uid within that rule.
pub trait AppliedDecisionLedger: Send + Sync {
    fn is_applied(&self, sample_uid: &str, rule_uid: &str, decision_uid: &str) -> Result<bool>;
    fn record_applied(&self, sample_uid: &str, rule_uid: &str, decision_uid: &str) -> Result<()>;
}

type LedgerKey = (String, String, String);

fn ledger_key(sample_uid: &str, rule_uid: &str, decision_uid: &str) -> LedgerKey {
    (
        sample_uid.to_string(),
        rule_uid.to_string(),
        decision_uid.to_string(),
    )
}

#[derive(Debug, Default)]
pub struct InMemoryDecisionLedger {
    applied: Mutex<HashSet<LedgerKey>>,
}

impl InMemoryDecisionLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl AppliedDecisionLedger for InMemoryDecisionLedger {
    fn is_applied(&self, sample_uid: &str, rule_uid: &str, decision_uid: &str) -> Result<bool> {
        let applied = self
            .applied
            .lock()
            .map_err(|_| ReflexError::mutex_poisoned("decision ledger"))?;
        Ok(applied.contains(&ledger_key(sample_uid, rule_uid, decision_uid)))
    }

    fn record_applied(&self, sample_uid: &str, rule_uid: &str, decision_uid: &str) -> Result<()> {
        let mut applied = self
            .applied
            .lock()
            .map_err(|_| ReflexError::mutex_poisoned("decision ledger"))?;
        applied.insert(ledger_key(sample_uid, rule_uid, decision_uid));
        Ok(())
    }
}

/// Turns fired decisions into store calls.
///
/// Store failures are collected per action and never stop the batch. A
/// decision is recorded in the ledger once all of its actions have been
/// attempted, so re-applying it is a no-op; failed actions are retried
/// through [`ActionApplier::retry_failed`].
pub struct ActionApplier<'a> {
    store: &'a dyn AnalysisStore,
    ledger: &'a dyn AppliedDecisionLedger,
}

impl<'a> ActionApplier<'a> {
    #[must_use]
    pub fn new(store: &'a dyn AnalysisStore, ledger: &'a dyn AppliedDecisionLedger) -> Self {
        Self { store, ledger }
    }

    /// Ledger errors abort; store errors are reported per action.
    pub fn apply(&self, sample_uid: &str, fired: &[FiredDecision]) -> Result<ApplyReport> {
        let mut report = ApplyReport::default();
        for decision in fired {
            if self
                .ledger
                .is_applied(sample_uid, &decision.rule_uid, &decision.decision_uid)?
            {
                report.skipped_decisions.push(decision.decision_uid.clone());
                continue;
            }
            let actions = decision
                .add_actions
                .iter()
                .cloned()
                .map(ReflexAction::Add)
                .chain(
                    decision
                        .finalize_actions
                        .iter()
                        .cloned()
                        .map(ReflexAction::Finalize),
                );
            for action in actions {
                self.run_action(
                    sample_uid,
                    (decision.rule_uid.as_str(), decision.decision_uid.as_str()),
                    action,
                    &mut report,
                );
            }
            self.ledger
                .record_applied(sample_uid, &decision.rule_uid, &decision.decision_uid)?;
        }
        Ok(report)
    }

    /// Re-runs exactly the given failed actions without consulting the ledger.
    #[must_use]
    pub fn retry_failed(&self, sample_uid: &str, failed: &[FailedAction]) -> ApplyReport {
        let mut report = ApplyReport::default();
        for entry in failed {
            self.run_action(
                sample_uid,
                (entry.rule_uid.as_str(), entry.decision_uid.as_str()),
                entry.action.clone(),
                &mut report,
            );
        }
        report
    }

    fn run_action(
        &self,
        sample_uid: &str,
        (rule_uid, decision_uid): (&str, &str),
        action: ReflexAction,
        report: &mut ApplyReport,
    ) {
        let outcome = match &action {
            ReflexAction::Add(add) => {
                self.store
                    .create_analyses(sample_uid, &add.analysis_uid, add.count)
            }
            ReflexAction::Finalize(finalize) => self
                .store
                .finalize_analysis(sample_uid, &finalize.analysis_uid, &finalize.value)
                .map(|analysis| vec![analysis]),
        };
        match outcome {
            Ok(analyses) => report.applied.push(AppliedAction {
                rule_uid: rule_uid.to_string(),
                decision_uid: decision_uid.to_string(),
                action,
                analyses,
            }),
            Err(err) => report.failed.push(FailedAction {
                rule_uid: rule_uid.to_string(),
                decision_uid: decision_uid.to_string(),
                action,
                error_code: err.code().to_string(),
                message: err.to_string(),
            }),
        }
    }
}
