use serde::{Deserialize, Serialize};

use super::hierarchy::{AddAnalysisAction, FinalizeAnalysisAction, ReflexTrigger};
use super::sample::Analysis;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationIssue {
    pub severity: IssueSeverity,
    pub code: String,
    pub subject_uid: String,
    pub message: String,
}

impl ValidationIssue {
    #[must_use]
    pub fn error(code: &str, subject_uid: &str, message: impl Into<String>) -> Self {
        Self {
            severity: IssueSeverity::Error,
            code: code.to_string(),
            subject_uid: subject_uid.to_string(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn warning(code: &str, subject_uid: &str, message: impl Into<String>) -> Self {
        Self {
            severity: IssueSeverity::Warning,
            code: code.to_string(),
            subject_uid: subject_uid.to_string(),
            message: message.into(),
        }
    }
}

/// Advisory linter output. It never blocks compilation; it only gates
/// publishing a rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ValidationReport {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn push(&mut self, issue: ValidationIssue) {
        match issue.severity {
            IssueSeverity::Error => self.errors.push(issue),
            IssueSeverity::Warning => self.warnings.push(issue),
        }
    }

    pub fn extend(&mut self, other: Self) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }

    #[must_use]
    pub fn is_publishable(&self, strict: bool) -> bool {
        self.errors.is_empty() && (!strict || self.warnings.is_empty())
    }

    #[must_use]
    pub fn has_code(&self, code: &str) -> bool {
        self.errors
            .iter()
            .chain(self.warnings.iter())
            .any(|issue| issue.code == code)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CompileOutput {
    pub triggers: Vec<ReflexTrigger>,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl CompileOutput {
    #[must_use]
    pub fn report(&self) -> ValidationReport {
        ValidationReport {
            errors: self.errors.clone(),
            warnings: self.warnings.clone(),
        }
    }
}

/// One decision that matched during evaluation, with the actions it asks for.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FiredDecision {
    /// Owning rule; empty when the triggers were evaluated outside an engine.
    #[serde(default)]
    pub rule_uid: String,
    pub trigger_uid: String,
    pub level: u32,
    pub decision_uid: String,
    pub add_actions: Vec<AddAnalysisAction>,
    pub finalize_actions: Vec<FinalizeAnalysisAction>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action_type", rename_all = "snake_case")]
pub enum ReflexAction {
    Add(AddAnalysisAction),
    Finalize(FinalizeAnalysisAction),
}

impl ReflexAction {
    #[must_use]
    pub fn uid(&self) -> &str {
        match self {
            Self::Add(action) => &action.uid,
            Self::Finalize(action) => &action.uid,
        }
    }

    #[must_use]
    pub fn analysis_uid(&self) -> &str {
        match self {
            Self::Add(action) => &action.analysis_uid,
            Self::Finalize(action) => &action.analysis_uid,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppliedAction {
    #[serde(default)]
    pub rule_uid: String,
    pub decision_uid: String,
    pub action: ReflexAction,
    pub analyses: Vec<Analysis>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FailedAction {
    #[serde(default)]
    pub rule_uid: String,
    pub decision_uid: String,
    pub action: ReflexAction,
    pub error_code: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ApplyReport {
    pub applied: Vec<AppliedAction>,
    pub failed: Vec<FailedAction>,
    /// Decisions already applied to this sample earlier; nothing was done.
    #[serde(default)]
    pub skipped_decisions: Vec<String>,
}

impl ApplyReport {
    pub fn extend(&mut self, other: Self) {
        self.applied.extend(other.applied);
        self.failed.extend(other.failed);
        self.skipped_decisions.extend(other.skipped_decisions);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LevelRunOutcome {
    pub level: u32,
    pub fired: Vec<FiredDecision>,
    pub report: ApplyReport,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ReflexRunReport {
    pub sample_uid: String,
    pub levels: Vec<LevelRunOutcome>,
    /// Set when distinct levels remained after the configured pass limit.
    #[serde(default)]
    pub truncated: bool,
}

impl ReflexRunReport {
    #[must_use]
    pub fn fired_count(&self) -> usize {
        self.levels.iter().map(|level| level.fired.len()).sum()
    }

    #[must_use]
    pub fn applied_count(&self) -> usize {
        self.levels.iter().map(|level| level.report.applied.len()).sum()
    }

    #[must_use]
    pub fn failed(&self) -> Vec<&FailedAction> {
        self.levels
            .iter()
            .flat_map(|level| level.report.failed.iter())
            .collect()
    }
}
