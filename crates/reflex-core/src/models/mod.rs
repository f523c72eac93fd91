mod hierarchy;
mod report;
mod sample;
mod trace;

pub use hierarchy::{
    AddAnalysisAction, CanvasPosition, FinalizeAnalysisAction, Operator, ReflexDecision,
    ReflexRule, ReflexTrigger, ResultValue, Rule, RuleGroup,
};
pub use report::{
    AppliedAction, ApplyReport, CompileOutput, FailedAction, FiredDecision, IssueSeverity,
    LevelRunOutcome, ReflexAction, ReflexRunReport, ValidationIssue, ValidationReport,
};
pub use sample::{Analysis, AnalysisStatus, SampleRecord, SampleResultView};
pub use trace::RequestLogEntry;
