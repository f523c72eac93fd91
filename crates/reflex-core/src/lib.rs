// Public fallible APIs in this crate share one concrete error contract (`ReflexError`).
// Repeating per-function `# Errors` boilerplate obscures behavior more than it clarifies.
#![allow(
    clippy::missing_errors_doc,
    reason = "crate-wide fallible API uses one explicit error type; per-item boilerplate would duplicate contract"
)]

pub mod apply;
pub mod catalog;
pub mod client;
pub mod compile;
pub mod config;
pub mod error;
pub mod evaluate;
pub mod graph;
pub(crate) mod jsonl;
pub mod memory;
pub mod models;
pub mod repository;
pub mod runner;
pub mod state;
pub mod validate;

pub use apply::{ActionApplier, AnalysisStore, AppliedDecisionLedger, InMemoryDecisionLedger};
pub use catalog::{AnalysisCatalog, AnalysisInfo, StaticAnalysisCatalog};
pub use client::{ReflexEngine, RuleDraft, SavedRule};
pub use compile::compile;
pub use config::EngineConfig;
pub use error::{ReflexError, Result};
pub use evaluate::{
    EvaluationOptions, SampleResultProvider, TriggerMatchPolicy, evaluate, evaluate_level,
    evaluate_with,
};
pub use graph::{GraphFormat, ReflexGraph, export_graph, parse_graph, read_graph_file};
pub use memory::{InMemoryRuleRepository, InMemorySampleStore};
pub use repository::RuleRepository;
pub use runner::{RunOptions, run_reflex_pass};
pub use state::SqliteReflexStore;
pub use validate::{lint_triggers, validate_with_catalog};
