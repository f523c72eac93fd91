use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Display metadata for an analysis type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnalysisInfo {
    pub name: String,
    #[serde(default)]
    pub result_options: Vec<String>,
}

impl AnalysisInfo {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            result_options: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: &[&str]) -> Self {
        self.result_options = options.iter().map(ToString::to_string).collect();
        self
    }
}

/// Resolves analysis uids to display metadata. Evaluation never consults it.
pub trait AnalysisCatalog {
    fn resolve(&self, analysis_uid: &str) -> Option<AnalysisInfo>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaticAnalysisCatalog {
    entries: BTreeMap<String, AnalysisInfo>,
}

impl StaticAnalysisCatalog {
    pub fn insert(&mut self, analysis_uid: &str, info: AnalysisInfo) {
        self.entries.insert(analysis_uid.to_string(), info);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl AnalysisCatalog for StaticAnalysisCatalog {
    fn resolve(&self, analysis_uid: &str) -> Option<AnalysisInfo> {
        self.entries.get(analysis_uid).cloned()
    }
}
