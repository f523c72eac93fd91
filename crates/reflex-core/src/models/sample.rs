use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ReflexError, Result};

use super::hierarchy::ResultValue;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    #[default]
    Pending,
    Resulted,
    Finalized,
}

/// One analysis instance on a sample, as owned by the external LIMS store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Analysis {
    pub uid: String,
    pub sample_uid: String,
    pub analysis_uid: String,
    #[serde(default)]
    pub result: Option<ResultValue>,
    #[serde(default)]
    pub status: AnalysisStatus,
    /// Locked results cannot be changed through normal result entry.
    #[serde(default)]
    pub locked: bool,
}

/// Read-only snapshot of a sample's analyses and their current results.
///
/// A key with a `None` value is an analysis that is present on the sample but
/// has no result yet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SampleResultView {
    pub sample_uid: String,
    pub sample_type_uid: String,
    #[serde(default)]
    pub results: BTreeMap<String, Option<ResultValue>>,
}

impl SampleResultView {
    #[must_use]
    pub fn new(sample_uid: impl Into<String>, sample_type_uid: impl Into<String>) -> Self {
        Self {
            sample_uid: sample_uid.into(),
            sample_type_uid: sample_type_uid.into(),
            results: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_result(mut self, analysis_uid: &str, value: impl Into<ResultValue>) -> Self {
        self.results
            .insert(analysis_uid.to_string(), Some(value.into()));
        self
    }

    #[must_use]
    pub fn with_pending(mut self, analysis_uid: &str) -> Self {
        self.results.entry(analysis_uid.to_string()).or_insert(None);
        self
    }

    /// Builds the snapshot from the sample's analyses, given oldest first.
    /// When an analysis type occurs several times the newest instance is the
    /// current one, so a pending retest hides the result it repeats.
    #[must_use]
    pub fn from_analyses(
        sample_uid: impl Into<String>,
        sample_type_uid: impl Into<String>,
        analyses: &[Analysis],
    ) -> Self {
        let mut view = Self::new(sample_uid, sample_type_uid);
        for analysis in analyses {
            view.results
                .insert(analysis.analysis_uid.clone(), analysis.result.clone());
        }
        view
    }

    #[must_use]
    pub fn has_analysis(&self, analysis_uid: &str) -> bool {
        self.results.contains_key(analysis_uid)
    }

    #[must_use]
    pub fn result(&self, analysis_uid: &str) -> Option<&ResultValue> {
        self.results.get(analysis_uid).and_then(Option::as_ref)
    }
}

/// A sample and its analyses, as kept by simple stores that own the data
/// themselves (in-memory, JSON file).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SampleRecord {
    pub sample_uid: String,
    pub sample_type_uid: String,
    #[serde(default)]
    pub analyses: Vec<Analysis>,
    /// When set, only these analysis types may be ordered on the sample.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orderable: Option<Vec<String>>,
}

impl SampleRecord {
    #[must_use]
    pub fn new(sample_uid: impl Into<String>, sample_type_uid: impl Into<String>) -> Self {
        Self {
            sample_uid: sample_uid.into(),
            sample_type_uid: sample_type_uid.into(),
            analyses: Vec::new(),
            orderable: None,
        }
    }

    #[must_use]
    pub fn view(&self) -> SampleResultView {
        SampleResultView::from_analyses(
            self.sample_uid.clone(),
            self.sample_type_uid.clone(),
            &self.analyses,
        )
    }

    pub fn add_pending(&mut self, analysis_uid: &str, count: u32) -> Result<Vec<Analysis>> {
        let analysis_uid = analysis_uid.trim();
        if analysis_uid.is_empty() || count == 0 {
            return Err(ReflexError::Validation(format!(
                "cannot order {count} x '{analysis_uid}' on sample {}",
                self.sample_uid
            )));
        }
        if let Some(orderable) = &self.orderable
            && !orderable.iter().any(|allowed| allowed == analysis_uid)
        {
            return Err(ReflexError::Analysis(format!(
                "analysis '{analysis_uid}' is not orderable on sample {}",
                self.sample_uid
            )));
        }

        let created = (0..count)
            .map(|_| Analysis {
                uid: Uuid::new_v4().to_string(),
                sample_uid: self.sample_uid.clone(),
                analysis_uid: analysis_uid.to_string(),
                result: None,
                status: AnalysisStatus::Pending,
                locked: false,
            })
            .collect::<Vec<_>>();
        self.analyses.extend(created.iter().cloned());
        Ok(created)
    }

    /// Enters a result through the normal path. Locked analyses are refused;
    /// an analysis type not yet on the sample is added first.
    pub fn record_result(&mut self, analysis_uid: &str, value: ResultValue) -> Result<Analysis> {
        let index = match self.last_unlocked(analysis_uid) {
            Some(index) => index,
            None if self.has_instance(analysis_uid) => {
                return Err(ReflexError::Conflict(format!(
                    "analysis '{analysis_uid}' on sample {} is locked",
                    self.sample_uid
                )));
            }
            None => {
                self.analyses.push(Analysis {
                    uid: Uuid::new_v4().to_string(),
                    sample_uid: self.sample_uid.clone(),
                    analysis_uid: analysis_uid.to_string(),
                    result: None,
                    status: AnalysisStatus::Pending,
                    locked: false,
                });
                self.analyses.len() - 1
            }
        };
        let analysis = &mut self.analyses[index];
        analysis.result = Some(value);
        analysis.status = AnalysisStatus::Resulted;
        Ok(analysis.clone())
    }

    /// Force-sets and locks a result. Finalizing an already locked analysis
    /// to the same value succeeds without change.
    pub fn finalize(&mut self, analysis_uid: &str, value: &ResultValue) -> Result<Analysis> {
        if let Some(index) = self.last_unlocked(analysis_uid) {
            let analysis = &mut self.analyses[index];
            analysis.result = Some(value.clone());
            analysis.status = AnalysisStatus::Finalized;
            analysis.locked = true;
            return Ok(analysis.clone());
        }
        if let Some(existing) = self.analyses.iter().rev().find(|analysis| {
            analysis.analysis_uid == analysis_uid && analysis.result.as_ref() == Some(value)
        }) {
            return Ok(existing.clone());
        }
        if self.has_instance(analysis_uid) {
            return Err(ReflexError::Conflict(format!(
                "analysis '{analysis_uid}' on sample {} is already finalized with another value",
                self.sample_uid
            )));
        }
        Err(ReflexError::NotFound(format!(
            "analysis '{analysis_uid}' is not on sample {}",
            self.sample_uid
        )))
    }

    fn has_instance(&self, analysis_uid: &str) -> bool {
        self.analyses
            .iter()
            .any(|analysis| analysis.analysis_uid == analysis_uid)
    }

    fn last_unlocked(&self, analysis_uid: &str) -> Option<usize> {
        self.analyses
            .iter()
            .rposition(|analysis| analysis.analysis_uid == analysis_uid && !analysis.locked)
    }
}
