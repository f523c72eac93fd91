use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::apply::AnalysisStore;
use crate::error::{ReflexError, Result};
use crate::evaluate::SampleResultProvider;
use crate::models::{Analysis, ReflexRule, ResultValue, SampleRecord, SampleResultView};
use crate::repository::RuleRepository;

/// Sample store held entirely in memory. Used by tests and embedders that
/// keep samples in process.
#[derive(Debug, Default)]
pub struct InMemorySampleStore {
    samples: Mutex<BTreeMap<String, SampleRecord>>,
}

impl InMemorySampleStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_records(records: impl IntoIterator<Item = SampleRecord>) -> Self {
        let samples = records
            .into_iter()
            .map(|record| (record.sample_uid.clone(), record))
            .collect();
        Self {
            samples: Mutex::new(samples),
        }
    }

    pub fn insert_sample(&self, sample_uid: &str, sample_type_uid: &str) {
        if let Ok(mut samples) = self.samples.lock() {
            samples
                .entry(sample_uid.to_string())
                .or_insert_with(|| SampleRecord::new(sample_uid, sample_type_uid));
        }
    }

    /// Limits which analysis types may be ordered on the sample.
    pub fn restrict_orderable(&self, sample_uid: &str, analysis_uids: &[&str]) {
        if let Ok(mut samples) = self.samples.lock()
            && let Some(record) = samples.get_mut(sample_uid)
        {
            record.orderable = Some(analysis_uids.iter().map(ToString::to_string).collect());
        }
    }

    pub fn record_result(
        &self,
        sample_uid: &str,
        analysis_uid: &str,
        value: ResultValue,
    ) -> Result<Analysis> {
        self.with_record(sample_uid, |record| record.record_result(analysis_uid, value))
    }

    pub fn snapshot(&self, sample_uid: &str) -> Result<SampleResultView> {
        self.with_record(sample_uid, |record| Ok(record.view()))
    }

    pub fn analyses(&self, sample_uid: &str) -> Result<Vec<Analysis>> {
        self.with_record(sample_uid, |record| Ok(record.analyses.clone()))
    }

    pub fn record(&self, sample_uid: &str) -> Result<SampleRecord> {
        self.with_record(sample_uid, |record| Ok(record.clone()))
    }

    fn with_record<T>(
        &self,
        sample_uid: &str,
        f: impl FnOnce(&mut SampleRecord) -> Result<T>,
    ) -> Result<T> {
        let mut samples = self
            .samples
            .lock()
            .map_err(|_| ReflexError::mutex_poisoned("sample store"))?;
        let record = samples
            .get_mut(sample_uid)
            .ok_or_else(|| ReflexError::NotFound(format!("sample {sample_uid}")))?;
        f(record)
    }
}

impl SampleResultProvider for InMemorySampleStore {
    fn sample_view(&self, sample_uid: &str) -> Result<SampleResultView> {
        self.snapshot(sample_uid)
    }
}

impl AnalysisStore for InMemorySampleStore {
    fn create_analyses(
        &self,
        sample_uid: &str,
        analysis_uid: &str,
        count: u32,
    ) -> Result<Vec<Analysis>> {
        self.with_record(sample_uid, |record| record.add_pending(analysis_uid, count))
    }

    fn finalize_analysis(
        &self,
        sample_uid: &str,
        analysis_uid: &str,
        value: &ResultValue,
    ) -> Result<Analysis> {
        self.with_record(sample_uid, |record| record.finalize(analysis_uid, value))
    }
}

#[derive(Debug, Default)]
pub struct InMemoryRuleRepository {
    rules: Mutex<BTreeMap<String, ReflexRule>>,
}

impl InMemoryRuleRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, ReflexRule>>> {
        self.rules
            .lock()
            .map_err(|_| ReflexError::mutex_poisoned("rule repository"))
    }
}

impl RuleRepository for InMemoryRuleRepository {
    fn load(&self, uid: &str) -> Result<Option<ReflexRule>> {
        Ok(self.lock()?.get(uid).cloned())
    }

    fn save(&self, rule: &ReflexRule) -> Result<()> {
        self.lock()?.insert(rule.uid.clone(), rule.clone());
        Ok(())
    }

    fn delete(&self, uid: &str) -> Result<bool> {
        Ok(self.lock()?.remove(uid).is_some())
    }

    fn list(&self) -> Result<Vec<ReflexRule>> {
        Ok(self.lock()?.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_sample_is_not_found() {
        let store = InMemorySampleStore::new();
        let err = store.sample_view("missing").expect_err("missing sample");
        assert_eq!(err.code(), "NOT_FOUND");
        assert!(store.create_analyses("missing", "VL", 1).is_err());
    }

    #[test]
    fn created_analyses_show_up_as_pending_in_the_view() {
        let store = InMemorySampleStore::new();
        store.insert_sample("S-1", "serum");
        store
            .record_result("S-1", "CD4", ResultValue::from(320))
            .expect("seed");
        store.create_analyses("S-1", "VL", 1).expect("order");

        let view = store.sample_view("S-1").expect("view");
        assert_eq!(view.sample_type_uid, "serum");
        assert_eq!(view.result("CD4"), Some(&ResultValue::Number(320.0)));
        assert!(view.has_analysis("VL"));
        assert!(view.result("VL").is_none());
    }

    #[test]
    fn rule_repository_replaces_by_uid() {
        let repo = InMemoryRuleRepository::new();
        let mut rule = ReflexRule {
            uid: "r1".to_string(),
            name: "CD4".to_string(),
            ..ReflexRule::default()
        };
        repo.save(&rule).expect("save");
        rule.name = "CD4 follow-up".to_string();
        repo.save(&rule).expect("save again");

        let listed = repo.list().expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "CD4 follow-up");
        assert!(repo.delete("r1").expect("delete"));
        assert!(!repo.delete("r1").expect("delete again"));
        assert!(repo.load("r1").expect("load").is_none());
    }
}
