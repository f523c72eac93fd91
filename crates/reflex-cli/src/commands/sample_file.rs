use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use reflex_core::InMemorySampleStore;
use reflex_core::models::SampleRecord;

/// A sample record kept in a JSON file, loaded into an in-memory store for
/// one command and written back afterwards.
pub(super) struct SampleFile {
    path: PathBuf,
    sample_uid: String,
    store: InMemorySampleStore,
}

impl SampleFile {
    pub(super) fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read sample {}", path.display()))?;
        let record = serde_json::from_str::<SampleRecord>(&raw)
            .with_context(|| format!("invalid sample record {}", path.display()))?;
        if record.sample_uid.trim().is_empty() {
            anyhow::bail!("sample record {} has an empty sample_uid", path.display());
        }
        Ok(Self {
            path: path.to_path_buf(),
            sample_uid: record.sample_uid.clone(),
            store: InMemorySampleStore::from_records([record]),
        })
    }

    pub(super) fn sample_uid(&self) -> &str {
        &self.sample_uid
    }

    pub(super) const fn store(&self) -> &InMemorySampleStore {
        &self.store
    }

    /// Replaces the file through a sibling temp file.
    pub(super) fn save(&self) -> Result<()> {
        let record = self.store.record(&self.sample_uid)?;
        let mut raw = serde_json::to_string_pretty(&record)?;
        raw.push('\n');

        let mut tmp_name = self.path.as_os_str().to_os_string();
        tmp_name.push(".tmp");
        let tmp = PathBuf::from(tmp_name);
        fs::write(&tmp, raw).with_context(|| format!("failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("failed to replace sample {}", self.path.display()))?;
        Ok(())
    }
}
