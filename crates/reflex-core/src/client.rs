use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::apply::{AppliedDecisionLedger, InMemoryDecisionLedger};
use crate::config::EngineConfig;
use crate::error::{ReflexError, Result};
use crate::memory::InMemoryRuleRepository;
use crate::repository::RuleRepository;
use crate::state::SqliteReflexStore;

mod reflex_service;
mod request_log_service;
mod rule_service;

pub use rule_service::{RuleDraft, SavedRule};

pub const STATE_DB_FILE_NAME: &str = "reflex.sqlite3";
pub const REQUEST_LOG_RELATIVE_PATH: &str = "logs/requests.jsonl";

/// Orchestrates compile → validate → persist → publish → evaluate → apply
/// over an injected rule repository and decision ledger.
#[derive(Clone)]
pub struct ReflexEngine {
    config: EngineConfig,
    rules: Arc<dyn RuleRepository>,
    ledger: Arc<dyn AppliedDecisionLedger>,
    request_log_path: Option<PathBuf>,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl std::fmt::Debug for ReflexEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReflexEngine")
            .field("config", &self.config)
            .field("request_log_path", &self.request_log_path)
            .finish_non_exhaustive()
    }
}

impl ReflexEngine {
    /// Opens (creating when needed) an engine rooted at `root_dir`: config
    /// from `reflex.toml`, rules and ledger in SQLite, request log under
    /// `logs/`.
    pub fn open(root_dir: impl Into<PathBuf>) -> Result<Self> {
        let root = root_dir.into();
        fs::create_dir_all(&root)?;
        let config = EngineConfig::load(&root)?;
        let store = SqliteReflexStore::open(root.join(STATE_DB_FILE_NAME))?;
        Ok(Self::with_backends(
            config,
            Arc::new(store.clone()),
            Arc::new(store),
            Some(root.join(REQUEST_LOG_RELATIVE_PATH)),
        ))
    }

    /// Engine with in-memory rules and ledger and no request log file.
    #[must_use]
    pub fn in_memory(config: EngineConfig) -> Self {
        Self::with_backends(
            config,
            Arc::new(InMemoryRuleRepository::new()),
            Arc::new(InMemoryDecisionLedger::new()),
            None,
        )
    }

    #[must_use]
    pub fn with_backends(
        config: EngineConfig,
        rules: Arc<dyn RuleRepository>,
        ledger: Arc<dyn AppliedDecisionLedger>,
        request_log_path: Option<PathBuf>,
    ) -> Self {
        Self {
            config,
            rules,
            ledger,
            request_log_path,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn request_log_path(&self) -> Option<&Path> {
        self.request_log_path.as_deref()
    }

    /// Marks a sample as having a reflex pass in flight until the guard drops.
    fn claim_sample(&self, sample_uid: &str) -> Result<InFlightGuard> {
        let mut in_flight = self
            .in_flight
            .lock()
            .map_err(|_| ReflexError::mutex_poisoned("in-flight samples"))?;
        if !in_flight.insert(sample_uid.to_string()) {
            return Err(ReflexError::Conflict(format!(
                "a reflex pass is already running for sample {sample_uid}"
            )));
        }
        Ok(InFlightGuard {
            in_flight: Arc::clone(&self.in_flight),
            sample_uid: sample_uid.to_string(),
        })
    }
}

struct InFlightGuard {
    in_flight: Arc<Mutex<HashSet<String>>>,
    sample_uid: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Ok(mut in_flight) = self.in_flight.lock() {
            in_flight.remove(&self.sample_uid);
        }
    }
}
