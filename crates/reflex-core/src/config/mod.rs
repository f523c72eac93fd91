use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ReflexError, Result};
use crate::evaluate::{EvaluationOptions, TriggerMatchPolicy};

mod env;

use env::{parse_enabled_default_true, parse_env_bool, parse_usize_at_least, read_non_empty_env};

pub const CONFIG_FILE_NAME: &str = "reflex.toml";

const ENV_TRIGGER_MATCH: &str = "REFLEX_TRIGGER_MATCH";
const ENV_MAX_LEVEL_PASSES: &str = "REFLEX_MAX_LEVEL_PASSES";
const ENV_REQUEST_LOG: &str = "REFLEX_REQUEST_LOG";
const ENV_STRICT_PUBLISH: &str = "REFLEX_STRICT_PUBLISH";

const DEFAULT_MAX_LEVEL_PASSES: usize = 16;

/// Engine settings, read from `reflex.toml` under the engine root and then
/// overridden from `REFLEX_*` environment variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub trigger_match: TriggerMatchPolicy,
    /// Upper bound on distinct trigger levels processed in one reflex pass.
    pub max_level_passes: usize,
    pub request_log: bool,
    /// Warnings block publish as well as errors.
    pub strict_publish: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            trigger_match: TriggerMatchPolicy::All,
            max_level_passes: DEFAULT_MAX_LEVEL_PASSES,
            request_log: true,
            strict_publish: false,
        }
    }
}

impl EngineConfig {
    /// File values (when the file exists) plus process environment overrides.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(CONFIG_FILE_NAME);
        let base = if path.is_file() {
            let raw = std::fs::read_to_string(&path)?;
            Self::from_toml_str(&raw).map_err(|err| match err {
                ReflexError::Config(message) => {
                    ReflexError::Config(format!("{}: {message}", path.display()))
                }
                other => other,
            })?
        } else {
            Self::default()
        };
        Ok(base.with_env_overrides(read_non_empty_env))
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config = toml::from_str::<Self>(raw)
            .map_err(|err| ReflexError::Config(err.message().to_string()))?;
        if config.max_level_passes == 0 {
            return Err(ReflexError::Config(
                "max_level_passes must be at least 1".to_string(),
            ));
        }
        Ok(config)
    }

    /// Applies `REFLEX_*` overrides read through `lookup`. Values that do not
    /// parse leave the current setting in place.
    #[must_use]
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(policy) = lookup(ENV_TRIGGER_MATCH)
            .and_then(|raw| raw.parse::<TriggerMatchPolicy>().ok())
        {
            self.trigger_match = policy;
        }
        if let Some(passes) = parse_usize_at_least(lookup(ENV_MAX_LEVEL_PASSES).as_deref(), 1) {
            self.max_level_passes = passes;
        }
        if let Some(raw) = lookup(ENV_REQUEST_LOG) {
            self.request_log = parse_enabled_default_true(Some(&raw));
        }
        if let Some(raw) = lookup(ENV_STRICT_PUBLISH) {
            self.strict_publish = parse_env_bool(Some(&raw));
        }
        self
    }

    #[must_use]
    pub const fn evaluation(&self) -> EvaluationOptions {
        EvaluationOptions {
            trigger_match: self.trigger_match,
        }
    }
}
