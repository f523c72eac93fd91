use std::io::Write;
use std::time::Instant;

use chrono::Utc;

use crate::error::{ReflexError, Result};
use crate::jsonl::parse_jsonl_tolerant;
use crate::models::RequestLogEntry;

use super::ReflexEngine;

impl ReflexEngine {
    pub(super) fn try_log_request(&self, entry: &RequestLogEntry) {
        if !self.config.request_log {
            return;
        }
        let Some(path) = self.request_log_path.as_deref() else {
            return;
        };
        if let Some(parent) = path.parent()
            && std::fs::create_dir_all(parent).is_err()
        {
            return;
        }
        if let Ok(serialized) = serde_json::to_string(entry)
            && let Ok(mut file) = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
        {
            let mut line = serialized;
            line.push('\n');
            let _ = file.write_all(line.as_bytes());
        }
    }

    pub(super) fn log_request_status(
        &self,
        request_id: String,
        operation: &str,
        status: &str,
        started: Instant,
        target_uid: Option<String>,
        details: Option<serde_json::Value>,
    ) {
        self.try_log_request(&RequestLogEntry {
            request_id,
            operation: operation.to_string(),
            status: status.to_string(),
            latency_ms: started.elapsed().as_millis(),
            created_at: Utc::now().to_rfc3339(),
            target_uid,
            error_code: None,
            error_message: None,
            details,
        });
    }

    pub(super) fn log_request_error(
        &self,
        request_id: String,
        operation: &str,
        started: Instant,
        target_uid: Option<String>,
        err: &ReflexError,
        details: Option<serde_json::Value>,
    ) {
        self.try_log_request(&RequestLogEntry {
            request_id,
            operation: operation.to_string(),
            status: "error".to_string(),
            latency_ms: started.elapsed().as_millis(),
            created_at: Utc::now().to_rfc3339(),
            target_uid,
            error_code: Some(err.code().to_string()),
            error_message: Some(err.to_string()),
            details,
        });
    }

    /// Logs `ok`/`warning` through `describe` on success and the error code
    /// otherwise.
    pub(super) fn log_outcome<T>(
        &self,
        request_id: String,
        operation: &str,
        started: Instant,
        target_uid: Option<String>,
        output: &Result<T>,
        describe: impl FnOnce(&T) -> (&'static str, Option<serde_json::Value>),
    ) {
        match output {
            Ok(value) => {
                let (status, details) = describe(value);
                self.log_request_status(
                    request_id, operation, status, started, target_uid, details,
                );
            }
            Err(err) => {
                self.log_request_error(request_id, operation, started, target_uid, err, None);
            }
        }
    }

    /// Newest entries first; at most `limit` (at least one).
    pub fn list_request_logs(&self, limit: usize) -> Result<Vec<RequestLogEntry>> {
        let Some(path) = self.request_log_path.as_deref() else {
            return Ok(Vec::new());
        };
        if !path.exists() {
            return Ok(Vec::new());
        }
        let raw = std::fs::read_to_string(path)?;
        let parsed = parse_jsonl_tolerant::<RequestLogEntry>(&raw);
        if parsed.all_invalid() {
            let location = path.display().to_string();
            return Err(parsed.into_error("request log", Some(&location)));
        }

        let mut entries = parsed.items;
        entries.reverse();
        entries.truncate(limit.max(1));
        Ok(entries)
    }
}
