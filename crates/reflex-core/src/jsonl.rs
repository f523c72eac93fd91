use serde::de::DeserializeOwned;

use crate::error::ReflexError;

#[derive(Debug, Clone)]
pub struct JsonlParseOutcome<T> {
    pub items: Vec<T>,
    pub skipped_lines: usize,
    pub first_error: Option<(usize, String)>,
}

impl<T> JsonlParseOutcome<T> {
    /// Every non-blank line failed to parse.
    #[must_use]
    pub fn all_invalid(&self) -> bool {
        self.items.is_empty() && self.skipped_lines > 0
    }

    pub fn into_error(self, label: &str, path: Option<&str>) -> ReflexError {
        let location = path
            .filter(|value| !value.is_empty())
            .map(|value| format!(" ({value})"))
            .unwrap_or_default();
        match self.first_error {
            Some((line_no, message)) => ReflexError::Validation(format!(
                "{label} parse failed{location}: skipped {} invalid lines (first at line {line_no}: {message})",
                self.skipped_lines
            )),
            None => ReflexError::Validation(format!(
                "{label} parse failed{location}: skipped {} invalid lines",
                self.skipped_lines
            )),
        }
    }
}

/// Parses one JSON value per line, skipping blank and malformed lines.
pub fn parse_jsonl_tolerant<T>(raw: &str) -> JsonlParseOutcome<T>
where
    T: DeserializeOwned,
{
    let mut items = Vec::new();
    let mut skipped_lines = 0usize;
    let mut first_error = None::<(usize, String)>;

    for (line_no, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<T>(line) {
            Ok(value) => items.push(value),
            Err(err) => {
                skipped_lines += 1;
                if first_error.is_none() {
                    first_error = Some((line_no + 1, err.to_string()));
                }
            }
        }
    }

    JsonlParseOutcome {
        items,
        skipped_lines,
        first_error,
    }
}
