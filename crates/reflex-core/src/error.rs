use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReflexError>;

#[derive(Debug, Error)]
pub enum ReflexError {
    #[error("graph node has more than one incoming edge: {0}")]
    MultiParent(String),

    #[error("graph edge references an unknown node: {0}")]
    DanglingEdge(String),

    #[error("duplicate graph node id: {0}")]
    DuplicateNode(String),

    #[error("unsupported graph edge: {0}")]
    InvalidEdge(String),

    #[error("graph parse failed: {0}")]
    GraphParse(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("publish blocked: {0}")]
    PublishBlocked(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("analysis store call failed: {0}")]
    Analysis(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ReflexError {
    #[must_use]
    pub fn mutex_poisoned(what: &str) -> Self {
        Self::Internal(format!("{what} mutex poisoned"))
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::MultiParent(_) => "MULTI_PARENT",
            Self::DanglingEdge(_) => "DANGLING_EDGE",
            Self::DuplicateNode(_) => "DUPLICATE_NODE",
            Self::InvalidEdge(_) => "INVALID_EDGE",
            Self::GraphParse(_) => "GRAPH_PARSE_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::PublishBlocked(_) => "PUBLISH_BLOCKED",
            Self::Validation(_) => "VALIDATION_FAILED",
            Self::Analysis(_) => "ANALYSIS_STORE_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::Sqlite(_) => "SQLITE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Malformed-graph errors abort compilation and produce no tree.
    #[must_use]
    pub const fn is_compile_error(&self) -> bool {
        matches!(
            self,
            Self::MultiParent(_)
                | Self::DanglingEdge(_)
                | Self::DuplicateNode(_)
                | Self::InvalidEdge(_)
        )
    }
}
