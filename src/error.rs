use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV read failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Column '{column}' appears more than once after header cleanup")]
    DuplicateColumn { column: String },

    #[error("Transform engine failed: {message}")]
    Transform { message: String },

    #[error("Reconciliation failed: {message}")]
    Reconciliation { message: String },
}

/// Coarse failure taxonomy used for logs and metrics labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The deployment is wrong: bad config, missing columns, bad identifiers.
    Configuration,
    /// Something the run depends on failed: filesystem, database, dbt.
    Upstream,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Upstream => "upstream",
        }
    }
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Config(_)
            | PipelineError::Toml(_)
            | PipelineError::MissingColumn(_)
            | PipelineError::DuplicateColumn { .. } => ErrorKind::Configuration,
            PipelineError::Io(_)
            | PipelineError::Csv(_)
            | PipelineError::Database(_)
            | PipelineError::Http(_)
            | PipelineError::Transform { .. }
            | PipelineError::Reconciliation { .. } => ErrorKind::Upstream,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
