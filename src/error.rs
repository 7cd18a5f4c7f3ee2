use thiserror::Error;

/// Errors raised by the allocator and its collaborators.
///
/// Constraint violations in a finished allocation are never errors; they are
/// reported by the checkers as failing reports.
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("catalog has no entry for configured day '{0}'")]
    MalformedCatalog(String),

    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("invalid offering '{name}' on {day}: {reason}")]
    InvalidOffering {
        day: String,
        name: String,
        reason: String,
    },

    #[error("i/o error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, SchedulerError>;

impl From<serde_json::Error> for SchedulerError {
    fn from(e: serde_json::Error) -> Self {
        SchedulerError::MalformedInput(e.to_string())
    }
}
