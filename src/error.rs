use std::path::PathBuf;

use thiserror::Error;

/// Failures talking to the shared tabular store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    #[error("Cell address out of bounds: row {row}, col {col}")]
    OutOfBounds { row: usize, col: usize },

    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store document is malformed: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Failures talking to the grading website.
#[derive(Error, Debug)]
pub enum GraderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("No login form in grader")]
    MissingLoginForm,

    #[error("No submission form in grader")]
    MissingSubmitForm,

    #[error("Unexpected grader page: {0}")]
    Page(String),

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures of a single command. Reported back to whoever issued it, never fatal.
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Problem number must be greater than or equal to 1")]
    ProblemBelowMinimum,

    #[error("Problem number {requested} exceeds total problems ({total})")]
    ProblemOutOfRange { requested: i64, total: usize },

    #[error("File \"{0}\" is not allowed to submit")]
    FileRejected(String),

    #[error("OS commands are disabled")]
    OsDisabled,

    #[error("OS command \"{0}\" is not in the allowlist")]
    OsNotAllowed(String),

    #[error("OS command failed: {0}")]
    Os(String),

    #[error("Grader Error! {0}")]
    Grader(#[from] GraderError),
}

#[derive(Error, Debug)]
pub enum RelayError {
    /// Policy or registry sheet unusable. `code` is the short tag shown to
    /// non-verbose users.
    #[error("Configuration error [{code}]: {detail}")]
    Configuration { code: &'static str, detail: String },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Grader error: {0}")]
    Grader(#[from] GraderError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RelayError {
    pub fn configuration(code: &'static str, detail: impl Into<String>) -> Self {
        RelayError::Configuration {
            code,
            detail: detail.into(),
        }
    }

    /// Message shown on the terminal. Verbose mode shows the underlying cause,
    /// otherwise configuration problems only expose their code.
    pub fn user_message(&self, verbose: bool) -> String {
        match self {
            RelayError::Configuration { code, .. } if !verbose => {
                format!("Please contact grader administrator [{}]", code)
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
