use thiserror::Error;

use crate::compare::ArrayMismatch;

/// Why a (model, backend) check did not pass.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("bad fixture {model}: {reason}")]
    Fixture { model: String, reason: String },

    #[error("failed to load model from {url}: {reason}")]
    Load { url: String, reason: String },

    #[error("input {index}: {reason}")]
    Input { index: usize, reason: String },

    #[error("backend '{backend}' unavailable: {reason}")]
    Backend { backend: String, reason: String },

    #[error("execution on '{backend}' failed: {reason}")]
    Execution { backend: String, reason: String },

    #[error("output {index} is unreadable: {reason}")]
    Output { index: usize, reason: String },

    #[error("expected {expected} outputs, got {actual}")]
    OutputCount { expected: usize, actual: usize },

    #[error("output {index}: expected shape {expected:?}, got {actual:?}")]
    ShapeMismatch {
        index: usize,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("output {index}: {detail}")]
    DataMismatch { index: usize, detail: ArrayMismatch },
}

impl CheckError {
    /// Assertion failures, as opposed to errors raised while setting up or
    /// running the model.
    pub fn is_assertion(&self) -> bool {
        matches!(
            self,
            CheckError::OutputCount { .. }
                | CheckError::ShapeMismatch { .. }
                | CheckError::DataMismatch { .. }
        )
    }
}

pub type CheckResult<T> = std::result::Result<T, CheckError>;
