//! Per-file error taxonomy.
//!
//! Errors inside a single file's processing are classified so the pipeline
//! can decide what is retryable, what is fatal for the file, and what is a
//! zero-chunk success. Run-level failures (source or index unreachable)
//! propagate as `anyhow::Error` instead and abort the run.

/// Classified processing error for one file.
#[derive(Debug)]
pub enum ProcessError {
    /// The byte stream could not be decoded as the claimed format.
    /// Fatal for the file, never retried.
    UnsupportedFormat(String),
    /// Parsing succeeded but produced no extractable text. Not an error for
    /// the run: the file is recorded as a zero-chunk success.
    EmptyDocument,
    /// A delegated capability call (OCR, completion, embedding, store)
    /// failed after its own retry budget.
    ExternalService(String),
    /// The processing configuration is unusable (e.g. overlap >= size).
    /// Surfaced at run start, before any file is processed.
    InvalidConfig(String),
}

impl ProcessError {
    /// Short stable kind name used in run reports.
    pub fn kind(&self) -> &'static str {
        match self {
            ProcessError::UnsupportedFormat(_) => "unsupported-format",
            ProcessError::EmptyDocument => "empty-document",
            ProcessError::ExternalService(_) => "external-service",
            ProcessError::InvalidConfig(_) => "invalid-config",
        }
    }
}

impl std::fmt::Display for ProcessError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessError::UnsupportedFormat(msg) => {
                write!(f, "unsupported format: {}", msg)
            }
            ProcessError::EmptyDocument => write!(f, "no extractable text"),
            ProcessError::ExternalService(msg) => {
                write!(f, "external service failed: {}", msg)
            }
            ProcessError::InvalidConfig(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ProcessError {}
