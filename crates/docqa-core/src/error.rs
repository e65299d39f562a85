use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Embedding provider error: {message}")]
    Embedding { message: String, transient: bool },

    #[error("Completion provider error: {message}")]
    Completion { message: String, transient: bool },

    #[error("Vector dimension mismatch: index holds {expected}-d vectors, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("No relevant content found for the question")]
    EmptyContext,

    #[error("Pipeline has no indexed document; ingest one before querying")]
    NotReady,

    #[error("Text extraction failed: {0}")]
    Extraction(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn embedding(message: impl Into<String>, transient: bool) -> Self {
        Error::Embedding { message: message.into(), transient }
    }

    pub fn completion(message: impl Into<String>, transient: bool) -> Self {
        Error::Completion { message: message.into(), transient }
    }

    /// Only provider failures flagged transient (network, rate limit, 5xx) are worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Embedding { transient, .. } | Error::Completion { transient, .. } => *transient,
            _ => false,
        }
    }
}

/// HTTP statuses that indicate a provider hiccup rather than a bad request or bad credentials.
pub fn is_transient_status(status: u16) -> bool {
    matches!(status, 408 | 425 | 429) || (500..600).contains(&status)
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_flagged_provider_errors_are_transient() {
        assert!(Error::embedding("timeout", true).is_transient());
        assert!(!Error::embedding("bad key", false).is_transient());
        assert!(Error::completion("503", true).is_transient());
        assert!(!Error::DimensionMismatch { expected: 3, actual: 4 }.is_transient());
        assert!(!Error::NotReady.is_transient());
    }

    #[test]
    fn status_classification() {
        assert!(is_transient_status(429));
        assert!(is_transient_status(503));
        assert!(!is_transient_status(401));
        assert!(!is_transient_status(400));
    }
}
