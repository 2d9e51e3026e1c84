use std::fmt;

use crate::engine::EngineError;
use crate::staging::StagingError;

/// Represents the different ways a single prediction request can fail.
///
/// Normalization never fails, so there is no variant for it: any output the
/// engine produces is turned into an `EmotionResult`.
#[derive(Debug)]
pub enum ClassifierError {
    /// The upload could not be materialized on disk
    Staging(StagingError),
    /// The acoustic engine failed on both invocation tiers
    Inference(EngineError),
    /// A blocking task panicked or was cancelled
    Task(String),
}

impl ClassifierError {
    /// True when the caller sent something unusable rather than the service failing.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Staging(StagingError::EmptyUpload))
    }
}

impl fmt::Display for ClassifierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Staging(err) => write!(f, "Staging error: {}", err),
            Self::Inference(err) => write!(f, "Inference error: {}", err),
            Self::Task(msg) => write!(f, "Task error: {}", msg),
        }
    }
}

impl std::error::Error for ClassifierError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Staging(err) => Some(err),
            Self::Inference(err) => Some(err),
            Self::Task(_) => None,
        }
    }
}

impl From<StagingError> for ClassifierError {
    fn from(err: StagingError) -> Self {
        ClassifierError::Staging(err)
    }
}

impl From<EngineError> for ClassifierError {
    fn from(err: EngineError) -> Self {
        ClassifierError::Inference(err)
    }
}

impl From<tokio::task::JoinError> for ClassifierError {
    fn from(err: tokio::task::JoinError) -> Self {
        ClassifierError::Task(err.to_string())
    }
}
