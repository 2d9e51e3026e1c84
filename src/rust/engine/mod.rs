//! Acoustic engines: the models that turn a staged audio file into a raw
//! classification.
//!
//! Engines only ever see a file path, one clip per call. What they return
//! depends on the model build, which is why the result is a
//! [`RawModelOutput`] rather than a fixed type.

use std::io;
use std::path::Path;

use async_trait::async_trait;

use crate::RawModelOutput;

pub(crate) mod audio;
mod onnx;
mod sidecar;

pub use onnx::{OnnxEngine, OutputHead};
pub use sidecar::SidecarEngine;

/// Which kind of answer an invocation asks the engine for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationMode {
    /// Per-class scores rather than a bare decision.
    Probabilities,
    /// Whatever decision the model emits by default.
    LabelOnly,
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The loaded model build cannot answer in the requested mode.
    #[error("Engine cannot serve {mode:?} requests: {reason}")]
    CapabilityMismatch { mode: InvocationMode, reason: String },
    #[error("Audio decode error: {0}")]
    AudioDecode(String),
    #[error("Resample error: {0}")]
    Resample(String),
    #[error("Inference error: {0}")]
    Inference(String),
    #[error("Sidecar error: {0}")]
    Sidecar(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl EngineError {
    pub fn is_capability_mismatch(&self) -> bool {
        matches!(self, Self::CapabilityMismatch { .. })
    }
}

/// A loaded acoustic classification model.
///
/// Implementations hold frozen parameters and run inference only; `run` must
/// not mutate model state.
#[async_trait]
pub trait AcousticEngine: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Whether `run` may be called from several requests at once. When false,
    /// the invoker serializes calls.
    fn supports_concurrent_calls(&self) -> bool {
        true
    }

    /// Classifies the audio file at `audio`.
    ///
    /// Returns [`EngineError::CapabilityMismatch`] when `mode` is not
    /// supported by this model build.
    async fn run(&self, audio: &Path, mode: InvocationMode) -> Result<RawModelOutput, EngineError>;
}
