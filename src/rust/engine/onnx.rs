use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use log::{error, info};
use ndarray::{Array1, Array2};
use ort::session::Session;
use ort::tensor::TensorElementType;
use ort::value::{DynValue, Tensor, ValueType};

use super::audio;
use super::{AcousticEngine, EngineError, InvocationMode};
use crate::classifier::utils::argmax;
use crate::runtime::{create_session_builder, RuntimeConfig};
use crate::{ModelLoadError, RawModelOutput};

/// What the model's first output tensor holds, read once at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputHead {
    /// float32 per-class scores; serves both invocation modes
    Scores,
    /// int64 class positions
    ClassIndex,
    /// string labels
    Label,
    /// anything else, described by its ONNX type
    Unsupported(String),
}

impl OutputHead {
    fn from_value_type(value_type: &ValueType) -> Self {
        match value_type {
            ValueType::Tensor { ty: TensorElementType::Float32, .. } => Self::Scores,
            ValueType::Tensor { ty: TensorElementType::Int64, .. } => Self::ClassIndex,
            ValueType::Tensor { ty: TensorElementType::String, .. } => Self::Label,
            other => Self::Unsupported(format!("{:?}", other)),
        }
    }
}

impl fmt::Display for OutputHead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scores => write!(f, "class scores"),
            Self::ClassIndex => write!(f, "class indices"),
            Self::Label => write!(f, "label strings"),
            Self::Unsupported(ty) => write!(f, "unsupported output {}", ty),
        }
    }
}

/// An exported acoustic classifier run in-process through ONNX Runtime.
///
/// The model is expected to take the raw waveform `[1, T]` as its first input
/// and, optionally, the waveform length `[1]` as its second. The session is
/// shared read-only; ONNX Runtime sessions accept concurrent `run` calls.
#[derive(Debug)]
pub struct OnnxEngine {
    model_path: PathBuf,
    session: Arc<Session>,
    head: OutputHead,
    sample_rate: u32,
}

// Compile-time verification of thread-safety
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn verify_thread_safety() {
        assert_send_sync::<OnnxEngine>();
    }
};

impl OnnxEngine {
    /// Loads and validates the model at `model_path`.
    pub fn load(
        model_path: &Path,
        sample_rate: u32,
        config: &RuntimeConfig,
    ) -> Result<Self, ModelLoadError> {
        if !model_path.exists() {
            return Err(ModelLoadError::NotFound(model_path.to_path_buf()));
        }

        let session = create_session_builder(config)
            .and_then(|builder| builder.commit_from_file(model_path))
            .map_err(|e| {
                error!("Failed to load ONNX model {:?}: {}", model_path, e);
                ModelLoadError::Runtime(e.to_string())
            })?;

        Self::validate_model(&session)?;
        let head = OutputHead::from_value_type(&session.outputs[0].output_type);
        info!(
            "Loaded acoustic model {:?}: {} input(s), output '{}' holds {}",
            model_path,
            session.inputs.len(),
            session.outputs[0].name,
            head
        );

        Ok(Self {
            model_path: model_path.to_path_buf(),
            session: Arc::new(session),
            head,
            sample_rate,
        })
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    pub fn head(&self) -> &OutputHead {
        &self.head
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// The model needs one input for the waveform and one output to read.
    fn validate_model(session: &Session) -> Result<(), ModelLoadError> {
        if session.inputs.is_empty() {
            return Err(ModelLoadError::InvalidModel(
                "Model must have at least 1 input for the waveform".to_string(),
            ));
        }
        if session.outputs.is_empty() {
            return Err(ModelLoadError::InvalidModel(
                "Model must have at least 1 output".to_string(),
            ));
        }
        Ok(())
    }

    fn infer(
        session: &Session,
        head: &OutputHead,
        samples: Vec<f32>,
        mode: InvocationMode,
    ) -> Result<RawModelOutput, EngineError> {
        let len = samples.len();
        let waveform = Array2::from_shape_vec((1, len), samples)
            .map_err(|e| EngineError::Inference(format!("Failed to create waveform array: {}", e)))?;

        let mut inputs: HashMap<String, DynValue> = HashMap::new();
        inputs.insert(
            session.inputs[0].name.clone(),
            Tensor::from_array(waveform)
                .map_err(|e| EngineError::Inference(format!("Failed to create waveform tensor: {}", e)))?
                .into_dyn(),
        );
        if let Some(length_input) = session.inputs.get(1) {
            let length = Array1::from_vec(vec![len as i64]);
            inputs.insert(
                length_input.name.clone(),
                Tensor::from_array(length)
                    .map_err(|e| EngineError::Inference(format!("Failed to create length tensor: {}", e)))?
                    .into_dyn(),
            );
        }

        let outputs = session
            .run(inputs)
            .map_err(|e| EngineError::Inference(format!("Failed to run model: {}", e)))?;
        let output = &outputs[0];

        let raw = match head {
            OutputHead::Scores => {
                let tensor = output
                    .try_extract_tensor::<f32>()
                    .map_err(|e| EngineError::Inference(format!("Failed to extract scores: {}", e)))?;
                let logits: Vec<f32> = tensor.iter().copied().collect();
                match mode {
                    InvocationMode::Probabilities => RawModelOutput::Logits(logits),
                    InvocationMode::LabelOnly => match argmax(logits.iter().copied()) {
                        Some(index) => RawModelOutput::ClassIndex(index as i64),
                        None => RawModelOutput::Unrecognized("empty score tensor".into()),
                    },
                }
            }
            OutputHead::ClassIndex => {
                let tensor = output
                    .try_extract_tensor::<i64>()
                    .map_err(|e| EngineError::Inference(format!("Failed to extract class index: {}", e)))?;
                match tensor.iter().next() {
                    Some(&index) => RawModelOutput::ClassIndex(index),
                    None => RawModelOutput::Unrecognized("empty index tensor".into()),
                }
            }
            OutputHead::Label => {
                let tensor = output
                    .try_extract_string_tensor()
                    .map_err(|e| EngineError::Inference(format!("Failed to extract label: {}", e)))?;
                match tensor.iter().next() {
                    Some(label) => RawModelOutput::LabelString(label.clone()),
                    None => RawModelOutput::Unrecognized("empty label tensor".into()),
                }
            }
            OutputHead::Unsupported(ty) => RawModelOutput::Unrecognized(ty.clone()),
        };
        Ok(raw)
    }
}

#[async_trait]
impl AcousticEngine for OnnxEngine {
    fn name(&self) -> &str {
        "onnx"
    }

    async fn run(&self, audio: &Path, mode: InvocationMode) -> Result<RawModelOutput, EngineError> {
        match (&self.head, mode) {
            (OutputHead::Scores, _) | (_, InvocationMode::LabelOnly) => {}
            (head, InvocationMode::Probabilities) => {
                return Err(EngineError::CapabilityMismatch {
                    mode,
                    reason: format!("model emits {}", head),
                });
            }
        }
        if let OutputHead::Unsupported(ty) = &self.head {
            return Ok(RawModelOutput::Unrecognized(ty.clone()));
        }

        let session = Arc::clone(&self.session);
        let head = self.head.clone();
        let path = audio.to_path_buf();
        let sample_rate = self.sample_rate;
        tokio::task::spawn_blocking(move || {
            let samples = audio::decode_file(&path, sample_rate)?;
            Self::infer(&session, &head, samples, mode)
        })
        .await
        .map_err(|e| EngineError::Inference(format!("Inference task failed: {}", e)))?
    }
}
