use std::sync::Arc;

use axum::body::Bytes;
use log::{debug, info};

use crate::config::ServiceConfig;
use crate::engine::{AcousticEngine, OnnxEngine, SidecarEngine};
use crate::invoker::InferenceInvoker;
use crate::response::{assemble, ResponseBody};
use crate::staging::{AudioStager, StagingError};
use crate::{normalize, ClassifierError, EmotionLabelSet, ModelLoadError};

/// The per-request pipeline: stage, classify, release, normalize, assemble.
///
/// Built once at startup and shared read-only by every request.
pub struct EmotionService {
    stager: AudioStager,
    invoker: InferenceInvoker,
    labels: EmotionLabelSet,
    want_probabilities: bool,
}

impl EmotionService {
    pub fn new(stager: AudioStager, engine: Arc<dyn AcousticEngine>, labels: EmotionLabelSet) -> Self {
        Self {
            stager,
            invoker: InferenceInvoker::new(engine),
            labels,
            want_probabilities: true,
        }
    }

    /// Skip the probability-seeking call and ask for a decision directly.
    pub fn label_only(mut self) -> Self {
        self.want_probabilities = false;
        self
    }

    pub fn serialized(mut self) -> Self {
        self.invoker = self.invoker.serialized();
        self
    }

    /// Loads the model artifacts named by `config` and builds the service.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, ModelLoadError> {
        let manager = config.model_manager();
        let labels = manager.resolve_labels(config.labels.clone())?;

        let engine: Arc<dyn AcousticEngine> = match &config.sidecar_url {
            Some(url) => Arc::new(
                SidecarEngine::new(url.as_str(), config.sidecar_timeout)
                    .map_err(|e| ModelLoadError::Engine(e.to_string()))?,
            ),
            None => {
                if !manager.is_model_present() {
                    return Err(ModelLoadError::NotFound(manager.get_model_path()));
                }
                if let Some(expected) = &config.model_sha256 {
                    manager.verify_model(expected)?;
                }
                let from_model = manager.load_config().ok().and_then(|c| c.sample_rate);
                let sample_rate = config.resolve_sample_rate(from_model);
                Arc::new(OnnxEngine::load(&manager.get_model_path(), sample_rate, &config.runtime)?)
            }
        };

        let stager = match &config.staging_dir {
            Some(dir) => AudioStager::new(dir)?,
            None => AudioStager::in_temp_dir(),
        };

        let mut service = Self::new(stager, engine, labels);
        if !config.want_probabilities {
            service = service.label_only();
        }
        if config.serialize_inference {
            service = service.serialized();
        }
        info!(
            "Emotion service ready: engine={}, labels={}, probabilities={}, serialized={}",
            service.invoker.engine().name(),
            service.labels,
            service.want_probabilities,
            service.invoker.is_serialized()
        );
        Ok(service)
    }

    pub fn labels(&self) -> &EmotionLabelSet {
        &self.labels
    }

    pub fn engine_name(&self) -> &str {
        self.invoker.engine().name()
    }

    pub fn wants_probabilities(&self) -> bool {
        self.want_probabilities
    }

    pub fn is_serialized(&self) -> bool {
        self.invoker.is_serialized()
    }

    /// Runs one uploaded clip through the pipeline.
    ///
    /// The staged file is released once the engine returns, whatever it
    /// returned; an empty upload is rejected before anything touches disk.
    pub async fn predict(&self, audio: Bytes) -> Result<ResponseBody, ClassifierError> {
        if audio.is_empty() {
            return Err(StagingError::EmptyUpload.into());
        }

        let stager = self.stager.clone();
        let staged = tokio::task::spawn_blocking(move || stager.stage(&audio)).await??;
        debug!("Staged {} bytes at {:?}", staged.len(), staged.path());

        let outcome = self.invoker.classify(&staged, self.want_probabilities).await;
        // release() logs its own failure; the prediction stands either way
        let _ = staged.release();

        let result = normalize(outcome?, &self.labels);
        debug!("Predicted '{}'", result.top_label);
        Ok(assemble(result))
    }
}
