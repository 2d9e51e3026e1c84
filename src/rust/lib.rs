//! A speech emotion recognition service.
//!
//! Acoustic classifiers answer in whatever shape their build happens to
//! produce: raw logits, a class index, a label string or a structured record.
//! This crate stages an uploaded clip on disk, runs it through an
//! [`engine::AcousticEngine`] and reconciles the answer into one
//! [`EmotionResult`], served as JSON over HTTP.
//!
//! # Basic Usage
//!
//! ```rust
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use amygdala::{normalize, EmotionLabelSet, RawModelOutput};
//!
//! let labels: EmotionLabelSet = "angry,happy,sad".parse()?;
//!
//! let result = normalize(RawModelOutput::Logits(vec![2.0, 1.0, 0.1]), &labels);
//! assert_eq!(result.top_label, "angry");
//!
//! let result = normalize(RawModelOutput::ClassIndex(7), &labels);
//! assert_eq!(result.top_label, "unknown");
//! # Ok(())
//! # }
//! ```
//!
//! # Serving
//!
//! ```no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use amygdala::{server, EmotionService, ServiceConfig};
//! use std::sync::Arc;
//!
//! let config = ServiceConfig::default();
//! let service = EmotionService::from_config(&config)?;
//! let app = server::router(Arc::new(service), config.max_upload_bytes);
//! server::serve(config.socket_addr()?, app).await?;
//! # Ok(())
//! # }
//! ```

pub mod classifier;
pub mod config;
pub mod engine;
pub mod invoker;
mod labels;
pub mod model_manager;
pub mod response;
mod runtime;
pub mod server;
pub mod service;
pub mod staging;

pub use classifier::{
    normalize, ClassifierError, EmotionResult, RawModelOutput, Score, Scores, StructuredRecord,
    INDEX_KEY, PREDICTED_LABEL_FIELDS, RAW_KEY, UNKNOWN_LABEL,
};
pub use config::{ConfigError, ServiceConfig};
pub use engine::{AcousticEngine, EngineError, InvocationMode};
pub use invoker::InferenceInvoker;
pub use labels::{EmotionLabelSet, LabelSetError};
pub use model_manager::{ModelConfig, ModelLoadError, ModelManager};
pub use response::{assemble, ResponseBody};
pub use runtime::{create_session_builder, RuntimeConfig};
pub use service::EmotionService;
pub use staging::{AudioStager, StagedAudioFile, StagingError};

/// Initialises env_logger, defaulting to `info` when `RUST_LOG` is unset.
pub fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}
