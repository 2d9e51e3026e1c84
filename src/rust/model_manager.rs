use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_yaml::Value;
use sha2::{Digest, Sha256};

use crate::labels::{EmotionLabelSet, LabelSetError};

/// File name of the exported acoustic model inside a model directory.
pub const MODEL_FILE: &str = "model.onnx";
/// File name of the model's trained configuration inside a model directory.
pub const CONFIG_FILE: &str = "model_config.yaml";

#[derive(Debug, thiserror::Error)]
pub enum ModelLoadError {
    #[error("Model artifact not found: {0:?}")]
    NotFound(PathBuf),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Invalid model config: {0}")]
    InvalidConfig(String),
    #[error("Invalid model: {0}")]
    InvalidModel(String),
    #[error("No label list found in {0:?}; pass --labels explicitly")]
    MissingLabels(PathBuf),
    #[error("Invalid label set: {0}")]
    Labels(#[from] LabelSetError),
    #[error("Label count {labels} does not match decoder.num_classes {num_classes}")]
    ClassCountMismatch { labels: usize, num_classes: usize },
    #[error("Hash mismatch: expected {expected}, got {actual} for {path:?}")]
    HashMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },
    #[error("ONNX Runtime error: {0}")]
    Runtime(String),
    #[error("Engine setup failed: {0}")]
    Engine(String),
}

/// Locates and verifies the model artifacts of one model directory.
#[derive(Debug, Clone)]
pub struct ModelManager {
    model_dir: PathBuf,
}

impl ModelManager {
    /// Returns the default model directory path
    pub fn get_default_model_dir() -> PathBuf {
        // 1. Check environment variable
        if let Ok(path) = env::var("AMYGDALA_MODEL_DIR") {
            return PathBuf::from(path);
        }

        // 2. Use platform-specific data directory
        if let Some(data_dir) = dirs::data_dir() {
            return data_dir.join("amygdala").join("models");
        }

        // 3. Fallback to user's home directory
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(".local").join("share").join("amygdala").join("models");
        }

        // 4. If all else fails, use system temp directory (platform agnostic)
        env::temp_dir().join("amygdala").join("models")
    }

    pub fn new<P: AsRef<Path>>(model_dir: P) -> Self {
        Self {
            model_dir: model_dir.as_ref().to_path_buf(),
        }
    }

    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    pub fn get_model_path(&self) -> PathBuf {
        self.model_dir.join(MODEL_FILE)
    }

    pub fn get_config_path(&self) -> PathBuf {
        self.model_dir.join(CONFIG_FILE)
    }

    pub fn is_model_present(&self) -> bool {
        let model_path = self.get_model_path();
        log::info!("Checking model artifact: {:?} (exists: {})", model_path, model_path.exists());
        model_path.exists()
    }

    fn hash_file(path: &Path) -> Result<String, ModelLoadError> {
        log::info!("Hashing file: {:?}", path);
        let bytes = fs::read(path)?;
        log::info!("Read {} bytes", bytes.len());
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(format!("{:x}", hasher.finalize()))
    }

    /// Checks the model file against an expected SHA-256 hex digest.
    pub fn verify_model(&self, expected_hash: &str) -> Result<(), ModelLoadError> {
        let model_path = self.get_model_path();
        if !model_path.exists() {
            return Err(ModelLoadError::NotFound(model_path));
        }

        let actual = Self::hash_file(&model_path)?;
        let expected = expected_hash.trim().to_ascii_lowercase();
        log::info!("Calculated hash: {}", actual);
        log::info!("Expected hash:   {}", expected);
        if actual != expected {
            log::error!("Model hash mismatch for {:?}", model_path);
            return Err(ModelLoadError::HashMismatch {
                path: model_path,
                expected,
                actual,
            });
        }
        Ok(())
    }

    /// Reads the model's trained configuration.
    pub fn load_config(&self) -> Result<ModelConfig, ModelLoadError> {
        let config_path = self.get_config_path();
        if !config_path.exists() {
            return Err(ModelLoadError::NotFound(config_path));
        }
        log::info!("Reading model config from {:?}", config_path);
        let text = fs::read_to_string(&config_path)?;
        ModelConfig::from_yaml_str(&text, config_path)
    }

    /// Resolves the label set: explicit labels win, then the model config.
    ///
    /// A missing config is only an error when no explicit labels were given.
    pub fn resolve_labels(
        &self,
        explicit: Option<EmotionLabelSet>,
    ) -> Result<EmotionLabelSet, ModelLoadError> {
        let config = match self.load_config() {
            Ok(config) => Some(config),
            Err(ModelLoadError::NotFound(_)) if explicit.is_some() => None,
            Err(e) => return Err(e),
        };

        let labels = match explicit {
            Some(labels) => labels,
            None => config
                .as_ref()
                .map(ModelConfig::label_set)
                .transpose()?
                .ok_or_else(|| ModelLoadError::MissingLabels(self.get_config_path()))?,
        };

        if let Some(num_classes) = config.as_ref().and_then(|c| c.num_classes) {
            if num_classes != labels.len() {
                return Err(ModelLoadError::ClassCountMismatch {
                    labels: labels.len(),
                    num_classes,
                });
            }
        }
        log::info!("Using {} labels: {}", labels.len(), labels);
        Ok(labels)
    }
}

/// The parts of a trained model configuration this service reads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelConfig {
    pub source: PathBuf,
    /// Top-level keys, in document order.
    pub sections: Vec<String>,
    pub labels: Option<Vec<String>>,
    /// Dotted path of the key the labels were read from.
    pub labels_path: Option<String>,
    pub sample_rate: Option<u32>,
    pub num_classes: Option<usize>,
    pub target: Option<String>,
    pub decoder_target: Option<String>,
}

impl ModelConfig {
    pub fn from_yaml_str(text: &str, source: impl Into<PathBuf>) -> Result<Self, ModelLoadError> {
        let root: Value = serde_yaml::from_str(text)
            .map_err(|e| ModelLoadError::InvalidConfig(e.to_string()))?;
        let mapping = root
            .as_mapping()
            .ok_or_else(|| ModelLoadError::InvalidConfig("top level is not a mapping".into()))?;

        let sections = mapping
            .keys()
            .filter_map(|k| k.as_str().map(str::to_string))
            .collect();

        let (labels, labels_path) = match string_list(root.get("labels")) {
            Some(labels) => (Some(labels), Some("labels".to_string())),
            None => match find_labels(&root, "") {
                Some((path, labels)) => (Some(labels), Some(path)),
                None => (None, None),
            },
        };

        let sample_rate = root
            .get("sample_rate")
            .or_else(|| root.get("preprocessor").and_then(|p| p.get("sample_rate")))
            .and_then(Value::as_u64)
            .and_then(|rate| u32::try_from(rate).ok());

        let num_classes = root
            .get("decoder")
            .and_then(|d| d.get("num_classes"))
            .and_then(Value::as_u64)
            .and_then(|n| usize::try_from(n).ok());

        let target = root
            .get("_target_")
            .or_else(|| root.get("model").and_then(|m| m.get("_target_")))
            .and_then(Value::as_str)
            .map(str::to_string);

        let decoder_target = root
            .get("decoder")
            .and_then(|d| d.get("_target_"))
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(Self {
            source: source.into(),
            sections,
            labels,
            labels_path,
            sample_rate,
            num_classes,
            target,
            decoder_target,
        })
    }

    pub fn label_set(&self) -> Result<EmotionLabelSet, ModelLoadError> {
        let labels = self
            .labels
            .clone()
            .ok_or_else(|| ModelLoadError::MissingLabels(self.source.clone()))?;
        Ok(EmotionLabelSet::new(labels)?)
    }
}

fn string_list(value: Option<&Value>) -> Option<Vec<String>> {
    let items = value?.as_sequence()?;
    if items.is_empty() {
        return None;
    }
    items.iter().map(|v| v.as_str().map(str::to_string)).collect()
}

/// Depth-first search for the first `labels` key holding a list of strings.
fn find_labels(value: &Value, path: &str) -> Option<(String, Vec<String>)> {
    match value {
        Value::Mapping(mapping) => {
            for (key, child) in mapping {
                let Some(key) = key.as_str() else { continue };
                let child_path = if path.is_empty() {
                    key.to_string()
                } else {
                    format!("{}.{}", path, key)
                };
                if key == "labels" {
                    if let Some(labels) = string_list(Some(child)) {
                        return Some((child_path, labels));
                    }
                }
                if let Some(found) = find_labels(child, &child_path) {
                    return Some(found);
                }
            }
            None
        }
        Value::Sequence(items) => items
            .iter()
            .enumerate()
            .find_map(|(i, item)| find_labels(item, &format!("{}[{}]", path, i))),
        _ => None,
    }
}
