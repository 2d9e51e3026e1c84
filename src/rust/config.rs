use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::engine::audio::DEFAULT_SAMPLE_RATE;
use crate::model_manager::ModelManager;
use crate::{EmotionLabelSet, RuntimeConfig};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid listen address '{0}'")]
    InvalidHost(String),
    #[error("Upload limit must be greater than zero")]
    ZeroUploadLimit,
    #[error("Sample rate must be greater than zero")]
    ZeroSampleRate,
    #[error("Invalid sidecar URL '{0}': must start with http:// or https://")]
    InvalidSidecarUrl(String),
}

/// Everything the service needs at startup.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub model_dir: PathBuf,
    /// Overrides the label list of the model config.
    pub labels: Option<EmotionLabelSet>,
    /// Use an external inference process instead of the in-process model.
    pub sidecar_url: Option<String>,
    /// Per-request limit on sidecar calls; none by default.
    pub sidecar_timeout: Option<Duration>,
    pub model_sha256: Option<String>,
    /// Defaults to the system temp dir.
    pub staging_dir: Option<PathBuf>,
    pub want_probabilities: bool,
    pub serialize_inference: bool,
    pub max_upload_bytes: usize,
    /// Overrides the sample rate of the model config.
    pub sample_rate: Option<u32>,
    pub runtime: RuntimeConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            model_dir: ModelManager::get_default_model_dir(),
            labels: None,
            sidecar_url: None,
            sidecar_timeout: None,
            model_sha256: None,
            staging_dir: None,
            want_probabilities: true,
            serialize_inference: false,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            sample_rate: None,
            runtime: RuntimeConfig::default(),
        }
    }
}

impl ServiceConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.socket_addr()?;
        if self.max_upload_bytes == 0 {
            return Err(ConfigError::ZeroUploadLimit);
        }
        if self.sample_rate == Some(0) {
            return Err(ConfigError::ZeroSampleRate);
        }
        if let Some(url) = &self.sidecar_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::InvalidSidecarUrl(url.clone()));
            }
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|_| ConfigError::InvalidHost(self.host.clone()))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// The explicit sample rate, else the model's, else 16 kHz.
    pub fn resolve_sample_rate(&self, from_model: Option<u32>) -> u32 {
        self.sample_rate.or(from_model).unwrap_or(DEFAULT_SAMPLE_RATE)
    }

    pub fn model_manager(&self) -> ModelManager {
        ModelManager::new(&self.model_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.port, 8000);
        assert!(config.want_probabilities);
        assert!(!config.serialize_inference);
        assert_eq!(config.sidecar_timeout, None);
        assert_eq!(config.max_upload_bytes, 50 * 1024 * 1024);
        assert_eq!(config.socket_addr().unwrap().to_string(), "0.0.0.0:8000");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let config = ServiceConfig {
            host: "localhost:80".into(),
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidHost("localhost:80".into())));

        let config = ServiceConfig {
            max_upload_bytes: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroUploadLimit));

        let config = ServiceConfig {
            sidecar_url: Some("127.0.0.1:9000".into()),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidSidecarUrl(_))));
    }

    #[test]
    fn test_sample_rate_resolution() {
        let mut config = ServiceConfig::default();
        assert_eq!(config.resolve_sample_rate(None), 16_000);
        assert_eq!(config.resolve_sample_rate(Some(22_050)), 22_050);
        config.sample_rate = Some(8_000);
        assert_eq!(config.resolve_sample_rate(Some(22_050)), 8_000);
    }
}
