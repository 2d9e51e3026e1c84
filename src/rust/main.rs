use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use amygdala::config::{DEFAULT_HOST, DEFAULT_PORT};
use amygdala::{server, EmotionLabelSet, EmotionService, ModelManager, RuntimeConfig, ServiceConfig};
use anyhow::Context;
use clap::Parser;
use log::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,

    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Directory holding model.onnx and model_config.yaml
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// Comma-separated labels in decoder order, overriding the model config
    #[arg(long)]
    labels: Option<EmotionLabelSet>,

    /// Classify through an external inference process instead of ONNX Runtime
    #[arg(long)]
    sidecar_url: Option<String>,

    /// Give up on a sidecar call after this many seconds (default: wait)
    #[arg(long)]
    sidecar_timeout_secs: Option<u64>,

    /// Expected SHA-256 of model.onnx
    #[arg(long)]
    model_sha256: Option<String>,

    /// Where uploads are staged (default: system temp dir)
    #[arg(long)]
    staging_dir: Option<PathBuf>,

    /// Ask the model for a decision only, never for scores
    #[arg(long)]
    label_only: bool,

    /// Run one inference at a time
    #[arg(long)]
    serialize_inference: bool,

    #[arg(long, default_value_t = 50)]
    max_upload_mb: usize,

    /// Sample rate the model expects (default: model config, else 16000)
    #[arg(long)]
    sample_rate: Option<u32>,

    #[arg(long, default_value_t = 0)]
    intra_threads: usize,

    #[arg(long, default_value_t = 0)]
    inter_threads: usize,

    /// Print what the model config declares and exit
    #[arg(long)]
    inspect: bool,
}

impl Args {
    fn into_config(self) -> ServiceConfig {
        ServiceConfig {
            host: self.host,
            port: self.port,
            model_dir: self.model_dir.unwrap_or_else(ModelManager::get_default_model_dir),
            labels: self.labels,
            sidecar_url: self.sidecar_url,
            sidecar_timeout: self.sidecar_timeout_secs.map(Duration::from_secs),
            model_sha256: self.model_sha256,
            staging_dir: self.staging_dir,
            want_probabilities: !self.label_only,
            serialize_inference: self.serialize_inference,
            max_upload_bytes: self.max_upload_mb.saturating_mul(1024 * 1024),
            sample_rate: self.sample_rate,
            runtime: RuntimeConfig::with_threads(self.intra_threads, self.inter_threads),
        }
    }
}

fn inspect_model(manager: &ModelManager) -> anyhow::Result<()> {
    let config = manager
        .load_config()
        .with_context(|| format!("Failed to read model config in {:?}", manager.model_dir()))?;

    println!("Model config: {}", config.source.display());
    println!("  sections:      {}", config.sections.join(", "));
    match (&config.labels, &config.labels_path) {
        (Some(labels), Some(path)) => println!("  labels:        [{}] (from {})", labels.join(", "), path),
        _ => println!("  labels:        none"),
    }
    let show = |value: Option<String>| value.unwrap_or_else(|| "not set".to_string());
    println!("  sample rate:   {}", show(config.sample_rate.map(|r| r.to_string())));
    println!("  model target:  {}", show(config.target.clone()));
    println!("  decoder:       {}", show(config.decoder_target.clone()));
    println!("  num classes:   {}", show(config.num_classes.map(|n| n.to_string())));
    println!(
        "  model file:    {} ({})",
        manager.get_model_path().display(),
        if manager.is_model_present() { "present" } else { "missing" }
    );
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    amygdala::init_logger();
    let args = Args::parse();
    let inspect = args.inspect;
    let config = args.into_config();
    config.validate()?;

    if inspect {
        return inspect_model(&config.model_manager());
    }

    info!("=== Starting amygdala ===");
    let start_time = Instant::now();
    let service = EmotionService::from_config(&config).context("Failed to load the emotion model")?;
    info!("Model ready (took {:.2?})", start_time.elapsed());

    let app = server::router(Arc::new(service), config.max_upload_bytes);
    server::serve(config.socket_addr()?, app).await?;
    Ok(())
}
