// EcoVision Server - waste detection HTTP API

use anyhow::Context;
use clap::Parser;
use ecovision_eye::models::DevicePreference;
use ecovision_eye::{InferenceContext, SERVICE_NAME, VERSION};
use ecovision_server::{create_router, ApiState, LogFormat, ServerConfig};
use std::path::PathBuf;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ecovision-server")]
#[command(about = "Waste detection and disposal guidance HTTP API", long_about = None)]
#[command(version)]
struct Args {
    /// Configuration file (TOML or YAML)
    #[arg(long, short)]
    config: Option<PathBuf>,

    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    /// Directory holding the ONNX models
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// Inference device: auto, cpu or cuda
    #[arg(long)]
    device: Option<DevicePreference>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long)]
    log_level: Option<String>,

    /// Log format: text or json
    #[arg(long)]
    log_format: Option<LogFormat>,

    /// Skip loading the segmenter
    #[arg(long)]
    no_segmentation: bool,

    /// Download the fallback detector when it is missing
    #[arg(long)]
    auto_download: bool,
}

impl Args {
    fn apply(&self, config: &mut ServerConfig) {
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(dir) = &self.model_dir {
            config.vision.model_dir = dir.clone();
        }
        if let Some(device) = self.device {
            config.vision.device = device;
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        if let Some(format) = self.log_format {
            config.log_format = format;
        }
        if self.no_segmentation {
            config.vision.enable_segmentation = false;
        }
        if self.auto_download {
            config.vision.auto_download = true;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    init_tracing(&config);

    info!("Starting {} v{}", SERVICE_NAME, VERSION);
    info!("Model directory: {}", config.vision.model_dir.display());

    let context = InferenceContext::initialize(&config.vision)
        .await
        .context("Failed to initialize inference context")?;

    let detector = context.detector_status();
    if detector.loaded {
        info!(
            "Detector ready: {} on {}",
            detector.model.as_deref().unwrap_or("unknown"),
            detector.device.map(|d| d.as_str()).unwrap_or("unknown")
        );
    } else {
        warn!("No detector loaded, /detect will answer 503 until restart");
    }
    if !context.segmenter_status().loaded {
        info!("Segmentation unavailable, masks will be null");
    }

    let app = create_router(ApiState::new(context.clone()), config.max_upload_bytes);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("HTTP server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown())
        .await
        .context("HTTP server failed")?;

    info!("Stopping services...");
    context.shutdown();
    info!("All services stopped");

    Ok(())
}

/// Defaults, then the config file, then `ECOVISION_*` variables, then flags.
fn load_config(args: &Args) -> anyhow::Result<ServerConfig> {
    let mut config = match &args.config {
        Some(path) => ServerConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ServerConfig::default(),
    };

    config.apply_env()?;
    args.apply(&mut config);
    config.validate()?;

    Ok(config)
}

fn init_tracing(config: &ServerConfig) {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_lowercase()));

    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(false)
            .init(),
    }
}

/// Wait for shutdown signal
async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
