//! Report model availability and optionally fetch the fallback detector

use anyhow::Result;
use clap::Parser;
use ecovision_eye::config::VisionConfig;
use ecovision_eye::models::ModelManager;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "setup_models")]
#[command(about = "Check and download EcoVision models")]
struct Args {
    /// Directory holding the ONNX models
    #[arg(long, default_value = "models")]
    model_dir: PathBuf,

    /// Download the fallback detector when it is missing
    #[arg(long)]
    download: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let args = Args::parse();
    let config = VisionConfig {
        model_dir: args.model_dir,
        ..VisionConfig::default()
    };
    let manager = ModelManager::new(Arc::new(config));
    let model_dir = manager.ensure_model_dir()?;

    println!("EcoVision model setup");
    println!("Model directory: {}", model_dir.display());
    println!();

    for status in manager.status() {
        let mark = if status.present { "found" } else { "missing" };
        println!(
            "  {:<9} {:<10} {:<8} {}",
            status.role,
            status.name,
            mark,
            status.files.join(", ")
        );
    }
    println!();

    if args.download {
        match manager.ensure_fallback_detector().await? {
            Some(path) => println!("Fallback detector ready at {}", path.display()),
            None => println!("Fallback detector is not configured"),
        }
    } else {
        println!("Detectors: export YOLOv10 or YOLOv8 to ONNX and place it in the model directory,");
        println!("or rerun with --download to fetch yolov8n.onnx.");
        println!("Segmenters: export SAM2 or SAM as encoder/decoder ONNX pairs. The service runs");
        println!("without them; masks are then returned as null.");
    }

    Ok(())
}
