// EcoVision Command Line Interface
// Client for the waste detection HTTP API

use anyhow::{bail, Context};
use base64::{engine::general_purpose, Engine as _};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Parser)]
#[command(name = "ecovision")]
#[command(about = "EcoVision CLI - waste detection and disposal guidance", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, default_value = "http://localhost:8000", global = true)]
    server: String,

    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show server health
    Health,

    /// List waste categories, or show guidance for one
    Classes {
        /// Category name, e.g. food_waste
        name: Option<String>,
    },

    /// Detect waste objects in an image file
    Detect {
        /// Image file to upload
        path: PathBuf,

        /// Also request segmentation masks
        #[arg(long)]
        segmentation: bool,

        /// Send the image as a base64 form field instead of a file upload
        #[arg(long)]
        base64: bool,

        /// Print the full JSON response
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(level))
        .with_target(false)
        .init();

    let server = cli.server.trim_end_matches('/').to_string();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Health => {
            let health = get_json(&client, &format!("{}/health", server)).await?;
            if health["ok"] == true {
                println!("Server is healthy");
            }
            println!("{}", serde_json::to_string_pretty(&health)?);
        }
        Commands::Classes { name } => {
            let url = match name {
                Some(name) => format!("{}/classes/{}", server, name),
                None => format!("{}/classes", server),
            };
            let classes = get_json(&client, &url).await?;
            println!("{}", serde_json::to_string_pretty(&classes)?);
        }
        Commands::Detect {
            path,
            segmentation,
            base64,
            json,
        } => {
            let result = detect(&client, &server, &path, segmentation, base64).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                for line in summarize(&result) {
                    println!("{}", line);
                }
            }
        }
    }

    Ok(())
}

async fn get_json(client: &reqwest::Client, url: &str) -> anyhow::Result<Value> {
    debug!("GET {}", url);
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Cannot connect to server at {}", url))?;
    read_response(response).await
}

async fn detect(
    client: &reqwest::Client,
    server: &str,
    path: &Path,
    segmentation: bool,
    as_base64: bool,
) -> anyhow::Result<Value> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let url = detect_url(server, segmentation);
    debug!("POST {} ({} bytes)", url, bytes.len());

    let request = if as_base64 {
        let encoded = general_purpose::STANDARD.encode(&bytes);
        client.post(&url).form(&[("image_base64", encoded)])
    } else {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name);
        client
            .post(&url)
            .multipart(reqwest::multipart::Form::new().part("image", part))
    };

    let response = request
        .send()
        .await
        .with_context(|| format!("Cannot connect to server at {}", server))?;
    read_response(response).await
}

async fn read_response(response: reqwest::Response) -> anyhow::Result<Value> {
    let status = response.status();
    let body: Value = response.json().await.unwrap_or(Value::Null);
    if !status.is_success() {
        let detail = body["detail"].as_str().unwrap_or("no detail");
        bail!("Request failed ({}): {}", status, detail);
    }
    Ok(body)
}

fn detect_url(server: &str, segmentation: bool) -> String {
    if segmentation {
        format!("{}/detect?segmentation=true", server)
    } else {
        format!("{}/detect", server)
    }
}

/// One line per detected object, followed by its disposal guidance.
fn summarize(result: &Value) -> Vec<String> {
    let detections = result["detections"].as_array().cloned().unwrap_or_default();
    let masks = result["masks"].as_array();

    let mut lines = vec![format!("Found {} object(s)", detections.len())];
    for (i, det) in detections.iter().enumerate() {
        let confidence = det["confidence"].as_f64().unwrap_or(0.0) * 100.0;
        let mut line = format!(
            "{}. {} ({:.1}%) -> {}",
            i + 1,
            det["class"].as_str().unwrap_or("unknown"),
            confidence,
            det["dustbin"].as_str().unwrap_or("?")
        );
        if let Some(masks) = masks {
            let has_mask = masks.get(i).map_or(false, |m| !m.is_null());
            line.push_str(if has_mask { " [mask]" } else { " [no mask]" });
        }
        lines.push(line);
        if let Some(disposal) = det["disposal"].as_str() {
            lines.push(format!("   {}", disposal));
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_detect_url() {
        assert_eq!(detect_url("http://h:8000", false), "http://h:8000/detect");
        assert_eq!(
            detect_url("http://h:8000", true),
            "http://h:8000/detect?segmentation=true"
        );
    }

    #[test]
    fn test_summarize() {
        let result = json!({
            "success": true,
            "count": 2,
            "detections": [
                {"class": "plastic_bottle", "confidence": 0.912, "dustbin": "Blue Bin", "disposal": "Rinse it."},
                {"class": "food_waste", "confidence": 0.5, "dustbin": "Green Bin"}
            ],
            "masks": ["data:image/png;base64,AAAA", null]
        });

        let lines = summarize(&result);
        assert_eq!(lines[0], "Found 2 object(s)");
        assert_eq!(lines[1], "1. plastic_bottle (91.2%) -> Blue Bin [mask]");
        assert_eq!(lines[2], "   Rinse it.");
        assert_eq!(lines[3], "2. food_waste (50.0%) -> Green Bin [no mask]");
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn test_summarize_empty() {
        let lines = summarize(&json!({"success": true, "detections": [], "count": 0}));
        assert_eq!(lines, vec!["Found 0 object(s)".to_string()]);
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from([
            "ecovision",
            "detect",
            "photo.jpg",
            "--segmentation",
            "--server",
            "http://10.0.0.2:8000",
        ])
        .unwrap();
        assert_eq!(cli.server, "http://10.0.0.2:8000");
        match cli.command {
            Commands::Detect {
                path,
                segmentation,
                base64,
                ..
            } => {
                assert_eq!(path, PathBuf::from("photo.jpg"));
                assert!(segmentation);
                assert!(!base64);
            }
            _ => panic!("expected detect"),
        }
    }
}
