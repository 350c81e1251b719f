//! Model manager with status reporting and download support

use crate::config::{is_safe_model_file, VisionConfig};
use crate::error::VisionError;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Public YOLOv8n ONNX export used as the fallback detector.
pub const FALLBACK_DETECTOR_URL: &str =
    "https://github.com/ultralytics/assets/releases/download/v8.2.0/yolov8n.onnx";
pub const FALLBACK_DETECTOR_FILE: &str = "yolov8n.onnx";

const MAX_MODEL_SIZE: u64 = 2_000_000_000;
const MIN_MODEL_SIZE: usize = 1024;
const DOWNLOAD_TIMEOUT_SECS: u64 = 3600;

/// Presence of one configured model on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelStatus {
    pub role: &'static str,
    pub name: String,
    pub files: Vec<String>,
    pub present: bool,
}

/// Model manager for locating and downloading ONNX models
pub struct ModelManager {
    config: Arc<VisionConfig>,
}

impl ModelManager {
    pub fn new(config: Arc<VisionConfig>) -> Self {
        Self { config }
    }

    /// Ensure model directory exists
    pub fn ensure_model_dir(&self) -> Result<PathBuf, VisionError> {
        let model_dir = &self.config.model_dir;
        if !model_dir.exists() {
            fs::create_dir_all(model_dir)?;
            info!("Created model directory: {:?}", model_dir);
        }
        Ok(model_dir.clone())
    }

    /// Every configured detector and segmenter, in candidate order.
    pub fn status(&self) -> Vec<ModelStatus> {
        let present = |file: &str| self.config.model_dir.join(file).is_file();

        let detectors = self.config.detector_models.iter().map(|m| ModelStatus {
            role: "detector",
            name: m.name.clone(),
            files: vec![m.file.clone()],
            present: present(&m.file),
        });
        let segmenters = self.config.segmenter_models.iter().map(|m| ModelStatus {
            role: "segmenter",
            name: m.name.clone(),
            files: vec![m.encoder.clone(), m.decoder.clone()],
            present: present(&m.encoder) && present(&m.decoder),
        });

        detectors.chain(segmenters).collect()
    }

    /// Download `file_name` from `url` unless it is already present.
    pub async fn ensure_model(&self, file_name: &str, url: &str, checksum: &str) -> Result<PathBuf, VisionError> {
        validate_download(file_name, url)?;
        self.ensure_model_dir()?;

        let model_path = self.config.model_dir.join(file_name);
        if model_path.exists() {
            info!("Model {} already exists at {:?}", file_name, model_path);
            return Ok(model_path);
        }

        info!("Downloading model {} from {}", file_name, url);

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
            .build()?;

        let response = client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(VisionError::Model(format!(
                "Failed to download model: HTTP {}",
                response.status()
            )));
        }

        if let Some(content_length) = response.content_length() {
            if content_length > MAX_MODEL_SIZE {
                return Err(VisionError::Model(format!(
                    "Model too large: {} bytes (max {} bytes)",
                    content_length, MAX_MODEL_SIZE
                )));
            }
        }

        let bytes = response.bytes().await?;
        check_download(&bytes, checksum)?;
        if checksum.is_empty() {
            info!("Downloaded {} bytes for model {} (checksum verification skipped)", bytes.len(), file_name);
        } else {
            info!("Verified checksum for model {}", file_name);
        }

        let temp_path = model_path.with_extension("onnx.tmp");
        fs::write(&temp_path, &bytes)?;
        if let Err(e) = fs::rename(&temp_path, &model_path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }

        info!("Model {} saved to {:?}", file_name, model_path);
        Ok(model_path)
    }

    /// Fetch the fallback detector if it is configured and missing.
    pub async fn ensure_fallback_detector(&self) -> Result<Option<PathBuf>, VisionError> {
        let configured = self
            .config
            .detector_models
            .iter()
            .any(|m| m.file == FALLBACK_DETECTOR_FILE);
        if !configured {
            warn!("{} is not a configured detector, skipping download", FALLBACK_DETECTOR_FILE);
            return Ok(None);
        }

        self.ensure_model(FALLBACK_DETECTOR_FILE, FALLBACK_DETECTOR_URL, "")
            .await
            .map(Some)
    }
}

fn validate_download(file_name: &str, url: &str) -> Result<(), VisionError> {
    if !is_safe_model_file(file_name) {
        return Err(VisionError::Model(format!("Invalid model file name: {:?}", file_name)));
    }

    if url.is_empty() || url.len() > 2048 {
        return Err(VisionError::Model("Invalid URL".to_string()));
    }

    if !url.starts_with("https://") {
        return Err(VisionError::Model("Only HTTPS URLs are allowed for model downloads".to_string()));
    }

    Ok(())
}

/// Size bounds and optional SHA-256 check on a downloaded payload.
fn check_download(bytes: &[u8], checksum: &str) -> Result<(), VisionError> {
    if bytes.len() as u64 > MAX_MODEL_SIZE {
        return Err(VisionError::Model(format!(
            "Downloaded model too large: {} bytes (max {} bytes)",
            bytes.len(),
            MAX_MODEL_SIZE
        )));
    }

    if bytes.len() < MIN_MODEL_SIZE {
        return Err(VisionError::Model("Downloaded file too small, likely corrupted".to_string()));
    }

    if !checksum.is_empty() {
        let computed = hex::encode(Sha256::digest(bytes));
        if !computed.eq_ignore_ascii_case(checksum) {
            return Err(VisionError::Model(format!(
                "Checksum mismatch: expected {}, got {}",
                checksum, computed
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manager_in(dir: &TempDir) -> ModelManager {
        let mut config = VisionConfig::default();
        config.model_dir = dir.path().join("models");
        ModelManager::new(Arc::new(config))
    }

    #[test]
    fn test_ensure_model_dir_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager_in(&temp_dir);
        let dir = manager.ensure_model_dir().unwrap();
        assert!(dir.is_dir());
        assert!(manager.ensure_model_dir().is_ok());
    }

    #[test]
    fn test_status_reports_presence() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager_in(&temp_dir);
        let dir = manager.ensure_model_dir().unwrap();
        fs::write(dir.join("yolov8n.onnx"), b"x").unwrap();
        fs::write(dir.join("sam_encoder.onnx"), b"x").unwrap();

        let status = manager.status();
        assert_eq!(status.len(), 4);
        assert_eq!(status[0].name, "yolov10e");
        assert!(!status[0].present);
        assert!(status[1].present);
        assert_eq!(status[2].role, "segmenter");
        // decoder missing
        assert!(!status[3].present);
    }

    #[tokio::test]
    async fn test_ensure_model_invalid_name() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager_in(&temp_dir);

        for name in ["", "../evil", "model/name"] {
            let result = manager.ensure_model(name, "https://example.com/model.onnx", "").await;
            assert!(result.is_err(), "{:?} should be rejected", name);
        }
    }

    #[tokio::test]
    async fn test_ensure_model_invalid_url() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager_in(&temp_dir);

        for url in ["", "http://example.com/model.onnx", "ftp://example.com/model.onnx"] {
            assert!(manager.ensure_model("model.onnx", url, "").await.is_err());
        }
    }

    #[tokio::test]
    async fn test_ensure_model_existing_file_skips_download() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager_in(&temp_dir);
        let dir = manager.ensure_model_dir().unwrap();
        fs::write(dir.join("yolov8n.onnx"), b"cached").unwrap();

        let path = manager.ensure_fallback_detector().await.unwrap().unwrap();
        assert_eq!(fs::read(path).unwrap(), b"cached");
    }

    #[tokio::test]
    async fn test_fallback_not_configured() {
        let mut config = VisionConfig::default();
        config.detector_models.retain(|m| m.file != FALLBACK_DETECTOR_FILE);
        let manager = ModelManager::new(Arc::new(config));
        assert_eq!(manager.ensure_fallback_detector().await.unwrap(), None);
    }

    #[test]
    fn test_check_download() {
        let payload = vec![7u8; 2048];
        assert!(check_download(&payload, "").is_ok());
        assert!(check_download(&[0u8; 10], "").is_err());

        let digest = hex::encode(Sha256::digest(&payload));
        assert!(check_download(&payload, &digest).is_ok());
        assert!(check_download(&payload, &digest.to_uppercase()).is_ok());
        assert!(check_download(&payload, "deadbeef").is_err());
    }
}
