//! Configuration for ecovision-eye

use crate::models::device::DevicePreference;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One detector candidate, tried in list order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectorModelConfig {
    pub name: String,
    /// ONNX file name inside `model_dir`
    pub file: String,
}

/// One segmenter candidate: an encoder/decoder ONNX pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmenterModelConfig {
    pub name: String,
    pub encoder: String,
    pub decoder: String,
}

/// Vision system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    /// Directory holding the ONNX files
    pub model_dir: PathBuf,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub device: DevicePreference,
    /// Load a segmenter at startup
    pub enable_segmentation: bool,
    /// Fetch the fallback detector when it is missing
    pub auto_download: bool,
    /// Detector candidates, preferred first
    pub detector_models: Vec<DetectorModelConfig>,
    /// Segmenter candidates, preferred first
    pub segmenter_models: Vec<SegmenterModelConfig>,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            detector_models: vec![
                DetectorModelConfig {
                    name: "yolov10e".to_string(),
                    file: "yolov10e.onnx".to_string(),
                },
                DetectorModelConfig {
                    name: "yolov8n".to_string(),
                    file: "yolov8n.onnx".to_string(),
                },
            ],
            segmenter_models: vec![
                SegmenterModelConfig {
                    name: "sam2".to_string(),
                    encoder: "sam2_encoder.onnx".to_string(),
                    decoder: "sam2_decoder.onnx".to_string(),
                },
                SegmenterModelConfig {
                    name: "sam".to_string(),
                    encoder: "sam_encoder.onnx".to_string(),
                    decoder: "sam_decoder.onnx".to_string(),
                },
            ],
            confidence_threshold: 0.25,
            iou_threshold: 0.45,
            device: DevicePreference::Auto,
            enable_segmentation: true,
            auto_download: false,
        }
    }
}

impl VisionConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.confidence_threshold.is_finite()
            || self.confidence_threshold <= 0.0
            || self.confidence_threshold > 1.0
        {
            return Err("Confidence threshold must be in (0, 1]".to_string());
        }

        if !self.iou_threshold.is_finite() || !(0.0..=1.0).contains(&self.iou_threshold) {
            return Err("IoU threshold must be in [0, 1]".to_string());
        }

        if self.detector_models.is_empty() {
            return Err("At least one detector model must be configured".to_string());
        }

        if self.enable_segmentation && self.segmenter_models.is_empty() {
            return Err("Segmentation enabled but no segmenter models configured".to_string());
        }

        for model in &self.detector_models {
            check_model_file(&model.file)?;
        }
        for model in &self.segmenter_models {
            check_model_file(&model.encoder)?;
            check_model_file(&model.decoder)?;
        }

        Ok(())
    }

    pub fn detector_path(&self, model: &DetectorModelConfig) -> PathBuf {
        self.model_dir.join(&model.file)
    }

    pub fn segmenter_paths(&self, model: &SegmenterModelConfig) -> (PathBuf, PathBuf) {
        (self.model_dir.join(&model.encoder), self.model_dir.join(&model.decoder))
    }
}

/// Plain file name: no separators, no traversal, no control characters.
pub fn is_safe_model_file(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 255
        && !name.contains("..")
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains('\0')
        && !name.chars().any(|c| c.is_control())
}

fn check_model_file(name: &str) -> Result<(), String> {
    if is_safe_model_file(name) {
        Ok(())
    } else {
        Err(format!("Invalid model file name: {:?}", name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = VisionConfig::default();
        assert_eq!(config.confidence_threshold, 0.25);
        assert_eq!(config.iou_threshold, 0.45);
        assert_eq!(config.device, DevicePreference::Auto);
        assert!(config.enable_segmentation);
        assert!(!config.auto_download);
        assert_eq!(config.detector_models[0].name, "yolov10e");
        assert_eq!(config.detector_models[1].file, "yolov8n.onnx");
        assert_eq!(config.segmenter_models[0].name, "sam2");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_thresholds() {
        let mut config = VisionConfig::default();
        config.confidence_threshold = 0.0;
        assert!(config.validate().is_err());

        config.confidence_threshold = 1.0;
        assert!(config.validate().is_ok());

        config.confidence_threshold = 1.5;
        assert!(config.validate().is_err());

        config.confidence_threshold = 0.25;
        config.iou_threshold = -0.1;
        assert!(config.validate().is_err());

        config.iou_threshold = f32::NAN;
        assert!(config.validate().is_err());

        config.iou_threshold = 0.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_candidates() {
        let mut config = VisionConfig::default();
        config.detector_models.clear();
        assert!(config.validate().is_err());

        let mut config = VisionConfig::default();
        config.segmenter_models.clear();
        assert!(config.validate().is_err());
        config.enable_segmentation = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_unsafe_names() {
        let mut config = VisionConfig::default();
        config.detector_models[0].file = "../etc/passwd".to_string();
        assert!(config.validate().is_err());

        let mut config = VisionConfig::default();
        config.segmenter_models[1].decoder = "sub/dir.onnx".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_safe_model_file() {
        assert!(is_safe_model_file("yolov8n.onnx"));
        assert!(!is_safe_model_file(""));
        assert!(!is_safe_model_file("a\\b.onnx"));
        assert!(!is_safe_model_file("bad\0name"));
        assert!(!is_safe_model_file(&"x".repeat(256)));
    }

    #[test]
    fn test_paths_join_model_dir() {
        let mut config = VisionConfig::default();
        config.model_dir = PathBuf::from("/opt/models");
        let detector = config.detector_models[1].clone();
        assert_eq!(config.detector_path(&detector), PathBuf::from("/opt/models/yolov8n.onnx"));
        let (enc, dec) = config.segmenter_paths(&config.segmenter_models[0].clone());
        assert_eq!(enc, PathBuf::from("/opt/models/sam2_encoder.onnx"));
        assert_eq!(dec, PathBuf::from("/opt/models/sam2_decoder.onnx"));
    }

    #[test]
    fn test_partial_deserialize_uses_defaults() {
        let config: VisionConfig = serde_json::from_str(r#"{"confidence_threshold": 0.5}"#).unwrap();
        assert_eq!(config.confidence_threshold, 0.5);
        assert_eq!(config.iou_threshold, 0.45);
        assert_eq!(config.detector_models.len(), 2);
    }
}
