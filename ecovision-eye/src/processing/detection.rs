//! Object detection adapter

use crate::config::VisionConfig;
use crate::error::VisionError;
use crate::models::device::Device;
use crate::models::yolo::{Thresholds, YoloModel};
use crate::types::Detection;
use image::RgbImage;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// A loaded detector. Thresholds are applied before results are returned.
pub trait ObjectDetector: Send + Sync {
    fn model_name(&self) -> &str;
    fn device(&self) -> Device;
    fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>, VisionError>;
}

/// One detector candidate that may or may not load.
pub trait DetectorLoader {
    fn model_name(&self) -> &str;
    fn load(&self, device: Device) -> Result<Box<dyn ObjectDetector>, VisionError>;
}

/// Loads a YOLO ONNX export from disk.
pub struct YoloLoader {
    name: String,
    path: PathBuf,
    thresholds: Thresholds,
}

impl YoloLoader {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, thresholds: Thresholds) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            thresholds,
        }
    }

    /// Candidates from configuration, preferred first.
    pub fn candidates(config: &VisionConfig) -> Vec<Box<dyn DetectorLoader>> {
        let thresholds = Thresholds {
            confidence: config.confidence_threshold,
            iou: config.iou_threshold,
        };
        config
            .detector_models
            .iter()
            .map(|m| {
                Box::new(YoloLoader::new(m.name.clone(), config.detector_path(m), thresholds))
                    as Box<dyn DetectorLoader>
            })
            .collect()
    }
}

impl DetectorLoader for YoloLoader {
    fn model_name(&self) -> &str {
        &self.name
    }

    fn load(&self, device: Device) -> Result<Box<dyn ObjectDetector>, VisionError> {
        let model = YoloModel::load(self.name.clone(), &self.path, device, self.thresholds)?;
        Ok(Box::new(model))
    }
}

/// Owns the active detector, if any candidate loaded.
pub struct DetectorAdapter {
    detector: Option<Box<dyn ObjectDetector>>,
    device: Device,
}

impl DetectorAdapter {
    /// Try candidates in order; the first that loads becomes active.
    pub fn initialize(candidates: Vec<Box<dyn DetectorLoader>>, device: Device) -> Self {
        for candidate in candidates {
            match candidate.load(device) {
                Ok(detector) => {
                    info!("Detector ready: {} on {}", detector.model_name(), detector.device());
                    return Self {
                        detector: Some(detector),
                        device,
                    };
                }
                Err(e) => warn!("Failed to load detector '{}': {}", candidate.model_name(), e),
            }
        }

        warn!("No detector could be loaded; detection requests will be rejected");
        Self::unavailable(device)
    }

    pub fn unavailable(device: Device) -> Self {
        Self {
            detector: None,
            device,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.detector.is_some()
    }

    pub fn model_name(&self) -> Option<&str> {
        self.detector.as_ref().map(|d| d.model_name())
    }

    pub fn device(&self) -> Device {
        self.detector.as_ref().map(|d| d.device()).unwrap_or(self.device)
    }

    pub fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>, VisionError> {
        let detector = self
            .detector
            .as_ref()
            .ok_or_else(|| VisionError::ModelUnavailable("Detector not loaded".to_string()))?;

        debug!("Running object detection on {}x{} image", image.width(), image.height());
        let detections = detector.detect(image)?;
        debug!("Detected {} objects", detections.len());
        Ok(detections)
    }

    /// Drop the loaded model.
    pub fn unload(&mut self) {
        if let Some(detector) = self.detector.take() {
            info!("Unloading detector {}", detector.model_name());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BoundingBox;

    struct StubDetector(&'static str);

    impl ObjectDetector for StubDetector {
        fn model_name(&self) -> &str {
            self.0
        }
        fn device(&self) -> Device {
            Device::Cpu
        }
        fn detect(&self, _image: &RgbImage) -> Result<Vec<Detection>, VisionError> {
            Ok(vec![Detection::new(BoundingBox::new(0.0, 0.0, 1.0, 1.0), 0.9, 39, "bottle")])
        }
    }

    struct StubLoader {
        name: &'static str,
        ok: bool,
    }

    impl DetectorLoader for StubLoader {
        fn model_name(&self) -> &str {
            self.name
        }
        fn load(&self, _device: Device) -> Result<Box<dyn ObjectDetector>, VisionError> {
            if self.ok {
                Ok(Box::new(StubDetector(self.name)))
            } else {
                Err(VisionError::Model(format!("{} missing", self.name)))
            }
        }
    }

    fn loaders(outcomes: &[(&'static str, bool)]) -> Vec<Box<dyn DetectorLoader>> {
        outcomes.iter()
            .map(|&(name, ok)| Box::new(StubLoader { name, ok }) as Box<dyn DetectorLoader>)
            .collect()
    }

    #[test]
    fn test_first_loadable_candidate_wins() {
        let adapter = DetectorAdapter::initialize(
            loaders(&[("yolov10e", false), ("yolov8n", true), ("other", true)]),
            Device::Cpu,
        );
        assert!(adapter.is_ready());
        assert_eq!(adapter.model_name(), Some("yolov8n"));
    }

    #[test]
    fn test_all_candidates_fail() {
        let adapter = DetectorAdapter::initialize(loaders(&[("a", false), ("b", false)]), Device::Cpu);
        assert!(!adapter.is_ready());
        assert_eq!(adapter.model_name(), None);
        let err = adapter.detect(&RgbImage::new(4, 4)).unwrap_err();
        assert!(err.is_unavailable());
    }

    #[test]
    fn test_unload() {
        let mut adapter = DetectorAdapter::initialize(loaders(&[("a", true)]), Device::Cpu);
        assert_eq!(adapter.detect(&RgbImage::new(4, 4)).unwrap().len(), 1);
        adapter.unload();
        assert!(!adapter.is_ready());
    }

    #[test]
    fn test_yolo_loader_missing_file() {
        let loader = YoloLoader::new("yolov8n", "/nonexistent/yolov8n.onnx", Thresholds::default());
        assert!(loader.load(Device::Cpu).is_err());
    }

    #[test]
    fn test_candidates_follow_config_order() {
        let config = VisionConfig::default();
        let names: Vec<String> = YoloLoader::candidates(&config)
            .iter()
            .map(|c| c.model_name().to_string())
            .collect();
        assert_eq!(names, vec!["yolov10e", "yolov8n"]);
    }
}
