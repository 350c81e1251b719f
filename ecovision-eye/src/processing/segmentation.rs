//! Box-prompted segmentation adapter

use crate::config::VisionConfig;
use crate::error::VisionError;
use crate::models::device::Device;
use crate::models::sam::SamModel;
use crate::types::{BoundingBox, Mask};
use image::RgbImage;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error, info, warn};

/// A loaded mask predictor.
pub trait MaskPredictor: Send + Sync {
    fn model_name(&self) -> &str;
    fn predict(&self, image: &RgbImage, bbox: &BoundingBox) -> Result<Mask, VisionError>;
}

/// One segmenter candidate that may or may not load.
pub trait SegmenterLoader {
    fn model_name(&self) -> &str;
    fn load(&self, device: Device) -> Result<Box<dyn MaskPredictor>, VisionError>;
}

/// Loads a SAM encoder/decoder pair from disk.
pub struct SamLoader {
    name: String,
    encoder: PathBuf,
    decoder: PathBuf,
}

impl SamLoader {
    pub fn new(name: impl Into<String>, encoder: impl Into<PathBuf>, decoder: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            encoder: encoder.into(),
            decoder: decoder.into(),
        }
    }

    pub fn candidates(config: &VisionConfig) -> Vec<Box<dyn SegmenterLoader>> {
        config
            .segmenter_models
            .iter()
            .map(|m| {
                let (encoder, decoder) = config.segmenter_paths(m);
                Box::new(SamLoader::new(m.name.clone(), encoder, decoder)) as Box<dyn SegmenterLoader>
            })
            .collect()
    }
}

impl SegmenterLoader for SamLoader {
    fn model_name(&self) -> &str {
        &self.name
    }

    fn load(&self, device: Device) -> Result<Box<dyn MaskPredictor>, VisionError> {
        let model = SamModel::load(self.name.clone(), &self.encoder, &self.decoder, device)?;
        Ok(Box::new(model))
    }
}

/// Owns the active mask predictor and counts zero-mask substitutions.
pub struct SegmenterAdapter {
    predictor: Option<Box<dyn MaskPredictor>>,
    device: Device,
    fallbacks: AtomicU64,
}

impl SegmenterAdapter {
    /// Try candidates in order; the first that loads becomes active.
    pub fn initialize(candidates: Vec<Box<dyn SegmenterLoader>>, device: Device) -> Self {
        for candidate in candidates {
            match candidate.load(device) {
                Ok(predictor) => {
                    info!("Segmenter ready: {} on {}", predictor.model_name(), device);
                    return Self {
                        predictor: Some(predictor),
                        device,
                        fallbacks: AtomicU64::new(0),
                    };
                }
                Err(e) => warn!("Failed to load segmenter '{}': {}", candidate.model_name(), e),
            }
        }

        warn!("No segmenter could be loaded; masks will be null");
        Self::unavailable(device)
    }

    pub fn unavailable(device: Device) -> Self {
        Self {
            predictor: None,
            device,
            fallbacks: AtomicU64::new(0),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.predictor.is_some()
    }

    pub fn model_name(&self) -> Option<&str> {
        self.predictor.as_ref().map(|p| p.model_name())
    }

    pub fn device(&self) -> Device {
        self.device
    }

    /// Number of predictor failures replaced by an empty mask.
    pub fn fallback_count(&self) -> u64 {
        self.fallbacks.load(Ordering::Relaxed)
    }

    /// Mask for one box. Predictor failures yield an all-zero mask of the
    /// image's size; only a missing predictor is an error.
    pub fn segment(&self, image: &RgbImage, bbox: &BoundingBox) -> Result<Mask, VisionError> {
        let predictor = self
            .predictor
            .as_ref()
            .ok_or_else(|| VisionError::ModelUnavailable("Segmenter not loaded".to_string()))?;

        match predictor.predict(image, bbox) {
            Ok(mask) if mask.width() == image.width() && mask.height() == image.height() => {
                debug!("Segmented box {:?}: {} pixels", bbox.as_array(), mask.area());
                Ok(mask)
            }
            Ok(mask) => {
                self.fallbacks.fetch_add(1, Ordering::Relaxed);
                error!(
                    "Segmentation returned {}x{} mask for {}x{} image",
                    mask.width(),
                    mask.height(),
                    image.width(),
                    image.height()
                );
                Ok(Mask::empty(image.width(), image.height()))
            }
            Err(e) => {
                self.fallbacks.fetch_add(1, Ordering::Relaxed);
                error!("Segmentation failed: {}", e);
                Ok(Mask::empty(image.width(), image.height()))
            }
        }
    }

    pub fn unload(&mut self) {
        if let Some(predictor) = self.predictor.take() {
            info!("Unloading segmenter {}", predictor.model_name());
        }
    }
}
