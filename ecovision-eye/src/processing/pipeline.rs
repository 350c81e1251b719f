//! Per-request detection pipeline
//!
//! `InferenceContext` owns the detector, the segmenter and the mapper. It is
//! built once at startup, shared behind an `Arc`, and torn down with
//! [`InferenceContext::shutdown`].

use crate::codec::{decode_base64_image, decode_pixels, encode_mask_png};
use crate::config::VisionConfig;
use crate::error::VisionError;
use crate::mapper::{MappedDetection, WasteMapper};
use crate::models::device::Device;
use crate::models::manager::ModelManager;
use crate::processing::detection::{DetectorAdapter, YoloLoader};
use crate::processing::segmentation::{SamLoader, SegmenterAdapter};
use image::RgbImage;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const NO_IMAGE_MESSAGE: &str = "No image provided. Send 'image' file or 'image_base64' string.";

/// Where the request image came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Upload(Vec<u8>),
    Base64(String),
}

impl ImageSource {
    /// Exactly one source must be present. A blank base64 field counts as absent.
    pub fn from_parts(upload: Option<Vec<u8>>, base64: Option<String>) -> Result<Self, VisionError> {
        let base64 = base64.filter(|s| !s.trim().is_empty());
        match (upload, base64) {
            (Some(bytes), None) => Ok(ImageSource::Upload(bytes)),
            (None, Some(text)) => Ok(ImageSource::Base64(text)),
            (None, None) => Err(VisionError::InvalidInput(NO_IMAGE_MESSAGE.to_string())),
            (Some(_), Some(_)) => Err(VisionError::InvalidInput(
                "Send either 'image' file or 'image_base64' string, not both.".to_string(),
            )),
        }
    }

    pub fn into_bytes(self) -> Result<Vec<u8>, VisionError> {
        let bytes = match self {
            ImageSource::Upload(bytes) => {
                debug!("Received image file, size: {} bytes", bytes.len());
                bytes
            }
            ImageSource::Base64(text) => {
                let bytes = decode_base64_image(&text)?;
                debug!("Received base64 image, decoded size: {} bytes", bytes.len());
                bytes
            }
        };

        if bytes.is_empty() {
            return Err(VisionError::InvalidInput("Failed to decode image".to_string()));
        }
        Ok(bytes)
    }
}

#[derive(Debug, Clone)]
pub struct DetectionRequest {
    pub source: ImageSource,
    pub segmentation: bool,
}

/// Response contract. `masks` is present iff segmentation was requested.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionResponse {
    pub success: bool,
    pub detections: Vec<MappedDetection>,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub masks: Option<Vec<Option<String>>>,
}

impl DetectionResponse {
    fn new(detections: Vec<MappedDetection>, masks: Option<Vec<Option<String>>>) -> Self {
        Self {
            success: true,
            count: detections.len(),
            detections,
            masks,
        }
    }
}

pub struct InferenceContext {
    detector: RwLock<DetectorAdapter>,
    segmenter: RwLock<SegmenterAdapter>,
    mapper: WasteMapper,
}

impl InferenceContext {
    /// Assemble a context from already-initialized adapters.
    pub fn new(detector: DetectorAdapter, segmenter: SegmenterAdapter) -> Self {
        Self {
            detector: RwLock::new(detector),
            segmenter: RwLock::new(segmenter),
            mapper: WasteMapper::new(),
        }
    }

    /// Load models according to `config`. Only an invalid configuration is an
    /// error; missing models leave the matching adapter not ready.
    pub async fn initialize(config: &VisionConfig) -> Result<Arc<Self>, VisionError> {
        config.validate().map_err(VisionError::Config)?;

        let device = Device::resolve(config.device);

        if config.auto_download {
            let manager = ModelManager::new(Arc::new(config.clone()));
            if let Err(e) = manager.ensure_fallback_detector().await {
                warn!("Could not fetch fallback detector: {}", e);
            }
        }

        info!("Loading detector...");
        let detector = DetectorAdapter::initialize(YoloLoader::candidates(config), device);

        let segmenter = if config.enable_segmentation {
            info!("Loading segmenter...");
            SegmenterAdapter::initialize(SamLoader::candidates(config), device)
        } else {
            info!("Segmentation disabled by configuration");
            SegmenterAdapter::unavailable(device)
        };

        Ok(Arc::new(Self::new(detector, segmenter)))
    }

    /// Unload both models. Later requests see an unavailable detector.
    pub fn shutdown(&self) {
        self.detector.write().unload();
        self.segmenter.write().unload();
        info!("Models unloaded");
    }

    pub fn mapper(&self) -> &WasteMapper {
        &self.mapper
    }

    pub fn detector_status(&self) -> AdapterStatus {
        let detector = self.detector.read();
        AdapterStatus {
            loaded: detector.is_ready(),
            model: detector.model_name().map(str::to_string),
            device: detector.is_ready().then(|| detector.device()),
            fallbacks: None,
        }
    }

    pub fn segmenter_status(&self) -> AdapterStatus {
        let segmenter = self.segmenter.read();
        AdapterStatus {
            loaded: segmenter.is_ready(),
            model: segmenter.model_name().map(str::to_string),
            device: segmenter.is_ready().then(|| segmenter.device()),
            fallbacks: Some(segmenter.fallback_count()),
        }
    }

    /// Run one request to completion. Blocking; call from a blocking pool.
    pub fn run(&self, request: DetectionRequest) -> Result<DetectionResponse, VisionError> {
        let bytes = request.source.into_bytes()?;
        let image = decode_pixels(&bytes)?;

        let detector = self.detector.read();
        if !detector.is_ready() {
            return Err(VisionError::ModelUnavailable(
                "Detector not loaded. Check server logs.".to_string(),
            ));
        }

        let detections = match detector.detect(&image) {
            Ok(detections) => detections,
            Err(VisionError::InvalidInput(msg)) => return Err(VisionError::Processing(msg)),
            Err(e) => return Err(e),
        };
        drop(detector);

        if detections.is_empty() {
            return Ok(DetectionResponse::new(
                Vec::new(),
                request.segmentation.then(Vec::new),
            ));
        }

        let mapped: Vec<MappedDetection> = detections
            .iter()
            .map(|d| self.mapper.map_detection(d))
            .collect();

        let masks = if request.segmentation {
            Some(self.segment_all(&image, &mapped))
        } else {
            None
        };

        info!("Detection complete: {} objects found", mapped.len());
        Ok(DetectionResponse::new(mapped, masks))
    }

    fn segment_all(&self, image: &RgbImage, detections: &[MappedDetection]) -> Vec<Option<String>> {
        let segmenter = self.segmenter.read();
        if !segmenter.is_ready() {
            warn!("Segmentation requested but no segmenter is available");
            return vec![None; detections.len()];
        }

        debug!("Running segmentation for {} detections", detections.len());
        collect_masks(detections, |d| {
            segmenter
                .segment(image, &d.bbox)
                .and_then(|m| encode_mask_png(&m))
        })
    }
}

/// One entry per item, in order. A failed item becomes `None` without
/// affecting its neighbours.
fn collect_masks<T, F>(items: &[T], mut segment: F) -> Vec<Option<String>>
where
    F: FnMut(&T) -> Result<String, VisionError>,
{
    items
        .iter()
        .enumerate()
        .map(|(i, item)| match segment(item) {
            Ok(url) => Some(url),
            Err(e) => {
                warn!("Segmentation failed for detection {}: {}", i, e);
                None
            }
        })
        .collect()
}

/// Readiness of one model slot, as reported by `/health`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdapterStatus {
    pub loaded: bool,
    pub model: Option<String>,
    pub device: Option<Device>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallbacks: Option<u64>,
}
