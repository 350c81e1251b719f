//! SAM (Segment Anything Model) box-prompted segmentation
//!
//! Works with encoder/decoder ONNX exports of SAM and SAM2. Encoder outputs
//! are forwarded to the decoder by name, so both families share one path.

use crate::error::VisionError;
use crate::models::build_session;
use crate::models::device::Device;
use crate::processing::segmentation::MaskPredictor;
use crate::types::{BoundingBox, Mask};
use crate::utils::{apply_imagenet_normalization, pad_chw, resize_longest_side, rgb_to_chw};
use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};
use ort::session::Session;
use ort::value::Tensor;
use parking_lot::Mutex;
use std::path::Path;
use tracing::{debug, info};

pub const ENCODER_SIZE: u32 = 1024;
const LOW_RES_MASK: usize = 256;

/// Point labels for the top-left and bottom-right box corners.
const BOX_LABELS: [f32; 2] = [2.0, 3.0];

/// One named encoder output kept for the decoder.
#[derive(Debug, Clone)]
struct Feature {
    name: String,
    shape: Vec<usize>,
    data: Vec<f32>,
}

/// Box corners in the encoder's resized frame, as decoder point inputs.
pub fn box_prompt(bbox: &BoundingBox, scale: f32) -> [f32; 4] {
    [bbox.x1 * scale, bbox.y1 * scale, bbox.x2 * scale, bbox.y2 * scale]
}

/// Threshold mask logits at 0 and bring the mask to `width x height`.
pub fn logits_to_mask(
    logits: &[f32],
    mask_w: u32,
    mask_h: u32,
    width: u32,
    height: u32,
) -> Result<Mask, VisionError> {
    if logits.len() != mask_w as usize * mask_h as usize {
        return Err(VisionError::Processing(format!(
            "Mask logits have {} values for {}x{}",
            logits.len(),
            mask_w,
            mask_h
        )));
    }

    let binary: Vec<u8> = logits
        .iter()
        .map(|&v| if v > 0.0 { Mask::ON } else { Mask::OFF })
        .collect();

    if (mask_w, mask_h) == (width, height) {
        return Mask::from_raw(width, height, binary)
            .ok_or_else(|| VisionError::Processing("Mask size mismatch".to_string()));
    }

    let gray = GrayImage::from_raw(mask_w, mask_h, binary)
        .ok_or_else(|| VisionError::Processing("Mask size mismatch".to_string()))?;
    let resized = imageops::resize(&gray, width, height, FilterType::Nearest);
    Mask::from_raw(width, height, resized.into_raw())
        .ok_or_else(|| VisionError::Processing("Mask size mismatch".to_string()))
}

/// SAM model for instance segmentation
pub struct SamModel {
    name: String,
    encoder: Mutex<Session>,
    decoder: Mutex<Session>,
    encoder_input: String,
    encoder_outputs: Vec<String>,
    decoder_inputs: Vec<String>,
    device: Device,
}

impl SamModel {
    /// Load an encoder/decoder pair
    pub fn load(
        name: impl Into<String>,
        encoder_path: &Path,
        decoder_path: &Path,
        device: Device,
    ) -> Result<Self, VisionError> {
        let name = name.into();
        let encoder = build_session(encoder_path, device)?;
        let decoder = build_session(decoder_path, device)?;

        let encoder_input = encoder
            .inputs
            .first()
            .map(|input| input.name.clone())
            .ok_or_else(|| VisionError::Model("SAM encoder declares no inputs".to_string()))?;
        let encoder_outputs = encoder.outputs.iter().map(|o| o.name.clone()).collect();
        let decoder_inputs = decoder.inputs.iter().map(|i| i.name.clone()).collect();

        info!("SAM model '{}' loaded from {:?} + {:?} on {}", name, encoder_path, decoder_path, device);

        Ok(Self {
            name,
            encoder: Mutex::new(encoder),
            decoder: Mutex::new(decoder),
            encoder_input,
            encoder_outputs,
            decoder_inputs,
            device,
        })
    }

    pub fn device(&self) -> Device {
        self.device
    }

    fn encode(&self, image: &RgbImage) -> Result<(Vec<Feature>, f32), VisionError> {
        let (resized, scale) = resize_longest_side(image, ENCODER_SIZE)?;
        let mut data = rgb_to_chw(&resized);
        apply_imagenet_normalization(&mut data);

        let size = ENCODER_SIZE as usize;
        let padded = pad_chw(&data, resized.width() as usize, resized.height() as usize, size)?;
        let input = Tensor::from_array(([1usize, 3, size, size], padded))
            .map_err(|e| VisionError::Ort(format!("Failed to create image tensor: {}", e)))?;

        let mut session = self.encoder.lock();
        let outputs = session
            .run(ort::inputs![self.encoder_input.as_str() => input])
            .map_err(|e| VisionError::Ort(format!("SAM encoder failed: {}", e)))?;

        let mut features = Vec::with_capacity(self.encoder_outputs.len());
        for name in &self.encoder_outputs {
            let (shape, data) = outputs[name.as_str()]
                .try_extract_tensor::<f32>()
                .map_err(|e| VisionError::Ort(format!("Failed to extract '{}': {}", name, e)))?;
            features.push(Feature {
                name: name.clone(),
                shape: shape.iter().map(|&d| d.max(0) as usize).collect(),
                data: data.to_vec(),
            });
        }

        Ok((features, scale))
    }

    fn decoder_input(
        &self,
        name: &str,
        features: &[Feature],
        points: [f32; 4],
        image: &RgbImage,
    ) -> Result<Tensor<f32>, VisionError> {
        let tensor = if let Some(feature) = features.iter().find(|f| f.name == name) {
            Tensor::from_array((feature.shape.clone(), feature.data.clone()))
        } else {
            match name {
                "point_coords" => Tensor::from_array(([1usize, 2, 2], points.to_vec())),
                "point_labels" => Tensor::from_array(([1usize, 2], BOX_LABELS.to_vec())),
                "mask_input" => Tensor::from_array((
                    [1usize, 1, LOW_RES_MASK, LOW_RES_MASK],
                    vec![0.0f32; LOW_RES_MASK * LOW_RES_MASK],
                )),
                "has_mask_input" => Tensor::from_array(([1usize], vec![0.0f32])),
                "orig_im_size" => Tensor::from_array((
                    [2usize],
                    vec![image.height() as f32, image.width() as f32],
                )),
                other => {
                    return Err(VisionError::Model(format!(
                        "SAM decoder input '{}' has no source",
                        other
                    )))
                }
            }
        };

        tensor.map_err(|e| VisionError::Ort(format!("Failed to create '{}' tensor: {}", name, e)))
    }
}

impl MaskPredictor for SamModel {
    fn model_name(&self) -> &str {
        &self.name
    }

    fn predict(&self, image: &RgbImage, bbox: &BoundingBox) -> Result<Mask, VisionError> {
        if !bbox.is_valid() {
            return Err(VisionError::InvalidInput(format!("Invalid box prompt {:?}", bbox.as_array())));
        }

        let (features, scale) = self.encode(image)?;
        let points = box_prompt(bbox, scale);

        let mut inputs = Vec::with_capacity(self.decoder_inputs.len());
        for name in &self.decoder_inputs {
            inputs.push((name.clone(), self.decoder_input(name, &features, points, image)?));
        }

        let mut session = self.decoder.lock();
        let outputs = session
            .run(inputs)
            .map_err(|e| VisionError::Ort(format!("SAM decoder failed: {}", e)))?;

        let (shape, logits) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| VisionError::Ort(format!("Failed to extract mask tensor: {}", e)))?;

        // [1, N, H, W]; the first mask is the single-mask output
        if shape.len() != 4 || shape.iter().any(|&d| d <= 0) {
            return Err(VisionError::Model(format!("Unexpected SAM mask shape {:?}", shape)));
        }
        let (mask_h, mask_w) = (shape[2] as u32, shape[3] as u32);
        let plane = mask_h as usize * mask_w as usize;
        let first = logits
            .get(..plane)
            .ok_or_else(|| VisionError::Model("SAM mask tensor is truncated".to_string()))?;

        let mask = logits_to_mask(first, mask_w, mask_h, image.width(), image.height())?;
        debug!("Generated mask {}x{} with {} pixels", mask.width(), mask.height(), mask.area());
        Ok(mask)
    }
}
