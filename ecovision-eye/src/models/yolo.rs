//! YOLO object detection model

use crate::error::VisionError;
use crate::models::build_session;
use crate::models::device::Device;
use crate::processing::detection::ObjectDetector;
use crate::types::{BoundingBox, Detection};
use crate::utils::{letterbox, rgb_to_chw, Letterbox};
use image::RgbImage;
use ort::session::Session;
use ort::value::Tensor;
use parking_lot::Mutex;
use std::path::Path;
use tracing::{debug, info};

/// COCO class names (80 classes)
pub const COCO_CLASSES: &[&str] = &[
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat",
    "dog", "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack",
    "umbrella", "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball",
    "kite", "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket",
    "bottle", "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple",
    "sandwich", "orange", "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair",
    "couch", "potted plant", "bed", "dining table", "toilet", "tv", "laptop", "mouse",
    "remote", "keyboard", "cell phone", "microwave", "oven", "toaster", "sink", "refrigerator",
    "book", "clock", "vase", "scissors", "teddy bear", "hair drier", "toothbrush",
];

pub const INPUT_SIZE: u32 = 640;
const PAD_VALUE: u8 = 114;
const MAX_DETECTIONS: usize = 300;

/// Label for a class index; ids outside the COCO table become `class_<id>`.
pub fn class_name(class_id: u32) -> String {
    COCO_CLASSES
        .get(class_id as usize)
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("class_{}", class_id))
}

/// Score thresholds fixed for the lifetime of a model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub confidence: f32,
    pub iou: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            confidence: 0.25,
            iou: 0.45,
        }
    }
}

/// Output tensor layouts the decoder understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputLayout {
    /// `[1, 4 + nc, N]`: center boxes followed by per-class scores (YOLOv8)
    Anchors { num_classes: usize, num_anchors: usize },
    /// `[1, N, 6]`: `x1, y1, x2, y2, score, class` (YOLOv10)
    EndToEnd { num_boxes: usize },
}

impl OutputLayout {
    pub fn from_shape(shape: &[i64]) -> Result<Self, VisionError> {
        if shape.len() != 3 || shape[0] != 1 || shape.iter().any(|&d| d <= 0) {
            return Err(VisionError::Model(format!("Unsupported YOLO output shape {:?}", shape)));
        }

        let (rows, cols) = (shape[1] as usize, shape[2] as usize);
        if cols == 6 {
            Ok(OutputLayout::EndToEnd { num_boxes: rows })
        } else if rows > 4 {
            Ok(OutputLayout::Anchors {
                num_classes: rows - 4,
                num_anchors: cols,
            })
        } else {
            Err(VisionError::Model(format!("Unsupported YOLO output shape {:?}", shape)))
        }
    }
}

/// Decode a raw output tensor into source-image detections.
///
/// Boxes are mapped back through the letterbox, clipped to the source image,
/// and dropped when below `confidence` or degenerate. No NMS is applied here.
pub fn decode_output(
    shape: &[i64],
    data: &[f32],
    transform: &Letterbox,
    image_size: (u32, u32),
    confidence: f32,
) -> Result<Vec<Detection>, VisionError> {
    let layout = OutputLayout::from_shape(shape)?;
    let expected: usize = shape.iter().map(|&d| d as usize).product();
    if data.len() != expected {
        return Err(VisionError::Model(format!(
            "YOLO output has {} values, shape {:?} needs {}",
            data.len(),
            shape,
            expected
        )));
    }

    let (img_w, img_h) = (image_size.0 as f32, image_size.1 as f32);
    let mut detections = Vec::new();

    let mut push = |raw: BoundingBox, score: f32, class_id: u32| {
        if !score.is_finite() || score < confidence {
            return;
        }
        let bbox = transform.to_source(&raw).clip(img_w, img_h);
        if !bbox.is_valid() {
            return;
        }
        detections.push(Detection::new(bbox, score.min(1.0), class_id, class_name(class_id)));
    };

    match layout {
        OutputLayout::Anchors {
            num_classes,
            num_anchors,
        } => {
            let at = |row: usize, i: usize| data[row * num_anchors + i];
            for i in 0..num_anchors {
                let (mut best_class, mut best_score) = (0usize, f32::NEG_INFINITY);
                for c in 0..num_classes {
                    let score = at(4 + c, i);
                    if score > best_score {
                        best_score = score;
                        best_class = c;
                    }
                }
                let bbox = BoundingBox::from_center(at(0, i), at(1, i), at(2, i), at(3, i));
                push(bbox, best_score, best_class as u32);
            }
        }
        OutputLayout::EndToEnd { num_boxes } => {
            for row in data.chunks_exact(6).take(num_boxes) {
                let class = row[5];
                if !class.is_finite() || class < 0.0 {
                    continue;
                }
                let bbox = BoundingBox::new(row[0], row[1], row[2], row[3]);
                push(bbox, row[4], class.round() as u32);
            }
        }
    }

    Ok(detections)
}

/// Class-aware non-maximum suppression; output sorted by descending confidence.
pub fn non_max_suppression(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    detections.retain(|d| d.confidence.is_finite());
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep = Vec::new();
    let mut suppressed = vec![false; detections.len()];

    for i in 0..detections.len() {
        if suppressed[i] {
            continue;
        }

        for j in (i + 1)..detections.len() {
            if suppressed[j] || detections[j].class_id != detections[i].class_id {
                continue;
            }
            if detections[i].bbox.iou(&detections[j].bbox) > iou_threshold {
                suppressed[j] = true;
            }
        }

        keep.push(detections[i].clone());
        if keep.len() == MAX_DETECTIONS {
            break;
        }
    }

    keep
}

/// YOLO model for object detection
pub struct YoloModel {
    name: String,
    session: Mutex<Session>,
    input_name: String,
    device: Device,
    thresholds: Thresholds,
}

impl YoloModel {
    /// Load a YOLO ONNX export
    pub fn load(
        name: impl Into<String>,
        model_path: &Path,
        device: Device,
        thresholds: Thresholds,
    ) -> Result<Self, VisionError> {
        let name = name.into();
        let session = build_session(model_path, device)?;
        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .unwrap_or_else(|| "images".to_string());

        info!("YOLO model '{}' loaded from {:?} on {}", name, model_path, device);

        Ok(Self {
            name,
            session: Mutex::new(session),
            input_name,
            device,
            thresholds,
        })
    }

    fn preprocess(&self, image: &RgbImage) -> Result<(Tensor<f32>, Letterbox), VisionError> {
        let (padded, transform) = letterbox(image, INPUT_SIZE, PAD_VALUE)?;
        let data = rgb_to_chw(&padded);
        let size = INPUT_SIZE as usize;
        let tensor = Tensor::from_array(([1usize, 3, size, size], data))
            .map_err(|e| VisionError::Ort(format!("Failed to create input tensor: {}", e)))?;
        Ok((tensor, transform))
    }
}

impl ObjectDetector for YoloModel {
    fn model_name(&self) -> &str {
        &self.name
    }

    fn device(&self) -> Device {
        self.device
    }

    fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>, VisionError> {
        let (input, transform) = self.preprocess(image)?;

        let mut session = self.session.lock();
        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input])
            .map_err(|e| VisionError::Ort(format!("YOLO inference failed: {}", e)))?;

        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| VisionError::Ort(format!("Failed to extract output tensor: {}", e)))?;
        debug!("YOLO output shape: {:?}", shape);

        let candidates = decode_output(
            shape,
            data,
            &transform,
            image.dimensions(),
            self.thresholds.confidence,
        )?;
        let detections = non_max_suppression(candidates, self.thresholds.iou);

        debug!("YOLO detected {} objects", detections.len());
        Ok(detections)
    }
}
