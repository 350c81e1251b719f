//! Vision processing pipelines

pub mod detection;
pub mod pipeline;
pub mod segmentation;

pub use detection::{DetectorAdapter, DetectorLoader, ObjectDetector, YoloLoader};
pub use pipeline::{
    AdapterStatus, DetectionRequest, DetectionResponse, ImageSource, InferenceContext,
};
pub use segmentation::{MaskPredictor, SamLoader, SegmenterAdapter, SegmenterLoader};
