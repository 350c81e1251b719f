//! ecovision-eye: waste detection core
//!
//! Runs an object detector over an image, maps detector labels onto a fixed
//! waste taxonomy with disposal guidance, and optionally adds a per-object
//! segmentation mask.

pub mod codec;
pub mod config;
pub mod error;
pub mod mapper;
pub mod models;
pub mod processing;
pub mod types;
mod utils;

pub use config::VisionConfig;
pub use error::VisionError;
pub use mapper::{MappedDetection, WasteCategory, WasteMapper};
pub use processing::{DetectionRequest, DetectionResponse, ImageSource, InferenceContext};
pub use types::{BoundingBox, Detection, Mask};

/// Service name reported by the HTTP API.
pub const SERVICE_NAME: &str = "EcoVision AI Service";

/// Service version reported by the HTTP API.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
