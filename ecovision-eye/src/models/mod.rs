//! Vision model management and inference

pub mod device;
pub mod manager;
pub mod sam;
pub mod yolo;

pub use device::{Device, DevicePreference};
pub use manager::ModelManager;
pub use sam::SamModel;
pub use yolo::{Thresholds, YoloModel};

use crate::error::VisionError;
use ort::execution_providers::CUDAExecutionProvider;
use ort::session::Session;
use std::path::Path;

/// Create an ONNX Runtime session on the given device.
pub(crate) fn build_session(model_path: &Path, device: Device) -> Result<Session, VisionError> {
    if !model_path.is_file() {
        return Err(VisionError::Model(format!("Model file not found: {:?}", model_path)));
    }

    let mut builder = Session::builder()
        .map_err(|e| VisionError::Ort(format!("Failed to create session builder: {}", e)))?;

    if device == Device::Cuda {
        builder = builder
            .with_execution_providers([CUDAExecutionProvider::default().build()])
            .map_err(|e| VisionError::Ort(format!("Failed to register CUDA provider: {}", e)))?;
    }

    builder
        .commit_from_file(model_path)
        .map_err(|e| VisionError::Ort(format!("Failed to load model {:?}: {}", model_path, e)))
}
