//! Error types for ecovision-eye

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VisionError {
    /// Caller supplied a missing, malformed or undecodable image.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A required model capability never finished initialization.
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("ONNX Runtime error: {0}")]
    Ort(String),
}

impl VisionError {
    /// True for errors caused by the request payload rather than the service.
    pub fn is_input_error(&self) -> bool {
        matches!(self, VisionError::InvalidInput(_))
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, VisionError::ModelUnavailable(_))
    }
}

impl From<ort::Error> for VisionError {
    fn from(err: ort::Error) -> Self {
        VisionError::Ort(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vision_error_display() {
        let err = VisionError::InvalidInput("Test error".to_string());
        assert!(err.to_string().contains("Invalid input"));
        assert!(err.to_string().contains("Test error"));
    }

    #[test]
    fn test_vision_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let vision_err: VisionError = io_err.into();
        match vision_err {
            VisionError::Io(_) => {}
            _ => panic!("Expected Io error"),
        }
    }

    #[test]
    fn test_error_classification() {
        assert!(VisionError::InvalidInput("x".into()).is_input_error());
        assert!(!VisionError::InvalidInput("x".into()).is_unavailable());
        assert!(VisionError::ModelUnavailable("x".into()).is_unavailable());
        assert!(!VisionError::Processing("x".into()).is_input_error());
        assert!(!VisionError::Ort("x".into()).is_unavailable());
    }
}
