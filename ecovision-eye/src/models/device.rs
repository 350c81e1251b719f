//! Inference device selection

use ort::execution_providers::{CUDAExecutionProvider, ExecutionProvider};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

/// Configured device preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DevicePreference {
    #[default]
    Auto,
    Cpu,
    Cuda,
}

impl FromStr for DevicePreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(DevicePreference::Auto),
            "cpu" => Ok(DevicePreference::Cpu),
            "cuda" | "gpu" => Ok(DevicePreference::Cuda),
            other => Err(format!("Unknown device '{}', expected auto, cpu or cuda", other)),
        }
    }
}

/// Device actually used by the model sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Cuda,
    Cpu,
}

impl Device {
    pub fn as_str(&self) -> &'static str {
        match self {
            Device::Cuda => "cuda",
            Device::Cpu => "cpu",
        }
    }

    /// Resolve a preference against what the runtime can offer.
    pub fn resolve(preference: DevicePreference) -> Device {
        Self::resolve_with(preference, cuda_available())
    }

    pub fn resolve_with(preference: DevicePreference, cuda: bool) -> Device {
        let device = match (preference, cuda) {
            (DevicePreference::Cpu, _) => Device::Cpu,
            (DevicePreference::Auto, true) | (DevicePreference::Cuda, true) => Device::Cuda,
            (DevicePreference::Auto, false) => Device::Cpu,
            (DevicePreference::Cuda, false) => {
                warn!("CUDA requested but not available, using CPU");
                Device::Cpu
            }
        };
        info!("Using {} for inference", device);
        device
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Probe the CUDA execution provider.
pub fn cuda_available() -> bool {
    CUDAExecutionProvider::default().is_available().unwrap_or(false)
}
