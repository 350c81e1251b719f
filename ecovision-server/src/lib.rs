// EcoVision HTTP server
// Configuration, metrics and the axum router around the ecovision-eye pipeline

pub mod config;
pub mod http;
pub mod metrics;

pub use config::{ConfigError, LogFormat, ServerConfig};
pub use http::{create_router, ApiState};
pub use metrics::Metrics;
