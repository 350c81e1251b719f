// HTTP API routes for the waste detection service

use crate::metrics::Metrics;
use axum::{
    extract::{rejection::QueryRejection, DefaultBodyLimit, FromRequest, Multipart, Path, Query, Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Form, Router,
};
use ecovision_eye::processing::AdapterStatus;
use ecovision_eye::{
    DetectionRequest, DetectionResponse, ImageSource, InferenceContext, VisionError, WasteCategory,
    SERVICE_NAME, VERSION,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, warn};

/// Shared state for all handlers
#[derive(Clone)]
pub struct ApiState {
    pub context: Arc<InferenceContext>,
    pub metrics: Arc<Metrics>,
}

impl ApiState {
    pub fn new(context: Arc<InferenceContext>) -> Self {
        Self {
            context,
            metrics: Arc::new(Metrics::new()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub detail: String,
    pub code: String,
}

/// Handler error carrying the status code and the client-facing detail.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    detail: String,
}

impl ApiError {
    fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "INVALID_INPUT",
            detail: detail.into(),
        }
    }

    fn with_status(status: StatusCode, detail: impl Into<String>) -> Self {
        let code = if status == StatusCode::PAYLOAD_TOO_LARGE {
            "PAYLOAD_TOO_LARGE"
        } else if status.is_client_error() {
            "INVALID_INPUT"
        } else {
            "INTERNAL_ERROR"
        };
        Self {
            status,
            code,
            detail: detail.into(),
        }
    }

    fn internal(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "DETECTION_FAILED",
            detail: detail.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<VisionError> for ApiError {
    fn from(err: VisionError) -> Self {
        match err {
            VisionError::InvalidInput(detail) => ApiError::bad_request(detail),
            VisionError::ModelUnavailable(detail) => Self {
                status: StatusCode::SERVICE_UNAVAILABLE,
                code: "MODEL_UNAVAILABLE",
                detail,
            },
            other => {
                error!("Detection error: {}", other);
                ApiError::internal(format!("Detection failed: {}", other))
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            detail: self.detail,
            code: self.code.to_string(),
        });
        (self.status, body).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct DetectParams {
    pub segmentation: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Base64Form {
    image_base64: Option<String>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    ok: bool,
    detector: AdapterStatus,
    segmenter: AdapterStatus,
}

#[derive(Debug, Serialize)]
struct ClassInfo {
    class: String,
    known: bool,
    disposal: &'static str,
    ideas: Vec<&'static str>,
    dustbin: &'static str,
}

/// Create HTTP router with all API routes
pub fn create_router(state: ApiState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/classes", get(classes_handler))
        .route("/classes/:name", get(class_handler))
        .route("/detect", post(detect_handler))
        .route("/metrics", get(metrics_handler))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn root_handler(State(state): State<ApiState>) -> impl IntoResponse {
    Json(json!({
        "service": SERVICE_NAME,
        "version": VERSION,
        "status": "online",
        "detector_ready": state.context.detector_status().loaded,
        "segmenter_ready": state.context.segmenter_status().loaded,
    }))
}

async fn health_handler(State(state): State<ApiState>) -> impl IntoResponse {
    Json(HealthResponse {
        ok: true,
        detector: state.context.detector_status(),
        segmenter: state.context.segmenter_status(),
    })
}

async fn classes_handler(State(state): State<ApiState>) -> impl IntoResponse {
    let classes = state.context.mapper().all_classes();
    Json(json!({
        "count": classes.len(),
        "classes": classes,
    }))
}

/// Disposal guidance for one category; unknown names get the generic answer.
async fn class_handler(State(state): State<ApiState>, Path(name): Path<String>) -> impl IntoResponse {
    let mapper = state.context.mapper();
    Json(ClassInfo {
        known: name.parse::<WasteCategory>().is_ok(),
        disposal: mapper.disposal_for(&name),
        ideas: mapper.ideas_for(&name),
        dustbin: mapper.dustbin_for(&name),
        class: name,
    })
}

async fn metrics_handler(State(state): State<ApiState>) -> impl IntoResponse {
    let fallbacks = state.context.segmenter_status().fallbacks.unwrap_or(0);
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.get_prometheus_metrics(fallbacks),
    )
}

async fn detect_handler(
    State(state): State<ApiState>,
    params: Result<Query<DetectParams>, QueryRejection>,
    request: Request,
) -> Result<Json<DetectionResponse>, ApiError> {
    state.metrics.record_request();

    let result = match params {
        Ok(Query(params)) => detect(&state, params, request).await,
        Err(rejection) => Err(ApiError::bad_request(rejection.body_text())),
    };

    match result {
        Ok(response) => {
            state.metrics.record_detection(response.count);
            Ok(Json(response))
        }
        Err(err) => {
            state.metrics.record_failure();
            if err.status().is_client_error() {
                warn!("Rejected detection request: {}", err.detail);
            }
            Err(err)
        }
    }
}

async fn detect(state: &ApiState, params: DetectParams, request: Request) -> Result<DetectionResponse, ApiError> {
    let segmentation = match params.segmentation.as_deref() {
        Some(value) => parse_flag(value)
            .ok_or_else(|| ApiError::bad_request(format!("Invalid segmentation flag: {:?}", value)))?,
        None => false,
    };

    let source = read_image_source(state, request).await?;
    debug!("Detection request, segmentation={}", segmentation);

    let context = state.context.clone();
    let result = tokio::task::spawn_blocking(move || context.run(DetectionRequest { source, segmentation }))
        .await
        .map_err(|e| {
            error!("Detection task failed: {}", e);
            ApiError::internal(format!("Detection failed: {}", e))
        })?;

    result.map_err(ApiError::from)
}

/// Pull `image` / `image_base64` out of a multipart or urlencoded body.
async fn read_image_source(state: &ApiState, request: Request) -> Result<ImageSource, ApiError> {
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase();

    if content_type.starts_with("multipart/form-data") {
        let mut multipart = Multipart::from_request(request, state)
            .await
            .map_err(|e| ApiError::with_status(e.status(), e.body_text()))?;

        let mut upload = None;
        let mut base64 = None;
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::with_status(e.status(), e.body_text()))?
        {
            match field.name() {
                Some("image") => {
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| ApiError::with_status(e.status(), e.body_text()))?;
                    upload = Some(bytes.to_vec());
                }
                Some("image_base64") => {
                    let text = field
                        .text()
                        .await
                        .map_err(|e| ApiError::with_status(e.status(), e.body_text()))?;
                    base64 = Some(text);
                }
                _ => {}
            }
        }
        Ok(ImageSource::from_parts(upload, base64)?)
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        let Form(form) = Form::<Base64Form>::from_request(request, state)
            .await
            .map_err(|e| ApiError::with_status(e.status(), e.body_text()))?;
        Ok(ImageSource::from_parts(None, form.image_base64)?)
    } else {
        Ok(ImageSource::from_parts(None, None)?)
    }
}

/// Query-string boolean: true/false, 1/0, yes/no, on/off.
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
