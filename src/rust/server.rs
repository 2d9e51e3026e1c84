//! HTTP surface: `GET /` and `POST /predict_emotion`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use log::{error, info, warn};
use serde_json::json;

use crate::response::ResponseBody;
use crate::service::EmotionService;
use crate::ClassifierError;

pub const STATUS_MESSAGE: &str = "Emotion API is running";
/// Name of the multipart field carrying the audio clip.
pub const FILE_FIELD: &str = "file";

/// Shared state accessible from handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<EmotionService>,
}

/// Builds the router. Request bodies above `max_upload_bytes` are refused with 413.
pub fn router(service: Arc<EmotionService>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(status_handler))
        .route("/predict_emotion", post(predict_handler))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(AppState { service })
}

/// Binds `addr` and serves until ctrl-c.
pub async fn serve(addr: SocketAddr, app: Router) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => warn!("Failed to listen for ctrl-c: {}", e),
    }
}

/// GET /
async fn status_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": STATUS_MESSAGE }))
}

/// POST /predict_emotion
async fn predict_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ResponseBody>, ApiError> {
    let mut multipart =
        multipart.map_err(|rejection| ApiError::new(rejection.status(), rejection.body_text()))?;
    let audio = read_file_field(&mut multipart).await?;

    // Detached so a client disconnect cannot interrupt inference or skip the
    // release of the staged file.
    let service = Arc::clone(&state.service);
    let body = match tokio::spawn(async move { service.predict(audio).await }).await {
        Ok(result) => result?,
        Err(e) => return Err(ClassifierError::from(e).into()),
    };
    Ok(Json(body))
}

async fn read_file_field(multipart: &mut Multipart) -> Result<Bytes, ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(ApiError::from)? {
        if field.name() == Some(FILE_FIELD) {
            return field.bytes().await.map_err(ApiError::from);
        }
    }
    Err(ApiError::new(
        StatusCode::BAD_REQUEST,
        format!("Missing multipart field '{}'", FILE_FIELD),
    ))
}

/// An error response: a status code and `{"detail": ...}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self { status, detail: detail.into() }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        Self::new(err.status(), err.body_text())
    }
}

impl From<ClassifierError> for ApiError {
    fn from(err: ClassifierError) -> Self {
        if err.is_client_error() {
            return Self::new(StatusCode::BAD_REQUEST, "Uploaded file is empty");
        }
        error!("Prediction failed: {}", err);
        let detail = match err {
            ClassifierError::Staging(_) => "Failed to store uploaded audio",
            ClassifierError::Inference(_) => "Emotion inference failed",
            ClassifierError::Task(_) => "Internal server error",
        };
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, detail)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}
