use std::sync::Arc;

use axum::{Json, Router};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::extract::multipart::MultipartRejection;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use cores::payload::{AnalyseReply, UploadResponse};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub mod analyse_requests;
pub mod api_error;
pub mod config;
pub mod gemini_client;
pub mod images;
pub mod runtime_context;
pub mod upload_policy;
pub mod upload_requests;
pub mod upload_storage;

use analyse_requests::{AnalyseBody, AnalyseRequestHandler};
use api_error::ApiError;
use runtime_context::RuntimeContext;
use upload_requests::UploadRequestHandler;

// room for multipart boundaries and part headers on top of the file itself
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn build_router(runtime_context: Arc<RuntimeContext>) -> Router {
    let config = runtime_context.config();
    let upload_limit = config.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD_BYTES);
    let json_limit = config.json_body_limit;
    let mut router = Router::new()
        .route("/", get(handle_get_root))
        .route("/upload", post(handle_upload).layer(DefaultBodyLimit::max(upload_limit)))
        .route("/gemini-analyse", post(handle_analyse).layer(DefaultBodyLimit::max(json_limit)))
        .fallback(handle_not_found);
    // stored uploads are reachable the way they were written, by file id
    if let Some(dir) = runtime_context.upload_storage().directory() {
        router = router.nest_service("/uploads", ServeDir::new(dir));
    }
    router
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(runtime_context)
}

async fn handle_get_root() -> impl IntoResponse {
    (StatusCode::OK, [(header::CONTENT_TYPE, "text/plain")], "Hello World")
}

async fn handle_not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, [(header::CONTENT_TYPE, "text/plain")], "not found")
}

async fn handle_upload(
    State(context): State<Arc<RuntimeContext>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let request_handler = UploadRequestHandler::new(&context);
    request_handler.handle_upload(multipart).await
}

async fn handle_analyse(
    State(context): State<Arc<RuntimeContext>>,
    AnalyseBody(body): AnalyseBody,
) -> Result<Json<AnalyseReply>, ApiError> {
    let request_handler = AnalyseRequestHandler::new(&context);
    request_handler.handle_analyse(body).await
}
