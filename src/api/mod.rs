use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Multipart, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::{stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use validator::Validate;

use crate::database::ScoredChunk;
use crate::pipeline::{IngestReport, PipelineError, PipelineStage, RagSession};

const MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;
const MAX_CONCURRENT_REQUESTS: usize = 32;

#[derive(Clone)]
pub struct AppState {
    session: Arc<RwLock<RagSession>>,
}

#[derive(Deserialize, Validate)]
pub struct AskRequest {
    #[validate(length(min = 1, max = 2000))]
    question: String,
}

#[derive(Serialize)]
pub struct ChunkView {
    index: usize,
    heading: String,
    content: String,
    distance: f32,
}

impl From<&ScoredChunk> for ChunkView {
    fn from(scored: &ScoredChunk) -> Self {
        Self {
            index: scored.chunk.index,
            heading: scored.chunk.heading_path(),
            content: scored.chunk.content.clone(),
            distance: scored.distance,
        }
    }
}

#[derive(Serialize)]
pub struct AskResponse {
    chunks: Vec<ChunkView>,
    answer: String,
}

#[derive(Serialize)]
pub struct StatusResponse {
    stage: PipelineStage,
    document: Option<IngestReport>,
    last_error: Option<String>,
}

#[derive(Serialize)]
struct ApiResponse {
    status: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ApiResponse { status: message.into() })).into_response()
}

fn pipeline_error_response(error: PipelineError) -> Response {
    let status = match &error {
        PipelineError::NotReady => StatusCode::CONFLICT,
        PipelineError::Conversion(_) => StatusCode::UNPROCESSABLE_ENTITY,
        PipelineError::EmbeddingBackend(_)
        | PipelineError::GenerationBackend(_)
        | PipelineError::DimensionMismatch { .. } => StatusCode::BAD_GATEWAY,
    };
    error_response(status, error.to_string())
}

/// Create and configure the API router
pub fn create_api(session: RagSession) -> Router {
    let state = AppState {
        session: Arc::new(RwLock::new(session)),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/health", get(health_check))
        .route("/status", get(status_handler))
        .route("/upload", post(upload_handler))
        .route("/ask", post(ask_handler))
        .route("/ask/stream", post(ask_stream_handler))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(ConcurrencyLimitLayer::new(MAX_CONCURRENT_REQUESTS))
        .layer(cors)
        .with_state(state)
}

/// Serve the API until `shutdown` resolves. In-flight requests run to
/// completion first, so scoped upload files are always removed.
pub async fn serve<F>(listener: TcpListener, session: RagSession, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, create_api(session))
        .with_graceful_shutdown(shutdown)
        .await
}

pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    log::info!("Received shutdown signal, finishing in-flight requests");
}

async fn health_check() -> Response {
    Json(ApiResponse {
        status: "Server is running and healthy".to_string(),
    }).into_response()
}

async fn status_handler(State(state): State<AppState>) -> Response {
    let session = state.session.read().await;
    Json(StatusResponse {
        stage: session.stage(),
        document: session.report().cloned(),
        last_error: session.last_error().map(str::to_string),
    }).into_response()
}

async fn upload_handler(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut upload: Option<(String, Vec<u8>)> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return error_response(StatusCode::BAD_REQUEST, format!("Invalid multipart body: {}", e)),
        };
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or("upload.pdf").to_string();
        match field.bytes().await {
            Ok(bytes) => upload = Some((file_name, bytes.to_vec())),
            Err(e) => return error_response(StatusCode::BAD_REQUEST, format!("Failed to read upload: {}", e)),
        }
    }

    let Some((file_name, bytes)) = upload else {
        return error_response(StatusCode::BAD_REQUEST, "Missing multipart field 'file'");
    };

    log::info!("Received upload {} ({} bytes)", file_name, bytes.len());
    let mut session = state.session.write().await;
    match session.ingest_upload(&file_name, &bytes).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => pipeline_error_response(e),
    }
}

async fn ask_handler(State(state): State<AppState>, Json(request): Json<AskRequest>) -> Response {
    if let Err(e) = request.validate() {
        return error_response(StatusCode::BAD_REQUEST, e.to_string());
    }

    let mut session = state.session.write().await;
    match session.answer(&request.question).await {
        Ok((chunks, answer)) => Json(AskResponse {
            chunks: chunks.iter().map(ChunkView::from).collect(),
            answer,
        }).into_response(),
        Err(e) => pipeline_error_response(e),
    }
}

/// Stream the answer as plain text while it is generated.
async fn ask_stream_handler(State(state): State<AppState>, Json(request): Json<AskRequest>) -> Response {
    if let Err(e) = request.validate() {
        return error_response(StatusCode::BAD_REQUEST, e.to_string());
    }

    let answer_stream = {
        let mut session = state.session.write().await;
        match session.ask(&request.question).await {
            Ok((_, answer_stream)) => answer_stream,
            Err(e) => return pipeline_error_response(e),
        }
    };

    // The session records the outcome once the last fragment has been sent
    let session = state.session.clone();
    let body = stream::unfold(Some(answer_stream), move |slot| {
        let session = session.clone();
        async move {
            let mut answer = slot?;
            match answer.next().await {
                Some(Ok(fragment)) => Some((Ok(fragment), Some(answer))),
                Some(Err(e)) => {
                    let _ = session.write().await.finish_answer(&answer);
                    Some((Err(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())), None))
                }
                None => {
                    let _ = session.write().await.finish_answer(&answer);
                    None
                }
            }
        }
    });

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Body::from_stream(body))
        .unwrap_or_else(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}
