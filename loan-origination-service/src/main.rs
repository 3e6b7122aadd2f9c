use std::sync::Arc;

use axum::{
    Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderValue, Request, StatusCode},
    middleware::{Next, from_fn},
    response::Json,
    routing::{get, post},
};
use dialog_flow::{
    InMemorySessionStorage, PostgresSessionStorage, SerializableMessage, Session, SessionStorage,
};
use loan_origination_service::collaborators::{
    CompletionService, CustomerDirectory, FileSanctionLetters, FsSlipStore, InMemoryDirectory,
    OpenRouterCompletion, SanctionLetters, SlipStore,
};
use loan_origination_service::{Collaborators, DialogueOrchestrator, Step, extract};
use serde::{Deserialize, Serialize};
use tower_http::services::ServeDir;
use tracing::{Instrument, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[derive(Clone)]
struct AppState {
    orchestrator: Arc<DialogueOrchestrator>,
    slips: Arc<dyn SlipStore>,
    sessions: Arc<dyn SessionStorage<Step>>,
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    session_id: Option<String>,
    message: String,
    /// Transcript from the document store, for recovery when this node has
    /// no session record.
    transcript: Option<Vec<SerializableMessage>>,
    tenure_months: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ChatResponse {
    session_id: String,
    reply: String,
}

#[derive(Debug, Deserialize)]
struct UploadParams {
    phone: String,
}

/// Initialize structured JSON tracing based on environment variables
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "loan_origination_service=debug,dialog_flow=debug,tower_http=debug".into());

    match log_format.as_str() {
        "pretty" => {
            // Human-readable logging for development
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        _ => {
            // Structured JSON logging for production
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_level(true),
                )
                .init();
        }
    }
}

/// Middleware to add a correlation ID to all requests
async fn correlation_id_middleware(
    mut request: Request<axum::body::Body>,
    next: Next,
) -> axum::response::Response {
    let correlation_id = Uuid::new_v4().to_string();

    request.headers_mut().insert(
        "x-correlation-id",
        HeaderValue::from_str(&correlation_id).unwrap(),
    );

    let span = tracing::info_span!("http_request", correlation_id = %correlation_id);
    next.run(request).instrument(span).await
}

#[tokio::main]
async fn main() {
    init_tracing();

    if std::env::var("OPENROUTER_API_KEY").is_err() {
        // Greeting small talk degrades to a canned reply without a key, but
        // salary-slip extraction needs the completion service.
        warn!("OPENROUTER_API_KEY not set; completion-backed features are degraded");
    }

    let upload_dir = std::env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string());
    let document_dir = std::env::var("DOCUMENT_DIR").unwrap_or_else(|_| "documents".to_string());

    let completion: Arc<dyn CompletionService> = Arc::new(OpenRouterCompletion::new());
    let directory: Arc<dyn CustomerDirectory> = Arc::new(InMemoryDirectory::seeded());
    let slips: Arc<dyn SlipStore> = Arc::new(FsSlipStore::new(&upload_dir, completion.clone()));
    let letters: Arc<dyn SanctionLetters> = Arc::new(FileSanctionLetters::new(&document_dir));

    // Check for DATABASE_URL and use PostgreSQL if available, otherwise in-memory
    let sessions: Arc<dyn SessionStorage<Step>> =
        if let Ok(database_url) = std::env::var("DATABASE_URL") {
            match PostgresSessionStorage::connect(&database_url).await {
                Ok(storage) => {
                    info!("Using PostgreSQL session storage");
                    Arc::new(storage)
                }
                Err(e) => {
                    error!(
                        "Failed to connect to PostgreSQL: {}. Falling back to in-memory storage.",
                        e
                    );
                    Arc::new(InMemorySessionStorage::new())
                }
            }
        } else {
            info!("Using in-memory session storage (set DATABASE_URL to use PostgreSQL)");
            Arc::new(InMemorySessionStorage::new())
        };

    let orchestrator = Arc::new(DialogueOrchestrator::new(
        Collaborators {
            directory,
            slips: slips.clone(),
            letters,
            completion,
        },
        sessions.clone(),
    ));

    let app_state = AppState {
        orchestrator,
        slips,
        sessions,
    };

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/chat", post(chat))
        .route("/upload", post(upload_slip))
        .route("/session/{id}", get(get_session))
        .nest_service("/documents", ServeDir::new(&document_dir))
        .layer(from_fn(correlation_id_middleware))
        .with_state(app_state);

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();

    info!("Server running on http://{addr}");

    axum::serve(listener, app).await.unwrap();
}

async fn health_check() -> &'static str {
    "OK"
}

async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, StatusCode> {
    let session_id = request
        .session_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    info!(
        session_id = %session_id,
        content_length = request.message.len(),
        "processing chat turn"
    );

    match state
        .orchestrator
        .handle_turn(
            &session_id,
            &request.message,
            request.transcript.as_deref(),
            request.tenure_months,
        )
        .await
    {
        Ok(reply) => Ok(Json(ChatResponse { session_id, reply })),
        Err(e) => {
            error!(session_id = %session_id, error = %e, "chat turn failed");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

async fn upload_slip(
    State(state): State<AppState>,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, StatusCode> {
    if extract::parse_phone(&params.phone).is_none() {
        return Err(StatusCode::BAD_REQUEST);
    }

    match state.slips.save(&params.phone, &body).await {
        Ok(()) => {
            info!(phone = %params.phone, bytes = body.len(), "salary slip uploaded");
            Ok(Json(serde_json::json!({
                "status": "success",
                "message": "File uploaded successfully"
            })))
        }
        Err(e) => {
            error!(phone = %params.phone, error = %e, "slip upload failed");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<Session<Step>>, StatusCode> {
    match state.sessions.get(&session_id).await {
        Ok(Some(session)) => Ok(Json(session)),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            error!(session_id = %session_id, error = %e, "failed to get session");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
