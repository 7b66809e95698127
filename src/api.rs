//! HTTP surface for DocuExplore.
//!
//! The router exposes one resource per user session:
//!
//! - `POST /sessions` – Start an empty session and return its id.
//! - `GET /sessions/:id` – Snapshot of the session (phase, summary, title, transcript, related
//!   articles, failure banner).
//! - `DELETE /sessions/:id` – End the session and drop its state.
//! - `POST /sessions/:id/document?file_name=doc.pdf` – Upload raw PDF bytes and run the
//!   summary/title/search pipeline. Returns the resulting snapshot.
//! - `POST /sessions/:id/questions` – Ask a question about the current document. Failed turns
//!   are reported inline alongside the transcript.
//! - `GET /metrics` – Process-wide session counters.
//! - `GET /commands` – Machine-readable command catalog.

use crate::session::{ChatMessage, SessionError, SessionRegistry, SessionSnapshot};
use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::task::JoinError;
use uuid::Uuid;

/// Build the HTTP router exposing the session API.
pub fn create_router(registry: Arc<SessionRegistry>) -> Router {
    Router::new()
        .route("/sessions", post(create_session))
        .route("/sessions/:id", get(get_session).delete(delete_session))
        .route(
            "/sessions/:id/document",
            post(upload_document).layer(DefaultBodyLimit::disable()),
        )
        .route("/sessions/:id/questions", post(ask_question))
        .route("/metrics", get(get_metrics))
        .route("/commands", get(get_commands))
        .with_state(registry)
}

#[derive(Serialize)]
struct CreateSessionResponse {
    session_id: Uuid,
}

async fn create_session(
    State(registry): State<Arc<SessionRegistry>>,
) -> (StatusCode, Json<CreateSessionResponse>) {
    let session_id = registry.create().await;
    (StatusCode::CREATED, Json(CreateSessionResponse { session_id }))
}

async fn get_session(
    State(registry): State<Arc<SessionRegistry>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let handle = registry.get(id).await.ok_or(AppError::UnknownSession(id))?;
    let snapshot = handle.lock().await.snapshot();
    Ok(Json(snapshot))
}

async fn delete_session(
    State(registry): State<Arc<SessionRegistry>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if registry.remove(id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::UnknownSession(id))
    }
}

/// Query parameters for `POST /sessions/:id/document`.
#[derive(Deserialize)]
struct DocumentParams {
    /// Original file name, used as the remote display name.
    #[serde(default)]
    file_name: Option<String>,
}

/// Upload a PDF into the session, replacing any previous document.
async fn upload_document(
    State(registry): State<Arc<SessionRegistry>>,
    Path(id): Path<Uuid>,
    Query(params): Query<DocumentParams>,
    body: Bytes,
) -> Result<Json<SessionSnapshot>, AppError> {
    let handle = registry.get(id).await.ok_or(AppError::UnknownSession(id))?;
    let file_name = params.file_name.unwrap_or_default();
    let mut session = handle.lock_owned().await;
    // Runs detached so a client disconnect cannot abandon the pipeline halfway.
    let snapshot = tokio::spawn(async move { session.submit_document(&file_name, &body).await })
        .await??;
    tracing::info!(
        session_id = %id,
        title = snapshot.title.as_deref().unwrap_or_default(),
        "Document ready"
    );
    Ok(Json(snapshot))
}

/// Request body for `POST /sessions/:id/questions`.
#[derive(Deserialize)]
struct QuestionRequest {
    question: String,
}

/// Response body for `POST /sessions/:id/questions`.
#[derive(Serialize)]
struct QuestionResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    transcript: Vec<ChatMessage>,
}

/// Ask a question; chat failures are returned inline rather than as an error status.
async fn ask_question(
    State(registry): State<Arc<SessionRegistry>>,
    Path(id): Path<Uuid>,
    Json(request): Json<QuestionRequest>,
) -> Result<Json<QuestionResponse>, AppError> {
    let handle = registry.get(id).await.ok_or(AppError::UnknownSession(id))?;
    let mut session = handle.lock_owned().await;
    let (outcome, transcript) = tokio::spawn(async move {
        let outcome = session.ask(&request.question).await;
        (outcome, session.state().transcript.clone())
    })
    .await?;
    let (answer, error) = match outcome {
        Ok(answer) => (Some(answer), None),
        Err(error @ SessionError::Chat(_)) => (None, Some(error.to_string())),
        Err(error) => return Err(error.into()),
    };
    Ok(Json(QuestionResponse {
        answer,
        error,
        transcript,
    }))
}

async fn get_metrics(
    State(registry): State<Arc<SessionRegistry>>,
) -> Json<crate::metrics::MetricsSnapshot> {
    Json(registry.services().metrics.snapshot())
}

/// Descriptor for a single command in the discovery catalog.
#[derive(Serialize)]
struct CommandDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_example: Option<serde_json::Value>,
}

/// Response body for `GET /commands`.
#[derive(Serialize)]
struct CommandsResponse {
    commands: Vec<CommandDescriptor>,
}

async fn get_commands() -> Json<CommandsResponse> {
    Json(CommandsResponse {
        commands: vec![
            CommandDescriptor {
                name: "create_session",
                method: "POST",
                path: "/sessions",
                description: "Start an empty session. Response returns { \"session_id\": uuid }.",
                request_example: None,
            },
            CommandDescriptor {
                name: "get_session",
                method: "GET",
                path: "/sessions/:id",
                description: "Return the session phase, summary, title, transcript, and related articles.",
                request_example: None,
            },
            CommandDescriptor {
                name: "upload_document",
                method: "POST",
                path: "/sessions/:id/document?file_name=doc.pdf",
                description: "Upload raw PDF bytes, wait for processing, then summarize, title, and search related articles.",
                request_example: None,
            },
            CommandDescriptor {
                name: "ask_question",
                method: "POST",
                path: "/sessions/:id/questions",
                description: "Ask a question about the uploaded document. Failed answers are reported inline.",
                request_example: Some(json!({ "question": "What method does the paper use?" })),
            },
            CommandDescriptor {
                name: "delete_session",
                method: "DELETE",
                path: "/sessions/:id",
                description: "End the session and discard its state.",
                request_example: None,
            },
            CommandDescriptor {
                name: "metrics",
                method: "GET",
                path: "/metrics",
                description: "Return session counters useful for observability dashboards.",
                request_example: None,
            },
        ],
    })
}

enum AppError {
    UnknownSession(Uuid),
    Session(SessionError),
    Task(JoinError),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::UnknownSession(_) => StatusCode::NOT_FOUND,
            Self::Session(error) => match error {
                SessionError::EmptyQuestion => StatusCode::BAD_REQUEST,
                SessionError::NotReady { .. } => StatusCode::CONFLICT,
                SessionError::ProcessingFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                SessionError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                SessionError::Upload(_)
                | SessionError::Readiness(_)
                | SessionError::Summary(_)
                | SessionError::Chat(_) => StatusCode::BAD_GATEWAY,
                SessionError::Interrupted => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            Self::UnknownSession(id) => format!("Unknown session: {id}"),
            Self::Session(error) => error.to_string(),
            Self::Task(error) => {
                tracing::error!(error = %error, "Session task failed");
                "Session task failed".to_string()
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<SessionError> for AppError {
    fn from(inner: SessionError) -> Self {
        Self::Session(inner)
    }
}

impl From<JoinError> for AppError {
    fn from(inner: JoinError) -> Self {
        Self::Task(inner)
    }
}
