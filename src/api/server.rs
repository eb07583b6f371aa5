//! axum router for `/api/tasks`.

use super::ApiError;
use crate::config::HttpConfig;
use crate::error::ErrorCode;
use crate::remote::DocumentStore;
use crate::types::{Document, Fields};
use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

/// Field carrying the task text on this surface.
const TASK_FIELD: &str = "task";
const COMPLETED_FIELD: &str = "completed";

/// Handler state.
#[derive(Clone)]
pub struct ApiServer {
    store: Arc<dyn DocumentStore>,
    collection: Arc<str>,
}

impl ApiServer {
    pub fn new(store: Arc<dyn DocumentStore>, collection: &str) -> Self {
        Self {
            store,
            collection: Arc::from(collection),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }
}

async fn root() -> &'static str {
    "Task REST API is running!"
}

async fn list_tasks(State(state): State<ApiServer>) -> Result<Json<Vec<Value>>, ApiError> {
    let documents = state
        .store
        .list_all(state.collection())
        .await
        .map_err(|e| ApiError::store("Failed to fetch tasks", &e))?;
    Ok(Json(documents.iter().map(Document::to_json).collect()))
}

/// Request body fields. A body without a JSON content type carries none.
fn body_fields(body: Result<Json<Fields>, JsonRejection>) -> Result<Fields, ApiError> {
    match body {
        Ok(Json(fields)) => Ok(fields),
        Err(JsonRejection::MissingJsonContentType(_)) => Ok(Fields::new()),
        Err(rejection) => {
            debug!("Rejected request body: {}", rejection.body_text());
            Err(ApiError::bad_request(ErrorCode::InvalidBody, "Invalid JSON body"))
        }
    }
}

/// `task` must be present and not falsy (`null`, `false`, `0` or `""`).
fn required_task(body: &Fields) -> Result<Value, ApiError> {
    match body.get(TASK_FIELD) {
        None | Some(Value::Null) | Some(Value::Bool(false)) => Err(missing_task()),
        Some(Value::String(s)) if s.is_empty() => Err(missing_task()),
        Some(Value::Number(n)) if n.as_f64() == Some(0.0) => Err(missing_task()),
        Some(task) => Ok(task.clone()),
    }
}

fn missing_task() -> ApiError {
    ApiError::bad_request(ErrorCode::MissingRequiredField, "Task is required")
}

async fn create_task(
    State(state): State<ApiServer>,
    body: Result<Json<Fields>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let task = required_task(&body_fields(body)?)?;

    let mut fields = Fields::new();
    fields.insert(TASK_FIELD.to_string(), task);
    fields.insert(COMPLETED_FIELD.to_string(), Value::Bool(false));

    let id = state
        .store
        .insert(state.collection(), fields.clone())
        .await
        .map_err(|e| ApiError::store("Failed to add task", &e))?;
    Ok((StatusCode::CREATED, Json(Document::new(id, fields).to_json())))
}

/// Echoes `{id, ...updates}`, not the merged document.
async fn update_task(
    State(state): State<ApiServer>,
    Path(id): Path<String>,
    body: Result<Json<Fields>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let updates = body_fields(body)?;
    state
        .store
        .update_fields(state.collection(), &id, updates.clone())
        .await
        .map_err(|e| ApiError::store("Failed to update task", &e))?;
    Ok(Json(Document::new(id, updates).to_json()))
}

async fn delete_task(
    State(state): State<ApiServer>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state
        .store
        .delete(state.collection(), &id)
        .await
        .map_err(|e| ApiError::store("Failed to delete task", &e))?;
    Ok(Json(json!({ "success": true })))
}

/// Build the router with all routes.
pub fn build_router(state: ApiServer) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/api/tasks", get(list_tasks).post(create_task))
        .route("/api/tasks/{id}", put(update_task).delete(delete_task))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve in the background.
///
/// Returns a sender that triggers graceful shutdown, and the bound address.
pub async fn start_server(
    store: Arc<dyn DocumentStore>,
    config: &HttpConfig,
) -> anyhow::Result<(oneshot::Sender<()>, SocketAddr)> {
    let app = build_router(ApiServer::new(store, &config.collection));

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    let bound_addr = listener.local_addr()?;

    info!("Task API listening on http://{}", bound_addr);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                info!("Task API shutting down");
            })
            .await
        {
            tracing::error!("Task API server error: {}", e);
        }
    });

    Ok((shutdown_tx, bound_addr))
}
