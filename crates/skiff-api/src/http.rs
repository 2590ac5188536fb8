use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;

use skiff_model::{TaskDefinition, TaskId, TaskStatus, VolumeDefinition, VolumeId, VolumeStatus};

use crate::error::ApiError;
use crate::handler::Orchestrator;

/// HTTP API service builder.
pub struct HttpApi<H> {
    handler: Arc<H>,
}

impl<H> HttpApi<H>
where
    H: Orchestrator,
{
    pub fn new(handler: Arc<H>) -> Self {
        Self { handler }
    }

    /// Build the axum router with all task and volume endpoints mounted.
    pub fn router(self) -> Router {
        Router::new()
            .route("/", get(health))
            .route("/tasks/submit", post(submit_task::<H>))
            .route("/tasks", get(list_tasks::<H>))
            .route("/tasks/stop", post(stop_all_tasks::<H>))
            .route("/tasks/{id}", get(get_task_status::<H>))
            .route("/tasks/{id}/stop", post(stop_task::<H>))
            .route("/tasks/{id}/logs", get(tail_logs::<H>))
            .route("/volumes/create", post(create_volume::<H>))
            .route("/volumes", get(list_volumes::<H>))
            .route(
                "/volumes/{id}",
                get(get_volume_status::<H>).delete(delete_volume::<H>),
            )
            .with_state(self.handler)
    }
}

/// The caller-supplied identity, trusted as-is. The engine sanitizes it
/// before it ever becomes a label.
fn identity(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get("x-user")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(ApiError::MissingIdentity)
}

#[derive(Debug, Default, Deserialize)]
struct ScopeParams {
    #[serde(default)]
    all_users: bool,
}

// ============================================================================
// Request/Response envelopes
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct SubmitResponse {
    task_id: TaskId,
    status: String,
    message: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct StopResponse {
    task_id: TaskId,
    status: String,
    message: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct StopAllResponse {
    count: usize,
    status: String,
    message: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct TaskListResponse {
    tasks: Vec<TaskStatus>,
}

#[derive(Debug, Serialize, Deserialize)]
struct VolumeCreateResponse {
    volume_id: VolumeId,
    status: String,
    message: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct VolumeDeleteResponse {
    volume_id: VolumeId,
    status: String,
    message: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct VolumeListResponse {
    volumes: Vec<VolumeStatus>,
}

// ============================================================================
// Handlers
// ============================================================================

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok", "service": "skiff-api" }))
}

/// POST /tasks/submit
async fn submit_task<H: Orchestrator>(
    State(handler): State<Arc<H>>,
    headers: HeaderMap,
    Json(task): Json<TaskDefinition>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let owner = identity(&headers)?;
    info!(target: "skiff.api", owner = %owner, name = ?task.name, "submitting task");

    let task_id = handler.submit(task, &owner).await?;
    Ok(Json(SubmitResponse {
        message: format!("Task submitted successfully with ID: {task_id}"),
        task_id,
        status: "submitted".to_string(),
    }))
}

/// GET /tasks?all_users=
async fn list_tasks<H: Orchestrator>(
    State(handler): State<Arc<H>>,
    headers: HeaderMap,
    Query(scope): Query<ScopeParams>,
) -> Result<Json<TaskListResponse>, ApiError> {
    let owner = identity(&headers)?;
    let tasks = if scope.all_users {
        handler.list(None).await?
    } else {
        handler.list(Some(&owner)).await?
    };
    Ok(Json(TaskListResponse { tasks }))
}

/// GET /tasks/{id}
async fn get_task_status<H: Orchestrator>(
    State(handler): State<Arc<H>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<TaskStatus>, ApiError> {
    let owner = identity(&headers)?;
    let task_id = TaskId::from(id);
    handler
        .status(&task_id, &owner)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("task {task_id}")))
}

/// POST /tasks/{id}/stop
async fn stop_task<H: Orchestrator>(
    State(handler): State<Arc<H>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<StopResponse>, ApiError> {
    let owner = identity(&headers)?;
    let task_id = TaskId::from(id);
    if !handler.stop(&task_id, &owner).await? {
        return Err(ApiError::NotFound(format!("task {task_id}")));
    }
    Ok(Json(StopResponse {
        message: format!("Task {task_id} stopped successfully"),
        task_id,
        status: "stopped".to_string(),
    }))
}

/// POST /tasks/stop?all_users=
async fn stop_all_tasks<H: Orchestrator>(
    State(handler): State<Arc<H>>,
    headers: HeaderMap,
    Query(scope): Query<ScopeParams>,
) -> Result<Json<StopAllResponse>, ApiError> {
    let owner = identity(&headers)?;
    let count = if scope.all_users {
        handler.stop_all(None).await?
    } else {
        handler.stop_all(Some(&owner)).await?
    };
    Ok(Json(StopAllResponse {
        count,
        status: "stopped".to_string(),
        message: format!("Stopped {count} tasks"),
    }))
}

/// GET /tasks/{id}/logs
///
/// Streams the merged log feed as plain newline-terminated lines; the
/// response ends when the last pod's stream ends. A task with no pods
/// yields an empty body.
async fn tail_logs<H: Orchestrator>(
    State(handler): State<Arc<H>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let owner = identity(&headers)?;
    let feed = handler.tail_logs(&TaskId::from(id), &owner).await?;

    let lines = futures::stream::unfold(feed, |mut feed| async move {
        let mut line = feed.recv().await?;
        line.push('\n');
        Some((Ok::<_, Infallible>(line), feed))
    });
    Ok(Body::from_stream(lines).into_response())
}

/// POST /volumes/create
async fn create_volume<H: Orchestrator>(
    State(handler): State<Arc<H>>,
    headers: HeaderMap,
    Json(def): Json<VolumeDefinition>,
) -> Result<Json<VolumeCreateResponse>, ApiError> {
    let owner = identity(&headers)?;
    info!(target: "skiff.api", owner = %owner, volume = %def.name, "creating volume");

    let volume_id = handler.create_volume(def, &owner).await?;
    Ok(Json(VolumeCreateResponse {
        message: format!("Volume created successfully with ID: {volume_id}"),
        volume_id,
        status: "created".to_string(),
    }))
}

/// GET /volumes?all_users=
async fn list_volumes<H: Orchestrator>(
    State(handler): State<Arc<H>>,
    headers: HeaderMap,
    Query(scope): Query<ScopeParams>,
) -> Result<Json<VolumeListResponse>, ApiError> {
    let owner = identity(&headers)?;
    let volumes = if scope.all_users {
        handler.list_volumes(None).await?
    } else {
        handler.list_volumes(Some(&owner)).await?
    };
    Ok(Json(VolumeListResponse { volumes }))
}

/// GET /volumes/{id}
async fn get_volume_status<H: Orchestrator>(
    State(handler): State<Arc<H>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<VolumeStatus>, ApiError> {
    let owner = identity(&headers)?;
    let volume_id = VolumeId::from(id);
    handler
        .volume_status(&volume_id, &owner)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("volume {volume_id}")))
}

/// DELETE /volumes/{id}
async fn delete_volume<H: Orchestrator>(
    State(handler): State<Arc<H>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<VolumeDeleteResponse>, ApiError> {
    let owner = identity(&headers)?;
    let volume_id = VolumeId::from(id);
    if !handler.delete_volume(&volume_id, &owner).await? {
        return Err(ApiError::NotFound(format!("volume {volume_id}")));
    }
    Ok(Json(VolumeDeleteResponse {
        message: format!("Volume {volume_id} deleted successfully"),
        volume_id,
        status: "deleted".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use skiff_engine::TaskExecutor;
    use skiff_engine::store::memory::MemoryStore;

    fn handler() -> Arc<TaskExecutor<MemoryStore>> {
        Arc::new(TaskExecutor::new(Arc::new(MemoryStore::new())))
    }

    fn user_headers(user: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-user", HeaderValue::from_str(user).unwrap());
        headers
    }

    #[test]
    fn identity_requires_header() {
        assert!(matches!(
            identity(&HeaderMap::new()),
            Err(ApiError::MissingIdentity)
        ));
        assert_eq!(identity(&user_headers("alice")).unwrap(), "alice");
    }

    #[tokio::test]
    async fn submit_then_status_roundtrip() {
        let handler = handler();
        let task = TaskDefinition::from_run("echo hi");

        let resp = submit_task(
            State(Arc::clone(&handler)),
            user_headers("alice"),
            Json(task),
        )
        .await
        .unwrap();
        assert_eq!(resp.0.status, "submitted");

        let status = get_task_status(
            State(Arc::clone(&handler)),
            user_headers("alice"),
            Path(resp.0.task_id.to_string()),
        )
        .await
        .unwrap();
        assert_eq!(status.0.task_id, resp.0.task_id);

        // Another user sees 404, not alice's task.
        let err = get_task_status(
            State(handler),
            user_headers("bob"),
            Path(resp.0.task_id.to_string()),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn list_scopes_by_header_identity() {
        let handler = handler();
        submit_task(
            State(Arc::clone(&handler)),
            user_headers("alice"),
            Json(TaskDefinition::from_run("a")),
        )
        .await
        .unwrap();
        submit_task(
            State(Arc::clone(&handler)),
            user_headers("bob"),
            Json(TaskDefinition::from_run("b")),
        )
        .await
        .unwrap();

        let mine = list_tasks(
            State(Arc::clone(&handler)),
            user_headers("alice"),
            Query(ScopeParams::default()),
        )
        .await
        .unwrap();
        assert_eq!(mine.0.tasks.len(), 1);

        let all = list_tasks(
            State(handler),
            user_headers("alice"),
            Query(ScopeParams { all_users: true }),
        )
        .await
        .unwrap();
        assert_eq!(all.0.tasks.len(), 2);
    }

    #[tokio::test]
    async fn invalid_submission_maps_to_bad_request() {
        let handler = handler();
        let err = submit_task(
            State(handler),
            user_headers("alice"),
            Json(TaskDefinition::from_run("  ")),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn stop_missing_task_is_not_found() {
        let handler = handler();
        let err = stop_task(
            State(handler),
            user_headers("alice"),
            Path("nope1234".to_string()),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }
}
