use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde::Deserialize;
use serde_json::Value;
use taskboard_common::{ColumnSpec, ColumnUpdate, SubtaskSpec, SubtaskUpdate, TaskUpdate};
use tracing::{error, warn};
use uuid::Uuid;

use super::db::DbHandle;
#[cfg(test)]
use super::db::BoardDb;
use super::principal::Principal;
use super::validate;
use crate::errors::BoardError;

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub db: DbHandle,
}

pub type SharedState = Arc<AppState>;

// ── Request payload types ─────────────────────────────────────────────
//
// Required fields are still `Option` here so a missing field comes back as a
// validation error naming it, not as a generic body rejection. Positions stay
// raw JSON until `validate::position` has type-checked them.

#[derive(Deserialize)]
pub struct ColumnPayload {
    pub id: Option<String>,
    pub name: Option<String>,
    pub color: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateBoardRequest {
    pub name: Option<String>,
    #[serde(default)]
    pub columns: Vec<ColumnPayload>,
}

#[derive(Deserialize)]
pub struct UpdateBoardRequest {
    pub name: Option<String>,
    pub columns: Option<Vec<ColumnPayload>>,
}

#[derive(Deserialize)]
pub struct CreateColumnRequest {
    pub name: Option<String>,
    pub color: Option<String>,
    pub board_id: Option<String>,
    pub position: Option<Value>,
}

#[derive(Deserialize)]
pub struct UpdateColumnRequest {
    pub name: Option<String>,
    pub color: Option<String>,
    pub position: Option<Value>,
}

/// A `position` sent on create is accepted and ignored: new tasks always go
/// to the end of their column.
#[derive(Deserialize)]
pub struct CreateTaskRequest {
    pub name: Option<String>,
    pub column_id: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub subtasks: Vec<String>,
}

#[derive(Deserialize)]
pub struct SubtaskPayload {
    pub id: Option<String>,
    pub name: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateTaskRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub column_id: Option<String>,
    pub position: Option<Value>,
    pub subtasks: Option<Vec<SubtaskPayload>>,
}

#[derive(Deserialize)]
pub struct UpdateSubtaskRequest {
    pub name: Option<String>,
    pub completed: Option<bool>,
}

// ── Error handling ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    Validation { field: &'static str, message: String },
    BadRequest(String),
    Unauthorized(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation { field, message } => (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": message, "field": field})),
            )
                .into_response(),
            ApiError::NotFound(msg) => error_body(StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => error_body(StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => error_body(StatusCode::UNAUTHORIZED, msg),
            ApiError::Internal(msg) => error_body(StatusCode::INTERNAL_SERVER_ERROR, msg),
        }
    }
}

fn error_body(status: StatusCode, message: String) -> Response {
    (status, Json(serde_json::json!({"error": message}))).into_response()
}

impl From<BoardError> for ApiError {
    fn from(err: BoardError) -> Self {
        if err.is_client_error() {
            warn!(error = %err, "request rejected");
        } else {
            error!(error = %err, "request failed");
        }
        match err {
            BoardError::Validation { field, .. } => ApiError::Validation {
                field,
                message: err.to_string(),
            },
            BoardError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            // Invariant violations and storage failures are reported to the
            // client without detail.
            _ => ApiError::Internal("internal server error".to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

// ── Payload conversion ────────────────────────────────────────────────

fn column_specs(columns: Vec<ColumnPayload>) -> Result<Vec<ColumnSpec>, ApiError> {
    columns
        .into_iter()
        .map(|column| -> Result<ColumnSpec, ApiError> {
            Ok(ColumnSpec {
                id: column
                    .id
                    .as_deref()
                    .map(|id| validate::uuid("columns", id))
                    .transpose()?,
                name: validate::required("name", column.name)?,
                color: validate::required("color", column.color)?,
            })
        })
        .collect()
}

fn subtask_specs(subtasks: Vec<SubtaskPayload>) -> Result<Vec<SubtaskSpec>, ApiError> {
    subtasks
        .into_iter()
        .map(|subtask| -> Result<SubtaskSpec, ApiError> {
            Ok(SubtaskSpec {
                id: subtask
                    .id
                    .as_deref()
                    .map(|id| validate::uuid("subtasks", id))
                    .transpose()?,
                name: validate::required("subtasks", subtask.name)?,
            })
        })
        .collect()
}

fn position_field(value: Option<&Value>) -> Result<Option<i64>, ApiError> {
    Ok(value
        .map(|raw| validate::position("position", raw))
        .transpose()?)
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/boards", get(list_boards).post(create_board))
        .route(
            "/api/boards/{id}",
            get(get_board).put(update_board).delete(delete_board),
        )
        .route("/api/columns", post(create_column))
        .route(
            "/api/columns/{id}",
            get(get_column).put(update_column).delete(delete_column),
        )
        .route("/api/tasks", post(create_task))
        .route(
            "/api/tasks/{id}",
            get(get_task).put(update_task).delete(delete_task),
        )
        .route("/api/subtasks/{id}", put(update_subtask))
        .route("/health", get(health_check))
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

fn deleted(id: Uuid) -> Json<Value> {
    Json(serde_json::json!({"status": "deleted", "id": id}))
}

async fn list_boards(
    State(state): State<SharedState>,
    principal: Principal,
) -> Result<impl IntoResponse, ApiError> {
    let boards = state
        .db
        .call(move |db| db.list_boards(principal.as_str()))
        .await?;
    Ok(Json(boards))
}

async fn create_board(
    State(state): State<SharedState>,
    principal: Principal,
    payload: Result<Json<CreateBoardRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let name = validate::required("name", req.name)?;
    let columns = column_specs(req.columns)?;
    let board = state
        .db
        .call(move |db| db.create_board(principal.as_str(), &name, &columns))
        .await?;
    Ok((StatusCode::CREATED, Json(board)))
}

async fn get_board(
    State(state): State<SharedState>,
    principal: Principal,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = validate::uuid("id", &id)?;
    let board = state
        .db
        .call(move |db| db.get_board(principal.as_str(), id))
        .await?;
    Ok(Json(board))
}

async fn update_board(
    State(state): State<SharedState>,
    principal: Principal,
    Path(id): Path<String>,
    payload: Result<Json<UpdateBoardRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let id = validate::uuid("id", &id)?;
    let Json(req) = payload?;
    let name = validate::required("name", req.name)?;
    let columns = column_specs(validate::required("columns", req.columns)?)?;
    let board = state
        .db
        .call(move |db| db.reconcile_columns(principal.as_str(), id, &name, &columns))
        .await?;
    Ok(Json(board))
}

async fn delete_board(
    State(state): State<SharedState>,
    principal: Principal,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = validate::uuid("id", &id)?;
    state
        .db
        .call(move |db| db.delete_board(principal.as_str(), id))
        .await?;
    Ok(deleted(id))
}

async fn create_column(
    State(state): State<SharedState>,
    principal: Principal,
    payload: Result<Json<CreateColumnRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let name = validate::required("name", req.name)?;
    let color = validate::required("color", req.color)?;
    let board_id = validate::uuid("board_id", &validate::required("board_id", req.board_id)?)?;
    let position = position_field(req.position.as_ref())?;
    let column = state
        .db
        .call(move |db| db.create_column(principal.as_str(), board_id, &name, &color, position))
        .await?;
    Ok(Json(column))
}

async fn get_column(
    State(state): State<SharedState>,
    principal: Principal,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = validate::uuid("id", &id)?;
    let column = state
        .db
        .call(move |db| db.get_column(principal.as_str(), id))
        .await?;
    Ok(Json(column))
}

async fn update_column(
    State(state): State<SharedState>,
    principal: Principal,
    Path(id): Path<String>,
    payload: Result<Json<UpdateColumnRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let id = validate::uuid("id", &id)?;
    let Json(req) = payload?;
    let update = ColumnUpdate {
        name: req.name,
        color: req.color,
        position: position_field(req.position.as_ref())?,
    };
    let column = state
        .db
        .call(move |db| db.update_column(principal.as_str(), id, update))
        .await?;
    Ok(Json(column))
}

async fn delete_column(
    State(state): State<SharedState>,
    principal: Principal,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = validate::uuid("id", &id)?;
    state
        .db
        .call(move |db| db.delete_column(principal.as_str(), id))
        .await?;
    Ok(deleted(id))
}

async fn create_task(
    State(state): State<SharedState>,
    principal: Principal,
    payload: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let name = validate::required("name", req.name)?;
    let column_id = validate::uuid("column_id", &validate::required("column_id", req.column_id)?)?;
    let description = req.description;
    let subtasks = req.subtasks;
    let task = state
        .db
        .call(move |db| {
            db.create_task(
                principal.as_str(),
                column_id,
                &name,
                description.as_deref(),
                &subtasks,
            )
        })
        .await?;
    Ok((StatusCode::CREATED, Json(task)))
}

async fn get_task(
    State(state): State<SharedState>,
    principal: Principal,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = validate::uuid("id", &id)?;
    let task = state
        .db
        .call(move |db| db.get_task(principal.as_str(), id))
        .await?;
    Ok(Json(task))
}

async fn update_task(
    State(state): State<SharedState>,
    principal: Principal,
    Path(id): Path<String>,
    payload: Result<Json<UpdateTaskRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let id = validate::uuid("id", &id)?;
    let Json(req) = payload?;
    let update = TaskUpdate {
        name: req.name,
        description: req.description,
        column_id: req
            .column_id
            .as_deref()
            .map(|raw| validate::uuid("column_id", raw))
            .transpose()?,
        position: position_field(req.position.as_ref())?,
        subtasks: req.subtasks.map(subtask_specs).transpose()?,
    };
    let task = state
        .db
        .call(move |db| db.update_task(principal.as_str(), id, update))
        .await?;
    Ok(Json(task))
}

async fn delete_task(
    State(state): State<SharedState>,
    principal: Principal,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = validate::uuid("id", &id)?;
    state
        .db
        .call(move |db| db.delete_task(principal.as_str(), id))
        .await?;
    Ok(deleted(id))
}

async fn update_subtask(
    State(state): State<SharedState>,
    principal: Principal,
    Path(id): Path<String>,
    payload: Result<Json<UpdateSubtaskRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let id = validate::uuid("id", &id)?;
    let Json(req) = payload?;
    let update = SubtaskUpdate {
        name: req.name,
        completed: req.completed,
    };
    let subtask = state
        .db
        .call(move |db| db.update_subtask(principal.as_str(), id, update))
        .await?;
    Ok(Json(subtask))
}

// ── Tests ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::principal::PRINCIPAL_HEADER;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::json;
    use tower::ServiceExt;

    fn test_state() -> SharedState {
        let db = BoardDb::new_in_memory().unwrap();
        Arc::new(AppState {
            db: DbHandle::new(db),
        })
    }

    fn test_app() -> Router {
        api_router().with_state(test_state())
    }

    /// Send a request as `alice` and decode the JSON response.
    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        send_as(app, Some("alice"), method, uri, body).await
    }

    async fn send_as(
        app: &Router,
        user: Option<&str>,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header(PRINCIPAL_HEADER, user);
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn create_board(app: &Router, columns: &[&str]) -> Value {
        let columns: Vec<_> = columns
            .iter()
            .map(|name| json!({"name": name, "color": "#123456"}))
            .collect();
        let (status, board) = send(
            app,
            "POST",
            "/api/boards",
            Some(json!({"name": "Roadmap", "columns": columns})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        board
    }

    async fn create_task(app: &Router, column_id: &Value, name: &str) -> Value {
        let (status, task) = send(
            app,
            "POST",
            "/api/tasks",
            Some(json!({"name": name, "column_id": column_id})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        task
    }

    async fn task_names(app: &Router, column_id: &Value) -> Vec<String> {
        let (status, column) = send(app, "GET", &format!("/api/columns/{}", column_id.as_str().unwrap()), None).await;
        assert_eq!(status, StatusCode::OK);
        column["tasks"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap().to_string())
            .collect()
    }

    fn id_of(value: &Value) -> &str {
        value["id"].as_str().unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = test_app();

        let request = Request::builder()
            .method("GET")
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn test_missing_principal_is_unauthorized() {
        let app = test_app();
        let (status, body) = send_as(&app, None, "GET", "/api/boards", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].as_str().unwrap().contains(PRINCIPAL_HEADER));
    }

    #[tokio::test]
    async fn test_create_and_list_boards() {
        let app = test_app();
        let board = create_board(&app, &["Todo", "Doing", "Done"]).await;

        assert_eq!(board["name"], "Roadmap");
        let positions: Vec<_> = board["columns"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| (c["name"].as_str().unwrap().to_string(), c["position"].as_i64().unwrap()))
            .collect();
        assert_eq!(
            positions,
            vec![("Todo".to_string(), 0), ("Doing".to_string(), 1), ("Done".to_string(), 2)]
        );

        let (status, boards) = send(&app, "GET", "/api/boards", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(boards.as_array().unwrap().len(), 1);

        let (_, others) = send_as(&app, Some("bob"), "GET", "/api/boards", None).await;
        assert!(others.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_other_principal_gets_not_found() {
        let app = test_app();
        let board = create_board(&app, &["Todo"]).await;
        let uri = format!("/api/boards/{}", id_of(&board));

        let (status, _) = send_as(&app, Some("bob"), "GET", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send_as(&app, Some("bob"), "DELETE", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_create_column_validation() {
        let app = test_app();
        let board = create_board(&app, &["Todo"]).await;
        let board_id = id_of(&board);

        let (status, body) = send(&app, "POST", "/api/columns", Some(json!({"name": "X", "color": "#fff"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["field"], "board_id");

        let (status, body) = send(
            &app,
            "POST",
            "/api/columns",
            Some(json!({"name": "x".repeat(21), "color": "#fff", "board_id": board_id})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["field"], "name");

        let (status, _) = send(
            &app,
            "POST",
            "/api/columns",
            Some(json!({"name": "todo", "color": "#fff", "board_id": board_id})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(
            &app,
            "POST",
            "/api/columns",
            Some(json!({"name": "New", "color": "#fff", "board_id": "not-a-uuid"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["field"], "board_id");

        let (status, _) = send(
            &app,
            "POST",
            "/api/columns",
            Some(json!({"name": "New", "color": "#fff", "board_id": Uuid::new_v4()})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_create_column_at_position() {
        let app = test_app();
        let board = create_board(&app, &["A", "B"]).await;

        let (status, column) = send(
            &app,
            "POST",
            "/api/columns",
            Some(json!({"name": "First", "color": "#fff", "board_id": id_of(&board), "position": 0})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(column["position"], 0);

        let (_, view) = send(&app, "GET", &format!("/api/boards/{}", id_of(&board)), None).await;
        let names: Vec<_> = view["columns"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["First", "A", "B"]);
    }

    #[tokio::test]
    async fn test_delete_middle_column() {
        let app = test_app();
        let board = create_board(&app, &["A", "B", "C"]).await;
        let b = &board["columns"][1];

        let (status, body) = send(&app, "DELETE", &format!("/api/columns/{}", id_of(b)), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "deleted");

        let (_, view) = send(&app, "GET", &format!("/api/boards/{}", id_of(&board)), None).await;
        let columns: Vec<_> = view["columns"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| (c["name"].as_str().unwrap().to_string(), c["position"].as_i64().unwrap()))
            .collect();
        assert_eq!(columns, vec![("A".to_string(), 0), ("C".to_string(), 1)]);
    }

    #[tokio::test]
    async fn test_move_task_to_front() {
        let app = test_app();
        let board = create_board(&app, &["Todo"]).await;
        let column_id = &board["columns"][0]["id"];
        create_task(&app, column_id, "T1").await;
        create_task(&app, column_id, "T2").await;
        let t3 = create_task(&app, column_id, "T3").await;

        let (status, moved) = send(
            &app,
            "PUT",
            &format!("/api/tasks/{}", id_of(&t3)),
            Some(json!({"position": 0})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(moved["position"], 0);
        assert_eq!(task_names(&app, column_id).await, vec!["T3", "T1", "T2"]);
    }

    #[tokio::test]
    async fn test_move_task_across_columns() {
        let app = test_app();
        let board = create_board(&app, &["X", "Y"]).await;
        let x = &board["columns"][0]["id"];
        let y = &board["columns"][1]["id"];
        let a = create_task(&app, x, "A").await;
        create_task(&app, x, "B").await;
        create_task(&app, y, "C").await;

        let (status, moved) = send(
            &app,
            "PUT",
            &format!("/api/tasks/{}", id_of(&a)),
            Some(json!({"column_id": y, "position": 0})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(&moved["column_id"], y);
        assert_eq!(task_names(&app, x).await, vec!["B"]);
        assert_eq!(task_names(&app, y).await, vec!["A", "C"]);
    }

    #[tokio::test]
    async fn test_create_task_ignores_position() {
        let app = test_app();
        let board = create_board(&app, &["Todo"]).await;
        let column_id = &board["columns"][0]["id"];
        for name in ["T1", "T2", "T3"] {
            create_task(&app, column_id, name).await;
        }

        let (status, task) = send(
            &app,
            "POST",
            "/api/tasks",
            Some(json!({"name": "T4", "column_id": column_id, "position": 0, "subtasks": ["one"]})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(task["position"], 3);
        assert_eq!(task["subtasks"][0]["completed"], false);
    }

    #[tokio::test]
    async fn test_move_task_past_end_clamps() {
        let app = test_app();
        let board = create_board(&app, &["Todo"]).await;
        let column_id = &board["columns"][0]["id"];
        let t1 = create_task(&app, column_id, "T1").await;
        create_task(&app, column_id, "T2").await;
        create_task(&app, column_id, "T3").await;

        let (status, moved) = send(
            &app,
            "PUT",
            &format!("/api/tasks/{}", id_of(&t1)),
            Some(json!({"position": 99})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(moved["position"], 2);
    }

    #[tokio::test]
    async fn test_bad_position_types_are_rejected() {
        let app = test_app();
        let board = create_board(&app, &["Todo"]).await;
        let task = create_task(&app, &board["columns"][0]["id"], "T").await;
        let uri = format!("/api/tasks/{}", id_of(&task));

        for bad in [json!(-1), json!(1.5), json!("0"), json!(true)] {
            let (status, body) = send(&app, "PUT", &uri, Some(json!({"position": bad}))).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "position {bad} should be rejected");
            assert_eq!(body["field"], "position");
        }

        let (status, _) = send(&app, "PUT", &uri, Some(json!({"position": 0.0}))).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_task_validation_and_not_found() {
        let app = test_app();
        let board = create_board(&app, &["Todo"]).await;
        let column_id = &board["columns"][0]["id"];

        let (status, body) = send(&app, "POST", "/api/tasks", Some(json!({"name": "", "column_id": column_id}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["field"], "name");

        let (status, body) = send(&app, "POST", "/api/tasks", Some(json!({"name": "T", "column_id": "zzz"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["field"], "column_id");

        let (status, _) = send(
            &app,
            "POST",
            "/api/tasks",
            Some(json!({"name": "T", "column_id": Uuid::new_v4()})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, "DELETE", &format!("/api/tasks/{}", Uuid::new_v4()), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let app = test_app();
        let request = Request::builder()
            .method("POST")
            .uri("/api/boards")
            .header(PRINCIPAL_HEADER, "alice")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_edit_board_reconciles_columns() {
        let app = test_app();
        let board = create_board(&app, &["A", "B"]).await;
        let uri = format!("/api/boards/{}", id_of(&board));
        let a = id_of(&board["columns"][0]).to_string();

        let (status, body) = send(
            &app,
            "PUT",
            &uri,
            Some(json!({"name": "Edited", "columns": [
                {"name": "Dup", "color": "#fff"},
                {"name": "dup", "color": "#fff"}
            ]})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["field"], "columns");

        let (status, view) = send(
            &app,
            "PUT",
            &uri,
            Some(json!({"name": "Edited", "columns": [
                {"name": "Fresh", "color": "#000"},
                {"id": a, "name": "A", "color": "#fff"}
            ]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["name"], "Edited");
        assert_eq!(view["columns"][0]["name"], "Fresh");
        assert_eq!(view["columns"][1]["id"], a.as_str());
        assert_eq!(view["columns"][1]["position"], 1);
        assert_eq!(view["columns"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_subtask_completion_survives_rename() {
        let app = test_app();
        let board = create_board(&app, &["Todo"]).await;
        let (_, task) = send(
            &app,
            "POST",
            "/api/tasks",
            Some(json!({"name": "T", "column_id": board["columns"][0]["id"], "subtasks": ["draft"]})),
        )
        .await;
        let subtask_id = id_of(&task["subtasks"][0]).to_string();

        let (status, subtask) = send(
            &app,
            "PUT",
            &format!("/api/subtasks/{}", subtask_id),
            Some(json!({"completed": true})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(subtask["completed"], true);

        let (status, updated) = send(
            &app,
            "PUT",
            &format!("/api/tasks/{}", id_of(&task)),
            Some(json!({"subtasks": [{"id": subtask_id, "name": "final"}, {"name": "review"}]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["subtasks"][0]["name"], "final");
        assert_eq!(updated["subtasks"][0]["completed"], true);
        assert_eq!(updated["subtasks"][1]["completed"], false);
    }

    #[tokio::test]
    async fn test_invariant_violation_is_internal_error() {
        let state = test_state();
        let app = api_router().with_state(state.clone());
        let board = create_board(&app, &["Todo"]).await;
        let column_id = &board["columns"][0]["id"];
        let t1 = create_task(&app, column_id, "T1").await;
        let t2 = create_task(&app, column_id, "T2").await;

        // Corrupt the column behind the service's back.
        let t2_id = Uuid::parse_str(id_of(&t2)).unwrap();
        state
            .db
            .call(move |db| {
                db.conn().execute(
                    "UPDATE tasks SET position = 7 WHERE id = ?1",
                    rusqlite::params![t2_id],
                )?;
                Ok(())
            })
            .await
            .unwrap();

        let (status, body) = send(&app, "DELETE", &format!("/api/tasks/{}", id_of(&t1)), None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "internal server error");

        // Rolled back: T1 is still there.
        let (status, _) = send(&app, "GET", &format!("/api/tasks/{}", id_of(&t1)), None).await;
        assert_eq!(status, StatusCode::OK);
    }
}
