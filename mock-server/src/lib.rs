//! In-memory stand-in for the TaskFlow backend, used by client tests.
//!
//! Implements the REST contract the client consumes: bearer-token auth,
//! per-user task lists ordered newest first, `{"error": ...}` bodies on every
//! failure. Passwords are kept in plain text; this is a fixture, not a
//! server.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Todo,
    InProgress,
    Done,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub status: Status,
    pub is_finished: bool,
    pub deadline: Option<DateTime<Utc>>,
    pub is_expired: bool,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct CreateTask {
    pub title: String,
    pub description: Option<String>,
    pub deadline: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
pub struct UpdateTask {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<Status>,
    pub deadline: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug)]
struct StoredTask {
    id: i64,
    owner: String,
    title: String,
    description: Option<String>,
    status: Status,
    deadline: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl StoredTask {
    fn set_status(&mut self, status: Status, now: DateTime<Utc>) {
        self.status = status;
        if status == Status::Done {
            self.finished_at.get_or_insert(now);
        } else {
            self.finished_at = None;
        }
    }

    fn view(&self, now: DateTime<Utc>) -> Task {
        let is_finished = self.status == Status::Done;
        Task {
            id: self.id,
            title: self.title.clone(),
            description: self.description.clone(),
            status: self.status,
            is_finished,
            deadline: self.deadline,
            is_expired: !is_finished && self.deadline.is_some_and(|d| d < now),
            created_at: self.created_at,
            finished_at: self.finished_at,
        }
    }
}

#[derive(Default)]
pub struct Db {
    users: HashMap<String, String>,
    tokens: HashMap<String, String>,
    tasks: BTreeMap<i64, StoredTask>,
    next_id: i64,
}

impl Db {
    /// Invalidate every issued token, as a backend restart or expiry would.
    pub fn revoke_all_tokens(&mut self) {
        self.tokens.clear();
    }

    fn owner(&self, headers: &HeaderMap) -> Result<String, Failure> {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .and_then(|token| self.tokens.get(token))
            .cloned()
            .ok_or(Failure::UNAUTHORIZED)
    }

    fn owned_mut(&mut self, owner: &str, id: i64) -> Result<&mut StoredTask, Failure> {
        self.tasks
            .get_mut(&id)
            .filter(|task| task.owner == owner)
            .ok_or(Failure::NOT_FOUND)
    }
}

pub type SharedDb = Arc<RwLock<Db>>;

/// A failed request, rendered as `{"error": message}`.
#[derive(Debug)]
pub struct Failure {
    status: StatusCode,
    message: &'static str,
}

impl Failure {
    const UNAUTHORIZED: Failure = Failure::new(StatusCode::UNAUTHORIZED, "Unauthorized");
    const NOT_FOUND: Failure = Failure::new(StatusCode::NOT_FOUND, "Task not found");

    const fn new(status: StatusCode, message: &'static str) -> Self {
        Self { status, message }
    }
}

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

pub fn app() -> Router {
    app_with(SharedDb::default())
}

/// Router over an existing database, so tests can reach into the state.
pub fn app_with(db: SharedDb) -> Router {
    Router::new()
        .route("/api/register", post(register))
        .route("/api/login", post(login))
        .route("/api/tasks", get(list_tasks).post(create_task))
        .route("/api/tasks/{id}", axum::routing::put(update_task).delete(delete_task))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    run_with(listener, SharedDb::default()).await
}

pub async fn run_with(listener: TcpListener, db: SharedDb) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with(db)).await
}

async fn register(
    State(db): State<SharedDb>,
    Json(input): Json<Credentials>,
) -> Result<(StatusCode, Json<serde_json::Value>), Failure> {
    let username = input.username.trim();
    if username.is_empty() || input.password.is_empty() {
        return Err(Failure::new(
            StatusCode::BAD_REQUEST,
            "Username and password are required",
        ));
    }
    let mut db = db.write().await;
    if db.users.contains_key(username) {
        return Err(Failure::new(StatusCode::BAD_REQUEST, "Username may already exist"));
    }
    db.users.insert(username.to_string(), input.password);
    info!(username, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "User registered successfully" })),
    ))
}

async fn login(
    State(db): State<SharedDb>,
    Json(input): Json<Credentials>,
) -> Result<Json<serde_json::Value>, Failure> {
    let mut db = db.write().await;
    let username = input.username.trim();
    if db.users.get(username) != Some(&input.password) {
        return Err(Failure::new(StatusCode::UNAUTHORIZED, "Invalid credentials"));
    }
    let token = Uuid::new_v4().to_string();
    db.tokens.insert(token.clone(), username.to_string());
    Ok(Json(json!({ "token": token })))
}

async fn list_tasks(State(db): State<SharedDb>, headers: HeaderMap) -> Result<Json<Vec<Task>>, Failure> {
    let db = db.read().await;
    let owner = db.owner(&headers)?;
    let now = Utc::now();
    let mut tasks: Vec<&StoredTask> = db.tasks.values().filter(|t| t.owner == owner).collect();
    tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    Ok(Json(tasks.into_iter().map(|t| t.view(now)).collect()))
}

async fn create_task(
    State(db): State<SharedDb>,
    headers: HeaderMap,
    Json(input): Json<CreateTask>,
) -> Result<(StatusCode, Json<Task>), Failure> {
    let mut db = db.write().await;
    let owner = db.owner(&headers)?;
    if input.title.trim().is_empty() {
        return Err(Failure::new(StatusCode::BAD_REQUEST, "Title is required"));
    }
    db.next_id += 1;
    let now = Utc::now();
    let task = StoredTask {
        id: db.next_id,
        owner,
        title: input.title,
        description: input.description,
        status: Status::Todo,
        deadline: input.deadline,
        created_at: now,
        finished_at: None,
    };
    debug!(id = task.id, "task created");
    let view = task.view(now);
    db.tasks.insert(task.id, task);
    Ok((StatusCode::CREATED, Json(view)))
}

async fn update_task(
    State(db): State<SharedDb>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(input): Json<UpdateTask>,
) -> Result<Json<Task>, Failure> {
    let mut db = db.write().await;
    let owner = db.owner(&headers)?;
    let task = db.owned_mut(&owner, id)?;
    let now = Utc::now();
    if let Some(title) = input.title {
        if title.trim().is_empty() {
            return Err(Failure::new(StatusCode::BAD_REQUEST, "Title is required"));
        }
        task.title = title;
    }
    if let Some(description) = input.description {
        task.description = Some(description);
    }
    if let Some(deadline) = input.deadline {
        task.deadline = Some(deadline);
    }
    if let Some(status) = input.status {
        task.set_status(status, now);
    }
    Ok(Json(task.view(now)))
}

async fn delete_task(
    State(db): State<SharedDb>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, Failure> {
    let mut db = db.write().await;
    let owner = db.owner(&headers)?;
    db.owned_mut(&owner, id)?;
    db.tasks.remove(&id);
    Ok(Json(json!({ "ok": true })))
}
