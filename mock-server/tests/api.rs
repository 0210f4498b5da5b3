use axum::http::{self, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use mock_server::{app, Status, Task};
use tower::ServiceExt;

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: &str) -> Request<String> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(http::header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(body.to_string()).unwrap()
}

fn bare_request(method: &str, uri: &str, token: Option<&str>) -> Request<String> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(http::header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(String::new()).unwrap()
}

async fn call(app: &Router, request: Request<String>) -> axum::response::Response {
    app.clone().oneshot(request).await.unwrap()
}

/// Register `username` and return a fresh token for it.
async fn sign_in(app: &Router, username: &str) -> String {
    let credentials = format!(r#"{{"username":"{username}","password":"secret1"}}"#);
    let resp = call(app, json_request("POST", "/api/register", None, &credentials)).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let resp = call(app, json_request("POST", "/api/login", None, &credentials)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = body_json(resp).await;
    body["token"].as_str().unwrap().to_string()
}

// --- auth ---

#[tokio::test]
async fn duplicate_registration_is_rejected_with_message() {
    let app = app();
    sign_in(&app, "alice").await;
    let resp = call(
        &app,
        json_request("POST", "/api/register", None, r#"{"username":"alice","password":"other"}"#),
    )
    .await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = body_json(resp).await;
    assert_eq!(body["error"], "Username may already exist");
}

#[tokio::test]
async fn login_with_wrong_password_returns_401() {
    let app = app();
    sign_in(&app, "alice").await;
    let resp = call(
        &app,
        json_request("POST", "/api/login", None, r#"{"username":"alice","password":"nope"}"#),
    )
    .await;

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = body_json(resp).await;
    assert_eq!(body["error"], "Invalid credentials");
}

#[tokio::test]
async fn tasks_require_a_valid_token() {
    let app = app();
    let resp = call(&app, bare_request("GET", "/api/tasks", None)).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = call(&app, bare_request("GET", "/api/tasks", Some("made-up"))).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = body_json(resp).await;
    assert_eq!(body["error"], "Unauthorized");
}

// --- create ---

#[tokio::test]
async fn create_task_returns_201_with_todo_status() {
    let app = app();
    let token = sign_in(&app, "alice").await;
    let resp = call(
        &app,
        json_request("POST", "/api/tasks", Some(&token), r#"{"title":"Buy milk"}"#),
    )
    .await;

    assert_eq!(resp.status(), StatusCode::CREATED);
    let task: Task = body_json(resp).await;
    assert_eq!(task.title, "Buy milk");
    assert_eq!(task.status, Status::Todo);
    assert!(!task.is_finished);
    assert!(task.finished_at.is_none());
}

#[tokio::test]
async fn create_task_with_blank_title_returns_400() {
    let app = app();
    let token = sign_in(&app, "alice").await;
    let resp = call(&app, json_request("POST", "/api/tasks", Some(&token), r#"{"title":"  "}"#)).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_task_malformed_json_returns_422() {
    let app = app();
    let token = sign_in(&app, "alice").await;
    let resp = call(&app, json_request("POST", "/api/tasks", Some(&token), r#"{"not_title":1}"#)).await;

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

// --- update / delete ---

#[tokio::test]
async fn update_task_not_found() {
    let app = app();
    let token = sign_in(&app, "alice").await;
    let resp = call(
        &app,
        json_request("PUT", "/api/tasks/999", Some(&token), r#"{"status":"done"}"#),
    )
    .await;

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: serde_json::Value = body_json(resp).await;
    assert_eq!(body["error"], "Task not found");
}

#[tokio::test]
async fn delete_task_bad_id_returns_400() {
    let app = app();
    let token = sign_in(&app, "alice").await;
    let resp = call(&app, bare_request("DELETE", "/api/tasks/not-a-number", Some(&token))).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn users_cannot_see_each_others_tasks() {
    let app = app();
    let alice = sign_in(&app, "alice").await;
    let bob = sign_in(&app, "bob").await;
    call(&app, json_request("POST", "/api/tasks", Some(&alice), r#"{"title":"Private"}"#)).await;

    let resp = call(&app, bare_request("GET", "/api/tasks", Some(&bob))).await;
    let tasks: Vec<Task> = body_json(resp).await;
    assert!(tasks.is_empty());

    let resp = call(&app, bare_request("DELETE", "/api/tasks/1", Some(&bob))).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// --- full lifecycle ---

#[tokio::test]
async fn task_lifecycle() {
    let app = app();
    let token = sign_in(&app, "alice").await;

    // create two; list is newest first
    for title in ["Walk dog", "Water plants"] {
        let body = format!(r#"{{"title":"{title}","deadline":"2001-01-01T00:00:00Z"}}"#);
        let resp = call(&app, json_request("POST", "/api/tasks", Some(&token), &body)).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
    }
    let resp = call(&app, bare_request("GET", "/api/tasks", Some(&token))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let tasks: Vec<Task> = body_json(resp).await;
    let titles: Vec<&str> = tasks.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, vec!["Water plants", "Walk dog"]);
    assert!(tasks.iter().all(|t| t.is_expired));
    let id = tasks[1].id;

    // finish it: finished_at set, no longer expired
    let resp = call(
        &app,
        json_request("PUT", &format!("/api/tasks/{id}"), Some(&token), r#"{"status":"done"}"#),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let updated: Task = body_json(resp).await;
    assert_eq!(updated.title, "Walk dog");
    assert!(updated.is_finished);
    assert!(updated.finished_at.is_some());
    assert!(!updated.is_expired);

    // reopen it: finished_at cleared
    let resp = call(
        &app,
        json_request("PUT", &format!("/api/tasks/{id}"), Some(&token), r#"{"status":"todo"}"#),
    )
    .await;
    let reopened: Task = body_json(resp).await;
    assert!(!reopened.is_finished);
    assert!(reopened.finished_at.is_none());

    // delete
    let resp = call(&app, bare_request("DELETE", &format!("/api/tasks/{id}"), Some(&token))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_bytes(resp).await;
    assert_eq!(&body[..], br#"{"ok":true}"#);

    // delete again: 404
    let resp = call(&app, bare_request("DELETE", &format!("/api/tasks/{id}"), Some(&token))).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = call(&app, bare_request("GET", "/api/tasks", Some(&token))).await;
    let tasks: Vec<Task> = body_json(resp).await;
    assert_eq!(tasks.len(), 1);
}
