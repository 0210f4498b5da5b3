//! Stateless HTTP request builder and response parser for the TaskFlow API.
//!
//! # Design
//! `TaskClient` holds only a `base_url` and carries no mutable state between
//! calls. Each operation is split into a `build_*` method that produces an
//! `HttpRequest` and a `parse_*` method that consumes an `HttpResponse`.
//! The session token is an explicit argument to every task `build_*` method,
//! so the builder never reads or writes session state.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{ApiError, Operation};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::types::{Created, Credentials, ErrorBody, LoginResponse, NewTask, Task, TaskId, TaskPatch};

/// Synchronous, stateless request builder for the TaskFlow API.
#[derive(Debug, Clone)]
pub struct TaskClient {
    base_url: String,
}

impl TaskClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn build_list_tasks(&self, token: Option<&str>) -> HttpRequest {
        request(HttpMethod::Get, format!("{}/tasks", self.base_url), token, None)
    }

    pub fn build_create_task(&self, token: Option<&str>, input: &NewTask) -> Result<HttpRequest, ApiError> {
        let body = to_json(input)?;
        Ok(request(HttpMethod::Post, format!("{}/tasks", self.base_url), token, Some(body)))
    }

    pub fn build_update_task(
        &self,
        token: Option<&str>,
        id: TaskId,
        patch: &TaskPatch,
    ) -> Result<HttpRequest, ApiError> {
        let body = to_json(patch)?;
        Ok(request(HttpMethod::Put, format!("{}/tasks/{id}", self.base_url), token, Some(body)))
    }

    pub fn build_delete_task(&self, token: Option<&str>, id: TaskId) -> HttpRequest {
        request(HttpMethod::Delete, format!("{}/tasks/{id}", self.base_url), token, None)
    }

    /// Registration is anonymous: no `Authorization` header is sent.
    pub fn build_register(&self, credentials: &Credentials) -> Result<HttpRequest, ApiError> {
        let body = to_json(credentials)?;
        Ok(request(HttpMethod::Post, format!("{}/register", self.base_url), None, Some(body)))
    }

    pub fn build_login(&self, credentials: &Credentials) -> Result<HttpRequest, ApiError> {
        let body = to_json(credentials)?;
        Ok(request(HttpMethod::Post, format!("{}/login", self.base_url), None, Some(body)))
    }

    pub fn parse_list_tasks(&self, response: HttpResponse) -> Result<Vec<Task>, ApiError> {
        check_status(&response, Operation::ListTasks)?;
        from_json(&response.body)
    }

    pub fn parse_create_task(&self, response: HttpResponse) -> Result<TaskId, ApiError> {
        check_status(&response, Operation::CreateTask)?;
        from_json::<Created>(&response.body).map(|created| created.id)
    }

    pub fn parse_update_task(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(&response, Operation::UpdateTask)
    }

    pub fn parse_delete_task(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(&response, Operation::DeleteTask)
    }

    pub fn parse_register(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(&response, Operation::Register)
    }

    pub fn parse_login(&self, response: HttpResponse) -> Result<LoginResponse, ApiError> {
        check_status(&response, Operation::Login)?;
        from_json(&response.body)
    }
}

fn request(method: HttpMethod, url: String, token: Option<&str>, body: Option<String>) -> HttpRequest {
    let mut headers = Vec::new();
    if body.is_some() {
        headers.push(("content-type".to_string(), "application/json".to_string()));
    }
    if let Some(token) = token {
        headers.push(("authorization".to_string(), format!("Bearer {token}")));
    }
    HttpRequest { method, url, headers, body }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, ApiError> {
    serde_json::to_string(value).map_err(|e| ApiError::Serialization(e.to_string()))
}

fn from_json<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    serde_json::from_str(body).map_err(|e| ApiError::Deserialization(e.to_string()))
}

/// Map non-success status codes to the appropriate `ApiError` variant.
fn check_status(response: &HttpResponse, operation: Operation) -> Result<(), ApiError> {
    if response.is_success() {
        return Ok(());
    }
    if response.status == 401 && operation.requires_auth() {
        return Err(ApiError::Unauthorized);
    }
    let message = serde_json::from_str::<ErrorBody>(&response.body)
        .map(|body| body.error)
        .unwrap_or_else(|_| operation.failure_message().to_string());
    let status = response.status;
    if (400..500).contains(&status) {
        Err(ApiError::Validation { status, message })
    } else {
        Err(ApiError::Server { status, message })
    }
}
