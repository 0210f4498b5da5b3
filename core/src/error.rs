//! Error types for the TaskFlow client.
//!
//! # Design
//! `ApiError` follows the backend failure taxonomy: the request never
//! completed (`Network`), the bearer token was rejected (`Unauthorized`), the
//! backend refused the input (`Validation`, any other 4xx) or failed on its
//! own (`Server`). `Validation` and `Server` carry the backend's `error`
//! text when the body has one, otherwise the operation's generic message.
//!
//! The remaining enums belong to the layers above the API client: token
//! persistence, session transitions, and the task synchronizer.

use std::fmt;
use std::io;

use thiserror::Error;

use crate::types::TaskId;

/// The backend capability a request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ListTasks,
    CreateTask,
    UpdateTask,
    DeleteTask,
    Register,
    Login,
}

impl Operation {
    /// Message used when a failed response carries no `error` field.
    pub fn failure_message(self) -> &'static str {
        match self {
            Operation::ListTasks => "Failed to fetch tasks",
            Operation::CreateTask => "Failed to create task",
            Operation::UpdateTask => "Failed to update task",
            Operation::DeleteTask => "Failed to delete task",
            Operation::Register => "Registration failed",
            Operation::Login => "Login failed",
        }
    }

    /// Task endpoints require a bearer token; auth endpoints do not, so a 401
    /// from them means bad credentials rather than an expired session.
    pub fn requires_auth(self) -> bool {
        !matches!(self, Operation::Register | Operation::Login)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::ListTasks => "list tasks",
            Operation::CreateTask => "create task",
            Operation::UpdateTask => "update task",
            Operation::DeleteTask => "delete task",
            Operation::Register => "register",
            Operation::Login => "login",
        };
        f.write_str(name)
    }
}

/// Errors returned by the API client.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a response.
    #[error("{operation}: network failure: {message}")]
    Network { operation: Operation, message: String },

    /// The backend rejected the session token (401 on a task endpoint).
    #[error("unauthorized")]
    Unauthorized,

    /// The backend refused the request (4xx).
    #[error("{message}")]
    Validation { status: u16, message: String },

    /// The backend failed to handle the request (5xx or unexpected status).
    #[error("{message}")]
    Server { status: u16, message: String },

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    Deserialization(String),
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Validation { status, .. } | ApiError::Server { status, .. } => Some(*status),
            ApiError::Unauthorized => Some(401),
            _ => None,
        }
    }
}

/// Failures of the durable token storage.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("token storage i/o: {0}")]
    Io(#[from] io::Error),

    #[error("token storage format: {0}")]
    Format(#[from] serde_json::Error),
}

/// Errors from session transitions.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session token must not be empty")]
    EmptyToken,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors from task synchronizer operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Rejected locally; no request was sent.
    #[error("task title must not be empty")]
    EmptyTitle,

    #[error("task {0} is not in the current list")]
    UnknownTask(TaskId),

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Errors from the sign-in flow.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Session(#[from] SessionError),
}
