//! Async API client: request builder + transport + the session token.
//!
//! Every call reads the current token from the `Session` at build time. An
//! `Unauthorized` result from any task endpoint expires the session before
//! the error is handed back, unless the session has moved on to another token
//! while the request was in flight; that is the only way `Api` touches session
//! state. Persisting a token after `login` is the caller's job.

use tracing::debug;

use crate::client::TaskClient;
use crate::error::{ApiError, Operation};
use crate::http::{HttpRequest, HttpResponse};
use crate::session::Session;
use crate::transport::Transport;
use crate::types::{Credentials, LoginResponse, NewTask, Task, TaskId, TaskPatch};

pub struct Api<T> {
    client: TaskClient,
    transport: T,
    session: Session,
}

impl<T: Transport> Api<T> {
    pub fn new(client: TaskClient, transport: T, session: Session) -> Self {
        Self {
            client,
            transport,
            session,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub async fn list_tasks(&self) -> Result<Vec<Task>, ApiError> {
        let token = self.session.token();
        let request = self.client.build_list_tasks(token.as_deref());
        let response = self.send(Operation::ListTasks, request).await?;
        self.settle(token.as_deref(), self.client.parse_list_tasks(response))
    }

    pub async fn create_task(&self, input: &NewTask) -> Result<TaskId, ApiError> {
        let token = self.session.token();
        let request = self.client.build_create_task(token.as_deref(), input)?;
        let response = self.send(Operation::CreateTask, request).await?;
        self.settle(token.as_deref(), self.client.parse_create_task(response))
    }

    pub async fn update_task(&self, id: TaskId, patch: &TaskPatch) -> Result<(), ApiError> {
        let token = self.session.token();
        let request = self.client.build_update_task(token.as_deref(), id, patch)?;
        let response = self.send(Operation::UpdateTask, request).await?;
        self.settle(token.as_deref(), self.client.parse_update_task(response))
    }

    pub async fn delete_task(&self, id: TaskId) -> Result<(), ApiError> {
        let token = self.session.token();
        let request = self.client.build_delete_task(token.as_deref(), id);
        let response = self.send(Operation::DeleteTask, request).await?;
        self.settle(token.as_deref(), self.client.parse_delete_task(response))
    }

    pub async fn register(&self, username: &str, password: &str) -> Result<(), ApiError> {
        let request = self.client.build_register(&credentials(username, password))?;
        let response = self.send(Operation::Register, request).await?;
        self.client.parse_register(response)
    }

    /// Exchange credentials for a token. Does not touch the session.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let request = self.client.build_login(&credentials(username, password))?;
        let response = self.send(Operation::Login, request).await?;
        self.client.parse_login(response)
    }

    async fn send(&self, operation: Operation, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        debug!(%operation, "calling backend");
        self.transport
            .execute(request)
            .await
            .map_err(|e| ApiError::Network {
                operation,
                message: e.to_string(),
            })
    }

    /// `sent_with` is the token the request carried; a 401 only expires the
    /// session while that token is still the current one.
    fn settle<R>(&self, sent_with: Option<&str>, result: Result<R, ApiError>) -> Result<R, ApiError> {
        if let (Err(ApiError::Unauthorized), Some(token)) = (&result, sent_with) {
            self.session.expire_if(token);
        }
        result
    }
}

fn credentials(username: &str, password: &str) -> Credentials {
    Credentials {
        username: username.to_string(),
        password: password.to_string(),
    }
}
