//! Entry point for views: wires config, session, API client and task
//! synchronizer, and runs the sign-up / sign-in / sign-out flows.

use std::sync::Arc;

use tracing::{info, warn};

use crate::api::Api;
use crate::client::TaskClient;
use crate::config::Config;
use crate::error::AuthError;
use crate::session::{FileTokenStore, Session, TokenStore};
use crate::sync::TaskSynchronizer;
use crate::transport::{ReqwestTransport, Transport};

pub struct TaskFlow<T> {
    session: Session,
    api: Arc<Api<T>>,
    tasks: TaskSynchronizer<T>,
}

impl TaskFlow<ReqwestTransport> {
    /// Production wiring: reqwest transport and the token file from `config`.
    pub fn from_config(config: &Config) -> Self {
        let store = Arc::new(FileTokenStore::new(&config.token_path));
        Self::new(config, ReqwestTransport::new(), store)
    }
}

impl<T: Transport> TaskFlow<T> {
    pub fn new(config: &Config, transport: T, store: Arc<dyn TokenStore>) -> Self {
        let session = Session::new(store);
        let client = TaskClient::new(&config.api_base_url);
        let api = Arc::new(Api::new(client, transport, session.clone()));
        let tasks = TaskSynchronizer::new(Arc::clone(&api));
        Self { session, api, tasks }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn tasks(&self) -> &TaskSynchronizer<T> {
        &self.tasks
    }

    pub fn api(&self) -> &Api<T> {
        &self.api
    }

    /// Restore the persisted session and load tasks if it holds a token.
    pub async fn start(&self) {
        self.session.restore();
        if self.session.is_authenticated() {
            if let Err(e) = self.tasks.refresh().await {
                warn!("initial task load failed: {e}");
            }
        }
    }

    /// Register an account, then sign in with the same credentials.
    pub async fn sign_up(&self, username: &str, password: &str) -> Result<(), AuthError> {
        self.api.register(username, password).await?;
        info!(username, "account registered");
        self.sign_in(username, password).await
    }

    /// Log in, persist the token through the session, then load tasks. A
    /// failed task load does not fail the sign-in.
    pub async fn sign_in(&self, username: &str, password: &str) -> Result<(), AuthError> {
        let response = self.api.login(username, password).await?;
        self.session.login(&response.token)?;
        if let Err(e) = self.tasks.refresh().await {
            warn!("task load after sign-in failed: {e}");
        }
        Ok(())
    }

    pub fn sign_out(&self) {
        self.session.logout();
        self.tasks.clear();
    }
}
