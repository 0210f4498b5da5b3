//! Task synchronizer: keeps the cached task list equal to the backend's.
//!
//! # Design
//! Every mutation is followed by a full refetch; the cached list is never
//! patched locally, so backend-derived fields (`is_finished`, `finished_at`,
//! `is_expired`) always come from the server. A failed refetch does not undo
//! the mutation's result; it is reported through `last_error`.
//!
//! Refreshes may overlap. Each one takes a sequence number when it starts and
//! its result is applied only if no newer refresh has been applied already,
//! so a slow early response cannot overwrite fresher data.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, warn};

use crate::api::Api;
use crate::error::{ApiError, SyncError};
use crate::transport::Transport;
use crate::types::{NewTask, Task, TaskId, TaskPatch, TaskStatus};
use crate::view::{self, Filter, Stats};

/// Published task-list state.
#[derive(Debug, Clone, Default)]
pub struct TaskListState {
    /// Full, unfiltered list from the last applied refresh, in backend order.
    pub tasks: Arc<Vec<Task>>,
    /// True once a refresh has been applied since start or the last clear.
    pub loaded: bool,
    /// Refreshes currently waiting on the backend.
    pub in_flight: usize,
    /// Most recent reported failure; reset by the next applied refresh.
    pub last_error: Option<String>,
    applied: u64,
}

impl TaskListState {
    pub fn is_loading(&self) -> bool {
        self.in_flight > 0
    }

    pub fn filtered(&self, filter: Filter) -> Vec<&Task> {
        view::filtered(&self.tasks, filter)
    }

    pub fn stats(&self) -> Stats {
        view::stats(&self.tasks)
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }
}

pub struct TaskSynchronizer<T> {
    api: Arc<Api<T>>,
    state: Arc<watch::Sender<TaskListState>>,
    issued: Arc<AtomicU64>,
}

impl<T> Clone for TaskSynchronizer<T> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            state: Arc::clone(&self.state),
            issued: Arc::clone(&self.issued),
        }
    }
}

impl<T: Transport> TaskSynchronizer<T> {
    pub fn new(api: Arc<Api<T>>) -> Self {
        let (state, _) = watch::channel(TaskListState::default());
        Self {
            api,
            state: Arc::new(state),
            issued: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn snapshot(&self) -> TaskListState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<TaskListState> {
        self.state.subscribe()
    }

    /// Replace the cached list with a fresh backend read.
    pub async fn refresh(&self) -> Result<(), SyncError> {
        let seq = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.send_modify(|state| state.in_flight += 1);

        let result = self.api.list_tasks().await;

        let mut stale = false;
        let outcome = match result {
            Ok(tasks) => {
                let count = tasks.len();
                self.state.send_modify(|state| {
                    state.in_flight = state.in_flight.saturating_sub(1);
                    if seq <= state.applied {
                        stale = true;
                        return;
                    }
                    state.applied = seq;
                    state.tasks = Arc::new(tasks);
                    state.loaded = true;
                    state.last_error = None;
                });
                if !stale {
                    debug!(seq, count, "task list refreshed");
                }
                Ok(())
            }
            Err(ApiError::Unauthorized) => {
                // A 401 for a replaced token leaves the session in place; then
                // only a response newer than the applied list may clear it.
                let expired = !self.api.session().is_authenticated();
                self.state.send_modify(|state| {
                    state.in_flight = state.in_flight.saturating_sub(1);
                    if !expired && seq <= state.applied {
                        stale = true;
                        return;
                    }
                    state.applied = state.applied.max(seq);
                    state.tasks = Arc::default();
                    state.loaded = false;
                    state.last_error = Some(ApiError::Unauthorized.to_string());
                });
                Err(ApiError::Unauthorized.into())
            }
            Err(e) => {
                warn!(seq, "task list refresh failed: {e}");
                let message = e.to_string();
                self.state.send_modify(|state| {
                    state.in_flight = state.in_flight.saturating_sub(1);
                    state.last_error = Some(message);
                });
                Err(e.into())
            }
        };
        if stale {
            debug!(seq, "discarding stale task list response");
        }
        outcome
    }

    /// Create a task, then refresh. Blank titles never reach the backend.
    pub async fn add(&self, input: NewTask) -> Result<TaskId, SyncError> {
        let title = input.title.trim();
        if title.is_empty() {
            return Err(SyncError::EmptyTitle);
        }
        let input = NewTask {
            title: title.to_string(),
            description: input
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            deadline: input.deadline,
        };

        let id = match self.api.create_task(&input).await {
            Ok(id) => id,
            Err(e) => {
                error!("creating task failed: {e}");
                return Err(self.record(e));
            }
        };
        self.refetch("create", id).await?;
        Ok(id)
    }

    /// Apply a partial update, then refresh.
    pub async fn update(&self, id: TaskId, patch: &TaskPatch) -> Result<(), SyncError> {
        if let Err(e) = self.api.update_task(id, patch).await {
            error!(task = %id, "updating task failed: {e}");
            return Err(self.record(e));
        }
        self.refetch("update", id).await
    }

    pub async fn set_status(&self, id: TaskId, status: TaskStatus) -> Result<(), SyncError> {
        self.update(id, &TaskPatch::status(status)).await
    }

    /// Advance a cached task to its successor in the status cycle.
    pub async fn cycle(&self, id: TaskId) -> Result<TaskStatus, SyncError> {
        let current = self
            .state
            .borrow()
            .get(id)
            .map(|task| task.status)
            .ok_or(SyncError::UnknownTask(id))?;
        let next = current.next();
        self.set_status(id, next).await?;
        Ok(next)
    }

    /// Delete a task, then refresh. A failed delete leaves the list as it was.
    pub async fn remove(&self, id: TaskId) -> Result<(), SyncError> {
        if let Err(e) = self.api.delete_task(id).await {
            error!(task = %id, "deleting task failed: {e}");
            return Err(self.record(e));
        }
        self.refetch("delete", id).await
    }

    /// Forget the cached list. Responses to refreshes already in flight are
    /// discarded.
    pub fn clear(&self) {
        let issued = self.issued.load(Ordering::SeqCst);
        self.state.send_modify(|state| {
            state.applied = state.applied.max(issued);
            state.tasks = Arc::default();
            state.loaded = false;
            state.last_error = None;
        });
    }

    /// Refresh after a mutation the backend accepted. The mutation stands
    /// even when the refetch fails: that failure is left in `last_error`, and
    /// only a rejected session is passed back to the caller.
    async fn refetch(&self, action: &str, id: TaskId) -> Result<(), SyncError> {
        match self.refresh().await {
            Err(SyncError::Api(ApiError::Unauthorized)) => Err(ApiError::Unauthorized.into()),
            Err(e) => {
                warn!(task = %id, "{action} succeeded but the task list is stale: {e}");
                Ok(())
            }
            Ok(()) => Ok(()),
        }
    }

    fn record(&self, e: ApiError) -> SyncError {
        if e.is_unauthorized() && !self.api.session().is_authenticated() {
            self.clear();
        }
        let message = e.to_string();
        self.state.send_modify(|state| state.last_error = Some(message));
        e.into()
    }
}
