//! Client core for the TaskFlow task service.
//!
//! # Overview
//! Holds the session token, talks to the TaskFlow REST backend, and keeps a
//! cached task list that always equals the backend's last full answer.
//!
//! # Design
//! - `TaskClient` is stateless: `build_*` produces an `HttpRequest`,
//!   `parse_*` maps an `HttpResponse` to a typed result or `ApiError`.
//! - `Transport` executes requests; `ReqwestTransport` in production,
//!   scripted transports in tests.
//! - `Api` reads the token from the `Session` for every call and expires the
//!   session when the backend answers 401 to the token that is still current.
//! - `TaskSynchronizer` refetches after every mutation and publishes the list
//!   through a `watch` channel, guarded by refresh sequence numbers.
//! - `TaskFlow` wires these together for views.

pub mod api;
pub mod app;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod session;
pub mod sync;
pub mod transport;
pub mod types;
pub mod view;

pub use api::Api;
pub use app::TaskFlow;
pub use client::TaskClient;
pub use config::Config;
pub use error::{ApiError, AuthError, Operation, SessionError, StoreError, SyncError};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use session::{FileTokenStore, MemoryTokenStore, Session, SessionState, TokenStore};
pub use sync::{TaskListState, TaskSynchronizer};
pub use transport::{ReqwestTransport, Transport, TransportError};
pub use types::{Credentials, LoginResponse, NewTask, Task, TaskId, TaskPatch, TaskStatus};
pub use view::{filtered, stats, Filter, Stats};
