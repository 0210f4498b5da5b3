//! Session store: the single bearer token and its durable copy.
//!
//! # Design
//! The token lives in a `watch` channel so views can subscribe to session
//! transitions. Durable storage sits behind the `TokenStore` port; the
//! session is the only component that writes to it.
//!
//! ```text
//! Unknown --restore--> Anonymous | Authenticated
//! Anonymous --login--> Authenticated
//! Authenticated --logout | expire--> Anonymous
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{SessionError, StoreError};

/// Key under which the token is persisted.
pub const TOKEN_KEY: &str = "token";

/// Key-value persistence port for the session token.
pub trait TokenStore: Send + Sync {
    fn get(&self) -> Result<Option<String>, StoreError>;
    fn set(&self, token: &str) -> Result<(), StoreError>;
    fn clear(&self) -> Result<(), StoreError>;
}

/// Process-local token storage.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self) -> Result<Option<String>, StoreError> {
        Ok(self.token.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn set(&self, token: &str) -> Result<(), StoreError> {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

/// Token persisted as a one-key JSON object (`{"token": "..."}`) on disk.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self) -> Result<Option<String>, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut entries: BTreeMap<String, String> = serde_json::from_str(&raw)?;
        Ok(entries.remove(TOKEN_KEY))
    }

    fn set(&self, token: &str) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let entries = BTreeMap::from([(TOKEN_KEY, token)]);
        fs::write(&self.path, serde_json::to_string(&entries)?)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// Published session state.
#[derive(Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Persisted storage has not been read yet.
    #[default]
    Unknown,
    Anonymous,
    Authenticated { token: String },
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated { .. })
    }

    pub fn token(&self) -> Option<&str> {
        match self {
            SessionState::Authenticated { token } => Some(token),
            _ => None,
        }
    }
}

impl fmt::Debug for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Unknown => f.write_str("Unknown"),
            SessionState::Anonymous => f.write_str("Anonymous"),
            SessionState::Authenticated { .. } => f.write_str("Authenticated { token: <redacted> }"),
        }
    }
}

/// Shared handle to the session. Clones observe the same state.
#[derive(Clone)]
pub struct Session {
    store: Arc<dyn TokenStore>,
    state: Arc<watch::Sender<SessionState>>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session").field("state", &*self.state.borrow()).finish()
    }
}

impl Session {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        let (state, _) = watch::channel(SessionState::Unknown);
        Self {
            store,
            state: Arc::new(state),
        }
    }

    /// Load the persisted token. Runs once; later calls are no-ops. The token
    /// is not validated here: the first authenticated call does that.
    pub fn restore(&self) {
        if *self.state.borrow() != SessionState::Unknown {
            return;
        }
        let restored = match self.store.get() {
            Ok(Some(token)) if !token.trim().is_empty() => SessionState::Authenticated { token },
            Ok(_) => SessionState::Anonymous,
            Err(e) => {
                warn!("could not read persisted session, starting anonymous: {e}");
                SessionState::Anonymous
            }
        };
        info!(authenticated = restored.is_authenticated(), "session restored");
        self.state.send_if_modified(|state| {
            if *state == SessionState::Unknown {
                *state = restored;
                true
            } else {
                false
            }
        });
    }

    /// Persist `token` and become authenticated.
    pub fn login(&self, token: &str) -> Result<(), SessionError> {
        if token.trim().is_empty() {
            return Err(SessionError::EmptyToken);
        }
        self.store.set(token)?;
        self.state.send_replace(SessionState::Authenticated {
            token: token.to_string(),
        });
        info!("session authenticated");
        Ok(())
    }

    /// Drop the token from memory and storage. Idempotent.
    pub fn logout(&self) {
        if let Err(e) = self.store.clear() {
            warn!("could not clear persisted session: {e}");
        }
        let changed = self.state.send_if_modified(|state| {
            if *state == SessionState::Anonymous {
                false
            } else {
                *state = SessionState::Anonymous;
                true
            }
        });
        if changed {
            info!("session cleared");
        }
    }

    /// Forced logout after the backend rejected the token.
    pub fn expire(&self) {
        if self.is_authenticated() {
            warn!("backend rejected the session token, logging out");
        }
        self.logout();
    }

    /// Forced logout for a rejection of `token`. A token that has already
    /// been replaced or dropped leaves the current session alone; returns
    /// whether the session was expired.
    pub fn expire_if(&self, token: &str) -> bool {
        let current = self.state.borrow().token() == Some(token);
        if !current {
            debug!("ignoring rejection of a token that is no longer current");
            return false;
        }
        self.expire();
        true
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    pub fn token(&self) -> Option<String> {
        self.state.borrow().token().map(str::to_string)
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_with(store: MemoryTokenStore) -> (Session, Arc<MemoryTokenStore>) {
        let store = Arc::new(store);
        (Session::new(store.clone()), store)
    }

    #[test]
    fn starts_unknown_until_restored() {
        let (session, _) = session_with(MemoryTokenStore::new());
        assert_eq!(session.state(), SessionState::Unknown);
        assert!(!session.is_authenticated());
        session.restore();
        assert_eq!(session.state(), SessionState::Anonymous);
    }

    #[test]
    fn restore_loads_persisted_token() {
        let (session, _) = session_with(MemoryTokenStore::with_token("persisted"));
        session.restore();
        assert!(session.is_authenticated());
        assert_eq!(session.token().as_deref(), Some("persisted"));
    }

    #[test]
    fn restore_is_one_shot() {
        let (session, store) = session_with(MemoryTokenStore::new());
        session.restore();
        store.set("late").unwrap();
        session.restore();
        assert!(!session.is_authenticated());
    }

    #[test]
    fn blank_persisted_token_restores_anonymous() {
        let (session, _) = session_with(MemoryTokenStore::with_token("   "));
        session.restore();
        assert_eq!(session.state(), SessionState::Anonymous);
    }

    #[test]
    fn login_persists_and_authenticates() {
        let (session, store) = session_with(MemoryTokenStore::new());
        session.restore();
        session.login("tok-1").unwrap();
        assert!(session.is_authenticated());
        assert_eq!(store.get().unwrap().as_deref(), Some("tok-1"));
    }

    #[test]
    fn login_rejects_empty_token() {
        let (session, store) = session_with(MemoryTokenStore::new());
        let err = session.login("  ").unwrap_err();
        assert!(matches!(err, SessionError::EmptyToken));
        assert!(store.get().unwrap().is_none());
        assert!(!session.is_authenticated());
    }

    #[test]
    fn logout_clears_memory_and_storage() {
        let (session, store) = session_with(MemoryTokenStore::new());
        session.login("tok").unwrap();
        session.logout();
        assert!(!session.is_authenticated());
        assert!(session.token().is_none());
        assert!(store.get().unwrap().is_none());
    }

    #[test]
    fn logout_when_anonymous_does_not_notify() {
        let (session, _) = session_with(MemoryTokenStore::new());
        session.restore();
        let mut rx = session.subscribe();
        rx.mark_unchanged();
        session.logout();
        session.logout();
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn subscribers_see_expiry() {
        let (session, _) = session_with(MemoryTokenStore::new());
        session.login("tok").unwrap();
        let mut rx = session.subscribe();
        rx.mark_unchanged();
        session.expire();
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), SessionState::Anonymous);
    }

    #[test]
    fn rejection_of_replaced_token_keeps_session() {
        let (session, store) = session_with(MemoryTokenStore::new());
        session.login("old").unwrap();
        session.login("new").unwrap();

        assert!(!session.expire_if("old"));
        assert_eq!(session.token().as_deref(), Some("new"));
        assert_eq!(store.get().unwrap().as_deref(), Some("new"));

        assert!(session.expire_if("new"));
        assert!(!session.is_authenticated());
        assert!(store.get().unwrap().is_none());
    }

    #[test]
    fn debug_output_redacts_token() {
        let state = SessionState::Authenticated {
            token: "very-secret".to_string(),
        };
        assert!(!format!("{state:?}").contains("very-secret"));
    }

    #[test]
    fn file_store_round_trips_under_fixed_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("nested").join("session.json"));
        assert!(store.get().unwrap().is_none());

        store.set("abc").unwrap();
        assert_eq!(store.get().unwrap().as_deref(), Some("abc"));
        let raw = fs::read_to_string(store.path()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json, serde_json::json!({ "token": "abc" }));

        store.clear().unwrap();
        assert!(store.get().unwrap().is_none());
        store.clear().unwrap();
    }

    #[test]
    fn corrupt_file_restores_anonymous() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "not json").unwrap();
        let session = Session::new(Arc::new(FileTokenStore::new(path)));
        session.restore();
        assert_eq!(session.state(), SessionState::Anonymous);
    }
}
