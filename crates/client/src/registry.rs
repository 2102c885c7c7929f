//! Process-wide table of live sessions.
//!
//! The registry is an explicitly constructed object, injected wherever it
//! is needed. Its snapshot is the sanctioned diagnostics surface; nothing
//! else couples through it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::config::Config;
use crate::session::{self, SessionHandle, SessionId, SessionState};
use crate::socket::Connector;
use crate::ui::UiModel;

/// Diagnostic record for one session.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SessionDiag {
    pub id: String,
    pub state: SessionState,
    pub attempt: u32,
    pub generation: u64,
    pub queued_input: usize,
}

/// Mapping of session id to its running session.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<SessionId, SessionHandle>>,
    config: Config,
    connector: Arc<dyn Connector>,
    ui: Arc<UiModel>,
}

impl SessionRegistry {
    pub fn new(config: Config, connector: Arc<dyn Connector>, ui: Arc<UiModel>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            config,
            connector,
            ui,
        }
    }

    /// The UI model sessions project their status into.
    pub fn ui(&self) -> Arc<UiModel> {
        self.ui.clone()
    }

    /// Open a session with a fresh id.
    pub fn open(&self, url: &str) -> SessionHandle {
        self.open_with_id(session::generate_session_id(), url)
    }

    /// Open a session with a caller-chosen id. Idempotent: re-requesting a
    /// live id re-attaches to the existing session instead of creating a
    /// duplicate.
    pub fn open_with_id(&self, id: impl Into<SessionId>, url: &str) -> SessionHandle {
        let id = id.into();
        let mut sessions = self.lock();

        if let Some(existing) = sessions.get(&id) {
            tracing::info!(session_id = %id, "re-attaching to existing session");
            return existing.clone();
        }

        let handle = session::spawn(
            id.clone(),
            url.to_string(),
            &self.config,
            self.connector.clone(),
            self.ui.clone(),
        );
        sessions.insert(id, handle.clone());
        handle
    }

    pub fn get(&self, id: &str) -> Option<SessionHandle> {
        self.lock().get(id).cloned()
    }

    pub fn session_count(&self) -> usize {
        self.lock().len()
    }

    /// Remove a session. Cancels any pending reconnect timer and discards
    /// in-flight socket callbacks, so nothing mutates a disposed session.
    pub fn dispose(&self, id: &str) -> bool {
        let removed = self.lock().remove(id);
        match removed {
            Some(handle) => {
                handle.dispose();
                true
            }
            None => false,
        }
    }

    /// Diagnostic snapshot of every registered session.
    pub fn snapshot(&self) -> Vec<SessionDiag> {
        let mut diags: Vec<SessionDiag> = self
            .lock()
            .iter()
            .map(|(id, handle)| {
                let status = handle.status();
                SessionDiag {
                    id: id.clone(),
                    state: status.state,
                    attempt: status.attempt,
                    generation: status.generation,
                    queued_input: status.queued_input,
                }
            })
            .collect();
        diags.sort_by(|a, b| a.id.cmp(&b.id));
        diags
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<SessionId, SessionHandle>> {
        self.sessions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
