//! Observable UI surface: tab status classes and the shared overlay.
//!
//! Sessions never touch UI elements directly. Each state transition is
//! projected into a [`StatusView`] and applied to the [`UiModel`] under a
//! single lock, so no observer can see a tab class and the overlay
//! disagree about the same transition. The rendering layer owns the real
//! elements and reads this model by session id.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::session::SessionState;

/// Base class carried by every session tab element.
pub const TAB_BASE_CLASS: &str = "terminal-tab";
/// Class carried by the shared overlay element.
pub const OVERLAY_CLASS: &str = "terminal-overlay";

/// Pure projection of one session's state into its observable UI facts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusView {
    /// Tab shows the "reconnecting" class: the whole retry sequence,
    /// including retry dials, but never the initial connect.
    pub reconnecting: bool,
    /// Tab shows the "failed" class: retry budget exhausted.
    pub failed: bool,
    /// Session keeps the shared overlay visible.
    pub attention: bool,
}

impl StatusView {
    pub fn project(state: SessionState, attempt: u32) -> Self {
        let reconnecting = state == SessionState::Reconnecting
            || (state == SessionState::Connecting && attempt > 0);
        Self {
            reconnecting,
            failed: state == SessionState::Failed,
            attention: !matches!(state, SessionState::Connected | SessionState::Closed),
        }
    }

    /// Render the tab's full class list.
    pub fn tab_class(&self) -> String {
        let mut class = TAB_BASE_CLASS.to_string();
        if self.reconnecting {
            class.push_str(" reconnecting");
        }
        if self.failed {
            class.push_str(" failed");
        }
        class
    }
}

/// Injectable registry of per-session UI status.
///
/// One instance is shared by every session; there is no DOM-global state.
#[derive(Default)]
pub struct UiModel {
    tabs: Mutex<HashMap<String, StatusView>>,
}

impl UiModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a session's new status. Tab class and overlay visibility
    /// change together, under one lock.
    pub(crate) fn apply(&self, session_id: &str, view: StatusView) {
        let mut tabs = self.tabs.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        tabs.insert(session_id.to_string(), view);
    }

    /// Drop a disposed session's tab entry.
    pub(crate) fn remove(&self, session_id: &str) {
        let mut tabs = self.tabs.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        tabs.remove(session_id);
    }

    /// Current class list for a session's tab, if the tab exists.
    pub fn tab_class(&self, session_id: &str) -> Option<String> {
        let tabs = self.tabs.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        tabs.get(session_id).map(StatusView::tab_class)
    }

    /// The overlay is hidden exactly when no session requires attention.
    pub fn overlay_hidden(&self) -> bool {
        let tabs = self.tabs.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        !tabs.values().any(|view| view.attention)
    }

    /// Current class list of the shared overlay element.
    pub fn overlay_class(&self) -> String {
        if self.overlay_hidden() {
            format!("{OVERLAY_CLASS} hidden")
        } else {
            OVERLAY_CLASS.to_string()
        }
    }
}
