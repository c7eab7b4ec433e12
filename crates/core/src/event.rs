// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Watch events delivered by the coordination service

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Kind of a fired watch
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    Created,
    Deleted,
    Changed,
    Child,
    Session,
    NotWatching,
}

impl EventKind {
    pub const ALL: [EventKind; 6] = [
        EventKind::Created,
        EventKind::Deleted,
        EventKind::Changed,
        EventKind::Child,
        EventKind::Session,
        EventKind::NotWatching,
    ];

    /// Session-scoped kinds are not tied to a node path
    pub fn is_session_scoped(self) -> bool {
        matches!(self, EventKind::Session | EventKind::NotWatching)
    }

    pub fn name(self) -> &'static str {
        match self {
            EventKind::Created => "created",
            EventKind::Deleted => "deleted",
            EventKind::Changed => "changed",
            EventKind::Child => "child",
            EventKind::Session => "session",
            EventKind::NotWatching => "not-watching",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// State of the session at the time an event was delivered
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SessionState {
    Connecting,
    Connected,
    Expired,
    Closed,
}

/// A single notification from the service
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WatchedEvent {
    pub kind: EventKind,
    pub state: SessionState,
    /// Node path, empty for session-scoped events
    pub path: String,
}

impl WatchedEvent {
    pub fn new(kind: EventKind, state: SessionState, path: impl Into<String>) -> Self {
        Self {
            kind,
            state,
            path: path.into(),
        }
    }

    pub fn session(state: SessionState) -> Self {
        Self::new(EventKind::Session, state, "")
    }
}

/// Receiver of one-shot watch notifications.
///
/// The service calls `process` on its delivery stream, one event at a time,
/// so implementations must not wait on another notification for the same
/// session from inside `process`.
#[async_trait]
pub trait Watcher: Send + Sync + 'static {
    async fn process(&self, event: WatchedEvent);
}

/// Shared handle to a watcher, compared by pointer identity
pub type WatcherRef = Arc<dyn Watcher>;

/// True when both handles point at the same watcher object
pub fn same_watcher(a: &WatcherRef, b: &WatcherRef) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
