// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process coordination service
//!
//! [`MemoryEnsemble`] holds the shared node tree. Each [`MemoryClient`] is one
//! session on it, with its own ordered delivery task for watch notifications.
//! Ephemeral nodes live exactly as long as the session that created them.

mod tree;

use async_trait::async_trait;
use keeper_core::{
    same_watcher, CoordError, CoordinationClient, CreateMode, Result, SessionState, Stat,
    WatchedEvent, WatcherRef,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tree::{Fired, NodeTree, Registration};

/// Recorded client call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCall {
    Create { path: String, mode: CreateMode },
    Delete { path: String },
    Exists { path: String, watched: bool },
    Get { path: String, watched: bool },
    GetChildren { path: String, watched: bool },
    Set { path: String },
}

struct Delivery {
    watcher: WatcherRef,
    event: WatchedEvent,
}

struct Session {
    sender: mpsc::UnboundedSender<Delivery>,
    global: Option<WatcherRef>,
}

struct EnsembleState {
    tree: NodeTree,
    sessions: HashMap<u64, Session>,
    next_session: u64,
}

impl EnsembleState {
    fn deliver(&self, fired: Vec<Fired>) {
        for f in fired {
            if let Some(session) = self.sessions.get(&f.session) {
                let _ = session.sender.send(Delivery {
                    watcher: f.watcher,
                    event: WatchedEvent::new(f.kind, SessionState::Connected, f.path),
                });
            }
        }
    }

    fn end_session(&mut self, id: u64, state: SessionState) {
        let pending = self.tree.drop_watches_of(id);
        if state == SessionState::Expired {
            if let Some(session) = self.sessions.get(&id) {
                let mut targets: Vec<WatcherRef> = session.global.iter().cloned().collect();
                for watcher in pending {
                    if !targets.iter().any(|t| same_watcher(t, &watcher)) {
                        targets.push(watcher);
                    }
                }
                for watcher in targets {
                    let _ = session.sender.send(Delivery {
                        watcher,
                        event: WatchedEvent::session(state),
                    });
                }
            }
        }
        // Dropping the sender lets the delivery task drain and exit
        self.sessions.remove(&id);

        for node in self.tree.ephemerals_of(id) {
            match self.tree.delete(&node) {
                Ok(fired) => self.deliver(fired),
                Err(e) => tracing::warn!(node = %node, error = %e, "failed to remove ephemeral node"),
            }
        }
    }
}

/// A shared in-memory coordination service
#[derive(Clone)]
pub struct MemoryEnsemble {
    state: Arc<Mutex<EnsembleState>>,
}

impl MemoryEnsemble {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(EnsembleState {
                tree: NodeTree::new(),
                sessions: HashMap::new(),
                next_session: 1,
            })),
        }
    }

    /// Open a new session.
    ///
    /// Must be called from within a tokio runtime: the session's delivery
    /// task is spawned here.
    pub fn connect(&self) -> MemoryClient {
        let (tx, mut rx) = mpsc::unbounded_channel::<Delivery>();
        let session_id = {
            let mut state = self.lock();
            let id = state.next_session;
            state.next_session += 1;
            state.sessions.insert(
                id,
                Session {
                    sender: tx,
                    global: None,
                },
            );
            id
        };

        tokio::spawn(async move {
            while let Some(delivery) = rx.recv().await {
                delivery.watcher.process(delivery.event).await;
            }
            tracing::debug!(session_id, "delivery stream closed");
        });

        tracing::debug!(session_id, "session opened");
        MemoryClient {
            ensemble: self.clone(),
            session_id,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Child names of `path`, sorted, without arming anything
    pub fn children_of(&self, path: &str) -> Result<Vec<String>> {
        self.lock().tree.children(path, None)
    }

    /// Total number of nodes, including the root
    pub fn node_count(&self) -> usize {
        self.lock().tree.len()
    }

    /// Number of watches currently armed on `path` by any session
    pub fn pending_watches(&self, path: &str) -> usize {
        self.lock().tree.pending_watches(path)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, EnsembleState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MemoryEnsemble {
    fn default() -> Self {
        Self::new()
    }
}

/// One session on a [`MemoryEnsemble`]
#[derive(Clone)]
pub struct MemoryClient {
    ensemble: MemoryEnsemble,
    session_id: u64,
    calls: Arc<Mutex<Vec<ClientCall>>>,
}

impl MemoryClient {
    /// Get all recorded calls
    pub fn calls(&self) -> Vec<ClientCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    pub fn is_connected(&self) -> bool {
        self.ensemble
            .lock()
            .sessions
            .contains_key(&self.session_id)
    }

    /// End the session normally. Ephemeral nodes it owns are removed.
    pub fn close(&self) {
        let mut state = self.ensemble.lock();
        if state.sessions.contains_key(&self.session_id) {
            state.end_session(self.session_id, SessionState::Closed);
            tracing::debug!(session_id = self.session_id, "session closed");
        }
    }

    /// Simulate session expiry: watchers of this session receive a
    /// `Session` event with state `Expired`, then its ephemerals are removed.
    pub fn expire(&self) {
        let mut state = self.ensemble.lock();
        if state.sessions.contains_key(&self.session_id) {
            state.end_session(self.session_id, SessionState::Expired);
            tracing::info!(session_id = self.session_id, "session expired");
        }
    }

    fn record(&self, call: ClientCall) {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);
    }

    fn registration(&self, watch: Option<WatcherRef>) -> Option<Registration> {
        watch.map(|watcher| Registration {
            session: self.session_id,
            watcher,
        })
    }

    /// Run `f` against the ensemble if this session is still open
    fn with_state<T>(&self, f: impl FnOnce(&mut EnsembleState) -> Result<T>) -> Result<T> {
        let mut state = self.ensemble.lock();
        if !state.sessions.contains_key(&self.session_id) {
            return Err(CoordError::NotConnected);
        }
        f(&mut state)
    }
}

#[async_trait]
impl CoordinationClient for MemoryClient {
    async fn create(&self, path: &str, value: &[u8], mode: CreateMode) -> Result<String> {
        self.record(ClientCall::Create {
            path: path.to_string(),
            mode,
        });
        self.with_state(|state| {
            let (actual, fired) = state.tree.create(path, value, mode, self.session_id)?;
            state.deliver(fired);
            Ok(actual)
        })
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.record(ClientCall::Delete {
            path: path.to_string(),
        });
        self.with_state(|state| {
            let fired = state.tree.delete(path)?;
            state.deliver(fired);
            Ok(())
        })
    }

    async fn exists(&self, path: &str, watch: Option<WatcherRef>) -> Result<Option<Stat>> {
        self.record(ClientCall::Exists {
            path: path.to_string(),
            watched: watch.is_some(),
        });
        let reg = self.registration(watch);
        self.with_state(|state| state.tree.exists(path, reg))
    }

    async fn get(&self, path: &str, watch: Option<WatcherRef>) -> Result<(Vec<u8>, Stat)> {
        self.record(ClientCall::Get {
            path: path.to_string(),
            watched: watch.is_some(),
        });
        let reg = self.registration(watch);
        self.with_state(|state| state.tree.get(path, reg))
    }

    async fn get_children(&self, path: &str, watch: Option<WatcherRef>) -> Result<Vec<String>> {
        self.record(ClientCall::GetChildren {
            path: path.to_string(),
            watched: watch.is_some(),
        });
        let reg = self.registration(watch);
        self.with_state(|state| state.tree.children(path, reg))
    }

    async fn set(&self, path: &str, value: &[u8]) -> Result<Stat> {
        self.record(ClientCall::Set {
            path: path.to_string(),
        });
        self.with_state(|state| {
            let (stat, fired) = state.tree.set(path, value)?;
            state.deliver(fired);
            Ok(stat)
        })
    }

    fn register_watcher(&self, watcher: WatcherRef) {
        let mut state = self.ensemble.lock();
        if let Some(session) = state.sessions.get_mut(&self.session_id) {
            session.global = Some(watcher);
        }
    }

    fn session_id(&self) -> u64 {
        self.session_id
    }
}

impl std::fmt::Debug for MemoryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryClient")
            .field("session_id", &self.session_id)
            .finish()
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
