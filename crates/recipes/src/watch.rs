// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Watch registry: durable, multi-subscriber notification
//!
//! The coordination service only offers one-shot watches. The registry keeps
//! an ordered callback list per (path, event kind) and re-arms the matching
//! read every time a watch fires, so subscribers keep receiving events.
//!
//! Each (path, kind) slot moves through `Armed -> Fired -> Rearmed -> Armed`.
//! A re-arm read that fails leaves the slot `Disarmed`.

use async_trait::async_trait;
use keeper_core::{
    CoordError, CoordinationClient, EventKind, Result, WatchedEvent, Watcher, WatcherRef,
};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, RwLock, Weak};

/// A subscriber invoked with `(path, kind)` each time a watch fires.
///
/// An error aborts delivery to the remaining callbacks of that event.
#[async_trait]
pub trait WatchCallback: Send + Sync + 'static {
    async fn on_event(&self, path: &str, kind: EventKind) -> Result<()>;
}

pub type CallbackRef = Arc<dyn WatchCallback>;

struct FnCallback<F>(F);

#[async_trait]
impl<F, Fut> WatchCallback for FnCallback<F>
where
    F: Fn(String, EventKind) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    async fn on_event(&self, path: &str, kind: EventKind) -> Result<()> {
        (self.0)(path.to_string(), kind).await
    }
}

/// Wrap an async closure as a [`WatchCallback`]
pub fn callback<F, Fut>(f: F) -> CallbackRef
where
    F: Fn(String, EventKind) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(FnCallback(f))
}

/// Read operation that arms a one-shot watch
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RearmRead {
    GetChildren,
    GetData,
    Exists,
}

/// Fixed mapping from path-scoped event kind to the read that re-arms it
pub const REARM_TABLE: [(EventKind, RearmRead); 4] = [
    (EventKind::Child, RearmRead::GetChildren),
    (EventKind::Changed, RearmRead::GetData),
    (EventKind::Deleted, RearmRead::GetData),
    (EventKind::Created, RearmRead::Exists),
];

/// Re-arming read for `kind`, `None` for session-scoped kinds
pub fn rearm_read(kind: EventKind) -> Option<RearmRead> {
    REARM_TABLE
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, read)| *read)
}

/// Arming state of one (path, kind) slot
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WatchState {
    /// One notification is pending at the service
    Armed,
    /// The pending notification was delivered
    Fired,
    /// The re-arming read has been issued
    Rearmed,
    /// No notification is pending (arming read failed)
    Disarmed,
}

impl WatchState {
    fn fire(self) -> Self {
        WatchState::Fired
    }

    fn rearm(self) -> Self {
        match self {
            WatchState::Fired | WatchState::Disarmed => WatchState::Rearmed,
            other => other,
        }
    }

    fn settle(self, armed: bool) -> Self {
        if armed {
            WatchState::Armed
        } else {
            WatchState::Disarmed
        }
    }
}

struct Slot {
    state: WatchState,
    callbacks: Vec<CallbackRef>,
}

type SlotKey = (String, EventKind);

/// Multiplexes (path, kind) subscriptions onto one-shot watches
pub struct WatchRegistry<C> {
    client: RwLock<Option<C>>,
    slots: Mutex<HashMap<SlotKey, Slot>>,
    this: Weak<WatchRegistry<C>>,
}

impl<C: CoordinationClient> WatchRegistry<C> {
    /// Registry without a session; call [`set_client`](Self::set_client) before use
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            client: RwLock::new(None),
            slots: Mutex::new(HashMap::new()),
            this: this.clone(),
        })
    }

    pub fn with_client(client: C) -> Arc<Self> {
        let registry = Self::new();
        registry.set_client(client);
        registry
    }

    /// Associate the registry with the active session
    pub fn set_client(&self, client: C) {
        *self.client.write().unwrap_or_else(|e| e.into_inner()) = Some(client);
    }

    /// Make the registry the session's global watch callback
    pub fn install_as_global_dispatcher(&self) -> Result<()> {
        let client = self.client()?;
        client.register_watcher(self.as_watcher()?);
        Ok(())
    }

    /// Append `callback` to each (path, kind) list and arm its first notification.
    ///
    /// Fails with [`CoordError::NoEvent`] when `kinds` is empty.
    pub async fn spyon(&self, path: &str, callback: CallbackRef, kinds: &[EventKind]) -> Result<()> {
        if kinds.is_empty() {
            return Err(CoordError::NoEvent);
        }
        let client = self.client()?;
        let watcher = self.as_watcher()?;

        for &kind in kinds {
            {
                let mut slots = self.lock_slots();
                slots
                    .entry((path.to_string(), kind))
                    .or_insert_with(|| Slot {
                        state: WatchState::Disarmed,
                        callbacks: Vec::new(),
                    })
                    .callbacks
                    .push(Arc::clone(&callback));
            }
            tracing::debug!(path, %kind, "spying");

            let Some(read) = rearm_read(kind) else {
                tracing::warn!(path, %kind, "session-scoped kind is never dispatched to callbacks");
                continue;
            };
            self.transition(path, kind, WatchState::rearm);
            let armed = issue(&client, path, read, Arc::clone(&watcher)).await;
            self.transition(path, kind, |s| s.settle(armed.is_ok()));
            armed?;
        }
        Ok(())
    }

    /// Handle one fired watch: re-arm, then run the callbacks in order
    pub async fn dispatch(&self, event: WatchedEvent) -> Result<()> {
        let WatchedEvent { kind, state, path } = event;
        if kind.is_session_scoped() {
            tracing::trace!(%kind, ?state, "ignoring session event");
            return Ok(());
        }
        tracing::debug!(path = path.as_str(), %kind, "watch fired");
        self.transition(&path, kind, WatchState::fire);

        if let Some(read) = rearm_read(kind) {
            // TODO: skip the re-arm once a (path, kind) slot has no callbacks
            let client = self.client()?;
            let watcher = self.as_watcher()?;
            self.transition(&path, kind, WatchState::rearm);
            let armed = issue(&client, &path, read, watcher).await;
            self.transition(&path, kind, |s| s.settle(armed.is_ok()));
            match armed {
                Ok(()) => {}
                Err(e) if e.is_no_node() => {
                    tracing::debug!(path = path.as_str(), %kind, "node gone, watch not re-armed")
                }
                Err(e) => tracing::warn!(path = path.as_str(), %kind, error = %e, "re-arm failed"),
            }
        }

        let callbacks = {
            let slots = self.lock_slots();
            slots
                .get(&(path.clone(), kind))
                .map(|slot| slot.callbacks.clone())
                .unwrap_or_default()
        };
        for cb in callbacks {
            cb.on_event(&path, kind).await?;
        }
        Ok(())
    }

    /// Current arming state of a slot, `None` if nothing subscribed
    pub fn state(&self, path: &str, kind: EventKind) -> Option<WatchState> {
        self.lock_slots()
            .get(&(path.to_string(), kind))
            .map(|slot| slot.state)
    }

    pub fn callback_count(&self, path: &str, kind: EventKind) -> usize {
        self.lock_slots()
            .get(&(path.to_string(), kind))
            .map_or(0, |slot| slot.callbacks.len())
    }

    fn client(&self) -> Result<C> {
        self.client
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or(CoordError::NotConnected)
    }

    fn as_watcher(&self) -> Result<WatcherRef> {
        let this: WatcherRef = self.this.upgrade().ok_or(CoordError::NotConnected)?;
        Ok(this)
    }

    fn lock_slots(&self) -> std::sync::MutexGuard<'_, HashMap<SlotKey, Slot>> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn transition(&self, path: &str, kind: EventKind, f: impl FnOnce(WatchState) -> WatchState) {
        if let Some(slot) = self.lock_slots().get_mut(&(path.to_string(), kind)) {
            slot.state = f(slot.state);
        }
    }
}

async fn issue<C: CoordinationClient>(
    client: &C,
    path: &str,
    read: RearmRead,
    watcher: WatcherRef,
) -> Result<()> {
    match read {
        RearmRead::GetChildren => client.get_children(path, Some(watcher)).await.map(drop),
        RearmRead::GetData => client.get(path, Some(watcher)).await.map(drop),
        RearmRead::Exists => client.exists(path, Some(watcher)).await.map(drop),
    }
}

#[async_trait]
impl<C: CoordinationClient> Watcher for WatchRegistry<C> {
    async fn process(&self, event: WatchedEvent) {
        let path = event.path.clone();
        let kind = event.kind;
        if let Err(e) = self.dispatch(event).await {
            tracing::warn!(path = path.as_str(), %kind, error = %e, "watch delivery aborted");
        }
    }
}

#[cfg(test)]
#[path = "watch_tests.rs"]
mod tests;
