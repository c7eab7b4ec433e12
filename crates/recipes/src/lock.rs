// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fair distributed mutual exclusion
//!
//! Every acquire attempt creates an ephemeral sequential contender under the
//! lock path. The contender with the lowest sequence number holds the lock;
//! every other contender watches the one immediately ahead of it and re-reads
//! the children when that node goes away. Nothing is cached: each decision is
//! derived from a fresh read of the service.

use crate::ensure::ensure_path;
use async_trait::async_trait;
use keeper_core::path;
use keeper_core::{
    CoordError, CoordinationClient, CreateMode, EventKind, RecipeConfig, Result, SessionState,
    WatchedEvent, Watcher, WatcherRef,
};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

/// Where a contender stands among the current contenders
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Contention {
    /// First in sequence order
    Holder,
    /// Waiting behind these contenders, in sequence order
    Blocked { blockers: Vec<String> },
}

impl Contention {
    pub fn is_holder(&self) -> bool {
        matches!(self, Contention::Holder)
    }
}

/// Decide whether `own` holds the lock given contenders in sequence order
pub fn has_lock(own: &str, sorted: &[String]) -> Contention {
    if sorted.first().map(String::as_str) == Some(own) {
        return Contention::Holder;
    }
    let idx = sorted.iter().position(|k| k == own).unwrap_or(sorted.len());
    Contention::Blocked {
        blockers: sorted[..idx].to_vec(),
    }
}

struct Contender {
    path: String,
    name: String,
    /// Cleared once the contender is released or abandoned
    live: Arc<AtomicBool>,
}

impl Contender {
    fn retire(&self) {
        self.live.store(false, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct ContextState {
    contender: Option<Contender>,
    held: bool,
}

/// Per-caller lock ownership.
///
/// A single [`DistributedLock`] may be shared by many tasks; each task passes
/// its own context so contender paths and revocation flags never mix. Use one
/// context per (task, lock) pair.
#[derive(Default)]
pub struct LockContext {
    revoked: Arc<AtomicBool>,
    state: Mutex<ContextState>,
}

impl LockContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if the contender was deleted, marked with the unlock sentinel,
    /// or lost with its session since the last successful acquire
    pub fn revoked(&self) -> bool {
        self.revoked.load(Ordering::SeqCst)
    }

    /// Path of the contender node currently holding the lock
    pub fn held_node(&self) -> Option<String> {
        let state = self.lock_state();
        if !state.held {
            return None;
        }
        state.contender.as_ref().map(|c| c.path.clone())
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, ContextState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn clear_revoked(&self) {
        self.revoked.store(false, Ordering::SeqCst);
    }

    /// Install a fresh contender, retiring any previous one
    fn replace_contender(&self, contender: Contender) {
        let mut state = self.lock_state();
        if let Some(old) = state.contender.replace(contender) {
            old.retire();
        }
        state.held = false;
    }

    fn contender(&self) -> Option<(String, String)> {
        self.lock_state()
            .contender
            .as_ref()
            .map(|c| (c.path.clone(), c.name.clone()))
    }

    fn mark_held(&self) {
        self.lock_state().held = true;
    }

    /// Retire and return the contender path, held or not
    fn take_contender(&self) -> Option<String> {
        let mut state = self.lock_state();
        state.held = false;
        state.contender.take().map(|c| {
            c.retire();
            c.path
        })
    }
}

/// Deletes the context's contender when dropped before `defuse`.
///
/// Covers futures dropped mid-acquire or mid-`scoped`, where no async
/// cleanup can run. The delete is spawned onto the current runtime.
struct AbandonGuard<'a, C: CoordinationClient> {
    client: &'a C,
    ctx: &'a LockContext,
    armed: bool,
}

impl<'a, C: CoordinationClient> AbandonGuard<'a, C> {
    fn new(client: &'a C, ctx: &'a LockContext) -> Self {
        Self {
            client,
            ctx,
            armed: true,
        }
    }

    fn defuse(mut self) {
        self.armed = false;
    }
}

impl<C: CoordinationClient> Drop for AbandonGuard<'_, C> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let Some(node) = self.ctx.take_contender() else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(node = node.as_str(), "no runtime, contender left to session expiry");
            return;
        };
        tracing::debug!(node = node.as_str(), "lock attempt dropped, removing contender");
        let client = self.client.clone();
        runtime.spawn(async move {
            match client.delete(&node).await {
                Ok(()) => {}
                Err(e) if e.is_no_node() => {}
                Err(e) => tracing::warn!(node = node.as_str(), error = %e, "failed to remove contender"),
            }
        });
    }
}

/// Flips the context's revocation flag when its contender is deleted,
/// marked with the sentinel, or lost with the session
struct RevocationWatch<C> {
    client: C,
    revoked: Arc<AtomicBool>,
    live: Arc<AtomicBool>,
    sentinel: Vec<u8>,
    this: Weak<RevocationWatch<C>>,
}

impl<C: CoordinationClient> RevocationWatch<C> {
    fn new(client: C, revoked: Arc<AtomicBool>, live: Arc<AtomicBool>, sentinel: &[u8]) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            client,
            revoked,
            live,
            sentinel: sentinel.to_vec(),
            this: this.clone(),
        })
    }

    fn revoke(&self, path: &str, reason: &str) {
        tracing::info!(path, reason, "lock revoked");
        self.revoked.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl<C: CoordinationClient> Watcher for RevocationWatch<C> {
    async fn process(&self, event: WatchedEvent) {
        if !self.live.load(Ordering::SeqCst) {
            return;
        }
        match event.kind {
            EventKind::Deleted => self.revoke(&event.path, "contender deleted"),
            EventKind::Session if event.state == SessionState::Expired => {
                self.revoke(&event.path, "session expired")
            }
            EventKind::Changed => {
                let Some(this) = self.this.upgrade() else {
                    return;
                };
                let watcher: WatcherRef = this;
                match self.client.get(&event.path, Some(watcher)).await {
                    Ok((value, _)) if value == self.sentinel => {
                        self.revoke(&event.path, "unlock requested")
                    }
                    Ok(_) => {}
                    Err(e) if e.is_no_node() => self.revoke(&event.path, "contender deleted"),
                    Err(e) => tracing::warn!(path = event.path.as_str(), error = %e, "revocation re-read failed"),
                }
            }
            _ => {}
        }
    }
}

/// Wakes a waiting acquire when the blocker ahead of it changes
struct BlockerWatch {
    notify: Arc<Notify>,
}

#[async_trait]
impl Watcher for BlockerWatch {
    async fn process(&self, _event: WatchedEvent) {
        self.notify.notify_one();
    }
}

/// A named lock at `<root>/<name>`
#[derive(Clone, Debug)]
pub struct DistributedLock<C> {
    client: C,
    name: String,
    root: String,
    path: String,
    prefix: String,
    sentinel: Vec<u8>,
    default_timeout: Option<Duration>,
}

impl<C: CoordinationClient> DistributedLock<C> {
    /// Lock `name` under `root`, creating both paths if needed
    pub async fn new(client: C, name: &str, root: &str) -> Result<Self> {
        let config = RecipeConfig::default().with_lock_root(root);
        Self::with_config(client, name, &config).await
    }

    pub async fn with_config(client: C, name: &str, config: &RecipeConfig) -> Result<Self> {
        let root = config.lock_root.clone();
        let path = path::join(&root, name);
        ensure_path(&client, &root).await?;
        ensure_path(&client, &path).await?;
        Ok(Self {
            client,
            name: name.to_string(),
            root,
            path,
            prefix: config.lock_prefix.clone(),
            sentinel: config.unlock_sentinel.as_bytes().to_vec(),
            default_timeout: config.acquire_timeout,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Current contender names in sequence order
    pub async fn contenders(&self) -> Result<Vec<String>> {
        let mut kids = self.client.get_children(&self.path, None).await?;
        path::sort_by_sequence(&mut kids);
        Ok(kids)
    }

    /// Acquire with the configured default timeout
    pub async fn acquire_default(&self, ctx: &LockContext) -> Result<bool> {
        self.acquire(ctx, self.default_timeout).await
    }

    /// Wait for the lock, at most `timeout` if given.
    ///
    /// Returns `Ok(false)` on timeout, after removing this attempt's contender.
    pub async fn acquire(&self, ctx: &LockContext, timeout: Option<Duration>) -> Result<bool> {
        ctx.clear_revoked();
        let deadline = timeout.map(|t| Instant::now() + t);
        let start = Instant::now();

        let guard = AbandonGuard::new(&self.client, ctx);
        let outcome = match self.create_contender(ctx).await {
            Ok(()) => self.wait_for_turn(ctx, deadline).await,
            Err(e) => Err(e),
        };
        guard.defuse();

        match outcome {
            Ok(true) => {
                ctx.mark_held();
                tracing::info!(
                    lock = self.path.as_str(),
                    node = ctx.held_node().as_deref(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "lock acquired"
                );
                Ok(true)
            }
            Ok(false) => {
                tracing::info!(lock = self.path.as_str(), "acquire timed out");
                self.abandon(ctx).await;
                Ok(false)
            }
            Err(e) => {
                self.abandon(ctx).await;
                Err(e)
            }
        }
    }

    /// Release the held lock, or withdraw a contender still waiting.
    /// A no-op when the context has no contender.
    pub async fn release(&self, ctx: &LockContext) -> Result<()> {
        ctx.clear_revoked();
        let Some(node) = ctx.take_contender() else {
            return Ok(());
        };
        match self.client.delete(&node).await {
            Ok(()) => {
                tracing::info!(lock = self.path.as_str(), node = node.as_str(), "lock released");
                Ok(())
            }
            // Already gone with the session
            Err(e) if e.is_no_node() => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Run `f` while holding the lock, releasing on every exit path
    pub async fn scoped<F, Fut, T, E>(&self, ctx: &LockContext, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: From<CoordError>,
    {
        self.acquire(ctx, None).await?;
        let guard = AbandonGuard::new(&self.client, ctx);
        let outcome = f().await;
        guard.defuse();
        let released = self.release(ctx).await;
        let value = outcome?;
        released?;
        Ok(value)
    }

    /// Create a contender and arm its revocation watch
    async fn create_contender(&self, ctx: &LockContext) -> Result<()> {
        let node = self
            .client
            .create(
                &path::join(&self.path, &self.prefix),
                b"0",
                CreateMode::EphemeralSequential,
            )
            .await?;
        let live = Arc::new(AtomicBool::new(true));
        let watch: WatcherRef = RevocationWatch::new(
            self.client.clone(),
            Arc::clone(&ctx.revoked),
            Arc::clone(&live),
            &self.sentinel,
        );
        ctx.replace_contender(Contender {
            name: path::basename(&node).to_string(),
            path: node.clone(),
            live,
        });
        tracing::debug!(lock = self.path.as_str(), node = node.as_str(), "contender created");

        match self.client.get(&node, Some(watch)).await {
            Ok((value, _)) if value == self.sentinel => {
                ctx.revoked.store(true, Ordering::SeqCst);
                Ok(())
            }
            Ok(_) => Ok(()),
            // Vanished already; the wait loop recreates it
            Err(e) if e.is_no_node() => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn wait_for_turn(&self, ctx: &LockContext, deadline: Option<Instant>) -> Result<bool> {
        let notify = Arc::new(Notify::new());
        let blocker_watch: WatcherRef = Arc::new(BlockerWatch {
            notify: Arc::clone(&notify),
        });

        loop {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Ok(false);
            }

            let Some((_, own)) = ctx.contender() else {
                self.create_contender(ctx).await?;
                continue;
            };
            let kids = self.contenders().await?;
            if !kids.contains(&own) {
                tracing::debug!(lock = self.path.as_str(), contender = own.as_str(), "contender missing, recreating");
                // The vanished node was only a queue position, not a held lock
                self.create_contender(ctx).await?;
                ctx.clear_revoked();
                continue;
            }

            let blockers = match has_lock(&own, &kids) {
                Contention::Holder => return Ok(true),
                Contention::Blocked { blockers } => blockers,
            };
            let Some(last) = blockers.last() else {
                continue;
            };
            let blocker = path::join(&self.path, last);
            if self
                .client
                .exists(&blocker, Some(Arc::clone(&blocker_watch)))
                .await?
                .is_none()
            {
                continue;
            }
            tracing::debug!(lock = self.path.as_str(), contender = own.as_str(), blocker = blocker.as_str(), "waiting");

            match deadline {
                Some(d) => {
                    let _ = tokio::time::timeout_at(d, notify.notified()).await;
                }
                None => notify.notified().await,
            }
        }
    }

    /// Best-effort removal of this attempt's contender
    async fn abandon(&self, ctx: &LockContext) {
        let Some(node) = ctx.take_contender() else {
            return;
        };
        match self.client.delete(&node).await {
            Ok(()) => {}
            Err(e) if e.is_no_node() => {}
            Err(e) => tracing::warn!(node = node.as_str(), error = %e, "failed to remove contender"),
        }
    }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
