// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! FIFO queue of persistent sequential items
//!
//! Items are named `<prefix><seq>` under the queue path. Order is the
//! service-assigned sequence order; consumers race on `get`, and the one
//! whose delete succeeds owns the item.

use crate::ensure::ensure_path;
use crate::lock::{DistributedLock, LockContext};
use crate::watch::{callback, WatchRegistry};
use keeper_core::path;
use keeper_core::{CoordError, CoordinationClient, CreateMode, EventKind, RecipeConfig, Result};
use std::sync::Arc;

/// A queue at a fixed path
pub struct DistributedQueue<C> {
    client: C,
    registry: Arc<WatchRegistry<C>>,
    path: String,
    prefix: String,
    config: RecipeConfig,
}

impl<C: Clone> Clone for DistributedQueue<C> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            registry: Arc::clone(&self.registry),
            path: self.path.clone(),
            prefix: self.prefix.clone(),
            config: self.config.clone(),
        }
    }
}

impl<C: CoordinationClient> DistributedQueue<C> {
    /// Queue at `path`, creating it and its ancestors if needed
    pub async fn new(client: C, registry: Arc<WatchRegistry<C>>, path: &str) -> Result<Self> {
        Self::with_config(client, registry, path, RecipeConfig::default()).await
    }

    pub async fn with_config(
        client: C,
        registry: Arc<WatchRegistry<C>>,
        path: &str,
        config: RecipeConfig,
    ) -> Result<Self> {
        ensure_path(&client, path).await?;
        Ok(Self {
            client,
            registry,
            path: path.to_string(),
            prefix: config.queue_prefix.clone(),
            config,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Enqueue `value`, returning the created item path
    pub async fn put(&self, value: impl AsRef<[u8]>) -> Result<String> {
        let item = self
            .client
            .create(
                &path::join(&self.path, &self.prefix),
                value.as_ref(),
                CreateMode::PersistentSequential,
            )
            .await?;
        tracing::debug!(queue = self.path.as_str(), item = item.as_str(), "put");
        Ok(item)
    }

    /// Item names in queue order. [`CoordError::Empty`] when there are none.
    pub async fn sorted(&self) -> Result<Vec<String>> {
        let items = self.client.get_children(&self.path, None).await?;
        sort_items(items).ok_or_else(|| CoordError::Empty(self.path.clone()))
    }

    /// Dequeue the head item.
    ///
    /// An item that disappears between listing and taking was claimed by
    /// another consumer; the next one is tried. Fails with
    /// [`CoordError::Empty`] only once nothing is left.
    pub async fn get(&self) -> Result<Vec<u8>> {
        take_head(&self.client, &self.path).await
    }

    /// Number of items currently queued
    pub async fn qsize(&self) -> Result<usize> {
        Ok(self.client.get_children(&self.path, None).await?.len())
    }

    pub async fn empty(&self) -> Result<bool> {
        Ok(self.qsize().await? == 0)
    }

    /// Delete every item present at the time of the call
    pub async fn flush(&self) -> Result<()> {
        let items = self.client.get_children(&self.path, None).await?;
        let count = items.len();
        for name in items {
            match self.client.delete(&path::join(&self.path, &name)).await {
                Ok(()) => {}
                Err(e) if e.is_no_node() => {}
                Err(e) => return Err(e),
            }
        }
        tracing::info!(queue = self.path.as_str(), count, "flushed");
        Ok(())
    }

    /// Call `f` with the sorted item names whenever the set of items changes.
    ///
    /// Changes that leave the queue empty are not reported.
    pub async fn watch<F>(&self, f: F) -> Result<()>
    where
        F: Fn(Vec<String>) + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        let client = self.client.clone();
        let cb = callback(move |path, _kind| {
            let client = client.clone();
            let f = Arc::clone(&f);
            async move {
                let items = client.get_children(&path, None).await?;
                if let Some(sorted) = sort_items(items) {
                    f(sorted);
                }
                Ok(())
            }
        });
        self.registry.spyon(&self.path, cb, &[EventKind::Child]).await
    }

    /// Take one item and call `f` with its payload on each change of the
    /// item set. Notifications that find the queue empty are skipped.
    pub async fn watchitem<F>(&self, f: F) -> Result<()>
    where
        F: Fn(Vec<u8>) + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        let client = self.client.clone();
        let cb = callback(move |path, _kind| {
            let client = client.clone();
            let f = Arc::clone(&f);
            async move {
                match take_head(&client, &path).await {
                    Ok(value) => f(value),
                    Err(e) if e.is_empty() => {}
                    Err(e) => return Err(e),
                }
                Ok(())
            }
        });
        self.registry.spyon(&self.path, cb, &[EventKind::Child]).await
    }

    /// Lock serializing consumers, at `<parent>/<basename>-lock`
    pub async fn guard_lock(&self) -> Result<DistributedLock<C>> {
        let parent = path::parent(&self.path).unwrap_or("/");
        let name = format!("{}-lock", path::basename(&self.path));
        let config = self.config.clone().with_lock_root(parent);
        DistributedLock::with_config(self.client.clone(), &name, &config).await
    }

    /// Dequeue while holding the guard lock
    pub async fn get_guarded(&self, ctx: &LockContext) -> Result<Vec<u8>> {
        let lock = self.guard_lock().await?;
        lock.scoped(ctx, || self.get()).await
    }
}

async fn take_head<C: CoordinationClient>(client: &C, queue: &str) -> Result<Vec<u8>> {
    loop {
        let items = client.get_children(queue, None).await?;
        let sorted = sort_items(items).ok_or_else(|| CoordError::Empty(queue.to_string()))?;
        for name in sorted {
            let item = path::join(queue, &name);
            let value = match client.get(&item, None).await {
                Ok((value, _)) => value,
                Err(e) if e.is_no_node() => continue,
                Err(e) => return Err(e),
            };
            match client.delete(&item).await {
                Ok(()) => {
                    tracing::debug!(queue, item = item.as_str(), "took");
                    return Ok(value);
                }
                Err(e) if e.is_no_node() => {
                    tracing::debug!(item = item.as_str(), "lost race for item");
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Lexicographic item order, `None` for an empty queue
fn sort_items(mut items: Vec<String>) -> Option<Vec<String>> {
    if items.is_empty() {
        return None;
    }
    items.sort();
    Some(items)
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
