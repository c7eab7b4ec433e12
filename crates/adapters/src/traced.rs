// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced client wrapper for consistent observability

use async_trait::async_trait;
use keeper_core::{CoordError, CoordinationClient, CreateMode, Result, Stat, WatcherRef};
use std::time::Instant;
use tracing::Instrument;

/// Log the outcome of an operation. Misses the recipes expect and handle
/// (absent or already-present nodes) stay at debug level.
fn log_outcome<T>(result: &Result<T>, start: Instant) {
    let elapsed_ms = start.elapsed().as_millis() as u64;
    match result {
        Ok(_) => tracing::debug!(elapsed_ms, "ok"),
        Err(e @ (CoordError::NoNode(_) | CoordError::NodeExists(_))) => {
            tracing::debug!(elapsed_ms, error = %e, "miss")
        }
        Err(e @ CoordError::NotConnected) => {
            tracing::error!(elapsed_ms, error = %e, "failed")
        }
        Err(e) => tracing::warn!(elapsed_ms, error = %e, "failed"),
    }
}

/// Wrapper that adds tracing to any CoordinationClient
#[derive(Clone, Debug)]
pub struct TracedClient<C> {
    inner: C,
}

impl<C> TracedClient<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

#[async_trait]
impl<C: CoordinationClient> CoordinationClient for TracedClient<C> {
    async fn create(&self, path: &str, value: &[u8], mode: CreateMode) -> Result<String> {
        let span = tracing::info_span!("coord.create", path, ?mode);
        let start = Instant::now();
        let result = self.inner.create(path, value, mode).instrument(span.clone()).await;
        let _guard = span.enter();
        if let Ok(actual) = &result {
            tracing::debug!(actual = actual.as_str(), value_len = value.len(), "created");
        }
        log_outcome(&result, start);
        result
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let span = tracing::info_span!("coord.delete", path);
        let start = Instant::now();
        let result = self.inner.delete(path).instrument(span.clone()).await;
        let _guard = span.enter();
        if result.is_ok() {
            tracing::debug!("deleted");
        }
        log_outcome(&result, start);
        result
    }

    async fn exists(&self, path: &str, watch: Option<WatcherRef>) -> Result<Option<Stat>> {
        let span = tracing::info_span!("coord.exists", path, watched = watch.is_some());
        let start = Instant::now();
        let result = self.inner.exists(path, watch).instrument(span.clone()).await;
        let _guard = span.enter();
        tracing::trace!(present = ?result.as_ref().ok().map(Option::is_some), "checked");
        log_outcome(&result, start);
        result
    }

    async fn get(&self, path: &str, watch: Option<WatcherRef>) -> Result<(Vec<u8>, Stat)> {
        let span = tracing::info_span!("coord.get", path, watched = watch.is_some());
        let start = Instant::now();
        let result = self.inner.get(path, watch).instrument(span.clone()).await;
        let _guard = span.enter();
        tracing::trace!(len = result.as_ref().map(|(v, _)| v.len()).ok(), "read");
        log_outcome(&result, start);
        result
    }

    async fn get_children(&self, path: &str, watch: Option<WatcherRef>) -> Result<Vec<String>> {
        let span = tracing::info_span!("coord.get_children", path, watched = watch.is_some());
        let start = Instant::now();
        let result = self.inner.get_children(path, watch).instrument(span.clone()).await;
        let _guard = span.enter();
        tracing::trace!(count = result.as_ref().map(Vec::len).ok(), "listed");
        log_outcome(&result, start);
        result
    }

    async fn set(&self, path: &str, value: &[u8]) -> Result<Stat> {
        let span = tracing::info_span!("coord.set", path);
        let start = Instant::now();
        let result = self.inner.set(path, value).instrument(span.clone()).await;
        let _guard = span.enter();
        if let Ok(stat) = &result {
            tracing::debug!(version = stat.version, value_len = value.len(), "updated");
        }
        log_outcome(&result, start);
        result
    }

    fn register_watcher(&self, watcher: WatcherRef) {
        tracing::debug!(session_id = self.inner.session_id(), "global watcher installed");
        self.inner.register_watcher(watcher)
    }

    fn session_id(&self) -> u64 {
        self.inner.session_id()
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
