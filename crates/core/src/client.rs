// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Capability interface to the coordination service
//!
//! Recipes are generic over [`CoordinationClient`]. Adapters implement it for
//! concrete services and translate their failures into [`CoordError`].
//!
//! [`CoordError`]: crate::CoordError

use crate::error::Result;
use crate::event::WatcherRef;
use async_trait::async_trait;

/// How a node is created
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CreateMode {
    Persistent,
    Ephemeral,
    PersistentSequential,
    EphemeralSequential,
}

impl CreateMode {
    pub fn new(ephemeral: bool, sequential: bool) -> Self {
        match (ephemeral, sequential) {
            (false, false) => CreateMode::Persistent,
            (true, false) => CreateMode::Ephemeral,
            (false, true) => CreateMode::PersistentSequential,
            (true, true) => CreateMode::EphemeralSequential,
        }
    }

    pub fn is_ephemeral(self) -> bool {
        matches!(self, CreateMode::Ephemeral | CreateMode::EphemeralSequential)
    }

    pub fn is_sequential(self) -> bool {
        matches!(
            self,
            CreateMode::PersistentSequential | CreateMode::EphemeralSequential
        )
    }
}

/// Node metadata returned by reads
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Stat {
    /// Number of writes to the node's value
    pub version: u64,
    /// Owning session for ephemeral nodes
    pub ephemeral_owner: Option<u64>,
    pub num_children: usize,
    pub data_length: usize,
}

/// Operations the recipes need from a coordination service session.
///
/// Every read that takes a watcher arms a one-shot watch. The watcher is
/// notified at most once per arming, on the session's delivery stream.
#[async_trait]
pub trait CoordinationClient: Clone + Send + Sync + 'static {
    /// Create a node and return its actual path (suffixed when sequential)
    async fn create(&self, path: &str, value: &[u8], mode: CreateMode) -> Result<String>;

    async fn delete(&self, path: &str) -> Result<()>;

    /// Stat of the node or `None`. A watch is armed even when absent.
    async fn exists(&self, path: &str, watch: Option<WatcherRef>) -> Result<Option<Stat>>;

    async fn get(&self, path: &str, watch: Option<WatcherRef>) -> Result<(Vec<u8>, Stat)>;

    async fn get_children(&self, path: &str, watch: Option<WatcherRef>) -> Result<Vec<String>>;

    async fn set(&self, path: &str, value: &[u8]) -> Result<Stat>;

    /// Install the session's single global dispatcher for session events
    fn register_watcher(&self, watcher: WatcherRef);

    fn session_id(&self) -> u64;
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
