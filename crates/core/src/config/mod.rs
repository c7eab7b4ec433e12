// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recipe configuration
//!
//! Loaded from TOML. Every key is optional:
//!
//! ```toml
//! lock_root = "/zooplocks"
//! lock_prefix = "lock-"
//! queue_prefix = "q-"
//! unlock_sentinel = "unlock"
//! acquire_timeout = "5s"
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Errors from loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Names and defaults shared by the lock and queue recipes
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecipeConfig {
    /// Root under which named locks live
    pub lock_root: String,
    /// Name prefix of lock contender nodes
    pub lock_prefix: String,
    /// Name prefix of queue item nodes
    pub queue_prefix: String,
    /// Contender value that asks the holder to release
    pub unlock_sentinel: String,
    /// Default timeout for `acquire_default`, `None` waits forever
    #[serde(with = "humantime_serde")]
    pub acquire_timeout: Option<Duration>,
}

impl Default for RecipeConfig {
    fn default() -> Self {
        Self {
            lock_root: "/zooplocks".to_string(),
            lock_prefix: "lock-".to_string(),
            queue_prefix: "q-".to_string(),
            unlock_sentinel: "unlock".to_string(),
            acquire_timeout: None,
        }
    }
}

impl RecipeConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn with_lock_root(mut self, root: impl Into<String>) -> Self {
        self.lock_root = root.into();
        self
    }

    pub fn with_lock_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.lock_prefix = prefix.into();
        self
    }

    pub fn with_queue_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.queue_prefix = prefix.into();
        self
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = Some(timeout);
        self
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
