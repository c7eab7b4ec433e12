// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! keeper-core: shared vocabulary for coordination recipes
//!
//! This crate provides:
//! - The error taxonomy every client and recipe reports in
//! - Watch event kinds and the `Watcher` trait
//! - The `CoordinationClient` capability trait adapters implement
//! - Path helpers and recipe configuration

pub mod client;
pub mod config;
pub mod error;
pub mod event;
pub mod path;

pub use client::{CoordinationClient, CreateMode, Stat};
pub use config::{ConfigError, RecipeConfig};
pub use error::{CoordError, Result};
pub use event::{same_watcher, EventKind, SessionState, WatchedEvent, Watcher, WatcherRef};
