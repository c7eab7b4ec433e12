// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! keeper-recipes: coordination recipes over a [`CoordinationClient`]
//!
//! - [`WatchRegistry`] turns one-shot watches into durable subscriptions
//! - [`DistributedLock`] is a fair lock with revocation
//! - [`DistributedQueue`] is a FIFO queue with change notification
//!
//! [`CoordinationClient`]: keeper_core::CoordinationClient

mod ensure;
pub mod lock;
pub mod queue;
pub mod watch;

pub use ensure::ensure_path;
pub use lock::{has_lock, Contention, DistributedLock, LockContext};
pub use queue::DistributedQueue;
pub use watch::{callback, rearm_read, CallbackRef, RearmRead, WatchCallback, WatchRegistry, WatchState, REARM_TABLE};
