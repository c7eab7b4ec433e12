// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy shared by every coordination client and recipe
//!
//! Adapters translate service-specific failures into [`CoordError`] at the
//! client boundary. Recipe code only ever matches on these variants.

use thiserror::Error;

/// Errors surfaced by coordination clients and the recipes built on them
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordError {
    #[error("node already exists: {0}")]
    NodeExists(String),
    #[error("no node: {0}")]
    NoNode(String),
    #[error("node has children: {0}")]
    NotEmpty(String),
    #[error("no event kinds given to subscribe")]
    NoEvent,
    #[error("no items in {0}")]
    Empty(String),
    #[error("not connected to the coordination service")]
    NotConnected,
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("watch callback failed: {0}")]
    Callback(String),
}

impl CoordError {
    pub fn is_no_node(&self) -> bool {
        matches!(self, CoordError::NoNode(_))
    }

    pub fn is_node_exists(&self) -> bool {
        matches!(self, CoordError::NodeExists(_))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CoordError::Empty(_))
    }
}

pub type Result<T> = std::result::Result<T, CoordError>;
