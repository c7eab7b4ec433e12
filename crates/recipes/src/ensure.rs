// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use keeper_core::path;
use keeper_core::{CoordinationClient, CreateMode, Result};

/// Create `target` and every missing ancestor as empty persistent nodes.
///
/// Nodes created concurrently by another session are left alone.
pub async fn ensure_path<C: CoordinationClient>(client: &C, target: &str) -> Result<()> {
    path::validate(target)?;
    if target == "/" {
        return Ok(());
    }
    for node in path::ancestors(target).into_iter().chain([target]) {
        if client.exists(node, None).await?.is_some() {
            continue;
        }
        match client.create(node, b"", CreateMode::Persistent).await {
            Ok(_) => tracing::debug!(path = node, "created"),
            Err(e) if e.is_node_exists() => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "ensure_tests.rs"]
mod tests;
