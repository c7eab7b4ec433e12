// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Helpers for '/'-delimited node paths

use crate::error::{CoordError, Result};

/// Check that `path` is absolute, has no empty segments and no trailing '/'
pub fn validate(path: &str) -> Result<()> {
    if path == "/" {
        return Ok(());
    }
    if !path.starts_with('/') || path.ends_with('/') || path[1..].split('/').any(str::is_empty) {
        return Err(CoordError::InvalidPath(path.to_string()));
    }
    Ok(())
}

/// Join a parent path and a child name
pub fn join(parent: &str, child: &str) -> String {
    let parent = parent.trim_end_matches('/');
    let child = child.trim_start_matches('/');
    format!("{}/{}", parent, child)
}

/// Parent of `path`, `None` for the root
pub fn parent(path: &str) -> Option<&str> {
    if path == "/" {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some("/"),
        Some(idx) => Some(&path[..idx]),
        None => None,
    }
}

/// Last segment of `path`
pub fn basename(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Every proper ancestor of `path` from the top down, excluding the root
pub fn ancestors(path: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut current = parent(path);
    while let Some(p) = current {
        if p == "/" {
            break;
        }
        out.push(p);
        current = parent(p);
    }
    out.reverse();
    out
}

/// Service-assigned sequence suffix of a node name (text after the last '-')
pub fn sequence_suffix(name: &str) -> &str {
    match name.rfind('-') {
        Some(idx) => &name[idx + 1..],
        None => name,
    }
}

/// Sort node names by their sequence suffix.
///
/// Suffixes are fixed-width, so this is creation order among siblings
/// regardless of the prefix each name carries.
pub fn sort_by_sequence(names: &mut [String]) {
    names.sort_by(|a, b| sequence_suffix(a).cmp(sequence_suffix(b)));
}

#[cfg(test)]
#[path = "path_tests.rs"]
mod tests;
