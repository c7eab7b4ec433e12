// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Node store and one-shot watch tables of the in-memory service

use keeper_core::path;
use keeper_core::{
    same_watcher, CoordError, CreateMode, EventKind, Result, Stat, WatcherRef,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// A watcher armed by a session
#[derive(Clone)]
pub(crate) struct Registration {
    pub session: u64,
    pub watcher: WatcherRef,
}

/// A notification produced by a mutation, not yet delivered
pub(crate) struct Fired {
    pub session: u64,
    pub watcher: WatcherRef,
    pub kind: EventKind,
    pub path: String,
}

#[derive(Debug)]
struct Node {
    data: Vec<u8>,
    version: u64,
    ephemeral_owner: Option<u64>,
    children: BTreeSet<String>,
    next_sequence: u64,
}

impl Node {
    fn new(data: Vec<u8>, ephemeral_owner: Option<u64>) -> Self {
        Self {
            data,
            version: 0,
            ephemeral_owner,
            children: BTreeSet::new(),
            next_sequence: 0,
        }
    }

    fn stat(&self) -> Stat {
        Stat {
            version: self.version,
            ephemeral_owner: self.ephemeral_owner,
            num_children: self.children.len(),
            data_length: self.data.len(),
        }
    }
}

type WatchMap = HashMap<String, Vec<Registration>>;

fn arm(map: &mut WatchMap, path: &str, reg: Registration) {
    let list = map.entry(path.to_string()).or_default();
    let duplicate = list
        .iter()
        .any(|r| r.session == reg.session && same_watcher(&r.watcher, &reg.watcher));
    if !duplicate {
        list.push(reg);
    }
}

/// Drain registrations into fired events, notifying each watcher object once
fn trigger(out: &mut Vec<Fired>, regs: Vec<Registration>, kind: EventKind, path: &str) {
    for reg in regs {
        let seen = out.iter().any(|f| {
            f.session == reg.session && f.path == path && same_watcher(&f.watcher, &reg.watcher)
        });
        if !seen {
            out.push(Fired {
                session: reg.session,
                watcher: reg.watcher,
                kind,
                path: path.to_string(),
            });
        }
    }
}

/// Hierarchical store with per-parent sequence counters
pub(crate) struct NodeTree {
    nodes: BTreeMap<String, Node>,
    data_watches: WatchMap,
    exist_watches: WatchMap,
    child_watches: WatchMap,
}

impl NodeTree {
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert("/".to_string(), Node::new(Vec::new(), None));
        Self {
            nodes,
            data_watches: HashMap::new(),
            exist_watches: HashMap::new(),
            child_watches: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn create(
        &mut self,
        requested: &str,
        value: &[u8],
        mode: CreateMode,
        session: u64,
    ) -> Result<(String, Vec<Fired>)> {
        path::validate(requested)?;
        let parent_path = path::parent(requested)
            .ok_or_else(|| CoordError::NodeExists(requested.to_string()))?
            .to_string();

        let parent = self
            .nodes
            .get_mut(&parent_path)
            .ok_or_else(|| CoordError::NoNode(parent_path.clone()))?;
        if parent.ephemeral_owner.is_some() {
            return Err(CoordError::InvalidPath(requested.to_string()));
        }

        let actual = if mode.is_sequential() {
            let seq = parent.next_sequence;
            parent.next_sequence += 1;
            format!("{}{:010}", requested, seq)
        } else {
            requested.to_string()
        };
        if self.nodes.contains_key(&actual) {
            return Err(CoordError::NodeExists(actual));
        }

        let name = path::basename(&actual).to_string();
        if let Some(parent) = self.nodes.get_mut(&parent_path) {
            parent.children.insert(name);
        }
        let owner = mode.is_ephemeral().then_some(session);
        self.nodes
            .insert(actual.clone(), Node::new(value.to_vec(), owner));

        let mut fired = Vec::new();
        let regs = self.exist_watches.remove(&actual).unwrap_or_default();
        trigger(&mut fired, regs, EventKind::Created, &actual);
        let regs = self.child_watches.remove(&parent_path).unwrap_or_default();
        trigger(&mut fired, regs, EventKind::Child, &parent_path);

        Ok((actual, fired))
    }

    pub fn delete(&mut self, target: &str) -> Result<Vec<Fired>> {
        path::validate(target)?;
        let node = self
            .nodes
            .get(target)
            .ok_or_else(|| CoordError::NoNode(target.to_string()))?;
        if !node.children.is_empty() || target == "/" {
            return Err(CoordError::NotEmpty(target.to_string()));
        }
        self.nodes.remove(target);

        let parent_path = path::parent(target).unwrap_or("/").to_string();
        if let Some(parent) = self.nodes.get_mut(&parent_path) {
            parent.children.remove(path::basename(target));
        }

        let mut fired = Vec::new();
        let mut regs = self.data_watches.remove(target).unwrap_or_default();
        regs.extend(self.exist_watches.remove(target).unwrap_or_default());
        regs.extend(self.child_watches.remove(target).unwrap_or_default());
        trigger(&mut fired, regs, EventKind::Deleted, target);
        let regs = self.child_watches.remove(&parent_path).unwrap_or_default();
        trigger(&mut fired, regs, EventKind::Child, &parent_path);

        Ok(fired)
    }

    pub fn set(&mut self, target: &str, value: &[u8]) -> Result<(Stat, Vec<Fired>)> {
        path::validate(target)?;
        let node = self
            .nodes
            .get_mut(target)
            .ok_or_else(|| CoordError::NoNode(target.to_string()))?;
        node.data = value.to_vec();
        node.version += 1;
        let stat = node.stat();

        let mut fired = Vec::new();
        let mut regs = self.data_watches.remove(target).unwrap_or_default();
        regs.extend(self.exist_watches.remove(target).unwrap_or_default());
        trigger(&mut fired, regs, EventKind::Changed, target);

        Ok((stat, fired))
    }

    pub fn exists(&mut self, target: &str, watch: Option<Registration>) -> Result<Option<Stat>> {
        path::validate(target)?;
        let stat = self.nodes.get(target).map(Node::stat);
        if let Some(reg) = watch {
            match stat {
                Some(_) => arm(&mut self.data_watches, target, reg),
                None => arm(&mut self.exist_watches, target, reg),
            }
        }
        Ok(stat)
    }

    pub fn get(&mut self, target: &str, watch: Option<Registration>) -> Result<(Vec<u8>, Stat)> {
        path::validate(target)?;
        let node = self
            .nodes
            .get(target)
            .ok_or_else(|| CoordError::NoNode(target.to_string()))?;
        let result = (node.data.clone(), node.stat());
        if let Some(reg) = watch {
            arm(&mut self.data_watches, target, reg);
        }
        Ok(result)
    }

    pub fn children(&mut self, target: &str, watch: Option<Registration>) -> Result<Vec<String>> {
        path::validate(target)?;
        let node = self
            .nodes
            .get(target)
            .ok_or_else(|| CoordError::NoNode(target.to_string()))?;
        let children = node.children.iter().cloned().collect();
        if let Some(reg) = watch {
            arm(&mut self.child_watches, target, reg);
        }
        Ok(children)
    }

    /// Paths of every ephemeral node owned by `session`
    pub fn ephemerals_of(&self, session: u64) -> Vec<String> {
        self.nodes
            .iter()
            .filter(|(_, n)| n.ephemeral_owner == Some(session))
            .map(|(p, _)| p.clone())
            .collect()
    }

    /// Remove every pending watch of `session`, returning distinct watchers
    pub fn drop_watches_of(&mut self, session: u64) -> Vec<WatcherRef> {
        let mut dropped: Vec<WatcherRef> = Vec::new();
        for map in [
            &mut self.data_watches,
            &mut self.exist_watches,
            &mut self.child_watches,
        ] {
            for regs in map.values_mut() {
                regs.retain(|r| {
                    if r.session != session {
                        return true;
                    }
                    if !dropped.iter().any(|w| same_watcher(w, &r.watcher)) {
                        dropped.push(r.watcher.clone());
                    }
                    false
                });
            }
            map.retain(|_, regs| !regs.is_empty());
        }
        dropped
    }

    /// Number of watches armed on `target` across all watch types
    pub fn pending_watches(&self, target: &str) -> usize {
        [&self.data_watches, &self.exist_watches, &self.child_watches]
            .iter()
            .map(|m| m.get(target).map_or(0, Vec::len))
            .sum()
    }
}

#[cfg(test)]
#[path = "tree_tests.rs"]
mod tests;
