//! In-memory coordination store.
//!
//! Single-process implementation of [`CoordinationStore`] used by tests and
//! the demo binary. Nodes live in a `BTreeMap`, so child listings come back
//! in lexicographic order; sequence suffixes are zero-padded, which makes
//! that order equal to creation order. Watches are one-shot senders drained
//! on the matching mutation.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{RwLock, oneshot};

use crate::error::{CoordinationError, CoordinationResult};
use crate::store::{CoordinationStore, CreateMode, NodeEvent, NodeValue, NodeWatch};

/// Width of the zero-padded sequence suffix appended by sequential creates.
const SEQUENCE_WIDTH: usize = 10;

#[derive(Debug, Default)]
struct Node {
    data: Vec<u8>,
    version: u64,
    next_seq: u64,
}

#[derive(Debug, Default)]
struct Shared {
    nodes: BTreeMap<String, Node>,
    data_watches: HashMap<String, Vec<oneshot::Sender<NodeEvent>>>,
    child_watches: HashMap<String, Vec<oneshot::Sender<NodeEvent>>>,
}

impl Shared {
    fn fire_data(&mut self, path: &str, event: NodeEvent) {
        if let Some(senders) = self.data_watches.get_mut(path) {
            for tx in senders.drain(..) {
                // A send error means the watcher went away; nothing to do.
                let _ = tx.send(event.clone());
            }
        }
    }

    fn fire_children(&mut self, parent: &str) {
        if let Some(senders) = self.child_watches.get_mut(parent) {
            for tx in senders.drain(..) {
                let _ = tx.send(NodeEvent::ChildrenChanged(parent.to_string()));
            }
        }
    }
}

/// In-memory [`CoordinationStore`].
///
/// Cloning is cheap and clones share the same tree, so one instance can be
/// handed to every participant of a test or demo scenario.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    shared: Arc<RwLock<Shared>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Everything before the final `/`, or `None` for top-level paths.
fn parent_of(path: &str) -> Option<&str> {
    match path.rfind('/') {
        Some(0) | None => None,
        Some(idx) => Some(&path[..idx]),
    }
}

fn validate_path(path: &str) -> CoordinationResult<()> {
    if !path.starts_with('/') || path.len() < 2 || path.ends_with('/') || path.contains("//") {
        return Err(CoordinationError::Config(format!(
            "invalid node path: '{path}'"
        )));
    }
    Ok(())
}

#[async_trait]
impl CoordinationStore for MemoryStore {
    async fn create(
        &self,
        path: &str,
        data: &[u8],
        mode: CreateMode,
    ) -> CoordinationResult<String> {
        validate_path(path)?;
        let mut shared = self.shared.write().await;

        let assigned = match mode {
            CreateMode::Persistent => path.to_string(),
            CreateMode::PersistentSequential => {
                let parent = parent_of(path).ok_or_else(|| {
                    CoordinationError::Config(format!(
                        "sequential create requires a parented prefix: '{path}'"
                    ))
                })?;
                let parent_node = shared.nodes.get_mut(parent).ok_or_else(|| {
                    CoordinationError::NotFound(format!("parent node missing: '{parent}'"))
                })?;
                let seq = parent_node.next_seq;
                parent_node.next_seq += 1;
                let width = SEQUENCE_WIDTH;
                format!("{path}{seq:0width$}")
            }
        };

        if let Some(parent) = parent_of(&assigned) {
            if !shared.nodes.contains_key(parent) {
                return Err(CoordinationError::NotFound(format!(
                    "parent node missing: '{parent}'"
                )));
            }
        }
        if shared.nodes.contains_key(&assigned) {
            return Err(CoordinationError::AlreadyExists(assigned));
        }

        shared.nodes.insert(
            assigned.clone(),
            Node {
                data: data.to_vec(),
                version: 0,
                next_seq: 0,
            },
        );

        shared.fire_data(&assigned, NodeEvent::Created(assigned.clone()));
        if let Some(parent) = parent_of(&assigned) {
            let parent = parent.to_string();
            shared.fire_children(&parent);
        }
        Ok(assigned)
    }

    async fn read(&self, path: &str) -> CoordinationResult<NodeValue> {
        let shared = self.shared.read().await;
        let node = shared
            .nodes
            .get(path)
            .ok_or_else(|| CoordinationError::NotFound(path.to_string()))?;
        Ok(NodeValue {
            data: node.data.clone(),
            version: node.version,
        })
    }

    async fn write_if_version(
        &self,
        path: &str,
        data: &[u8],
        expected: u64,
    ) -> CoordinationResult<u64> {
        let mut shared = self.shared.write().await;
        let node = shared
            .nodes
            .get_mut(path)
            .ok_or_else(|| CoordinationError::NotFound(path.to_string()))?;
        if node.version != expected {
            return Err(CoordinationError::VersionConflict {
                expected,
                actual: node.version,
            });
        }
        node.data = data.to_vec();
        node.version += 1;
        let new_version = node.version;
        shared.fire_data(path, NodeEvent::DataChanged(path.to_string()));
        Ok(new_version)
    }

    async fn delete_if_version(&self, path: &str, expected: u64) -> CoordinationResult<()> {
        let mut shared = self.shared.write().await;
        let node = shared
            .nodes
            .get(path)
            .ok_or_else(|| CoordinationError::NotFound(path.to_string()))?;
        if node.version != expected {
            return Err(CoordinationError::VersionConflict {
                expected,
                actual: node.version,
            });
        }

        // The version guard applies to the target; descendants go with it.
        let prefix = format!("{path}/");
        let removed: Vec<String> = shared
            .nodes
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .map(|(k, _)| k.clone())
            .collect();
        for descendant in &removed {
            shared.nodes.remove(descendant);
            shared.fire_data(descendant, NodeEvent::Deleted(descendant.clone()));
        }
        shared.nodes.remove(path);
        shared.fire_data(path, NodeEvent::Deleted(path.to_string()));
        if let Some(parent) = parent_of(path) {
            let parent = parent.to_string();
            shared.fire_children(&parent);
        }
        Ok(())
    }

    async fn list_children(&self, path: &str) -> CoordinationResult<Vec<String>> {
        let shared = self.shared.read().await;
        if !shared.nodes.contains_key(path) {
            return Err(CoordinationError::NotFound(path.to_string()));
        }
        let prefix = format!("{path}/");
        let children = shared
            .nodes
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .filter_map(|(k, _)| {
                let rest = &k[prefix.len()..];
                if rest.contains('/') {
                    None
                } else {
                    Some(rest.to_string())
                }
            })
            .collect();
        Ok(children)
    }

    async fn exists(&self, path: &str) -> CoordinationResult<bool> {
        let shared = self.shared.read().await;
        Ok(shared.nodes.contains_key(path))
    }

    async fn watch(&self, path: &str) -> CoordinationResult<NodeWatch> {
        let mut shared = self.shared.write().await;
        let (tx, rx) = oneshot::channel();
        shared
            .data_watches
            .entry(path.to_string())
            .or_default()
            .push(tx);
        Ok(NodeWatch::new(rx))
    }

    async fn watch_children(&self, path: &str) -> CoordinationResult<NodeWatch> {
        let mut shared = self.shared.write().await;
        let (tx, rx) = oneshot::channel();
        shared
            .child_watches
            .entry(path.to_string())
            .or_default()
            .push(tx);
        Ok(NodeWatch::new(rx))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
