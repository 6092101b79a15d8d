//! Coordination store abstraction.
//!
//! The auction protocol runs against a shared hierarchical store of named
//! nodes: atomic create (plain or sequential), version-conditioned write and
//! delete, child listing, and one-shot change watches. The trait below is the
//! only surface the protocol code touches; backends adapt a concrete
//! coordination service to it. [`memory::MemoryStore`] is the in-tree
//! implementation used by tests and the demo binary.

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::error::{CoordinationError, CoordinationResult};

pub mod memory;

/// Node creation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateMode {
    /// Create exactly the given path; fails with `AlreadyExists` if present.
    Persistent,
    /// Treat the given path as a prefix and append a zero-padded per-parent
    /// counter. The assigned suffix is unique and strictly increasing among
    /// siblings, which is what gives queue submissions their FIFO order.
    PersistentSequential,
}

/// A node's payload together with the version that guards conditional writes.
///
/// Versions start at 0 on create and increase by exactly 1 per successful
/// conditional write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeValue {
    pub data: Vec<u8>,
    pub version: u64,
}

/// Change event delivered by a fired watch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeEvent {
    /// The watched path came into existence.
    Created(String),
    /// The watched node's data changed.
    DataChanged(String),
    /// The watched node was deleted.
    Deleted(String),
    /// A child was created or deleted under the watched path.
    ChildrenChanged(String),
}

impl NodeEvent {
    /// Path the event refers to.
    pub fn path(&self) -> &str {
        match self {
            NodeEvent::Created(p)
            | NodeEvent::DataChanged(p)
            | NodeEvent::Deleted(p)
            | NodeEvent::ChildrenChanged(p) => p,
        }
    }
}

/// A one-shot watch registration.
///
/// The store delivers at most one event per registration; after a fire the
/// watch is spent and the holder must re-arm by registering a new one. This
/// mirrors the watch contract of the underlying coordination service and is
/// enforced by construction: the receiver is consumed by [`fired`].
///
/// [`fired`]: NodeWatch::fired
#[derive(Debug)]
pub struct NodeWatch {
    rx: oneshot::Receiver<NodeEvent>,
}

impl NodeWatch {
    /// Wrap a one-shot receiver. Backends call this when registering a watch.
    pub fn new(rx: oneshot::Receiver<NodeEvent>) -> Self {
        Self { rx }
    }

    /// Wait for the watch to fire.
    ///
    /// Resolves to `StoreUnavailable` if the store side is dropped before
    /// delivering an event (session loss); armed watches do not survive that.
    pub async fn fired(self) -> CoordinationResult<NodeEvent> {
        self.rx.await.map_err(|_| {
            CoordinationError::StoreUnavailable("watch dropped before delivery".into())
        })
    }
}

/// Hierarchical coordination store surface.
///
/// All paths are absolute, `/`-separated, and rooted at the store's own root;
/// parents must exist before children are created. Implementations must make
/// `write_if_version`/`delete_if_version` linearizable: of N concurrent calls
/// against the same version, exactly one succeeds.
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    /// Create a node and return its assigned path (equal to `path` for
    /// [`CreateMode::Persistent`], `path` plus the sequence suffix for
    /// [`CreateMode::PersistentSequential`]).
    async fn create(&self, path: &str, data: &[u8], mode: CreateMode)
    -> CoordinationResult<String>;

    /// Read a node's data and current version.
    async fn read(&self, path: &str) -> CoordinationResult<NodeValue>;

    /// Replace a node's data only if its version still equals `expected`;
    /// returns the new version. A mismatch is `VersionConflict` and performs
    /// no write.
    async fn write_if_version(
        &self,
        path: &str,
        data: &[u8],
        expected: u64,
    ) -> CoordinationResult<u64>;

    /// Delete a node only if its version still equals `expected`.
    async fn delete_if_version(&self, path: &str, expected: u64) -> CoordinationResult<()>;

    /// List child names (not full paths) under `path`, in ascending
    /// lexicographic order. Sequence suffixes are zero-padded, so this is
    /// also creation order.
    async fn list_children(&self, path: &str) -> CoordinationResult<Vec<String>>;

    /// Whether a node exists at `path`.
    async fn exists(&self, path: &str) -> CoordinationResult<bool>;

    /// Register a one-shot watch on `path`, firing on its next create,
    /// data change, or delete. The path need not exist yet.
    async fn watch(&self, path: &str) -> CoordinationResult<NodeWatch>;

    /// Register a one-shot watch firing on the next child create or delete
    /// under `path`.
    async fn watch_children(&self, path: &str) -> CoordinationResult<NodeWatch>;
}
