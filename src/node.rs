//! Node records and the triplet-keyed node cache.
//!
//! Every file system object the multiplexer has resolved is represented by
//! at most one [`Node`] record, keyed by its [`Triplet`]. Reference counts
//! are explicit: descriptors, mount edges and transient path walks each
//! hold one [`NodeRef`], and the record is dropped from the cache when the
//! last reference goes away.

use std::collections::HashMap;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::RwLock;

use crate::proto::NodeType;

/// Opaque handle of a registered back-end.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct FsHandle(pub u32);

/// The three-part name identifying one file system object across all
/// back-ends.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Triplet {
    pub fs_handle: FsHandle,
    pub service_id: u64,
    pub index: u64,
}

/// Transient result of one path resolution, consumed by cache lookups.
#[derive(Debug, Copy, Clone)]
pub struct LookupResult {
    pub triplet: Triplet,
    pub size: u64,
    pub kind: NodeType,
}

/// One cached file system object.
pub struct Node {
    pub triplet: Triplet,
    pub kind: NodeType,
    size: AtomicU64,
    /// Serializes data access against size-changing writes and truncation.
    pub contents: RwLock<()>,
    /// Root of the file system mounted over this node, if any.
    mount: Mutex<Option<NodeRef>>,
    /// Mount point this node is mounted over, if this is a mounted root.
    /// The two edges of a mount are always set and cleared together.
    covered: Mutex<Option<NodeRef>>,
}

impl Node {
    fn new(result: &LookupResult) -> Node {
        Node {
            triplet: result.triplet,
            kind: result.kind,
            size: AtomicU64::new(result.size),
            contents: RwLock::new(()),
            mount: Mutex::new(None),
            covered: Mutex::new(None),
        }
    }

    /// Cached size of the object.
    pub fn size(&self) -> u64 {
        self.size.load(Ordering::Acquire)
    }

    /// Updates the cached size. Callers hold the content write lock.
    pub fn set_size(&self, size: u64) {
        self.size.store(size, Ordering::Release);
    }

    /// Reference to the mounted root, if a file system is mounted here.
    pub fn mount_root(&self) -> Option<NodeRef> {
        self.mount.lock().unwrap().clone()
    }

    /// Binds `root` as the file system mounted over this node.
    pub fn set_mount(&self, root: NodeRef) {
        *self.mount.lock().unwrap() = Some(root);
    }

    /// Unbinds and returns the mounted root.
    pub fn take_mount(&self) -> Option<NodeRef> {
        self.mount.lock().unwrap().take()
    }

    /// Triplet of the mounted root without touching reference counts.
    pub fn mount_triplet(&self) -> Option<Triplet> {
        self.mount.lock().unwrap().as_ref().map(|root| root.triplet)
    }

    /// Reference to the mount point this root covers, if any.
    pub fn covered_node(&self) -> Option<NodeRef> {
        self.covered.lock().unwrap().clone()
    }

    /// Binds the mount point underneath this mounted root.
    pub fn set_covered(&self, mount_point: NodeRef) {
        *self.covered.lock().unwrap() = Some(mount_point);
    }

    /// Unbinds and returns the covered mount point.
    pub fn take_covered(&self) -> Option<NodeRef> {
        self.covered.lock().unwrap().take()
    }

    /// Transient lookup view of this node.
    pub fn lookup_result(&self) -> LookupResult {
        LookupResult { triplet: self.triplet, size: self.size(), kind: self.kind }
    }
}

struct Slot {
    node: Arc<Node>,
    refs: usize,
}

/// The set of live node records.
pub struct NodeCache {
    inner: Mutex<HashMap<Triplet, Slot>>,
}

impl NodeCache {
    pub fn new() -> Arc<NodeCache> {
        Arc::new(NodeCache { inner: Mutex::new(HashMap::new()) })
    }

    /// Returns the cached node for the triplet, creating the record from
    /// the lookup result if absent. The returned reference counts.
    pub fn get(self: &Arc<NodeCache>, result: &LookupResult) -> NodeRef {
        let mut inner = self.inner.lock().unwrap();
        let slot = inner
            .entry(result.triplet)
            .or_insert_with(|| Slot { node: Arc::new(Node::new(result)), refs: 0 });
        slot.refs += 1;
        NodeRef { node: Some(Arc::clone(&slot.node)), cache: Arc::downgrade(self) }
    }

    /// Returns the cached node without taking a reference; `None` if the
    /// triplet is not resident.
    pub fn peek(&self, triplet: &Triplet) -> Option<Arc<Node>> {
        self.inner.lock().unwrap().get(triplet).map(|slot| Arc::clone(&slot.node))
    }

    /// Total live reference count across all nodes of one back-end service.
    pub fn refcount_sum(&self, fs_handle: FsHandle, service_id: u64) -> usize {
        self.inner
            .lock()
            .unwrap()
            .values()
            .filter(|slot| {
                slot.node.triplet.fs_handle == fs_handle
                    && slot.node.triplet.service_id == service_id
            })
            .map(|slot| slot.refs)
            .sum()
    }

    /// Drops the record regardless of its reference count, without any
    /// server-side call. Used when ownership leaves the cache (unmount).
    pub fn forget(&self, mut node: NodeRef) {
        if let Some(inner_node) = node.node.take() {
            self.inner.lock().unwrap().remove(&inner_node.triplet);
        }
    }

    fn addref(&self, node: &Arc<Node>) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(slot) = inner.get_mut(&node.triplet) {
            slot.refs += 1;
        }
    }

    fn put(&self, node: &Arc<Node>) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(slot) = inner.get_mut(&node.triplet) {
            slot.refs -= 1;
            if slot.refs == 0 {
                inner.remove(&node.triplet);
            }
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }
}

/// A counting reference to a cached [`Node`].
///
/// Cloning takes another reference; dropping releases one. The last drop
/// removes the record from the cache.
pub struct NodeRef {
    node: Option<Arc<Node>>,
    cache: Weak<NodeCache>,
}

impl NodeRef {
    /// The underlying shared record.
    pub fn inner(&self) -> &Arc<Node> {
        self.node.as_ref().expect("released node reference")
    }
}

impl Deref for NodeRef {
    type Target = Node;

    fn deref(&self) -> &Node {
        self.inner()
    }
}

impl Clone for NodeRef {
    fn clone(&self) -> NodeRef {
        if let Some(cache) = self.cache.upgrade() {
            cache.addref(self.inner());
        }
        NodeRef { node: self.node.clone(), cache: self.cache.clone() }
    }
}

impl Drop for NodeRef {
    fn drop(&mut self) {
        if let (Some(node), Some(cache)) = (self.node.take(), self.cache.upgrade()) {
            cache.put(&node);
        }
    }
}
