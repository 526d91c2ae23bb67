//! The table of mounted file systems.

use std::sync::Mutex;

use crate::node::{FsHandle, NodeRef};

/// One mounted file system.
pub struct MountEntry {
    /// Canonical caller-supplied mount-point path.
    pub path: String,
    pub fs_name: String,
    pub opts: String,
    pub instance: u64,
    pub service_id: u64,
    pub fs_handle: FsHandle,
    /// Extra reference pinning the mount-point node for the lifetime of
    /// the mount; absent for root and connect-only mounts.
    pub mp: Option<NodeRef>,
}

/// Client-visible view of one entry, serialized by `GET_MTAB`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountView {
    pub path: String,
    pub opts: String,
    pub fs_name: String,
    pub instance: u64,
    pub service_id: u64,
}

/// Ordered list of mount entries.
pub struct MountTable {
    entries: Mutex<Vec<MountEntry>>,
}

impl MountTable {
    pub fn new() -> MountTable {
        MountTable { entries: Mutex::new(Vec::new()) }
    }

    pub fn append(&self, entry: MountEntry) {
        self.entries.lock().unwrap().push(entry);
    }

    /// Removes the entry of the unmounted file system, identified by its
    /// back-end handle and service.
    pub fn remove(&self, fs_handle: FsHandle, service_id: u64) -> Option<MountEntry> {
        let mut entries = self.entries.lock().unwrap();
        let pos = entries
            .iter()
            .position(|entry| entry.fs_handle == fs_handle && entry.service_id == service_id)?;
        Some(entries.remove(pos))
    }

    pub fn snapshot(&self) -> Vec<MountView> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|entry| MountView {
                path: entry.path.clone(),
                opts: entry.opts.clone(),
                fs_name: entry.fs_name.clone(),
                instance: entry.instance,
                service_id: entry.service_id,
            })
            .collect()
    }
}
