//! Per-client descriptor table.
//!
//! Slots map small integers onto shared open-file records. Record access
//! goes through owned mutex guards, so holding a descriptor's record
//! automatically serializes all operations on it; operations on distinct
//! descriptors never block one another.

use std::sync::{Arc, Mutex};

use tokio::sync::OwnedMutexGuard;

use crate::error::{Error, Result};
use crate::node::NodeRef;
use crate::proto::OpenMode;

/// State bound to one descriptor.
pub struct OpenFile {
    node: Option<NodeRef>,
    pub pos: u64,
    pub permissions: OpenMode,
    pub open_read: bool,
    pub open_write: bool,
    pub append: bool,
}

impl OpenFile {
    /// Fresh record with no node attached yet.
    pub fn new() -> OpenFile {
        OpenFile {
            node: None,
            pos: 0,
            permissions: OpenMode::empty(),
            open_read: false,
            open_write: false,
            append: false,
        }
    }

    /// The node this record references.
    ///
    /// A record observed between allocation and setup has none; callers
    /// treat that window as an unknown descriptor.
    pub fn node(&self) -> Result<&NodeRef> {
        self.node.as_ref().ok_or(Error::BadDescriptor)
    }

    /// Attaches the record to a node, taking over the reference.
    pub fn set_node(&mut self, node: NodeRef) {
        self.node = Some(node);
    }
}

/// Shared handle to one open-file record.
pub type FileHandle = Arc<tokio::sync::Mutex<OpenFile>>;

/// Locked view of one open-file record, released on drop.
pub type FileGuard = OwnedMutexGuard<OpenFile>;

/// Fixed-size descriptor namespace of one client.
pub struct FdTable {
    slots: Mutex<Vec<Option<FileHandle>>>,
}

impl FdTable {
    pub fn new(capacity: usize) -> FdTable {
        FdTable { slots: Mutex::new((0..capacity).map(|_| None).collect()) }
    }

    /// Allocates a fresh record in the lowest free slot, or the highest
    /// when `prefer_high` separates control descriptors from data ones.
    pub fn alloc(&self, prefer_high: bool) -> Result<(u64, FileHandle)> {
        let mut slots = self.slots.lock().unwrap();
        let len = slots.len();
        let pick = if prefer_high {
            (0..len).rev().find(|i| slots[*i].is_none())
        } else {
            (0..len).find(|i| slots[*i].is_none())
        };
        let fd = pick.ok_or(Error::NoMemory)?;
        let handle: FileHandle = Arc::new(tokio::sync::Mutex::new(OpenFile::new()));
        slots[fd] = Some(Arc::clone(&handle));
        Ok((fd as u64, handle))
    }

    /// Locks and returns the record behind `fd`.
    pub async fn get(&self, fd: u64) -> Result<FileGuard> {
        let handle = self.handle(fd)?;
        Ok(handle.lock_owned().await)
    }

    /// The shared handle behind `fd` without locking it.
    pub fn handle(&self, fd: u64) -> Result<FileHandle> {
        let slots = self.slots.lock().unwrap();
        slots
            .get(usize::try_from(fd).map_err(|_| Error::BadDescriptor)?)
            .and_then(|slot| slot.as_ref())
            .cloned()
            .ok_or(Error::BadDescriptor)
    }

    /// Closes `fd`. The node reference is released when the last
    /// descriptor sharing the record lets go of it.
    pub fn free(&self, fd: u64) -> Result<()> {
        self.take(fd).map(|_| ())
    }

    /// Removes the record behind `fd` and hands it to the caller, for
    /// donation to another client.
    pub fn take(&self, fd: u64) -> Result<FileHandle> {
        let mut slots = self.slots.lock().unwrap();
        slots
            .get_mut(usize::try_from(fd).map_err(|_| Error::BadDescriptor)?)
            .and_then(|slot| slot.take())
            .ok_or(Error::BadDescriptor)
    }

    /// Installs `file` at slot `fd`, evicting any previous record.
    pub fn assign(&self, file: FileHandle, fd: u64) -> Result<()> {
        let mut slots = self.slots.lock().unwrap();
        let slot = slots
            .get_mut(usize::try_from(fd).map_err(|_| Error::BadDescriptor)?)
            .ok_or(Error::BadDescriptor)?;
        *slot = Some(file);
        Ok(())
    }

    /// Installs a donated record into a free slot.
    pub fn install(&self, file: FileHandle, prefer_high: bool) -> Result<u64> {
        let mut slots = self.slots.lock().unwrap();
        let len = slots.len();
        let pick = if prefer_high {
            (0..len).rev().find(|i| slots[*i].is_none())
        } else {
            (0..len).find(|i| slots[*i].is_none())
        };
        let fd = pick.ok_or(Error::NoMemory)?;
        slots[fd] = Some(file);
        Ok(fd as u64)
    }
}
