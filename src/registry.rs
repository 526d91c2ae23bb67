//! Registry of connected back-end servers.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::Notify;

use crate::error::{Error, Result};
use crate::node::FsHandle;
use crate::proto::FsCapabilities;

/// Registration record of one back-end.
#[derive(Debug, Clone)]
pub struct FsInfo {
    pub name: String,
    pub instance: u64,
    pub capabilities: FsCapabilities,
}

struct Inner {
    by_name: HashMap<(u64, String), FsHandle>,
    info: HashMap<FsHandle, FsInfo>,
    next_handle: u32,
}

/// Maps `(instance, name)` pairs onto back-end handles and remembers each
/// back-end's capability flags. Waiters blocked in [`FsRegistry::resolve`]
/// are woken whenever a registration arrives.
pub struct FsRegistry {
    inner: Mutex<Inner>,
    arrivals: Notify,
}

impl FsRegistry {
    pub fn new() -> FsRegistry {
        FsRegistry {
            inner: Mutex::new(Inner {
                by_name: HashMap::new(),
                info: HashMap::new(),
                next_handle: 1,
            }),
            arrivals: Notify::new(),
        }
    }

    /// Registers a back-end, returning its handle. Registering a pair that
    /// already exists returns the existing handle, so a back-end may open
    /// additional exchange channels.
    pub fn register(&self, instance: u64, name: &str, capabilities: FsCapabilities) -> FsHandle {
        let handle = {
            let mut inner = self.inner.lock().unwrap();
            if let Some(handle) = inner.by_name.get(&(instance, name.to_owned())) {
                *handle
            } else {
                let handle = FsHandle(inner.next_handle);
                inner.next_handle += 1;
                inner.by_name.insert((instance, name.to_owned()), handle);
                inner.info.insert(
                    handle,
                    FsInfo { name: name.to_owned(), instance, capabilities },
                );
                handle
            }
        };
        self.arrivals.notify_waiters();
        handle
    }

    /// Resolves `(instance, name)` to a handle. With `blocking` set the
    /// call waits until such a back-end registers.
    pub async fn resolve(&self, instance: u64, name: &str, blocking: bool) -> Result<FsHandle> {
        loop {
            let notified = self.arrivals.notified();
            if let Some(handle) = self.lookup(instance, name) {
                return Ok(handle);
            }
            if !blocking {
                return Err(Error::NoSuchBackend);
            }
            notified.await;
        }
    }

    fn lookup(&self, instance: u64, name: &str) -> Option<FsHandle> {
        self.inner.lock().unwrap().by_name.get(&(instance, name.to_owned())).copied()
    }

    /// Capability record of a registered handle.
    pub fn info(&self, handle: FsHandle) -> Result<FsInfo> {
        self.inner.lock().unwrap().info.get(&handle).cloned().ok_or(Error::NoSuchBackend)
    }
}
