//! vfs-mux - a user-space virtual file system multiplexer in Rust.
//!
//! Clients issue path- and descriptor-oriented operations over one
//! connection endpoint; the multiplexer resolves them against a namespace
//! whose nodes live in registered back-end servers and round-trips data
//! requests to the owning server.

pub mod backend;
mod canonify;
pub mod config;
pub mod error;
mod exchange;
mod fdtable;
mod lookup;
mod mtab;
mod node;
mod ops;
pub mod parser;
pub mod proto;
mod registry;
pub mod serializer;
mod session;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tracing::info;

use crate::config::Config;
use crate::exchange::Exchanges;
use crate::fdtable::FileHandle;
use crate::mtab::MountTable;
use crate::node::{NodeCache, NodeRef};
use crate::registry::FsRegistry;

/// Shared state of one multiplexer instance.
pub struct Mux {
    pub(crate) config: Config,
    pub(crate) registry: FsRegistry,
    pub(crate) exchanges: Exchanges,
    pub(crate) cache: Arc<NodeCache>,
    pub(crate) mtab: MountTable,
    /// Orders path resolution against namespace-mutating operations.
    pub(crate) namespace: RwLock<()>,
    root: Mutex<Option<NodeRef>>,
    sessions: Mutex<HashMap<u64, async_channel::Sender<FileHandle>>>,
    next_session: AtomicU64,
}

impl Mux {
    pub fn new(config: Config) -> Arc<Mux> {
        Arc::new(Mux {
            config,
            registry: FsRegistry::new(),
            exchanges: Exchanges::new(),
            cache: NodeCache::new(),
            mtab: MountTable::new(),
            namespace: RwLock::new(()),
            root: Mutex::new(None),
            sessions: Mutex::new(HashMap::new()),
            next_session: AtomicU64::new(1),
        })
    }

    /// Reference to the absolute root, if a root file system is mounted.
    pub(crate) fn root_node(&self) -> Option<NodeRef> {
        self.root.lock().unwrap().clone()
    }

    pub(crate) fn set_root(&self, root: NodeRef) -> bool {
        let mut slot = self.root.lock().unwrap();
        if slot.is_some() {
            return false;
        }
        *slot = Some(root);
        true
    }

    pub(crate) fn take_root(&self) -> Option<NodeRef> {
        self.root.lock().unwrap().take()
    }

    pub(crate) fn register_session(&self) -> (u64, async_channel::Receiver<FileHandle>) {
        let id = self.next_session.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = async_channel::unbounded();
        self.sessions.lock().unwrap().insert(id, tx);
        (id, rx)
    }

    pub(crate) fn unregister_session(&self, id: u64) {
        self.sessions.lock().unwrap().remove(&id);
    }

    /// Donates an open-file record to another session's wait queue. On
    /// failure the record is handed back so the donor can restore it.
    pub(crate) fn donate(
        &self,
        session: u64,
        file: FileHandle,
    ) -> std::result::Result<(), FileHandle> {
        let sessions = self.sessions.lock().unwrap();
        match sessions.get(&session) {
            Some(tx) => tx.try_send(file).map_err(|err| err.into_inner()),
            None => Err(file),
        }
    }

    /// Triplet of the root file system without touching reference counts.
    pub(crate) fn root_triplet(&self) -> Option<crate::node::Triplet> {
        self.root.lock().unwrap().as_ref().map(|root| root.triplet)
    }
}

/// Accepts connections and serves them until the listener fails.
pub async fn handle_forever(mux: Arc<Mux>, listener: TcpListener) -> std::io::Result<()> {
    loop {
        let (socket, peer) = listener.accept().await?;

        socket.set_nodelay(true)?;
        info!(%peer, "connection accepted");

        session::spawn(Arc::clone(&mux), socket);
    }
}
