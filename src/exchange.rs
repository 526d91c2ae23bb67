//! Exchange pools: borrowable request channels to back-end servers.
//!
//! Every registered back-end connection becomes one [`Exchange`]. An
//! exchange carries at most one in-flight request; callers grab a channel
//! from the pool, round-trip on it and release it by dropping the guard.
//! A channel whose round-trip fails on transport is discarded instead of
//! returned, so a crashed back-end never poisons the free list.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tracing::warn;

use crate::error::{Error, Result};
use crate::node::FsHandle;
use crate::parser;
use crate::proto::{BackendOp, Message};
use crate::serializer;

/// One bidirectional request channel to a back-end server.
pub struct Exchange {
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
    next_xid: u64,
}

impl Exchange {
    /// Adopts a registered back-end connection.
    pub fn from_halves(reader: OwnedReadHalf, writer: OwnedWriteHalf) -> Exchange {
        Exchange { reader, writer, next_xid: 1 }
    }

    /// Sends one request and waits for its answer frame.
    async fn call(&mut self, op: BackendOp, args: [u64; 4], payload: Vec<u8>) -> Result<Message> {
        let xid = self.next_xid;
        self.next_xid += 1;

        let request = Message::request(xid, op as u32, args, payload);
        serializer::write_message(&mut self.writer, &request)
            .await
            .map_err(|_| Error::Io)?;

        let answer = parser::read_message(&mut self.reader)
            .await
            .map_err(|_| Error::Io)?
            .ok_or(Error::Io)?;
        if answer.xid != xid {
            warn!(got = answer.xid, expected = xid, "exchange answer out of sequence");
            return Err(Error::Io);
        }
        match Error::from_code(answer.code) {
            None => Ok(answer),
            Some(err) => Err(err),
        }
    }
}

struct Pool {
    tx: async_channel::Sender<Exchange>,
    rx: async_channel::Receiver<Exchange>,
}

/// A borrowed exchange, returned to its pool when the guard drops.
///
/// The channel leaves the guard for the duration of a round trip, so a
/// call future dropped mid-flight closes the connection instead of
/// pooling a desynchronized exchange.
pub struct ExchangeGuard {
    exchange: Option<Exchange>,
    pool: async_channel::Sender<Exchange>,
    fs_handle: FsHandle,
}

impl ExchangeGuard {
    /// Round-trips one request on the borrowed channel.
    pub async fn call(&mut self, op: BackendOp, args: [u64; 4], payload: Vec<u8>) -> Result<Message> {
        let mut exchange = self.exchange.take().ok_or(Error::Io)?;
        let result = exchange.call(op, args, payload).await;
        if matches!(result, Err(Error::Io)) {
            warn!(fs = self.fs_handle.0, "discarding failed exchange");
        } else {
            self.exchange = Some(exchange);
        }
        result
    }
}

impl Drop for ExchangeGuard {
    fn drop(&mut self) {
        if let Some(exchange) = self.exchange.take() {
            // An unbounded channel only refuses when closed, which never
            // happens while the pool is alive.
            let _ = self.pool.try_send(exchange);
        }
    }
}

/// Free lists of exchanges, one per registered back-end.
pub struct Exchanges {
    pools: Mutex<HashMap<FsHandle, Pool>>,
}

impl Exchanges {
    pub fn new() -> Exchanges {
        Exchanges { pools: Mutex::new(HashMap::new()) }
    }

    /// Adds a fresh channel to the back-end's pool.
    pub fn add(&self, fs_handle: FsHandle, exchange: Exchange) {
        let mut pools = self.pools.lock().unwrap();
        let pool = pools.entry(fs_handle).or_insert_with(|| {
            let (tx, rx) = async_channel::unbounded();
            Pool { tx, rx }
        });
        // An unbounded channel only refuses when closed, which never
        // happens while the pool is alive.
        let _ = pool.tx.try_send(exchange);
    }

    /// Borrows an exchange of `fs_handle`, waiting for one to free up. A
    /// handle whose channel has not been pooled yet (registration still
    /// completing) simply waits for it.
    pub async fn grab(&self, fs_handle: FsHandle) -> Result<ExchangeGuard> {
        let (tx, rx) = {
            let mut pools = self.pools.lock().unwrap();
            let pool = pools.entry(fs_handle).or_insert_with(|| {
                let (tx, rx) = async_channel::unbounded();
                Pool { tx, rx }
            });
            (pool.tx.clone(), pool.rx.clone())
        };

        let exchange = rx.recv().await.map_err(|_| Error::Io)?;
        Ok(ExchangeGuard { exchange: Some(exchange), pool: tx, fs_handle })
    }

    /// Round-trips one request on a borrowed exchange of `fs_handle`.
    ///
    /// Back-end errors surface unchanged; transport failures discard the
    /// borrowed channel and answer [`Error::Io`].
    pub async fn request(
        &self,
        fs_handle: FsHandle,
        op: BackendOp,
        args: [u64; 4],
        payload: Vec<u8>,
    ) -> Result<Message> {
        let mut guard = self.grab(fs_handle).await?;
        guard.call(op, args, payload).await
    }
}
