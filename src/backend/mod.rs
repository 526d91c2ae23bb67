//! Back-end author surface: the [`Backend`] trait and its wire adapter.
//!
//! A back-end server implements [`Backend`] and calls [`serve`] on a
//! connection to the multiplexer. The adapter registers the file system
//! and then answers multiplexer requests until the connection closes.

use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tracing::debug;

use crate::error::{Error, Result};
use crate::parser;
use crate::proto::{BackendOp, FsCapabilities, LookupFlags, Message, NodeType, Opcode};
use crate::serializer;

/// Identity and capabilities announced at registration.
pub struct Registration {
    pub name: String,
    pub instance: u64,
    pub capabilities: FsCapabilities,
}

/// Root object returned by [`Backend::mounted`].
pub struct MountedRoot {
    pub index: u64,
    pub size: u64,
}

/// Result of one [`Backend::lookup`] step.
pub struct LookupReply {
    pub index: u64,
    pub size: u64,
    pub kind: NodeType,
}

/// Result of one [`Backend::write`].
pub struct WriteReply {
    pub written: u64,
    pub size: u64,
}

/// Requests every back-end answers.
#[async_trait]
pub trait Backend: Send + Sync {
    /// A new service is being mounted; returns its root.
    async fn mounted(&self, service_id: u64, opts: &str) -> Result<MountedRoot>;

    /// The service is being detached.
    async fn unmounted(&self, service_id: u64) -> Result<()>;

    /// Resolves (and possibly creates or unlinks) `name` under `parent`.
    ///
    /// `name` may be `..`, naming the parent directory of `parent`; the
    /// root of a service is its own parent.
    async fn lookup(
        &self,
        service_id: u64,
        parent: u64,
        name: &str,
        flags: LookupFlags,
    ) -> Result<LookupReply>;

    async fn read(&self, service_id: u64, index: u64, pos: u64, count: u64) -> Result<Vec<u8>>;

    async fn write(&self, service_id: u64, index: u64, pos: u64, data: &[u8])
        -> Result<WriteReply>;

    async fn truncate(&self, service_id: u64, index: u64, size: u64) -> Result<()>;

    async fn sync(&self, service_id: u64, index: u64) -> Result<()>;

    /// Opaque attribute bytes relayed to the client unchanged.
    async fn stat(&self, service_id: u64, index: u64) -> Result<Vec<u8>>;

    /// Opaque file system statistics relayed to the client unchanged.
    async fn statfs(&self, service_id: u64, index: u64) -> Result<Vec<u8>>;

    /// Reclaims an object with no remaining names or references.
    async fn destroy(&self, service_id: u64, index: u64) -> Result<()>;

    /// Links an existing object under a new name.
    async fn link(&self, service_id: u64, parent: u64, name: &str, index: u64) -> Result<()>;

    /// Whether a directory has no entries.
    async fn is_empty(&self, service_id: u64, index: u64) -> Result<bool>;
}

/// Registers with the multiplexer and answers its requests until the
/// connection closes.
pub async fn serve<B: Backend>(
    stream: TcpStream,
    registration: &Registration,
    backend: Arc<B>,
) -> io::Result<()> {
    let (mut reader, mut writer) = stream.into_split();

    let mut payload = Vec::new();
    serializer::string(&mut payload, &registration.name)?;
    let request = Message::request(
        0,
        Opcode::Register as u32,
        [registration.instance, registration.capabilities.bits(), 0, 0],
        payload,
    );
    serializer::write_message(&mut writer, &request).await?;

    let answer = parser::read_message(&mut reader)
        .await
        .map_err(broken_frame)?
        .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "registration unanswered"))?;
    if answer.code != 0 {
        return Err(io::Error::new(io::ErrorKind::Other, "registration rejected"));
    }

    loop {
        let msg = match parser::read_message(&mut reader).await.map_err(broken_frame)? {
            Some(msg) => msg,
            None => return Ok(()),
        };
        let reply = handle(backend.as_ref(), &msg).await;
        serializer::write_message(&mut writer, &reply).await?;
    }
}

async fn handle<B: Backend>(backend: &B, msg: &Message) -> Message {
    let op: Option<BackendOp> = num_traits::FromPrimitive::from_u32(msg.code);
    let op = match op {
        Some(op) => op,
        None => return Message::error(msg.xid, Error::NotSupported),
    };
    debug!(?op, xid = msg.xid, "back-end request");

    let result = execute(backend, op, msg).await;
    match result {
        Ok((args, payload)) => Message::ok(msg.xid, args, payload),
        Err(err) => Message::error(msg.xid, err),
    }
}

async fn execute<B: Backend>(
    backend: &B,
    op: BackendOp,
    msg: &Message,
) -> Result<([u64; 4], Vec<u8>)> {
    let args = msg.args;
    match op {
        BackendOp::Mounted => {
            let opts = payload_string(msg)?;
            let root = backend.mounted(args[0], &opts).await?;
            Ok(([root.index, root.size, 0, 0], Vec::new()))
        }
        BackendOp::Unmounted => {
            backend.unmounted(args[0]).await?;
            Ok(([0; 4], Vec::new()))
        }
        BackendOp::Lookup => {
            let name = payload_string(msg)?;
            let flags = LookupFlags::from_bits_truncate(args[2]);
            let reply = backend.lookup(args[0], args[1], &name, flags).await?;
            Ok(([reply.index, reply.size, reply.kind as u64, 0], Vec::new()))
        }
        BackendOp::Read => {
            let data = backend.read(args[0], args[1], args[2], args[3]).await?;
            Ok(([data.len() as u64, 0, 0, 0], data))
        }
        BackendOp::Write => {
            let reply = backend.write(args[0], args[1], args[2], &msg.payload).await?;
            Ok(([reply.written, reply.size, 0, 0], Vec::new()))
        }
        BackendOp::Truncate => {
            backend.truncate(args[0], args[1], args[2]).await?;
            Ok(([0; 4], Vec::new()))
        }
        BackendOp::Sync => {
            backend.sync(args[0], args[1]).await?;
            Ok(([0; 4], Vec::new()))
        }
        BackendOp::Stat => {
            let bytes = backend.stat(args[0], args[1]).await?;
            Ok(([0; 4], bytes))
        }
        BackendOp::StatFs => {
            let bytes = backend.statfs(args[0], args[1]).await?;
            Ok(([0; 4], bytes))
        }
        BackendOp::Destroy => {
            backend.destroy(args[0], args[1]).await?;
            Ok(([0; 4], Vec::new()))
        }
        BackendOp::Link => {
            let name = payload_string(msg)?;
            backend.link(args[0], args[1], &name, args[2]).await?;
            Ok(([0; 4], Vec::new()))
        }
        BackendOp::IsEmpty => {
            let empty = backend.is_empty(args[0], args[1]).await?;
            Ok(([empty as u64, 0, 0, 0], Vec::new()))
        }
    }
}

fn payload_string(msg: &Message) -> Result<String> {
    parser::primitive::string(&mut msg.payload.as_slice(), msg.payload.len())
        .map_err(|_| Error::Invalid)
}

fn broken_frame(_err: parser::Error) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, "malformed frame")
}
