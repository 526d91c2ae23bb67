//! `READ` and `WRITE`: relay data transfers to the owning back-end.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::ops::{Answer, OpResult};
use crate::proto::{BackendOp, FsCapabilities, Message, NodeType, MAX_PAYLOAD_LEN};
use crate::session::ClientCtx;
use crate::Mux;

pub(crate) async fn read(mux: &Arc<Mux>, client: &Arc<ClientCtx>, msg: Message) -> OpResult {
    let fd = msg.args[0];
    let count = msg.args[1].min(MAX_PAYLOAD_LEN as u64);
    let (bytes, payload) = rdwr(mux, client, fd, true, count, Vec::new()).await?;
    Ok(Answer::with_payload([bytes, 0, 0, 0], payload))
}

pub(crate) async fn write(mux: &Arc<Mux>, client: &Arc<ClientCtx>, msg: Message) -> OpResult {
    let fd = msg.args[0];
    let data = msg.payload;
    let (bytes, _) = rdwr(mux, client, fd, false, 0, data).await?;
    Ok(Answer::one(bytes))
}

/// Shared read/write path.
///
/// Lock order demands the namespace lock before the node content lock and
/// forbids holding the open-file mutex while acquiring the namespace lock,
/// so directory reads first learn the node kind, release the record, take
/// the namespace read lock and re-fetch. The retry loop covers the window
/// in which the descriptor may have been retargeted.
async fn rdwr(
    mux: &Mux,
    client: &ClientCtx,
    fd: u64,
    read: bool,
    count: u64,
    data: Vec<u8>,
) -> Result<(u64, Vec<u8>)> {
    let mut data = Some(data);

    loop {
        let directory = {
            let file = client.files.get(fd).await?;
            file.node()?.kind == NodeType::Directory
        };
        if directory && !read {
            return Err(Error::Invalid);
        }

        // Directory entries stay consistent against namespace mutation
        // for the duration of the transfer.
        let _ns = if directory { Some(mux.namespace.read().await) } else { None };

        let mut file = client.files.get(fd).await?;
        let node = file.node()?.clone();
        if (node.kind == NodeType::Directory) != directory {
            continue;
        }

        if (read && !file.open_read) || (!read && !file.open_write) {
            return Err(Error::Invalid);
        }

        let capabilities = mux.registry.info(node.triplet.fs_handle)?.capabilities;
        let rlock = read
            || (capabilities.contains(FsCapabilities::CONCURRENT_READ_WRITE)
                && capabilities.contains(FsCapabilities::WRITE_RETAINS_SIZE));

        let mut read_guard = None;
        let mut write_guard = None;
        if rlock {
            read_guard = Some(node.contents.read().await);
        } else {
            write_guard = Some(node.contents.write().await);
        }

        if !read && file.append {
            file.pos = node.size();
        }

        let op = if read { BackendOp::Read } else { BackendOp::Write };
        let args = [node.triplet.service_id, node.triplet.index, file.pos, count];
        let payload = data.take().ok_or(Error::Io)?;
        let answer = mux.exchanges.request(node.triplet.fs_handle, op, args, payload).await?;

        let bytes = answer.args[0];
        if write_guard.is_some() && !read {
            // Update the cached version of the node's size.
            node.set_size(answer.args[1]);
        }
        file.pos += bytes;

        drop(read_guard);
        drop(write_guard);
        return Ok((bytes, answer.payload));
    }
}
