//! `WAIT_HANDLE` and `PASS_HANDLE`: descriptor donation between sessions.

use std::sync::Arc;

use crate::error::Error;
use crate::ops::{Answer, OpResult};
use crate::proto::Message;
use crate::session::ClientCtx;
use crate::Mux;

/// Blocks until another session donates an open-file record, then
/// installs it into this session's table.
pub(crate) async fn wait(_mux: &Arc<Mux>, client: &Arc<ClientCtx>, msg: Message) -> OpResult {
    let prefer_high = msg.args[0] != 0;

    let record = client.donations.recv().await.map_err(|_| Error::Io)?;
    let fd = client.files.install(record, prefer_high)?;
    Ok(Answer::one(fd))
}

/// Donates the record behind `fd` to the wait queue of another session.
/// The descriptor is gone from this table on success; on failure it is
/// restored.
pub(crate) async fn pass(mux: &Arc<Mux>, client: &Arc<ClientCtx>, msg: Message) -> OpResult {
    let fd = msg.args[0];
    let target = msg.args[1];

    let record = client.files.take(fd)?;
    match mux.donate(target, record) {
        Ok(()) => Ok(Answer::empty()),
        Err(record) => {
            let _ = client.files.assign(record, fd);
            Err(Error::NotFound)
        }
    }
}
