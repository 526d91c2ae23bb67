//! `STAT` and `STATFS`: relay attribute queries to the owning back-end.

use std::sync::Arc;

use crate::ops::{Answer, OpResult};
use crate::proto::{BackendOp, Message};
use crate::session::ClientCtx;
use crate::Mux;

pub(crate) async fn stat(mux: &Arc<Mux>, client: &Arc<ClientCtx>, msg: Message) -> OpResult {
    relay(mux, client, msg.args[0], BackendOp::Stat).await
}

pub(crate) async fn statfs(mux: &Arc<Mux>, client: &Arc<ClientCtx>, msg: Message) -> OpResult {
    relay(mux, client, msg.args[0], BackendOp::StatFs).await
}

/// The attribute bytes are back-end property; they pass through unchanged.
async fn relay(mux: &Mux, client: &ClientCtx, fd: u64, op: BackendOp) -> OpResult {
    let file = client.files.get(fd).await?;
    let node = file.node()?.clone();

    let answer = mux
        .exchanges
        .request(
            node.triplet.fs_handle,
            op,
            [node.triplet.service_id, node.triplet.index, 0, 0],
            Vec::new(),
        )
        .await?;

    Ok(Answer::with_payload([0; 4], answer.payload))
}
