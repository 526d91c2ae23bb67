//! `SYNC`: flush a node at its back-end.

use std::sync::Arc;

use crate::ops::{Answer, OpResult};
use crate::proto::{BackendOp, Message};
use crate::session::ClientCtx;
use crate::Mux;

pub(crate) async fn run(mux: &Arc<Mux>, client: &Arc<ClientCtx>, msg: Message) -> OpResult {
    let fd = msg.args[0];

    let file = client.files.get(fd).await?;
    let node = file.node()?.clone();

    mux.exchanges
        .request(
            node.triplet.fs_handle,
            BackendOp::Sync,
            [node.triplet.service_id, node.triplet.index, 0, 0],
            Vec::new(),
        )
        .await?;

    Ok(Answer::empty())
}
