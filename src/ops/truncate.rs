//! `TRUNCATE`: set a file's size.

use std::sync::Arc;

use crate::ops::{Answer, OpResult};
use crate::proto::{BackendOp, Message};
use crate::session::ClientCtx;
use crate::Mux;

pub(crate) async fn run(mux: &Arc<Mux>, client: &Arc<ClientCtx>, msg: Message) -> OpResult {
    let fd = msg.args[0];
    let size = msg.args[1];

    let file = client.files.get(fd).await?;
    let node = file.node()?.clone();

    let _contents = node.contents.write().await;
    mux.exchanges
        .request(
            node.triplet.fs_handle,
            BackendOp::Truncate,
            [node.triplet.service_id, node.triplet.index, size, 0],
            Vec::new(),
        )
        .await?;
    node.set_size(size);

    Ok(Answer::empty())
}
