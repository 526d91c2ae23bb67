//! `CLONE`: a second open-file bound to the same node.

use std::sync::Arc;

use crate::ops::{Answer, OpResult};
use crate::proto::Message;
use crate::session::ClientCtx;
use crate::Mux;

pub(crate) async fn run(_mux: &Arc<Mux>, client: &Arc<ClientCtx>, msg: Message) -> OpResult {
    let oldfd = msg.args[0];
    let prefer_high = msg.args[1] != 0;

    let (node, permissions) = {
        let old = client.files.get(oldfd).await?;
        (old.node()?.clone(), old.permissions)
    };

    // A fresh record: the position starts at zero and the clone has to be
    // opened before data access.
    let (fd, handle) = client.files.alloc(prefer_high)?;
    let mut file = handle.lock().await;
    file.set_node(node);
    file.permissions = permissions;
    drop(file);

    Ok(Answer::one(fd))
}
