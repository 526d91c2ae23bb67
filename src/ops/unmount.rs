//! `UNMOUNT`: detach a mounted file system.

use std::sync::Arc;

use tracing::info;

use crate::error::Error;
use crate::node::NodeRef;
use crate::ops::{Answer, OpResult};
use crate::proto::{BackendOp, Message, FD_NONE};
use crate::session::ClientCtx;
use crate::Mux;

pub(crate) async fn run(mux: &Arc<Mux>, client: &Arc<ClientCtx>, msg: Message) -> OpResult {
    let mpfd = msg.args[0];

    // Mount-point node; the sentinel descriptor addresses the root mount.
    let mp_node: Option<NodeRef> = if mpfd == FD_NONE {
        None
    } else {
        let guard = client.files.get(mpfd).await?;
        let node = guard.node()?.clone();
        Some(node)
    };

    let _ns = mux.namespace.write().await;

    let mounted = match &mp_node {
        Some(node) => node.mount_triplet().ok_or(Error::NotFound)?,
        None => mux.root_triplet().ok_or(Error::NotFound)?,
    };

    // The only expected reference is the one held by the mount edge. More
    // means someone is still working with the file system.
    if mux.cache.refcount_sum(mounted.fs_handle, mounted.service_id) != 1 {
        return Err(Error::Busy);
    }

    mux.exchanges
        .request(
            mounted.fs_handle,
            BackendOp::Unmounted,
            [mounted.service_id, 0, 0, 0],
            Vec::new(),
        )
        .await?;

    let root = match &mp_node {
        Some(node) => node.take_mount(),
        None => mux.take_root(),
    };
    if let Some(root) = root {
        // Both edges of the mount come down together.
        root.take_covered();
        mux.cache.forget(root);
    }

    // Dropping the entry releases the extra mount-point reference.
    mux.mtab.remove(mounted.fs_handle, mounted.service_id);
    if let Ok(info) = mux.registry.info(mounted.fs_handle) {
        info!(fs = %info.name, instance = info.instance, service = mounted.service_id, "unmounted");
    }

    Ok(Answer::empty())
}
