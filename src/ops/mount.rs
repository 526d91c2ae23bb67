//! `MOUNT`: bind a back-end file system into the namespace.

use std::sync::Arc;

use tracing::info;

use crate::canonify::canonify;
use crate::error::Error;
use crate::lookup::is_empty_directory;
use crate::mtab::MountEntry;
use crate::node::{FsHandle, LookupResult, NodeRef, Triplet};
use crate::ops::{Answer, OpResult};
use crate::parser;
use crate::proto::{BackendOp, Message, MountFlags, NodeType, OpenMode, FD_NONE};
use crate::serializer;
use crate::session::ClientCtx;
use crate::Mux;

pub(crate) async fn run(mux: &Arc<Mux>, client: &Arc<ClientCtx>, msg: Message) -> OpResult {
    let mpfd = msg.args[0];
    let service_id = msg.args[1];
    let flags = MountFlags::from_bits(msg.args[2]).ok_or(Error::Invalid)?;
    let instance = msg.args[3];

    let payload = parser::request::mount_payload(
        &mut msg.payload.as_slice(),
        mux.config.mount_options_limit,
        mux.config.backend_name_limit,
    )
    .map_err(|_| Error::Invalid)?;
    let mp_path = canonify(&payload.mp_path)?;

    // Validate the mount point before talking to the back-end. The
    // open-file mutex is released before any lock below it is taken.
    let mp_node: Option<NodeRef> = if flags.contains(MountFlags::CONNECT_ONLY) || mpfd == FD_NONE
    {
        None
    } else {
        let guard = client.files.get(mpfd).await?;
        let node = guard.node()?.clone();
        drop(guard);

        if node.mount_triplet().is_some() {
            return Err(Error::Busy);
        }
        if node.kind != NodeType::Directory {
            return Err(Error::NotDirectory);
        }
        if !is_empty_directory(mux, &node.triplet).await? {
            return Err(Error::NotEmpty);
        }
        Some(node)
    };

    // Descriptor for the mounted root, allocated up front so descriptor
    // exhaustion fails before the back-end learns anything.
    let slot = if flags.contains(MountFlags::NO_REF) { None } else { Some(client.files.alloc(false)?) };

    match connect_and_bind(mux, flags, instance, service_id, &payload, mp_path, mp_node).await {
        Ok(root) => {
            let fd = match slot {
                Some((fd, handle)) => {
                    let mut file = handle.lock().await;
                    file.set_node(root);
                    file.permissions = OpenMode::all_modes();
                    fd
                }
                // The connect reference is dropped; the mount edge alone
                // keeps the root alive.
                None => 0,
            };
            Ok(Answer::one(fd))
        }
        Err(err) => {
            if let Some((fd, _)) = slot {
                let _ = client.files.free(fd);
            }
            Err(err)
        }
    }
}

async fn connect_and_bind(
    mux: &Mux,
    flags: MountFlags,
    instance: u64,
    service_id: u64,
    payload: &parser::request::MountPayload,
    mp_path: String,
    mp_node: Option<NodeRef>,
) -> Result<NodeRef, Error> {
    let fs_handle = mux
        .registry
        .resolve(instance, &payload.fs_name, flags.contains(MountFlags::BLOCKING))
        .await?;

    // Tell the mountee that it is being mounted.
    let root = connect(mux, fs_handle, service_id, &payload.opts).await?;

    if !flags.contains(MountFlags::CONNECT_ONLY) {
        let _ns = mux.namespace.write().await;
        match &mp_node {
            Some(mp) => {
                // The mount point may have been claimed while the
                // back-end round-trip was in flight.
                if mp.mount_triplet().is_some() {
                    disconnect(mux, fs_handle, service_id).await;
                    return Err(Error::Busy);
                }
                // Both edges of the mount go up together: the mount point
                // reaches the root, the root reaches back for `..` walks.
                mp.set_mount(root.clone());
                root.set_covered(mp.clone());
            }
            None => {
                if !mux.set_root(root.clone()) {
                    disconnect(mux, fs_handle, service_id).await;
                    return Err(Error::Busy);
                }
            }
        }
    }

    mux.mtab.append(MountEntry {
        path: mp_path,
        fs_name: payload.fs_name.clone(),
        opts: payload.opts.clone(),
        instance,
        service_id,
        fs_handle,
        mp: mp_node,
    });
    info!(fs = %payload.fs_name, instance, service_id, "mounted");

    Ok(root)
}

/// Sends `MOUNTED` and adopts the returned root triplet into the cache.
async fn connect(
    mux: &Mux,
    fs_handle: FsHandle,
    service_id: u64,
    opts: &str,
) -> Result<NodeRef, Error> {
    let mut payload = Vec::new();
    serializer::string(&mut payload, opts).map_err(|_| Error::Io)?;

    let answer = mux
        .exchanges
        .request(fs_handle, BackendOp::Mounted, [service_id, 0, 0, 0], payload)
        .await?;

    let result = LookupResult {
        triplet: Triplet { fs_handle, service_id, index: answer.args[0] },
        size: answer.args[1],
        kind: NodeType::Directory,
    };
    Ok(mux.cache.get(&result))
}

/// Best-effort `UNMOUNTED` after a bind that could not complete.
async fn disconnect(mux: &Mux, fs_handle: FsHandle, service_id: u64) {
    let _ = mux
        .exchanges
        .request(fs_handle, BackendOp::Unmounted, [service_id, 0, 0, 0], Vec::new())
        .await;
}
