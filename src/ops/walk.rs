//! `WALK`: resolve a path into a fresh descriptor.

use std::sync::Arc;

use crate::error::Error;
use crate::lookup::lookup;
use crate::node::NodeRef;
use crate::ops::{Answer, OpResult};
use crate::parser;
use crate::proto::{LookupFlags, Message, OpenMode, WalkFlags, FD_NONE};
use crate::session::ClientCtx;
use crate::Mux;

pub(crate) async fn run(mux: &Arc<Mux>, client: &Arc<ClientCtx>, msg: Message) -> OpResult {
    let parentfd = msg.args[0];
    let flags = WalkFlags::from_bits(msg.args[1]).ok_or(Error::Invalid)?;
    if !walk_flags_valid(flags) {
        return Err(Error::Invalid);
    }
    let path = parser::request::path_payload(&mut msg.payload.as_slice())
        .map_err(|_| Error::Invalid)?;

    // Parent is our relative root for the resolution. The open-file mutex
    // is released before the namespace lock is taken.
    let (parent, permissions) = parent_of(mux, client, parentfd).await?;

    let _ns = mux.namespace.read().await;

    let result = lookup(mux, &parent, &path, walk_lookup_flags(flags)).await?;
    let node = mux.cache.get(&result);

    let (fd, handle) = client.files.alloc(false)?;
    let mut file = handle.lock().await;
    file.set_node(node);
    file.permissions = permissions;
    drop(file);

    Ok(Answer::one(fd))
}

async fn parent_of(
    mux: &Mux,
    client: &ClientCtx,
    parentfd: u64,
) -> Result<(NodeRef, OpenMode), Error> {
    if parentfd == FD_NONE {
        let root = mux.root_node().ok_or(Error::NotFound)?;
        Ok((root, OpenMode::all_modes()))
    } else {
        let guard = client.files.get(parentfd).await?;
        Ok((guard.node()?.clone(), guard.permissions))
    }
}

fn walk_flags_valid(flags: WalkFlags) -> bool {
    if flags.contains(WalkFlags::MAY_CREATE) && flags.contains(WalkFlags::MUST_CREATE) {
        return false;
    }
    if flags.contains(WalkFlags::REGULAR) && flags.contains(WalkFlags::DIRECTORY) {
        return false;
    }
    if flags.intersects(WalkFlags::MAY_CREATE | WalkFlags::MUST_CREATE)
        && !flags.intersects(WalkFlags::REGULAR | WalkFlags::DIRECTORY)
    {
        return false;
    }
    true
}

fn walk_lookup_flags(flags: WalkFlags) -> LookupFlags {
    let mut lookup_flags = LookupFlags::empty();
    if flags.intersects(WalkFlags::MAY_CREATE | WalkFlags::MUST_CREATE) {
        lookup_flags |= LookupFlags::CREATE;
    }
    if flags.contains(WalkFlags::MUST_CREATE) {
        lookup_flags |= LookupFlags::EXCLUSIVE;
    }
    if flags.contains(WalkFlags::REGULAR) {
        lookup_flags |= LookupFlags::FILE;
    }
    if flags.contains(WalkFlags::DIRECTORY) {
        lookup_flags |= LookupFlags::DIRECTORY;
    }
    if flags.contains(WalkFlags::MOUNT_POINT) {
        lookup_flags |= LookupFlags::MOUNT_POINT;
    }
    lookup_flags
}
