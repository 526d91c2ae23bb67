//! Step-wise path resolution across back-ends.
//!
//! The path engine is the only component that issues cross-server lookup
//! requests and crosses mount points. Resolution consumes one component at
//! a time; whenever the current node carries a mount, the walk descends
//! into the mounted root before the next component is consumed. A `..`
//! component steps back over the directories this walk descended through,
//! and at the root of a mount it ascends back through the mount point.

use tracing::debug;

use crate::canonify::{canonify, components};
use crate::error::{Error, Result};
use crate::node::{LookupResult, Node, Triplet};
use crate::proto::{BackendOp, LookupFlags, NodeType};
use crate::serializer;
use crate::Mux;

/// Flags forwarded to back-end lookup requests; the rest steer the walk
/// inside the multiplexer.
const BACKEND_FLAGS: LookupFlags = LookupFlags::CREATE
    .union(LookupFlags::EXCLUSIVE)
    .union(LookupFlags::FILE)
    .union(LookupFlags::DIRECTORY)
    .union(LookupFlags::UNLINK);

/// Resolves `path` relative to `base`.
///
/// Callers hold the namespace lock: read mode for plain walks, write mode
/// whenever `CREATE` or `UNLINK` mutates the namespace.
pub async fn lookup(
    mux: &Mux,
    base: &Node,
    path: &str,
    flags: LookupFlags,
) -> Result<LookupResult> {
    let canonical = canonify(path)?;
    let parts: Vec<&str> = components(&canonical).collect();
    debug!(path = %canonical, ?flags, "lookup");

    let mut current = base.lookup_result();

    if parts.is_empty() {
        // The walk names `base` itself; nothing can be created or removed.
        if flags.intersects(LookupFlags::CREATE | LookupFlags::UNLINK) {
            return Err(Error::Invalid);
        }
        if !flags.contains(LookupFlags::MOUNT_POINT) {
            current = cross_mounts(mux, current, flags);
        }
        check_kind(&current, flags)?;
        return Ok(current);
    }

    let mut ancestors: Vec<LookupResult> = Vec::new();

    for (pos, component) in parts.iter().enumerate() {
        current = cross_mounts(mux, current, flags);
        if current.kind != NodeType::Directory {
            return Err(Error::NotDirectory);
        }
        let last = pos + 1 == parts.len();
        if *component == ".." {
            // A parent reference names an existing directory.
            if last && flags.intersects(LookupFlags::CREATE | LookupFlags::UNLINK) {
                return Err(Error::Invalid);
            }
            current = match ancestors.pop() {
                Some(parent) => parent,
                None => ascend(mux, current, flags).await?,
            };
            continue;
        }
        let step = if last { flags & BACKEND_FLAGS } else { LookupFlags::empty() };
        ancestors.push(current);
        current = backend_lookup(mux, &current.triplet, component, step).await?;
    }

    if !flags.intersects(LookupFlags::MOUNT_POINT | LookupFlags::UNLINK) {
        current = cross_mounts(mux, current, flags);
    }
    check_kind(&current, flags)?;
    Ok(current)
}

/// Links an existing object (by triplet) under a new name. The final
/// component of `path` becomes the name, the rest must resolve to a
/// directory in the same back-end service as the object.
pub async fn link_node(mux: &Mux, base: &Node, path: &str, triplet: &Triplet) -> Result<()> {
    let split = path.rfind('/').ok_or(Error::Invalid)?;
    let dir = if split == 0 { "/" } else { &path[..split] };
    let name = &path[split + 1..];
    if name.is_empty() || name == ".." {
        return Err(Error::Invalid);
    }

    let parent = lookup(
        mux,
        base,
        dir,
        LookupFlags::DIRECTORY | LookupFlags::DISABLE_MOUNTS,
    )
    .await?;
    if parent.triplet.fs_handle != triplet.fs_handle
        || parent.triplet.service_id != triplet.service_id
    {
        return Err(Error::Invalid);
    }

    let mut payload = Vec::new();
    serializer::string(&mut payload, name).map_err(|_| Error::Io)?;
    mux.exchanges
        .request(
            triplet.fs_handle,
            BackendOp::Link,
            [triplet.service_id, parent.triplet.index, triplet.index, 0],
            payload,
        )
        .await?;
    Ok(())
}

/// Asks the owning back-end whether a directory has any entries.
pub async fn is_empty_directory(mux: &Mux, triplet: &Triplet) -> Result<bool> {
    let answer = mux
        .exchanges
        .request(
            triplet.fs_handle,
            BackendOp::IsEmpty,
            [triplet.service_id, triplet.index, 0, 0],
            Vec::new(),
        )
        .await?;
    Ok(answer.args[0] != 0)
}

/// Issues one `DESTROY` for an unlinked object nothing references anymore.
pub async fn destroy_node(mux: &Mux, triplet: &Triplet) {
    let _ = mux
        .exchanges
        .request(
            triplet.fs_handle,
            BackendOp::Destroy,
            [triplet.service_id, triplet.index, 0, 0],
            Vec::new(),
        )
        .await;
}

fn cross_mounts(mux: &Mux, mut current: LookupResult, flags: LookupFlags) -> LookupResult {
    if flags.contains(LookupFlags::DISABLE_MOUNTS) {
        return current;
    }
    while let Some(node) = mux.cache.peek(&current.triplet) {
        match node.mount_root() {
            Some(root) => current = root.lookup_result(),
            None => break,
        }
    }
    current
}

/// Resolves `..` past the base of the walk. At the root of a mount this
/// first steps back out through the mount point, then asks the owning
/// back-end for the parent directory.
async fn ascend(mux: &Mux, current: LookupResult, flags: LookupFlags) -> Result<LookupResult> {
    let mut here = current;
    if !flags.contains(LookupFlags::DISABLE_MOUNTS) {
        while let Some(node) = mux.cache.peek(&here.triplet) {
            match node.covered_node() {
                Some(mount_point) => here = mount_point.lookup_result(),
                None => break,
            }
        }
    }
    backend_lookup(mux, &here.triplet, "..", LookupFlags::empty()).await
}

fn check_kind(result: &LookupResult, flags: LookupFlags) -> Result<()> {
    if flags.contains(LookupFlags::DIRECTORY) && result.kind != NodeType::Directory {
        return Err(Error::NotDirectory);
    }
    if flags.contains(LookupFlags::FILE) && result.kind == NodeType::Directory {
        return Err(Error::IsDirectory);
    }
    Ok(())
}

async fn backend_lookup(
    mux: &Mux,
    parent: &Triplet,
    name: &str,
    flags: LookupFlags,
) -> Result<LookupResult> {
    let mut payload = Vec::new();
    serializer::string(&mut payload, name).map_err(|_| Error::Io)?;

    let answer = mux
        .exchanges
        .request(
            parent.fs_handle,
            BackendOp::Lookup,
            [parent.service_id, parent.index, flags.bits(), 0],
            payload,
        )
        .await?;

    let kind: NodeType =
        num_traits::FromPrimitive::from_u64(answer.args[2]).ok_or(Error::Io)?;
    Ok(LookupResult {
        triplet: Triplet {
            fs_handle: parent.fs_handle,
            service_id: parent.service_id,
            index: answer.args[0],
        },
        size: answer.args[1],
        kind,
    })
}
