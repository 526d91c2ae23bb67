//! `RENAME`: atomically move a name, replacing the destination.

use std::sync::Arc;

use crate::canonify::{canonify, components, shared_prefix};
use crate::error::Error;
use crate::lookup::{destroy_node, link_node, lookup};
use crate::node::{LookupResult, NodeRef};
use crate::ops::{Answer, OpResult};
use crate::parser;
use crate::proto::{LookupFlags, Message};
use crate::session::ClientCtx;
use crate::Mux;

pub(crate) async fn run(mux: &Arc<Mux>, client: &Arc<ClientCtx>, msg: Message) -> OpResult {
    let basefd = msg.args[0];
    let (old_raw, new_raw) = parser::request::rename_payload(&mut msg.payload.as_slice())
        .map_err(|_| Error::Invalid)?;

    let old = canonify(&old_raw)?;
    let new = canonify(&new_raw)?;

    // Rename edits and their rollbacks are defined on plain names; parent
    // references would make the shared prefix and the re-links ambiguous.
    if has_parent_component(&old) || has_parent_component(&new) {
        return Err(Error::Invalid);
    }

    // Do not allow one path to be a prefix of the other.
    let shared = shared_prefix(&old, &new)?;

    let base = {
        let guard = client.files.get(basefd).await?;
        guard.node()?.clone()
    };

    rename_internal(mux, base, &old, &new, shared).await?;
    Ok(Answer::empty())
}

fn has_parent_component(canonical: &str) -> bool {
    components(canonical).any(|component| component == "..")
}

async fn rename_internal(
    mux: &Mux,
    base: NodeRef,
    old: &str,
    new: &str,
    shared: usize,
) -> Result<(), Error> {
    let _ns = mux.namespace.write().await;

    // Resolve the shared portion of the paths once; both edits then run
    // relative to the same node.
    let base = if shared != 0 {
        let prefix = lookup(mux, &base, &old[..shared], LookupFlags::DIRECTORY).await?;
        mux.cache.get(&prefix)
    } else {
        base
    };
    let old_rel = &old[shared..];
    let new_rel = &new[shared..];

    let edit = LookupFlags::UNLINK | LookupFlags::DISABLE_MOUNTS;

    // An object already sitting at the destination is unlinked first and
    // re-linked if the rename cannot complete.
    let mut replaced: Option<LookupResult> = None;
    match lookup(mux, &base, new_rel, edit).await {
        Ok(result) => replaced = Some(result),
        Err(Error::NotFound) => {}
        Err(err) => return Err(err),
    }

    let source = match lookup(mux, &base, old_rel, edit).await {
        Ok(result) => result,
        Err(err) => {
            if let Some(orig) = &replaced {
                let _ = link_node(mux, &base, new_rel, &orig.triplet).await;
            }
            return Err(err);
        }
    };

    if let Err(err) = link_node(mux, &base, new_rel, &source.triplet).await {
        let _ = link_node(mux, &base, old_rel, &source.triplet).await;
        if let Some(orig) = &replaced {
            let _ = link_node(mux, &base, new_rel, &orig.triplet).await;
        }
        return Err(err);
    }

    if let Some(orig) = replaced {
        if mux.cache.peek(&orig.triplet).is_none() {
            destroy_node(mux, &orig.triplet).await;
        }
    }

    Ok(())
}
