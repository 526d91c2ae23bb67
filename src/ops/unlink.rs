//! `UNLINK2`: remove a name, destroying the object when nothing holds it.

use std::sync::Arc;

use crate::error::Error;
use crate::fdtable::FileGuard;
use crate::lookup::{destroy_node, lookup};
use crate::ops::{Answer, OpResult};
use crate::parser;
use crate::proto::{LookupFlags, Message, WalkFlags, FD_NONE};
use crate::session::ClientCtx;
use crate::Mux;

pub(crate) async fn run(mux: &Arc<Mux>, client: &Arc<ClientCtx>, msg: Message) -> OpResult {
    let parentfd = msg.args[0];
    let expectfd = msg.args[1];
    let wflags = WalkFlags::from_bits(msg.args[2]).ok_or(Error::Invalid)?;
    let path = parser::request::path_payload(&mut msg.payload.as_slice())
        .map_err(|_| Error::Invalid)?;

    if parentfd == expectfd {
        return Err(Error::Invalid);
    }

    let lflag = if wflags.contains(WalkFlags::DIRECTORY) {
        LookupFlags::DIRECTORY
    } else {
        LookupFlags::empty()
    };

    let _ns = mux.namespace.write().await;

    // Records are fetched in ascending descriptor order, to prevent
    // deadlock with a concurrent call naming the same pair.
    let mut parent: Option<FileGuard> = None;
    let mut expect: Option<FileGuard> = None;

    if expectfd == FD_NONE || parentfd < expectfd {
        parent = Some(client.files.get(parentfd).await?);
    }
    if expectfd != FD_NONE {
        expect = Some(client.files.get(expectfd).await.map_err(|_| Error::NotFound)?);
    }
    if expectfd != FD_NONE && parentfd > expectfd {
        parent = Some(client.files.get(parentfd).await?);
    }

    let parent = parent.ok_or(Error::BadDescriptor)?;
    let parent_node = parent.node()?.clone();

    if let Some(expect) = expect {
        let found = lookup(mux, &parent_node, &path, lflag).await?;
        let resident = mux.cache.peek(&found.triplet);
        let matches = match resident {
            Some(node) => Arc::ptr_eq(&node, expect.node()?.inner()),
            None => false,
        };
        if !matches {
            return Err(Error::NotFound);
        }
    }

    let removed = lookup(mux, &parent_node, &path, lflag | LookupFlags::UNLINK).await?;

    // If the node is not held by anyone, have the back-end destroy it.
    if mux.cache.peek(&removed.triplet).is_none() {
        destroy_node(mux, &removed.triplet).await;
    }

    Ok(Answer::empty())
}
