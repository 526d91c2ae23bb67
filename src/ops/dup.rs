//! `DUP`: install an existing record at a chosen descriptor.

use std::sync::Arc;

use crate::ops::{Answer, OpResult};
use crate::proto::Message;
use crate::session::ClientCtx;
use crate::Mux;

pub(crate) async fn run(_mux: &Arc<Mux>, client: &Arc<ClientCtx>, msg: Message) -> OpResult {
    let oldfd = msg.args[0];
    let newfd = msg.args[1];

    // Duplicating a descriptor onto itself changes nothing.
    if oldfd == newfd {
        return Ok(Answer::one(newfd));
    }

    let record = client.files.handle(oldfd)?;
    let _ = client.files.free(newfd);
    client.files.assign(record, newfd)?;

    Ok(Answer::one(newfd))
}
