//! `OPEN2`: arm a descriptor for data access.

use std::sync::Arc;

use crate::error::Error;
use crate::ops::{Answer, OpResult};
use crate::proto::{Message, NodeType, OpenMode};
use crate::session::ClientCtx;
use crate::Mux;

pub(crate) async fn run(_mux: &Arc<Mux>, client: &Arc<ClientCtx>, msg: Message) -> OpResult {
    let fd = msg.args[0];
    let modes = OpenMode::from_bits(msg.args[1]).ok_or(Error::Invalid)?;
    if modes.is_empty() {
        return Err(Error::Invalid);
    }

    let mut file = client.files.get(fd).await?;

    if !file.permissions.contains(modes) {
        return Err(Error::Permission);
    }

    file.open_read = modes.contains(OpenMode::READ);
    file.open_write = modes.intersects(OpenMode::WRITE | OpenMode::APPEND);
    file.append = modes.contains(OpenMode::APPEND);

    if file.node()?.kind == NodeType::Directory && file.open_write {
        file.open_read = false;
        file.open_write = false;
        file.append = false;
        return Err(Error::Invalid);
    }

    Ok(Answer::empty())
}
