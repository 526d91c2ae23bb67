//! `CLOSE`: release a descriptor.

use std::sync::Arc;

use crate::ops::{Answer, OpResult};
use crate::proto::Message;
use crate::session::ClientCtx;
use crate::Mux;

pub(crate) async fn run(_mux: &Arc<Mux>, client: &Arc<ClientCtx>, msg: Message) -> OpResult {
    client.files.free(msg.args[0])?;
    Ok(Answer::empty())
}
