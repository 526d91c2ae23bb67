//! `SEEK`: move a descriptor's position.

use std::sync::Arc;

use crate::error::Error;
use crate::ops::{Answer, OpResult};
use crate::proto::{Message, SeekWhence};
use crate::session::ClientCtx;
use crate::Mux;

/// Positions are bounded by the signed 64-bit maximum.
const POS_MAX: u64 = i64::MAX as u64;

pub(crate) async fn run(_mux: &Arc<Mux>, client: &Arc<ClientCtx>, msg: Message) -> OpResult {
    let fd = msg.args[0];
    let offset = msg.args[1] as i64;
    let whence: SeekWhence =
        num_traits::FromPrimitive::from_u64(msg.args[2]).ok_or(Error::Invalid)?;

    let mut file = client.files.get(fd).await?;

    let new_pos = match whence {
        SeekWhence::Set => {
            if offset < 0 {
                return Err(Error::Invalid);
            }
            offset as u64
        }
        SeekWhence::Cur => file
            .pos
            .checked_add_signed(offset)
            .filter(|pos| *pos <= POS_MAX)
            .ok_or(Error::Overflow)?,
        SeekWhence::End => {
            let node = file.node()?.clone();
            let _contents = node.contents.read().await;
            node.size()
                .checked_add_signed(offset)
                .filter(|pos| *pos <= POS_MAX)
                .ok_or(Error::Overflow)?
        }
    };

    file.pos = new_pos;
    Ok(Answer::one(new_pos))
}
