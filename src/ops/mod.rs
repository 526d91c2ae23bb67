//! Client operations, one module per request.

mod clone_fd;
mod close;
mod dup;
mod handle;
mod mount;
mod mtab;
mod open;
mod rdwr;
mod rename;
mod seek;
mod stat;
mod sync;
mod truncate;
mod unlink;
mod unmount;
mod walk;

use std::sync::Arc;

use tracing::debug;

use crate::error::{Error, Result};
use crate::parser;
use crate::proto::{Message, Opcode};
use crate::session::ClientCtx;
use crate::Mux;

/// Successful answer of one operation.
pub(crate) struct Answer {
    pub args: [u64; 4],
    pub payload: Vec<u8>,
}

impl Answer {
    pub fn empty() -> Answer {
        Answer { args: [0; 4], payload: Vec::new() }
    }

    pub fn one(arg: u64) -> Answer {
        Answer { args: [arg, 0, 0, 0], payload: Vec::new() }
    }

    pub fn with_payload(args: [u64; 4], payload: Vec<u8>) -> Answer {
        Answer { args, payload }
    }
}

/// Decodes and executes one request, always producing exactly one answer
/// frame.
pub(crate) async fn dispatch(mux: &Arc<Mux>, client: &Arc<ClientCtx>, msg: Message) -> Message {
    let xid = msg.xid;
    let op = match parser::request::opcode(msg.code) {
        Ok(op) => op,
        Err(_) => return Message::error(xid, Error::NotSupported),
    };
    debug!(?op, xid, "dispatch");

    let result = match op {
        // Only valid as the first request of a back-end connection.
        Opcode::Register => Err(Error::Invalid),
        Opcode::Mount => mount::run(mux, client, msg).await,
        Opcode::Unmount => unmount::run(mux, client, msg).await,
        Opcode::Walk => walk::run(mux, client, msg).await,
        Opcode::Open2 => open::run(mux, client, msg).await,
        Opcode::Read => rdwr::read(mux, client, msg).await,
        Opcode::Write => rdwr::write(mux, client, msg).await,
        Opcode::Seek => seek::run(mux, client, msg).await,
        Opcode::Truncate => truncate::run(mux, client, msg).await,
        Opcode::Stat => stat::stat(mux, client, msg).await,
        Opcode::StatFs => stat::statfs(mux, client, msg).await,
        Opcode::Close => close::run(mux, client, msg).await,
        Opcode::Unlink2 => unlink::run(mux, client, msg).await,
        Opcode::Rename => rename::run(mux, client, msg).await,
        Opcode::Dup => dup::run(mux, client, msg).await,
        Opcode::WaitHandle => handle::wait(mux, client, msg).await,
        Opcode::PassHandle => handle::pass(mux, client, msg).await,
        Opcode::GetMtab => mtab::run(mux, client, msg).await,
        Opcode::Clone => clone_fd::run(mux, client, msg).await,
        Opcode::Sync => sync::run(mux, client, msg).await,
    };

    match result {
        Ok(answer) => Message::ok(xid, answer.args, answer.payload),
        Err(err) => {
            debug!(?op, xid, ?err, "request failed");
            Message::error(xid, err)
        }
    }
}

/// Operation result alias used by the op modules.
pub(crate) type OpResult = Result<Answer>;
