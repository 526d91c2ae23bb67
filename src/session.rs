//! Per-connection session handling.
//!
//! A connection whose first request is `REGISTER` belongs to a back-end:
//! the socket is handed to the exchange pool after the registration
//! answer. Every other connection is a client session, served by one
//! reader task, one writer task and one spawned task per request.

use std::sync::Arc;

use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::exchange::Exchange;
use crate::fdtable::{FdTable, FileHandle};
use crate::ops;
use crate::parser;
use crate::proto::{FsCapabilities, Message, Opcode};
use crate::serializer;
use crate::Mux;

/// Per-client state shared by the request tasks of one session.
pub(crate) struct ClientCtx {
    pub session_id: u64,
    pub files: FdTable,
    pub donations: async_channel::Receiver<FileHandle>,
}

pub(crate) fn spawn(mux: Arc<Mux>, socket: TcpStream) {
    tokio::spawn(async move { run(mux, socket).await });
}

async fn run(mux: Arc<Mux>, socket: TcpStream) {
    let (mut reader, mut writer) = socket.into_split();

    let first = match parser::read_message(&mut reader).await {
        Ok(Some(msg)) => msg,
        Ok(None) => return,
        Err(_) => {
            warn!("malformed opening frame, dropping connection");
            return;
        }
    };

    if matches!(parser::request::opcode(first.code), Ok(Opcode::Register)) {
        register_backend(&mux, first, reader, writer).await;
        return;
    }

    serve_client(mux, first, reader, writer).await;
}

/// Registers the peer as a back-end and donates the connection to its
/// exchange pool.
async fn register_backend(
    mux: &Mux,
    msg: Message,
    reader: OwnedReadHalf,
    mut writer: OwnedWriteHalf,
) {
    let registration =
        parser::request::register_payload(&mut msg.payload.as_slice(), mux.config.backend_name_limit)
            .ok()
            .and_then(|payload| {
                FsCapabilities::from_bits(msg.args[1]).map(|caps| (payload.fs_name, caps))
            });

    let (fs_name, capabilities) = match registration {
        Some(parts) => parts,
        None => {
            let _ = serializer::write_message(&mut writer, &Message::error(msg.xid, Error::Invalid))
                .await;
            return;
        }
    };

    let instance = msg.args[0];
    let handle = mux.registry.register(instance, &fs_name, capabilities);
    info!(fs = %fs_name, instance, handle = handle.0, "back-end registered");

    let answer = Message::ok(msg.xid, [handle.0 as u64, 0, 0, 0], Vec::new());
    if serializer::write_message(&mut writer, &answer).await.is_err() {
        return;
    }
    mux.exchanges.add(handle, Exchange::from_halves(reader, writer));
}

async fn serve_client(
    mux: Arc<Mux>,
    first: Message,
    mut reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
) {
    let (session_id, donations) = mux.register_session();
    let client = Arc::new(ClientCtx {
        session_id,
        files: FdTable::new(mux.config.descriptor_table_size),
        donations,
    });
    debug!(session_id, "client session open");

    let (reply_tx, reply_rx) = mpsc::unbounded_channel::<Message>();
    tokio::spawn(write_replies(writer, reply_rx));

    dispatch_in_task(&mux, &client, first, &reply_tx);
    loop {
        match parser::read_message(&mut reader).await {
            Ok(Some(msg)) => dispatch_in_task(&mux, &client, msg, &reply_tx),
            Ok(None) => break,
            Err(_) => {
                warn!(session_id, "malformed frame, closing session");
                break;
            }
        }
    }

    mux.unregister_session(client.session_id);
    debug!(session_id, "client session closed");
}

/// Runs one request on its own task; a blocking back-end round-trip on one
/// request never starves the others.
fn dispatch_in_task(
    mux: &Arc<Mux>,
    client: &Arc<ClientCtx>,
    msg: Message,
    reply_tx: &mpsc::UnboundedSender<Message>,
) {
    let mux = Arc::clone(mux);
    let client = Arc::clone(client);
    let reply_tx = reply_tx.clone();
    tokio::spawn(async move {
        let answer = ops::dispatch(&mux, &client, msg).await;
        let _ = reply_tx.send(answer);
    });
}

async fn write_replies(mut writer: OwnedWriteHalf, mut replies: mpsc::UnboundedReceiver<Message>) {
    while let Some(msg) = replies.recv().await {
        if serializer::write_message(&mut writer, &msg).await.is_err() {
            break;
        }
    }
}
