//! `GET_MTAB`: list mounted file systems.

use std::sync::Arc;

use crate::error::Error;
use crate::ops::{Answer, OpResult};
use crate::proto::Message;
use crate::serializer;
use crate::session::ClientCtx;
use crate::Mux;

pub(crate) async fn run(mux: &Arc<Mux>, _client: &Arc<ClientCtx>, _msg: Message) -> OpResult {
    let entries = mux.mtab.snapshot();

    let mut payload = Vec::new();
    serializer::mtab::table(&mut payload, &entries).map_err(|_| Error::NoMemory)?;

    Ok(Answer::with_payload([entries.len() as u64, 0, 0, 0], payload))
}
