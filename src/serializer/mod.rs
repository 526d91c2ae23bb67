//! Frame and payload encoding for the multiplexer protocol.
//!
//! All multibyte values are serialized in big-endian (network byte order);
//! variable-length fields carry a 32-bit length prefix.

pub mod mtab;


use std::io::{self, Write};

use byteorder::{BigEndian, WriteBytesExt};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::proto::Message;

/// Serializes a `u32` in big-endian order.
pub fn u32(dest: &mut dyn Write, n: u32) -> io::Result<()> {
    dest.write_u32::<BigEndian>(n)
}

/// Serializes a `u64` in big-endian order.
pub fn u64(dest: &mut dyn Write, n: u64) -> io::Result<()> {
    dest.write_u64::<BigEndian>(n)
}

/// Serializes a length-prefixed byte slice.
pub fn bytes(dest: &mut dyn Write, data: &[u8]) -> io::Result<()> {
    let len = data
        .len()
        .try_into()
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "payload length exceeds u32"))?;
    u32(dest, len)?;
    dest.write_all(data)
}

/// Serializes a length-prefixed UTF-8 string.
pub fn string(dest: &mut dyn Write, text: &str) -> io::Result<()> {
    bytes(dest, text.as_bytes())
}

/// Encodes the body of a frame (everything after the length field).
pub fn message(dest: &mut dyn Write, msg: &Message) -> io::Result<()> {
    u64(dest, msg.xid)?;
    u32(dest, msg.code)?;
    for arg in msg.args {
        u64(dest, arg)?;
    }
    bytes(dest, &msg.payload)
}

/// Writes one length-prefixed [`Message`] frame to the stream.
pub async fn write_message(
    dest: &mut (impl AsyncWrite + Unpin),
    msg: &Message,
) -> io::Result<()> {
    let mut body = Vec::with_capacity(48 + msg.payload.len());
    message(&mut body, msg)?;

    let mut frame = Vec::with_capacity(4 + body.len());
    u32(&mut frame, body.len() as u32)?;
    frame.extend_from_slice(&body);

    dest.write_all(&frame).await?;
    dest.flush().await
}
