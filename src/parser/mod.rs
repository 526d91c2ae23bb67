//! Frame and payload decoding for the multiplexer protocol.

pub mod primitive;
pub mod request;

#[cfg(test)]
mod tests;

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::proto::{Message, MAX_PAYLOAD_LEN};

/// Errors raised while decoding frames and payloads.
#[derive(Debug)]
pub enum Error {
    /// Transport failure.
    IO(io::Error),
    /// Frame or field exceeds its documented bound.
    TooLong,
    /// String field is not valid UTF-8.
    BadString,
    /// The frame is shorter than its header demands.
    Truncated,
    /// Unknown opcode or enum discriminant.
    BadDiscriminant,
}

/// Result of parsing operations with error type [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Size of the fixed frame body behind the length field:
/// xid, code, four arguments and the payload length.
const FRAME_FIXED: usize = 8 + 4 + 4 * 8 + 4;

/// Reads one [`Message`] frame from the stream.
///
/// Returns `Ok(None)` on a clean end of stream before the length field.
pub async fn read_message(src: &mut (impl AsyncRead + Unpin)) -> Result<Option<Message>> {
    let len = match src.read_u32().await {
        Ok(len) => len as usize,
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(Error::IO(err)),
    };
    if len < FRAME_FIXED || len > FRAME_FIXED + MAX_PAYLOAD_LEN {
        return Err(Error::TooLong);
    }

    let mut frame = vec![0u8; len];
    src.read_exact(&mut frame).await.map_err(Error::IO)?;
    message(&mut frame.as_slice()).map(Some)
}

/// Decodes the body of a frame (everything after the length field).
pub fn message(src: &mut impl io::Read) -> Result<Message> {
    let xid = primitive::u64(src)?;
    let code = primitive::u32(src)?;
    let mut args = [0u64; 4];
    for arg in args.iter_mut() {
        *arg = primitive::u64(src)?;
    }
    let payload = primitive::bytes(src, MAX_PAYLOAD_LEN)?;
    Ok(Message { xid, code, args, payload })
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::IO(err)
    }
}
