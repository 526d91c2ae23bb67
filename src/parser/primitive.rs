//! Primitive wire data type parsing utilities.

use std::io::Read;

use byteorder::{BigEndian, ReadBytesExt};

use super::{Error, Result};

/// Parses a `u32` from the `Read` source, in big-endian format.
pub fn u32(src: &mut impl Read) -> Result<u32> {
    src.read_u32::<BigEndian>().map_err(Error::IO)
}

/// Parses a `u64` from the `Read` source, in big-endian format.
pub fn u64(src: &mut impl Read) -> Result<u64> {
    src.read_u64::<BigEndian>().map_err(Error::IO)
}

/// Parses a length-prefixed byte vector bounded by `max`.
pub fn bytes(src: &mut impl Read, max: usize) -> Result<Vec<u8>> {
    let len = u32(src)? as usize;
    if len > max {
        return Err(Error::TooLong);
    }
    let mut buf = vec![0u8; len];
    src.read_exact(&mut buf).map_err(|_| Error::Truncated)?;
    Ok(buf)
}

/// Parses a length-prefixed UTF-8 string bounded by `max` bytes.
pub fn string(src: &mut impl Read, max: usize) -> Result<String> {
    let raw = bytes(src, max)?;
    String::from_utf8(raw).map_err(|_| Error::BadString)
}
