//! Payload decoders for individual client operations.

use std::io::Read;

use super::{primitive, Error, Result};
use crate::proto::{Opcode, MAX_PAYLOAD_LEN};

/// Decoded `MOUNT` payload: options, file system name and the caller's
/// mount-point path.
pub struct MountPayload {
    pub opts: String,
    pub fs_name: String,
    pub mp_path: String,
}

/// Decoded `REGISTER` payload.
pub struct RegisterPayload {
    pub fs_name: String,
}

/// Maps the code field of a request frame onto an [`Opcode`].
pub fn opcode(code: u32) -> Result<Opcode> {
    num_traits::FromPrimitive::from_u32(code).ok_or(Error::BadDiscriminant)
}

/// The string bounds are configuration, so callers pass them in.
pub fn mount_payload(
    src: &mut impl Read,
    opts_limit: usize,
    name_limit: usize,
) -> Result<MountPayload> {
    let opts = primitive::string(src, opts_limit)?;
    let fs_name = primitive::string(src, name_limit)?;
    let mp_path = primitive::string(src, MAX_PAYLOAD_LEN)?;
    Ok(MountPayload { opts, fs_name, mp_path })
}

pub fn register_payload(src: &mut impl Read, name_limit: usize) -> Result<RegisterPayload> {
    let fs_name = primitive::string(src, name_limit)?;
    Ok(RegisterPayload { fs_name })
}

/// Decodes a single path payload (`WALK`, `UNLINK2`).
pub fn path_payload(src: &mut impl Read) -> Result<String> {
    primitive::string(src, MAX_PAYLOAD_LEN)
}

/// Decodes the `RENAME` payload: old path followed by new path.
pub fn rename_payload(src: &mut impl Read) -> Result<(String, String)> {
    let old = primitive::string(src, MAX_PAYLOAD_LEN)?;
    let new = primitive::string(src, MAX_PAYLOAD_LEN)?;
    Ok((old, new))
}
