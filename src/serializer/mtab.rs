//! Serializer for the `GET_MTAB` answer payload.

use std::io::{self, Write};

use super::{string, u32, u64};
use crate::mtab::MountView;

/// Encodes the entry count followed by the entries themselves.
pub fn table(dest: &mut dyn Write, entries: &[MountView]) -> io::Result<()> {
    u32(dest, entries.len() as u32)?;
    for entry in entries {
        string(dest, &entry.path)?;
        string(dest, &entry.opts)?;
        string(dest, &entry.fs_name)?;
        u64(dest, entry.instance)?;
        u64(dest, entry.service_id)?;
    }
    Ok(())
}
