//! Wire-level vocabulary of the multiplexer protocol.
//!
//! Both directions (client to multiplexer, multiplexer to back-end) speak
//! the same frame format; see [`Message`]. Requests carry an opcode in the
//! code field, answers carry `0` for success or an error code.

use num_derive::{FromPrimitive, ToPrimitive};

/// Maximum bytes accepted for the mount options string.
pub const MAX_MNTOPTS_LEN: usize = 4096;
/// Maximum bytes in a file system name.
pub const FS_NAME_MAXLEN: usize = 32;
/// Maximum bytes in a single frame payload.
pub const MAX_PAYLOAD_LEN: usize = 1024 * 1024;
/// Wire encoding of a negative descriptor argument.
pub const FD_NONE: u64 = u64::MAX;

/// Operations a client may request.
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum Opcode {
    Register = 1,
    Mount = 2,
    Unmount = 3,
    Walk = 4,
    Open2 = 5,
    Read = 6,
    Write = 7,
    Seek = 8,
    Truncate = 9,
    Stat = 10,
    StatFs = 11,
    Close = 12,
    Unlink2 = 13,
    Rename = 14,
    Dup = 15,
    WaitHandle = 16,
    PassHandle = 17,
    GetMtab = 18,
    Clone = 19,
    Sync = 20,
}

/// Requests the multiplexer sends to back-end servers.
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum BackendOp {
    Mounted = 64,
    Unmounted = 65,
    Lookup = 66,
    Read = 67,
    Write = 68,
    Truncate = 69,
    Sync = 70,
    Stat = 71,
    StatFs = 72,
    Destroy = 73,
    Link = 74,
    IsEmpty = 75,
}

/// Kind of a file system object, as reported by back-end lookups.
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum NodeType {
    Regular = 0,
    Directory = 1,
    Symlink = 2,
    Mountpoint = 3,
}

/// `SEEK` origin.
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum SeekWhence {
    Set = 0,
    Cur = 1,
    End = 2,
}

bitflags::bitflags! {
    /// `MOUNT` behavior flags.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct MountFlags: u64 {
        /// Wait until the named back-end registers.
        const BLOCKING = 0x01;
        /// Connect the back-end without binding it into the namespace.
        const CONNECT_ONLY = 0x02;
        /// Do not hand out a descriptor for the mounted root.
        const NO_REF = 0x04;
    }

    /// `WALK` behavior flags.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct WalkFlags: u64 {
        const MAY_CREATE = 0x01;
        const MUST_CREATE = 0x02;
        const REGULAR = 0x04;
        const DIRECTORY = 0x08;
        const MOUNT_POINT = 0x10;
    }

    /// Flags of a single path-engine resolution.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
    pub struct LookupFlags: u64 {
        const CREATE = 0x01;
        const EXCLUSIVE = 0x02;
        const FILE = 0x04;
        const DIRECTORY = 0x08;
        const MOUNT_POINT = 0x10;
        const UNLINK = 0x20;
        const DISABLE_MOUNTS = 0x40;
    }

    /// Open modes carried by `OPEN2` and descriptor permission masks.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct OpenMode: u64 {
        const READ = 0x01;
        const WRITE = 0x02;
        const APPEND = 0x04;
    }

    /// Capability bits a back-end declares at registration.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct FsCapabilities: u64 {
        /// Reads and writes on one node may proceed concurrently.
        const CONCURRENT_READ_WRITE = 0x01;
        /// Writes never change the file size.
        const WRITE_RETAINS_SIZE = 0x02;
    }
}

impl OpenMode {
    /// The full mask handed to descriptors created by mounts and walks
    /// from the absolute root.
    pub fn all_modes() -> OpenMode {
        OpenMode::READ | OpenMode::WRITE | OpenMode::APPEND
    }
}

/// One protocol frame.
///
/// `code` holds the opcode on requests and the status on answers. Answers
/// echo the request `xid` so concurrently dispatched operations can be
/// matched up by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub xid: u64,
    pub code: u32,
    pub args: [u64; 4],
    pub payload: Vec<u8>,
}

impl Message {
    /// Builds a request frame.
    pub fn request(xid: u64, code: u32, args: [u64; 4], payload: Vec<u8>) -> Message {
        Message { xid, code, args, payload }
    }

    /// Builds a success answer.
    pub fn ok(xid: u64, args: [u64; 4], payload: Vec<u8>) -> Message {
        Message { xid, code: 0, args, payload }
    }

    /// Builds an error answer.
    pub fn error(xid: u64, err: crate::error::Error) -> Message {
        Message { xid, code: err.code(), args: [0; 4], payload: Vec::new() }
    }
}
