//! Error vocabulary shared by the client boundary and the back-end protocol.

/// Result of multiplexer operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors answered to clients and exchanged with back-ends.
///
/// Every variant has a stable wire code; codes the multiplexer does not
/// know are carried through unchanged as [`Error::Backend`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Error {
    /// Descriptor unknown or already freed.
    BadDescriptor,
    /// Target does not exist.
    NotFound,
    /// Exclusive creation hit an existing name.
    Exists,
    /// A non-directory was used in a directory operation.
    NotDirectory,
    /// A directory was used in a non-directory operation.
    IsDirectory,
    /// A directory that had to be empty is not.
    NotEmpty,
    /// Unmount attempted with outstanding references.
    Busy,
    /// Invalid flag combination or argument.
    Invalid,
    /// Requested open modes exceed the descriptor's permission mask.
    Permission,
    /// Seek arithmetic left the 64-bit signed range.
    Overflow,
    /// Operation not implemented by this back-end.
    NotSupported,
    /// Allocation failure.
    NoMemory,
    /// No back-end registered under the requested name.
    NoSuchBackend,
    /// Transport failure talking to a back-end.
    Io,
    /// Opaque back-end error, passed through unchanged.
    Backend(u32),
}

impl Error {
    /// Stable numeric code carried in answer frames.
    pub fn code(self) -> u32 {
        match self {
            Error::BadDescriptor => 1,
            Error::NotFound => 2,
            Error::Exists => 3,
            Error::NotDirectory => 4,
            Error::IsDirectory => 5,
            Error::NotEmpty => 6,
            Error::Busy => 7,
            Error::Invalid => 8,
            Error::Permission => 9,
            Error::Overflow => 10,
            Error::NotSupported => 11,
            Error::NoMemory => 12,
            Error::NoSuchBackend => 13,
            Error::Io => 14,
            Error::Backend(code) => code,
        }
    }

    /// Decodes an answer code; `0` means success.
    pub fn from_code(code: u32) -> Option<Error> {
        match code {
            0 => None,
            1 => Some(Error::BadDescriptor),
            2 => Some(Error::NotFound),
            3 => Some(Error::Exists),
            4 => Some(Error::NotDirectory),
            5 => Some(Error::IsDirectory),
            6 => Some(Error::NotEmpty),
            7 => Some(Error::Busy),
            8 => Some(Error::Invalid),
            9 => Some(Error::Permission),
            10 => Some(Error::Overflow),
            11 => Some(Error::NotSupported),
            12 => Some(Error::NoMemory),
            13 => Some(Error::NoSuchBackend),
            14 => Some(Error::Io),
            other => Some(Error::Backend(other)),
        }
    }
}
