//! Crate-wide error taxonomy.
//!
//! One enum for every fallible boundary in the driver: framer recovery,
//! controller admission, and transport/protocol-driver failures bubbled
//! up from the external collaborators.

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
#[non_exhaustive]
pub enum Error {
    /// Null/empty command, unknown mode, or length > 127.
    InvalidArgument,
    /// Operation requested before a protocol driver is attached.
    NotBound,
    /// A command is already outstanding on this driver.
    Busy,
    /// The completion slot did not signal within the deadline.
    Timeout,
    /// A received frame failed FCS, or a header field was out of range.
    ProtocolError,
    /// Start or end marker missing; the framer discarded a byte and retried.
    Resync,
    /// A line arrived with no handler installed, or the handler rejected it.
    UnknownInput,
    /// The transport's write or read failed.
    TransportError,
    /// The requested mode transition is invalid from the current state.
    StateError,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Error::InvalidArgument => "invalid argument",
            Error::NotBound => "no protocol driver attached",
            Error::Busy => "a command is already outstanding",
            Error::Timeout => "completion slot timed out",
            Error::ProtocolError => "frame failed validation",
            Error::Resync => "framer resynchronizing",
            Error::UnknownInput => "unhandled input",
            Error::TransportError => "transport I/O failed",
            Error::StateError => "invalid mode transition",
        };
        f.write_str(msg)
    }
}

pub type Result<T> = core::result::Result<T, Error>;
