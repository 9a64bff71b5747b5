use core::fmt;

/// The error type for parsing and validation of incoming segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// An incoming packet could not be parsed because it was shorter than
    /// assumed.
    ///
    /// The packet may be shorter than the minimum length specified, or claim
    /// a size longer than the actual payload. For variable length fields this
    /// may be because some of them were out of bounds of the received data.
    Truncated,

    /// An incoming packet had an incorrect checksum and was dropped.
    ///
    /// A checksum is data that is redundant if perfect packet delivery is
    /// ensured. Checksum checks should have a switch to disable them to
    /// enable fuzzing.
    WrongChecksum,

    /// An incoming packet was recognized but was self-contradictory.
    ///
    /// Examples: a segment with a zero source port; an option whose length
    /// octet disagrees with its kind.
    Malformed,

    /// An incoming packet arrived from or was directed at an address that can
    /// not take part in a connection.
    ///
    /// Broadcast and multicast addresses can not complete a three-way
    /// handshake and an unspecified source has no return path; segments
    /// touching them are dropped before any connection lookup.
    Unaddressable,
}

/// The result type for the wire layer.
pub type Result<T> = core::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Truncated     => write!(f, "truncated packet"),
            Error::WrongChecksum => write!(f, "checksum error"),
            Error::Malformed     => write!(f, "malformed packet"),
            Error::Unaddressable => write!(f, "unaddressable endpoint"),
        }
    }
}
