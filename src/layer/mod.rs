//! The processing logic of the receive path.
//!
//! The packet logic lives in `wire`; this module holds the judgement calls.
//! Handlers here are total functions over `(state, now, segment)`: they
//! neither block nor schedule, and every failure is fatal to the segment
//! only, never to the engine. Two dispositions cover all of them.
//!
//! * [`Error::Drop`] discards the segment silently: no reply, no state
//!   change. Used when a sequence or acknowledgement number is plausibly
//!   stale or out of window, where answering would aid blind attackers or
//!   amplify junk.
//! * [`Error::Reset`] tears the connection down: the entry is removed from
//!   the connection map and a reset is generated in reply (suppressed when
//!   the offending segment itself carried RST). Used on flagrant protocol
//!   violations.
//!
//! [`Error::Drop`]: enum.Error.html#variant.Drop
//! [`Error::Reset`]: enum.Error.html#variant.Reset
//!
//! Handlers compose the two through `Result` and `?`; the router at the
//! endpoint maps them onto their side effects in one place.

pub mod tcp;

/// The result type of receive-path handlers.
pub type Result<T> = core::result::Result<T, Error>;

/// Disposition of a segment that could not be applied to its connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Error {
    /// Discard the segment; no reply, no state change.
    ///
    /// Carries a short reason for the log line.
    Drop(&'static str),

    /// Drop the connection and answer with a reset.
    ///
    /// Carries a short reason for the log line. The reset reply is built by
    /// [`dropwithreset`], which never answers a reset with a reset.
    ///
    /// [`dropwithreset`]: tcp/fn.dropwithreset.html
    Reset(&'static str),
}

impl Error {
    /// The human-readable reason attached to the disposition.
    pub fn reason(&self) -> &'static str {
        match self {
            Error::Drop(reason) => reason,
            Error::Reset(reason) => reason,
        }
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            Error::Drop(reason) => write!(f, "drop: {}", reason),
            Error::Reset(reason) => write!(f, "reset: {}", reason),
        }
    }
}
