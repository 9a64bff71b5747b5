//! The TCP receive-path engine.
//!
//! Relevant material for reading:
//! Main TCP rfc (skip if confident): <https://tools.ietf.org/html/rfc793>
//! Errata and comments: <https://tools.ietf.org/html/rfc1122#section-4.2>
//!     Notably still assuming some good-faith on hosts
//! Attack avoidance: <https://tools.ietf.org/html/rfc5961>
//! Window scaling: <https://tools.ietf.org/html/rfc7323>
//! RST handling specifically: <https://www.snellman.net/blog/archive/2016-02-01-tcp-rst/>
//!     OS comparison in particular
//!
//! ## Structure
//!
//! The main functionality of the [`Endpoint`] structure of this layer is
//! storing the connection states, unlike other layers which mostly store
//! configuration options. Listening is a property of a local port kept in a
//! dedicated set; the connection map itself is keyed exactly by the
//! four-tuple. A [`Connection`] bundles the state machine position with the
//! control block carrying all sequence, window, scaling and timer
//! bookkeeping.
//!
//! [`Endpoint`]: struct.Endpoint.html
//! [`Connection`]: struct.Connection.html
//!
//! Unlike standard stacks where state and user must be assumed to be in
//! different protection domains and which manage their state opaquely, it
//! poses no problem for this library to allow inspection of internal state
//! or modification (by the user) beyond the transitions mandated in the
//! protocol standard.
//!
//! ## Scope
//!
//! This layer judges arriving segments and keeps the control block
//! consistent; it does not transmit on its own. Replies are handed back as
//! [`Event`]s for the caller to put on the wire, retransmission and delayed
//! acknowledgements are represented as timer handles for an external wheel,
//! and in-order payload is advanced past but not stored: reassembly and the
//! receive buffer live behind their own interface.
//!
//! [`Event`]: enum.Event.html
//!
//! ## Deviations
//!
//! An incoming packet in a closed (absent) connection slot is answered with
//! a reset unless it had RST set itself. Packets with RST should *never* be
//! answered with a packet with RST. RFC 793 is clear about this [in section
//! Reset Generation](https://tools.ietf.org/html/rfc793#page-36):
//!
//! > 1.  If the connection does not exist (CLOSED) then a reset is sent in
//! response to any incoming segment except another reset.
//!
//! Simultaneous open is not implemented: a bare SYN arriving in syn-sent is
//! dropped and the race is left to the peer's retransmission. Out-of-order
//! segments are discarded rather than queued; the acknowledgement policy
//! makes the peer retransmit them once the hole closes.

mod connection;
mod endpoint;
mod isn;
mod mss;


pub use connection::{
    Connection,
    ControlBlock,
    RttEstimate,
    State,
    Timer,
    TimerKind};

pub use endpoint::{
    Config,
    Endpoint,
    Event,
    FourTuple,
    dropwithreset};

pub use isn::IsnGenerator;

pub use mss::{
    BufSizes,
    advertised_mss,
    bsd_receive_window,
    buffer_sizes,
    BACKOFF,
    DEFAULT_MSS,
    MAX_WINDOW,
    MAX_WINDOW_SCALE};
