/*! Low-level packet access and construction.

The `wire` module deals with the segment *representation*. It provides two
levels of functionality.

 * First, it provides functions to extract fields from sequences of octets
   and to insert fields into sequences of octets. This happens through the
   [`Packet`] wrapper around a buffer.
 * Second, it provides a compact, high-level representation of header data
   that can be created from parsing and emitted into a sequence of octets.
   This happens through the [`Repr`] struct.

[`Packet`]: struct.TcpPacket.html
[`Repr`]: struct.TcpRepr.html

`Repr::parse` performs the full validation an untrusted segment requires:
length checks, a non-zero port check, the checksum over the pseudo-header and
a minimal option walk recognizing the maximum-segment-size and window-scale
options. Everything the engine consumes downstream is therefore already
structurally sound; the remaining judgement calls (window containment, flag
legality, ACK plausibility) belong to the connection layer.
*/
// in parts derived, via the stack this crate is modelled on, from `smoltcp`
// originally distributed under 0-clause BSD.

mod error;
mod ip;
mod tcp;

pub use self::error::{
    Error,
    Result};

pub use self::ip::Address as Ipv4Address;

pub use self::tcp::{
    Checksum as TcpChecksum,
    Flags as TcpFlags,
    Packet as TcpPacket,
    Repr as TcpRepr,
    SeqNumber as TcpSeqNumber,
    TcpOption};

pub(crate) use self::ip::checksum;

mod field {
    pub(crate) type Field = ::core::ops::Range<usize>;
}
