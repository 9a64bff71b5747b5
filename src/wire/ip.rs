//! IPv4 addressing and internet checksums.
//!
//! The engine itself is agnostic of the IP layer; it only needs addresses to
//! key connections, to reject martians and to compute the TCP pseudo-header
//! checksum. This module provides exactly that surface.
use core::fmt;

/// A four-octet IPv4 address.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Default)]
pub struct Address(pub [u8; 4]);

impl Address {
    /// An unspecified address.
    pub const UNSPECIFIED: Address = Address([0x00; 4]);

    /// The broadcast address.
    pub const BROADCAST: Address = Address([0xff; 4]);

    /// Construct an IPv4 address from parts.
    pub const fn new(a0: u8, a1: u8, a2: u8, a3: u8) -> Address {
        Address([a0, a1, a2, a3])
    }

    /// Construct an IPv4 address from a sequence of octets, in big-endian.
    ///
    /// # Panics
    /// The function panics if `data` is not four octets long.
    pub fn from_bytes(data: &[u8]) -> Address {
        let mut bytes = [0; 4];
        bytes.copy_from_slice(data);
        Address(bytes)
    }

    /// Return an IPv4 address as a sequence of octets, in big-endian.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Query whether the address is an unicast address.
    pub fn is_unicast(&self) -> bool {
        !(self.is_broadcast() ||
          self.is_multicast() ||
          self.is_unspecified())
    }

    /// Query whether the address is the broadcast address.
    pub fn is_broadcast(&self) -> bool {
        self.0[0..4].iter().all(|&b| b == 255)
    }

    /// Query whether the address is a multicast address.
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0xf0 == 0xe0
    }

    /// Query whether the address falls into the "unspecified" range.
    pub fn is_unspecified(&self) -> bool {
        self.0[0] == 0
    }

    /// Query whether the address falls into the "loopback" range.
    pub fn is_loopback(&self) -> bool {
        self.0[0] == 127
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let bytes = self.0;
        write!(f, "{}.{}.{}.{}", bytes[0], bytes[1], bytes[2], bytes[3])
    }
}

pub(crate) mod checksum {
    use super::Address;

    /// Protocol number of TCP in the IP header, the only upper protocol here.
    const PROTOCOL_TCP: u8 = 0x06;

    /// Fold the carry bits back into the low half until none remain.
    fn fold(mut sum: u32) -> u16 {
        while sum > 0xffff {
            sum = (sum & 0xffff) + (sum >> 16);
        }
        sum as u16
    }

    /// The ones-complement sum of a byte slice taken as big-endian 16-bit
    /// words, per RFC 1071, without the final complement.
    ///
    /// A frame-sized input (at most 2^16 words of at most 0xffff each) can
    /// not overflow the 32-bit accumulator, so one fold at the end suffices.
    pub(crate) fn data(bytes: &[u8]) -> u16 {
        let mut words = bytes.chunks_exact(2);
        let mut sum: u32 = words.by_ref()
            .map(|word| u32::from(u16::from_be_bytes([word[0], word[1]])))
            .sum();
        // An odd trailing byte acts as the high half of a final word.
        if let Some(&last) = words.remainder().first() {
            sum += u32::from(last) << 8;
        }
        fold(sum)
    }

    /// Combine partial sums computed over separate regions.
    pub(crate) fn combine(parts: &[u16]) -> u16 {
        fold(parts.iter().map(|&part| u32::from(part)).sum())
    }

    /// The pseudo-header sum covering both addresses, the protocol number
    /// and the segment length.
    pub(crate) fn pseudo_header(src_addr: &Address, dst_addr: &Address,
                                length: u32) -> u16 {
        fold(u32::from(data(src_addr.as_bytes()))
            + u32::from(data(dst_addr.as_bytes()))
            + u32::from(PROTOCOL_TCP)
            + (length & 0xffff))
    }
}
