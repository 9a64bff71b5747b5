use core::{cmp, fmt, ops};
use byteorder::{ByteOrder, NetworkEndian};

use super::checksum;
use super::ip::Address;
use super::{Error, Result};

/// A TCP sequence number.
///
/// A sequence number is a monotonically advancing integer modulo
/// 2<sup>32</sup>. Sequence numbers do not have a discontiguity when compared
/// pairwise across a signed overflow: all comparisons go through the sign of
/// the signed difference, so they stay correct under wrap-around. Keeping the
/// type distinct from a bare integer prevents accidental unsigned
/// comparisons from sneaking in.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Hash)]
pub struct SeqNumber(pub i32);

impl SeqNumber {
    /// The larger of two sequence numbers, in modular order.
    pub fn max(self, other: SeqNumber) -> SeqNumber {
        if self >= other { self } else { other }
    }
}

impl fmt::Display for SeqNumber {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0 as u32)
    }
}

impl ops::Add<usize> for SeqNumber {
    type Output = SeqNumber;

    fn add(self, rhs: usize) -> SeqNumber {
        if rhs > i32::max_value() as usize {
            panic!("attempt to add to sequence number with unsigned overflow")
        }
        SeqNumber(self.0.wrapping_add(rhs as i32))
    }
}

impl ops::Sub<usize> for SeqNumber {
    type Output = SeqNumber;

    fn sub(self, rhs: usize) -> SeqNumber {
        if rhs > i32::max_value() as usize {
            panic!("attempt to subtract from sequence number with unsigned overflow")
        }
        SeqNumber(self.0.wrapping_sub(rhs as i32))
    }
}

impl ops::AddAssign<usize> for SeqNumber {
    fn add_assign(&mut self, rhs: usize) {
        *self = *self + rhs;
    }
}

impl ops::Sub for SeqNumber {
    type Output = usize;

    fn sub(self, rhs: SeqNumber) -> usize {
        let result = self.0.wrapping_sub(rhs.0);
        if result < 0 {
            panic!("attempt to subtract sequence numbers with underflow")
        }
        result as usize
    }
}

impl cmp::PartialOrd for SeqNumber {
    fn partial_cmp(&self, other: &SeqNumber) -> Option<cmp::Ordering> {
        self.0.wrapping_sub(other.0).partial_cmp(&0)
    }
}

/// A set of tcp flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Flags(pub u16);

mod field {
    #![allow(non_snake_case)]

    use crate::wire::field::Field;

    pub(crate) const SRC_PORT: Field = 0..2;
    pub(crate) const DST_PORT: Field = 2..4;
    pub(crate) const SEQ_NUM:  Field = 4..8;
    pub(crate) const ACK_NUM:  Field = 8..12;
    pub(crate) const FLAGS:    Field = 12..14;
    pub(crate) const WIN_SIZE: Field = 14..16;
    pub(crate) const CHECKSUM: Field = 16..18;
    pub(crate) const URGENT:   Field = 18..20;

    pub(crate) fn OPTIONS(length: u8) -> Field {
        URGENT.end..(length as usize)
    }

    pub(crate) const FLG_FIN: u16 = 0x001;
    pub(crate) const FLG_SYN: u16 = 0x002;
    pub(crate) const FLG_RST: u16 = 0x004;
    pub(crate) const FLG_PSH: u16 = 0x008;
    pub(crate) const FLG_ACK: u16 = 0x010;
    pub(crate) const FLG_URG: u16 = 0x020;
    pub(crate) const FLG_ECE: u16 = 0x040;
    pub(crate) const FLG_CWR: u16 = 0x080;
    pub(crate) const FLG_NS:  u16 = 0x100;

    pub(crate) const OPT_END: u8 = 0x00;
    pub(crate) const OPT_NOP: u8 = 0x01;
    pub(crate) const OPT_MSS: u8 = 0x02;
    pub(crate) const OPT_WS:  u8 = 0x03;
}

impl Flags {
    /// The FIN flag alone.
    pub const FIN: Flags = Flags(field::FLG_FIN);
    /// The SYN flag alone.
    pub const SYN: Flags = Flags(field::FLG_SYN);
    /// The RST flag alone.
    pub const RST: Flags = Flags(field::FLG_RST);
    /// The PSH flag alone.
    pub const PSH: Flags = Flags(field::FLG_PSH);
    /// The ACK flag alone.
    pub const ACK: Flags = Flags(field::FLG_ACK);
    /// The URG flag alone.
    pub const URG: Flags = Flags(field::FLG_URG);

    /// The six classic control bits; ECN and the nonce sum take no part in
    /// combination legality.
    const CONTROL_MASK: u16 = 0x03f;

    /// Return the FIN flag.
    #[inline]
    pub fn fin(&self) -> bool {
        self.0 & field::FLG_FIN != 0
    }

    /// Return the SYN flag.
    #[inline]
    pub fn syn(&self) -> bool {
        self.0 & field::FLG_SYN != 0
    }

    /// Return the RST flag.
    #[inline]
    pub fn rst(&self) -> bool {
        self.0 & field::FLG_RST != 0
    }

    /// Return the PSH flag.
    #[inline]
    pub fn psh(&self) -> bool {
        self.0 & field::FLG_PSH != 0
    }

    /// Return the ACK flag.
    #[inline]
    pub fn ack(&self) -> bool {
        self.0 & field::FLG_ACK != 0
    }

    /// Return the URG flag.
    #[inline]
    pub fn urg(&self) -> bool {
        self.0 & field::FLG_URG != 0
    }

    /// Set the FIN flag.
    #[inline]
    pub fn set_fin(&mut self, value: bool) {
        let flag = if value { field::FLG_FIN } else { 0 };
        self.0 = (self.0 & !field::FLG_FIN) | flag;
    }

    /// Set the SYN flag.
    #[inline]
    pub fn set_syn(&mut self, value: bool) {
        let flag = if value { field::FLG_SYN } else { 0 };
        self.0 = (self.0 & !field::FLG_SYN) | flag;
    }

    /// Set the RST flag.
    #[inline]
    pub fn set_rst(&mut self, value: bool) {
        let flag = if value { field::FLG_RST } else { 0 };
        self.0 = (self.0 & !field::FLG_RST) | flag;
    }

    /// Set the PSH flag.
    #[inline]
    pub fn set_psh(&mut self, value: bool) {
        let flag = if value { field::FLG_PSH } else { 0 };
        self.0 = (self.0 & !field::FLG_PSH) | flag;
    }

    /// Set the ACK flag.
    #[inline]
    pub fn set_ack(&mut self, value: bool) {
        let flag = if value { field::FLG_ACK } else { 0 };
        self.0 = (self.0 & !field::FLG_ACK) | flag;
    }

    /// Set the URG flag.
    #[inline]
    pub fn set_urg(&mut self, value: bool) {
        let flag = if value { field::FLG_URG } else { 0 };
        self.0 = (self.0 & !field::FLG_URG) | flag;
    }

    /// Query whether none of the six control bits is set.
    pub fn is_empty(self) -> bool {
        self.0 & Self::CONTROL_MASK == 0
    }

    /// Query whether the control bits are exactly the expected combination.
    pub fn exactly(self, expect: Flags) -> bool {
        self.0 & Self::CONTROL_MASK == expect.0 & Self::CONTROL_MASK
    }

    /// Query whether the control bits are the expected combination, alone or
    /// together with ACK.
    pub fn or_ack(self, expect: Flags) -> bool {
        self.exactly(expect) || self.exactly(expect | Flags::ACK)
    }

    /// Return the length of the control flags, in terms of sequence space.
    ///
    /// SYN and FIN each occupy one sequence number.
    pub fn sequence_len(self) -> usize {
        usize::from(self.syn()) + usize::from(self.fin())
    }
}

impl ops::BitOr for Flags {
    type Output = Flags;

    fn bitor(self, rhs: Flags) -> Flags {
        Flags(self.0 | rhs.0)
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.syn() { write!(f, " syn")? }
        if self.fin() { write!(f, " fin")? }
        if self.rst() { write!(f, " rst")? }
        if self.psh() { write!(f, " psh")? }
        if self.ack() { write!(f, " ack")? }
        if self.urg() { write!(f, " urg")? }
        Ok(())
    }
}

/// A representation of a single TCP option.
///
/// Only the options taking part in connection setup are interpreted;
/// everything else is carried as `Unknown` and skipped by the parser.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum TcpOption<'a> {
    /// End of the option list.
    EndOfList,
    /// A padding no-op.
    NoOperation,
    /// The maximum segment size the sender is willing to accept.
    MaxSegmentSize(u16),
    /// The shift applied to window fields on this half-connection.
    WindowScale(u8),
    /// Any option this implementation does not interpret.
    Unknown {
        /// The option kind octet.
        kind: u8,
        /// The option data, without the kind and length octets.
        data: &'a [u8],
    },
}

impl<'a> TcpOption<'a> {
    /// Parse the option at the start of `buffer`, returning the remaining
    /// buffer and the parsed option.
    pub fn parse(buffer: &'a [u8]) -> Result<(&'a [u8], TcpOption<'a>)> {
        let kind = *buffer.first().ok_or(Error::Truncated)?;

        // The two single-octet options carry no length field.
        if kind == field::OPT_END {
            return Ok((&buffer[1..], TcpOption::EndOfList));
        }
        if kind == field::OPT_NOP {
            return Ok((&buffer[1..], TcpOption::NoOperation));
        }

        let claimed = usize::from(*buffer.get(1).ok_or(Error::Truncated)?);
        let body = buffer.get(2..claimed).ok_or(Error::Truncated)?;
        let option = match kind {
            field::OPT_MSS => match *body {
                [hi, lo] => TcpOption::MaxSegmentSize(u16::from_be_bytes([hi, lo])),
                _ => return Err(Error::Malformed),
            },
            field::OPT_WS => match *body {
                [shift] => TcpOption::WindowScale(shift),
                _ => return Err(Error::Malformed),
            },
            _ => TcpOption::Unknown { kind, data: body },
        };
        Ok((&buffer[claimed..], option))
    }

    /// The number of octets the emitted option occupies.
    pub fn buffer_len(&self) -> usize {
        match self {
            TcpOption::EndOfList | TcpOption::NoOperation => 1,
            TcpOption::WindowScale(_) => 3,
            TcpOption::MaxSegmentSize(_) => 4,
            TcpOption::Unknown { data, .. } => data.len() + 2,
        }
    }

    /// Emit the option at the start of `buffer`, returning the rest.
    pub fn emit<'b>(&self, buffer: &'b mut [u8]) -> &'b mut [u8] {
        let written = self.buffer_len();
        match *self {
            TcpOption::EndOfList => {
                // The end marker also initializes whatever padding follows.
                for octet in buffer.iter_mut() {
                    *octet = field::OPT_END;
                }
            }
            TcpOption::NoOperation => buffer[0] = field::OPT_NOP,
            TcpOption::MaxSegmentSize(value) => {
                buffer[..2].copy_from_slice(&[field::OPT_MSS, 4]);
                buffer[2..4].copy_from_slice(&value.to_be_bytes());
            }
            TcpOption::WindowScale(shift) => {
                buffer[..3].copy_from_slice(&[field::OPT_WS, 3, shift]);
            }
            TcpOption::Unknown { kind, data } => {
                buffer[0] = kind;
                buffer[1] = written as u8;
                buffer[2..written].copy_from_slice(data);
            }
        }
        &mut buffer[written..]
    }
}

/// Describes how to handle the segment checksum.
///
/// The checksum requires calculating a pseudo header consisting of the src
/// and dst address of the carrying IP packet.
pub enum Checksum {
    /// Always fill the checksum and check if it exists.
    Manual {
        /// Source address in the pseudo header.
        src_addr: Address,
        /// Destination address in the pseudo header.
        dst_addr: Address,
    },

    /// Never inspect the checksum.
    ///
    /// This assumes that some layer below has already performed the necessary
    /// checks.
    Ignored,
}

/// A read/write wrapper around a TCP segment buffer.
#[derive(Debug, PartialEq, Clone)]
pub struct Packet<T> {
    buffer: T,
    repr: Repr,
}

impl<T: AsRef<[u8]>> Packet<T> {
    /// Imbue a raw octet buffer with TCP packet structure.
    ///
    /// The representation is trusted; use [new_checked] on untrusted input.
    ///
    /// [new_checked]: #method.new_checked
    pub fn new_unchecked(buffer: T, repr: Repr) -> Packet<T> {
        Packet { buffer, repr }
    }

    /// Parse and validate a buffer into a structured packet.
    pub fn new_checked(buffer: T, checksum: Checksum) -> Result<Packet<T>> {
        let repr = Repr::parse(buffer.as_ref(), checksum)?;
        Ok(Packet { buffer, repr })
    }

    /// Consume the packet, returning the underlying buffer.
    pub fn into_inner(self) -> T {
        self.buffer
    }

    /// Retrieve the packet representation.
    pub fn repr(&self) -> Repr {
        self.repr
    }

    /// Return the source port field.
    #[inline]
    pub fn src_port(&self) -> u16 {
        let data = self.buffer.as_ref();
        NetworkEndian::read_u16(&data[field::SRC_PORT])
    }

    /// Return the destination port field.
    #[inline]
    pub fn dst_port(&self) -> u16 {
        let data = self.buffer.as_ref();
        NetworkEndian::read_u16(&data[field::DST_PORT])
    }

    /// Return the sequence number field.
    #[inline]
    pub fn seq_number(&self) -> SeqNumber {
        let data = self.buffer.as_ref();
        SeqNumber(NetworkEndian::read_i32(&data[field::SEQ_NUM]))
    }

    /// Return the acknowledgement number field.
    #[inline]
    pub fn ack_number(&self) -> SeqNumber {
        let data = self.buffer.as_ref();
        SeqNumber(NetworkEndian::read_i32(&data[field::ACK_NUM]))
    }

    /// Read all flags at once.
    pub fn flags(&self) -> Flags {
        let data = self.buffer.as_ref();
        Flags(NetworkEndian::read_u16(&data[field::FLAGS]) & 0x1ff)
    }

    /// Return the header length, in octets.
    #[inline]
    pub fn header_len(&self) -> u8 {
        let data = self.buffer.as_ref();
        let raw = NetworkEndian::read_u16(&data[field::FLAGS]);
        ((raw >> 12) * 4) as u8
    }

    /// Return the window size field.
    #[inline]
    pub fn window_len(&self) -> u16 {
        let data = self.buffer.as_ref();
        NetworkEndian::read_u16(&data[field::WIN_SIZE])
    }

    /// Return the checksum field.
    #[inline]
    pub fn checksum(&self) -> u16 {
        let data = self.buffer.as_ref();
        NetworkEndian::read_u16(&data[field::CHECKSUM])
    }

    /// Return the urgent pointer field.
    #[inline]
    pub fn urgent_at(&self) -> u16 {
        let data = self.buffer.as_ref();
        NetworkEndian::read_u16(&data[field::URGENT])
    }

    /// Return a pointer to the options.
    #[inline]
    pub fn options(&self) -> &[u8] {
        let header_len = self.header_len();
        let data = self.buffer.as_ref();
        &data[field::OPTIONS(header_len)]
    }

    /// Return a pointer to the payload.
    #[inline]
    pub fn payload_slice(&self) -> &[u8] {
        let header_len = self.header_len() as usize;
        let data = self.buffer.as_ref();
        &data[header_len..]
    }

    /// Validate the packet checksum.
    pub fn verify_checksum(&self, src_addr: Address, dst_addr: Address) -> bool {
        let data = self.buffer.as_ref();
        checksum::combine(&[
            checksum::pseudo_header(&src_addr, &dst_addr, data.len() as u32),
            checksum::data(data)
        ]) == !0
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> Packet<T> {
    /// Set the source port field.
    #[inline]
    pub fn set_src_port(&mut self, value: u16) {
        let data = self.buffer.as_mut();
        NetworkEndian::write_u16(&mut data[field::SRC_PORT], value)
    }

    /// Set the destination port field.
    #[inline]
    pub fn set_dst_port(&mut self, value: u16) {
        let data = self.buffer.as_mut();
        NetworkEndian::write_u16(&mut data[field::DST_PORT], value)
    }

    /// Set the sequence number field.
    #[inline]
    pub fn set_seq_number(&mut self, value: SeqNumber) {
        let data = self.buffer.as_mut();
        NetworkEndian::write_i32(&mut data[field::SEQ_NUM], value.0)
    }

    /// Set the acknowledgement number field.
    #[inline]
    pub fn set_ack_number(&mut self, value: SeqNumber) {
        let data = self.buffer.as_mut();
        NetworkEndian::write_i32(&mut data[field::ACK_NUM], value.0)
    }

    /// Set a combination of flags.
    #[inline]
    pub fn set_flags(&mut self, Flags(flags): Flags) {
        let data = self.buffer.as_mut();
        let raw = NetworkEndian::read_u16(&data[field::FLAGS]) & !0xfff;
        NetworkEndian::write_u16(&mut data[field::FLAGS], raw | (flags & 0x1ff))
    }

    /// Set the header length, in octets.
    #[inline]
    pub fn set_header_len(&mut self, value: u8) {
        let data = self.buffer.as_mut();
        let raw = NetworkEndian::read_u16(&data[field::FLAGS]);
        let raw = (raw & !0xf000) | ((value as u16) / 4) << 12;
        NetworkEndian::write_u16(&mut data[field::FLAGS], raw)
    }

    /// Set the window size field.
    #[inline]
    pub fn set_window_len(&mut self, value: u16) {
        let data = self.buffer.as_mut();
        NetworkEndian::write_u16(&mut data[field::WIN_SIZE], value)
    }

    /// Set the checksum field.
    #[inline]
    pub fn set_checksum(&mut self, value: u16) {
        let data = self.buffer.as_mut();
        NetworkEndian::write_u16(&mut data[field::CHECKSUM], value)
    }

    /// Set the urgent pointer field.
    #[inline]
    pub fn set_urgent_at(&mut self, value: u16) {
        let data = self.buffer.as_mut();
        NetworkEndian::write_u16(&mut data[field::URGENT], value)
    }

    /// Return a mutable pointer to the options.
    #[inline]
    pub fn options_mut(&mut self) -> &mut [u8] {
        let header_len = self.header_len();
        let data = self.buffer.as_mut();
        &mut data[field::OPTIONS(header_len)]
    }

    /// Return a mutable pointer to the payload data.
    #[inline]
    pub fn payload_mut_slice(&mut self) -> &mut [u8] {
        let header_len = self.header_len() as usize;
        let data = self.buffer.as_mut();
        &mut data[header_len..]
    }

    /// Compute and fill in the header checksum.
    pub fn fill_checksum(&mut self, src_addr: Address, dst_addr: Address) {
        self.set_checksum(0);
        let checksum = {
            let data = self.buffer.as_ref();
            !checksum::combine(&[
                checksum::pseudo_header(&src_addr, &dst_addr, data.len() as u32),
                checksum::data(data)
            ])
        };
        self.set_checksum(checksum)
    }
}

impl<T: AsRef<[u8]>> AsRef<[u8]> for Packet<T> {
    fn as_ref(&self) -> &[u8] {
        self.buffer.as_ref()
    }
}

/// A high-level representation of a TCP segment header.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Repr {
    /// Source port.
    pub src_port: u16,
    /// Destination port.
    pub dst_port: u16,
    /// The set control flags.
    pub flags: Flags,
    /// Sequence number of the first payload octet.
    pub seq_number: SeqNumber,
    /// Acknowledged sequence number, present exactly when ACK is set.
    pub ack_number: Option<SeqNumber>,
    /// Window advertisement, as carried in the header and thus unscaled.
    pub window_len: u16,
    /// The window scale option, if the segment carried one.
    pub window_scale: Option<u8>,
    /// The maximum segment size option, if the segment carried one.
    pub max_seg_size: Option<u16>,
    /// The number of payload octets following the header.
    pub payload_len: u16,
}

impl Repr {
    /// Parse a TCP segment and return a high-level representation.
    ///
    /// Besides the structural checks this validates the ports to be non-zero
    /// and the checksum when requested; option parsing recognizes the
    /// maximum-segment-size and window-scale options and skips everything
    /// else. A window-scale shift above 14 is clamped to 14, as required by
    /// RFC 7323.
    pub fn parse(data: &[u8], checksum: Checksum) -> Result<Repr> {
        if data.len() < field::URGENT.end {
            return Err(Error::Truncated);
        }
        let raw_flags = NetworkEndian::read_u16(&data[field::FLAGS]);
        let header_len = ((raw_flags >> 12) * 4) as usize;
        if data.len() < header_len {
            return Err(Error::Truncated);
        }
        if header_len < field::URGENT.end {
            return Err(Error::Malformed);
        }

        let src_port = NetworkEndian::read_u16(&data[field::SRC_PORT]);
        let dst_port = NetworkEndian::read_u16(&data[field::DST_PORT]);
        // Source and destination ports must be present.
        if src_port == 0 { return Err(Error::Malformed) }
        if dst_port == 0 { return Err(Error::Malformed) }

        // Valid checksum may be expected.
        if let Checksum::Manual { src_addr, dst_addr } = checksum {
            let all = checksum::combine(&[
                checksum::pseudo_header(&src_addr, &dst_addr, data.len() as u32),
                checksum::data(data)
            ]);
            if all != !0 {
                return Err(Error::WrongChecksum);
            }
        }

        let flags = Flags(raw_flags & 0x1ff);
        let ack_number = if flags.ack() {
            Some(SeqNumber(NetworkEndian::read_i32(&data[field::ACK_NUM])))
        } else {
            None
        };
        // The URG flag and the urgent field are ignored. This behavior is
        // standards-compliant, however, most deployed systems (e.g. Linux)
        // are *not* standards-compliant, and would cut the byte at the urgent
        // pointer from the stream.

        let mut max_seg_size = None;
        let mut window_scale = None;
        let mut options = &data[field::OPTIONS(header_len as u8)];
        while options.len() > 0 {
            let (next_options, option) = TcpOption::parse(options)?;
            match option {
                TcpOption::EndOfList => break,
                TcpOption::NoOperation => (),
                TcpOption::MaxSegmentSize(value) =>
                    max_seg_size = Some(value),
                TcpOption::WindowScale(value) => {
                    // RFC 7323: If a Window Scale option is received with a
                    // shift.cnt value larger than 14, the TCP SHOULD log the
                    // error but MUST use 14 instead of the specified value.
                    window_scale = if value > 14 {
                        net_debug!("window scaling factor {} > 14, using 14", value);
                        Some(14)
                    } else {
                        Some(value)
                    };
                }
                TcpOption::Unknown { .. } => (),
            }
            options = next_options;
        }

        Ok(Repr {
            src_port,
            dst_port,
            flags,
            seq_number: SeqNumber(NetworkEndian::read_i32(&data[field::SEQ_NUM])),
            ack_number,
            window_len: NetworkEndian::read_u16(&data[field::WIN_SIZE]),
            window_scale,
            max_seg_size,
            payload_len: (data.len() - header_len) as u16,
        })
    }

    /// Return the length of a header emitted from this representation.
    ///
    /// Options are padded so the header stays a multiple of 4 octets.
    pub fn header_len(&self) -> usize {
        let options = self.max_seg_size.map_or(0, |_| 4)
            + self.window_scale.map_or(0, |_| 3);
        field::URGENT.end + (options + 3) / 4 * 4
    }

    /// Return the length of a packet emitted from this representation.
    pub fn buffer_len(&self) -> usize {
        usize::from(self.payload_len) + self.header_len()
    }

    /// Emit this high-level representation into a segment buffer.
    ///
    /// The checksum field is left zero; fill it through the packet once the
    /// payload is in place.
    pub fn emit<T>(&self, packet: &mut Packet<T>)
        where T: AsRef<[u8]> + AsMut<[u8]>
    {
        packet.set_src_port(self.src_port);
        packet.set_dst_port(self.dst_port);
        packet.set_seq_number(self.seq_number);
        packet.set_window_len(self.window_len);
        packet.set_header_len(self.header_len() as u8);
        packet.set_urgent_at(0);
        packet.set_checksum(0);

        // The ACK bit mirrors the presence of an acknowledgement number.
        let mut flags = self.flags;
        flags.set_ack(self.ack_number.is_some());
        packet.set_flags(flags);
        packet.set_ack_number(self.ack_number.unwrap_or(SeqNumber(0)));

        let options = packet.options_mut();
        let mut at = 0;
        if let Some(shift) = self.window_scale {
            let option = TcpOption::WindowScale(shift);
            option.emit(&mut options[at..]);
            at += option.buffer_len();
        }
        if let Some(size) = self.max_seg_size {
            let option = TcpOption::MaxSegmentSize(size);
            option.emit(&mut options[at..]);
            at += option.buffer_len();
        }
        if at < options.len() {
            TcpOption::EndOfList.emit(&mut options[at..]);
        }
    }

    /// Return the length of the segment, in terms of sequence space.
    ///
    /// Payload octets plus one for each of SYN and FIN.
    pub fn sequence_len(&self) -> usize {
        self.flags.sequence_len() + usize::from(self.payload_len)
    }
}

impl fmt::Display for Repr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "TCP src={} dst={}{}", self.src_port, self.dst_port, self.flags)?;
        write!(f, " seq={}", self.seq_number)?;
        if let Some(ack_number) = self.ack_number {
            write!(f, " ack={}", ack_number)?;
        }
        write!(f, " win={}", self.window_len)?;
        write!(f, " len={}", self.payload_len)?;
        if let Some(max_seg_size) = self.max_seg_size {
            write!(f, " mss={}", max_seg_size)?;
        }
        if let Some(window_scale) = self.window_scale {
            write!(f, " ws={}", window_scale)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const SRC_ADDR: Address = Address([192, 168, 1, 1]);
    const DST_ADDR: Address = Address([192, 168, 1, 2]);

    static PACKET_BYTES: [u8; 28] =
        [0xbf, 0x00, 0x00, 0x50,
         0x01, 0x23, 0x45, 0x67,
         0x89, 0xab, 0xcd, 0xef,
         0x60, 0x35, 0x01, 0x23,
         0x01, 0xb6, 0x02, 0x01,
         0x03, 0x03, 0x0c, 0x01,
         0xaa, 0x00, 0x00, 0xff];

    static OPTION_BYTES: [u8; 4] =
        [0x03, 0x03, 0x0c, 0x01];

    static PAYLOAD_BYTES: [u8; 4] =
        [0xaa, 0x00, 0x00, 0xff];

    #[test]
    fn deconstruct() {
        let packet = Packet::new_checked(&PACKET_BYTES[..], Checksum::Ignored).unwrap();
        assert_eq!(packet.src_port(), 48896);
        assert_eq!(packet.dst_port(), 80);
        assert_eq!(packet.seq_number(), SeqNumber(0x01234567));
        assert_eq!(packet.ack_number(), SeqNumber(0x89abcdefu32 as i32));
        assert_eq!(packet.header_len(), 24);
        assert_eq!(packet.flags().fin(), true);
        assert_eq!(packet.flags().syn(), false);
        assert_eq!(packet.flags().rst(), true);
        assert_eq!(packet.flags().psh(), false);
        assert_eq!(packet.flags().ack(), true);
        assert_eq!(packet.flags().urg(), true);
        assert_eq!(packet.window_len(), 0x0123);
        assert_eq!(packet.urgent_at(), 0x0201);
        assert_eq!(packet.checksum(), 0x01b6);
        assert_eq!(packet.options(), &OPTION_BYTES[..]);
        assert_eq!(packet.payload_slice(), &PAYLOAD_BYTES[..]);
        assert_eq!(packet.verify_checksum(SRC_ADDR, DST_ADDR), true);
        assert_eq!(packet.repr().window_scale, Some(12));
    }

    #[test]
    fn construct() {
        let mut bytes = vec![0xa5; PACKET_BYTES.len()];
        let mut packet = Packet::new_unchecked(&mut bytes, packet_repr());
        packet.set_src_port(48896);
        packet.set_dst_port(80);
        packet.set_seq_number(SeqNumber(0x01234567));
        packet.set_ack_number(SeqNumber(0x89abcdefu32 as i32));
        packet.set_header_len(24);
        let mut flags = Flags::default();
        flags.set_fin(true);
        flags.set_rst(true);
        flags.set_ack(true);
        flags.set_urg(true);
        packet.set_flags(flags);
        packet.set_window_len(0x0123);
        packet.set_urgent_at(0x0201);
        packet.set_checksum(0xEEEE);
        packet.options_mut().copy_from_slice(&OPTION_BYTES[..]);
        packet.payload_mut_slice().copy_from_slice(&PAYLOAD_BYTES[..]);
        packet.fill_checksum(SRC_ADDR, DST_ADDR);
        assert_eq!(&packet.into_inner()[..], &PACKET_BYTES[..]);
    }

    #[test]
    fn truncated() {
        let packet = Packet::new_checked(&PACKET_BYTES[..23], Checksum::Ignored);
        assert_eq!(packet.unwrap_err(), Error::Truncated);
    }

    #[test]
    fn impossible_len() {
        let mut bytes = vec![0; 20];
        let mut packet = Packet::new_unchecked(&mut bytes, packet_repr());
        packet.set_src_port(1);
        packet.set_dst_port(2);
        packet.set_header_len(10);
        let parsed = Repr::parse(packet.as_ref(), Checksum::Ignored);
        assert_eq!(parsed.unwrap_err(), Error::Malformed);
    }

    #[test]
    fn zero_port() {
        let mut bytes = PACKET_BYTES;
        bytes[0] = 0; bytes[1] = 0;
        let parsed = Repr::parse(&bytes[..], Checksum::Ignored);
        assert_eq!(parsed.unwrap_err(), Error::Malformed);
    }

    static SYN_PACKET_BYTES: [u8; 24] =
        [0xbf, 0x00, 0x00, 0x50,
         0x01, 0x23, 0x45, 0x67,
         0x00, 0x00, 0x00, 0x00,
         0x50, 0x02, 0x01, 0x23,
         0x7a, 0x8d, 0x00, 0x00,
         0xaa, 0x00, 0x00, 0xff];

    fn packet_repr() -> Repr {
        Repr {
            src_port:     48896,
            dst_port:     80,
            seq_number:   SeqNumber(0x01234567),
            ack_number:   None,
            window_len:   0x0123,
            window_scale: None,
            flags:        Flags::SYN,
            max_seg_size: None,
            payload_len:  PAYLOAD_BYTES.len() as u16,
        }
    }

    #[test]
    fn parse_full() {
        let packet = Packet::new_checked(
            &SYN_PACKET_BYTES[..],
            Checksum::Manual { src_addr: SRC_ADDR, dst_addr: DST_ADDR })
        .unwrap();
        assert_eq!(packet.repr(), packet_repr());
        assert_eq!(packet.payload_slice(), &PAYLOAD_BYTES[..]);
    }

    #[test]
    fn parse_bad_checksum() {
        let mut bytes = SYN_PACKET_BYTES;
        bytes[17] = bytes[17].wrapping_add(1);
        let packet = Packet::new_checked(
            &bytes[..],
            Checksum::Manual { src_addr: SRC_ADDR, dst_addr: DST_ADDR });
        assert_eq!(packet.unwrap_err(), Error::WrongChecksum);
    }

    #[test]
    fn emit_roundtrip() {
        let repr = packet_repr();
        let mut bytes = vec![0xa5; repr.buffer_len()];
        let mut packet = Packet::new_unchecked(&mut bytes, repr);
        repr.emit(&mut packet);
        packet.payload_mut_slice().copy_from_slice(&PAYLOAD_BYTES);
        packet.fill_checksum(SRC_ADDR, DST_ADDR);
        assert_eq!(&packet.into_inner()[..], &SYN_PACKET_BYTES[..]);
    }

    #[test]
    fn header_len_multiple_of_4() {
        let mut repr = packet_repr();
        repr.window_scale = Some(0); // This option needs 3 bytes.
        assert_eq!(repr.header_len() % 4, 0); // Should e.g. be 24 instead of 23.
    }

    macro_rules! assert_option_parses {
        ($opt:expr, $data:expr) => ({
            assert_eq!(TcpOption::parse($data), Ok((&[][..], $opt)));
            let buffer = &mut [0; 40][..$opt.buffer_len()];
            assert_eq!($opt.emit(buffer), &mut []);
            assert_eq!(&*buffer, $data);
        })
    }

    #[test]
    fn options() {
        assert_option_parses!(TcpOption::EndOfList,
                              &[0x00]);
        assert_option_parses!(TcpOption::NoOperation,
                              &[0x01]);
        assert_option_parses!(TcpOption::MaxSegmentSize(1500),
                              &[0x02, 0x04, 0x05, 0xdc]);
        assert_option_parses!(TcpOption::WindowScale(12),
                              &[0x03, 0x03, 0x0c]);
        assert_option_parses!(TcpOption::Unknown { kind: 12, data: &[1, 2, 3][..] },
                              &[0x0c, 0x05, 0x01, 0x02, 0x03])
    }

    #[test]
    fn malformed_options() {
        assert_eq!(TcpOption::parse(&[]),
                   Err(Error::Truncated));
        assert_eq!(TcpOption::parse(&[0xc]),
                   Err(Error::Truncated));
        assert_eq!(TcpOption::parse(&[0xc, 0x05, 0x01, 0x02]),
                   Err(Error::Truncated));
        assert_eq!(TcpOption::parse(&[0xc, 0x01]),
                   Err(Error::Truncated));
        assert_eq!(TcpOption::parse(&[0x2, 0x02]),
                   Err(Error::Malformed));
        assert_eq!(TcpOption::parse(&[0x3, 0x02]),
                   Err(Error::Malformed));
    }

    #[test]
    fn sequence_number_order() {
        assert!(SeqNumber(5) < SeqNumber(6));
        assert!(SeqNumber(0x7fff_ffff) < SeqNumber(i32::min_value()));
        // Comparison stays correct across the unsigned wrap.
        assert!(SeqNumber(-1) < SeqNumber(1));
        assert_eq!(SeqNumber(-1) + 2, SeqNumber(1));
        assert_eq!(SeqNumber(1) - SeqNumber(-1), 2);
        assert_eq!(SeqNumber(-3).max(SeqNumber(2)), SeqNumber(2));
        assert_eq!(SeqNumber(2).max(SeqNumber(-3)), SeqNumber(2));
    }

    #[test]
    fn flag_predicates() {
        let syn_ack = Flags::SYN | Flags::ACK;
        assert!(syn_ack.exactly(Flags::SYN | Flags::ACK));
        assert!(!syn_ack.exactly(Flags::SYN));
        assert!(syn_ack.or_ack(Flags::SYN));
        assert!(Flags::SYN.or_ack(Flags::SYN));
        assert!(!Flags::FIN.or_ack(Flags::SYN));
        assert!(Flags::default().is_empty());
        assert!(!Flags::PSH.is_empty());
    }
}
