//! Segment size and buffer calculations.
//!
//! The handful of derived quantities every connection genesis needs: the
//! maximum segment size we advertise, the effective segment size once the
//! peer has spoken, buffer sizes rounded to whole segments, the initial
//! congestion window and the receive window the scaled advertisement
//! permits.
use core::cmp;

use super::endpoint::Config;

/// The window ceiling of an unscaled advertisement.
pub const MAX_WINDOW: u32 = 65_535;

/// The largest window-scale shift the protocol permits.
pub const MAX_WINDOW_SCALE: u8 = 14;

/// The segment size assumed of a peer that did not advertise one.
pub const DEFAULT_MSS: u16 = 536;

/// Retransmission backoff multipliers; index 0 applies to the initial
/// SYN-ACK retransmit.
pub const BACKOFF: [u32; 13] = [1, 2, 4, 8, 16, 32, 64, 64, 64, 64, 64, 64, 64];

/// An upper bound on buffer growth through segment rounding.
const MAX_BUFFER: u32 = 256 * 1024;

/// Fixed header overhead assumed between the MTU and the payload.
const HEADER_OVERHEAD: u32 = 40;

/// Sizes fixed at connection genesis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BufSizes {
    /// Receive buffer size, in octets.
    pub rcvbuf: u32,
    /// Send buffer size, in octets.
    pub sndbuf: u32,
    /// The effective maximum segment size.
    pub maxseg: u16,
    /// The initial congestion window, in octets.
    pub cwnd: u32,
}

/// The maximum segment size to advertise for a connection.
///
/// Derived from the local MTU less the fixed IP and TCP header overhead,
/// never below the protocol default.
pub fn advertised_mss(config: &Config) -> u16 {
    let payload = config.mtu.saturating_sub(HEADER_OVERHEAD);
    cmp::max(payload, u32::from(DEFAULT_MSS)) as u16
}

/// Fix the segment size, buffer sizes and initial congestion window for a
/// connection.
///
/// The effective segment size is the smaller of what we can carry and what
/// the peer advertised, the protocol default standing in for a silent peer.
/// Buffers are rounded up to whole segments; the initial congestion window
/// follows RFC 3390.
pub fn buffer_sizes(
    advmss: u16,
    peer_mss: Option<u16>,
    _bandwidth_delay: Option<u32>,
    so_rcvbuf: u32,
    so_sndbuf: u32,
) -> BufSizes {
    // A peer advertising something tiny gets the protocol minimum instead;
    // segments below that only fragment time away.
    let peer = cmp::max(peer_mss.unwrap_or(DEFAULT_MSS), 64);
    let maxseg = cmp::min(peer, advmss);

    let rcvbuf = round_to_segments(so_rcvbuf, maxseg);
    let sndbuf = round_to_segments(so_sndbuf, maxseg);

    let seg = u32::from(maxseg);
    let cwnd = cmp::min(4 * seg, cmp::max(2 * seg, 4380));

    BufSizes { rcvbuf, sndbuf, maxseg, cwnd }
}

/// The receive window a connection may offer.
///
/// Bounded by the buffer backing it and by the largest window the negotiated
/// scale can express.
pub fn bsd_receive_window(rcvbufsize: u32, rcv_scale: u8) -> u32 {
    cmp::min(rcvbufsize, MAX_WINDOW << rcv_scale)
}

fn round_to_segments(bufsize: u32, maxseg: u16) -> u32 {
    let seg = u32::from(maxseg);
    let rounded = (bufsize + seg - 1) / seg * seg;
    cmp::min(rounded, MAX_BUFFER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mss_from_mtu() {
        let mut config = Config::default();
        assert_eq!(advertised_mss(&config), 1460);
        config.mtu = 9000;
        assert_eq!(advertised_mss(&config), 8960);
        config.mtu = 300;
        // Never below the protocol default.
        assert_eq!(advertised_mss(&config), DEFAULT_MSS);
    }

    #[test]
    fn segment_size_negotiation() {
        let sizes = buffer_sizes(1460, Some(1200), None, 65_535, 65_535);
        assert_eq!(sizes.maxseg, 1200);
        // A silent peer is assumed at the protocol default.
        let sizes = buffer_sizes(1460, None, None, 65_535, 65_535);
        assert_eq!(sizes.maxseg, DEFAULT_MSS);
        // We never exceed what we can carry ourselves.
        let sizes = buffer_sizes(1460, Some(9000), None, 65_535, 65_535);
        assert_eq!(sizes.maxseg, 1460);
    }

    #[test]
    fn buffers_round_to_whole_segments() {
        let sizes = buffer_sizes(1460, Some(1460), None, 65_535, 32_768);
        assert_eq!(sizes.rcvbuf % 1460, 0);
        assert!(sizes.rcvbuf >= 65_535);
        assert_eq!(sizes.sndbuf % 1460, 0);
        assert!(sizes.sndbuf >= 32_768);
    }

    #[test]
    fn initial_window_follows_rfc3390() {
        assert_eq!(buffer_sizes(1460, Some(1460), None, 65_535, 65_535).cwnd, 4380);
        assert_eq!(buffer_sizes(2190, Some(2190), None, 65_535, 65_535).cwnd, 4380);
        assert_eq!(buffer_sizes(536, Some(536), None, 65_535, 65_535).cwnd, 2144);
    }

    #[test]
    fn receive_window_respects_scale() {
        assert_eq!(bsd_receive_window(1 << 20, 0), MAX_WINDOW);
        assert_eq!(bsd_receive_window(1 << 20, 4), 1 << 20);
        assert_eq!(bsd_receive_window(30_000, 4), 30_000);
    }
}
