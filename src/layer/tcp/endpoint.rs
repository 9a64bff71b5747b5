use core::fmt;

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::vec;
use alloc::vec::Vec;

use crate::layer::Error;
use crate::time::Instant;
use crate::wire::{self, Ipv4Address, TcpChecksum, TcpFlags, TcpPacket, TcpRepr, TcpSeqNumber};

use super::connection::Connection;
use super::isn::IsnGenerator;
use super::mss;

/// The four-tuple keying a connection.
///
/// Lookups are exact: listening is a property of the local port, tracked
/// separately, not a wildcard entry in the connection map.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FourTuple {
    /// Our address, the destination of arriving segments.
    pub local: Ipv4Address,
    /// The peer's address.
    pub remote: Ipv4Address,
    /// Our port.
    pub local_port: u16,
    /// The peer's port.
    pub remote_port: u16,
}

impl fmt::Display for FourTuple {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}<->{}:{}",
               self.local, self.local_port, self.remote, self.remote_port)
    }
}

/// Tunables of the engine.
///
/// Held by the [`Endpoint`] and threaded to the handlers by reference; none
/// of them changes behavior mid-connection.
///
/// [`Endpoint`]: struct.Endpoint.html
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    /// Default receive buffer size for new connections, in octets.
    pub so_rcvbuf: u32,

    /// Default send buffer size for new connections, in octets.
    pub so_sndbuf: u32,

    /// The largest window-scale shift we accept from a peer.
    ///
    /// A peer asking for more gets no scaling at all.
    pub max_window_scale: u8,

    /// The window-scale shift we request for our own receive window.
    pub window_scale: u8,

    /// The local interface MTU the advertised MSS derives from.
    pub mtu: u32,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            so_rcvbuf: 65_535,
            so_sndbuf: 65_535,
            max_window_scale: mss::MAX_WINDOW_SCALE,
            window_scale: 0,
            mtu: 1500,
        }
    }
}

/// An outbound action produced by the engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// A frame to transmit towards the given address.
    Data {
        /// Destination address of the emitted frame.
        dst: Ipv4Address,
        /// The emitted segment, header, options and checksum filled in.
        frame: Vec<u8>,
    },
}

/// Handles TCP connection states.
///
/// The endpoint owns the listener set, the connection map and the initial
/// sequence number source. Its [`handle`] method is the engine's single
/// entry point: one arriving frame in, zero or one reply frames out, with
/// all state mutation in between. The reply is materialized only after the
/// connection map reflects the new state, so an observer seeing the reply
/// can rely on seeing the state it was derived from.
///
/// [`handle`]: #method.handle
pub struct Endpoint {
    listeners: BTreeSet<u16>,
    connections: BTreeMap<FourTuple, Connection>,
    isn_generator: IsnGenerator,
    config: Config,
}

impl Endpoint {
    /// Create an endpoint with no listeners and no connections.
    pub fn new(config: Config, isn_generator: IsnGenerator) -> Endpoint {
        Endpoint {
            listeners: BTreeSet::new(),
            connections: BTreeMap::new(),
            isn_generator,
            config,
        }
    }

    /// The configured tunables.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Open a port for passive opens.
    ///
    /// Returns whether the port was newly opened.
    pub fn listen(&mut self, port: u16) -> bool {
        self.listeners.insert(port)
    }

    /// Stop accepting passive opens on a port.
    ///
    /// Existing connections are unaffected. Returns whether the port had
    /// been listening.
    pub fn unlisten(&mut self, port: u16) -> bool {
        self.listeners.remove(&port)
    }

    /// Query whether a port accepts passive opens.
    pub fn is_listening(&self, port: u16) -> bool {
        self.listeners.contains(&port)
    }

    /// Seed an active open towards a remote.
    ///
    /// The connection starts in syn-sent; emitting the initial SYN is the
    /// transmit path's job. Returns `None` when the tuple is already taken.
    pub fn open(&mut self, tuple: FourTuple, now: Instant) -> Option<&mut Connection> {
        if self.connections.contains_key(&tuple) {
            return None;
        }
        let connection = Connection::open(&self.config, &mut self.isn_generator, now);
        net_trace!("active open {}", tuple);
        self.connections.insert(tuple, connection);
        self.connections.get_mut(&tuple)
    }

    /// Drop a connection without further ceremony.
    ///
    /// This is the teardown path of the timer subsystem and the user's
    /// abort; no segment is produced. Returns whether the connection
    /// existed.
    pub fn abort(&mut self, tuple: FourTuple) -> bool {
        self.connections.remove(&tuple).is_some()
    }

    /// Shared access to a connection.
    pub fn connection(&self, tuple: FourTuple) -> Option<&Connection> {
        self.connections.get(&tuple)
    }

    /// Exclusive access to a connection.
    ///
    /// State is open to inspection and adjustment beyond the transitions the
    /// protocol mandates; tests and diagnostic tooling rely on this.
    pub fn connection_mut(&mut self, tuple: FourTuple) -> Option<&mut Connection> {
        self.connections.get_mut(&tuple)
    }

    /// The number of live connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Process one arriving frame.
    ///
    /// Decodes and validates the segment, routes it to the owning connection
    /// or the no-connection handler, applies the resulting state change and
    /// returns the outbound events. Undecodable or unaddressable input is
    /// dropped without a reply.
    pub fn handle(
        &mut self,
        now: Instant,
        src_addr: Ipv4Address,
        dst_addr: Ipv4Address,
        frame: &[u8],
    ) -> Vec<Event> {
        let seg = match decode_and_validate(src_addr, dst_addr, frame) {
            Ok(seg) => seg,
            Err(error) => {
                net_debug!("segment {} -> {} dropped: {}", src_addr, dst_addr, error);
                return Vec::new();
            }
        };

        let tuple = FourTuple {
            local: dst_addr,
            local_port: seg.dst_port,
            remote: src_addr,
            remote_port: seg.src_port,
        };

        let reply = if let Some(connection) = self.connections.get_mut(&tuple) {
            match connection.arrives(now, &seg, &self.config, tuple) {
                Ok(reply) => reply,
                Err(Error::Drop(reason)) => {
                    net_debug!("{}: segment dropped: {}", tuple, reason);
                    None
                }
                Err(Error::Reset(reason)) => {
                    net_debug!("{}: connection dropped: {}", tuple, reason);
                    self.connections.remove(&tuple);
                    dropwithreset(&seg)
                }
            }
        } else {
            self.handle_noconn(now, tuple, &seg)
        };

        reply
            .map(|reply| Event::Data {
                dst: src_addr,
                frame: emit_frame(dst_addr, src_addr, &reply),
            })
            .into_iter()
            .collect()
    }

    /// Judge a segment that matches no connection.
    ///
    /// A clean SYN to a listening port creates a connection in syn-received
    /// and answers with a SYN-ACK; everything else earns a stateless reset.
    fn handle_noconn(
        &mut self,
        now: Instant,
        tuple: FourTuple,
        seg: &TcpRepr,
    ) -> Option<TcpRepr> {
        if self.listeners.contains(&tuple.local_port) && seg.flags.exactly(TcpFlags::SYN) {
            let connection =
                Connection::from_syn(&self.config, &mut self.isn_generator, now, seg);
            let reply = connection.make_syn_ack(tuple);
            net_trace!("passive open {}", tuple);
            self.connections.insert(tuple, connection);
            Some(reply)
        } else {
            net_debug!("{}: no connection, answering with reset", tuple);
            dropwithreset(seg)
        }
    }
}

/// Build the stateless reset answering an unwanted segment.
///
/// Returns `None` when the offending segment itself carried RST: a reset is
/// never answered with a reset. Otherwise the reply either continues the
/// peer's own acknowledgement (when the segment carried one) or acknowledges
/// the full sequence space the segment occupied, so the peer can correlate
/// it.
pub fn dropwithreset(seg: &TcpRepr) -> Option<TcpRepr> {
    if seg.flags.rst() {
        return None;
    }

    Some(if seg.flags.ack() {
        TcpRepr {
            src_port: seg.dst_port,
            dst_port: seg.src_port,
            flags: TcpFlags::RST,
            seq_number: seg.ack_number.unwrap_or_default(),
            ack_number: None,
            window_len: 0,
            window_scale: None,
            max_seg_size: None,
            payload_len: 0,
        }
    } else {
        TcpRepr {
            src_port: seg.dst_port,
            dst_port: seg.src_port,
            flags: TcpFlags::RST,
            seq_number: TcpSeqNumber(0),
            ack_number: Some(seg.seq_number + seg.sequence_len()),
            window_len: 0,
            window_scale: None,
            max_seg_size: None,
            payload_len: 0,
        }
    })
}

/// Decode one frame into a segment representation, rejecting what no
/// connection could ever accept.
///
/// Structural parsing and the checksum live in the wire layer; the address
/// validation on top rejects martians, since broadcast, multicast and
/// unspecified addresses can not take part in a connection.
fn decode_and_validate(
    src_addr: Ipv4Address,
    dst_addr: Ipv4Address,
    frame: &[u8],
) -> wire::Result<TcpRepr> {
    if !src_addr.is_unicast() || !dst_addr.is_unicast() {
        return Err(wire::Error::Unaddressable);
    }
    TcpRepr::parse(frame, TcpChecksum::Manual { src_addr, dst_addr })
}

/// Materialize a reply representation into a checksummed frame.
fn emit_frame(local: Ipv4Address, remote: Ipv4Address, repr: &TcpRepr) -> Vec<u8> {
    let mut buffer = vec![0; repr.buffer_len()];
    {
        let mut packet = TcpPacket::new_unchecked(&mut buffer, *repr);
        repr.emit(&mut packet);
        packet.fill_checksum(local, remote);
    }
    buffer
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::connection::State;

    const LOCAL: Ipv4Address = Ipv4Address([192, 168, 1, 1]);
    const REMOTE: Ipv4Address = Ipv4Address([192, 168, 1, 2]);

    fn tuple() -> FourTuple {
        FourTuple {
            local: LOCAL,
            remote: REMOTE,
            local_port: 80,
            remote_port: 49500,
        }
    }

    fn endpoint() -> Endpoint {
        Endpoint::new(Config::default(), IsnGenerator::from_seed(0x1234_5678))
    }

    #[test]
    fn listener_set() {
        let mut endpoint = endpoint();
        assert!(endpoint.listen(80));
        assert!(!endpoint.listen(80));
        assert!(endpoint.is_listening(80));
        assert!(endpoint.unlisten(80));
        assert!(!endpoint.is_listening(80));
    }

    #[test]
    fn active_open_seeds_syn_sent() {
        let mut endpoint = endpoint();
        let now = Instant::from_millis(10);
        let connection = endpoint.open(tuple(), now).unwrap();
        assert_eq!(connection.state, State::SynSent);
        let cb = connection.control;
        assert_eq!(cb.snd_una, cb.iss);
        assert_eq!(cb.snd_nxt, cb.iss + 1);
        assert_eq!(cb.snd_max, cb.iss + 1);
        assert!(cb.tt_rexmt.is_some());
        assert!(cb.tt_conn_est.is_some());
        assert_eq!(cb.t_rttseg, Some((now, cb.iss)));

        // The tuple is taken now.
        assert!(endpoint.open(tuple(), now).is_none());
        assert!(endpoint.abort(tuple()));
        assert!(!endpoint.abort(tuple()));
    }

    #[test]
    fn reset_reply_shape() {
        let seg = TcpRepr {
            src_port: 49500,
            dst_port: 80,
            flags: TcpFlags::ACK,
            seq_number: TcpSeqNumber(5),
            ack_number: Some(TcpSeqNumber(9)),
            window_len: 0,
            window_scale: None,
            max_seg_size: None,
            payload_len: 0,
        };
        let reply = dropwithreset(&seg).unwrap();
        assert!(reply.flags.rst());
        assert_eq!(reply.seq_number, TcpSeqNumber(9));
        assert_eq!(reply.ack_number, None);
        assert_eq!(reply.src_port, 80);
        assert_eq!(reply.dst_port, 49500);

        let mut syn = seg;
        syn.flags = TcpFlags::SYN;
        syn.ack_number = None;
        let reply = dropwithreset(&syn).unwrap();
        assert_eq!(reply.seq_number, TcpSeqNumber(0));
        // A SYN occupies one sequence number.
        assert_eq!(reply.ack_number, Some(TcpSeqNumber(6)));

        let mut rst = seg;
        rst.flags = TcpFlags::RST;
        assert_eq!(dropwithreset(&rst), None);
    }
}
