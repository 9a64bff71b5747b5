//! Per-connection state and the segment delivery pipeline.
use core::cmp;

use crate::layer::{Error, Result};
use crate::time::{Duration, Instant};
use crate::wire::{TcpFlags, TcpRepr, TcpSeqNumber};

use super::endpoint::{Config, FourTuple};
use super::isn::IsnGenerator;
use super::mss;

/// The state of a connection.
///
/// Includes the current state machine state, the configuration state that is
/// required to stay constant during a connection, and the buffer accounting.
#[derive(Clone, Copy, Debug, Hash)]
pub struct Connection {
    /// The control block proper: sequence bookkeeping, windows, timers.
    pub control: ControlBlock,

    /// The current state of the state machine.
    pub state: State,

    /// Size of the receive buffer backing this connection, in octets.
    pub rcvbufsize: u32,

    /// Size of the send buffer backing this connection, in octets.
    pub sndbufsize: u32,

    /// Whether a FIN has ever been received on this connection.
    ///
    /// Sticky: once the peer closed its direction no further stream data can
    /// arrive, whatever state the close dance is in.
    pub cantrcvmore: bool,
}

/// The per-connection parameter record.
///
/// Field names follow the classic control block so that the invariants read
/// the way the protocol literature writes them: `snd_una ≤ snd_nxt ≤ snd_max`
/// in modular order on the send side, `rcv_adv ≥ rcv_nxt + rcv_wnd` after a
/// right-edge update on the receive side.
#[derive(Clone, Copy, Debug, Hash)]
pub struct ControlBlock {
    /// The initial send sequence number, set once at connection genesis.
    pub iss: TcpSeqNumber,

    /// The initial receive sequence number, set once when the peer's SYN
    /// arrives.
    pub irs: TcpSeqNumber,

    /// The oldest unacknowledged sequence number.
    ///
    /// In RFC 793 this is referred to as `SND.UNA`.
    pub snd_una: TcpSeqNumber,

    /// The next sequence number to use for transmission.
    ///
    /// In RFC 793 this is referred to as `SND.NXT`.
    pub snd_nxt: TcpSeqNumber,

    /// The highest sequence number ever sent.
    ///
    /// Trails `snd_nxt` only while retransmitting.
    pub snd_max: TcpSeqNumber,

    /// Sequence number of the segment that last updated the send window.
    pub snd_wl1: TcpSeqNumber,

    /// Acknowledgement number of the segment that last updated the send
    /// window.
    pub snd_wl2: TcpSeqNumber,

    /// The congestion window, in octets.
    ///
    /// Recorded for the output side; this engine performs no congestion
    /// control of its own.
    pub snd_cwnd: u32,

    /// The effective maximum segment size for this connection.
    pub t_maxseg: u16,

    /// The maximum segment size we advertised, derived from the local MTU.
    pub t_advmss: u16,

    /// The next expected sequence number.
    ///
    /// In RFC 793 this is referred to as `RCV.NXT`.
    pub rcv_nxt: TcpSeqNumber,

    /// The currently offered receive window, in octets.
    pub rcv_wnd: u32,

    /// The highest advertised right window edge, `rcv_nxt + window` as of the
    /// most recent advertisement.
    pub rcv_adv: TcpSeqNumber,

    /// The shift applied to window fields we receive.
    pub rcv_scale: u8,

    /// The shift applied to window fields we send.
    pub snd_scale: u8,

    /// The receive shift we asked for in our SYN.
    ///
    /// Becomes `rcv_scale` once the peer agrees to scale at all.
    pub request_r_scale: u8,

    /// Whether window scaling is in effect on this connection.
    pub tf_doing_ws: bool,

    /// Whether the most recent window advertisement was zero.
    pub tf_rxwin0sent: bool,

    /// The sequence number acknowledged by our most recent outbound ACK.
    pub last_ack_sent: TcpSeqNumber,

    /// The retransmit timer, when armed.
    pub tt_rexmt: Option<Timer>,

    /// The connection establishment timer, when armed.
    pub tt_conn_est: Option<Timer>,

    /// The delayed-ACK timer, when armed.
    pub tt_delack: Option<Timer>,

    /// The time of last activity on this connection.
    pub t_idletime: Instant,

    /// The segment currently being timed for a round-trip sample: the time
    /// it was sent and the sequence number an acknowledgement must pass.
    pub t_rttseg: Option<(Instant, TcpSeqNumber)>,

    /// The round-trip estimator fed by `t_rttseg` samples.
    pub t_rttinf: RttEstimate,

    /// Count of transient errors since the last successful sample.
    pub t_softerror: u32,
}

/// State enum of the state machine.
///
/// Two states of the classic diagram are deliberately absent: `Closed` is
/// represented by absence from the connection map, and `Listen` by membership
/// of the local port in the listener set. Only fully keyed connections carry
/// a state value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum State {
    /// An open connection request.
    SynSent,

    /// Connection request we intend to answer, waiting on the final ACK.
    SynReceived,

    /// An open connection.
    Established,

    /// Closed our side of the connection.
    FinWait1,

    /// Our close was acknowledged, the peer side is still open.
    FinWait2,

    /// Both sides closed but we do not know the other knows.
    Closing,

    /// Both sides recognized the connection as closed.
    TimeWait,

    /// The other side closed its direction.
    CloseWait,

    /// Connection closed after the other side closed its already.
    LastAck,
}

/// The subsystem a timer handle belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Retransmission of unacknowledged data.
    Retransmit,

    /// A pending delayed acknowledgement.
    DelayedAck,

    /// The handshake completion deadline.
    ConnectionEstablish,
}

/// An armed timer handle.
///
/// The engine only arms and clears these; observing expiry belongs to the
/// timer subsystem that consumes the control block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Timer {
    /// Which deadline this handle tracks.
    pub kind: TimerKind,

    /// When the timer was armed.
    pub armed_at: Instant,

    /// Position in the backoff schedule, starting at zero.
    pub shift: u8,
}

impl Timer {
    /// Arm a timer of the given kind at position `shift` of the backoff
    /// schedule.
    pub fn new(now: Instant, kind: TimerKind, shift: u8) -> Timer {
        Timer { kind, armed_at: now, shift }
    }

    /// The backoff multiplier the shift selects.
    pub fn backoff(&self) -> u32 {
        let index = cmp::min(usize::from(self.shift), mss::BACKOFF.len() - 1);
        mss::BACKOFF[index]
    }
}

/// Round-trip estimator state.
///
/// Smoothed mean and variance per RFC 6298, kept in milliseconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct RttEstimate {
    /// Smoothed round-trip time; `None` before the first sample.
    pub srtt: Option<i64>,

    /// Round-trip time variance.
    pub rttvar: i64,
}

impl RttEstimate {
    /// Fold a measured round-trip into the estimate.
    pub fn sample(&mut self, rtt: Duration) {
        let millis = rtt.as_millis() as i64;
        match self.srtt {
            None => {
                self.srtt = Some(millis);
                self.rttvar = millis / 2;
            }
            Some(srtt) => {
                self.rttvar = (3 * self.rttvar + (srtt - millis).abs()) / 4;
                self.srtt = Some((7 * srtt + millis) / 8);
            }
        }
    }

    /// The retransmission timeout the current estimate yields.
    pub fn retransmission_timeout(&self) -> Duration {
        match self.srtt {
            None => Duration::from_millis(3000),
            Some(srtt) => {
                let rto = srtt + cmp::max(1, 4 * self.rttvar);
                Duration::from_millis(cmp::max(rto, 200) as u64)
            }
        }
    }
}

impl ControlBlock {
    /// A zeroed control block, before genesis fills it in.
    fn initial(now: Instant) -> ControlBlock {
        ControlBlock {
            iss: TcpSeqNumber::default(),
            irs: TcpSeqNumber::default(),
            snd_una: TcpSeqNumber::default(),
            snd_nxt: TcpSeqNumber::default(),
            snd_max: TcpSeqNumber::default(),
            snd_wl1: TcpSeqNumber::default(),
            snd_wl2: TcpSeqNumber::default(),
            snd_cwnd: 0,
            t_maxseg: mss::DEFAULT_MSS,
            t_advmss: mss::DEFAULT_MSS,
            rcv_nxt: TcpSeqNumber::default(),
            rcv_wnd: 0,
            rcv_adv: TcpSeqNumber::default(),
            rcv_scale: 0,
            snd_scale: 0,
            request_r_scale: 0,
            tf_doing_ws: false,
            tf_rxwin0sent: false,
            last_ack_sent: TcpSeqNumber::default(),
            tt_rexmt: None,
            tt_conn_est: None,
            tt_delack: None,
            t_idletime: now,
            t_rttseg: None,
            t_rttinf: RttEstimate::default(),
            t_softerror: 0,
        }
    }

    /// Acceptance check of a segment against the receive window.
    ///
    /// A zero-length segment against a zero window must probe exactly at the
    /// left edge; a zero-length segment against an open window must fall
    /// inside it; data against a zero window is never acceptable; data
    /// against an open window is acceptable when its first or its last octet
    /// falls inside the window. All comparisons are modular.
    pub fn in_window(&self, seq: TcpSeqNumber, len: usize) -> bool {
        let wnd = self.rcv_wnd as usize;
        match (len == 0, self.rcv_wnd == 0) {
            (true, true) => seq == self.rcv_nxt,
            (true, false) =>
                self.rcv_nxt <= seq && seq < self.rcv_nxt + wnd,
            (false, true) => false,
            (false, false) => {
                let last = seq + (len - 1);
                let end = self.rcv_nxt + wnd;
                (self.rcv_nxt <= seq && seq < end)
                    || (self.rcv_nxt <= last && last < end)
            }
        }
    }
}

impl Connection {
    /// Create a connection answering a SYN on a listening port.
    ///
    /// The caller has verified the segment to be exactly a SYN directed at a
    /// listening port; this fills in the control block for `SynReceived` and
    /// draws one initial sequence number. The SYN-ACK reply is built
    /// separately through [`make_syn_ack`].
    ///
    /// [`make_syn_ack`]: #method.make_syn_ack
    pub(crate) fn from_syn(
        cfg: &Config,
        isn: &mut IsnGenerator,
        now: Instant,
        seg: &TcpRepr,
    ) -> Connection {
        debug_assert!(seg.flags.exactly(TcpFlags::SYN));

        let advmss = mss::advertised_mss(cfg);
        let sizes = mss::buffer_sizes(
            advmss, seg.max_seg_size, None, cfg.so_rcvbuf, cfg.so_sndbuf);
        let rcv_wnd = sizes.rcvbuf;

        // A peer advertising a shift beyond what we accept gets no scaling
        // at all rather than a clamped shift.
        let (doing_ws, snd_scale, request_r_scale) = match seg.window_scale {
            Some(scale) if scale <= cfg.max_window_scale =>
                (true, scale, cfg.window_scale),
            _ => (false, 0, 0),
        };

        let iss = TcpSeqNumber(isn.next_u32() as i32);
        let ack = seg.seq_number + 1;

        let mut cb = ControlBlock::initial(now);
        cb.iss = iss;
        cb.irs = seg.seq_number;
        cb.snd_una = iss;
        cb.snd_nxt = iss + 1;
        cb.snd_max = iss + 1;
        cb.rcv_nxt = ack;
        cb.last_ack_sent = ack;
        cb.rcv_wnd = rcv_wnd;
        cb.rcv_adv = ack + rcv_wnd as usize;
        cb.tf_rxwin0sent = rcv_wnd == 0;
        cb.tf_doing_ws = doing_ws;
        cb.snd_scale = snd_scale;
        cb.request_r_scale = request_r_scale;
        cb.rcv_scale = request_r_scale;
        cb.t_advmss = advmss;
        cb.t_maxseg = sizes.maxseg;
        cb.snd_cwnd = sizes.cwnd;
        cb.tt_rexmt = Some(Timer::new(now, TimerKind::Retransmit, 0));
        cb.t_rttseg = Some((now, iss));

        Connection {
            control: cb,
            state: State::SynReceived,
            rcvbufsize: sizes.rcvbuf,
            sndbufsize: sizes.sndbuf,
            cantrcvmore: false,
        }
    }

    /// Seed a connection for an active open.
    ///
    /// The connection starts in `SynSent`; emitting the initial SYN is the
    /// transmit path's job.
    pub(crate) fn open(cfg: &Config, isn: &mut IsnGenerator, now: Instant) -> Connection {
        let advmss = mss::advertised_mss(cfg);
        let sizes = mss::buffer_sizes(advmss, None, None, cfg.so_rcvbuf, cfg.so_sndbuf);
        let iss = TcpSeqNumber(isn.next_u32() as i32);

        let mut cb = ControlBlock::initial(now);
        cb.iss = iss;
        cb.snd_una = iss;
        cb.snd_nxt = iss + 1;
        cb.snd_max = iss + 1;
        cb.rcv_wnd = sizes.rcvbuf;
        cb.request_r_scale = cfg.window_scale;
        cb.t_advmss = advmss;
        cb.t_maxseg = sizes.maxseg;
        cb.snd_cwnd = sizes.cwnd;
        cb.tt_rexmt = Some(Timer::new(now, TimerKind::Retransmit, 0));
        cb.tt_conn_est = Some(Timer::new(now, TimerKind::ConnectionEstablish, 0));
        cb.t_rttseg = Some((now, iss));

        Connection {
            control: cb,
            state: State::SynSent,
            rcvbufsize: sizes.rcvbuf,
            sndbufsize: sizes.sndbuf,
            cantrcvmore: false,
        }
    }

    /// Apply an arriving segment to this connection.
    ///
    /// Returns the reply to emit, if any. An `Err` leaves the segment's
    /// disposition to the router: `Drop` changes nothing, `Reset` removes
    /// the connection and answers through the stateless reset path.
    pub fn arrives(
        &mut self,
        now: Instant,
        seg: &TcpRepr,
        cfg: &Config,
        tuple: FourTuple,
    ) -> Result<Option<TcpRepr>> {
        match self.state {
            State::SynSent => self.syn_sent_input(now, seg, cfg, tuple),
            State::SynReceived => self.complete_passive_open(seg),
            _ => {
                if !self.control.in_window(seg.seq_number, usize::from(seg.payload_len)) {
                    return Err(Error::Drop("segment outside the receive window"));
                }
                let rst = seg.flags.or_ack(TcpFlags::RST);
                let syn = seg.flags.or_ack(TcpFlags::SYN);
                match (rst, syn) {
                    (true, true) =>
                        unreachable!("one flag set cannot be exactly RST and exactly SYN"),
                    (true, false) => self.reset_input(seg, tuple),
                    // A SYN inside the window of a synchronized connection
                    // earns a challenge ACK and changes nothing (RFC 5961).
                    (false, true) => Ok(Some(self.make_ack(false, tuple))),
                    (false, false) => self.established_input(seg, tuple),
                }
            }
        }
    }

    /// Dispatch a segment arriving in `SynSent`.
    fn syn_sent_input(
        &mut self,
        now: Instant,
        seg: &TcpRepr,
        cfg: &Config,
        tuple: FourTuple,
    ) -> Result<Option<TcpRepr>> {
        let syn_ack = seg.flags.exactly(TcpFlags::SYN | TcpFlags::ACK);
        let syn_only = seg.flags.exactly(TcpFlags::SYN);
        match (syn_ack, syn_only) {
            (true, true) =>
                unreachable!("one flag set cannot both carry and lack ACK"),
            (true, false) => self.complete_active_open(now, seg, cfg, tuple),
            (false, true) => {
                // Simultaneous open: both ends sent a SYN. Unsupported; the
                // conservative answer is to ignore the segment and let the
                // peer's retransmission sort the race out.
                net_debug!("simultaneous open attempt ignored");
                Err(Error::Drop("simultaneous open is not supported"))
            }
            (false, false) => {
                if seg.flags.exactly(TcpFlags::RST | TcpFlags::ACK)
                    && seg.ack_number == Some(self.control.snd_nxt)
                {
                    // A reset acknowledging our SYN refuses the connection.
                    // The reset reply path never answers a reset, so the
                    // teardown stays quiet.
                    Err(Error::Reset("connection refused"))
                } else {
                    Err(Error::Drop("stale segment while in syn-sent"))
                }
            }
        }
    }

    /// Complete an active open from a well-formed SYN-ACK.
    fn complete_active_open(
        &mut self,
        now: Instant,
        seg: &TcpRepr,
        cfg: &Config,
        tuple: FourTuple,
    ) -> Result<Option<TcpRepr>> {
        let ack = match seg.ack_number {
            Some(ack) if ack == self.control.snd_nxt => ack,
            _ => return Err(Error::Drop("acknowledgement does not cover our syn")),
        };

        // The peer answered with a scale of its own exactly when it accepted
        // scaling; otherwise the option is dead for this connection.
        match seg.window_scale {
            Some(scale) => {
                self.control.tf_doing_ws = true;
                self.control.rcv_scale = self.control.request_r_scale;
                self.control.snd_scale = scale;
            }
            None => {
                self.control.tf_doing_ws = false;
                self.control.rcv_scale = 0;
                self.control.snd_scale = 0;
            }
        }

        let sizes = mss::buffer_sizes(
            self.control.t_advmss, seg.max_seg_size, None,
            cfg.so_rcvbuf, cfg.so_sndbuf);
        self.rcvbufsize = sizes.rcvbuf;
        self.sndbufsize = sizes.sndbuf;
        self.control.t_maxseg = sizes.maxseg;
        self.control.snd_cwnd = sizes.cwnd;
        self.control.rcv_wnd =
            mss::bsd_receive_window(self.rcvbufsize, self.control.rcv_scale);

        // The SYN we timed is acknowledged; feed the estimator.
        if let Some((started, timed_seq)) = self.control.t_rttseg {
            if ack > timed_seq {
                self.control.t_rttinf.sample(now - started);
                self.control.t_softerror = 0;
                self.control.t_rttseg = None;
            }
        }
        if ack == self.control.snd_max {
            self.control.tt_rexmt = None;
        }

        self.control.rcv_nxt = seg.seq_number + 1;
        self.control.t_idletime = now;
        self.control.tt_conn_est = None;
        self.control.tt_delack = None;
        self.control.snd_una = self.control.iss + 1;
        self.control.snd_wl1 = seg.seq_number + 1;
        self.control.snd_wl2 = ack;
        self.control.irs = seg.seq_number;
        self.control.last_ack_sent = self.control.rcv_nxt;
        let advertised = cmp::min(
            self.control.rcv_wnd >> self.control.rcv_scale,
            mss::MAX_WINDOW) << self.control.rcv_scale;
        self.control.rcv_adv = self.control.rcv_nxt + advertised as usize;
        self.control.tf_rxwin0sent = self.control.rcv_wnd == 0;

        net_trace!("syn-sent -> established");
        self.state = State::Established;
        Ok(Some(self.make_ack(false, tuple)))
    }

    /// Complete a passive open from the handshake's final ACK.
    fn complete_passive_open(&mut self, seg: &TcpRepr) -> Result<Option<TcpRepr>> {
        if seg.seq_number != self.control.rcv_nxt {
            return Err(Error::Drop("sequence number does not continue the handshake"));
        }
        if !seg.flags.exactly(TcpFlags::ACK) {
            return Err(Error::Reset("expected the bare handshake acknowledgement"));
        }
        let ack = match seg.ack_number {
            Some(ack) if ack == self.control.snd_nxt => ack,
            _ => return Err(Error::Reset("acknowledgement does not cover our syn-ack")),
        };

        self.control.snd_una = ack;
        self.control.snd_wl1 = seg.seq_number;
        self.control.snd_wl2 = ack;
        net_trace!("syn-received -> established");
        self.state = State::Established;
        Ok(None)
    }

    /// The data-transfer pipeline for every synchronized state.
    ///
    /// The caller has already established window containment and that the
    /// segment carries neither SYN nor RST alone or with ACK; what remains
    /// is the flag-shape gate, acknowledgement processing, in-order data,
    /// and the close-related state transition.
    fn established_input(
        &mut self,
        seg: &TcpRepr,
        tuple: FourTuple,
    ) -> Result<Option<TcpRepr>> {
        if seg.flags.syn() || seg.flags.rst() || seg.flags.urg() {
            return Err(Error::Reset("illegal flag combination on a synchronized connection"));
        }

        // A window reopening matters to the output side: a sender idled by a
        // zero window needs a kick to resume.
        if self.control.rcv_wnd == 0 && seg.window_len > 0 {
            net_trace!("peer window reopened to {}", seg.window_len);
        }

        let mut fin_acked = false;
        if let Some(ack) = seg.ack_number {
            self.control.snd_una = self.control.snd_una.max(ack);
            fin_acked = ack == self.control.snd_nxt + 1;
        }

        let old_rcv_nxt = self.control.rcv_nxt;
        let mut rcvd_fin = false;
        if seg.seq_number == self.control.rcv_nxt {
            if seg.payload_len > 0 {
                // In-order payload; consuming it is the receive buffer's
                // business, the engine only advances the window edge.
                net_trace!("{} octets in order at {}", seg.payload_len, seg.seq_number);
            }
            let nxt = seg.seq_number + usize::from(seg.payload_len);
            self.control.rcv_nxt = if seg.flags.fin() {
                rcvd_fin = true;
                nxt + 1
            } else {
                nxt
            };
        } else {
            // There is no reassembly queue: anything that does not start at
            // the left window edge is discarded and must be retransmitted.
            net_debug!("out-of-order segment at {} discarded", seg.seq_number);
        }
        let ack_needed = self.control.rcv_nxt > old_rcv_nxt;
        // The peer window is recorded unscaled, exactly as carried in the
        // header.
        self.control.rcv_wnd = u32::from(seg.window_len);

        if rcvd_fin {
            self.cantrcvmore = true;
        }
        let next = transition(self.state, rcvd_fin, fin_acked);
        if next != self.state {
            net_trace!("{:?} -> {:?}", self.state, next);
            self.state = next;
        }

        if ack_needed {
            self.note_ack_sent();
            // Entering close-wait acknowledges the peer's FIN; our own FIN
            // stays with the close path.
            Ok(Some(self.make_ack(false, tuple)))
        } else {
            Ok(None)
        }
    }

    /// Judge an in-window reset (RFC 5961).
    fn reset_input(&mut self, seg: &TcpRepr, tuple: FourTuple) -> Result<Option<TcpRepr>> {
        if seg.seq_number == self.control.rcv_nxt {
            Err(Error::Reset("connection reset by peer"))
        } else {
            // In the window but not exactly at the left edge: challenge it
            // and change nothing, a blind attacker learns nothing either.
            net_debug!("reset at {} != {} challenged", seg.seq_number, self.control.rcv_nxt);
            Ok(Some(self.make_ack(false, tuple)))
        }
    }

    /// Build the SYN-ACK answering a passive open.
    ///
    /// Pure with respect to the control block; the advertisement bookkeeping
    /// was recorded at genesis.
    pub fn make_syn_ack(&self, tuple: FourTuple) -> TcpRepr {
        let cb = &self.control;
        TcpRepr {
            src_port: tuple.local_port,
            dst_port: tuple.remote_port,
            flags: TcpFlags::SYN,
            seq_number: cb.iss,
            ack_number: Some(cb.rcv_nxt),
            // The window field of a SYN segment is never scaled.
            window_len: cmp::min(cb.rcv_wnd, u32::from(u16::max_value())) as u16,
            window_scale: if cb.tf_doing_ws { Some(cb.request_r_scale) } else { None },
            max_seg_size: Some(cb.t_advmss),
            payload_len: 0,
        }
    }

    /// Build a bare acknowledgement, optionally carrying our FIN.
    ///
    /// Pure with respect to the control block; call sites that emit the
    /// result account for it through [`note_ack_sent`].
    ///
    /// [`note_ack_sent`]: #method.note_ack_sent
    pub fn make_ack(&self, fin: bool, tuple: FourTuple) -> TcpRepr {
        let cb = &self.control;
        let mut flags = TcpFlags::default();
        flags.set_fin(fin);
        TcpRepr {
            src_port: tuple.local_port,
            dst_port: tuple.remote_port,
            flags,
            seq_number: cb.snd_nxt,
            ack_number: Some(cb.rcv_nxt),
            window_len: cmp::min(cb.rcv_wnd >> cb.rcv_scale, mss::MAX_WINDOW) as u16,
            window_scale: None,
            max_seg_size: None,
            payload_len: 0,
        }
    }

    /// Record the advertisement bookkeeping for an acknowledgement that is
    /// about to be emitted.
    pub fn note_ack_sent(&mut self) {
        let cb = &mut self.control;
        cb.last_ack_sent = cb.rcv_nxt;
        let advertised = cmp::min(cb.rcv_wnd >> cb.rcv_scale, mss::MAX_WINDOW) << cb.rcv_scale;
        cb.rcv_adv = cb.rcv_adv.max(cb.rcv_nxt + advertised as usize);
        cb.tf_rxwin0sent = cb.rcv_wnd == 0;
    }
}

/// The close-dance transition table over `(state, fin received, our FIN
/// acknowledged)`.
///
/// Rows not concerned with closing map to themselves. The handshake states
/// never reach this function; their transitions live in the handshake
/// handlers.
pub(crate) fn transition(state: State, rcvd_fin: bool, ourfinisacked: bool) -> State {
    use self::State::*;
    match (state, rcvd_fin, ourfinisacked) {
        (Established, false, _) => Established,
        (Established, true, _) => CloseWait,
        (CloseWait, _, _) => CloseWait,
        (FinWait1, false, false) => FinWait1,
        (FinWait1, false, true) => FinWait2,
        (FinWait1, true, false) => Closing,
        (FinWait1, true, true) => TimeWait,
        (FinWait2, false, _) => FinWait2,
        (FinWait2, true, _) => TimeWait,
        (Closing, _, false) => Closing,
        (Closing, _, true) => TimeWait,
        // A FIN beyond the one that brought us here changes nothing; close
        // completion belongs to the timer subsystem.
        (LastAck, _, _) => LastAck,
        (TimeWait, _, _) => TimeWait,
        (SynSent, _, _) | (SynReceived, _, _) => state,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window_block() -> ControlBlock {
        let mut cb = ControlBlock::initial(Instant::from_millis(0));
        cb.rcv_nxt = TcpSeqNumber(3000);
        cb.rcv_wnd = 100;
        cb
    }

    #[test]
    fn window_zero_len_zero_wnd() {
        let mut cb = window_block();
        cb.rcv_wnd = 0;
        assert!(cb.in_window(TcpSeqNumber(3000), 0));
        assert!(!cb.in_window(TcpSeqNumber(3001), 0));
        assert!(!cb.in_window(TcpSeqNumber(2999), 0));
    }

    #[test]
    fn window_zero_len_open_wnd() {
        let cb = window_block();
        assert!(cb.in_window(TcpSeqNumber(3000), 0));
        assert!(cb.in_window(TcpSeqNumber(3099), 0));
        assert!(!cb.in_window(TcpSeqNumber(3100), 0));
        assert!(!cb.in_window(TcpSeqNumber(2999), 0));
    }

    #[test]
    fn window_data_zero_wnd() {
        let mut cb = window_block();
        cb.rcv_wnd = 0;
        assert!(!cb.in_window(TcpSeqNumber(3000), 1));
    }

    #[test]
    fn window_data_open_wnd() {
        let cb = window_block();
        // Entirely inside.
        assert!(cb.in_window(TcpSeqNumber(3000), 50));
        // First octet out, last octet in.
        assert!(cb.in_window(TcpSeqNumber(2990), 20));
        // First octet in, last octet out.
        assert!(cb.in_window(TcpSeqNumber(3090), 50));
        // Entirely outside.
        assert!(!cb.in_window(TcpSeqNumber(3100), 20));
        assert!(!cb.in_window(TcpSeqNumber(2900), 50));
    }

    #[test]
    fn window_wraps_around() {
        let mut cb = window_block();
        cb.rcv_nxt = TcpSeqNumber(-50);
        cb.rcv_wnd = 100;
        assert!(cb.in_window(TcpSeqNumber(-50), 60));
        assert!(cb.in_window(TcpSeqNumber(40), 5));
        assert!(!cb.in_window(TcpSeqNumber(50), 5));
    }

    #[test]
    fn transitions_stay_in_the_table() {
        use super::State::*;
        let states = [
            SynSent, SynReceived, Established, FinWait1, FinWait2,
            Closing, TimeWait, CloseWait, LastAck];
        for &state in states.iter() {
            for &fin in [false, true].iter() {
                for &acked in [false, true].iter() {
                    let next = transition(state, fin, acked);
                    assert!(states.contains(&next));
                }
            }
        }
    }

    #[test]
    fn close_dance() {
        use super::State::*;
        assert_eq!(transition(Established, true, false), CloseWait);
        assert_eq!(transition(FinWait1, false, true), FinWait2);
        assert_eq!(transition(FinWait1, true, false), Closing);
        assert_eq!(transition(FinWait1, true, true), TimeWait);
        assert_eq!(transition(FinWait2, true, false), TimeWait);
        assert_eq!(transition(Closing, false, true), TimeWait);
        assert_eq!(transition(LastAck, false, true), LastAck);
    }

    #[test]
    fn rtt_first_and_smoothed_samples() {
        let mut estimate = RttEstimate::default();
        estimate.sample(Duration::from_millis(100));
        assert_eq!(estimate.srtt, Some(100));
        assert_eq!(estimate.rttvar, 50);

        estimate.sample(Duration::from_millis(200));
        // 3/4 * 50 + 1/4 * |100 - 200| = 62; 7/8 * 100 + 1/8 * 200 = 112.
        assert_eq!(estimate.rttvar, 62);
        assert_eq!(estimate.srtt, Some(112));
        assert!(estimate.retransmission_timeout() >= Duration::from_millis(200));
    }

    #[test]
    fn timer_backoff_schedule() {
        let timer = Timer::new(Instant::from_millis(0), TimerKind::Retransmit, 0);
        assert_eq!(timer.backoff(), 1);
        let late = Timer::new(Instant::from_millis(0), TimerKind::Retransmit, 40);
        // Saturates at the end of the schedule.
        assert_eq!(late.backoff(), 64);
    }
}
