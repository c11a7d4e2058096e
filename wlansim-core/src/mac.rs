//! Distributed coordination function of a single node.
//!
//! The MAC never touches the [`Medium`](crate::medium::Medium) or the event
//! queue itself: every entry point records what it wants done as
//! [`MacAction`]s and the [`Simulator`](crate::Simulator) carries them out.

use crate::{
    SimTime,
    defaults::{
        CW_MAX, CW_MIN, DEFAULT_CONTROL_RATE, DEFAULT_DATA_RATE, DEFAULT_QUEUE_LIMIT,
        DEFAULT_RETRY_LIMIT, DIFS, MAX_AMPDU_SUBFRAMES, RTS_THRESHOLD_DISABLED, SIFS, SLOT,
    },
    event::Event,
    frame::{Batch, Frame, FrameKind, Packet, ampdu_subframe_size},
    measure::DataRate,
    node::NodeId,
    stats::MacCounters,
};
use rand_core::Rng;
use std::collections::{HashMap, VecDeque};
use tracing::trace;

/// MAC parameters shared by every node of a medium.
///
/// ```
/// use wlansim_core::MacConfig;
///
/// let config = MacConfig::default()
///     .with_rts_threshold(0)
///     .with_max_ampdu_size(2 * (1472 + 200));
///
/// assert!(config.uses_rts(100));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacConfig {
    /// PSDUs strictly larger than this many bytes are protected by RTS/CTS.
    pub rts_threshold: u64,
    /// Largest A-MPDU in bytes; `0` disables aggregation.
    pub max_ampdu_size: u64,
    pub data_rate: DataRate,
    pub control_rate: DataRate,
    pub queue_limit: usize,
    pub retry_limit: u32,
}

impl MacConfig {
    pub fn with_rts_threshold(mut self, threshold: u64) -> Self {
        self.rts_threshold = threshold;
        self
    }

    pub fn with_max_ampdu_size(mut self, size: u64) -> Self {
        self.max_ampdu_size = size;
        self
    }

    pub fn with_data_rate(mut self, rate: DataRate) -> Self {
        self.data_rate = rate;
        self
    }

    pub fn with_queue_limit(mut self, limit: usize) -> Self {
        self.queue_limit = limit;
        self
    }

    pub fn uses_rts(&self, psdu_size: u64) -> bool {
        psdu_size > self.rts_threshold
    }

    fn airtime(&self, kind: FrameKind) -> SimTime {
        Frame {
            kind,
            transmitter: NodeId::ZERO,
            receiver: NodeId::ZERO,
            nav: SimTime::ZERO,
        }
        .airtime(self)
    }

    fn ack_timeout(&self, ack: FrameKind) -> SimTime {
        SIFS + self.airtime(ack) + SLOT
    }
}

impl Default for MacConfig {
    fn default() -> Self {
        Self {
            rts_threshold: RTS_THRESHOLD_DISABLED,
            max_ampdu_size: 0,
            data_rate: DEFAULT_DATA_RATE,
            control_rate: DEFAULT_CONTROL_RATE,
            queue_limit: DEFAULT_QUEUE_LIMIT,
            retry_limit: DEFAULT_RETRY_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DropReason {
    QueueFull,
    RetryLimit,
}

#[derive(Debug)]
pub(crate) enum MacAction {
    Schedule(SimTime, Event),
    /// Put the frame on the air now.
    Transmit(Frame),
    /// Hand the packet to the node's application layer.
    Deliver(Packet),
    Dropped(Vec<Packet>, DropReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Contending,
    SendingRts,
    AwaitingCts,
    SendingData,
    AwaitingAck,
}

pub(crate) struct Mac {
    id: NodeId,
    /// Where a station sends everything. `None` on the access point.
    uplink: Option<NodeId>,
    config: MacConfig,

    queue: VecDeque<Packet>,
    current: Option<Batch>,
    next_sequence: u64,
    phase: Phase,

    cw: u32,
    backoff: u32,
    retries: u32,
    /// When the pending backoff started counting down.
    countdown: Option<SimTime>,
    access_generation: u64,
    timeout_generation: u64,

    carrier_busy: bool,
    responding: bool,
    idle_since: SimTime,
    nav_until: SimTime,

    last_sequence: HashMap<NodeId, u64>,
    counters: MacCounters,
}

impl Mac {
    pub(crate) fn new<R: Rng>(
        id: NodeId,
        uplink: Option<NodeId>,
        config: MacConfig,
        rng: &mut R,
    ) -> Self {
        Self {
            id,
            uplink,
            config,
            queue: VecDeque::new(),
            current: None,
            next_sequence: 0,
            phase: Phase::Idle,
            cw: CW_MIN,
            backoff: draw_backoff(CW_MIN, rng),
            retries: 0,
            countdown: None,
            access_generation: 0,
            timeout_generation: 0,
            carrier_busy: false,
            responding: false,
            idle_since: SimTime::ZERO,
            nav_until: SimTime::ZERO,
            last_sequence: HashMap::new(),
            counters: MacCounters::default(),
        }
    }

    pub(crate) fn counters(&self) -> MacCounters {
        self.counters
    }

    pub(crate) fn queued(&self) -> usize {
        self.queue.len()
    }

    fn has_work(&self) -> bool {
        self.current.is_some() || !self.queue.is_empty()
    }

    fn next_hop(&self, packet: &Packet) -> NodeId {
        self.uplink.unwrap_or(packet.destination())
    }

    /// Queues a packet for transmission, or drops it if the queue is full.
    pub(crate) fn enqueue(&mut self, packet: Packet, now: SimTime, out: &mut Vec<MacAction>) {
        if self.queue.len() >= self.config.queue_limit {
            self.counters.queue_drops += 1;
            out.push(MacAction::Dropped(vec![packet], DropReason::QueueFull));
            return;
        }
        self.queue.push_back(packet);
        if self.phase == Phase::Idle {
            self.phase = Phase::Contending;
            self.try_access(now, out);
        }
    }

    fn try_access(&mut self, now: SimTime, out: &mut Vec<MacAction>) {
        if self.phase != Phase::Contending
            || self.countdown.is_some()
            || self.carrier_busy
            || self.responding
        {
            return;
        }
        let from = (self.idle_since.max(self.nav_until) + DIFS).max(now);
        let at = from + SLOT * u64::from(self.backoff);
        self.countdown = Some(from);
        self.access_generation += 1;
        out.push(MacAction::Schedule(
            at,
            Event::AccessGranted {
                node: self.id,
                generation: self.access_generation,
            },
        ));
    }

    /// Stops the backoff countdown, keeping the slots already elapsed.
    fn freeze(&mut self, now: SimTime) {
        let Some(from) = self.countdown.take() else {
            return;
        };
        let elapsed = now.saturating_sub(from).as_nanos() / SLOT.as_nanos();
        let elapsed = u32::try_from(elapsed).unwrap_or(u32::MAX);
        self.backoff = self.backoff.saturating_sub(elapsed);
        self.access_generation += 1;
    }

    pub(crate) fn on_medium_busy(&mut self, now: SimTime) {
        self.carrier_busy = true;
        self.freeze(now);
    }

    pub(crate) fn on_medium_idle(&mut self, now: SimTime, out: &mut Vec<MacAction>) {
        self.carrier_busy = false;
        self.idle_since = now;
        self.try_access(now, out);
    }

    /// The backoff of the given generation reached zero.
    pub(crate) fn on_access(&mut self, generation: u64, now: SimTime, out: &mut Vec<MacAction>) {
        if generation != self.access_generation
            || self.countdown.is_none()
            || self.phase != Phase::Contending
        {
            return;
        }
        self.countdown = None;
        self.backoff = 0;
        trace!(node = %self.id, at = %now, "access granted");

        if self.current.is_none() {
            self.current = self.next_batch();
        }
        let Some(data) = self.data_frame() else {
            self.phase = Phase::Idle;
            return;
        };

        if self.config.uses_rts(data.size()) {
            let cts = self.config.airtime(FrameKind::Cts);
            let nav = SIFS + cts + SIFS + data.airtime(&self.config) + data.nav;
            self.phase = Phase::SendingRts;
            out.push(MacAction::Transmit(Frame {
                kind: FrameKind::Rts,
                transmitter: self.id,
                receiver: data.receiver,
                nav,
            }));
        } else {
            self.phase = Phase::SendingData;
            out.push(MacAction::Transmit(data));
        }
    }

    /// The scheduled frame is about to go on the air.
    pub(crate) fn on_transmit(&mut self, frame: &Frame, now: SimTime) {
        if !matches!(frame.kind, FrameKind::Data(_)) {
            self.responding = true;
            self.freeze(now);
        }
    }

    /// The scheduled frame could not go on the air because the node was
    /// already transmitting.
    pub(crate) fn on_transmit_blocked<R: Rng>(
        &mut self,
        frame: &Frame,
        now: SimTime,
        rng: &mut R,
        out: &mut Vec<MacAction>,
    ) {
        if matches!(frame.kind, FrameKind::Data(_)) && self.phase == Phase::SendingData {
            self.fail(now, rng, out);
        }
    }

    /// This node's own frame left the air.
    pub(crate) fn on_tx_end(&mut self, now: SimTime, out: &mut Vec<MacAction>) {
        self.counters.frames_sent += 1;
        if !self.carrier_busy {
            self.idle_since = now;
        }

        if self.responding {
            self.responding = false;
            self.try_access(now, out);
            return;
        }

        let ack = match self.phase {
            Phase::SendingRts => {
                self.phase = Phase::AwaitingCts;
                FrameKind::Cts
            }
            Phase::SendingData => {
                self.phase = Phase::AwaitingAck;
                self.response_kind()
            }
            _ => return,
        };
        self.timeout_generation += 1;
        out.push(MacAction::Schedule(
            now + self.config.ack_timeout(ack),
            Event::Timeout {
                node: self.id,
                generation: self.timeout_generation,
            },
        ));
    }

    pub(crate) fn on_corrupted(&mut self) {
        self.counters.collisions += 1;
    }

    /// A frame was decoded intact.
    pub(crate) fn on_receive<R: Rng>(
        &mut self,
        frame: Frame,
        now: SimTime,
        rng: &mut R,
        out: &mut Vec<MacAction>,
    ) {
        self.counters.frames_received += 1;

        if frame.receiver != self.id {
            self.nav_until = self.nav_until.max(now + frame.nav);
            return;
        }

        match frame.kind {
            FrameKind::Rts => {
                if self.nav_until > now {
                    trace!(node = %self.id, "RTS ignored, NAV set");
                    return;
                }
                let nav = frame
                    .nav
                    .saturating_sub(SIFS + self.config.airtime(FrameKind::Cts));
                self.respond(FrameKind::Cts, frame.transmitter, nav, now, out);
            }
            FrameKind::Cts => {
                let expected = self.current.as_ref().map(|batch| batch.next_hop);
                if self.phase != Phase::AwaitingCts || expected != Some(frame.transmitter) {
                    return;
                }
                self.timeout_generation += 1;
                if let Some(data) = self.data_frame() {
                    self.phase = Phase::SendingData;
                    out.push(MacAction::Schedule(
                        now + SIFS,
                        Event::Transmit {
                            node: self.id,
                            frame: data,
                        },
                    ));
                }
            }
            FrameKind::Data(batch) => {
                let ack = if batch.is_aggregate() {
                    FrameKind::BlockAck
                } else {
                    FrameKind::Ack
                };
                self.respond(ack, frame.transmitter, SimTime::ZERO, now, out);

                if self.last_sequence.get(&frame.transmitter) == Some(&batch.sequence) {
                    trace!(node = %self.id, from = %frame.transmitter, "duplicate discarded");
                    return;
                }
                self.last_sequence.insert(frame.transmitter, batch.sequence);

                for packet in batch.packets {
                    if packet.destination() == self.id {
                        out.push(MacAction::Deliver(packet));
                    } else if self.uplink.is_none() {
                        self.enqueue(packet, now, out);
                    }
                }
            }
            FrameKind::Ack | FrameKind::BlockAck => {
                if self.phase == Phase::AwaitingAck {
                    self.succeed(now, rng, out);
                }
            }
        }
    }

    /// The CTS or ACK of the given generation never came.
    pub(crate) fn on_timeout<R: Rng>(
        &mut self,
        generation: u64,
        now: SimTime,
        rng: &mut R,
        out: &mut Vec<MacAction>,
    ) {
        if generation != self.timeout_generation
            || !matches!(self.phase, Phase::AwaitingCts | Phase::AwaitingAck)
        {
            return;
        }
        self.fail(now, rng, out);
    }

    fn respond(
        &mut self,
        kind: FrameKind,
        to: NodeId,
        nav: SimTime,
        now: SimTime,
        out: &mut Vec<MacAction>,
    ) {
        out.push(MacAction::Schedule(
            now + SIFS,
            Event::Transmit {
                node: self.id,
                frame: Frame {
                    kind,
                    transmitter: self.id,
                    receiver: to,
                    nav,
                },
            },
        ));
    }

    fn succeed<R: Rng>(&mut self, now: SimTime, rng: &mut R, out: &mut Vec<MacAction>) {
        self.timeout_generation += 1;
        self.current = None;
        self.retries = 0;
        self.cw = CW_MIN;
        self.restart(now, rng, out);
    }

    fn fail<R: Rng>(&mut self, now: SimTime, rng: &mut R, out: &mut Vec<MacAction>) {
        self.timeout_generation += 1;
        self.retries += 1;
        self.counters.retries += 1;

        if self.retries > self.config.retry_limit {
            if let Some(batch) = self.current.take() {
                trace!(node = %self.id, seq = batch.sequence, "retry limit reached");
                self.counters.retry_drops += batch.packets.len() as u64;
                out.push(MacAction::Dropped(batch.packets, DropReason::RetryLimit));
            }
            self.retries = 0;
            self.cw = CW_MIN;
        } else {
            self.cw = (self.cw * 2 + 1).min(CW_MAX);
        }
        self.restart(now, rng, out);
    }

    fn restart<R: Rng>(&mut self, now: SimTime, rng: &mut R, out: &mut Vec<MacAction>) {
        self.backoff = draw_backoff(self.cw, rng);
        self.phase = if self.has_work() {
            Phase::Contending
        } else {
            Phase::Idle
        };
        self.try_access(now, out);
    }

    fn response_kind(&self) -> FrameKind {
        match &self.current {
            Some(batch) if batch.is_aggregate() => FrameKind::BlockAck,
            _ => FrameKind::Ack,
        }
    }

    fn data_frame(&self) -> Option<Frame> {
        let batch = self.current.clone()?;
        let ack = self.config.airtime(self.response_kind());
        Some(Frame {
            receiver: batch.next_hop,
            kind: FrameKind::Data(batch),
            transmitter: self.id,
            nav: SIFS + ack,
        })
    }

    /// Takes the head of the queue plus every later packet for the same
    /// next hop that still fits in the A-MPDU.
    fn next_batch(&mut self) -> Option<Batch> {
        let first = self.queue.pop_front()?;
        let next_hop = self.next_hop(&first);
        let max = self.config.max_ampdu_size;

        let mut size = ampdu_subframe_size(first.mpdu_size());
        let mut packets = vec![first];
        let mut i = 0;
        while max > 0 && packets.len() < MAX_AMPDU_SUBFRAMES && i < self.queue.len() {
            let packet = &self.queue[i];
            if self.next_hop(packet) != next_hop {
                i += 1;
                continue;
            }
            let subframe = ampdu_subframe_size(packet.mpdu_size());
            if size + subframe > max {
                break;
            }
            size += subframe;
            if let Some(packet) = self.queue.remove(i) {
                packets.push(packet);
            }
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        Some(Batch {
            sequence,
            next_hop,
            packets,
        })
    }
}

fn draw_backoff<R: Rng>(cw: u32, rng: &mut R) -> u32 {
    rng.next_u32() % (cw + 1)
}
