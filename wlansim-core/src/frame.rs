use crate::{
    SimTime,
    app::FlowId,
    defaults::{
        ACK_SIZE, AMPDU_DELIMITER, BLOCK_ACK_SIZE, CTS_SIZE, MPDU_OVERHEAD, PREAMBLE, RTS_SIZE,
    },
    mac::MacConfig,
    node::NodeId,
};
use std::fmt;

/// A generator for monotonically increasing **unique** [`PacketId`].
#[derive(Debug, Default)]
pub(crate) struct PacketIdGenerator(u64);

/// # [`Packet`] Identifier
///
/// Unique for the lifetime of a [`Simulator`]; an echo reply gets its own
/// identifier distinct from the request's.
///
/// [`Simulator`]: crate::Simulator
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PacketId(u64);

impl PacketIdGenerator {
    pub(crate) fn generate(&mut self) -> PacketId {
        self.0 += 1;
        PacketId(self.0)
    }
}

impl fmt::Display for PacketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016x}", self.0)
    }
}

/// Which leg of a flow a [`Packet`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// From the flow's source to its destination. Counted as received.
    Request,
    /// Echo answer travelling back to the flow's source.
    Reply,
}

/// An application datagram travelling end to end.
///
/// The MAC carries packets hop by hop inside a [`Batch`]; `source` and
/// `destination` are the end points, not the current hop.
#[derive(Debug, Clone)]
pub struct Packet {
    id: PacketId,
    flow: FlowId,
    direction: Direction,
    source: NodeId,
    destination: NodeId,
    payload: u64,
}

impl Packet {
    pub(crate) fn new(
        id: PacketId,
        flow: FlowId,
        direction: Direction,
        source: NodeId,
        destination: NodeId,
        payload: u64,
    ) -> Self {
        Self {
            id,
            flow,
            direction,
            source,
            destination,
            payload,
        }
    }

    pub fn id(&self) -> PacketId {
        self.id
    }

    pub fn flow(&self) -> FlowId {
        self.flow
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn source(&self) -> NodeId {
        self.source
    }

    pub fn destination(&self) -> NodeId {
        self.destination
    }

    /// Application payload, in bytes.
    pub fn payload(&self) -> u64 {
        self.payload
    }

    /// On-air size of this packet as a single MPDU.
    pub fn mpdu_size(&self) -> u64 {
        self.payload + MPDU_OVERHEAD
    }
}

/// The packets one data transmission carries to one next hop.
///
/// A batch keeps its sequence number across retransmissions so the
/// receiver can discard duplicates when only the acknowledgement was lost.
#[derive(Debug, Clone)]
pub(crate) struct Batch {
    pub(crate) sequence: u64,
    pub(crate) next_hop: NodeId,
    pub(crate) packets: Vec<Packet>,
}

impl Batch {
    pub(crate) fn is_aggregate(&self) -> bool {
        self.packets.len() > 1
    }

    /// Size of the PSDU: a plain MPDU, or an A-MPDU whose subframes each
    /// pay a delimiter and are padded to a 4-byte boundary.
    pub(crate) fn psdu_size(&self) -> u64 {
        if self.is_aggregate() {
            self.packets
                .iter()
                .map(|packet| ampdu_subframe_size(packet.mpdu_size()))
                .sum()
        } else {
            self.packets.iter().map(Packet::mpdu_size).sum()
        }
    }
}

pub(crate) fn ampdu_subframe_size(mpdu: u64) -> u64 {
    (mpdu + AMPDU_DELIMITER).next_multiple_of(4)
}

#[derive(Debug, Clone)]
pub(crate) enum FrameKind {
    Rts,
    Cts,
    Data(Batch),
    Ack,
    BlockAck,
}

/// A MAC frame on the air.
///
/// `nav` is the duration field: how long after the end of this frame the
/// exchange it belongs to keeps the medium reserved. Third parties that
/// decode the frame defer for that long.
#[derive(Debug, Clone)]
pub(crate) struct Frame {
    pub(crate) kind: FrameKind,
    pub(crate) transmitter: NodeId,
    pub(crate) receiver: NodeId,
    pub(crate) nav: SimTime,
}

impl Frame {
    pub(crate) fn size(&self) -> u64 {
        match &self.kind {
            FrameKind::Rts => RTS_SIZE,
            FrameKind::Cts => CTS_SIZE,
            FrameKind::Ack => ACK_SIZE,
            FrameKind::BlockAck => BLOCK_ACK_SIZE,
            FrameKind::Data(batch) => batch.psdu_size(),
        }
    }

    /// Time the frame occupies the medium, preamble included.
    pub(crate) fn airtime(&self, config: &MacConfig) -> SimTime {
        let rate = match self.kind {
            FrameKind::Data(_) => config.data_rate,
            _ => config.control_rate,
        };
        PREAMBLE + rate.transmit_time(self.size())
    }

    pub(crate) fn label(&self) -> &'static str {
        match self.kind {
            FrameKind::Rts => "RTS",
            FrameKind::Cts => "CTS",
            FrameKind::Data(ref batch) if batch.is_aggregate() => "A-MPDU",
            FrameKind::Data(_) => "DATA",
            FrameKind::Ack => "ACK",
            FrameKind::BlockAck => "BA",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet(ids: &mut PacketIdGenerator, payload: u64) -> Packet {
        Packet::new(
            ids.generate(),
            FlowId::new(0),
            Direction::Request,
            NodeId::new(1),
            NodeId::ZERO,
            payload,
        )
    }

    #[test]
    fn packet_ids_are_unique() {
        let mut ids = PacketIdGenerator::default();
        let a = ids.generate();
        let b = ids.generate();

        assert_ne!(a, b);
        assert!(a < b);
        assert_eq!(a.to_string(), "0x0000000000000001");
    }

    #[test]
    fn single_mpdu_size() {
        let mut ids = PacketIdGenerator::default();
        let batch = Batch {
            sequence: 1,
            next_hop: NodeId::ZERO,
            packets: vec![packet(&mut ids, 1472)],
        };

        assert!(!batch.is_aggregate());
        assert_eq!(batch.psdu_size(), 1472 + MPDU_OVERHEAD);
    }

    #[test]
    fn ampdu_size_pads_subframes() {
        let mut ids = PacketIdGenerator::default();
        let batch = Batch {
            sequence: 1,
            next_hop: NodeId::ZERO,
            packets: vec![packet(&mut ids, 1), packet(&mut ids, 1)],
        };

        // (1 + 66 + 4) = 71, padded to 72, twice
        assert_eq!(batch.psdu_size(), 144);
    }

    #[test]
    fn control_frames_use_control_rate() {
        let config = MacConfig::default();
        let ack = Frame {
            kind: FrameKind::Ack,
            transmitter: NodeId::ZERO,
            receiver: NodeId::new(1),
            nav: SimTime::ZERO,
        };

        assert_eq!(
            ack.airtime(&config),
            PREAMBLE + config.control_rate.transmit_time(ACK_SIZE)
        );
        assert_eq!(ack.label(), "ACK");
    }
}
