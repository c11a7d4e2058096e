use crate::{
    frame::Frame,
    measure::PacketLoss,
    node::NodeId,
    position::{Position, Range},
};
use rand_core::Rng;
use std::{collections::HashMap, fmt};

/// Identifier of one frame on the air.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TxId(u64);

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx{}", self.0)
    }
}

#[derive(Debug, Clone, Copy)]
struct Reception {
    tx: TxId,
    corrupted: bool,
}

/// What changed when a frame went on the air.
#[derive(Debug, Default)]
pub(crate) struct Started {
    /// Nodes whose carrier sense went from idle to busy.
    pub(crate) busy: Vec<NodeId>,
}

/// What changed when a frame left the air.
#[derive(Debug)]
pub(crate) struct Finished {
    pub(crate) frame: Frame,
    /// Nodes that decoded the frame intact.
    pub(crate) delivered: Vec<NodeId>,
    /// Nodes that locked on the frame but lost it to a collision or to
    /// channel loss.
    pub(crate) corrupted: Vec<NodeId>,
    /// Nodes whose carrier sense went from busy to idle.
    pub(crate) idle: Vec<NodeId>,
}

/// The shared wireless channel.
///
/// Audibility is fixed when the medium is installed: a node hears another
/// iff both are attached and the [`Range`] covers the distance between
/// them. A node locks on the first frame that reaches it while it is idle;
/// any other audible transmission overlapping that frame destroys it, and a
/// node that starts transmitting loses whatever it was receiving.
pub(crate) struct Medium {
    attached: Vec<bool>,
    hears: Vec<Vec<NodeId>>,
    loss: PacketLoss,
    next_tx: u64,
    active: HashMap<TxId, Frame>,
    receiving: Vec<Option<Reception>>,
    transmitting: Vec<Option<TxId>>,
    sensed: Vec<u32>,
}

impl Medium {
    /// `positions[i]` is the position of the node with index `i`, or `None`
    /// when that node is not attached to this medium.
    pub(crate) fn new(positions: &[Option<Position>], range: Range, loss: PacketLoss) -> Self {
        let hears = positions
            .iter()
            .enumerate()
            .map(|(i, me)| {
                let Some(me) = me else { return Vec::new() };
                positions
                    .iter()
                    .enumerate()
                    .filter(|&(j, other)| {
                        j != i && other.is_some_and(|other| range.covers(me, &other))
                    })
                    .map(|(j, _)| NodeId::new(j as u32))
                    .collect()
            })
            .collect();
        let count = positions.len();

        Self {
            attached: positions.iter().map(Option::is_some).collect(),
            hears,
            loss,
            next_tx: 0,
            active: HashMap::new(),
            receiving: vec![None; count],
            transmitting: vec![None; count],
            sensed: vec![0; count],
        }
    }

    /// The nodes within range of `node`.
    pub(crate) fn neighbours(&self, node: NodeId) -> &[NodeId] {
        self.hears.get(node.index()).map_or(&[], Vec::as_slice)
    }

    pub(crate) fn is_attached(&self, node: NodeId) -> bool {
        self.attached.get(node.index()).copied().unwrap_or(false)
    }

    #[inline]
    pub(crate) fn is_transmitting(&self, node: NodeId) -> bool {
        self.transmitting
            .get(node.index())
            .is_some_and(Option::is_some)
    }

    pub(crate) fn active(&self) -> usize {
        self.active.len()
    }

    pub(crate) fn start(&mut self, frame: Frame) -> (TxId, Started) {
        let tx = TxId(self.next_tx);
        self.next_tx += 1;

        let source = frame.transmitter;
        let mut started = Started::default();

        self.transmitting[source.index()] = Some(tx);
        if let Some(reception) = self.receiving[source.index()].as_mut() {
            reception.corrupted = true;
        }

        for &node in &self.hears[source.index()] {
            let i = node.index();
            self.sensed[i] += 1;
            if self.sensed[i] == 1 {
                started.busy.push(node);
            }

            if self.transmitting[i].is_some() {
                continue;
            }
            match self.receiving[i].as_mut() {
                Some(reception) => reception.corrupted = true,
                None if self.sensed[i] == 1 => {
                    self.receiving[i] = Some(Reception {
                        tx,
                        corrupted: false,
                    })
                }
                // energy already on the air that this node could not lock on
                None => {}
            }
        }

        self.active.insert(tx, frame);
        (tx, started)
    }

    /// Takes the frame off the air.
    ///
    /// Returns `None` for an unknown (already finished) transmission.
    pub(crate) fn finish<R: Rng>(&mut self, tx: TxId, rng: &mut R) -> Option<Finished> {
        let frame = self.active.remove(&tx)?;
        let source = frame.transmitter;
        self.transmitting[source.index()] = None;

        let mut delivered = Vec::new();
        let mut corrupted = Vec::new();
        let mut idle = Vec::new();

        for &node in &self.hears[source.index()] {
            let i = node.index();
            self.sensed[i] = self.sensed[i].saturating_sub(1);
            if self.sensed[i] == 0 {
                idle.push(node);
            }

            match self.receiving[i] {
                Some(reception) if reception.tx == tx => {
                    self.receiving[i] = None;
                    if reception.corrupted || self.loss.should_drop(rng) {
                        corrupted.push(node);
                    } else {
                        delivered.push(node);
                    }
                }
                _ => {}
            }
        }

        Some(Finished {
            frame,
            delivered,
            corrupted,
            idle,
        })
    }
}
