use crate::{SimTime, node::NodeId, stats::FlowStats};
use std::{
    fmt,
    net::{Ipv4Addr, SocketAddrV4},
};

/// Identifier of a flow installed with [`Simulator::add_flow`].
///
/// [`Simulator::add_flow`]: crate::Simulator::add_flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FlowId(u32);

impl FlowId {
    pub(crate) const fn new(id: u32) -> Self {
        Self(id)
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "flow{}", self.0)
    }
}

/// How the source application of a flow emits packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Traffic {
    /// A UDP client firing one packet every `interval`, with no regard for
    /// what the network manages to carry.
    Saturating {
        interval: SimTime,
        max_packets: Option<u64>,
    },
    /// A UDP echo client: at most `budget` requests, one every `interval`.
    /// The destination answers every request it receives with one reply.
    Echo { interval: SimTime, budget: u64 },
}

impl Traffic {
    pub fn interval(&self) -> SimTime {
        match *self {
            Self::Saturating { interval, .. } | Self::Echo { interval, .. } => interval,
        }
    }

    /// Most packets the client will ever emit.
    pub fn limit(&self) -> u64 {
        match *self {
            Self::Saturating { max_packets, .. } => max_packets.unwrap_or(u64::MAX),
            Self::Echo { budget, .. } => budget,
        }
    }

    pub fn is_echo(&self) -> bool {
        matches!(self, Self::Echo { .. })
    }
}

/// A directed stream of application packets between two addressed nodes.
///
/// The source emits from `start` (inclusive) until `stop` (exclusive).
///
/// ```
/// use std::net::{Ipv4Addr, SocketAddrV4};
/// use wlansim_core::{FlowSpec, SimTime, Traffic};
///
/// let flow = FlowSpec {
///     source: Ipv4Addr::new(192, 168, 1, 2),
///     destination: SocketAddrV4::new(Ipv4Addr::new(192, 168, 1, 1), 9),
///     payload_size: 1472,
///     traffic: Traffic::Saturating {
///         interval: SimTime::from_micros(20),
///         max_packets: None,
///     },
///     start: SimTime::from_secs(1),
///     stop: SimTime::from_secs(11),
/// };
/// assert_eq!(flow.to_string(), "192.168.1.2 -> 192.168.1.1:9");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowSpec {
    pub source: Ipv4Addr,
    pub destination: SocketAddrV4,
    pub payload_size: u64,
    pub traffic: Traffic,
    pub start: SimTime,
    pub stop: SimTime,
}

impl fmt::Display for FlowSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source, self.destination)
    }
}

/// A flow installed in a [`Simulator`](crate::Simulator).
pub(crate) struct Flow {
    pub(crate) id: FlowId,
    pub(crate) spec: FlowSpec,
    pub(crate) source: NodeId,
    pub(crate) destination: NodeId,
    pub(crate) stats: FlowStats,
}

impl Flow {
    /// Whether the client may emit a packet at `now`.
    pub(crate) fn can_send(&self, now: SimTime) -> bool {
        now >= self.spec.start && now < self.spec.stop && self.stats.sent < self.spec.traffic.limit()
    }

    /// When the client emits again after emitting at `now`, if ever.
    pub(crate) fn next_send(&self, now: SimTime) -> Option<SimTime> {
        let next = now + self.spec.traffic.interval();
        (next < self.spec.stop && self.stats.sent < self.spec.traffic.limit()).then_some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flow(traffic: Traffic) -> Flow {
        Flow {
            id: FlowId::new(0),
            spec: FlowSpec {
                source: Ipv4Addr::new(192, 168, 1, 2),
                destination: SocketAddrV4::new(Ipv4Addr::new(192, 168, 1, 1), 9),
                payload_size: 1472,
                traffic,
                start: SimTime::from_secs(1),
                stop: SimTime::from_secs(2),
            },
            source: NodeId::new(1),
            destination: NodeId::ZERO,
            stats: FlowStats::default(),
        }
    }

    #[test]
    fn saturating_window() {
        let f = flow(Traffic::Saturating {
            interval: SimTime::from_millis(400),
            max_packets: None,
        });

        assert!(!f.can_send(SimTime::from_millis(999)));
        assert!(f.can_send(SimTime::from_secs(1)));
        assert!(!f.can_send(SimTime::from_secs(2)));

        assert_eq!(
            f.next_send(SimTime::from_millis(1_200)),
            Some(SimTime::from_millis(1_600))
        );
        assert_eq!(f.next_send(SimTime::from_millis(1_600)), None);
    }

    #[test]
    fn echo_budget() {
        let mut f = flow(Traffic::Echo {
            interval: SimTime::from_millis(100),
            budget: 3,
        });
        assert!(f.spec.traffic.is_echo());
        assert_eq!(f.spec.traffic.limit(), 3);

        f.stats.sent = 3;
        assert!(!f.can_send(SimTime::from_secs(1)));
        assert_eq!(f.next_send(SimTime::from_secs(1)), None);
    }

    #[test]
    fn display() {
        assert_eq!(FlowId::new(3).to_string(), "flow3");
        assert_eq!(
            flow(Traffic::Echo {
                interval: SimTime::from_millis(100),
                budget: 1
            })
            .spec
            .to_string(),
            "192.168.1.2 -> 192.168.1.1:9"
        );
    }
}
