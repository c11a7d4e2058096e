//! Simulation statistics and observability types.
//!
//! [`SimulatorStats`] provides a point-in-time snapshot of every node and
//! every flow. Obtain one via [`Simulator::stats`](crate::Simulator::stats);
//! individual flow counters are also available through
//! [`Simulator::flow_stats`](crate::Simulator::flow_stats).

use crate::{SimTime, app::FlowId, node::NodeId, node::Role, position::Position};
use std::{fmt, net::Ipv4Addr};

/// MAC counters of a single node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MacCounters {
    /// Frames this node put on the air, control frames included.
    pub frames_sent: u64,
    /// Frames this node decoded intact, whoever they were addressed to.
    pub frames_received: u64,
    /// Receptions lost to an overlapping transmission or to channel loss.
    pub collisions: u64,
    /// CTS or ACK timeouts.
    pub retries: u64,
    /// Packets given up on after the retry limit.
    pub retry_drops: u64,
    /// Packets refused by a full transmit queue.
    pub queue_drops: u64,
}

/// Snapshot of statistics for a single node.
#[derive(Debug, Clone)]
pub struct NodeStats {
    pub id: NodeId,
    pub role: Role,
    pub position: Position,
    pub address: Option<Ipv4Addr>,
    /// Packets currently waiting in the transmit queue.
    pub queued: usize,
    pub mac: MacCounters,
}

/// Counters of a single flow.
///
/// `received` counts request packets delivered to the flow's destination,
/// once per packet even when the MAC retransmitted it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlowStats {
    /// Packets the source application emitted.
    pub sent: u64,
    /// Packets of this flow refused by a full transmit queue, on any hop.
    pub queue_drops: u64,
    /// Packets of this flow given up on after the retry limit, on any hop.
    pub retry_drops: u64,
    pub received: u64,
    /// Echo replies delivered back to the source.
    pub replies: u64,
}

/// Outcome of a completed [`Simulator::run`](crate::Simulator::run).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Events processed.
    pub events: u64,
    /// Time of the last processed event.
    pub end_time: SimTime,
    /// Events still due after the horizon, discarded.
    pub pending: usize,
}

/// Point-in-time snapshot of the whole simulation.
#[derive(Debug, Clone)]
pub struct SimulatorStats {
    pub now: SimTime,
    pub nodes: Vec<NodeStats>,
    pub flows: Vec<(FlowId, FlowStats)>,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{events} events, ended at {end}, {pending} pending",
            events = self.events,
            end = self.end_time,
            pending = self.pending,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_summary_display() {
        let summary = RunSummary {
            events: 42,
            end_time: SimTime::from_secs(11),
            pending: 3,
        };
        assert_eq!(summary.to_string(), "42 events, ended at 11s, 3 pending");
    }

    #[test]
    fn counters_start_at_zero() {
        assert_eq!(FlowStats::default().received, 0);
        assert_eq!(MacCounters::default(), MacCounters {
            frames_sent: 0,
            frames_received: 0,
            collisions: 0,
            retries: 0,
            retry_drops: 0,
            queue_drops: 0,
        });
    }
}
