//! The interface the harness drives a simulation engine through, and its
//! binding to [`wlansim_core::Simulator`].

use crate::{
    error::SimulationEngineError,
    link::LinkConfig,
    traffic::{Flow, FlowKind},
};
use std::{fmt, net::Ipv4Addr};
use tracing::warn;
use wlansim_core::{
    FlowId, FlowSpec, FlowStats, NodeId, NodeStats, Position, Range, Role, SimTime, Simulator,
    Traffic,
};

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunResult {
    Completed,
    Faulted(String),
}

/// A discrete-event engine that can host one scenario and run it once.
///
/// Handles are opaque tokens handed out by the engine; the harness never
/// looks inside them.
pub trait SimulationEngine {
    type NodeHandle: Copy + fmt::Debug;
    type ReceivedCountHandle: Copy + fmt::Debug;

    fn create_node(&mut self, role: Role, position: Position) -> Self::NodeHandle;

    /// Bind `address` to `node`. Returns the address the engine actually
    /// assigned.
    fn assign_address(
        &mut self,
        node: Self::NodeHandle,
        address: Ipv4Addr,
    ) -> Result<Ipv4Addr, SimulationEngineError>;

    fn install_link(
        &mut self,
        nodes: &[Self::NodeHandle],
        link: &LinkConfig,
        range: Range,
    ) -> Result<(), SimulationEngineError>;

    fn schedule_flow(
        &mut self,
        flow: &Flow,
    ) -> Result<Self::ReceivedCountHandle, SimulationEngineError>;

    /// Run until `horizon`, blocking until done.
    fn run(&mut self, horizon: SimTime) -> RunResult;

    /// Packets of the flow delivered to its destination. Only meaningful
    /// after [`run`](SimulationEngine::run) returned
    /// [`RunResult::Completed`].
    fn read_received_count(
        &self,
        handle: Self::ReceivedCountHandle,
    ) -> Result<u64, SimulationEngineError>;

    fn flow_stats(&self, _handle: Self::ReceivedCountHandle) -> Option<FlowStats> {
        None
    }

    fn node_stats(&self) -> Vec<NodeStats> {
        Vec::new()
    }
}

impl From<FlowKind> for Traffic {
    fn from(kind: FlowKind) -> Self {
        match kind {
            FlowKind::Saturating {
                interval,
                max_packets,
            } => Traffic::Saturating {
                interval,
                max_packets,
            },
            FlowKind::BoundedEcho { budget, interval } => Traffic::Echo { interval, budget },
        }
    }
}

impl SimulationEngine for Simulator {
    type NodeHandle = NodeId;
    type ReceivedCountHandle = FlowId;

    fn create_node(&mut self, role: Role, position: Position) -> NodeId {
        self.new_node(role).set_position(position).build()
    }

    fn assign_address(
        &mut self,
        node: NodeId,
        address: Ipv4Addr,
    ) -> Result<Ipv4Addr, SimulationEngineError> {
        Simulator::assign_address(self, node, address)
            .map_err(|error| SimulationEngineError::rejected("assign_address", error))
    }

    fn install_link(
        &mut self,
        nodes: &[NodeId],
        link: &LinkConfig,
        range: Range,
    ) -> Result<(), SimulationEngineError> {
        self.install_wifi(nodes, link.mac_config(), range, link.packet_loss())
            .map_err(|error| SimulationEngineError::rejected("install_link", error))
    }

    fn schedule_flow(&mut self, flow: &Flow) -> Result<FlowId, SimulationEngineError> {
        self.add_flow(FlowSpec {
            source: flow.source,
            destination: flow.destination,
            payload_size: flow.payload_size,
            traffic: flow.kind.into(),
            start: flow.start,
            stop: flow.stop,
        })
        .map_err(|error| SimulationEngineError::rejected("schedule_flow", error))
    }

    fn run(&mut self, horizon: SimTime) -> RunResult {
        match Simulator::run(self, horizon) {
            Ok(_) => RunResult::Completed,
            Err(error) => {
                warn!(%error, "simulation faulted");
                RunResult::Faulted(error.to_string())
            }
        }
    }

    fn read_received_count(&self, handle: FlowId) -> Result<u64, SimulationEngineError> {
        Simulator::flow_stats(self, handle)
            .map(|stats| stats.received)
            .ok_or_else(|| SimulationEngineError::UnknownCounter {
                handle: handle.to_string(),
            })
    }

    fn flow_stats(&self, handle: FlowId) -> Option<FlowStats> {
        Simulator::flow_stats(self, handle)
    }

    fn node_stats(&self) -> Vec<NodeStats> {
        self.stats().nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddrV4;

    fn address(host: u8) -> Ipv4Addr {
        Ipv4Addr::new(192, 168, 1, host)
    }

    fn two_nodes() -> (Simulator, NodeId, NodeId) {
        let mut sim = Simulator::new();
        let ap = sim.create_node(Role::AccessPoint, Position::ORIGIN);
        let sta = sim.create_node(Role::Station, Position::new(0.0, 5.0).unwrap());
        (sim, ap, sta)
    }

    #[test]
    fn assign_address_echoes() {
        let (mut sim, ap, _) = two_nodes();

        assert_eq!(
            SimulationEngine::assign_address(&mut sim, ap, address(1)).unwrap(),
            address(1)
        );
        assert!(matches!(
            SimulationEngine::assign_address(&mut sim, ap, address(2)),
            Err(SimulationEngineError::Rejected {
                operation: "assign_address",
                ..
            })
        ));
    }

    #[test]
    fn flow_before_link_is_rejected() {
        let (mut sim, ap, sta) = two_nodes();
        SimulationEngine::assign_address(&mut sim, ap, address(1)).unwrap();
        SimulationEngine::assign_address(&mut sim, sta, address(2)).unwrap();

        let flow = Flow {
            label: "1".to_owned(),
            source: address(2),
            destination: SocketAddrV4::new(address(1), 9),
            payload_size: 1472,
            kind: FlowKind::BoundedEcho {
                budget: 3,
                interval: SimTime::from_millis(100),
            },
            start: SimTime::from_secs(1),
            stop: SimTime::from_secs(2),
            observed: true,
        };
        assert!(matches!(
            sim.schedule_flow(&flow),
            Err(SimulationEngineError::Rejected {
                operation: "schedule_flow",
                ..
            })
        ));

        let link = LinkConfig::new(false, 1, 1472).unwrap();
        sim.install_link(&[ap, sta], &link, Range::default()).unwrap();
        let counter = sim.schedule_flow(&flow).unwrap();

        assert_eq!(SimulationEngine::run(&mut sim, SimTime::from_secs(2)), RunResult::Completed);
        assert_eq!(sim.read_received_count(counter).unwrap(), 3);
        assert_eq!(SimulationEngine::flow_stats(&sim, counter).unwrap().replies, 3);
        assert_eq!(sim.node_stats().len(), 2);
    }

    #[test]
    fn second_run_faults() {
        let (mut sim, _, _) = two_nodes();

        assert_eq!(SimulationEngine::run(&mut sim, SimTime::from_secs(1)), RunResult::Completed);
        assert!(matches!(
            SimulationEngine::run(&mut sim, SimTime::from_secs(1)),
            RunResult::Faulted(_)
        ));
    }

    #[test]
    fn unknown_counter() {
        let (sim, _, _) = two_nodes();

        let mut other = Simulator::new();
        let a = other.create_node(Role::AccessPoint, Position::ORIGIN);
        let b = other.create_node(Role::Station, Position::ORIGIN);
        SimulationEngine::assign_address(&mut other, a, address(1)).unwrap();
        SimulationEngine::assign_address(&mut other, b, address(2)).unwrap();
        other
            .install_link(&[a, b], &LinkConfig::new(false, 1, 1472).unwrap(), Range::default())
            .unwrap();
        let foreign = other
            .schedule_flow(&Flow {
                label: "x".to_owned(),
                source: address(2),
                destination: SocketAddrV4::new(address(1), 9),
                payload_size: 100,
                kind: FlowKind::BoundedEcho {
                    budget: 1,
                    interval: SimTime::from_millis(1),
                },
                start: SimTime::ZERO,
                stop: SimTime::from_millis(1),
                observed: true,
            })
            .unwrap();

        assert!(matches!(
            sim.read_received_count(foreign),
            Err(SimulationEngineError::UnknownCounter { .. })
        ));
    }
}
