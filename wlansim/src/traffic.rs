use crate::{error::ConfigurationError, topology::Topology};
use std::{
    collections::HashSet,
    fmt,
    net::{Ipv4Addr, SocketAddrV4},
};
use wlansim_core::{Role, SimTime};

/// How a flow's source emits packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowKind {
    /// One packet every `interval` from start until stop, whatever the
    /// network manages to carry. Targets the access point.
    Saturating {
        interval: SimTime,
        max_packets: Option<u64>,
    },
    /// At most `budget` requests, one every `interval`. The destination
    /// answers each request it receives with exactly one reply.
    BoundedEcho { budget: u64, interval: SimTime },
}

impl FlowKind {
    pub fn interval(&self) -> SimTime {
        match *self {
            Self::Saturating { interval, .. } | Self::BoundedEcho { interval, .. } => interval,
        }
    }
}

impl fmt::Display for FlowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Saturating { interval, .. } => write!(f, "saturating every {interval}"),
            Self::BoundedEcho { budget, interval } => {
                write!(f, "echo x{budget} every {interval}")
            }
        }
    }
}

/// A logical flow between two addressed nodes of a [`Topology`].
///
/// `start` and `stop` are offsets from the beginning of the run; the source
/// emits in `start..stop`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flow {
    /// Names the flow in the report. Unique within a plan.
    pub label: String,
    pub source: Ipv4Addr,
    pub destination: SocketAddrV4,
    pub payload_size: u64,
    pub kind: FlowKind,
    pub start: SimTime,
    pub stop: SimTime,
    /// Whether the report carries a line for this flow.
    pub observed: bool,
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{label}: {source} -> {destination}, {kind}, {start}..{stop}",
            label = self.label,
            source = self.source,
            destination = self.destination,
            kind = self.kind,
            start = self.start,
            stop = self.stop,
        )
    }
}

/// The flows of a scenario, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct TrafficPlan {
    flows: Vec<Flow>,
}

impl TrafficPlan {
    /// Start a plan whose flows are checked against `topology`.
    pub fn builder(topology: &Topology) -> TrafficPlanBuilder<'_> {
        TrafficPlanBuilder {
            topology,
            flows: Vec::new(),
            labels: HashSet::new(),
        }
    }

    pub fn flows(&self) -> &[Flow] {
        &self.flows
    }

    pub fn observed(&self) -> impl Iterator<Item = &Flow> {
        self.flows.iter().filter(|flow| flow.observed)
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    /// The latest stop offset of any flow, [`SimTime::ZERO`] for an empty
    /// plan.
    pub fn latest_stop(&self) -> SimTime {
        self.flows
            .iter()
            .map(|flow| flow.stop)
            .max()
            .unwrap_or(SimTime::ZERO)
    }
}

/// Validates flows one by one as they are added.
///
/// ```
/// use std::net::SocketAddrV4;
/// use wlansim::{Flow, FlowKind, TopologyBuilder, TrafficPlan};
/// use wlansim_core::SimTime;
///
/// let topology = TopologyBuilder::new().build().unwrap();
/// let ap = topology.access_point().address;
///
/// let mut plan = TrafficPlan::builder(&topology);
/// plan.add_flow(Flow {
///     label: "1".to_owned(),
///     source: topology.stations()[0].address,
///     destination: SocketAddrV4::new(ap, 9),
///     payload_size: 1472,
///     kind: FlowKind::Saturating {
///         interval: SimTime::from_micros(20),
///         max_packets: None,
///     },
///     start: SimTime::from_secs(1),
///     stop: SimTime::from_secs(11),
///     observed: true,
/// })
/// .unwrap();
///
/// let plan = plan.build();
/// assert_eq!(plan.len(), 1);
/// assert_eq!(plan.latest_stop(), SimTime::from_secs(11));
/// ```
pub struct TrafficPlanBuilder<'a> {
    topology: &'a Topology,
    flows: Vec<Flow>,
    labels: HashSet<String>,
}

impl TrafficPlanBuilder<'_> {
    pub fn add_flow(&mut self, flow: Flow) -> Result<&mut Self, ConfigurationError> {
        self.check(&flow)?;
        self.labels.insert(flow.label.clone());
        self.flows.push(flow);
        Ok(self)
    }

    pub fn build(self) -> TrafficPlan {
        TrafficPlan { flows: self.flows }
    }

    fn check(&self, flow: &Flow) -> Result<(), ConfigurationError> {
        if flow.label.is_empty() {
            return Err(ConfigurationError::invalid("label", "\"\"", "must not be empty"));
        }
        if self.labels.contains(&flow.label) {
            return Err(ConfigurationError::invalid(
                "label",
                &flow.label,
                "already used by another flow",
            ));
        }
        if flow.start >= flow.stop {
            return Err(ConfigurationError::invalid(
                "stop",
                flow.stop,
                "must be after the start offset",
            ));
        }
        if flow.kind.interval().is_zero() {
            return Err(ConfigurationError::invalid(
                "interval",
                flow.kind.interval(),
                "must be positive",
            ));
        }
        if let FlowKind::BoundedEcho { budget: 0, .. } = flow.kind {
            return Err(ConfigurationError::invalid("echo_budget", 0, "must be at least 1"));
        }

        let unassigned = |parameter, address| ConfigurationError::UnassignedAddress {
            label: flow.label.clone(),
            parameter,
            address,
        };
        let source = self
            .topology
            .find(flow.source)
            .ok_or_else(|| unassigned("source", flow.source))?;
        let destination = self
            .topology
            .find(*flow.destination.ip())
            .ok_or_else(|| unassigned("destination", *flow.destination.ip()))?;

        if source.index == destination.index {
            return Err(ConfigurationError::invalid(
                "destination",
                flow.destination,
                "same node as the source",
            ));
        }
        if matches!(flow.kind, FlowKind::Saturating { .. }) && destination.role != Role::AccessPoint
        {
            return Err(ConfigurationError::invalid(
                "destination",
                flow.destination,
                "saturating flows target the access point",
            ));
        }
        Ok(())
    }
}
