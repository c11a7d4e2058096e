use crate::{
    SimTime,
    app::{Flow, FlowId, FlowSpec},
    event::{Event, EventQueue},
    frame::{Direction, Frame, Packet, PacketIdGenerator},
    mac::{DropReason, Mac, MacAction, MacConfig},
    measure::PacketLoss,
    medium::{Finished, Medium, TxId},
    node::{Node, NodeId, Role},
    position::{Position, Range},
    stats::{FlowStats, RunSummary, SimulatorStats},
};
use rand_chacha::ChaChaRng;
use rand_core::SeedableRng as _;
use std::{collections::HashMap, net::Ipv4Addr};
use thiserror::Error;
use tracing::{debug, info, trace, warn};

/// This is the entry point for all activities with [`wlansim_core`].
///
/// The [`Simulator`] owns every node, the shared wireless medium, the flows
/// and the event queue. A scenario is set up in four steps (create nodes,
/// assign addresses, install the medium, add flows) and then executed once
/// with [`run`](Simulator::run).
///
/// # Example
///
/// ```
/// use std::net::{Ipv4Addr, SocketAddrV4};
/// use wlansim_core::{
///     FlowSpec, MacConfig, PacketLoss, Position, Range, Role, SimTime, Simulator, Traffic,
/// };
///
/// let mut sim = Simulator::new();
/// let ap = sim
///     .new_node(Role::AccessPoint)
///     .set_position(Position::new(5.0, 5.0).unwrap())
///     .build();
/// let sta = sim
///     .new_node(Role::Station)
///     .set_position(Position::new(5.0, 10.0).unwrap())
///     .build();
///
/// sim.assign_address(ap, Ipv4Addr::new(192, 168, 1, 1)).unwrap();
/// sim.assign_address(sta, Ipv4Addr::new(192, 168, 1, 2)).unwrap();
/// sim.install_wifi(&[ap, sta], MacConfig::default(), Range::new(5.0).unwrap(), PacketLoss::None)
///     .unwrap();
///
/// let flow = sim
///     .add_flow(FlowSpec {
///         source: Ipv4Addr::new(192, 168, 1, 2),
///         destination: SocketAddrV4::new(Ipv4Addr::new(192, 168, 1, 1), 9),
///         payload_size: 1472,
///         traffic: Traffic::Echo {
///             interval: SimTime::from_millis(100),
///             budget: 3,
///         },
///         start: SimTime::from_secs(1),
///         stop: SimTime::from_secs(2),
///     })
///     .unwrap();
///
/// sim.run(SimTime::from_secs(2)).unwrap();
///
/// let stats = sim.flow_stats(flow).unwrap();
/// assert_eq!(stats.received, 3);
/// assert_eq!(stats.replies, 3);
/// ```
///
/// [`wlansim_core`]: crate
pub struct Simulator {
    packet_ids: PacketIdGenerator,

    /// indexed by [`NodeId::index`]
    nodes: Vec<Node>,
    addresses: HashMap<Ipv4Addr, NodeId>,

    medium: Option<Medium>,
    mac_config: MacConfig,

    /// indexed by [`FlowId::index`]
    flows: Vec<Flow>,

    queue: EventQueue<Event>,
    now: SimTime,
    event_limit: Option<u64>,
    has_run: bool,

    /// Centralised RNG for every random decision: backoff draws and
    /// packet loss.
    ///
    /// A single source guarantees that the simulation is reproducible when
    /// seeded via [`Simulator::set_seed`].
    rng: ChaChaRng,
}

/// Builder for configuring a new node before registering it with the
/// simulator.
///
/// Obtained via [`Simulator::new_node`]. Set the position, then call
/// [`build`](NodeBuilder::build) to get the node's [`NodeId`].
pub struct NodeBuilder<'a> {
    node: Node,
    simulator: &'a mut Simulator,
}

/// Error returned when a scenario cannot be set up or run.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("Node ({node}) Not Found")]
    NodeNotFound { node: NodeId },
    /// No node was given this address with [`Simulator::assign_address`].
    #[error("Address ({address}) Not Assigned")]
    AddressNotAssigned { address: Ipv4Addr },
    #[error("Address ({address}) already assigned to {owner}")]
    DuplicateAddress { address: Ipv4Addr, owner: NodeId },
    /// Addresses are assigned once and never change.
    #[error("Node ({node}) already has address {address}")]
    AddressAlreadySet { node: NodeId, address: Ipv4Addr },
    #[error("Wireless medium already installed")]
    MediumAlreadyInstalled,
    #[error("Wireless medium not installed, call install_wifi first")]
    MediumNotInstalled,
    #[error("Node ({node}) is not attached to the wireless medium")]
    NotAttached { node: NodeId },
    #[error("More than one access point on the medium ({first}, {second})")]
    MultipleAccessPoints { first: NodeId, second: NodeId },
    #[error("Invalid flow ({flow}): {reason}")]
    InvalidFlow { flow: FlowSpec, reason: &'static str },
    #[error("Simulator already ran, a run cannot be repeated")]
    AlreadyRun,
    #[error("Event budget ({limit}) exceeded at {at}")]
    EventBudgetExceeded { limit: u64, at: SimTime },
}

impl NodeBuilder<'_> {
    /// Place the node. Defaults to [`Position::ORIGIN`].
    pub fn set_position(mut self, position: Position) -> Self {
        self.node.set_position(position);
        self
    }

    /// Finalise the node configuration and register it with the simulator.
    pub fn build(self) -> NodeId {
        let Self { node, simulator } = self;
        let id = node.id();
        debug!(node = %id, role = %node.role(), position = %node.position(), "node created");
        simulator.nodes.push(node);
        id
    }
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Simulator {
    /// Create a new, empty simulator.
    pub fn new() -> Self {
        Self {
            packet_ids: PacketIdGenerator::default(),
            nodes: Vec::new(),
            addresses: HashMap::new(),
            medium: None,
            mac_config: MacConfig::default(),
            flows: Vec::new(),
            queue: EventQueue::new(),
            now: SimTime::ZERO,
            event_limit: None,
            has_run: false,
            rng: ChaChaRng::seed_from_u64(0),
        }
    }

    /// Re-seed the simulator's random-number generator.
    ///
    /// Backoff draws happen when the medium is installed, so seed before
    /// calling [`install_wifi`](Simulator::install_wifi). The default seed
    /// is `0`.
    pub fn set_seed(&mut self, seed: u64) {
        self.rng = ChaChaRng::seed_from_u64(seed);
    }

    /// Abort [`run`](Simulator::run) with [`SimError::EventBudgetExceeded`]
    /// after this many events. Unlimited by default.
    pub fn set_event_limit(&mut self, limit: Option<u64>) {
        self.event_limit = limit;
    }

    /// Current simulated time.
    #[inline]
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Create a new node and return a builder to configure it.
    ///
    /// Node IDs are assigned sequentially starting at `0`.
    pub fn new_node(&mut self, role: Role) -> NodeBuilder<'_> {
        let id = NodeId::new(self.nodes.len() as u32);
        NodeBuilder {
            node: Node::new(id, role),
            simulator: self,
        }
    }

    fn node(&self, id: NodeId) -> Result<&Node, SimError> {
        self.nodes
            .get(id.index())
            .ok_or(SimError::NodeNotFound { node: id })
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn position(&self, id: NodeId) -> Result<Position, SimError> {
        self.node(id).map(Node::position)
    }

    pub fn role(&self, id: NodeId) -> Result<Role, SimError> {
        self.node(id).map(Node::role)
    }

    pub fn address(&self, id: NodeId) -> Result<Option<Ipv4Addr>, SimError> {
        self.node(id).map(Node::address)
    }

    /// The node an address was assigned to.
    pub fn lookup(&self, address: Ipv4Addr) -> Result<NodeId, SimError> {
        self.addresses
            .get(&address)
            .copied()
            .ok_or(SimError::AddressNotAssigned { address })
    }

    /// Give a node its network address.
    ///
    /// # Errors
    ///
    /// - [`SimError::NodeNotFound`] if the node does not exist.
    /// - [`SimError::AddressAlreadySet`] if the node already has an address.
    /// - [`SimError::DuplicateAddress`] if another node owns `address`.
    pub fn assign_address(&mut self, id: NodeId, address: Ipv4Addr) -> Result<Ipv4Addr, SimError> {
        if let Some(current) = self.node(id)?.address() {
            return Err(SimError::AddressAlreadySet {
                node: id,
                address: current,
            });
        }
        if let Some(&owner) = self.addresses.get(&address) {
            return Err(SimError::DuplicateAddress { address, owner });
        }

        self.addresses.insert(address, id);
        if let Some(node) = self.nodes.get_mut(id.index()) {
            node.set_address(address);
        }
        debug!(node = %id, %address, "address assigned");
        Ok(address)
    }

    /// Attach the given nodes to one shared wireless medium.
    ///
    /// Stations send everything through the access point, if there is one
    /// among `nodes`. Audibility between the nodes is fixed here from their
    /// positions and `range`.
    ///
    /// # Errors
    ///
    /// - [`SimError::MediumAlreadyInstalled`] on a second call.
    /// - [`SimError::NodeNotFound`] if any node does not exist.
    /// - [`SimError::MultipleAccessPoints`] if `nodes` holds more than one
    ///   access point.
    pub fn install_wifi(
        &mut self,
        nodes: &[NodeId],
        config: MacConfig,
        range: Range,
        loss: PacketLoss,
    ) -> Result<(), SimError> {
        if self.medium.is_some() {
            return Err(SimError::MediumAlreadyInstalled);
        }

        let mut access_point = None;
        let mut positions = vec![None; self.nodes.len()];
        for &id in nodes {
            let node = self.node(id)?;
            if node.role() == Role::AccessPoint {
                if let Some(first) = access_point {
                    return Err(SimError::MultipleAccessPoints { first, second: id });
                }
                access_point = Some(id);
            }
            positions[id.index()] = Some(node.position());
        }

        for &id in nodes {
            let node = &mut self.nodes[id.index()];
            let uplink = match node.role() {
                Role::AccessPoint => None,
                Role::Station => access_point,
            };
            node.attach(Mac::new(id, uplink, config, &mut self.rng));
        }

        let medium = Medium::new(&positions, range, loss);
        for &id in nodes {
            debug!(node = %id, neighbours = ?medium.neighbours(id), "attached to medium");
        }
        self.medium = Some(medium);
        self.mac_config = config;
        Ok(())
    }

    /// `true` if frames sent by `a` reach `b`.
    pub fn can_hear(&self, a: NodeId, b: NodeId) -> Result<bool, SimError> {
        self.node(a)?;
        self.node(b)?;
        let medium = self.medium.as_ref().ok_or(SimError::MediumNotInstalled)?;
        Ok(medium.neighbours(a).contains(&b))
    }

    /// Install a flow and schedule its first packet.
    ///
    /// # Errors
    ///
    /// - [`SimError::AlreadyRun`] once the simulation has run.
    /// - [`SimError::MediumNotInstalled`] before
    ///   [`install_wifi`](Simulator::install_wifi).
    /// - [`SimError::AddressNotAssigned`] if either end point is unknown.
    /// - [`SimError::NotAttached`] if either end point has no MAC.
    /// - [`SimError::InvalidFlow`] for a flow that loops back to its source,
    ///   has a zero interval, or an empty `start..stop` window.
    pub fn add_flow(&mut self, spec: FlowSpec) -> Result<FlowId, SimError> {
        if self.has_run {
            return Err(SimError::AlreadyRun);
        }
        let medium = self.medium.as_ref().ok_or(SimError::MediumNotInstalled)?;

        let source = self.lookup(spec.source)?;
        let destination = self.lookup(*spec.destination.ip())?;
        for node in [source, destination] {
            if !medium.is_attached(node) {
                return Err(SimError::NotAttached { node });
            }
        }

        let invalid = |reason| SimError::InvalidFlow { flow: spec, reason };
        if source == destination {
            return Err(invalid("source and destination are the same node"));
        }
        if spec.traffic.interval().is_zero() {
            return Err(invalid("interval must be positive"));
        }
        if spec.start >= spec.stop {
            return Err(invalid("start must precede stop"));
        }

        let id = FlowId::new(self.flows.len() as u32);
        self.flows.push(Flow {
            id,
            spec,
            source,
            destination,
            stats: FlowStats::default(),
        });
        self.queue.push(spec.start, Event::AppSend { flow: id });
        debug!(flow = %id, %spec, ?spec.traffic, "flow installed");
        Ok(id)
    }

    pub fn flow_stats(&self, id: FlowId) -> Option<FlowStats> {
        self.flows.get(id.index()).map(|flow| flow.stats)
    }

    /// Point-in-time snapshot of every node and every flow.
    pub fn stats(&self) -> SimulatorStats {
        SimulatorStats {
            now: self.now,
            nodes: self.nodes.iter().map(Node::stats).collect(),
            flows: self
                .flows
                .iter()
                .map(|flow| (flow.id, flow.stats))
                .collect(),
        }
    }

    /// Process every event due at or before `horizon`, then stop.
    ///
    /// Events still pending after the horizon are discarded: a simulator
    /// runs once.
    ///
    /// # Errors
    ///
    /// - [`SimError::AlreadyRun`] on a second call.
    /// - [`SimError::EventBudgetExceeded`] if the event limit set with
    ///   [`set_event_limit`](Simulator::set_event_limit) is reached.
    pub fn run(&mut self, horizon: SimTime) -> Result<RunSummary, SimError> {
        if self.has_run {
            return Err(SimError::AlreadyRun);
        }
        self.has_run = true;
        debug!(%horizon, flows = self.flows.len(), "run started");

        let mut events = 0u64;
        while let Some((time, event)) = self.queue.pop_until(horizon) {
            events += 1;
            if let Some(limit) = self.event_limit.filter(|&limit| events > limit) {
                warn!(limit, at = %time, "event budget exceeded");
                return Err(SimError::EventBudgetExceeded { limit, at: time });
            }
            self.now = time;
            self.handle(event);
        }

        let summary = RunSummary {
            events,
            end_time: self.now,
            pending: self.queue.len(),
        };
        self.queue.clear();
        info!(%summary, on_air = self.medium.as_ref().map_or(0, Medium::active), "run completed");
        Ok(summary)
    }

    fn handle(&mut self, event: Event) {
        match event {
            Event::AppSend { flow } => self.app_send(flow),
            Event::AccessGranted { node, generation } => {
                self.with_mac(node, |mac, now, _, out| mac.on_access(generation, now, out))
            }
            Event::Transmit { node, frame } => {
                let blocked = self
                    .medium
                    .as_ref()
                    .is_some_and(|medium| medium.is_transmitting(node));
                if blocked {
                    trace!(%node, frame = frame.label(), "already transmitting");
                    self.with_mac(node, |mac, now, rng, out| {
                        mac.on_transmit_blocked(&frame, now, rng, out)
                    });
                    return;
                }
                self.with_mac(node, |mac, now, _, _| mac.on_transmit(&frame, now));
                self.start_transmission(frame);
            }
            Event::TxEnd { tx } => self.end_transmission(tx),
            Event::Timeout { node, generation } => {
                trace!(%node, "response timeout");
                self.with_mac(node, |mac, now, rng, out| {
                    mac.on_timeout(generation, now, rng, out)
                })
            }
        }
    }

    /// Runs `f` against the node's MAC, then carries out what it asked for.
    fn with_mac<F>(&mut self, node: NodeId, f: F)
    where
        F: FnOnce(&mut Mac, SimTime, &mut ChaChaRng, &mut Vec<MacAction>),
    {
        let now = self.now;
        let mut out = Vec::new();
        if let Some(mac) = self.nodes.get_mut(node.index()).and_then(Node::mac_mut) {
            f(mac, now, &mut self.rng, &mut out);
        }
        self.apply(node, out);
    }

    fn apply(&mut self, node: NodeId, actions: Vec<MacAction>) {
        for action in actions {
            match action {
                MacAction::Schedule(at, event) => self.queue.push(at, event),
                MacAction::Transmit(frame) => self.start_transmission(frame),
                MacAction::Deliver(packet) => self.deliver(node, packet),
                MacAction::Dropped(packets, reason) => {
                    for packet in packets {
                        trace!(%node, packet = %packet.id(), ?reason, "packet dropped");
                        let Some(flow) = self.flows.get_mut(packet.flow().index()) else {
                            continue;
                        };
                        match reason {
                            DropReason::QueueFull => flow.stats.queue_drops += 1,
                            DropReason::RetryLimit => flow.stats.retry_drops += 1,
                        }
                    }
                }
            }
        }
    }

    fn start_transmission(&mut self, frame: Frame) {
        let Some(medium) = self.medium.as_mut() else {
            return;
        };
        let now = self.now;
        let end = now + frame.airtime(&self.mac_config);
        trace!(
            node = %frame.transmitter,
            to = %frame.receiver,
            frame = frame.label(),
            %end,
            "transmission started"
        );

        let (tx, started) = medium.start(frame);
        self.queue.push(end, Event::TxEnd { tx });
        for node in started.busy {
            if let Some(mac) = self.nodes.get_mut(node.index()).and_then(Node::mac_mut) {
                mac.on_medium_busy(now);
            }
        }
    }

    fn end_transmission(&mut self, tx: TxId) {
        let Some(medium) = self.medium.as_mut() else {
            return;
        };
        let Some(Finished {
            frame,
            delivered,
            corrupted,
            idle,
        }) = medium.finish(tx, &mut self.rng)
        else {
            return;
        };

        self.with_mac(frame.transmitter, |mac, now, _, out| mac.on_tx_end(now, out));
        for node in corrupted {
            trace!(%node, from = %frame.transmitter, frame = frame.label(), "reception lost");
            self.with_mac(node, |mac, _, _, _| mac.on_corrupted());
        }
        for node in delivered {
            let frame = frame.clone();
            self.with_mac(node, move |mac, now, rng, out| {
                mac.on_receive(frame, now, rng, out)
            });
        }
        for node in idle {
            self.with_mac(node, |mac, now, _, out| mac.on_medium_idle(now, out));
        }
    }

    fn app_send(&mut self, id: FlowId) {
        let now = self.now;
        let Some(flow) = self.flows.get_mut(id.index()) else {
            return;
        };
        if !flow.can_send(now) {
            return;
        }
        flow.stats.sent += 1;

        let packet = Packet::new(
            self.packet_ids.generate(),
            flow.id,
            Direction::Request,
            flow.source,
            flow.destination,
            flow.spec.payload_size,
        );
        let source = flow.source;
        if let Some(next) = flow.next_send(now) {
            self.queue.push(next, Event::AppSend { flow: id });
        }
        self.with_mac(source, |mac, now, _, out| mac.enqueue(packet, now, out));
    }

    /// A packet reached its destination node.
    fn deliver(&mut self, node: NodeId, packet: Packet) {
        let Some(flow) = self.flows.get_mut(packet.flow().index()) else {
            return;
        };
        trace!(%node, flow = %flow.id, packet = %packet.id(), direction = ?packet.direction(), "delivered");

        match packet.direction() {
            Direction::Request => {
                flow.stats.received += 1;
                if !flow.spec.traffic.is_echo() {
                    return;
                }
                let reply = Packet::new(
                    self.packet_ids.generate(),
                    flow.id,
                    Direction::Reply,
                    node,
                    packet.source(),
                    packet.payload(),
                );
                self.with_mac(node, |mac, now, _, out| mac.enqueue(reply, now, out));
            }
            Direction::Reply => flow.stats.replies += 1,
        }
    }
}
