use crate::{
    engine::{RunResult, SimulationEngine},
    error::{ConfigurationError, Error, SimulationEngineError},
    link::LinkConfig,
    topology::Topology,
    traffic::TrafficPlan,
};
use std::fmt;
use tracing::{debug, info, warn};
use wlansim_core::{FlowStats, NodeStats, SimTime};

/// Lifecycle of a [`RunController`].
///
/// `Unconfigured → Configured → Running → Completed`, or `Faulted` from
/// any step that touched the engine. `Completed` and `Faulted` are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Unconfigured,
    Configured,
    Running,
    Completed,
    Faulted,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self {
            RunState::Unconfigured => "unconfigured",
            RunState::Configured => "configured",
            RunState::Running => "running",
            RunState::Completed => "completed",
            RunState::Faulted => "faulted",
        };
        f.write_str(state)
    }
}

/// What a flow delivered.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowOutcome {
    pub label: String,
    pub payload_size: u64,
    pub observed: bool,
    /// The flow's received count at its destination.
    pub received: u64,
    /// Detailed counters, when the engine keeps them.
    pub stats: Option<FlowStats>,
}

/// Counters of a completed run. The engine is gone by then.
#[derive(Debug, Clone)]
pub struct CompletedRun {
    pub horizon: SimTime,
    /// In plan declaration order.
    pub flows: Vec<FlowOutcome>,
    pub nodes: Vec<NodeStats>,
}

struct ScheduledFlow<H> {
    label: String,
    payload_size: u64,
    observed: bool,
    counter: H,
}

/// Owns the engine for the lifetime of one run.
///
/// ```
/// use wlansim::{LinkConfig, RunController, RunState, TopologyBuilder, TrafficPlan};
/// use wlansim_core::{SimTime, Simulator};
///
/// let topology = TopologyBuilder::new().build().unwrap();
/// let link = LinkConfig::new(false, 1, 1472).unwrap();
/// let plan = TrafficPlan::builder(&topology).build();
///
/// let mut controller = RunController::new(Simulator::new());
/// controller
///     .configure(&topology, &link, &plan, SimTime::from_secs(1))
///     .unwrap();
/// let run = controller.execute().unwrap();
///
/// assert_eq!(controller.state(), RunState::Completed);
/// assert_eq!(run.nodes.len(), 5);
/// ```
pub struct RunController<E: SimulationEngine> {
    engine: Option<E>,
    state: RunState,
    horizon: SimTime,
    flows: Vec<ScheduledFlow<E::ReceivedCountHandle>>,
}

impl<E: SimulationEngine> RunController<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine: Some(engine),
            state: RunState::Unconfigured,
            horizon: SimTime::ZERO,
            flows: Vec::new(),
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Hand the scenario to the engine.
    ///
    /// Every parameter is checked before the engine is touched: a
    /// [`ConfigurationError`] leaves the controller `Unconfigured`. An
    /// engine refusal leaves it `Faulted`.
    pub fn configure(
        &mut self,
        topology: &Topology,
        link: &LinkConfig,
        plan: &TrafficPlan,
        horizon: SimTime,
    ) -> Result<(), Error> {
        self.expect_state(RunState::Unconfigured, "configure")?;

        if horizon.is_zero() {
            return Err(ConfigurationError::invalid("horizon", horizon, "must be positive").into());
        }
        if let Some(flow) = plan.flows().iter().find(|flow| flow.stop > horizon) {
            return Err(ConfigurationError::FlowBeyondHorizon {
                label: flow.label.clone(),
                stop: flow.stop,
                horizon,
            }
            .into());
        }

        match self.bind(topology, link, plan) {
            Ok(flows) => {
                self.flows = flows;
                self.horizon = horizon;
                self.transition(RunState::Configured);
                Ok(())
            }
            Err(error) => {
                warn!(%error, "engine refused the scenario");
                self.engine = None;
                self.transition(RunState::Faulted);
                Err(error.into())
            }
        }
    }

    fn bind(
        &mut self,
        topology: &Topology,
        link: &LinkConfig,
        plan: &TrafficPlan,
    ) -> Result<Vec<ScheduledFlow<E::ReceivedCountHandle>>, SimulationEngineError> {
        let Some(engine) = self.engine.as_mut() else {
            return Err(SimulationEngineError::Faulted {
                reason: "engine already released".to_owned(),
            });
        };

        let handles: Vec<E::NodeHandle> = topology
            .nodes()
            .iter()
            .map(|node| engine.create_node(node.role, node.position))
            .collect();

        for (node, &handle) in topology.nodes().iter().zip(&handles) {
            let echoed = engine.assign_address(handle, node.address)?;
            if echoed != node.address {
                return Err(SimulationEngineError::AddressMismatch {
                    node: node.index,
                    expected: node.address,
                    echoed,
                });
            }
            debug!(
                index = node.index,
                role = %node.role,
                position = %node.position,
                address = %node.address,
                ?handle,
                "node created"
            );
        }

        engine.install_link(&handles, link, topology.range())?;

        plan.flows()
            .iter()
            .map(|flow| -> Result<_, SimulationEngineError> {
                let counter = engine.schedule_flow(flow)?;
                debug!(%flow, ?counter, "flow scheduled");
                Ok(ScheduledFlow {
                    label: flow.label.clone(),
                    payload_size: flow.payload_size,
                    observed: flow.observed,
                    counter,
                })
            })
            .collect()
    }

    /// Run the configured scenario to the horizon, collect the counters and
    /// release the engine.
    pub fn execute(&mut self) -> Result<CompletedRun, Error> {
        self.expect_state(RunState::Configured, "execute")?;
        let Some(mut engine) = self.engine.take() else {
            return Err(Error::InvalidState {
                operation: "execute",
                state: self.state,
            });
        };

        self.transition(RunState::Running);
        if let RunResult::Faulted(reason) = engine.run(self.horizon) {
            warn!(%reason, "run faulted");
            self.transition(RunState::Faulted);
            return Err(SimulationEngineError::Faulted { reason }.into());
        }
        self.transition(RunState::Completed);

        let mut flows = Vec::with_capacity(self.flows.len());
        for flow in self.flows.drain(..) {
            let received = engine.read_received_count(flow.counter)?;
            flows.push(FlowOutcome {
                label: flow.label,
                payload_size: flow.payload_size,
                observed: flow.observed,
                received,
                stats: engine.flow_stats(flow.counter),
            });
        }
        let run = CompletedRun {
            horizon: self.horizon,
            flows,
            nodes: engine.node_stats(),
        };
        info!(horizon = %run.horizon, flows = run.flows.len(), "run completed");
        Ok(run)
    }

    fn expect_state(&self, expected: RunState, operation: &'static str) -> Result<(), Error> {
        if self.state != expected {
            return Err(Error::InvalidState {
                operation,
                state: self.state,
            });
        }
        Ok(())
    }

    fn transition(&mut self, state: RunState) {
        debug!(from = %self.state, to = %state, "run state");
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        topology::TopologyBuilder,
        traffic::{Flow, FlowKind},
    };
    use std::net::{Ipv4Addr, SocketAddrV4};
    use wlansim_core::{Position, Range, Role, Simulator};

    /// Accepts everything, then faults or completes on `run`.
    #[derive(Default)]
    struct MockEngine {
        nodes: usize,
        flows: Vec<u64>,
        fault: Option<String>,
        skew_addresses: bool,
        ran: bool,
    }

    impl SimulationEngine for MockEngine {
        type NodeHandle = usize;
        type ReceivedCountHandle = usize;

        fn create_node(&mut self, _: Role, _: Position) -> usize {
            self.nodes += 1;
            self.nodes - 1
        }

        fn assign_address(
            &mut self,
            _: usize,
            address: Ipv4Addr,
        ) -> Result<Ipv4Addr, SimulationEngineError> {
            if self.skew_addresses {
                return Ok(Ipv4Addr::from(u32::from(address) + 100));
            }
            Ok(address)
        }

        fn install_link(
            &mut self,
            _: &[usize],
            _: &LinkConfig,
            _: Range,
        ) -> Result<(), SimulationEngineError> {
            Ok(())
        }

        fn schedule_flow(&mut self, flow: &Flow) -> Result<usize, SimulationEngineError> {
            self.flows.push(flow.payload_size);
            Ok(self.flows.len() - 1)
        }

        fn run(&mut self, _: SimTime) -> RunResult {
            self.ran = true;
            match &self.fault {
                Some(reason) => RunResult::Faulted(reason.clone()),
                None => RunResult::Completed,
            }
        }

        fn read_received_count(&self, handle: usize) -> Result<u64, SimulationEngineError> {
            assert!(self.ran, "counter read before the run");
            self.flows
                .get(handle)
                .map(|&payload| payload / 100)
                .ok_or_else(|| SimulationEngineError::UnknownCounter {
                    handle: handle.to_string(),
                })
        }
    }

    fn scenario() -> (Topology, LinkConfig, TrafficPlan) {
        let topology = TopologyBuilder::new().build().unwrap();
        let mut builder = TrafficPlan::builder(&topology);
        for (i, station) in topology.stations().iter().enumerate() {
            builder
                .add_flow(Flow {
                    label: (i + 1).to_string(),
                    source: station.address,
                    destination: SocketAddrV4::new(topology.access_point().address, 9),
                    payload_size: 100 * (i as u64 + 1),
                    kind: FlowKind::Saturating {
                        interval: SimTime::from_micros(20),
                        max_packets: None,
                    },
                    start: SimTime::from_secs(1),
                    stop: SimTime::from_secs(11),
                    observed: true,
                })
                .unwrap();
        }
        let plan = builder.build();
        (topology, LinkConfig::new(false, 1, 1472).unwrap(), plan)
    }

    #[test]
    fn completed_run() {
        let (topology, link, plan) = scenario();
        let mut controller = RunController::new(MockEngine::default());

        controller
            .configure(&topology, &link, &plan, SimTime::from_secs(11))
            .unwrap();
        assert_eq!(controller.state(), RunState::Configured);

        let run = controller.execute().unwrap();
        assert_eq!(controller.state(), RunState::Completed);
        let counts: Vec<(&str, u64)> = run
            .flows
            .iter()
            .map(|flow| (flow.label.as_str(), flow.received))
            .collect();
        assert_eq!(counts, vec![("1", 1), ("2", 2), ("3", 3), ("4", 4)]);
        assert!(run.flows.iter().all(|flow| flow.stats.is_none()));
    }

    #[test]
    fn faulted_run() {
        let (topology, link, plan) = scenario();
        let mut controller = RunController::new(MockEngine {
            fault: Some("radio on fire".to_owned()),
            ..MockEngine::default()
        });
        controller
            .configure(&topology, &link, &plan, SimTime::from_secs(11))
            .unwrap();

        let error = controller.execute().unwrap_err();
        assert_eq!(controller.state(), RunState::Faulted);
        assert_eq!(error.exit_code(), 3);
        assert_eq!(error.to_string(), "Simulation faulted: radio on fire");

        assert!(matches!(
            controller.execute(),
            Err(Error::InvalidState {
                operation: "execute",
                state: RunState::Faulted
            })
        ));
    }

    #[test]
    fn flow_beyond_horizon() {
        let (topology, link, plan) = scenario();
        let mut controller = RunController::new(MockEngine::default());

        let error = controller
            .configure(&topology, &link, &plan, SimTime::from_secs(10))
            .unwrap_err();
        assert!(matches!(
            error,
            Error::Configuration(ConfigurationError::FlowBeyondHorizon { .. })
        ));
        assert_eq!(error.exit_code(), 2);
        assert_eq!(controller.state(), RunState::Unconfigured);
        assert_eq!(controller.engine.as_ref().map(|engine| engine.nodes), Some(0));
    }

    #[test]
    fn stop_at_horizon_is_accepted() {
        let (topology, link, plan) = scenario();
        let mut controller = RunController::new(MockEngine::default());

        assert!(
            controller
                .configure(&topology, &link, &plan, SimTime::from_secs(11))
                .is_ok()
        );
    }

    #[test]
    fn echoed_address_mismatch() {
        let (topology, link, plan) = scenario();
        let mut controller = RunController::new(MockEngine {
            skew_addresses: true,
            ..MockEngine::default()
        });

        let error = controller
            .configure(&topology, &link, &plan, SimTime::from_secs(11))
            .unwrap_err();
        assert!(matches!(
            error,
            Error::Engine(SimulationEngineError::AddressMismatch { node: 0, .. })
        ));
        assert_eq!(controller.state(), RunState::Faulted);
    }

    #[test]
    fn execute_before_configure() {
        let mut controller = RunController::new(MockEngine::default());

        assert!(matches!(
            controller.execute(),
            Err(Error::InvalidState {
                operation: "execute",
                state: RunState::Unconfigured
            })
        ));
    }

    #[test]
    fn configure_twice() {
        let (topology, link, plan) = scenario();
        let mut controller = RunController::new(Simulator::new());
        controller
            .configure(&topology, &link, &plan, SimTime::from_secs(11))
            .unwrap();

        assert!(matches!(
            controller.configure(&topology, &link, &plan, SimTime::from_secs(11)),
            Err(Error::InvalidState {
                state: RunState::Configured,
                ..
            })
        ));
    }
}
