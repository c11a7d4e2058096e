//! Ready-made hidden-station scenarios, from configuration to report.

use crate::{
    config::{Scenario, ScenarioConfig},
    controller::{CompletedRun, RunController},
    error::{ConfigurationError, Error},
    link::LinkConfig,
    report::ThroughputReport,
    topology::{Topology, TopologyBuilder},
    traffic::{Flow, FlowKind, TrafficPlan},
};
use std::net::SocketAddrV4;
use tracing::info;
use wlansim_core::{SimTime, Simulator};

/// Port of the echo server, and of the first one when there are several.
pub const ECHO_PORT: u16 = 9;

/// Gap between two requests of an echo flow.
pub const ECHO_INTERVAL: SimTime = SimTime::from_millis(100);

const ECHO_BUDGET: u64 = 3;
const MESH_BUDGET: u64 = 1;

/// The outcome of [`run_scenario`].
#[derive(Debug, Clone)]
pub struct ScenarioOutcome {
    pub run: CompletedRun,
    pub report: ThroughputReport,
}

pub fn build_topology(config: &ScenarioConfig) -> Result<Topology, ConfigurationError> {
    TopologyBuilder::new()
        .set_stations(config.station_count)
        .set_range(config.visibility_range)
        .set_subnet(config.subnet.clone())
        .build()
}

/// The traffic plan of `config.scenario` over `topology`.
pub fn traffic_plan(
    config: &ScenarioConfig,
    topology: &Topology,
) -> Result<TrafficPlan, ConfigurationError> {
    let start = config.start();
    let stop = config.horizon();
    let ap = topology.access_point().address;
    let mut plan = TrafficPlan::builder(topology);

    match config.scenario {
        Scenario::Uplink => {
            for station in topology.stations() {
                plan.add_flow(Flow {
                    label: station.index.to_string(),
                    source: station.address,
                    destination: SocketAddrV4::new(ap, ECHO_PORT),
                    payload_size: config.payload_size,
                    kind: FlowKind::Saturating {
                        interval: config.interval,
                        max_packets: config.max_packets,
                    },
                    start,
                    stop,
                    observed: true,
                })?;
            }
        }
        Scenario::Echo => {
            let kind = FlowKind::BoundedEcho {
                budget: config.echo_budget.unwrap_or(ECHO_BUDGET),
                interval: ECHO_INTERVAL,
            };
            for (i, station) in topology.stations().iter().enumerate() {
                let port = u16::try_from(i)
                    .ok()
                    .and_then(|i| ECHO_PORT.checked_add(i))
                    .ok_or_else(|| {
                        ConfigurationError::invalid(
                            "station_count",
                            config.station_count,
                            "too many stations for one echo port each",
                        )
                    })?;
                plan.add_flow(Flow {
                    label: station.index.to_string(),
                    source: station.address,
                    destination: SocketAddrV4::new(ap, port),
                    payload_size: config.payload_size,
                    kind,
                    start: start + SimTime::from_secs(i as u64),
                    stop,
                    observed: true,
                })?;
            }
        }
        Scenario::Mesh => {
            let kind = FlowKind::BoundedEcho {
                budget: config.echo_budget.unwrap_or(MESH_BUDGET),
                interval: ECHO_INTERVAL,
            };
            for source in topology.stations() {
                for destination in topology.stations() {
                    if source.index == destination.index {
                        continue;
                    }
                    plan.add_flow(Flow {
                        label: format!("{}->{}", source.index, destination.index),
                        source: source.address,
                        destination: SocketAddrV4::new(destination.address, ECHO_PORT),
                        payload_size: config.payload_size,
                        kind,
                        start,
                        stop,
                        observed: true,
                    })?;
                }
            }
        }
    }
    Ok(plan.build())
}

/// Build, run and report the scenario `config` describes on a
/// [`Simulator`] seeded with `config.seed`.
///
/// Every configuration error surfaces before the simulator is touched.
pub fn run_scenario(config: &ScenarioConfig) -> Result<ScenarioOutcome, Error> {
    config.validate()?;
    let topology = build_topology(config)?;
    let link = LinkConfig::new(config.handshake, config.aggregation_units, config.payload_size)?
        .with_packet_loss(config.packet_loss)
        .with_data_rate(config.data_rate);
    let plan = traffic_plan(config, &topology)?;
    info!(
        scenario = %config.scenario,
        stations = config.station_count,
        flows = plan.len(),
        handshake = link.handshake(),
        max_ampdu_size = link.max_ampdu_size(),
        data_rate = %link.data_rate(),
        horizon = %config.horizon(),
        "scenario ready"
    );

    let mut simulator = Simulator::new();
    simulator.set_seed(config.seed);
    let mut controller = RunController::new(simulator);
    controller.configure(&topology, &link, &plan, config.horizon())?;
    let run = controller.execute()?;

    let report = ThroughputReport::from_run(&run, config.window())?;
    Ok(ScenarioOutcome { run, report })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uplink_end_to_end() {
        let config = ScenarioConfig::default();
        let outcome = run_scenario(&config).unwrap();
        let bound = config.window().as_nanos() / config.interval.as_nanos();

        let labels: Vec<&str> = outcome
            .report
            .samples()
            .iter()
            .map(|sample| sample.label.as_str())
            .collect();
        assert_eq!(labels, vec!["1", "2", "3", "4"]);
        for (flow, sample) in outcome.run.flows.iter().zip(outcome.report.samples()) {
            assert!(flow.received <= bound, "{}: {}", flow.label, flow.received);
            assert!(sample.mbps >= 0.0);
            assert_eq!(
                sample.mbps,
                crate::report::throughput_mbps(flow.received, 1472, 10.0)
            );
        }
        assert!(
            outcome.report.total_mbps() > 0.0,
            "hidden stations still get something through"
        );
        assert!(outcome.run.nodes.iter().any(|node| node.mac.collisions > 0));
    }

    #[test]
    fn saturating_cap() {
        let config = ScenarioConfig {
            max_packets: Some(5),
            simulation_duration_seconds: 0.5,
            ..Default::default()
        };
        let outcome = run_scenario(&config).unwrap();

        assert_eq!(outcome.run.flows.len(), 4);
        for flow in &outcome.run.flows {
            let stats = flow.stats.unwrap();
            assert_eq!(stats.sent, 5, "{}", flow.label);
            assert!(flow.received <= 5, "{}: {}", flow.label, flow.received);
        }
    }

    #[test]
    fn data_rate_bounds_throughput() {
        let fast = ScenarioConfig {
            simulation_duration_seconds: 0.5,
            ..Default::default()
        };
        let slow = ScenarioConfig {
            data_rate: wlansim_core::DataRate::HT_MCS0,
            ..fast.clone()
        };

        let fast = run_scenario(&fast).unwrap().report.total_mbps();
        let slow = run_scenario(&slow).unwrap().report.total_mbps();
        assert!(slow < 6.5, "{slow}");
        assert_ne!(slow, fast);
    }

    #[test]
    fn identical_runs() {
        let config = ScenarioConfig {
            simulation_duration_seconds: 0.5,
            seed: 7,
            ..Default::default()
        };

        let counts = || -> Vec<u64> {
            run_scenario(&config)
                .unwrap()
                .run
                .flows
                .iter()
                .map(|flow| flow.received)
                .collect()
        };
        assert_eq!(counts(), counts());
    }

    #[test]
    fn echo_budget_bounds_requests() {
        let config = ScenarioConfig {
            scenario: Scenario::Echo,
            ..Default::default()
        };
        let outcome = run_scenario(&config).unwrap();

        assert_eq!(outcome.run.flows.len(), 4);
        for flow in &outcome.run.flows {
            let stats = flow.stats.unwrap();
            assert!(flow.received <= 3, "{}: {}", flow.label, flow.received);
            assert_eq!(stats.sent, 3);
            assert_eq!(stats.replies, flow.received, "{}", flow.label);
        }
    }

    #[test]
    fn echo_ports_and_starts() {
        let config = ScenarioConfig {
            scenario: Scenario::Echo,
            ..Default::default()
        };
        let topology = build_topology(&config).unwrap();
        let plan = traffic_plan(&config, &topology).unwrap();

        let ports: Vec<u16> = plan.flows().iter().map(|f| f.destination.port()).collect();
        let starts: Vec<SimTime> = plan.flows().iter().map(|f| f.start).collect();
        assert_eq!(ports, vec![9, 10, 11, 12]);
        assert_eq!(
            starts,
            (1..=4).map(SimTime::from_secs).collect::<Vec<_>>()
        );
    }

    #[test]
    fn echo_start_past_horizon() {
        let config = ScenarioConfig {
            scenario: Scenario::Echo,
            simulation_duration_seconds: 2.0,
            ..Default::default()
        };

        assert!(matches!(
            run_scenario(&config),
            Err(Error::Configuration(ConfigurationError::InvalidParameter {
                parameter: "stop",
                ..
            }))
        ));
    }

    #[test]
    fn mesh_relays_through_access_point() {
        let config = ScenarioConfig {
            scenario: Scenario::Mesh,
            simulation_duration_seconds: 1.0,
            ..Default::default()
        };
        let outcome = run_scenario(&config).unwrap();

        assert_eq!(outcome.run.flows.len(), 12);
        assert_eq!(outcome.run.flows[0].label, "1->2");
        assert!(outcome.run.flows.iter().all(|flow| flow.received <= 1));
        assert!(outcome.run.flows.iter().any(|flow| flow.received == 1));
    }

    #[test]
    fn handshake_and_aggregation() {
        let config = ScenarioConfig {
            handshake: true,
            aggregation_units: 4,
            simulation_duration_seconds: 0.5,
            ..Default::default()
        };
        let outcome = run_scenario(&config).unwrap();

        assert_eq!(outcome.report.samples().len(), 4);
        assert!(outcome.report.total_mbps() > 0.0);
    }

    #[test]
    fn configuration_errors_come_first() {
        let config = ScenarioConfig {
            station_count: 1,
            ..Default::default()
        };

        let error = run_scenario(&config).unwrap_err();
        assert!(matches!(
            error,
            Error::Configuration(ConfigurationError::HiddenStationsUnsatisfiable { value: 1, .. })
        ));
        assert_eq!(error.exit_code(), 2);
    }
}
