/*!
# Hidden-station scenario harness

Builds a single WLAN cell in which stations share an access point but
cannot hear each other, drives traffic through it and reports how much
each flow got across.

The pieces follow the order data flows through them:

1. [`TopologyBuilder`] places the access point and its stations and
   assigns their addresses;
2. [`LinkConfig`] holds the handshake policy and the aggregation budget;
3. [`TrafficPlan`] declares the flows;
4. [`RunController`] hands everything to a [`SimulationEngine`] and runs it
   to the horizon;
5. [`ThroughputReport`] turns received counts into Mbit/s.

[`run_scenario`] chains all of them for the preset scenarios of
[`ScenarioConfig`], using [`wlansim_core::Simulator`] as the engine.

```
use wlansim::{Scenario, ScenarioConfig, run_scenario};

let config = ScenarioConfig {
    scenario: Scenario::Echo,
    ..ScenarioConfig::default()
};
let outcome = run_scenario(&config).unwrap();

assert_eq!(outcome.report.samples().len(), 4);
```
*/

mod address;
mod config;
mod controller;
mod engine;
mod error;
mod link;
mod report;
mod scenario;
mod topology;
mod traffic;

pub use self::{
    address::AddressAllocator,
    config::{MAX_PAYLOAD_SIZE, Scenario, ScenarioConfig},
    controller::{CompletedRun, FlowOutcome, RunController, RunState},
    engine::{RunResult, SimulationEngine},
    error::{ConfigurationError, Error, SimulationEngineError},
    link::{AGGREGATION_OVERHEAD, LinkConfig},
    report::{ThroughputReport, ThroughputSample, throughput_mbps},
    scenario::{
        ECHO_INTERVAL, ECHO_PORT, ScenarioOutcome, build_topology, run_scenario, traffic_plan,
    },
    topology::{Topology, TopologyBuilder, TopologyNode},
    traffic::{Flow, FlowKind, TrafficPlan, TrafficPlanBuilder},
};
