use crate::{address::AddressAllocator, error::ConfigurationError};
use anyhow::bail;
use std::{fmt, str::FromStr};
use wlansim_core::{DataRate, PacketLoss, SimTime};

/// Largest payload a single UDP datagram carries over IPv4.
pub const MAX_PAYLOAD_SIZE: u64 = 65_507;

/// Which traffic plan a scenario runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Scenario {
    /// One saturating flow per station to the access point.
    #[default]
    Uplink,
    /// One bounded echo flow per station to the access point, each on its
    /// own port with staggered start offsets.
    Echo,
    /// Every station echoes to every other station through the access
    /// point.
    Mesh,
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scenario::Uplink => f.write_str("uplink"),
            Scenario::Echo => f.write_str("echo"),
            Scenario::Mesh => f.write_str("mesh"),
        }
    }
}

impl FromStr for Scenario {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uplink" => Ok(Scenario::Uplink),
            "echo" => Ok(Scenario::Echo),
            "mesh" => Ok(Scenario::Mesh),
            _ => bail!("Unknown scenario `{s}', expecting `uplink', `echo' or `mesh'"),
        }
    }
}

/// Every knob of a scenario run.
///
/// The first five fields are the classic hidden-station parameters, the
/// rest default to the values of the reference scenarios.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioConfig {
    pub station_count: usize,
    pub payload_size: u64,
    /// `U`, the number of payloads one aggregated frame may carry.
    pub aggregation_units: u64,
    /// RTS/CTS before every transmission.
    pub handshake: bool,
    /// Length of the observation window.
    pub simulation_duration_seconds: f64,
    pub visibility_range: f64,
    /// When traffic starts. The horizon is this plus the duration.
    pub start_offset_seconds: f64,
    pub scenario: Scenario,
    /// Requests per echo flow, `None` for the scenario's own default.
    pub echo_budget: Option<u64>,
    pub seed: u64,
    /// Gap between two packets of a saturating flow.
    pub interval: SimTime,
    /// Packets each saturating flow sends at most, `None` for no cap.
    pub max_packets: Option<u64>,
    /// PHY rate of data frames.
    pub data_rate: DataRate,
    pub subnet: AddressAllocator,
    pub packet_loss: PacketLoss,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            station_count: 4,
            payload_size: 1472,
            aggregation_units: 1,
            handshake: false,
            simulation_duration_seconds: 10.0,
            visibility_range: wlansim_core::defaults::DEFAULT_RANGE,
            start_offset_seconds: 1.0,
            scenario: Scenario::Uplink,
            echo_budget: None,
            seed: 0,
            interval: SimTime::from_micros(20),
            max_packets: None,
            data_rate: wlansim_core::defaults::DEFAULT_DATA_RATE,
            subnet: AddressAllocator::default(),
            packet_loss: PacketLoss::None,
        }
    }
}

impl ScenarioConfig {
    /// Check the parameters a topology or traffic plan cannot check on its
    /// own.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        use ConfigurationError as E;

        if self.station_count == 0 {
            return Err(E::invalid(
                "station_count",
                self.station_count,
                "at least one station is required",
            ));
        }
        if self.payload_size > MAX_PAYLOAD_SIZE {
            return Err(E::invalid(
                "payload_size",
                self.payload_size,
                "larger than a UDP datagram can carry",
            ));
        }
        if self.aggregation_units == 0 {
            return Err(E::invalid(
                "aggregation_unit_count",
                self.aggregation_units,
                "must be at least 1",
            ));
        }
        let duration = self.simulation_duration_seconds;
        if !duration.is_finite() || duration <= 0.0 || SimTime::from_secs_f64(duration).is_zero() {
            return Err(E::invalid(
                "simulation_duration_seconds",
                duration,
                "must be finite and positive",
            ));
        }
        if !self.visibility_range.is_finite() || self.visibility_range <= 0.0 {
            return Err(E::invalid(
                "visibility_range",
                self.visibility_range,
                "must be finite and positive",
            ));
        }
        if !self.start_offset_seconds.is_finite() || self.start_offset_seconds < 0.0 {
            return Err(E::invalid(
                "start_offset_seconds",
                self.start_offset_seconds,
                "must be finite and not negative",
            ));
        }
        if self.interval.is_zero() {
            return Err(E::invalid("interval", self.interval, "must be positive"));
        }
        if self.echo_budget == Some(0) {
            return Err(E::invalid("echo_budget", 0, "must be at least 1"));
        }
        if self.max_packets == Some(0) {
            return Err(E::invalid("max_packets", 0, "must be at least 1"));
        }
        if self.data_rate.bps() == 0 {
            return Err(E::invalid("data_rate", self.data_rate, "must be positive"));
        }
        Ok(())
    }

    pub fn start(&self) -> SimTime {
        SimTime::from_secs_f64(self.start_offset_seconds)
    }

    /// The observation window the report divides by.
    pub fn window(&self) -> SimTime {
        SimTime::from_secs_f64(self.simulation_duration_seconds)
    }

    /// End of the run: start offset plus duration.
    pub fn horizon(&self) -> SimTime {
        self.start() + self.window()
    }
}
