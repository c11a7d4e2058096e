use crate::controller::RunState;
use std::{error, fmt, net::Ipv4Addr};
use thiserror::Error;
use wlansim_core::SimTime;

/// A scenario that cannot be built from the given parameters.
///
/// Always raised before the engine is touched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("Invalid {parameter} ({value}): {reason}")]
    InvalidParameter {
        parameter: &'static str,
        value: String,
        reason: &'static str,
    },
    /// The layout cannot put any two stations out of range of each other.
    #[error("No hidden station pair with {parameter} = {value}, at least 2 stations are required")]
    HiddenStationsUnsatisfiable { parameter: &'static str, value: usize },
    #[error("Flow `{label}': {parameter} ({address}) is not assigned to any node")]
    UnassignedAddress {
        label: String,
        parameter: &'static str,
        address: Ipv4Addr,
    },
    #[error("Flow `{label}': stop offset ({stop}) is beyond the horizon ({horizon})")]
    FlowBeyondHorizon {
        label: String,
        stop: SimTime,
        horizon: SimTime,
    },
    #[error("Address pool ({subnet}) exhausted after {hosts} hosts")]
    AddressPoolExhausted { subnet: String, hosts: u32 },
}

impl ConfigurationError {
    pub(crate) fn invalid(
        parameter: &'static str,
        value: impl fmt::Display,
        reason: &'static str,
    ) -> Self {
        Self::InvalidParameter {
            parameter,
            value: value.to_string(),
            reason,
        }
    }
}

/// The engine refused an operation or faulted during the run.
#[derive(Debug, Error)]
pub enum SimulationEngineError {
    #[error("Engine rejected {operation}: {source}")]
    Rejected {
        operation: &'static str,
        #[source]
        source: Box<dyn error::Error + Send + Sync>,
    },
    #[error("Engine assigned {echoed} to node {node}, expected {expected}")]
    AddressMismatch {
        node: usize,
        expected: Ipv4Addr,
        echoed: Ipv4Addr,
    },
    #[error("Unknown received-count handle ({handle})")]
    UnknownCounter { handle: String },
    #[error("Simulation faulted: {reason}")]
    Faulted { reason: String },
}

impl SimulationEngineError {
    pub fn rejected<E>(operation: &'static str, error: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        Self::Rejected {
            operation,
            source: Box::new(error),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Engine(#[from] SimulationEngineError),
    #[error("Cannot {operation} while the run is {state}")]
    InvalidState {
        operation: &'static str,
        state: RunState,
    },
}

impl Error {
    /// Process exit status for this error: `2` for configuration errors,
    /// `3` for engine errors.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::Configuration(_) => 2,
            Error::Engine(_) => 3,
            Error::InvalidState { .. } => 1,
        }
    }
}
