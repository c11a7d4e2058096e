use crate::{controller::CompletedRun, error::ConfigurationError};
use std::fmt;
use wlansim_core::SimTime;

/// `count × payload × 8 / (window × 10⁶)`, in decimal megabits per second.
///
/// A zero count is exactly `0.0` whatever the window.
///
/// ```
/// use wlansim::throughput_mbps;
///
/// assert_eq!(throughput_mbps(1_000_000, 1472, 10.0), 1177.6);
/// assert_eq!(throughput_mbps(0, 1472, 10.0), 0.0);
/// ```
pub fn throughput_mbps(count: u64, payload_size: u64, window_secs: f64) -> f64 {
    if count == 0 {
        return 0.0;
    }
    count as f64 * payload_size as f64 * 8.0 / (window_secs * 1e6)
}

/// Throughput of one observed flow.
#[derive(Debug, Clone, PartialEq)]
pub struct ThroughputSample {
    pub label: String,
    pub received: u64,
    pub mbps: f64,
}

impl fmt::Display for ThroughputSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Throughput: {} Mbit/s", self.label, self.mbps)
    }
}

/// Per-flow throughput over a fixed observation window, one line per
/// observed flow in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct ThroughputReport {
    window: SimTime,
    samples: Vec<ThroughputSample>,
}

impl ThroughputReport {
    /// The window is the configured simulation duration, not the time each
    /// flow was active.
    pub fn from_run(run: &CompletedRun, window: SimTime) -> Result<Self, ConfigurationError> {
        if window.is_zero() {
            return Err(ConfigurationError::invalid(
                "simulation_duration_seconds",
                window,
                "observation window must be positive",
            ));
        }
        let window_secs = window.as_secs_f64();
        let samples = run
            .flows
            .iter()
            .filter(|flow| flow.observed)
            .map(|flow| ThroughputSample {
                label: flow.label.clone(),
                received: flow.received,
                mbps: throughput_mbps(flow.received, flow.payload_size, window_secs),
            })
            .collect();
        Ok(Self { window, samples })
    }

    pub fn window(&self) -> SimTime {
        self.window
    }

    pub fn samples(&self) -> &[ThroughputSample] {
        &self.samples
    }

    pub fn total_mbps(&self) -> f64 {
        self.samples.iter().map(|sample| sample.mbps).sum()
    }

    /// Every observed flow folded into one `Total` line.
    pub fn total(&self) -> ThroughputSample {
        ThroughputSample {
            label: "Total".to_owned(),
            received: self.samples.iter().map(|sample| sample.received).sum(),
            mbps: self.total_mbps(),
        }
    }
}

impl fmt::Display for ThroughputReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for sample in &self.samples {
            writeln!(f, "{sample}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::FlowOutcome;

    fn outcome(label: &str, received: u64, observed: bool) -> FlowOutcome {
        FlowOutcome {
            label: label.to_owned(),
            payload_size: 1000,
            observed,
            received,
            stats: None,
        }
    }

    fn run(flows: Vec<FlowOutcome>) -> CompletedRun {
        CompletedRun {
            horizon: SimTime::from_secs(11),
            flows,
            nodes: Vec::new(),
        }
    }

    #[test]
    fn zero_count() {
        assert_eq!(throughput_mbps(0, 1472, 10.0), 0.0);
        assert_eq!(throughput_mbps(0, 1472, 0.0), 0.0);
    }

    #[test]
    fn linear_in_count() {
        let one = throughput_mbps(1, 1472, 10.0);
        for count in [2u64, 10, 1_000, 123_456] {
            let many = throughput_mbps(count, 1472, 10.0);
            assert!(
                (many - count as f64 * one).abs() <= many * 1e-12,
                "{count}: {many} vs {one}"
            );
        }
    }

    #[test]
    fn decimal_megabits() {
        // 125 000 bytes in one second is exactly 1 Mbit/s
        assert_eq!(throughput_mbps(125, 1000, 1.0), 1.0);
    }

    #[test]
    fn lines_in_declaration_order() {
        let run = run(vec![
            outcome("3", 1250, true),
            outcome("1", 0, true),
            outcome("ignored", 5, false),
            outcome("2", 2500, true),
        ]);
        let report = ThroughputReport::from_run(&run, SimTime::from_secs(10)).unwrap();

        assert_eq!(
            report.to_string(),
            "3 Throughput: 1 Mbit/s\n1 Throughput: 0 Mbit/s\n2 Throughput: 2 Mbit/s\n"
        );
        assert_eq!(report.samples().len(), 3);
        assert_eq!(report.total_mbps(), 3.0);
        assert_eq!(report.window(), SimTime::from_secs(10));
    }

    #[test]
    fn total_line() {
        let run = run(vec![
            outcome("1", 1250, true),
            outcome("ignored", 5, false),
            outcome("2", 2500, true),
        ]);
        let report = ThroughputReport::from_run(&run, SimTime::from_secs(10)).unwrap();
        let total = report.total();

        assert_eq!(total.received, 3750);
        assert_eq!(total.to_string(), "Total Throughput: 3 Mbit/s");
    }

    #[test]
    fn zero_window() {
        let run = run(vec![outcome("1", 1, true)]);

        assert!(matches!(
            ThroughputReport::from_run(&run, SimTime::ZERO),
            Err(ConfigurationError::InvalidParameter {
                parameter: "simulation_duration_seconds",
                ..
            })
        ));
    }
}
