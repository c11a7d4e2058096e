use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use wlansim::{AddressAllocator, Error, Scenario, ScenarioConfig, run_scenario};
use wlansim_core::{DataRate, PacketLoss, SimTime};

#[derive(Parser)]
#[command(version, about = "Hidden-station WLAN scenarios")]
struct Command {
    /// number of stations around the access point
    #[arg(long, default_value = "4")]
    stations: usize,

    /// UDP payload of every packet, in bytes
    #[arg(long, default_value = "1472")]
    payload_size: u64,

    /// payloads one aggregated frame may carry
    #[arg(long, default_value = "1")]
    n_mpdus: u64,

    /// RTS/CTS before every transmission
    #[arg(long)]
    enable_rts: bool,

    /// observation window, in seconds
    #[arg(long, default_value = "10")]
    simulation_time: f64,

    /// visibility range, in metres
    #[arg(long, default_value = "5")]
    range: f64,

    /// when traffic starts, in seconds
    #[arg(long, default_value = "1")]
    start: f64,

    /// traffic plan: uplink, echo or mesh
    #[arg(long, default_value = "uplink")]
    scenario: Scenario,

    /// requests per echo flow (echo: 3, mesh: 1)
    #[arg(long)]
    echo_budget: Option<u64>,

    #[arg(long, default_value = "0")]
    seed: u64,

    /// gap between two packets of a saturating flow
    #[arg(long, default_value = "20us")]
    interval: SimTime,

    /// packets each saturating flow sends at most, 0 for no cap
    #[arg(long, default_value = "0")]
    n_packets: u64,

    /// PHY rate of data frames
    #[arg(long, default_value = "65mbps")]
    data_rate: DataRate,

    #[arg(long, default_value = "192.168.1.0/24")]
    subnet: AddressAllocator,

    /// chance an intact reception is lost anyway
    #[arg(long, default_value = "0%")]
    packet_loss: PacketLoss,

    /// also print the sum over every flow
    #[arg(long)]
    total: bool,
}

impl Command {
    fn config(&self) -> ScenarioConfig {
        ScenarioConfig {
            station_count: self.stations,
            payload_size: self.payload_size,
            aggregation_units: self.n_mpdus,
            handshake: self.enable_rts,
            simulation_duration_seconds: self.simulation_time,
            visibility_range: self.range,
            start_offset_seconds: self.start,
            scenario: self.scenario,
            echo_budget: self.echo_budget,
            seed: self.seed,
            interval: self.interval,
            max_packets: (self.n_packets > 0).then_some(self.n_packets),
            data_rate: self.data_rate,
            subnet: self.subnet.clone(),
            packet_loss: self.packet_loss,
        }
    }
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let command = Command::parse();
    match run(&command.config(), command.total) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("Error: {error:#}");
            let code = error.downcast_ref::<Error>().map_or(1, Error::exit_code);
            ExitCode::from(code)
        }
    }
}

fn run(config: &ScenarioConfig, total: bool) -> anyhow::Result<()> {
    let outcome = run_scenario(config)?;
    print!("{}", outcome.report);
    if total {
        println!("{}", outcome.report.total());
    }
    Ok(())
}
