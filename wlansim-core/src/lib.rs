//! Deterministic discrete-event simulation of a single 802.11n cell.
//!
//! A [`Simulator`] holds fixed [nodes](Simulator::new_node) on a plane, one
//! shared wireless medium governed by a range propagation model, and a set
//! of UDP-like [flows](FlowSpec). Running it replays contention, collisions,
//! RTS/CTS, A-MPDU aggregation and retransmissions in simulated time, and
//! leaves per-flow counters behind ([`FlowStats`]).
//!
//! Everything runs on one thread, from one event queue, with every random
//! draw taken from one seeded generator: two runs of the same scenario with
//! the same seed produce identical counters.
//!
//! See [`Simulator`] for a complete example.

mod app;
pub mod defaults;
mod event;
mod frame;
mod mac;
pub mod measure;
mod medium;
mod node;
mod position;
mod simulator;
mod stats;
mod time;

pub use self::{
    app::{FlowId, FlowSpec, Traffic},
    frame::{Direction, Packet, PacketId},
    mac::MacConfig,
    measure::{DataRate, PacketLoss},
    node::{NodeId, Role},
    position::{Position, PositionError, Range},
    simulator::{NodeBuilder, SimError, Simulator},
    stats::{FlowStats, MacCounters, NodeStats, RunSummary, SimulatorStats},
    time::SimTime,
};
