mod data_rate;
mod packet_loss;

pub use self::{
    data_rate::DataRate,
    packet_loss::{LossRate, PacketLoss, PacketLossError},
};
