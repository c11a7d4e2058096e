use crate::error::ConfigurationError;
use wlansim_core::{
    DataRate, MacConfig, PacketLoss,
    defaults::{DEFAULT_DATA_RATE, RTS_THRESHOLD_DISABLED},
};

/// Bytes budgeted per aggregated payload on top of the payload itself.
pub const AGGREGATION_OVERHEAD: u64 = 200;

/// MAC parameters shared by every node of the cell.
///
/// ```
/// use wlansim::LinkConfig;
///
/// let link = LinkConfig::new(true, 2, 1472).unwrap();
/// assert_eq!(link.rts_threshold(), 0);
/// assert_eq!(link.max_ampdu_size(), 2 * (1472 + 200));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkConfig {
    handshake: bool,
    aggregation_units: u64,
    payload_size: u64,
    packet_loss: PacketLoss,
    data_rate: DataRate,
}

impl LinkConfig {
    /// `aggregation_units` is the `U` of the aggregation budget
    /// `U × (P + 200)` and must be at least 1.
    pub fn new(
        handshake: bool,
        aggregation_units: u64,
        payload_size: u64,
    ) -> Result<Self, ConfigurationError> {
        if aggregation_units == 0 {
            return Err(ConfigurationError::invalid(
                "aggregation_unit_count",
                aggregation_units,
                "must be at least 1",
            ));
        }
        Ok(Self {
            handshake,
            aggregation_units,
            payload_size,
            packet_loss: PacketLoss::None,
            data_rate: DEFAULT_DATA_RATE,
        })
    }

    pub fn with_packet_loss(mut self, packet_loss: PacketLoss) -> Self {
        self.packet_loss = packet_loss;
        self
    }

    /// PHY rate of data frames; control frames keep the basic rate.
    pub fn with_data_rate(mut self, data_rate: DataRate) -> Self {
        self.data_rate = data_rate;
        self
    }

    pub fn handshake(&self) -> bool {
        self.handshake
    }

    pub fn packet_loss(&self) -> PacketLoss {
        self.packet_loss
    }

    pub fn data_rate(&self) -> DataRate {
        self.data_rate
    }

    /// `0` protects every transmission with RTS/CTS, the disabled threshold
    /// is larger than any frame.
    pub fn rts_threshold(&self) -> u64 {
        if self.handshake {
            0
        } else {
            RTS_THRESHOLD_DISABLED
        }
    }

    /// Ceiling of an aggregated frame in bytes.
    pub fn max_ampdu_size(&self) -> u64 {
        self.aggregation_units
            .saturating_mul(self.payload_size.saturating_add(AGGREGATION_OVERHEAD))
    }

    pub fn mac_config(&self) -> MacConfig {
        MacConfig::default()
            .with_rts_threshold(self.rts_threshold())
            .with_max_ampdu_size(self.max_ampdu_size())
            .with_data_rate(self.data_rate)
    }
}
