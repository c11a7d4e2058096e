//! Default values and 802.11n (5 GHz, 20 MHz) timing constants.
//!
//! The timing values are the OFDM PHY values; the frame sizes are the
//! on-air sizes including the FCS.

use crate::{SimTime, measure::DataRate};

/// Default propagation range, in metres.
///
/// ```
/// # use wlansim_core::defaults::*;
/// assert_eq!(DEFAULT_RANGE, 5.0);
/// ```
pub const DEFAULT_RANGE: f64 = 5.0;

/// Slot time.
pub const SLOT: SimTime = SimTime::from_micros(9);

/// Short inter-frame space: the gap before a response (CTS, ACK, data
/// after CTS).
pub const SIFS: SimTime = SimTime::from_micros(16);

/// DCF inter-frame space: how long the medium must be idle before the
/// backoff counter starts counting down.
///
/// ```
/// # use wlansim_core::{defaults::*, SimTime};
/// assert_eq!(DIFS, SimTime::from_micros(34));
/// ```
pub const DIFS: SimTime = SimTime::from_micros(16 + 2 * 9);

/// HT mixed-format preamble and PLCP header paid by every frame.
pub const PREAMBLE: SimTime = SimTime::from_micros(36);

pub const RTS_SIZE: u64 = 20;
pub const CTS_SIZE: u64 = 14;
pub const ACK_SIZE: u64 = 14;
/// Compressed BlockAck.
pub const BLOCK_ACK_SIZE: u64 = 32;

/// Bytes added to a payload before it becomes an MPDU: IPv4 (20) + UDP
/// (8) + LLC/SNAP (8) + QoS MAC header (26) + FCS (4).
pub const MPDU_OVERHEAD: u64 = 20 + 8 + 8 + 26 + 4;

/// A-MPDU subframe delimiter.
pub const AMPDU_DELIMITER: u64 = 4;

/// Largest number of MPDUs a single BlockAck can acknowledge.
pub const MAX_AMPDU_SUBFRAMES: usize = 64;

/// RTS threshold that never triggers a handshake.
pub const RTS_THRESHOLD_DISABLED: u64 = 999_999;

pub const DEFAULT_DATA_RATE: DataRate = DataRate::HT_MCS7;
pub const DEFAULT_CONTROL_RATE: DataRate = DataRate::HT_MCS0;

/// Packets a node's transmit queue holds before it starts dropping.
pub const DEFAULT_QUEUE_LIMIT: usize = 400;

/// Attempts after the first before a frame is given up on.
pub const DEFAULT_RETRY_LIMIT: u32 = 7;

pub const CW_MIN: u32 = 15;
pub const CW_MAX: u32 = 1_023;
