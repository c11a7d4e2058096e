use rand_core::Rng;
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Chance that an otherwise intact reception is not decoded.
///
/// The range model is all or nothing; this is the only randomness on the
/// channel. Each reception takes one `u32` from the simulator's generator.
///
/// ```
/// use wlansim_core::PacketLoss;
///
/// let lossy: PacketLoss = "2.5%".parse().unwrap();
/// assert_eq!(lossy, PacketLoss::rate(0.025).unwrap());
/// assert_eq!(lossy.to_string(), "2.50%");
/// assert_eq!("0.5".parse::<PacketLoss>().unwrap().to_string(), "50%");
/// ```
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub enum PacketLoss {
    #[default]
    None,
    Rate(LossRate),
}

/// A probability in `[0, 1]`, kept as a threshold over the `u32` range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LossRate {
    probability: f64,
    threshold: u64,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PacketLossError {
    #[error("Loss probability ({0}) is not in [0, 1]")]
    NotAProbability(f64),
    #[error("Cannot read a loss rate from `{0}', expecting `5%' or `0.05'")]
    Unreadable(String),
}

impl PacketLoss {
    pub fn rate(probability: f64) -> Result<Self, PacketLossError> {
        if !(0.0..=1.0).contains(&probability) {
            return Err(PacketLossError::NotAProbability(probability));
        }
        if probability == 0.0 {
            return Ok(Self::None);
        }
        let threshold = (probability * (1u64 << 32) as f64).round() as u64;
        Ok(Self::Rate(LossRate {
            probability,
            threshold,
        }))
    }

    pub fn probability(&self) -> f64 {
        match self {
            Self::None => 0.0,
            Self::Rate(rate) => rate.probability,
        }
    }

    /// Draws whether the next reception is lost. Never draws when lossless,
    /// so a lossless run consumes nothing from `rng`.
    pub fn should_drop<R: Rng>(&self, rng: &mut R) -> bool {
        match self {
            Self::None => false,
            Self::Rate(rate) => u64::from(rng.next_u32()) < rate.threshold,
        }
    }
}

impl fmt::Display for PacketLoss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let percent = self.probability() * 100.0;
        if percent.fract() == 0.0 {
            write!(f, "{percent}%")
        } else {
            write!(f, "{percent:.2}%")
        }
    }
}

impl FromStr for PacketLoss {
    type Err = PacketLossError;

    /// Either a percentage (`"5%"`) or a plain probability (`"0.05"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unreadable = || PacketLossError::Unreadable(s.to_owned());
        let s = s.trim();
        let probability = match s.strip_suffix('%') {
            Some(percent) => percent.trim().parse::<f64>().map_err(|_| unreadable())? / 100.0,
            None => s.parse::<f64>().map_err(|_| unreadable())?,
        };
        Self::rate(probability)
    }
}
