use crate::SimTime;
use anyhow::{bail, ensure};
use logos::{Lexer, Logos};
use std::{fmt, str::FromStr};

/// The PHY [`DataRate`] at which a frame is put on the air.
///
/// Stored in bits per second. Prefixes are decimal (`1mbps` is
/// `1_000_000` bits per second) as they are for 802.11 modulation rates.
///
/// # Example
///
/// ```
/// # use wlansim_core::{DataRate, SimTime};
/// let mcs7: DataRate = "65mbps".parse().unwrap();
/// assert_eq!(mcs7, DataRate::HT_MCS7);
///
/// // 1_500 bytes = 12_000 bits at 65 Mbit/s
/// assert_eq!(mcs7.transmit_time(1_500), SimTime::from_nanos(184_616));
///
/// let mcs0: DataRate = "6.5mbps".parse().unwrap();
/// assert_eq!(mcs0.to_string(), "6.5mbps");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DataRate(u64);

impl DataRate {
    /// HT MCS 0, 20 MHz, long guard interval: used for control frames.
    pub const HT_MCS0: Self = Self::from_bps(6_500_000);
    /// HT MCS 7, 20 MHz, long guard interval: used for data frames.
    pub const HT_MCS7: Self = Self::from_bps(65_000_000);

    #[inline]
    pub const fn from_bps(bps: u64) -> Self {
        Self(bps)
    }

    #[inline]
    pub const fn bps(self) -> u64 {
        self.0
    }

    /// Time needed to clock `bytes` onto the medium, rounded up to the
    /// next nanosecond.
    ///
    /// A zero rate never finishes: [`SimTime::MAX`].
    pub fn transmit_time(self, bytes: u64) -> SimTime {
        if self.0 == 0 {
            return SimTime::MAX;
        }
        let bits = bytes as u128 * 8 * 1_000_000_000;
        let nanos = bits.div_ceil(self.0 as u128);
        SimTime::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }
}

const K: u64 = 1_000;
const M: u64 = 1_000_000;
const G: u64 = 1_000_000_000;

impl fmt::Display for DataRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = self.0;
        if v >= G {
            write!(f, "{}gbps", v as f64 / G as f64)
        } else if v >= M {
            write!(f, "{}mbps", v as f64 / M as f64)
        } else if v >= K {
            write!(f, "{}kbps", v as f64 / K as f64)
        } else {
            write!(f, "{v}bps")
        }
    }
}

#[derive(Logos, Debug, PartialEq)]
#[logos(skip r"[ \t\n\f]+")]
enum DataRateToken {
    #[token("bps")]
    Bps,
    #[token("kbps")]
    Kbps,
    #[token("mbps")]
    Mbps,
    #[token("gbps")]
    Gbps,

    #[regex(r"[0-9]+(\.[0-9]+)?")]
    Value,
}

impl FromStr for DataRate {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut lex = Lexer::<'_, DataRateToken>::new(s);

        let Some(Ok(DataRateToken::Value)) = lex.next() else {
            bail!("Expecting to parse a number")
        };
        let number: f64 = lex.slice().parse()?;
        let Some(Ok(token)) = lex.next() else {
            bail!("Expecting to parse a unit")
        };
        let multiplier = match token {
            DataRateToken::Bps => 1,
            DataRateToken::Kbps => K,
            DataRateToken::Mbps => M,
            DataRateToken::Gbps => G,
            DataRateToken::Value => bail!("Expecting to parse a unit (bps, kbps, ...)"),
        };

        ensure!(
            lex.next().is_none(),
            "Not expecting any other tokens to parse a data rate"
        );

        let bps = (number * multiplier as f64).round();
        ensure!(
            bps.is_finite() && bps < u64::MAX as f64,
            "Data rate out of range: {s}"
        );

        Ok(Self(bps as u64))
    }
}

impl Default for DataRate {
    fn default() -> Self {
        Self::HT_MCS7
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_data_rate() {
        macro_rules! assert_rate {
            ($string:literal == $value:expr) => {
                assert_eq!(
                    $string.parse::<DataRate>().unwrap(),
                    DataRate::from_bps($value)
                );
            };
        }

        assert_rate!("0bps" == 0);
        assert_rate!("42bps" == 42);
        assert_rate!("42kbps" == 42_000);
        assert_rate!("6.5mbps" == 6_500_000);
        assert_rate!("65mbps" == 65_000_000);
        assert_rate!("1gbps" == 1_000_000_000);
    }

    #[test]
    fn print_data_rate() {
        assert_eq!(DataRate::from_bps(12).to_string(), "12bps");
        assert_eq!(DataRate::from_bps(1_500).to_string(), "1.5kbps");
        assert_eq!(DataRate::HT_MCS0.to_string(), "6.5mbps");
        assert_eq!(DataRate::HT_MCS7.to_string(), "65mbps");
        assert_eq!(DataRate::from_bps(2 * G).to_string(), "2gbps");
    }

    #[test]
    fn transmit_time_rounds_up() {
        // 14 bytes (an ACK) at 6.5 Mbit/s: 112 bits -> 17_230.769.. ns
        assert_eq!(
            DataRate::HT_MCS0.transmit_time(14),
            SimTime::from_nanos(17_231)
        );
        assert_eq!(DataRate::from_bps(8_000_000).transmit_time(1), SimTime::from_micros(1));
        assert_eq!(DataRate::HT_MCS7.transmit_time(0), SimTime::ZERO);
    }

    #[test]
    fn zero_rate_never_finishes() {
        assert_eq!(DataRate::from_bps(0).transmit_time(1), SimTime::MAX);
    }

    #[test]
    fn parse_invalid_strings() {
        assert!("42".parse::<DataRate>().is_err());
        assert!("mbps".parse::<DataRate>().is_err());
        assert!("".parse::<DataRate>().is_err());
        assert!("42mbps extra".parse::<DataRate>().is_err());
    }
}
