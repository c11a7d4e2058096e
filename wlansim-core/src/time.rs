use anyhow::{anyhow, bail, ensure};
use logos::{Lexer, Logos};
use std::{
    fmt,
    ops::{Add, AddAssign, Mul, Sub},
    str::FromStr,
    time,
};

/// An instant, or a span, on the simulated clock.
///
/// The clock has nanosecond resolution and starts at [`SimTime::ZERO`] when
/// the [`Simulator`] starts. There is no relation to the wall clock: a run of
/// 10 simulated seconds takes as long as the events in it take to process.
///
/// Arithmetic saturates instead of wrapping so that a timeout scheduled
/// "far enough in the future" never lands in the past.
///
/// # Parsing
///
/// ```
/// # use wlansim_core::SimTime;
/// let interval: SimTime = "20us".parse().unwrap();
/// assert_eq!(interval, SimTime::from_micros(20));
///
/// let horizon: SimTime = "11s".parse().unwrap();
/// assert_eq!(horizon.as_secs_f64(), 11.0);
///
/// let mixed: SimTime = "1s 500ms".parse().unwrap();
/// assert_eq!(mixed, SimTime::from_millis(1_500));
/// ```
///
/// [`Simulator`]: crate::Simulator
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SimTime(u64);

const NANOS_PER_MICRO: u64 = 1_000;
const NANOS_PER_MILLI: u64 = 1_000_000;
const NANOS_PER_SEC: u64 = 1_000_000_000;

impl SimTime {
    pub const ZERO: Self = Self(0);
    pub const MAX: Self = Self(u64::MAX);

    #[inline]
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    #[inline]
    pub const fn from_micros(micros: u64) -> Self {
        Self(micros.saturating_mul(NANOS_PER_MICRO))
    }

    #[inline]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis.saturating_mul(NANOS_PER_MILLI))
    }

    #[inline]
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs.saturating_mul(NANOS_PER_SEC))
    }

    /// Build a [`SimTime`] from fractional seconds, rounded to the
    /// nearest nanosecond.
    ///
    /// Negative, NaN and infinite values have no meaning on the simulated
    /// clock and map to [`SimTime::ZERO`] and [`SimTime::MAX`] respectively
    /// (`+inf` saturates, everything else non-finite or negative is zero).
    pub fn from_secs_f64(secs: f64) -> Self {
        if secs.is_nan() || secs <= 0.0 {
            return Self::ZERO;
        }
        let nanos = (secs * NANOS_PER_SEC as f64).round();
        if nanos >= u64::MAX as f64 {
            Self::MAX
        } else {
            Self(nanos as u64)
        }
    }

    #[inline]
    pub const fn as_nanos(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / NANOS_PER_SEC as f64
    }

    #[inline]
    #[must_use = "function does not modify the current value"]
    pub const fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    #[inline]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn into_duration(self) -> time::Duration {
        time::Duration::from_nanos(self.0)
    }
}

impl Add for SimTime {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for SimTime {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for SimTime {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        self.saturating_sub(rhs)
    }
}

impl Mul<u64> for SimTime {
    type Output = Self;
    fn mul(self, rhs: u64) -> Self::Output {
        Self(self.0.saturating_mul(rhs))
    }
}

impl From<time::Duration> for SimTime {
    fn from(value: time::Duration) -> Self {
        Self(u64::try_from(value.as_nanos()).unwrap_or(u64::MAX))
    }
}

impl From<SimTime> for time::Duration {
    fn from(value: SimTime) -> Self {
        value.into_duration()
    }
}

impl fmt::Debug for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SimTime({self})")
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        <time::Duration as fmt::Debug>::fmt(&self.into_duration(), f)
    }
}

impl FromStr for SimTime {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut lex = Lexer::<'_, Token>::new(s);

        let mut total = SimTime::ZERO;
        let mut parsed_any = false;

        while let Some(next) = lex.next() {
            let number: Token = next.map_err(|()| anyhow!("Failed to parse: {s}"))?;

            ensure!(
                number == Token::Value,
                "Expecting time to start with a number. Cannot parse {s}"
            );
            let number: u64 = lex.slice().parse()?;

            let Some(Ok(unit)) = lex.next() else {
                bail!("Expecting a unit, failed to parse: {s}")
            };
            let span = match unit {
                Token::NanoSeconds => SimTime::from_nanos(number),
                Token::MicroSeconds => SimTime::from_micros(number),
                Token::MilliSeconds => SimTime::from_millis(number),
                Token::Seconds => SimTime::from_secs(number),
                Token::Minutes => SimTime::from_secs(number.saturating_mul(60)),
                Token::Value => bail!("Failed to parse `{s}', expecting a unit."),
            };
            total += span;
            parsed_any = true;
        }

        ensure!(parsed_any, "Cannot parse an empty time");

        Ok(total)
    }
}

#[derive(Logos, Debug, PartialEq)]
#[logos(skip r"[ \t\n\f]+")]
enum Token {
    #[token("ns")]
    NanoSeconds,
    #[regex("us|μs")]
    MicroSeconds,
    #[token("ms")]
    MilliSeconds,
    #[token("s")]
    Seconds,
    #[token("m")]
    Minutes,

    #[regex("[0-9]+")]
    Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logos_lexer() {
        let mut lex = Token::lexer("20us");

        assert_eq!(lex.next(), Some(Ok(Token::Value)));
        assert_eq!(lex.slice(), "20");

        assert_eq!(lex.next(), Some(Ok(Token::MicroSeconds)));
        assert_eq!(lex.span(), 2..4);
        assert_eq!(lex.next(), None);
    }

    #[test]
    fn parse() {
        assert_eq!("16us".parse::<SimTime>().unwrap(), SimTime::from_micros(16));
        assert_eq!("100ms".parse::<SimTime>().unwrap(), SimTime::from_millis(100));
        assert_eq!(
            "1s 2000ms 3000000us".parse::<SimTime>().unwrap(),
            SimTime::from_secs(6)
        );
        assert_eq!("2m".parse::<SimTime>().unwrap(), SimTime::from_secs(120));
    }

    #[test]
    fn parse_invalid() {
        assert!("".parse::<SimTime>().is_err());
        assert!("20".parse::<SimTime>().is_err());
        assert!("us".parse::<SimTime>().is_err());
        assert!("1.5s".parse::<SimTime>().is_err());
    }

    #[test]
    fn display_like_duration() {
        assert_eq!(SimTime::from_micros(20).to_string(), "20µs");
        assert_eq!(SimTime::from_secs(11).to_string(), "11s");
    }

    #[test]
    fn secs_f64_rounding() {
        assert_eq!(SimTime::from_secs_f64(0.00002), SimTime::from_micros(20));
        assert_eq!(SimTime::from_secs_f64(1.0), SimTime::from_secs(1));
        assert_eq!(SimTime::from_secs_f64(-3.0), SimTime::ZERO);
        assert_eq!(SimTime::from_secs_f64(f64::NAN), SimTime::ZERO);
        assert_eq!(SimTime::from_secs_f64(f64::INFINITY), SimTime::MAX);
    }

    #[test]
    fn arithmetic_saturates() {
        assert_eq!(SimTime::MAX + SimTime::from_nanos(1), SimTime::MAX);
        assert_eq!(SimTime::ZERO - SimTime::from_nanos(1), SimTime::ZERO);
        assert_eq!(SimTime::from_micros(9) * 3, SimTime::from_micros(27));
    }
}
