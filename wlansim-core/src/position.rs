use anyhow::{Context as _, anyhow};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Relative slack applied when comparing a distance against a [`Range`].
///
/// Layouts computed with trigonometry put nodes at exactly the range in
/// theory, but `sin`/`cos` may land a few ULPs beyond it.
const RANGE_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum PositionError {
    #[error("coordinate must be finite, got {value}")]
    NonFiniteCoordinate { value: f64 },
    #[error("propagation range must be finite and strictly positive, got {value}")]
    InvalidRange { value: f64 },
}

/// A fixed point on the simulation plane, in metres.
///
/// ```
/// use wlansim_core::Position;
///
/// let ap: Position = "5, 5".parse().unwrap();
/// let sta = Position::new(5.0, 10.0).unwrap();
///
/// assert_eq!(ap.distance(&sta), 5.0);
/// assert_eq!(sta.to_string(), "(5, 10)");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    x: f64,
    y: f64,
}

impl Position {
    pub const ORIGIN: Self = Self { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Result<Self, PositionError> {
        for value in [x, y] {
            if !value.is_finite() {
                return Err(PositionError::NonFiniteCoordinate { value });
            }
        }
        Ok(Self { x, y })
    }

    #[inline]
    pub fn x(&self) -> f64 {
        self.x
    }

    #[inline]
    pub fn y(&self) -> f64 {
        self.y
    }

    /// Euclidean distance in metres.
    pub fn distance(&self, other: &Position) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// This position moved by `(dx, dy)`.
    ///
    /// Non-finite offsets leave the position unchanged.
    #[must_use = "function does not modify the current value"]
    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy).unwrap_or(self)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl FromStr for Position {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().trim_start_matches('(').trim_end_matches(')');
        let (x, y) = s
            .split_once(',')
            .ok_or_else(|| anyhow!("Expecting `x, y`, got `{s}'"))?;
        let x: f64 = x.trim().parse().context("Failed to parse x coordinate")?;
        let y: f64 = y.trim().parse().context("Failed to parse y coordinate")?;
        Self::new(x, y).map_err(|error| anyhow!("Failed to parse Position: {error}"))
    }
}

/// Maximum distance at which a transmission can be received.
///
/// This is the range propagation loss model: within range a frame arrives
/// with full power, beyond it nothing is received at all (not even enough
/// energy to sense the medium busy). Two stations further apart than the
/// range are therefore hidden from one another.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range(f64);

impl Range {
    pub fn new(metres: f64) -> Result<Self, PositionError> {
        if !metres.is_finite() || metres <= 0.0 {
            return Err(PositionError::InvalidRange { value: metres });
        }
        Ok(Self(metres))
    }

    #[inline]
    pub fn metres(&self) -> f64 {
        self.0
    }

    /// `true` if a node at `a` and a node at `b` can hear each other.
    pub fn covers(&self, a: &Position, b: &Position) -> bool {
        a.distance(b) <= self.0 * (1.0 + RANGE_TOLERANCE)
    }
}

impl Default for Range {
    fn default() -> Self {
        Self(crate::defaults::DEFAULT_RANGE)
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}m", self.0)
    }
}
