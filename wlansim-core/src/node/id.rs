use anyhow::anyhow;
use std::{fmt, str};

/// Identifier of a node in the [`Simulator`].
///
/// Identifiers are handed out in creation order starting at `0`, so the
/// identifier doubles as the node's index.
///
/// [`Simulator`]: crate::Simulator
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub const ZERO: Self = NodeId::new(0);

    pub(crate) const fn new(id: u32) -> Self {
        Self(id)
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl str::FromStr for NodeId {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim_start_matches('n')
            .parse()
            .map(Self)
            .map_err(|error| anyhow!("Invalid NodeId `{s}': {error}"))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}
