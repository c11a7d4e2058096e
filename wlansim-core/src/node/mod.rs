mod id;

pub use self::id::NodeId;
use crate::{mac::Mac, position::Position, stats::NodeStats};
use anyhow::bail;
use std::{fmt, net::Ipv4Addr, str::FromStr};

/// What a node is in the basic service set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Relays between stations. A medium has at most one.
    AccessPoint,
    Station,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::AccessPoint => f.write_str("ap"),
            Role::Station => f.write_str("sta"),
        }
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ap" | "access-point" => Ok(Role::AccessPoint),
            "sta" | "station" => Ok(Role::Station),
            _ => bail!("Unknown role `{s}', expecting `ap' or `sta'"),
        }
    }
}

/// A fixed wireless node managed by the [`Simulator`].
///
/// `Node` owns its position, its address once assigned, and its MAC once a
/// medium is installed. You never construct a `Node` directly: use
/// [`Simulator::new_node`] to get a [`NodeBuilder`] which registers the
/// node and returns its [`NodeId`].
///
/// [`Simulator`]: crate::Simulator
/// [`Simulator::new_node`]: crate::Simulator::new_node
/// [`NodeBuilder`]: crate::NodeBuilder
pub(crate) struct Node {
    id: NodeId,
    role: Role,
    position: Position,
    address: Option<Ipv4Addr>,
    mac: Option<Mac>,
}

impl Node {
    pub(crate) fn new(id: NodeId, role: Role) -> Self {
        Self {
            id,
            role,
            position: Position::ORIGIN,
            address: None,
            mac: None,
        }
    }

    #[inline]
    pub(crate) fn id(&self) -> NodeId {
        self.id
    }

    #[inline]
    pub(crate) fn role(&self) -> Role {
        self.role
    }

    #[inline]
    pub(crate) fn position(&self) -> Position {
        self.position
    }

    pub(crate) fn set_position(&mut self, position: Position) {
        self.position = position;
    }

    #[inline]
    pub(crate) fn address(&self) -> Option<Ipv4Addr> {
        self.address
    }

    pub(crate) fn set_address(&mut self, address: Ipv4Addr) {
        self.address = Some(address);
    }

    pub(crate) fn mac(&self) -> Option<&Mac> {
        self.mac.as_ref()
    }

    pub(crate) fn mac_mut(&mut self) -> Option<&mut Mac> {
        self.mac.as_mut()
    }

    pub(crate) fn attach(&mut self, mac: Mac) {
        self.mac = Some(mac);
    }

    pub(crate) fn stats(&self) -> NodeStats {
        NodeStats {
            id: self.id,
            role: self.role,
            position: self.position,
            address: self.address,
            queued: self.mac().map_or(0, Mac::queued),
            mac: self.mac().map(Mac::counters).unwrap_or_default(),
        }
    }
}
