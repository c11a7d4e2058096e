use crate::error::ConfigurationError;
use anyhow::{Context as _, anyhow, ensure};
use std::{fmt, net::Ipv4Addr, str::FromStr};

/// Hands out host addresses of one IPv4 subnet, lowest first.
///
/// The network address and the broadcast address are never handed out.
///
/// ```
/// use std::net::Ipv4Addr;
/// use wlansim::AddressAllocator;
///
/// let mut subnet: AddressAllocator = "192.168.1.0/24".parse().unwrap();
/// assert_eq!(subnet.allocate().unwrap(), Ipv4Addr::new(192, 168, 1, 1));
/// assert_eq!(subnet.allocate().unwrap(), Ipv4Addr::new(192, 168, 1, 2));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressAllocator {
    network: Ipv4Addr,
    prefix: u8,
    allocated: u32,
}

impl AddressAllocator {
    /// The subnet every scenario uses unless told otherwise.
    pub const DEFAULT_NETWORK: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 0);
    pub const DEFAULT_PREFIX: u8 = 24;

    pub fn new(network: Ipv4Addr, prefix: u8) -> Result<Self, ConfigurationError> {
        let subnet = format!("{network}/{prefix}");
        if prefix > 30 {
            return Err(ConfigurationError::invalid(
                "subnet",
                subnet,
                "prefix leaves no room for hosts",
            ));
        }
        if u32::from(network) & !mask(prefix) != 0 {
            return Err(ConfigurationError::invalid(
                "subnet",
                subnet,
                "host bits of the network address must be zero",
            ));
        }
        Ok(Self {
            network,
            prefix,
            allocated: 0,
        })
    }

    /// Number of hosts the subnet can hold.
    pub fn capacity(&self) -> u32 {
        (1u32 << (32 - self.prefix)) - 2
    }

    pub fn contains(&self, address: Ipv4Addr) -> bool {
        u32::from(address) & mask(self.prefix) == u32::from(self.network)
    }

    pub fn allocate(&mut self) -> Result<Ipv4Addr, ConfigurationError> {
        if self.allocated >= self.capacity() {
            return Err(ConfigurationError::AddressPoolExhausted {
                subnet: self.to_string(),
                hosts: self.allocated,
            });
        }
        self.allocated += 1;
        Ok(Ipv4Addr::from(u32::from(self.network) + self.allocated))
    }
}

fn mask(prefix: u8) -> u32 {
    u32::MAX.checked_shl(32 - u32::from(prefix)).unwrap_or(0)
}

impl Default for AddressAllocator {
    fn default() -> Self {
        Self {
            network: Self::DEFAULT_NETWORK,
            prefix: Self::DEFAULT_PREFIX,
            allocated: 0,
        }
    }
}

impl fmt::Display for AddressAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix)
    }
}

impl FromStr for AddressAllocator {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (network, prefix) = s
            .split_once('/')
            .ok_or_else(|| anyhow!("Expecting `network/prefix', got `{s}'"))?;
        let network: Ipv4Addr = network.parse().context("Failed to parse network address")?;
        let prefix: u8 = prefix.parse().context("Failed to parse prefix length")?;
        ensure!(prefix <= 32, "Prefix length ({prefix}) is larger than 32");
        Ok(Self::new(network, prefix)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_subnet() {
        let mut subnet = AddressAllocator::default();

        assert_eq!(subnet.to_string(), "192.168.1.0/24");
        assert_eq!(subnet.capacity(), 254);
        assert_eq!(subnet.allocate().unwrap(), Ipv4Addr::new(192, 168, 1, 1));
        assert!(subnet.contains(Ipv4Addr::new(192, 168, 1, 200)));
        assert!(!subnet.contains(Ipv4Addr::new(192, 168, 2, 1)));
    }

    #[test]
    fn exhaustion() {
        let mut subnet: AddressAllocator = "10.0.0.0/30".parse().unwrap();

        assert_eq!(subnet.allocate().unwrap(), Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(subnet.allocate().unwrap(), Ipv4Addr::new(10, 0, 0, 2));
        assert!(matches!(
            subnet.allocate(),
            Err(ConfigurationError::AddressPoolExhausted { hosts: 2, .. })
        ));
    }

    #[test]
    fn invalid_subnets() {
        assert!("192.168.1.0".parse::<AddressAllocator>().is_err());
        assert!("192.168.1.0/33".parse::<AddressAllocator>().is_err());
        assert!("192.168.1.0/31".parse::<AddressAllocator>().is_err());
        assert!(matches!(
            AddressAllocator::new(Ipv4Addr::new(192, 168, 1, 1), 24),
            Err(ConfigurationError::InvalidParameter {
                parameter: "subnet",
                ..
            })
        ));
    }
}
