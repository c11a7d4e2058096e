use crate::{address::AddressAllocator, error::ConfigurationError};
use std::{f64::consts::TAU, net::Ipv4Addr};
use wlansim_core::{Position, Range, Role};

/// Coordinates are rounded to the nanometre so that the compass points
/// come out exact (no `3e-16` left over from `cos(π/2)`).
const PER_METRE: f64 = 1e9;

/// A node of a built [`Topology`]. Index `0` is always the access point.
#[derive(Debug, Clone, PartialEq)]
pub struct TopologyNode {
    pub index: usize,
    pub role: Role,
    pub position: Position,
    pub address: Ipv4Addr,
}

/// One access point and its stations, placed and addressed.
///
/// Positions and addresses never change once built.
#[derive(Debug, Clone)]
pub struct Topology {
    nodes: Vec<TopologyNode>,
    range: Range,
}

/// Places `N` stations evenly on the circle of radius `R` around the
/// access point, starting north and going counterclockwise. With four
/// stations these are the compass points north, west, south and east.
///
/// ```
/// use wlansim::TopologyBuilder;
///
/// let topology = TopologyBuilder::new()
///     .set_stations(4)
///     .set_range(5.0)
///     .build()
///     .unwrap();
///
/// let ap = topology.access_point();
/// let north = &topology.stations()[0];
/// let south = &topology.stations()[2];
/// assert_eq!(ap.position.distance(&north.position), 5.0);
/// assert_eq!(north.position.distance(&south.position), 10.0);
/// ```
#[derive(Debug, Clone)]
pub struct TopologyBuilder {
    stations: usize,
    range: f64,
    origin: Position,
    require_hidden: bool,
    subnet: AddressAllocator,
}

impl TopologyBuilder {
    pub fn new() -> Self {
        Self {
            stations: 4,
            range: wlansim_core::defaults::DEFAULT_RANGE,
            origin: Position::ORIGIN,
            require_hidden: true,
            subnet: AddressAllocator::default(),
        }
    }

    pub fn set_stations(mut self, stations: usize) -> Self {
        self.stations = stations;
        self
    }

    /// Visibility range `R` in metres.
    pub fn set_range(mut self, range: f64) -> Self {
        self.range = range;
        self
    }

    /// Where the access point sits; stations are placed around it.
    pub fn set_origin(mut self, origin: Position) -> Self {
        self.origin = origin;
        self
    }

    /// Whether a layout without any hidden station pair is refused
    /// (default `true`).
    pub fn set_hidden_required(mut self, required: bool) -> Self {
        self.require_hidden = required;
        self
    }

    pub fn set_subnet(mut self, subnet: AddressAllocator) -> Self {
        self.subnet = subnet;
        self
    }

    pub fn build(self) -> Result<Topology, ConfigurationError> {
        let Self {
            stations,
            range,
            origin,
            require_hidden,
            mut subnet,
        } = self;

        if stations == 0 {
            return Err(ConfigurationError::invalid(
                "station_count",
                stations,
                "at least one station is required",
            ));
        }
        let range = Range::new(range).map_err(|_| {
            ConfigurationError::invalid("visibility_range", range, "must be finite and positive")
        })?;

        let mut nodes = Vec::with_capacity(stations + 1);
        nodes.push(TopologyNode {
            index: 0,
            role: Role::AccessPoint,
            position: origin,
            address: subnet.allocate()?,
        });
        for i in 0..stations {
            let angle = TAU * i as f64 / stations as f64;
            let position = Position::new(
                snap(origin.x() - range.metres() * angle.sin()),
                snap(origin.y() + range.metres() * angle.cos()),
            )
            .map_err(|_| {
                ConfigurationError::invalid("origin", origin, "station positions overflow")
            })?;
            nodes.push(TopologyNode {
                index: i + 1,
                role: Role::Station,
                position,
                address: subnet.allocate()?,
            });
        }

        let topology = Topology { nodes, range };
        if require_hidden && topology.hidden_pairs().is_empty() {
            return Err(ConfigurationError::HiddenStationsUnsatisfiable {
                parameter: "station_count",
                value: stations,
            });
        }
        Ok(topology)
    }
}

impl Default for TopologyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn snap(value: f64) -> f64 {
    let snapped = (value * PER_METRE).round() / PER_METRE;
    if snapped == 0.0 { 0.0 } else { snapped }
}

impl Topology {
    pub fn nodes(&self) -> &[TopologyNode] {
        &self.nodes
    }

    pub fn access_point(&self) -> &TopologyNode {
        &self.nodes[0]
    }

    pub fn stations(&self) -> &[TopologyNode] {
        &self.nodes[1..]
    }

    pub fn range(&self) -> Range {
        self.range
    }

    /// The node the given address is assigned to.
    pub fn find(&self, address: Ipv4Addr) -> Option<&TopologyNode> {
        self.nodes.iter().find(|node| node.address == address)
    }

    pub fn can_hear(&self, a: usize, b: usize) -> bool {
        match (self.nodes.get(a), self.nodes.get(b)) {
            (Some(a), Some(b)) => self.range.covers(&a.position, &b.position),
            _ => false,
        }
    }

    /// Node index pairs `(a, b)`, `a < b`, that are out of range of each
    /// other.
    pub fn hidden_pairs(&self) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        for a in 0..self.nodes.len() {
            for b in a + 1..self.nodes.len() {
                if !self.can_hear(a, b) {
                    pairs.push((a, b));
                }
            }
        }
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compass() -> Topology {
        TopologyBuilder::new()
            .set_stations(4)
            .set_range(5.0)
            .build()
            .unwrap()
    }

    #[test]
    fn compass_distances() {
        let topology = compass();
        let ap = topology.access_point().position;
        let stations = topology.stations();

        for station in stations {
            assert_eq!(ap.distance(&station.position), 5.0, "{}", station.position);
        }
        assert_eq!(stations[0].position.distance(&stations[2].position), 10.0);
        assert_eq!(stations[1].position.distance(&stations[3].position), 10.0);
        let adjacent = stations[0].position.distance(&stations[1].position);
        assert!((adjacent - 5.0 * 2f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn compass_points() {
        let topology = compass();
        let points: Vec<(f64, f64)> = topology
            .stations()
            .iter()
            .map(|s| (s.position.x(), s.position.y()))
            .collect();

        assert_eq!(points, vec![(0.0, 5.0), (-5.0, 0.0), (0.0, -5.0), (5.0, 0.0)]);
    }

    #[test]
    fn access_point_hears_everyone() {
        let topology = compass();

        for station in topology.stations() {
            assert!(topology.can_hear(0, station.index));
        }
        // every pair of compass stations is out of range, AP pairs never are
        let pairs = topology.hidden_pairs();
        assert_eq!(pairs.len(), 6);
        assert!(pairs.iter().all(|&(a, _)| a != 0));
    }

    #[test]
    fn canonical_addresses() {
        let topology = compass();

        assert_eq!(topology.access_point().address, Ipv4Addr::new(192, 168, 1, 1));
        assert_eq!(topology.stations()[3].address, Ipv4Addr::new(192, 168, 1, 5));
        assert_eq!(topology.find(Ipv4Addr::new(192, 168, 1, 3)).unwrap().index, 2);
        assert!(topology.find(Ipv4Addr::new(192, 168, 1, 6)).is_none());
    }

    #[test]
    fn origin_offset() {
        let topology = TopologyBuilder::new()
            .set_origin(Position::new(5.0, 5.0).unwrap())
            .build()
            .unwrap();

        assert_eq!(topology.stations()[0].position, Position::new(5.0, 10.0).unwrap());
        assert_eq!(topology.stations()[1].position, Position::new(0.0, 5.0).unwrap());
    }

    #[test]
    fn two_and_three_stations_are_hidden() {
        for stations in [2, 3] {
            let topology = TopologyBuilder::new().set_stations(stations).build().unwrap();
            assert!(!topology.hidden_pairs().is_empty(), "{stations} stations");
        }
    }

    #[test]
    fn single_station_cannot_be_hidden() {
        let error = TopologyBuilder::new().set_stations(1).build().unwrap_err();
        assert_eq!(
            error,
            ConfigurationError::HiddenStationsUnsatisfiable {
                parameter: "station_count",
                value: 1
            }
        );

        let topology = TopologyBuilder::new()
            .set_stations(1)
            .set_hidden_required(false)
            .build()
            .unwrap();
        assert!(topology.hidden_pairs().is_empty());
    }

    #[test]
    fn invalid_parameters() {
        assert!(matches!(
            TopologyBuilder::new().set_stations(0).build(),
            Err(ConfigurationError::InvalidParameter {
                parameter: "station_count",
                ..
            })
        ));
        assert!(matches!(
            TopologyBuilder::new().set_range(-1.0).build(),
            Err(ConfigurationError::InvalidParameter {
                parameter: "visibility_range",
                ..
            })
        ));
        assert!(matches!(
            TopologyBuilder::new()
                .set_stations(3)
                .set_subnet("10.0.0.0/30".parse().unwrap())
                .build(),
            Err(ConfigurationError::AddressPoolExhausted { .. })
        ));
    }
}
