use crate::algorithm::{self, angle_difference, Metric};
use crate::error::MapMatchError;
use geo::{LineString, Point};
use geojson::{GeoJson, JsonObject, Value};
use std::collections::HashMap;

/// Directions a link may be travelled in. Follows the 1 / -1 / 0 convention of the
/// `direction` field in network files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkDirection {
    Forward,
    Backward,
    Both,
}

impl TryFrom<i64> for LinkDirection {
    type Error = MapMatchError;
    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(LinkDirection::Forward),
            -1 => Ok(LinkDirection::Backward),
            0 => Ok(LinkDirection::Both),
            other => Err(MapMatchError::Network(format!("unknown link direction {}", other))),
        }
    }
}

/// Direction a link is actually travelled in by a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Travel {
    /// from a_node to b_node
    Forward,
    /// from b_node to a_node
    Backward,
}

#[derive(Debug, Clone)]
pub struct Link {
    id: i64,
    a_node: i64,
    b_node: i64,
    direction: LinkDirection,
    base_cost: Option<f64>,
    /// top speed in metres per second, when the network carries one
    speed: Option<f64>,
    length: f64,
    bearing: f64,
    geometry: LineString<f64>,
}

impl Link {
    /// A link costing its own length. Use [`Link::with_cost`] for any other base cost.
    pub fn new(id: i64, a_node: i64, b_node: i64, direction: LinkDirection, geometry: LineString<f64>) -> Self {
        Link {
            id,
            a_node,
            b_node,
            direction,
            base_cost: None,
            speed: None,
            length: 0.0,
            bearing: 0.0,
            geometry,
        }
    }

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.base_cost = Some(cost);
        self
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }

    pub fn get_id(&self) -> i64 {
        self.id
    }

    pub fn get_a_node(&self) -> i64 {
        self.a_node
    }

    pub fn get_b_node(&self) -> i64 {
        self.b_node
    }

    pub fn get_direction(&self) -> LinkDirection {
        self.direction
    }

    pub fn get_length(&self) -> f64 {
        self.length
    }

    pub fn get_base_cost(&self) -> f64 {
        self.base_cost.unwrap_or(self.length)
    }

    pub fn get_speed(&self) -> Option<f64> {
        self.speed
    }

    /// Whether a vehicle moving at `speed` could be on this link. Links without a
    /// speed accept any vehicle.
    pub fn admits_speed(&self, speed: f64) -> bool {
        self.speed.map_or(true, |limit| limit >= speed)
    }

    /// bearing from the first to the last vertex
    pub fn get_bearing(&self) -> f64 {
        self.bearing
    }

    pub fn get_geometry(&self) -> &LineString<f64> {
        &self.geometry
    }

    pub fn allows(&self, travel: Travel) -> bool {
        matches!(
            (self.direction, travel),
            (LinkDirection::Both, _)
                | (LinkDirection::Forward, Travel::Forward)
                | (LinkDirection::Backward, Travel::Backward)
        )
    }

    pub fn entry_node(&self, travel: Travel) -> i64 {
        match travel {
            Travel::Forward => self.a_node,
            Travel::Backward => self.b_node,
        }
    }

    pub fn exit_node(&self, travel: Travel) -> i64 {
        match travel {
            Travel::Forward => self.b_node,
            Travel::Backward => self.a_node,
        }
    }

    /// Travel direction best matching `heading`, falling back to whichever way the link allows.
    pub fn travel_for_heading(&self, heading: Option<f64>) -> Travel {
        match self.direction {
            LinkDirection::Forward => Travel::Forward,
            LinkDirection::Backward => Travel::Backward,
            LinkDirection::Both => match heading {
                Some(h) if angle_difference(h, self.bearing) > 90.0 => Travel::Backward,
                _ => Travel::Forward,
            },
        }
    }

    /// Geometry in the order it is driven.
    pub fn oriented_geometry(&self, travel: Travel) -> LineString<f64> {
        match travel {
            Travel::Forward => self.geometry.clone(),
            Travel::Backward => {
                let mut reversed = self.geometry.clone();
                reversed.0.reverse();
                reversed
            }
        }
    }

    fn measure(&mut self, metric: Metric) -> Result<(), MapMatchError> {
        if self.geometry.0.len() < 2 {
            return Err(MapMatchError::Network(format!(
                "link {} geometry needs at least two vertices",
                self.id
            )));
        }
        self.length = metric.linestring_length(&self.geometry);
        let first = Point::from(self.geometry.0[0]);
        let last = Point::from(self.geometry.0[self.geometry.0.len() - 1]);
        self.bearing = metric.bearing(first, last);
        let cost = self.get_base_cost();
        if !cost.is_finite() || cost < 0.0 {
            return Err(MapMatchError::Network(format!(
                "link {} has invalid cost {}",
                self.id, cost
            )));
        }
        if let Some(speed) = self.speed {
            if !speed.is_finite() || speed < 0.0 {
                return Err(MapMatchError::Network(format!(
                    "link {} has invalid speed {}",
                    self.id, speed
                )));
            }
        }
        Ok(())
    }
}

/// Links and nodes of the road network. Read only once built; matching never mutates it.
pub struct Network {
    metric: Metric,
    links_index: HashMap<i64, usize>,
    nodes_index: HashMap<i64, usize>,
    links: Vec<Link>,
    /// (a_node, b_node) positions in `nodes` for every link
    link_nodes: Vec<(usize, usize)>,
    nodes: Vec<i64>,
}

impl Network {
    pub fn new(metric: Metric) -> Self {
        Network {
            metric,
            links_index: HashMap::new(),
            nodes_index: HashMap::new(),
            links: Vec::new(),
            link_nodes: Vec::new(),
            nodes: Vec::new(),
        }
    }

    /// Reads a FeatureCollection of LineString features carrying `link_id`, `a_node`,
    /// `b_node` and optionally `direction`, `cost` and `speed`.
    pub fn from_geojson(value: GeoJson, metric: Metric) -> Result<Self, MapMatchError> {
        let mut network = Network::new(metric);
        let features = match value {
            GeoJson::FeatureCollection(fc) => fc.features,
            _ => return Err(MapMatchError::Network("not a feature collection".to_string())),
        };
        for feature in features {
            let properties = feature
                .properties
                .ok_or_else(|| MapMatchError::Network("link feature without properties".to_string()))?;
            let id = int_property(&properties, "link_id")?;
            let geometry = match feature.geometry.map(|g| g.value) {
                Some(Value::LineString(line)) => {
                    let mut coords = Vec::with_capacity(line.len());
                    for position in line {
                        if position.len() < 2 {
                            return Err(MapMatchError::Network(format!("link {} has a short position", id)));
                        }
                        coords.push((position[0], position[1]));
                    }
                    LineString::from(coords)
                }
                _ => {
                    return Err(MapMatchError::Network(format!(
                        "link {} geometry is not a linestring",
                        id
                    )))
                }
            };
            let direction = match properties.get("direction").and_then(|v| v.as_i64()) {
                Some(d) => LinkDirection::try_from(d)?,
                None => LinkDirection::Both,
            };
            let mut link = Link::new(
                id,
                int_property(&properties, "a_node")?,
                int_property(&properties, "b_node")?,
                direction,
                geometry,
            );
            if let Some(cost) = properties.get("cost").and_then(|v| v.as_f64()) {
                link = link.with_cost(cost);
            }
            if let Some(speed) = properties.get("speed").and_then(|v| v.as_f64()) {
                link = link.with_speed(speed);
            }
            network.add_link(link)?;
        }
        Ok(network)
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn nodes(&self) -> &[i64] {
        &self.nodes
    }

    /// Node positions of every link, in link order.
    pub fn link_nodes(&self) -> &[(usize, usize)] {
        &self.link_nodes
    }

    /// Whether any link carries a speed.
    pub fn has_speed(&self) -> bool {
        self.links.iter().any(|l| l.speed.is_some())
    }

    pub fn find_link_by_index(&self, index: usize) -> Option<&Link> {
        self.links.get(index)
    }

    pub fn find_link_by_id(&self, id: i64) -> Option<usize> {
        self.links_index.get(&id).copied()
    }

    pub fn find_node_by_id(&self, id: i64) -> Option<usize> {
        self.nodes_index.get(&id).copied()
    }

    pub fn add_node(&mut self, node: i64) -> usize {
        if let Some(index) = self.nodes_index.get(&node) {
            return *index;
        }
        self.nodes.push(node);
        self.nodes_index.insert(node, self.nodes.len() - 1);
        self.nodes.len() - 1
    }

    /// Adds a link and the nodes it references. Link ids must be unique.
    pub fn add_link(&mut self, mut link: Link) -> Result<usize, MapMatchError> {
        if self.links_index.contains_key(&link.id) {
            return Err(MapMatchError::Network(format!("link {} already exists", link.id)));
        }
        link.measure(self.metric)?;
        let a = self.add_node(link.a_node);
        let b = self.add_node(link.b_node);
        self.link_nodes.push((a, b));
        self.links_index.insert(link.id, self.links.len());
        self.links.push(link);
        Ok(self.links.len() - 1)
    }

    pub fn link_rect(&self, index: usize) -> Option<([f64; 2], [f64; 2])> {
        self.links.get(index).and_then(|l| algorithm::line_rect(&l.geometry))
    }
}

fn int_property(properties: &JsonObject, key: &str) -> Result<i64, MapMatchError> {
    properties
        .get(key)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| MapMatchError::Network(format!("missing integer property '{}'", key)))
}
