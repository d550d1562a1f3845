use super::locator::{LinkLocator, LinkMatch};
use crate::algorithm::Metric;
use crate::error::MapMatchError;
use crate::graph::{CostOverrides, Network, PathStep, RoadGraph};
use geo::Point;
use log::{debug, info};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::BufReader;

/// Road graph plus its spatial index. Shared read-only by every trip.
pub struct MapMatcher {
    road_graph: RoadGraph,
    locator: LinkLocator,
}

impl MapMatcher {
    pub fn new(network: Network) -> Self {
        let locator = LinkLocator::new(&network);
        let road_graph = RoadGraph::new(network);
        info!("construct map matching success... ");
        MapMatcher { road_graph, locator }
    }

    /// Loads a network GeoJSON file.
    pub fn from_file(path: &str, metric: Metric) -> Result<Self, MapMatchError> {
        debug!("loading network from : {}", path);
        let file = File::open(path).map_err(|e| MapMatchError::Io(path.to_string(), e))?;
        let reader = BufReader::new(file);
        let geojson = geojson::GeoJson::from_reader(reader).map_err(geojson::Error::from)?;
        let network = Network::from_geojson(geojson, metric)?;
        info!("load road network success file: {} ", path);
        Ok(MapMatcher::new(network))
    }

    pub fn network(&self) -> &Network {
        &self.road_graph.network
    }

    pub fn nearest_links(&self, point: Point<f64>, radius: f64) -> Vec<LinkMatch> {
        self.locator.nearest_links(self.network(), point, radius)
    }

    pub fn links_near_path(&self, path: &[usize], radius: f64) -> BTreeSet<usize> {
        self.locator.links_near_path(self.network(), path, radius)
    }

    pub fn filter_by_heading(&self, matches: Vec<LinkMatch>, heading: Option<f64>, tolerance: f64) -> Vec<LinkMatch> {
        LinkLocator::filter_by_heading(self.network(), matches, heading, tolerance)
    }

    pub fn filter_by_speed(&self, matches: Vec<LinkMatch>, speed: f64) -> Vec<LinkMatch> {
        LinkLocator::filter_by_speed(self.network(), matches, speed)
    }

    pub fn shortest_path(
        &self,
        from: i64,
        to: i64,
        costs: &CostOverrides,
    ) -> Result<Option<Vec<PathStep>>, MapMatchError> {
        self.road_graph.shortest_path(from, to, costs)
    }
}
