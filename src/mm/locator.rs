use crate::algorithm::angle_difference;
use crate::graph::{Network, Travel};
use geo::Point;
use log::debug;
use rtree_rs::{RTree, Rect};
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// A link found near a point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkMatch {
    pub link: usize,
    pub link_id: i64,
    pub distance: f64,
    /// bearing of the link segment closest to the point
    pub bearing: f64,
}

impl LinkMatch {
    /// Whether `heading` runs along this link within `tolerance` degrees in a direction
    /// the link may be travelled.
    pub fn aligned(&self, network: &Network, heading: f64, tolerance: f64) -> bool {
        let link = match network.find_link_by_index(self.link) {
            Some(link) => link,
            None => return false,
        };
        (link.allows(Travel::Forward) && angle_difference(heading, self.bearing) <= tolerance)
            || (link.allows(Travel::Backward)
                && angle_difference(heading, self.bearing + 180.0) <= tolerance)
    }
}

/// R-tree over link bounding boxes.
pub struct LinkLocator {
    road_rtree: RTree<2, f64, usize>,
}

impl LinkLocator {
    pub fn new(network: &Network) -> Self {
        let mut road_rtree = RTree::new();
        for index in 0..network.links().len() {
            if let Some((min, max)) = network.link_rect(index) {
                road_rtree.insert(Rect::new(min, max), index);
            }
        }
        debug!("build road rtree over {} links", network.links().len());
        LinkLocator { road_rtree }
    }

    // link indices whose boxes touch the given box
    pub fn query_bbox(&self, min: [f64; 2], max: [f64; 2]) -> Vec<usize> {
        let mut result = Vec::new();
        for item in self.road_rtree.search(Rect::new(min, max)) {
            result.push(*item.data);
        }
        result
    }

    /// Links within `radius` of `point`, nearest first, ties by ascending link id.
    pub fn nearest_links(&self, network: &Network, point: Point<f64>, radius: f64) -> Vec<LinkMatch> {
        let metric = network.metric();
        let (min, max) = metric.search_rect(point, radius);
        let mut matches: Vec<LinkMatch> = self
            .query_bbox(min, max)
            .into_iter()
            .filter_map(|index| {
                let link = network.find_link_by_index(index)?;
                let projection = metric.project(point, link.get_geometry())?;
                if projection.distance > radius {
                    return None;
                }
                Some(LinkMatch {
                    link: index,
                    link_id: link.get_id(),
                    distance: projection.distance,
                    bearing: projection.bearing,
                })
            })
            .collect();
        matches.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.link_id.cmp(&b.link_id))
        });
        matches
    }

    /// Keeps the matches aligned with `heading`. Without a heading, or when nothing is
    /// aligned, the unfiltered matches are returned.
    pub fn filter_by_heading(
        network: &Network,
        matches: Vec<LinkMatch>,
        heading: Option<f64>,
        tolerance: f64,
    ) -> Vec<LinkMatch> {
        let heading = match heading {
            Some(h) => h,
            None => return matches,
        };
        let aligned: Vec<LinkMatch> = matches
            .iter()
            .filter(|m| m.aligned(network, heading, tolerance))
            .copied()
            .collect();
        if aligned.is_empty() && !matches.is_empty() {
            debug!("no link aligned with heading {:.1}, using nearest links", heading);
            return matches;
        }
        aligned
    }

    /// Drops the matches on links too slow for a vehicle moving at `speed`.
    pub fn filter_by_speed(network: &Network, matches: Vec<LinkMatch>, speed: f64) -> Vec<LinkMatch> {
        if !network.has_speed() {
            return matches;
        }
        matches
            .into_iter()
            .filter(|m| {
                network
                    .find_link_by_index(m.link)
                    .map_or(false, |link| link.admits_speed(speed))
            })
            .collect()
    }

    /// Links within `radius` of any link in `path`, the path links included.
    pub fn links_near_path(&self, network: &Network, path: &[usize], radius: f64) -> BTreeSet<usize> {
        let metric = network.metric();
        let mut result = BTreeSet::new();
        for &path_link in path {
            let link = match network.find_link_by_index(path_link) {
                Some(link) => link,
                None => continue,
            };
            result.insert(path_link);
            let (lo, hi) = match network.link_rect(path_link) {
                Some(rect) => rect,
                None => continue,
            };
            let (min, _) = metric.search_rect(Point::new(lo[0], lo[1]), radius);
            let (_, max) = metric.search_rect(Point::new(hi[0], hi[1]), radius);
            for index in self.query_bbox(min, max) {
                if result.contains(&index) {
                    continue;
                }
                if let Some(other) = network.find_link_by_index(index) {
                    if metric.line_distance(link.get_geometry(), other.get_geometry()) <= radius {
                        result.insert(index);
                    }
                }
            }
        }
        result
    }
}
