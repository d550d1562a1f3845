use super::locator::LinkMatch;
use super::matcher::MapMatcher;
use super::model::QualityMetrics;
use super::traj::Trace;
use geo::Point;
use std::collections::BTreeSet;

/// Links within the buffer of one ping. These never change during a reconstruction run,
/// so they are looked up once per segment.
#[derive(Debug, Clone)]
pub struct PingNeighbourhood {
    pub ping_index: usize,
    pub timestamp: i64,
    pub point: Point<f64>,
    pub heading: Option<f64>,
    /// metres per second
    pub speed: f64,
    /// nearest first
    pub near: Vec<LinkMatch>,
}

impl PingNeighbourhood {
    /// Whether any network link lies within the buffer.
    pub fn coverable(&self) -> bool {
        !self.near.is_empty()
    }

    pub fn covered_by(&self, path: &BTreeSet<usize>) -> bool {
        self.near.iter().any(|m| path.contains(&m.link))
    }
}

pub fn neighbourhoods(segment: &Trace, matcher: &MapMatcher, buffer: f64) -> Vec<PingNeighbourhood> {
    let metric = matcher.network().metric();
    let headings = segment.headings(metric);
    let speeds = segment.speeds(metric);
    segment
        .pings()
        .iter()
        .zip(headings.into_iter().zip(speeds))
        .map(|(ping, (heading, speed))| PingNeighbourhood {
            ping_index: ping.index,
            timestamp: ping.timestamp,
            point: ping.point,
            heading,
            speed,
            near: matcher.nearest_links(ping.point, buffer),
        })
        .collect()
}

/// Scores a path given as the set of link indices it uses. Returns the metrics and
/// which pings the path covers.
pub fn score(
    pings: &[PingNeighbourhood],
    path: &BTreeSet<usize>,
    waypoints: usize,
) -> (QualityMetrics, Vec<bool>) {
    let covered: Vec<bool> = pings.iter().map(|p| p.covered_by(path)).collect();
    let coverable = pings.iter().filter(|p| p.coverable()).count();
    let metrics = QualityMetrics::from_counts(
        pings.len(),
        covered.iter().filter(|c| **c).count(),
        coverable,
        waypoints.saturating_sub(2),
    );
    (metrics, covered)
}

#[cfg(test)]
mod test {
    use super::*;

    fn ping(index: usize, near: &[usize]) -> PingNeighbourhood {
        PingNeighbourhood {
            ping_index: index,
            timestamp: index as i64,
            point: Point::new(index as f64, 0.0),
            heading: None,
            speed: 0.0,
            near: near
                .iter()
                .map(|l| LinkMatch {
                    link: *l,
                    link_id: *l as i64,
                    distance: 1.0,
                    bearing: 0.0,
                })
                .collect(),
        }
    }

    #[test]
    fn test_score_excludes_sparse_pings() {
        let pings = vec![ping(0, &[1]), ping(1, &[1, 2]), ping(2, &[]), ping(3, &[3])];
        let path: BTreeSet<usize> = [1, 2].into_iter().collect();
        let (metrics, covered) = score(&pings, &path, 3);
        assert_eq!(covered, vec![true, true, false, false]);
        assert_eq!(metrics.covered_pings, 2);
        assert_eq!(metrics.coverable_pings, 3);
        assert_eq!(metrics.match_quality, 2.0 / 3.0);
        assert_eq!(metrics.match_quality_raw, 0.5);
        assert_eq!(metrics.middle_points_required, 1);
        assert!(metrics.match_quality >= metrics.match_quality_raw);
    }

    #[test]
    fn test_score_empty_path() {
        let pings = vec![ping(0, &[1]), ping(1, &[])];
        let (metrics, covered) = score(&pings, &BTreeSet::new(), 2);
        assert_eq!(covered, vec![false, false]);
        assert_eq!(metrics.match_quality, 0.0);
        assert_eq!(metrics.match_quality_raw, 0.0);
        assert_eq!(metrics.middle_points_required, 0);
    }
}
