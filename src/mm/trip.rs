use super::matcher::MapMatcher;
use super::model::{MatchResult, MatchedLink, Parameters, Stop};
use super::quality::{admit, Admission};
use super::reconstruct::reconstruct;
use super::stops::{detect_stops, stop_segments};
use super::traj::Trace;
use crate::error::{DataQualityError, MapMatchError, MatchingError};
use geo::LineString;
use log::{debug, info, warn};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TripState {
    New,
    StopsComputed,
    Matching,
    Matched,
    Failed,
}

impl TripState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TripState::Matched | TripState::Failed)
    }
}

impl fmt::Display for TripState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            TripState::New => "new",
            TripState::StopsComputed => "stops_computed",
            TripState::Matching => "matching",
            TripState::Matched => "matched",
            TripState::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// One vehicle trace on its way through the gate, stop detection and path
/// reconstruction. A trip is matched once; `Matched` and `Failed` are final.
pub struct Trip<'a> {
    trace: Trace,
    params: &'a Parameters,
    matcher: &'a MapMatcher,
    state: TripState,
    stops: Vec<Stop>,
    result: MatchResult,
    data_quality: Vec<DataQualityError>,
    warnings: Vec<String>,
}

impl<'a> Trip<'a> {
    pub fn new(trace: Trace, params: &'a Parameters, matcher: &'a MapMatcher) -> Self {
        let result = MatchResult {
            trace_id: trace.trace_id(),
            ..MatchResult::default()
        };
        Trip {
            trace,
            params,
            matcher,
            state: TripState::New,
            stops: Vec::new(),
            result,
            data_quality: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn transition(&self, action: &'static str) -> MapMatchError {
        MapMatchError::InvalidTransition {
            trip_id: self.trip_id(),
            action,
            state: self.state.to_string(),
        }
    }

    /// Finds the stops that split the trace into independently matched segments.
    pub fn compute_stops(&mut self) -> Result<&[Stop], MapMatchError> {
        if self.state != TripState::New {
            return Err(self.transition("compute stops"));
        }
        // stops index the trace as it is matched, without duplicate timestamps
        let (trace, _) = self.trace.without_duplicate_timestamps();
        self.stops = detect_stops(&trace, self.params);
        self.state = TripState::StopsComputed;
        Ok(&self.stops)
    }

    /// Runs the data quality gate, then reconstructs the path of every segment between
    /// stops (or of the whole trace when no stops were computed).
    pub fn map_match(&mut self) -> Result<TripState, MapMatchError> {
        if self.state.is_terminal() || self.state == TripState::Matching {
            return Err(self.transition("map match"));
        }
        let trip_id = self.trip_id();
        let stops_computed = self.state == TripState::StopsComputed;

        if let Admission::Rejected(reasons) = admit(&self.trace, self.params) {
            for reason in &reasons {
                warn!("trip {} rejected: {}", trip_id, reason);
            }
            self.data_quality = reasons;
            self.result.success = false;
            self.state = TripState::Failed;
            return Ok(self.state);
        }
        self.state = TripState::Matching;

        let (trace, dropped) = self.trace.without_duplicate_timestamps();
        if dropped > 0 {
            let warning = format!("dropped {} pings with duplicate timestamps", dropped);
            warn!("trip {}: {}", trip_id, warning);
            self.warnings.push(warning);
        }
        let segments: Vec<Trace> = if stops_computed {
            stop_segments(trace.len(), &self.stops)
                .into_iter()
                .map(|(first, last)| trace.sub_trace(first, last))
                .collect()
        } else {
            vec![trace]
        };
        debug!("trip {} has {} segments", trip_id, segments.len());

        let mut parts = Vec::with_capacity(segments.len());
        for segment in &segments {
            parts.push(reconstruct(segment, self.matcher, self.params)?);
        }
        if parts.is_empty() {
            parts.push(MatchResult::failed(trip_id, MatchingError::EmptySegment));
        }
        self.result = MatchResult::concat(trip_id, parts);

        self.state = if self.result.success {
            TripState::Matched
        } else {
            TripState::Failed
        };
        info!(
            "trip {} {}: {} links, match quality {:.3}",
            trip_id,
            self.state,
            self.result.links.len(),
            self.result.quality.match_quality
        );
        Ok(self.state)
    }

    pub fn trip_id(&self) -> i64 {
        self.trace.trace_id()
    }

    pub fn state(&self) -> TripState {
        self.state
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    pub fn stops(&self) -> &[Stop] {
        &self.stops
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn data_quality_errors(&self) -> &[DataQualityError] {
        &self.data_quality
    }

    pub fn match_result(&self) -> &MatchResult {
        &self.result
    }

    /// 1 once matched, 0 otherwise.
    pub fn success(&self) -> u8 {
        u8::from(self.state == TripState::Matched)
    }

    pub fn has_error(&self) -> bool {
        !self.data_quality.is_empty() || self.result.has_error()
    }

    pub fn result(&self) -> &[MatchedLink] {
        &self.result.links
    }

    pub fn candidate_links(&self) -> &[i64] {
        &self.result.candidate_links
    }

    /// Bounding box diagonal of the trace.
    pub fn coverage(&self) -> f64 {
        self.trace.coverage(self.params.geoprocessing.metric)
    }

    /// Matched links joined in driving order. Vertices shared by consecutive links
    /// appear once.
    pub fn path_shape(&self) -> LineString<f64> {
        let network = self.matcher.network();
        let mut shape = LineString::new(Vec::new());
        for matched in &self.result.links {
            let link = match network.find_link_by_index(matched.link) {
                Some(link) => link,
                None => continue,
            };
            for coord in link.oriented_geometry(matched.travel).0 {
                if shape.0.last() != Some(&coord) {
                    shape.0.push(coord);
                }
            }
        }
        shape
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::algorithm::Metric;
    use crate::graph::{Link, LinkDirection, Network};
    use crate::mm::traj::Ping;
    use geo::Point;

    fn matcher() -> MapMatcher {
        let mut network = Network::new(Metric::Projected);
        network
            .add_link(Link::new(7, 1, 2, LinkDirection::Both, LineString::from(vec![(0.0, 0.0), (2000.0, 0.0)])))
            .unwrap();
        MapMatcher::new(network)
    }

    fn trace(samples: &[(f64, i64)]) -> Trace {
        let pings = samples
            .iter()
            .map(|(x, t)| Ping::new(3, Point::new(*x, 2.0), *t))
            .collect();
        Trace::new(3, pings)
    }

    // 10 m/s along the link, one ping every `step` metres
    fn steady(count: i64, step: f64) -> Trace {
        let seconds = (step / 10.0) as i64;
        let samples: Vec<(f64, i64)> = (0..count).map(|i| (i as f64 * step, i * seconds)).collect();
        trace(&samples)
    }

    #[test]
    fn test_trip_matched() {
        let (matcher, params) = (matcher(), Parameters::default());
        let mut trip = Trip::new(steady(20, 50.0), &params, &matcher);
        assert_eq!(trip.state(), TripState::New);
        assert_eq!(trip.map_match().unwrap(), TripState::Matched);
        assert_eq!(trip.success(), 1);
        assert!(!trip.has_error());
        assert_eq!(trip.match_result().link_ids(), vec![7]);
        assert_eq!(trip.result()[0].milepost, 2000.0);
        assert_eq!(trip.candidate_links(), &[7]);
        assert_eq!(trip.path_shape(), LineString::from(vec![(0.0, 0.0), (2000.0, 0.0)]));
        assert_eq!(trip.coverage(), 950.0);
        assert!(trip.warnings().is_empty());
    }

    #[test]
    fn test_trip_rejected_by_gate() {
        let (matcher, params) = (matcher(), Parameters::default());
        let mut trip = Trip::new(steady(10, 100.0), &params, &matcher);
        assert_eq!(trip.map_match().unwrap(), TripState::Failed);
        assert_eq!(trip.success(), 0);
        assert!(trip.has_error());
        let reasons: Vec<&str> = trip.data_quality_errors().iter().map(|e| e.reason()).collect();
        assert_eq!(reasons, vec!["insufficient_pings"]);
        assert!(trip.result().is_empty());
        assert!(matches!(
            trip.map_match(),
            Err(MapMatchError::InvalidTransition { trip_id: 3, .. })
        ));
    }

    #[test]
    fn test_ignore_errors_bypasses_gate() {
        let matcher = matcher();
        let params = Parameters {
            ignore_errors: true,
            ..Parameters::default()
        };
        let mut trip = Trip::new(steady(10, 100.0), &params, &matcher);
        assert_eq!(trip.map_match().unwrap(), TripState::Matched);
        assert!(trip.data_quality_errors().is_empty());
    }

    #[test]
    fn test_stops_split_matching() {
        let (matcher, params) = (matcher(), Parameters::default());
        let mut samples: Vec<(f64, i64)> = (0..10).map(|i| (i as f64 * 100.0, i * 10)).collect();
        for t in [150, 210, 270, 330, 390, 450] {
            samples.push((900.0, t));
        }
        samples.extend((1..10).map(|i| (900.0 + i as f64 * 100.0, 450 + i * 10)));
        let mut trip = Trip::new(trace(&samples), &params, &matcher);
        assert_eq!(trip.compute_stops().unwrap().len(), 1);
        assert_eq!(trip.state(), TripState::StopsComputed);
        assert!(trip.compute_stops().is_err());
        assert_eq!(trip.map_match().unwrap(), TripState::Matched);
        // each segment is matched on its own
        assert_eq!(trip.match_result().link_ids(), vec![7, 7]);
        assert_eq!(trip.result()[1].milepost, 4000.0);
        assert_eq!(trip.match_result().quality.total_pings, 10 + 10);
    }

    #[test]
    fn test_duplicate_timestamps_warned() {
        let (matcher, params) = (matcher(), Parameters::default());
        let mut pings: Vec<Ping> = steady(20, 50.0).pings().to_vec();
        pings.push(Ping::new(3, Point::new(50.5, 2.0), 5));
        let mut trip = Trip::new(Trace::new(3, pings), &params, &matcher);
        assert_eq!(trip.map_match().unwrap(), TripState::Matched);
        assert_eq!(trip.warnings().len(), 1);
        assert_eq!(trip.match_result().quality.total_pings, 20);
    }
}
