use crate::algorithm::Metric;
use crate::error::{MapMatchError, MatchingError};
use crate::graph::Travel;
use geo::Point;
use serde::Deserialize;
use std::path::Path;

/**
 * Parameters and result records shared by the matching stages.
 * */

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Geoprocessing {
    pub metric: Metric,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataQuality {
    pub max_speed: f64,      // m/s
    pub max_speed_time: f64, // seconds above max_speed before a trace is rejected
    pub minimum_pings: usize,
    pub minimum_coverage: f64, // bounding box diagonal, m
    pub maximum_jittery: f64,  // m between pings sharing a timestamp
}

impl Default for DataQuality {
    fn default() -> Self {
        DataQuality {
            max_speed: 36.1,
            max_speed_time: 120.0,
            minimum_pings: 15,
            minimum_coverage: 500.0,
            maximum_jittery: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DeliveryStop {
    pub stopped_speed: f64,    // m/s
    pub min_time_stopped: f64, // s
    pub max_time_stopped: f64, // s
    pub max_stop_coverage: f64, // m
}

impl Default for DeliveryStop {
    fn default() -> Self {
        DeliveryStop {
            stopped_speed: 2.22,
            min_time_stopped: 300.0,
            max_time_stopped: 14_400.0,
            max_stop_coverage: 800.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MaximumSpace {
    pub max_time_gap: f64,     // s
    pub max_distance_gap: f64, // m
}

impl Default for MaximumSpace {
    fn default() -> Self {
        MaximumSpace {
            max_time_gap: 1_800.0,
            max_distance_gap: 2_000.0,
        }
    }
}

/// Stop finding policy, picked with `algorithm = "..."` in the configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum StopFinding {
    DeliveryStop(DeliveryStop),
    MaximumSpace(MaximumSpace),
}

impl Default for StopFinding {
    fn default() -> Self {
        StopFinding::DeliveryStop(DeliveryStop::default())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MapMatching {
    pub cost_discount: f64, // multiplier on the cost of links near the path
    pub buffer_size: f64,   // m
    pub minimum_match_quality: f64,
    pub maximum_waypoints: usize,
    pub heading_tolerance: f64, // degrees
}

impl Default for MapMatching {
    fn default() -> Self {
        MapMatching {
            cost_discount: 0.1,
            buffer_size: 20.0,
            minimum_match_quality: 0.99,
            maximum_waypoints: 20,
            heading_tolerance: 22.5,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Parameters {
    pub geoprocessing: Geoprocessing,
    pub data_quality: DataQuality,
    pub stop_finding: StopFinding,
    pub map_matching: MapMatching,
    /// skip the data quality gate entirely
    pub ignore_errors: bool,
}

impl Parameters {
    pub fn from_toml_str(text: &str) -> Result<Self, MapMatchError> {
        let parameters: Parameters = toml::from_str(text)?;
        parameters.validate()?;
        Ok(parameters)
    }

    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, MapMatchError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| MapMatchError::Io(path.display().to_string(), e))?;
        Parameters::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), MapMatchError> {
        let dq = &self.data_quality;
        let mm = &self.map_matching;
        let checks = [
            (dq.max_speed > 0.0, "data_quality.max_speed must be positive"),
            (dq.max_speed_time >= 0.0, "data_quality.max_speed_time must not be negative"),
            (dq.minimum_coverage >= 0.0, "data_quality.minimum_coverage must not be negative"),
            (dq.maximum_jittery >= 0.0, "data_quality.maximum_jittery must not be negative"),
            (
                mm.cost_discount > 0.0 && mm.cost_discount <= 1.0,
                "map_matching.cost_discount must be in (0, 1]",
            ),
            (mm.buffer_size > 0.0, "map_matching.buffer_size must be positive"),
            (
                (0.0..=1.0).contains(&mm.minimum_match_quality),
                "map_matching.minimum_match_quality must be in [0, 1]",
            ),
            (
                (0.0..=180.0).contains(&mm.heading_tolerance),
                "map_matching.heading_tolerance must be in [0, 180]",
            ),
        ];
        if let Some((_, message)) = checks.iter().find(|(ok, _)| !ok) {
            return Err(MapMatchError::Config(message.to_string()));
        }
        match &self.stop_finding {
            StopFinding::DeliveryStop(p) => {
                if p.stopped_speed < 0.0 || p.min_time_stopped < 0.0 || p.max_stop_coverage < 0.0 {
                    return Err(MapMatchError::Config(
                        "stop_finding thresholds must not be negative".to_string(),
                    ));
                }
                if p.max_time_stopped <= 0.0 {
                    return Err(MapMatchError::Config(
                        "stop_finding.max_time_stopped must be positive".to_string(),
                    ));
                }
            }
            StopFinding::MaximumSpace(p) => {
                if p.max_time_gap <= 0.0 || p.max_distance_gap <= 0.0 {
                    return Err(MapMatchError::Config(
                        "stop_finding gaps must be positive".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// A stopped interval of a trace, `first_ping..=last_ping` by position in the trace.
#[derive(Debug, Clone, PartialEq)]
pub struct Stop {
    pub first_ping: usize,
    pub last_ping: usize,
    pub start_time: i64,
    pub end_time: i64,
    pub anchor: Point<f64>,
}

impl Stop {
    pub fn duration(&self) -> f64 {
        (self.end_time - self.start_time) as f64
    }
}

/// A link forced into the path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Waypoint {
    pub link: usize,
    pub link_id: i64,
    pub travel: Travel,
    /// trace-wide index of the ping that motivated it
    pub ping_index: usize,
    /// 0 for the two anchors
    pub iteration: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchedLink {
    pub link: usize,
    pub link_id: i64,
    pub travel: Travel,
    /// path length at the end of this link
    pub milepost: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct QualityMetrics {
    pub total_pings: usize,
    /// pings within the buffer of the path
    pub covered_pings: usize,
    /// pings with any network link within the buffer
    pub coverable_pings: usize,
    pub match_quality: f64,
    pub match_quality_raw: f64,
    pub middle_points_required: usize,
}

impl QualityMetrics {
    pub fn from_counts(total: usize, covered: usize, coverable: usize, middle_points: usize) -> Self {
        QualityMetrics {
            total_pings: total,
            covered_pings: covered,
            coverable_pings: coverable,
            match_quality: (covered as f64 / coverable.max(1) as f64).min(1.0),
            match_quality_raw: (covered as f64 / total.max(1) as f64).min(1.0),
            middle_points_required: middle_points,
        }
    }

    pub fn excluded_pings(&self) -> usize {
        self.total_pings - self.coverable_pings
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MatchResult {
    pub trace_id: i64,
    pub links: Vec<MatchedLink>,
    pub quality: QualityMetrics,
    pub waypoints: Vec<Waypoint>,
    pub success: bool,
    pub errors: Vec<MatchingError>,
    /// link ids considered as per-ping candidates, ascending
    pub candidate_links: Vec<i64>,
    pub iterations: usize,
}

impl MatchResult {
    pub fn failed(trace_id: i64, error: MatchingError) -> Self {
        MatchResult {
            trace_id,
            errors: vec![error],
            ..MatchResult::default()
        }
    }

    pub fn has_error(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn link_ids(&self) -> Vec<i64> {
        self.links.iter().map(|l| l.link_id).collect()
    }

    /// Joins per-segment results into one trip result, in segment order.
    pub fn concat(trace_id: i64, parts: Vec<MatchResult>) -> Self {
        let mut result = MatchResult {
            trace_id,
            success: !parts.is_empty(),
            ..MatchResult::default()
        };
        let (mut total, mut covered, mut coverable, mut middle) = (0, 0, 0, 0);
        let mut offset = 0.0;
        for part in parts {
            total += part.quality.total_pings;
            covered += part.quality.covered_pings;
            coverable += part.quality.coverable_pings;
            middle += part.quality.middle_points_required;
            result.success &= part.success;
            result.iterations += part.iterations;
            let part_length = part.links.last().map_or(0.0, |l| l.milepost);
            result.links.extend(part.links.into_iter().map(|mut l| {
                l.milepost += offset;
                l
            }));
            offset += part_length;
            result.waypoints.extend(part.waypoints);
            result.errors.extend(part.errors);
            result.candidate_links = part.candidate_links;
        }
        result.quality = QualityMetrics::from_counts(total, covered, coverable, middle);
        result
    }
}
