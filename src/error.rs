use thiserror::Error;

/// Reasons the data quality gate rejects a trace.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataQualityError {
    #[error("vehicle with only {found} pings, minimum is {minimum}")]
    InsufficientPings { found: usize, minimum: usize },
    #[error("vehicle covers only {coverage:.2} m, minimum is {minimum}")]
    InsufficientCoverage { coverage: f64, minimum: f64 },
    #[error("data is jittery, pings with the same timestamp {separation:.2} m apart (maximum {maximum})")]
    Jitter { separation: f64, maximum: f64 },
    #[error("max speed surpassed for {seconds} seconds (tolerance {tolerance})")]
    UnrealisticSpeed { seconds: f64, tolerance: f64 },
}

impl DataQualityError {
    pub fn reason(&self) -> &'static str {
        match self {
            DataQualityError::InsufficientPings { .. } => "insufficient_pings",
            DataQualityError::InsufficientCoverage { .. } => "insufficient_coverage",
            DataQualityError::Jitter { .. } => "jitter",
            DataQualityError::UnrealisticSpeed { .. } => "unrealistic_speed",
        }
    }
}

/// Failures recorded on a trip while reconstructing its path. None of them abort a batch.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MatchingError {
    #[error("no candidate link found within {buffer} m of pings {first_ping}..={last_ping}")]
    NoCandidateLinkFound {
        first_ping: usize,
        last_ping: usize,
        buffer: f64,
    },
    #[error("match quality {quality:.3} below {minimum} after {waypoints} waypoints")]
    QualityNotReached {
        quality: f64,
        minimum: f64,
        waypoints: usize,
    },
    #[error("segment has no pings")]
    EmptySegment,
    #[error("no path between node {from} and node {to}")]
    DisconnectedNetwork { from: i64, to: i64 },
}

impl MatchingError {
    pub fn reason(&self) -> &'static str {
        match self {
            MatchingError::NoCandidateLinkFound { .. } => "no_candidate_link_found",
            MatchingError::QualityNotReached { .. } => "quality_not_reached_within_waypoint_budget",
            MatchingError::EmptySegment => "empty_segment",
            MatchingError::DisconnectedNetwork { .. } => "disconnected_network",
        }
    }
}

/// Infrastructure failures. These are fatal and propagate to the caller.
#[derive(Error, Debug)]
pub enum MapMatchError {
    #[error("invalid map matching configuration: {0}")]
    Config(String),
    #[error("failure reading {0}: {1}")]
    Io(String, std::io::Error),
    #[error("failure parsing geojson: {0}")]
    GeoJson(#[from] geojson::Error),
    #[error("failure parsing configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),
    #[error("invalid network: {0}")]
    Network(String),
    #[error("invalid trace data: {0}")]
    Trace(String),
    #[error("link index {0} not in network")]
    UnknownLink(usize),
    #[error("node '{0}' not in network")]
    UnknownNode(i64),
    #[error("trip {trip_id} cannot {action} while {state}")]
    InvalidTransition {
        trip_id: i64,
        action: &'static str,
        state: String,
    },
    #[error("failure building worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}
