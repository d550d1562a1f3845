use super::model::Parameters;
use super::traj::Trace;
use crate::error::DataQualityError;
use log::debug;

/// Outcome of the data quality gate.
#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    Admitted,
    Rejected(Vec<DataQualityError>),
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted)
    }

    pub fn reasons(&self) -> &[DataQualityError] {
        match self {
            Admission::Admitted => &[],
            Admission::Rejected(reasons) => reasons,
        }
    }
}

/// Runs every data quality check on `trace` and reports all failures together.
/// With `ignore_errors` set nothing is checked. The trace is never modified.
pub fn admit(trace: &Trace, params: &Parameters) -> Admission {
    if params.ignore_errors {
        return Admission::Admitted;
    }
    let dq = &params.data_quality;
    let metric = params.geoprocessing.metric;
    let mut reasons = Vec::new();

    if trace.len() < dq.minimum_pings {
        reasons.push(DataQualityError::InsufficientPings {
            found: trace.len(),
            minimum: dq.minimum_pings,
        });
    }

    let coverage = trace.coverage(metric);
    if coverage < dq.minimum_coverage {
        reasons.push(DataQualityError::InsufficientCoverage {
            coverage,
            minimum: dq.minimum_coverage,
        });
    }

    let separation = max_jitter(trace, metric);
    if separation > dq.maximum_jittery {
        reasons.push(DataQualityError::Jitter {
            separation,
            maximum: dq.maximum_jittery,
        });
    }

    let seconds = longest_speeding(trace, params);
    if seconds > 0.0 && seconds >= dq.max_speed_time {
        reasons.push(DataQualityError::UnrealisticSpeed {
            seconds,
            tolerance: dq.max_speed_time,
        });
    }

    if reasons.is_empty() {
        Admission::Admitted
    } else {
        debug!("trace {} rejected: {:?}", trace.trace_id(), reasons);
        Admission::Rejected(reasons)
    }
}

// largest distance between two pings sharing a timestamp
fn max_jitter(trace: &Trace, metric: crate::algorithm::Metric) -> f64 {
    let pings = trace.pings();
    let mut max = 0.0_f64;
    let mut start = 0;
    while start < pings.len() {
        let mut end = start + 1;
        while end < pings.len() && pings[end].timestamp == pings[start].timestamp {
            end += 1;
        }
        let group = &pings[start..end];
        for (i, a) in group.iter().enumerate() {
            for b in &group[i + 1..] {
                max = max.max(metric.distance(a.point, b.point));
            }
        }
        start = end;
    }
    max
}

// longest contiguous stretch of time spent above max_speed
fn longest_speeding(trace: &Trace, params: &Parameters) -> f64 {
    let max_speed = params.data_quality.max_speed;
    let mut run = 0.0_f64;
    let mut longest = 0.0_f64;
    for (distance, seconds) in trace.steps(params.geoprocessing.metric) {
        if seconds <= 0.0 {
            continue;
        }
        if distance / seconds > max_speed {
            run += seconds;
            longest = longest.max(run);
        } else {
            run = 0.0;
        }
    }
    longest
}
