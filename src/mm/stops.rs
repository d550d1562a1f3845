use super::model::{DeliveryStop, MaximumSpace, Parameters, Stop, StopFinding};
use super::traj::Trace;
use crate::algorithm::Metric;
use geo::{Centroid, MultiPoint, Point};
use log::debug;

/// Finds the stops of `trace` with the configured policy, ordered by first ping.
pub fn detect_stops(trace: &Trace, params: &Parameters) -> Vec<Stop> {
    let metric = params.geoprocessing.metric;
    let stops = match &params.stop_finding {
        StopFinding::DeliveryStop(p) => delivery_stops(trace, p, metric),
        StopFinding::MaximumSpace(p) => maximum_space_stops(trace, p, metric),
    };
    debug!("trace {} has {} stops", trace.trace_id(), stops.len());
    stops
}

/// Inclusive ping ranges between stops. Each range starts at the last ping of the
/// previous stop and ends at the first ping of the next one; ranges with fewer than two
/// pings are left out.
pub fn stop_segments(trace_len: usize, stops: &[Stop]) -> Vec<(usize, usize)> {
    if trace_len == 0 {
        return Vec::new();
    }
    let mut segments = Vec::with_capacity(stops.len() + 1);
    let mut cursor = 0;
    for stop in stops {
        if stop.first_ping > cursor {
            segments.push((cursor, stop.first_ping));
        }
        cursor = cursor.max(stop.last_ping);
    }
    if trace_len - 1 > cursor {
        segments.push((cursor, trace_len - 1));
    }
    segments
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Motion {
    Moving,
    Stopped,
}

fn delivery_stops(trace: &Trace, params: &DeliveryStop, metric: Metric) -> Vec<Stop> {
    let pings = trace.pings();
    if pings.len() < 2 {
        return Vec::new();
    }
    let speeds = trace.speeds(metric);
    let steps = trace.steps(metric);

    // a ping's speed describes the step arriving at it, so a stop starts one ping earlier
    // and ends on the ping before the vehicle speeds up again
    let mut intervals: Vec<(usize, usize)> = Vec::new();
    let mut state = Motion::Moving;
    let mut start = 0;
    for (i, speed) in speeds.iter().enumerate() {
        match state {
            Motion::Moving if *speed < params.stopped_speed => {
                state = Motion::Stopped;
                start = i.saturating_sub(1);
            }
            Motion::Stopped if *speed > params.stopped_speed => {
                state = Motion::Moving;
                intervals.push((start, i - 1));
            }
            _ => {}
        }
    }
    if state == Motion::Stopped {
        intervals.push((start, pings.len() - 1));
    }

    let mut merged: Vec<(usize, usize)> = Vec::with_capacity(intervals.len());
    for (first, last) in intervals {
        if let Some(previous) = merged.last_mut() {
            let travelled: f64 = steps[previous.1..first].iter().map(|(d, _)| d).sum();
            if travelled < params.max_stop_coverage {
                previous.1 = last;
                continue;
            }
        }
        merged.push((first, last));
    }

    let mut stops = Vec::new();
    for (first, last) in merged {
        for (a, b) in split_long(trace, first, last, params.max_time_stopped) {
            let duration = (pings[b].timestamp - pings[a].timestamp) as f64;
            if duration < params.min_time_stopped {
                continue;
            }
            stops.push(make_stop(trace, a, b));
        }
    }
    stops
}

// cuts first..=last into pieces no longer than max_duration
fn split_long(trace: &Trace, first: usize, last: usize, max_duration: f64) -> Vec<(usize, usize)> {
    let pings = trace.pings();
    let mut pieces = Vec::new();
    let mut start = first;
    while start <= last {
        let mut end = start;
        while end < last && (pings[end + 1].timestamp - pings[start].timestamp) as f64 <= max_duration {
            end += 1;
        }
        pieces.push((start, end));
        start = end + 1;
    }
    pieces
}

fn make_stop(trace: &Trace, first: usize, last: usize) -> Stop {
    let pings = &trace.pings()[first..=last];
    let anchor = MultiPoint::from(pings.iter().map(|p| p.point).collect::<Vec<Point<f64>>>())
        .centroid()
        .unwrap_or(pings[0].point);
    Stop {
        first_ping: first,
        last_ping: last,
        start_time: pings[0].timestamp,
        end_time: pings[pings.len() - 1].timestamp,
        anchor,
    }
}

fn maximum_space_stops(trace: &Trace, params: &MaximumSpace, metric: Metric) -> Vec<Stop> {
    trace
        .steps(metric)
        .iter()
        .enumerate()
        .filter(|(_, (distance, seconds))| {
            *seconds > params.max_time_gap || *distance > params.max_distance_gap
        })
        .map(|(i, _)| make_stop(trace, i, i + 1))
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mm::traj::Ping;

    fn trace(samples: &[(f64, i64)]) -> Trace {
        Trace::new(
            1,
            samples
                .iter()
                .map(|(x, t)| Ping::new(1, Point::new(*x, 0.0), *t))
                .collect(),
        )
    }

    // ten pings moving east at 10 m/s ending at x = 900, t = 90
    fn approach() -> Vec<(f64, i64)> {
        (0..10).map(|i| (i as f64 * 100.0, i * 10)).collect()
    }

    fn delivery(params: DeliveryStop) -> Parameters {
        Parameters {
            stop_finding: StopFinding::DeliveryStop(params),
            ..Parameters::default()
        }
    }

    #[test]
    fn test_single_delivery_stop() {
        let mut samples = approach();
        for t in [150, 210, 270, 330, 390, 450] {
            samples.push((900.0, t));
        }
        samples.extend([(1000.0, 460), (1100.0, 470), (1200.0, 480)]);
        let stops = detect_stops(&trace(&samples), &delivery(DeliveryStop::default()));
        assert_eq!(stops.len(), 1);
        let stop = &stops[0];
        assert_eq!((stop.first_ping, stop.last_ping), (9, 15));
        assert_eq!((stop.start_time, stop.end_time), (90, 450));
        assert_eq!(stop.anchor, Point::new(900.0, 0.0));
        assert_eq!(stop_segments(19, &stops), vec![(0, 9), (15, 18)]);
    }

    #[test]
    fn test_short_stop_is_travel() {
        let mut samples = approach();
        for t in [150, 210, 270] {
            samples.push((900.0, t));
        }
        samples.extend([(1000.0, 280), (1100.0, 290)]);
        let stops = detect_stops(&trace(&samples), &delivery(DeliveryStop::default()));
        assert!(stops.is_empty());
    }

    fn two_short_stops() -> Trace {
        let mut samples = approach();
        samples.extend([
            (900.0, 150),
            (900.0, 250),
            (1000.0, 260),
            (1050.0, 270),
            (1050.0, 370),
            (1050.0, 470),
            (1150.0, 480),
        ]);
        trace(&samples)
    }

    #[test]
    fn test_close_stops_are_merged() {
        let stops = detect_stops(&two_short_stops(), &delivery(DeliveryStop::default()));
        assert_eq!(stops.len(), 1);
        assert_eq!((stops[0].first_ping, stops[0].last_ping), (9, 15));
        assert_eq!(stops[0].duration(), 380.0);
    }

    #[test]
    fn test_distant_stops_are_not_merged() {
        // 150 m travelled between the stops
        let params = delivery(DeliveryStop {
            max_stop_coverage: 150.0,
            ..DeliveryStop::default()
        });
        assert!(detect_stops(&two_short_stops(), &params).is_empty());
        let params = delivery(DeliveryStop {
            max_stop_coverage: 150.0,
            min_time_stopped: 150.0,
            ..DeliveryStop::default()
        });
        assert_eq!(detect_stops(&two_short_stops(), &params).len(), 2);
    }

    fn long_stop(last_k: i64) -> Trace {
        let mut samples = approach();
        for k in 1..=last_k {
            samples.push((900.0, 90 + 600 * k));
        }
        samples.push((1000.0, 90 + 600 * last_k + 10));
        trace(&samples)
    }

    #[test]
    fn test_long_stop_is_split_at_threshold() {
        let stops = detect_stops(&long_stop(33), &delivery(DeliveryStop::default()));
        let bounds: Vec<(usize, usize)> = stops.iter().map(|s| (s.first_ping, s.last_ping)).collect();
        assert_eq!(bounds, vec![(9, 33), (34, 42)]);
        let durations: Vec<f64> = stops.iter().map(|s| s.duration()).collect();
        assert_eq!(durations, vec![14_400.0, 4_800.0]);
    }

    #[test]
    fn test_long_stop_short_remainder_dropped() {
        let stops = detect_stops(&long_stop(25), &delivery(DeliveryStop::default()));
        assert_eq!(stops.len(), 1);
        assert_eq!((stops[0].first_ping, stops[0].last_ping), (9, 33));
    }

    #[test]
    fn test_maximum_space_boundaries() {
        let samples = vec![(0.0, 0), (100.0, 10), (200.0, 20), (3_200.0, 80), (3_300.0, 90), (3_400.0, 4_000)];
        let params = Parameters {
            stop_finding: StopFinding::MaximumSpace(MaximumSpace::default()),
            ..Parameters::default()
        };
        let stops = detect_stops(&trace(&samples), &params);
        let bounds: Vec<(usize, usize)> = stops.iter().map(|s| (s.first_ping, s.last_ping)).collect();
        // a 3 km jump, then a gap of more than half an hour
        assert_eq!(bounds, vec![(2, 3), (4, 5)]);
        assert_eq!(stops[0].anchor, Point::new(1_700.0, 0.0));
        assert_eq!(stop_segments(6, &stops), vec![(0, 2), (3, 4)]);
    }

    #[test]
    fn test_segments_without_stops() {
        assert_eq!(stop_segments(5, &[]), vec![(0, 4)]);
        assert!(stop_segments(0, &[]).is_empty());
        assert!(stop_segments(1, &[]).is_empty());
    }
}
