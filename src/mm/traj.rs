use crate::algorithm::Metric;
use crate::error::MapMatchError;
use geo::Point;
use geojson::{Feature, GeoJson, JsonObject, Value};
use std::collections::BTreeMap;

/// A single time-stamped GPS fix.
#[derive(Debug, Clone, PartialEq)]
pub struct Ping {
    pub trace_id: i64,
    /// position in the trace once ordered by time
    pub index: usize,
    pub point: Point<f64>,
    /// seconds since the epoch
    pub timestamp: i64,
    /// compass heading in degrees
    pub heading: Option<f64>,
    /// metres per second
    pub speed: Option<f64>,
}

impl Ping {
    pub fn new(trace_id: i64, point: Point<f64>, timestamp: i64) -> Self {
        Ping {
            trace_id,
            index: 0,
            point,
            timestamp,
            heading: None,
            speed: None,
        }
    }

    pub fn with_heading(mut self, heading: f64) -> Self {
        self.heading = Some(heading);
        self
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }
}

/// Pings of one vehicle, always ordered by timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    trace_id: i64,
    pings: Vec<Ping>,
}

impl Trace {
    /// Orders `pings` by timestamp (stable for equal timestamps) and numbers them.
    pub fn new(trace_id: i64, mut pings: Vec<Ping>) -> Self {
        pings.sort_by_key(|p| p.timestamp);
        for (index, ping) in pings.iter_mut().enumerate() {
            ping.trace_id = trace_id;
            ping.index = index;
        }
        Trace { trace_id, pings }
    }

    pub fn trace_id(&self) -> i64 {
        self.trace_id
    }

    pub fn pings(&self) -> &[Ping] {
        &self.pings
    }

    pub fn len(&self) -> usize {
        self.pings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pings.is_empty()
    }

    pub fn points(&self) -> impl Iterator<Item = Point<f64>> + '_ {
        self.pings.iter().map(|p| p.point)
    }

    /// Bounding box diagonal of all pings.
    pub fn coverage(&self, metric: Metric) -> f64 {
        metric.bbox_diagonal(self.points())
    }

    /// Pings `first..=last`, keeping their trace-wide indices.
    pub fn sub_trace(&self, first: usize, last: usize) -> Trace {
        let last = last.min(self.pings.len().saturating_sub(1));
        let pings = if first <= last && first < self.pings.len() {
            self.pings[first..=last].to_vec()
        } else {
            Vec::new()
        };
        Trace {
            trace_id: self.trace_id,
            pings,
        }
    }

    /// Keeps the first ping of every timestamp. Returns the trace and how many were dropped.
    pub fn without_duplicate_timestamps(&self) -> (Trace, usize) {
        let mut pings: Vec<Ping> = Vec::with_capacity(self.pings.len());
        for ping in &self.pings {
            if pings.last().map_or(true, |p| p.timestamp != ping.timestamp) {
                pings.push(ping.clone());
            }
        }
        let dropped = self.pings.len() - pings.len();
        (Trace::new(self.trace_id, pings), dropped)
    }

    /// Bearing from each ping to the next; the last ping repeats the previous bearing.
    pub fn tangent_bearings(&self, metric: Metric) -> Vec<Option<f64>> {
        let mut bearings: Vec<Option<f64>> = self
            .pings
            .windows(2)
            .map(|w| {
                if w[0].point == w[1].point {
                    None
                } else {
                    Some(metric.bearing(w[0].point, w[1].point))
                }
            })
            .collect();
        if let Some(last) = bearings.last().copied() {
            bearings.push(last);
        } else if !self.pings.is_empty() {
            bearings.push(None);
        }
        bearings
    }

    /// Recorded heading of each ping, or its tangent bearing when none was recorded.
    pub fn headings(&self, metric: Metric) -> Vec<Option<f64>> {
        self.pings
            .iter()
            .zip(self.tangent_bearings(metric))
            .map(|(ping, tangent)| ping.heading.or(tangent))
            .collect()
    }

    /// Distance and elapsed seconds from each ping to the next.
    pub fn steps(&self, metric: Metric) -> Vec<(f64, f64)> {
        self.pings
            .windows(2)
            .map(|w| {
                (
                    metric.distance(w[0].point, w[1].point),
                    (w[1].timestamp - w[0].timestamp) as f64,
                )
            })
            .collect()
    }

    /// Speed at each ping: the recorded one, else the speed over the step arriving at it
    /// (the first ping uses the step leaving it).
    pub fn speeds(&self, metric: Metric) -> Vec<f64> {
        let steps = self.steps(metric);
        let step_speed = |i: usize| -> f64 {
            match steps.get(i) {
                Some((distance, seconds)) if *seconds > 0.0 => distance / seconds,
                Some(_) => 0.0,
                None => 0.0,
            }
        };
        self.pings
            .iter()
            .enumerate()
            .map(|(i, ping)| match ping.speed {
                Some(speed) => speed,
                None if i == 0 => step_speed(0),
                None => step_speed(i - 1),
            })
            .collect()
    }
}

/// All traces read from one source, ordered by trace id.
pub struct TraceCollection {
    pub traces: Vec<Trace>,
}

fn point_from_position(position: &[f64]) -> Result<Point<f64>, MapMatchError> {
    if position.len() < 2 {
        return Err(MapMatchError::Trace("position needs two coordinates".to_string()));
    }
    Ok(Point::new(position[0], position[1]))
}

fn line_trace(trace_id: i64, positions: &[Vec<f64>], properties: Option<&JsonObject>) -> Result<Vec<Ping>, MapMatchError> {
    let timestamps: Option<Vec<i64>> = properties
        .and_then(|p| p.get("timestamps"))
        .and_then(|v| v.as_array())
        .map(|values| values.iter().filter_map(|v| v.as_i64()).collect());
    let mut pings = Vec::with_capacity(positions.len());
    for (i, position) in positions.iter().enumerate() {
        let timestamp = timestamps
            .as_ref()
            .and_then(|t| t.get(i).copied())
            .unwrap_or(i as i64);
        pings.push(Ping::new(trace_id, point_from_position(position)?, timestamp));
    }
    Ok(pings)
}

fn feature_pings(feature: Feature, ordinal: i64) -> Result<(i64, Vec<Ping>), MapMatchError> {
    let properties = feature.properties.as_ref();
    let trace_id = properties
        .and_then(|p| p.get("trace_id"))
        .and_then(|v| v.as_i64())
        .unwrap_or(ordinal);
    let geometry = feature
        .geometry
        .as_ref()
        .ok_or_else(|| MapMatchError::Trace(format!("trace {} feature without geometry", trace_id)))?;
    let pings = match &geometry.value {
        Value::Point(position) => {
            let timestamp = properties
                .and_then(|p| p.get("timestamp"))
                .and_then(|v| v.as_i64())
                .ok_or_else(|| MapMatchError::Trace(format!("trace {} ping without timestamp", trace_id)))?;
            let mut ping = Ping::new(trace_id, point_from_position(position)?, timestamp);
            ping.heading = properties.and_then(|p| p.get("heading")).and_then(|v| v.as_f64());
            ping.speed = properties.and_then(|p| p.get("speed")).and_then(|v| v.as_f64());
            vec![ping]
        }
        Value::LineString(line) => line_trace(trace_id, line, properties)?,
        Value::MultiPoint(points) => line_trace(trace_id, points, properties)?,
        _ => {
            return Err(MapMatchError::Trace(
                "geometry only support Point, LineString, MultiPoint".to_string(),
            ))
        }
    };
    Ok((trace_id, pings))
}

impl TryFrom<GeoJson> for TraceCollection {
    type Error = MapMatchError;
    fn try_from(value: GeoJson) -> Result<Self, Self::Error> {
        let features = match value {
            GeoJson::FeatureCollection(fc) => fc.features,
            GeoJson::Feature(feature) => vec![feature],
            GeoJson::Geometry(geometry) => vec![Feature {
                bbox: None,
                geometry: Some(geometry),
                id: None,
                properties: None,
                foreign_members: None,
            }],
        };
        let mut grouped: BTreeMap<i64, Vec<Ping>> = BTreeMap::new();
        for (ordinal, feature) in features.into_iter().enumerate() {
            let (trace_id, pings) = feature_pings(feature, ordinal as i64)?;
            grouped.entry(trace_id).or_default().extend(pings);
        }
        Ok(TraceCollection {
            traces: grouped
                .into_iter()
                .map(|(trace_id, pings)| Trace::new(trace_id, pings))
                .collect(),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn ping(x: f64, y: f64, t: i64) -> Ping {
        Ping::new(1, Point::new(x, y), t)
    }

    #[test]
    fn test_trace_orders_by_time() {
        let trace = Trace::new(3, vec![ping(2.0, 0.0, 20), ping(0.0, 0.0, 0), ping(1.0, 0.0, 10)]);
        let times: Vec<i64> = trace.pings().iter().map(|p| p.timestamp).collect();
        assert_eq!(times, vec![0, 10, 20]);
        assert_eq!(trace.pings()[2].index, 2);
        assert!(trace.pings().iter().all(|p| p.trace_id == 3));
    }

    #[test]
    fn test_duplicate_timestamps_keep_first() {
        let trace = Trace::new(1, vec![ping(0.0, 0.0, 0), ping(5.0, 0.0, 0), ping(10.0, 0.0, 5)]);
        let (clean, dropped) = trace.without_duplicate_timestamps();
        assert_eq!(dropped, 1);
        assert_eq!(clean.len(), 2);
        assert_eq!(clean.pings()[0].point, Point::new(0.0, 0.0));
    }

    #[test]
    fn test_headings_fall_back_to_tangent() {
        let pings = vec![
            ping(0.0, 0.0, 0).with_heading(45.0),
            ping(0.0, 10.0, 1),
            ping(10.0, 10.0, 2),
        ];
        let trace = Trace::new(1, pings);
        let headings: Vec<f64> = trace.headings(Metric::Projected).into_iter().flatten().collect();
        assert_eq!(headings.len(), 3);
        for (heading, expected) in headings.iter().zip([45.0, 90.0, 90.0]) {
            assert!((heading - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_speeds() {
        let pings = vec![ping(0.0, 0.0, 0), ping(10.0, 0.0, 5), ping(10.0, 0.0, 10).with_speed(7.0)];
        let trace = Trace::new(1, pings);
        assert_eq!(trace.speeds(Metric::Projected), vec![2.0, 2.0, 7.0]);
    }

    #[test]
    fn test_sub_trace_keeps_indices() {
        let trace = Trace::new(1, (0..5).map(|i| ping(i as f64, 0.0, i)).collect());
        let sub = trace.sub_trace(2, 10);
        assert_eq!(sub.len(), 3);
        assert_eq!(sub.pings()[0].index, 2);
        assert!(trace.sub_trace(4, 2).is_empty());
    }

    #[test]
    fn test_traces_from_geojson() {
        let text = r#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "geometry": {"type": "Point", "coordinates": [1.0, 0.0]},
             "properties": {"trace_id": 2, "timestamp": 10, "heading": 90.0}},
            {"type": "Feature", "geometry": {"type": "Point", "coordinates": [0.0, 0.0]},
             "properties": {"trace_id": 2, "timestamp": 5}},
            {"type": "Feature", "geometry": {"type": "LineString", "coordinates": [[0.0, 0.0], [0.0, 1.0]]},
             "properties": {"trace_id": 1, "timestamps": [100, 160]}}
        ]}"#;
        let geojson: GeoJson = text.parse().unwrap();
        let collection = TraceCollection::try_from(geojson).unwrap();
        assert_eq!(collection.traces.len(), 2);
        assert_eq!(collection.traces[0].trace_id(), 1);
        assert_eq!(collection.traces[0].pings()[1].timestamp, 160);
        let second = &collection.traces[1];
        assert_eq!(second.pings()[0].timestamp, 5);
        assert_eq!(second.pings()[1].heading, Some(90.0));
    }
}
