use geo::algorithm::haversine_distance::HaversineDistance;
use geo::{BoundingRect, Closest, ClosestPoint, EuclideanDistance, Intersects, Line, LineString, MultiPoint, Point};
use serde::Deserialize;

/// metres per degree of latitude, rounded down so search boxes err on the large side
const METRES_PER_DEGREE: f64 = 111_000.0;

/// How distances are measured between positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// projected coordinates in metres, planar distance
    #[default]
    Projected,
    /// lon/lat degrees, great-circle distance in metres
    Geographic,
}

/// Where a point falls on a line string.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub distance: f64,
    pub closest_point: Point<f64>,
    /// distance along the line from its first vertex to `closest_point`
    pub offset: f64,
    /// bearing of the segment holding `closest_point`
    pub bearing: f64,
}

impl Metric {
    pub fn distance(&self, a: Point<f64>, b: Point<f64>) -> f64 {
        match self {
            Metric::Projected => a.euclidean_distance(&b),
            Metric::Geographic => a.haversine_distance(&b),
        }
    }

    /// Compass bearing in degrees [0, 360) from `a` to `b`.
    pub fn bearing(&self, a: Point<f64>, b: Point<f64>) -> f64 {
        let degrees = match self {
            Metric::Projected => (b.x() - a.x()).atan2(b.y() - a.y()).to_degrees(),
            Metric::Geographic => {
                let (lat1, lat2) = (a.y().to_radians(), b.y().to_radians());
                let delta_lon = (b.x() - a.x()).to_radians();
                let x = delta_lon.sin() * lat2.cos();
                let y = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * delta_lon.cos();
                x.atan2(y).to_degrees()
            }
        };
        normalize_bearing(degrees)
    }

    pub fn linestring_length(&self, line: &LineString<f64>) -> f64 {
        line.lines()
            .map(|segment| self.distance(segment.start_point(), segment.end_point()))
            .sum()
    }

    fn segment_closest(&self, point: Point<f64>, segment: &Line<f64>) -> (f64, Point<f64>) {
        let closest = match segment.closest_point(&point) {
            Closest::Intersection(p) | Closest::SinglePoint(p) => p,
            Closest::Indeterminate => segment.start_point(),
        };
        (self.distance(point, closest), closest)
    }

    /// Projects `point` onto `line`. Returns None for lines without segments.
    pub fn project(&self, point: Point<f64>, line: &LineString<f64>) -> Option<Projection> {
        let mut best: Option<Projection> = None;
        let mut walked = 0.0;
        for segment in line.lines() {
            let (distance, closest_point) = self.segment_closest(point, &segment);
            if best.map_or(true, |b| distance < b.distance) {
                best = Some(Projection {
                    distance,
                    closest_point,
                    offset: walked + self.distance(segment.start_point(), closest_point),
                    bearing: self.bearing(segment.start_point(), segment.end_point()),
                });
            }
            walked += self.distance(segment.start_point(), segment.end_point());
        }
        best
    }

    /// Smallest distance between two line strings, zero when they touch.
    pub fn line_distance(&self, a: &LineString<f64>, b: &LineString<f64>) -> f64 {
        if let Metric::Projected = self {
            return a.euclidean_distance(b);
        }
        if a.intersects(b) {
            return 0.0;
        }
        let mut min = f64::INFINITY;
        for seg_a in a.lines() {
            for seg_b in b.lines() {
                for (point, other) in [
                    (seg_a.start_point(), &seg_b),
                    (seg_a.end_point(), &seg_b),
                    (seg_b.start_point(), &seg_a),
                    (seg_b.end_point(), &seg_a),
                ] {
                    min = min.min(self.segment_closest(point, other).0);
                }
            }
        }
        min
    }

    /// Axis aligned search box around `point` that contains everything within `radius` metres.
    pub fn search_rect(&self, point: Point<f64>, radius: f64) -> ([f64; 2], [f64; 2]) {
        let (dx, dy) = match self {
            Metric::Projected => (radius, radius),
            Metric::Geographic => {
                let dy = radius / METRES_PER_DEGREE;
                let cos_lat = point.y().to_radians().cos().abs().max(1e-6);
                (dy / cos_lat, dy)
            }
        };
        (
            [point.x() - dx, point.y() - dy],
            [point.x() + dx, point.y() + dy],
        )
    }

    /// Diagonal of the bounding box around `points`, zero for an empty set.
    pub fn bbox_diagonal<I>(&self, points: I) -> f64
    where
        I: IntoIterator<Item = Point<f64>>,
    {
        match MultiPoint::from_iter(points).bounding_rect() {
            Some(rect) => self.distance(rect.min().into(), rect.max().into()),
            None => 0.0,
        }
    }
}

pub fn normalize_bearing(degrees: f64) -> f64 {
    let b = degrees % 360.0;
    let b = if b < 0.0 { b + 360.0 } else { b };
    // a tiny negative input rounds up to 360
    if b >= 360.0 {
        0.0
    } else {
        b
    }
}

/// Absolute angle between two bearings, in [0, 180].
pub fn angle_difference(a: f64, b: f64) -> f64 {
    let d = normalize_bearing(a - b);
    if d > 180.0 {
        360.0 - d
    } else {
        d
    }
}

/// Bounding rectangle of a line string as (min, max) corners.
pub fn line_rect(line: &LineString<f64>) -> Option<([f64; 2], [f64; 2])> {
    let rect = line.bounding_rect()?;
    Some(([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_projected_bearing() {
        let m = Metric::Projected;
        let o = Point::new(0.0, 0.0);
        let cases = [((0.0, 10.0), 0.0), ((10.0, 0.0), 90.0), ((0.0, -10.0), 180.0), ((-10.0, 0.0), 270.0)];
        for ((x, y), expected) in cases {
            assert!((m.bearing(o, Point::new(x, y)) - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_geographic_bearing() {
        let m = Metric::Geographic;
        assert!((m.bearing(Point::new(0.0, 0.0), Point::new(1.0, 0.0)) - 90.0).abs() < 1e-9);
        assert!((m.bearing(Point::new(1.0, 0.0), Point::new(0.0, 0.0)) - 270.0).abs() < 1e-9);
        assert!((m.bearing(Point::new(0.0, 0.0), Point::new(0.0, -1.0)) - 180.0).abs() < 1e-9);
    }

    #[test]
    fn test_angle_difference_wraps() {
        assert_eq!(angle_difference(350.0, 10.0), 20.0);
        assert_eq!(angle_difference(10.0, 350.0), 20.0);
        assert_eq!(angle_difference(90.0, 270.0), 180.0);
        assert_eq!(angle_difference(45.0, 45.0), 0.0);
    }

    #[test]
    fn test_project_on_polyline() {
        let m = Metric::Projected;
        let line = LineString::from(vec![(0.0, 0.0), (100.0, 0.0), (100.0, 100.0)]);
        let p = m.project(Point::new(110.0, 50.0), &line).unwrap();
        assert!((p.distance - 10.0).abs() < 1e-9);
        assert!((p.offset - 150.0).abs() < 1e-9);
        assert_eq!(p.bearing, 0.0);
        assert!(m.project(Point::new(0.0, 0.0), &LineString::from(vec![(1.0, 1.0)])).is_none());
    }

    #[test]
    fn test_line_distance() {
        let m = Metric::Projected;
        let a = LineString::from(vec![(0.0, 0.0), (100.0, 0.0)]);
        let b = LineString::from(vec![(0.0, 30.0), (100.0, 30.0)]);
        let crossing = LineString::from(vec![(50.0, -10.0), (50.0, 10.0)]);
        assert!((m.line_distance(&a, &b) - 30.0).abs() < 1e-9);
        assert_eq!(m.line_distance(&a, &crossing), 0.0);
    }

    #[test]
    fn test_geographic_line_distance() {
        let m = Metric::Geographic;
        let a = LineString::from(vec![(10.0, 60.0), (10.01, 60.0)]);
        let b = LineString::from(vec![(10.0, 60.001), (10.01, 60.001)]);
        let crossing = LineString::from(vec![(10.005, 59.999), (10.005, 60.001)]);
        assert!((m.line_distance(&a, &b) - 111.2).abs() < 1.0);
        assert_eq!(m.line_distance(&a, &crossing), 0.0);
    }

    #[test]
    fn test_line_rect() {
        let line = LineString::from(vec![(5.0, 1.0), (-2.0, 7.0), (3.0, -4.0)]);
        assert_eq!(line_rect(&line), Some(([-2.0, -4.0], [5.0, 7.0])));
        assert_eq!(line_rect(&LineString::new(Vec::new())), None);
    }

    #[test]
    fn test_bbox_diagonal() {
        let m = Metric::Projected;
        let points = vec![Point::new(0.0, 0.0), Point::new(30.0, 5.0), Point::new(10.0, 40.0)];
        assert!((m.bbox_diagonal(points) - 50.0).abs() < 1e-9);
        assert_eq!(m.bbox_diagonal(Vec::new()), 0.0);
    }

    #[test]
    fn test_geographic_search_rect_contains_radius() {
        let m = Metric::Geographic;
        let centre = Point::new(10.0, 60.0);
        let (min, max) = m.search_rect(centre, 1_000.0);
        let east = Point::new(max[0], centre.y());
        let north = Point::new(centre.x(), max[1]);
        assert!(m.distance(centre, east) >= 1_000.0);
        assert!(m.distance(centre, north) >= 1_000.0);
        assert!(min[0] < centre.x() && min[1] < centre.y());
    }
}
