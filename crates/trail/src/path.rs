use geo::{Distance, Haversine, Point};
use serde::{Deserialize, Serialize};

use crate::point::ResolvedPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathOrdering {
    /// Every point had a capture time; sorted by it
    Chronological,
    /// At least one point had no capture time; input order kept
    InputOrder,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathSummary {
    pub ordered_points: Vec<ResolvedPoint>,
    pub total_distance_km: f64,
    pub ordering: PathOrdering,
}

/// One leg of the path between consecutive points
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathSegment {
    pub from: String,
    pub to: String,
    pub distance_km: f64,
}

impl PathSummary {
    pub fn segments(&self) -> Vec<PathSegment> {
        self.ordered_points
            .windows(2)
            .map(|pair| PathSegment {
                from: pair[0].source_id.clone(),
                to: pair[1].source_id.clone(),
                distance_km: distance_km(&pair[0], &pair[1]),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.ordered_points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered_points.is_empty()
    }
}

/// Order the points and measure the path through them.
///
/// Sorting only happens when every point has a timestamp; the sort is stable.
pub fn assemble(mut points: Vec<ResolvedPoint>) -> PathSummary {
    let ordering = if points.iter().all(|p| p.timestamp.is_some()) {
        points.sort_by_key(|p| p.timestamp);
        PathOrdering::Chronological
    } else {
        PathOrdering::InputOrder
    };

    let total_distance_km = points
        .windows(2)
        .map(|pair| distance_km(&pair[0], &pair[1]))
        .sum();

    PathSummary {
        ordered_points: points,
        total_distance_km,
        ordering,
    }
}

/// Great-circle distance in kilometers (spherical earth, mean radius)
pub fn distance_km(a: &ResolvedPoint, b: &ResolvedPoint) -> f64 {
    let origin = Point::new(a.longitude, a.latitude);
    let destination = Point::new(b.longitude, b.latitude);
    Haversine::distance(origin, destination) / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::Provenance;
    use chrono::NaiveDateTime;

    fn point(id: &str, lat: f64, lng: f64, time: Option<&str>) -> ResolvedPoint {
        ResolvedPoint {
            source_id: id.to_string(),
            latitude: lat,
            longitude: lng,
            name: id.to_string(),
            description: None,
            provenance: Provenance::Metadata,
            timestamp: time.map(|t| NaiveDateTime::parse_from_str(t, "%Y:%m:%d %H:%M:%S").unwrap()),
        }
    }

    fn ids(summary: &PathSummary) -> Vec<&str> {
        summary
            .ordered_points
            .iter()
            .map(|p| p.source_id.as_str())
            .collect()
    }

    #[test]
    fn test_empty_and_single() {
        let empty = assemble(Vec::new());
        assert_eq!(empty.total_distance_km, 0.0);
        assert!(empty.segments().is_empty());

        let single = assemble(vec![point("a", 48.8584, 2.2945, None)]);
        assert_eq!(single.total_distance_km, 0.0);
        assert_eq!(single.len(), 1);
    }

    #[test]
    fn test_reverse_input_sorted_chronologically() {
        let points = vec![
            point("notre_dame", 48.8529, 2.3501, Some("2026:02:27 15:45:00")),
            point("louvre", 48.8606, 2.3376, Some("2026:02:27 12:30:00")),
            point("eiffel", 48.8584, 2.2945, Some("2026:02:27 10:00:00")),
        ];

        let summary = assemble(points);

        assert_eq!(summary.ordering, PathOrdering::Chronological);
        assert_eq!(ids(&summary), vec!["eiffel", "louvre", "notre_dame"]);

        let legs = summary.segments();
        let expected = legs[0].distance_km + legs[1].distance_km;
        assert!((summary.total_distance_km - expected).abs() < 1e-9);
        assert!((legs[0].distance_km - 3.1625).abs() < 0.01);
        assert!((legs[1].distance_km - 1.2528).abs() < 0.01);
    }

    #[test]
    fn test_shuffled_timestamps_sorted() {
        let points = vec![
            point("c", 0.0, 3.0, Some("2026:01:01 03:00:00")),
            point("a", 0.0, 1.0, Some("2026:01:01 01:00:00")),
            point("d", 0.0, 4.0, Some("2026:01:01 04:00:00")),
            point("b", 0.0, 2.0, Some("2026:01:01 02:00:00")),
        ];

        assert_eq!(ids(&assemble(points)), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let points = vec![
            point("second", 1.0, 1.0, Some("2026:01:01 09:00:00")),
            point("x", 2.0, 2.0, Some("2026:01:01 09:00:00")),
            point("first", 0.0, 0.0, Some("2026:01:01 08:00:00")),
        ];

        assert_eq!(ids(&assemble(points)), vec!["first", "second", "x"]);
    }

    #[test]
    fn test_missing_timestamp_keeps_input_order() {
        let points = vec![
            point("c", 0.0, 3.0, Some("2026:01:01 03:00:00")),
            point("a", 0.0, 1.0, None),
            point("b", 0.0, 2.0, Some("2026:01:01 02:00:00")),
        ];

        let summary = assemble(points);

        assert_eq!(summary.ordering, PathOrdering::InputOrder);
        assert_eq!(ids(&summary), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_collinear_equal_spacing() {
        let points: Vec<_> = (0..5)
            .map(|i| point(&format!("p{}", i), 0.0, i as f64, None))
            .collect();

        let spacing = distance_km(&points[0], &points[1]);
        let summary = assemble(points);

        assert!((spacing - 111.195).abs() < 0.01);
        assert!((summary.total_distance_km - 4.0 * spacing).abs() < 1e-6);
    }
}
