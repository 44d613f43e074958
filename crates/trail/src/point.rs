use chrono::NaiveDateTime;
use locate::{Axis, GpsFix};
use serde::{Deserialize, Serialize};
use vision::Landmark;

/// Label given to every point located from embedded GPS metadata.
pub const METADATA_LABEL: &str = "Verified Metadata";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Provenance {
    Metadata,
    Vision,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResolveError {
    #[error("coordinates ({latitude}, {longitude}) are outside the valid range")]
    InvalidCoordinates { latitude: f64, longitude: f64 },
}

/// A located photograph. Coordinates are always finite and in range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedPoint {
    pub source_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub provenance: Provenance,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<NaiveDateTime>,
}

impl ResolvedPoint {
    pub fn from_metadata(
        source_id: &str,
        fix: GpsFix,
        timestamp: Option<NaiveDateTime>,
    ) -> Result<Self, ResolveError> {
        check_range(fix.latitude, fix.longitude)?;
        Ok(Self {
            source_id: source_id.to_string(),
            latitude: fix.latitude,
            longitude: fix.longitude,
            name: METADATA_LABEL.to_string(),
            description: None,
            provenance: Provenance::Metadata,
            timestamp,
        })
    }

    pub fn from_vision(
        source_id: &str,
        landmark: Landmark,
        timestamp: Option<NaiveDateTime>,
    ) -> Result<Self, ResolveError> {
        check_range(landmark.latitude, landmark.longitude)?;
        Ok(Self {
            source_id: source_id.to_string(),
            latitude: landmark.latitude,
            longitude: landmark.longitude,
            name: landmark.name,
            description: landmark.description,
            provenance: Provenance::Vision,
            timestamp,
        })
    }
}

fn check_range(latitude: f64, longitude: f64) -> Result<(), ResolveError> {
    if Axis::Latitude.contains(latitude) && Axis::Longitude.contains(longitude) {
        Ok(())
    } else {
        Err(ResolveError::InvalidCoordinates {
            latitude,
            longitude,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn landmark(lat: f64, lng: f64) -> Landmark {
        Landmark {
            name: "Somewhere".to_string(),
            latitude: lat,
            longitude: lng,
            description: None,
        }
    }

    #[test]
    fn test_metadata_point_uses_sentinel_name() {
        let fix = GpsFix {
            latitude: 48.8584,
            longitude: 2.2945,
        };
        let point = ResolvedPoint::from_metadata("eiffel.jpg", fix, None).unwrap();

        assert_eq!(point.name, METADATA_LABEL);
        assert_eq!(point.provenance, Provenance::Metadata);
        assert_eq!(point.description, None);
    }

    #[test]
    fn test_vision_point_range_checked() {
        assert!(ResolvedPoint::from_vision("a.jpg", landmark(91.0, 0.0), None).is_err());
        assert!(ResolvedPoint::from_vision("a.jpg", landmark(0.0, -180.5), None).is_err());
        assert!(ResolvedPoint::from_vision("a.jpg", landmark(f64::NAN, 0.0), None).is_err());
        assert!(ResolvedPoint::from_vision("a.jpg", landmark(-90.0, 180.0), None).is_ok());
    }

    #[test]
    fn test_serialized_shape() {
        let point = ResolvedPoint::from_vision(
            "louvre.jpg",
            Landmark {
                name: "Louvre Museum".to_string(),
                latitude: 48.8606,
                longitude: 2.3376,
                description: Some("Art museum".to_string()),
            },
            None,
        )
        .unwrap();

        let json = serde_json::to_value(&point).unwrap();
        assert_eq!(json["provenance"], "VISION");
        assert_eq!(json["source_id"], "louvre.jpg");
        assert_eq!(json["description"], "Art museum");
        assert!(json.get("timestamp").is_none());
    }
}
