use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("{component} has a zero denominator")]
    ZeroDenominator { component: &'static str },

    #[error("{component} is negative")]
    Negative { component: &'static str },

    #[error("expected 3 rational components, found {0}")]
    ComponentCount(usize),

    #[error("position value is not rational")]
    NotRational,

    #[error("unknown hemisphere reference {0:?}")]
    UnknownHemisphere(String),

    #[error("hemisphere {hemisphere} does not belong to the {axis} axis")]
    HemisphereMismatch { hemisphere: Hemisphere, axis: Axis },

    #[error("{axis} {value} is outside [-{limit}, {limit}]", limit = .axis.limit())]
    OutOfRange { axis: Axis, value: f64 },
}

/// Numerator/denominator pair as stored in the GPS block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ratio {
    pub numerator: i64,
    pub denominator: i64,
}

impl Ratio {
    pub fn new(numerator: i64, denominator: i64) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    fn to_f64(self, component: &'static str) -> Result<f64, DecodeError> {
        if self.denominator == 0 {
            return Err(DecodeError::ZeroDenominator { component });
        }
        let value = self.numerator as f64 / self.denominator as f64;
        if value < 0.0 {
            return Err(DecodeError::Negative { component });
        }
        Ok(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Axis {
    Latitude,
    Longitude,
}

impl Axis {
    pub fn limit(self) -> f64 {
        match self {
            Axis::Latitude => 90.0,
            Axis::Longitude => 180.0,
        }
    }

    pub fn contains(self, value: f64) -> bool {
        value.is_finite() && value.abs() <= self.limit()
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::Latitude => write!(f, "latitude"),
            Axis::Longitude => write!(f, "longitude"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hemisphere {
    North,
    South,
    East,
    West,
}

impl Hemisphere {
    /// Parse a GPS reference such as `N` or `W`. Surrounding whitespace and NULs are ignored.
    pub fn from_ref(reference: &str) -> Result<Self, DecodeError> {
        let trimmed = reference.trim_matches(|c: char| c.is_whitespace() || c == '\0');
        match trimmed.to_ascii_uppercase().as_str() {
            "N" => Ok(Hemisphere::North),
            "S" => Ok(Hemisphere::South),
            "E" => Ok(Hemisphere::East),
            "W" => Ok(Hemisphere::West),
            _ => Err(DecodeError::UnknownHemisphere(reference.to_string())),
        }
    }

    pub fn axis(self) -> Axis {
        match self {
            Hemisphere::North | Hemisphere::South => Axis::Latitude,
            Hemisphere::East | Hemisphere::West => Axis::Longitude,
        }
    }

    fn sign(self) -> f64 {
        match self {
            Hemisphere::South | Hemisphere::West => -1.0,
            Hemisphere::North | Hemisphere::East => 1.0,
        }
    }
}

impl fmt::Display for Hemisphere {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = match self {
            Hemisphere::North => 'N',
            Hemisphere::South => 'S',
            Hemisphere::East => 'E',
            Hemisphere::West => 'W',
        };
        write!(f, "{}", c)
    }
}

/// Degrees, minutes and seconds of one axis plus its hemisphere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawPositionTag {
    pub degrees: Ratio,
    pub minutes: Ratio,
    pub seconds: Ratio,
    pub hemisphere: Hemisphere,
}

impl RawPositionTag {
    pub fn new(components: [Ratio; 3], hemisphere: Hemisphere) -> Self {
        let [degrees, minutes, seconds] = components;
        Self {
            degrees,
            minutes,
            seconds,
            hemisphere,
        }
    }
}

/// Convert a DMS tag to signed decimal degrees.
///
/// South and west are negative. The magnitude must fit the axis the
/// hemisphere belongs to.
pub fn decode(tag: &RawPositionTag) -> Result<f64, DecodeError> {
    let degrees = tag.degrees.to_f64("degrees")?;
    let minutes = tag.minutes.to_f64("minutes")?;
    let seconds = tag.seconds.to_f64("seconds")?;

    let magnitude = degrees + minutes / 60.0 + seconds / 3600.0;
    let value = tag.hemisphere.sign() * magnitude;

    let axis = tag.hemisphere.axis();
    if !axis.contains(value) {
        return Err(DecodeError::OutOfRange { axis, value });
    }

    Ok(value)
}

/// Decode a tag that must belong to `axis`.
pub fn decode_axis(tag: &RawPositionTag, axis: Axis) -> Result<f64, DecodeError> {
    if tag.hemisphere.axis() != axis {
        return Err(DecodeError::HemisphereMismatch {
            hemisphere: tag.hemisphere,
            axis,
        });
    }
    decode(tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(d: (i64, i64), m: (i64, i64), s: (i64, i64), h: Hemisphere) -> RawPositionTag {
        RawPositionTag::new(
            [Ratio::new(d.0, d.1), Ratio::new(m.0, m.1), Ratio::new(s.0, s.1)],
            h,
        )
    }

    #[test]
    fn test_decode_eiffel_tower() {
        let lat = tag((48, 1), (51, 1), (3024, 100), Hemisphere::North);
        let lng = tag((2, 1), (17, 1), (402, 10), Hemisphere::East);

        assert!((decode(&lat).unwrap() - 48.8584).abs() < 1e-9);
        assert!((decode(&lng).unwrap() - 2.2945).abs() < 1e-9);
    }

    #[test]
    fn test_south_and_west_are_negative() {
        let samples = [
            ((0, 1), (0, 1), (0, 1)),
            ((33, 1), (52, 1), (1, 3)),
            ((12, 1), (30, 2), (599, 10)),
            ((89, 1), (59, 1), (59, 1)),
        ];

        for (d, m, s) in samples {
            assert!(decode(&tag(d, m, s, Hemisphere::North)).unwrap() >= 0.0);
            assert!(decode(&tag(d, m, s, Hemisphere::East)).unwrap() >= 0.0);
            assert!(decode(&tag(d, m, s, Hemisphere::South)).unwrap() <= 0.0);
            assert!(decode(&tag(d, m, s, Hemisphere::West)).unwrap() <= 0.0);

            let t = tag(d, m, s, Hemisphere::West);
            assert_eq!(decode(&t), decode(&t));
        }
    }

    #[test]
    fn test_zero_denominator_is_malformed() {
        let t = tag((48, 1), (51, 0), (0, 1), Hemisphere::North);
        assert_eq!(
            decode(&t),
            Err(DecodeError::ZeroDenominator {
                component: "minutes"
            })
        );
    }

    #[test]
    fn test_negative_degrees_rejected() {
        let t = tag((-48, 1), (0, 1), (0, 1), Hemisphere::North);
        assert_eq!(
            decode(&t),
            Err(DecodeError::Negative {
                component: "degrees"
            })
        );
    }

    #[test]
    fn test_impossible_latitude_rejected() {
        let t = tag((91, 1), (0, 1), (0, 1), Hemisphere::South);
        assert!(matches!(
            decode(&t),
            Err(DecodeError::OutOfRange {
                axis: Axis::Latitude,
                ..
            })
        ));

        // 170 degrees is fine on the longitude axis
        let t = tag((170, 1), (0, 1), (0, 1), Hemisphere::West);
        assert_eq!(decode(&t), Ok(-170.0));
    }

    #[test]
    fn test_hemisphere_parsing() {
        assert_eq!(Hemisphere::from_ref("N"), Ok(Hemisphere::North));
        assert_eq!(Hemisphere::from_ref(" w\0"), Ok(Hemisphere::West));
        assert!(matches!(
            Hemisphere::from_ref("X"),
            Err(DecodeError::UnknownHemisphere(_))
        ));
    }

    #[test]
    fn test_axis_mismatch() {
        let t = tag((10, 1), (0, 1), (0, 1), Hemisphere::East);
        assert!(matches!(
            decode_axis(&t, Axis::Latitude),
            Err(DecodeError::HemisphereMismatch { .. })
        ));
        assert_eq!(decode_axis(&t, Axis::Longitude), Ok(10.0));
    }
}
