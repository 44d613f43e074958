use chrono::NaiveDateTime;
use exif::{Exif, In, Reader, Tag, Value};
use std::io::Cursor;

use crate::dms::{self, Axis, DecodeError, Hemisphere, Ratio, RawPositionTag};

/// Layout of EXIF date/time strings ("2026:02:27 10:00:00").
const EXIF_DATETIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LocateError {
    #[error("no positional metadata")]
    NotPresent,

    #[error("malformed positional metadata: {0}")]
    Malformed(#[from] DecodeError),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpsFix {
    pub latitude: f64,
    pub longitude: f64,
}

/// What the embedded metadata of one image says.
///
/// The capture time is read independently of the position so that an image
/// located by other means can still be ordered chronologically.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataReading {
    pub position: Result<GpsFix, LocateError>,
    pub captured_at: Option<NaiveDateTime>,
}

impl MetadataReading {
    fn absent() -> Self {
        Self {
            position: Err(LocateError::NotPresent),
            captured_at: None,
        }
    }
}

/// Read the GPS block and capture time of an encoded image.
pub fn locate(bytes: &[u8]) -> MetadataReading {
    let exif = match Reader::new().read_from_container(&mut Cursor::new(bytes)) {
        Ok(exif) => exif,
        Err(e) => {
            tracing::debug!(error = %e, "No readable EXIF block");
            return MetadataReading::absent();
        }
    };

    MetadataReading {
        position: read_position(&exif),
        captured_at: read_capture_time(&exif),
    }
}

fn read_position(exif: &Exif) -> Result<GpsFix, LocateError> {
    // All four sub-tags or nothing
    let (Some(lat), Some(lat_ref), Some(lng), Some(lng_ref)) = (
        exif.get_field(Tag::GPSLatitude, In::PRIMARY),
        exif.get_field(Tag::GPSLatitudeRef, In::PRIMARY),
        exif.get_field(Tag::GPSLongitude, In::PRIMARY),
        exif.get_field(Tag::GPSLongitudeRef, In::PRIMARY),
    ) else {
        return Err(LocateError::NotPresent);
    };

    let lat_tag = raw_tag(&lat.value, &lat_ref.value)?;
    let lng_tag = raw_tag(&lng.value, &lng_ref.value)?;

    Ok(GpsFix {
        latitude: dms::decode_axis(&lat_tag, Axis::Latitude)?,
        longitude: dms::decode_axis(&lng_tag, Axis::Longitude)?,
    })
}

fn raw_tag(value: &Value, reference: &Value) -> Result<RawPositionTag, DecodeError> {
    let components = ratios(value)?;
    let hemisphere = Hemisphere::from_ref(&ascii(reference).unwrap_or_default())?;
    Ok(RawPositionTag::new(components, hemisphere))
}

fn ratios(value: &Value) -> Result<[Ratio; 3], DecodeError> {
    let parts: Vec<Ratio> = match value {
        Value::Rational(v) => v
            .iter()
            .map(|r| Ratio::new(r.num as i64, r.denom as i64))
            .collect(),
        Value::SRational(v) => v
            .iter()
            .map(|r| Ratio::new(r.num as i64, r.denom as i64))
            .collect(),
        _ => return Err(DecodeError::NotRational),
    };

    let count = parts.len();
    parts
        .try_into()
        .map_err(|_| DecodeError::ComponentCount(count))
}

fn ascii(value: &Value) -> Option<String> {
    match value {
        Value::Ascii(parts) => parts
            .first()
            .map(|bytes| String::from_utf8_lossy(bytes).trim_matches('\0').trim().to_string()),
        _ => None,
    }
}

fn read_capture_time(exif: &Exif) -> Option<NaiveDateTime> {
    let field = exif
        .get_field(Tag::DateTimeOriginal, In::PRIMARY)
        .or_else(|| exif.get_field(Tag::DateTime, In::PRIMARY))?;

    let text = ascii(&field.value)?;
    match parse_exif_datetime(&text) {
        Some(parsed) => Some(parsed),
        None => {
            tracing::warn!(value = %text, "Ignoring unparseable capture time");
            None
        }
    }
}

pub fn parse_exif_datetime(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text.trim(), EXIF_DATETIME_FORMAT).ok()
}
