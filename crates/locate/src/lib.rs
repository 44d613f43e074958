pub mod dms;
pub mod locator;

pub use dms::{Axis, DecodeError, Hemisphere, Ratio, RawPositionTag, decode};
pub use locator::{GpsFix, LocateError, MetadataReading, locate, parse_exif_datetime};
