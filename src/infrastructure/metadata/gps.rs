use std::io::Cursor;

use exif::{Exif, In, Reader, Tag, Value};

use super::Coordinates;

/// Converts degrees/minutes/seconds and a hemisphere reference into signed
/// decimal degrees.
pub fn dms_to_decimal(degrees: f64, minutes: f64, seconds: f64, reference: &str) -> f64 {
    let decimal = degrees + minutes / 60.0 + seconds / 3600.0;
    match reference.trim().to_ascii_uppercase().as_str() {
        "S" | "W" => -decimal,
        _ => decimal,
    }
}

/// Reads GPS coordinates from the EXIF block of an in-memory image.
///
/// Any parse failure yields `None`; callers treat missing location as normal.
pub fn extract_coordinates(bytes: &[u8]) -> Option<Coordinates> {
    let exif = match Reader::new().read_from_container(&mut Cursor::new(bytes)) {
        Ok(exif) => exif,
        Err(e) => {
            tracing::debug!(error = %e, "No readable EXIF data in upload");
            return None;
        }
    };

    let latitude = gps_component(&exif, Tag::GPSLatitude, Tag::GPSLatitudeRef)?;
    let longitude = gps_component(&exif, Tag::GPSLongitude, Tag::GPSLongitudeRef)?;

    Coordinates::new(latitude, longitude)
}

fn gps_component(exif: &Exif, value_tag: Tag, reference_tag: Tag) -> Option<f64> {
    let parts = match &exif.get_field(value_tag, In::PRIMARY)?.value {
        Value::Rational(parts) if !parts.is_empty() => parts
            .iter()
            .map(|r| r.to_f64())
            .collect::<Vec<_>>(),
        _ => return None,
    };

    let reference = match &exif.get_field(reference_tag, In::PRIMARY)?.value {
        Value::Ascii(values) => values
            .first()
            .and_then(|v| std::str::from_utf8(v).ok())
            .map(|s| s.trim().to_string())?,
        _ => return None,
    };

    let degrees = parts[0];
    let minutes = parts.get(1).copied().unwrap_or(0.0);
    let seconds = parts.get(2).copied().unwrap_or(0.0);

    let decimal = dms_to_decimal(degrees, minutes, seconds, &reference);
    decimal.is_finite().then_some(decimal)
}
