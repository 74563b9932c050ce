//! Image metadata enrichment: EXIF GPS extraction and reverse geocoding.

pub mod gps;
pub mod geocoding;

pub use gps::{dms_to_decimal, extract_coordinates};
pub use geocoding::{LocationError, LocationResolver, NominatimResolver};

/// Signed decimal degrees. South and west are negative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// Returns `None` for values outside the WGS84 range.
    pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);

        valid.then_some(Coordinates { latitude, longitude })
    }
}
