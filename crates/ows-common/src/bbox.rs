//! Geographic bounding boxes (geoboxes) used for temporal search windows.

use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};

/// Seconds of solar time per degree of longitude (86400 / 360).
const SECONDS_PER_DEGREE: f64 = 240.0;

/// A geographic bounding box in EPSG:4326 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Create a new bounding box from corner coordinates.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Parse "minx,miny,maxx,maxy".
    pub fn from_wms_string(s: &str) -> Result<Self, BboxParseError> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(BboxParseError::InvalidFormat(s.to_string()));
        }

        let mut coords = [0.0f64; 4];
        for (slot, part) in coords.iter_mut().zip(&parts) {
            *slot = part
                .parse()
                .map_err(|_| BboxParseError::InvalidNumber(part.to_string()))?;
        }
        Ok(Self::new(coords[0], coords[1], coords[2], coords[3]))
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Centre point as (lon, lat).
    pub fn centre(&self) -> (f64, f64) {
        (
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Local solar time offset for the box's representative (centre) longitude.
    pub fn solar_offset(&self) -> FixedOffset {
        solar_offset_for_longitude(self.centre().0)
    }
}

/// Local solar time offset for a longitude: four minutes per degree.
pub fn solar_offset_for_longitude(lon: f64) -> FixedOffset {
    // Normalise into [-180, 180) so offsets stay within a day.
    let lon = (lon + 180.0).rem_euclid(360.0) - 180.0;
    let seconds = (lon * SECONDS_PER_DEGREE).round() as i32;
    // |seconds| <= 43200, always a valid offset.
    FixedOffset::east_opt(seconds).unwrap_or_else(|| Utc.fix())
}

#[derive(Debug, thiserror::Error)]
pub enum BboxParseError {
    #[error("Invalid BBOX format: {0}. Expected 'minx,miny,maxx,maxy'")]
    InvalidFormat(String),

    #[error("Invalid number in BBOX: {0}")]
    InvalidNumber(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bbox() {
        let bbox = BoundingBox::from_wms_string("145.0, -35.0, 146.0, -33.0").unwrap();
        assert_eq!(bbox.min_x, 145.0);
        assert_eq!(bbox.max_y, -33.0);
        assert!(BoundingBox::from_wms_string("1,2,3").is_err());
        assert!(BoundingBox::from_wms_string("1,2,x,4").is_err());
    }

    #[test]
    fn test_solar_offset_from_centre() {
        let bbox = BoundingBox::new(149.0, -36.0, 151.0, -34.0);
        assert_eq!(bbox.solar_offset().local_minus_utc(), 10 * 3600);

        let west = BoundingBox::new(-76.0, 38.0, -74.0, 40.0);
        assert_eq!(west.solar_offset().local_minus_utc(), -5 * 3600);
    }

    #[test]
    fn test_solar_offset_wraps_longitude() {
        assert_eq!(solar_offset_for_longitude(210.0).local_minus_utc(), -10 * 3600);
        assert_eq!(solar_offset_for_longitude(145.5).local_minus_utc(), 34920);
    }
}
