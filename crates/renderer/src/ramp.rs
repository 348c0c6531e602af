//! Colour ramps: piecewise-linear mapping from a scalar to RGBA.

use ows_common::color::unit_to_byte;
use colorous::Gradient;
use ows_common::{RampError, Rgba};
use serde_json::Value;

/// One control point of a ramp. `alpha` is in the unit interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RampPoint {
    pub value: f64,
    pub color: Rgba,
    pub alpha: f64,
}

impl RampPoint {
    pub fn new(value: f64, color: Rgba, alpha: f64) -> Self {
        Self {
            value,
            color,
            alpha,
        }
    }

    fn rgba(&self) -> Rgba {
        Rgba::new(self.color.r, self.color.g, self.color.b, unit_to_byte(self.alpha))
    }
}

/// Default ramp over 0..1, transparent below 0.
const DEFAULT_RAMP: [(f64, Rgba); 7] = [
    (0.0, Rgba::opaque(0x00, 0x00, 0x80)),
    (0.1, Rgba::opaque(0x00, 0x00, 0xFF)),
    (0.3, Rgba::opaque(0x00, 0xFF, 0xFF)),
    (0.5, Rgba::opaque(0x00, 0xFF, 0x00)),
    (0.7, Rgba::opaque(0xFF, 0xFF, 0x00)),
    (0.9, Rgba::opaque(0xFF, 0x00, 0x00)),
    (1.0, Rgba::opaque(0x80, 0x00, 0x00)),
];

/// Control points sampled from a named palette.
const PALETTE_SAMPLES: usize = 21;

/// Look up a matplotlib-style palette name; a `_r` suffix reverses it.
fn palette(name: &str) -> Option<(Gradient, bool)> {
    let (base, reversed) = match name.strip_suffix("_r") {
        Some(base) => (base, true),
        None => (name, false),
    };
    let gradient = match base {
        // Diverging
        "RdYlBu" => colorous::RED_YELLOW_BLUE,
        "RdYlGn" => colorous::RED_YELLOW_GREEN,
        "RdBu" => colorous::RED_BLUE,
        "RdGy" => colorous::RED_GREY,
        "BrBG" => colorous::BROWN_GREEN,
        "PiYG" => colorous::PINK_GREEN,
        "PRGn" => colorous::PURPLE_GREEN,
        "PuOr" => colorous::PURPLE_ORANGE,
        "Spectral" => colorous::SPECTRAL,
        // Sequential
        "Blues" => colorous::BLUES,
        "Greens" => colorous::GREENS,
        "Greys" => colorous::GREYS,
        "Oranges" => colorous::ORANGES,
        "Purples" => colorous::PURPLES,
        "Reds" => colorous::REDS,
        "BuGn" => colorous::BLUE_GREEN,
        "BuPu" => colorous::BLUE_PURPLE,
        "GnBu" => colorous::GREEN_BLUE,
        "OrRd" => colorous::ORANGE_RED,
        "PuBu" => colorous::PURPLE_BLUE,
        "PuBuGn" => colorous::PURPLE_BLUE_GREEN,
        "PuRd" => colorous::PURPLE_RED,
        "RdPu" => colorous::RED_PURPLE,
        "YlGn" => colorous::YELLOW_GREEN,
        "YlGnBu" => colorous::YELLOW_GREEN_BLUE,
        "YlOrBr" => colorous::YELLOW_ORANGE_BROWN,
        "YlOrRd" => colorous::YELLOW_ORANGE_RED,
        // Perceptually uniform
        "viridis" => colorous::VIRIDIS,
        "inferno" => colorous::INFERNO,
        "magma" => colorous::MAGMA,
        "plasma" => colorous::PLASMA,
        "cividis" => colorous::CIVIDIS,
        "turbo" => colorous::TURBO,
        _ => return None,
    };
    Some((gradient, reversed))
}

fn check_range(min: f64, max: f64) -> Result<f64, RampError> {
    if !(min.is_finite() && max.is_finite()) || min >= max {
        return Err(RampError::EmptyRange { min, max });
    }
    Ok(max - min)
}

/// Control points sorted by value.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorRamp {
    points: Vec<RampPoint>,
}

impl ColorRamp {
    /// Build from points, which must be non-empty and in non-decreasing order.
    ///
    /// Equal neighbouring values are allowed so a ramp can step sharply at a
    /// boundary (e.g. `-0.0` and `0.0`).
    pub fn new(points: Vec<RampPoint>) -> Result<Self, RampError> {
        if points.is_empty() {
            return Err(RampError::Empty);
        }
        if let Some(p) = points.iter().find(|p| !p.value.is_finite()) {
            return Err(RampError::NonFinite(p.value));
        }
        if let Some(w) = points.windows(2).find(|w| w[1].value < w[0].value) {
            return Err(RampError::OutOfOrder {
                prev: w[0].value,
                next: w[1].value,
            });
        }
        Ok(Self { points })
    }

    /// Parse a `color_ramp` list of `{value, color, alpha?}`.
    pub fn from_value(value: &Value) -> Result<Self, RampError> {
        let items = value.as_array().ok_or(RampError::NotAList)?;
        let mut points = Vec::with_capacity(items.len());
        for item in items {
            let invalid = |message: String| RampError::InvalidPoint {
                point: item.to_string(),
                message,
            };
            let value = item
                .get("value")
                .and_then(Value::as_f64)
                .ok_or_else(|| invalid("no numeric 'value'".to_string()))?;
            let color = item
                .get("color")
                .ok_or_else(|| invalid("no 'color'".to_string()))
                .and_then(|c| Rgba::from_value(c).map_err(invalid))?;
            let alpha = match item.get("alpha") {
                None => f64::from(color.a) / 255.0,
                Some(a) => a
                    .as_f64()
                    .filter(|a| (0.0..=1.0).contains(a))
                    .ok_or_else(|| invalid(format!("alpha {} is not in [0, 1]", a)))?,
            };
            points.push(RampPoint::new(value, color, alpha));
        }
        Self::new(points)
    }

    /// The default ramp stretched over `[min, max]`.
    pub fn from_range(min: f64, max: f64) -> Result<Self, RampError> {
        let span = check_range(min, max)?;
        let mut points = Vec::with_capacity(DEFAULT_RAMP.len() + 1);
        points.push(RampPoint::new(min - span * 1e-9, DEFAULT_RAMP[0].1, 0.0));
        for (v, color) in DEFAULT_RAMP {
            points.push(RampPoint::new(min + v * span, color, 1.0));
        }
        Self::new(points)
    }

    /// A named palette (`RdYlBu`, `Blues`, `viridis`, ...) stretched over `[min, max]`.
    ///
    /// Values outside the range clamp to the palette's end colours.
    pub fn from_palette(name: &str, min: f64, max: f64) -> Result<Self, RampError> {
        let (gradient, reversed) =
            palette(name).ok_or_else(|| RampError::UnknownPalette(name.to_string()))?;
        let span = check_range(min, max)?;
        let last = (PALETTE_SAMPLES - 1) as f64;
        let points = (0..PALETTE_SAMPLES)
            .map(|i| {
                let t = i as f64 / last;
                let c = gradient.eval_continuous(if reversed { 1.0 - t } else { t });
                RampPoint::new(min + t * span, Rgba::opaque(c.r, c.g, c.b), 1.0)
            })
            .collect();
        Self::new(points)
    }

    pub fn points(&self) -> &[RampPoint] {
        &self.points
    }

    pub fn min(&self) -> f64 {
        self.points[0].value
    }

    pub fn max(&self) -> f64 {
        self.points[self.points.len() - 1].value
    }

    /// Map a scalar to a colour. NaN maps to transparent.
    pub fn map(&self, value: f64) -> Rgba {
        if value.is_nan() {
            return Rgba::TRANSPARENT;
        }
        let first = &self.points[0];
        let last = &self.points[self.points.len() - 1];
        if value <= first.value {
            return first.rgba();
        }
        if let Some(exact) = self.points.iter().find(|p| p.value == value) {
            return exact.rgba();
        }
        if value >= last.value {
            return last.rgba();
        }

        // First point above value; it has a predecessor because value > first.
        let upper = self.points.partition_point(|p| p.value <= value);
        let (a, b) = (&self.points[upper - 1], &self.points[upper]);
        let t = (value - a.value) / (b.value - a.value);
        let lerp = |x: u8, y: u8| (f64::from(x) + (f64::from(y) - f64::from(x)) * t).round() as u8;
        Rgba::new(
            lerp(a.color.r, b.color.r),
            lerp(a.color.g, b.color.g),
            lerp(a.color.b, b.color.b),
            unit_to_byte(a.alpha + (b.alpha - a.alpha) * t),
        )
    }
}
