//! RGBA colour values and their configuration representations.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// An 8-bit RGBA colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const TRANSPARENT: Rgba = Rgba::new(0, 0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Parse "#RRGGBB" or "#RRGGBBAA" (leading '#' optional).
    pub fn from_hex(s: &str) -> Option<Self> {
        let s = s.trim().trim_start_matches('#');
        if !s.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&s[i..i + 2], 16).ok();
        match s.len() {
            6 => Some(Self::opaque(channel(0)?, channel(2)?, channel(4)?)),
            8 => Some(Self::new(channel(0)?, channel(2)?, channel(4)?, channel(6)?)),
            _ => None,
        }
    }

    /// Parse a small set of CSS colour names.
    pub fn from_name(name: &str) -> Option<Self> {
        let rgba = match name.to_lowercase().as_str() {
            "transparent" => Self::TRANSPARENT,
            "black" => Self::opaque(0, 0, 0),
            "white" => Self::opaque(255, 255, 255),
            "red" => Self::opaque(255, 0, 0),
            "green" => Self::opaque(0, 128, 0),
            "blue" => Self::opaque(0, 0, 255),
            "yellow" => Self::opaque(255, 255, 0),
            "cyan" => Self::opaque(0, 255, 255),
            "magenta" => Self::opaque(255, 0, 255),
            "orange" => Self::opaque(255, 165, 0),
            "purple" => Self::opaque(128, 0, 128),
            "gray" | "grey" => Self::opaque(128, 128, 128),
            _ => return None,
        };
        Some(rgba)
    }

    /// Parse a colour from a configuration value.
    ///
    /// Accepts hex strings, colour names, and `[r, g, b]` / `[r, g, b, a]` arrays.
    pub fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::String(s) => Self::from_hex(s)
                .or_else(|| Self::from_name(s))
                .ok_or_else(|| format!("unrecognised colour '{}'", s)),
            Value::Array(items) => {
                if items.len() != 3 && items.len() != 4 {
                    return Err(format!(
                        "colour arrays need 3 or 4 channels, got {}",
                        items.len()
                    ));
                }
                let mut channels = [0u8, 0, 0, 255];
                for (slot, item) in channels.iter_mut().zip(items) {
                    *slot = item
                        .as_u64()
                        .and_then(|c| u8::try_from(c).ok())
                        .ok_or_else(|| format!("colour channel {} is not in 0..=255", item))?;
                }
                Ok(Self::new(channels[0], channels[1], channels[2], channels[3]))
            }
            other => Err(format!("unrecognised colour {}", other)),
        }
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}{:02X}", self.r, self.g, self.b, self.a)
    }
}

/// Scale a unit-interval value to a byte, rounding to nearest.
pub fn unit_to_byte(v: f64) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}
