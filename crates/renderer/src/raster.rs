//! Band arrays in, RGBA images out.

use chrono::{DateTime, Utc};
use image::RgbaImage;
use ows_common::{Rgba, StyleError};
use std::collections::HashMap;

/// Already-fetched band data for one time slice, keyed by native band name.
///
/// Arrays are row-major with `width * height` samples; NaN is no-data.
#[derive(Debug, Clone, PartialEq)]
pub struct BandSlice {
    pub time: DateTime<Utc>,
    pub bands: HashMap<String, Vec<f32>>,
}

impl BandSlice {
    pub fn new(time: DateTime<Utc>) -> Self {
        Self {
            time,
            bands: HashMap::new(),
        }
    }

    pub fn with_band(mut self, name: impl Into<String>, data: Vec<f32>) -> Self {
        self.bands.insert(name.into(), data);
        self
    }

    /// Band samples, checked against the expected pixel count.
    pub fn band(&self, name: &str, pixels: usize) -> Result<&[f32], StyleError> {
        let data = self
            .bands
            .get(name)
            .ok_or_else(|| StyleError::MissingBand(name.to_string()))?;
        if data.len() != pixels {
            return Err(StyleError::ShapeMismatch {
                band: name.to_string(),
                expected: pixels,
                actual: data.len(),
            });
        }
        Ok(data)
    }
}

/// One image of an animated multi-date render.
#[derive(Debug, Clone)]
pub struct Frame {
    pub time: DateTime<Utc>,
    pub image: RgbaImage,
}

#[derive(Debug, Clone)]
pub enum RenderOutput {
    Image(RgbaImage),
    Animation(Vec<Frame>),
}

impl RenderOutput {
    /// The single image, if this is not an animation.
    pub fn image(&self) -> Option<&RgbaImage> {
        match self {
            RenderOutput::Image(img) => Some(img),
            RenderOutput::Animation(_) => None,
        }
    }

    pub fn frames(&self) -> &[Frame] {
        match self {
            RenderOutput::Image(_) => &[],
            RenderOutput::Animation(frames) => frames,
        }
    }

    pub fn is_animation(&self) -> bool {
        matches!(self, RenderOutput::Animation(_))
    }
}

/// A flat fill, used when a request is zoomed out past the layer's limit.
pub fn fill_image(width: u32, height: u32, colour: Rgba) -> RgbaImage {
    RgbaImage::from_pixel(width, height, image::Rgba(colour.to_array()))
}
