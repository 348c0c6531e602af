//! Style evaluation over band arrays.
//!
//! Numeric styles are painted in parallel over fixed-size pixel chunks, each
//! chunk owning its scratch buffers. Categorical work (mask flags and value
//! maps) runs sequentially with results cached per distinct raw sample, since
//! mask bands rarely hold more than a few dozen distinct values.

use image::RgbaImage;
use ows_common::{Rgba, StyleError};
use rayon::prelude::*;
use std::collections::HashMap;
use tracing::debug;

use crate::band_math::IndexSpec;
use crate::flags::raw_sample;
use crate::ramp::ColorRamp;
use crate::raster::{BandSlice, Frame, RenderOutput};
use crate::style::{
    Aggregator, Hybrid, MaskSpec, MultiDateHandler, ResolvedStyleDef, StyleKind, ValueMap,
};

const CHUNK_PIXELS: usize = 4096;

#[derive(Default)]
struct Scratch {
    values: Vec<f64>,
    args: Vec<f64>,
    series: Vec<f64>,
}

/// Render a style over one or more time slices.
///
/// One slice renders directly. Several slices need a multi-date handler
/// accepting that count, and are either animated frame by frame or reduced
/// by the handler's aggregator.
pub fn render(
    style: &ResolvedStyleDef,
    width: u32,
    height: u32,
    slices: &[BandSlice],
) -> Result<RenderOutput, StyleError> {
    let count = slices.len();
    if count == 0 {
        return Err(StyleError::UnsupportedDateCount(0));
    }
    let pixels = width as usize * height as usize;
    let required = style.required_bands();
    for slice in slices {
        for band in &required {
            slice.band(band, pixels)?;
        }
    }

    debug!(
        style = %style.name,
        kind = style.kind.name(),
        slices = count,
        pixels,
        "Rendering style"
    );

    if count == 1 {
        return render_single(style, width, height, &slices[0]).map(RenderOutput::Image);
    }

    let handler = style
        .handler_for(count)
        .ok_or(StyleError::UnsupportedDateCount(count))?;
    let mut ordered: Vec<&BandSlice> = slices.iter().collect();
    if !handler.preserve_user_date_order {
        ordered.sort_by_key(|s| s.time);
    }

    if handler.animate {
        let frames = ordered
            .iter()
            .map(|slice| {
                Ok(Frame {
                    time: slice.time,
                    image: render_single(style, width, height, slice)?,
                })
            })
            .collect::<Result<Vec<_>, StyleError>>()?;
        return Ok(RenderOutput::Animation(frames));
    }

    let aggregator = handler
        .aggregator
        .ok_or(StyleError::UnsupportedDateCount(count))?;
    render_aggregated(style, handler, aggregator, width, height, &ordered).map(RenderOutput::Image)
}

fn render_single(
    style: &ResolvedStyleDef,
    width: u32,
    height: u32,
    slice: &BandSlice,
) -> Result<RgbaImage, StyleError> {
    let pixels = width as usize * height as usize;
    let mut img = match &style.kind {
        StyleKind::ValueMap(vm) => paint_value_map(vm, width, height, slice)?,
        kind => {
            let arrays = needed_arrays(style, slice, pixels)?;
            paint(width, height, |i, s| {
                gather(&mut s.values, &arrays, i);
                single_color(kind, &s.values, &mut s.args)
            })
        }
    };
    let keep = keep_mask(&style.pq_masks, &[slice], pixels)?;
    apply_mask(&mut img, keep.as_deref());
    Ok(img)
}

fn render_aggregated(
    style: &ResolvedStyleDef,
    handler: &MultiDateHandler,
    aggregator: Aggregator,
    width: u32,
    height: u32,
    slices: &[&BandSlice],
) -> Result<RgbaImage, StyleError> {
    let pixels = width as usize * height as usize;
    let arrays = slices
        .iter()
        .map(|slice| needed_arrays(style, slice, pixels))
        .collect::<Result<Vec<_>, _>>()?;

    let mut img = match &style.kind {
        StyleKind::Linear(lc) => paint(width, height, |i, s| {
            aggregate_bands(&arrays, aggregator, i, s);
            lc.color(&s.values)
        }),
        StyleKind::RampIndex(ri) => {
            let ramp = handler.ramp.as_ref().unwrap_or(&ri.ramp);
            paint(width, height, |i, s| {
                ramp.map(aggregate_index(&ri.index, &arrays, aggregator, i, s))
            })
        }
        StyleKind::Hybrid(h) => {
            let ramp = handler.ramp.as_ref().unwrap_or(&h.index.ramp);
            paint(width, height, |i, s| {
                let index = aggregate_index(&h.index.index, &arrays, aggregator, i, s);
                aggregate_bands(&arrays, aggregator, i, s);
                hybrid_color(h, &s.values, index, ramp)
            })
        }
        StyleKind::ValueMap(_) => return Err(StyleError::UnsupportedDateCount(slices.len())),
    };
    let keep = keep_mask(&style.pq_masks, slices, pixels)?;
    apply_mask(&mut img, keep.as_deref());
    Ok(img)
}

fn needed_arrays<'a>(
    style: &ResolvedStyleDef,
    slice: &'a BandSlice,
    pixels: usize,
) -> Result<Vec<&'a [f32]>, StyleError> {
    style
        .needed_bands
        .iter()
        .map(|band| slice.band(band, pixels))
        .collect()
}

fn gather(values: &mut Vec<f64>, arrays: &[&[f32]], i: usize) {
    values.clear();
    values.extend(arrays.iter().map(|a| f64::from(a[i])));
}

fn single_color(kind: &StyleKind, values: &[f64], args: &mut Vec<f64>) -> Rgba {
    match kind {
        StyleKind::Linear(lc) => lc.color(values),
        StyleKind::RampIndex(ri) => ri.ramp.map(ri.index.evaluate(values, args)),
        StyleKind::Hybrid(h) => {
            let index = h.index.index.evaluate(values, args);
            hybrid_color(h, values, index, &h.index.ramp)
        }
        StyleKind::ValueMap(_) => Rgba::TRANSPARENT,
    }
}

fn hybrid_color(h: &Hybrid, values: &[f64], index: f64, ramp: &ColorRamp) -> Rgba {
    if index.is_nan() {
        return Rgba::TRANSPARENT;
    }
    match h.components.try_color(values) {
        Some(linear) => h.blend(linear, ramp.map(index)),
        None => Rgba::TRANSPARENT,
    }
}

/// Evaluate the index on every slice and reduce; leaves band values in `s.values`.
fn aggregate_index(
    index: &IndexSpec,
    arrays: &[Vec<&[f32]>],
    aggregator: Aggregator,
    i: usize,
    s: &mut Scratch,
) -> f64 {
    s.series.clear();
    for slice in arrays {
        gather(&mut s.values, slice, i);
        s.series.push(index.evaluate(&s.values, &mut s.args));
    }
    aggregator.apply(&s.series)
}

/// Reduce each needed band across slices into `s.values`.
fn aggregate_bands(arrays: &[Vec<&[f32]>], aggregator: Aggregator, i: usize, s: &mut Scratch) {
    let slots = arrays.first().map_or(0, Vec::len);
    s.values.clear();
    for slot in 0..slots {
        s.series.clear();
        s.series
            .extend(arrays.iter().map(|slice| f64::from(slice[slot][i])));
        s.values.push(aggregator.apply(&s.series));
    }
}

fn paint<F>(width: u32, height: u32, pixel: F) -> RgbaImage
where
    F: Fn(usize, &mut Scratch) -> Rgba + Sync,
{
    let mut img = RgbaImage::new(width, height);
    let buf: &mut [u8] = &mut img;
    buf.par_chunks_mut(CHUNK_PIXELS * 4)
        .enumerate()
        .for_each(|(chunk, out)| {
            let mut scratch = Scratch::default();
            let base = chunk * CHUNK_PIXELS;
            for (offset, px) in out.chunks_exact_mut(4).enumerate() {
                px.copy_from_slice(&pixel(base + offset, &mut scratch).to_array());
            }
        });
    img
}

fn paint_value_map(
    vm: &ValueMap,
    width: u32,
    height: u32,
    slice: &BandSlice,
) -> Result<RgbaImage, StyleError> {
    let pixels = width as usize * height as usize;
    let mut img = RgbaImage::new(width, height);
    for band in &vm.bands {
        let data = slice.band(&band.band, pixels)?;
        let mut cache: HashMap<u32, Option<usize>> = HashMap::new();
        for (px, &sample) in img.pixels_mut().zip(data) {
            let Some(raw) = raw_sample(sample) else {
                continue;
            };
            let rule = match cache.get(&raw) {
                Some(rule) => *rule,
                None => {
                    let rule = band.first_match(raw)?;
                    cache.insert(raw, rule);
                    rule
                }
            };
            if let Some(idx) = rule {
                px.0 = band.rules[idx].color.to_array();
            }
        }
    }
    Ok(img)
}

/// Per-pixel keep decision across all mask entries and slices.
fn keep_mask(
    masks: &[MaskSpec],
    slices: &[&BandSlice],
    pixels: usize,
) -> Result<Option<Vec<bool>>, StyleError> {
    if masks.is_empty() {
        return Ok(None);
    }
    let mut keep = vec![true; pixels];
    for mask in masks {
        let mut cache: HashMap<u32, bool> = HashMap::new();
        for slice in slices {
            let data = slice.band(&mask.band, pixels)?;
            for (k, &sample) in keep.iter_mut().zip(data) {
                if !*k {
                    continue;
                }
                *k = match raw_sample(sample) {
                    None => false,
                    Some(raw) => match cache.get(&raw) {
                        Some(kept) => *kept,
                        None => {
                            let kept = mask.keeps(Some(raw))?;
                            cache.insert(raw, kept);
                            kept
                        }
                    },
                };
            }
        }
    }
    Ok(Some(keep))
}

fn apply_mask(img: &mut RgbaImage, keep: Option<&[bool]>) {
    let Some(keep) = keep else {
        return;
    };
    for (px, &kept) in img.pixels_mut().zip(keep) {
        if !kept {
            px.0[3] = 0;
        }
    }
}
