//! Tests for rendering compiled styles over band arrays.

use chrono::{DateTime, Utc};
use ows_common::StyleError;
use renderer::band_math::IndexRegistry;
use renderer::bands::BandIndex;
use renderer::flags::FlagDefinitions;
use renderer::raster::{BandSlice, RenderOutput};
use renderer::render;
use renderer::style::{ResolvedStyleDef, StyleContext};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use test_utils::{
    constant_band, flag_band, names, ndvi_bands, pattern_band, reference_config, wofs,
};

struct Layer {
    bands: BandIndex,
    flags: BTreeMap<String, FlagDefinitions>,
    registry: IndexRegistry,
    styles: Vec<Value>,
}

impl Layer {
    fn from_fixture(group: usize, index: usize) -> Self {
        let layer = reference_config()["layers"][group]["layers"][index].clone();
        let mut flags = BTreeMap::new();
        for f in layer["flags"].as_array().into_iter().flatten() {
            flags.insert(
                f["band"].as_str().unwrap().to_string(),
                FlagDefinitions::from_value(&f["flags_definition"]).unwrap(),
            );
        }
        Self {
            bands: BandIndex::from_value(&layer["bands"]).unwrap(),
            flags,
            registry: IndexRegistry::default(),
            styles: layer["styling"]["styles"].as_array().unwrap().clone(),
        }
    }

    fn ctx(&self) -> StyleContext<'_> {
        StyleContext {
            bands: &self.bands,
            flag_bands: &self.flags,
            registry: &self.registry,
        }
    }

    fn style(&self, name: &str) -> ResolvedStyleDef {
        let body = self
            .styles
            .iter()
            .find(|s| s["name"] == name)
            .and_then(Value::as_object)
            .unwrap();
        ResolvedStyleDef::compile(name, body, self.ctx()).unwrap()
    }

    fn style_json(&self, body: Value) -> ResolvedStyleDef {
        ResolvedStyleDef::compile("style:test", body.as_object().unwrap(), self.ctx()).unwrap()
    }
}

fn at(s: &str) -> DateTime<Utc> {
    s.parse().unwrap()
}

fn pixels(output: &RenderOutput) -> Vec<[u8; 4]> {
    output.image().unwrap().pixels().map(|p| p.0).collect()
}

fn ndvi_slice(time: &str, width: usize, height: usize, ndvi: f32) -> BandSlice {
    let (red, nir) = ndvi_bands(width, height, ndvi);
    BandSlice::new(at(time)).with_band("B04", red).with_band("B08", nir)
}

// ============================================================================
// Single-date styles
// ============================================================================

#[test]
fn test_linear_style_with_values_mask() {
    let layer = Layer::from_fixture(0, 0);
    let style = layer.style(names::SIMPLE_RGB);

    let slice = BandSlice::new(at("2020-06-07T00:00:00Z"))
        .with_band("B04", vec![0.0, 1500.0, 3000.0, 6000.0])
        .with_band("B03", constant_band(2, 2, 0.0))
        .with_band("B02", constant_band(2, 2, 3000.0))
        .with_band("SCL", vec![4.0, 4.0, 0.0, f32::NAN]);

    let out = render(&style, 2, 2, &[slice]).unwrap();
    assert_eq!(
        pixels(&out),
        vec![
            [0, 0, 255, 255],
            [128, 0, 255, 255],
            // SCL 0 is excluded by the inverted values mask.
            [255, 0, 255, 0],
            // No-data mask samples are always excluded.
            [255, 0, 255, 0],
        ]
    );
}

#[test]
fn test_linear_alpha_channel() {
    let layer = Layer::from_fixture(0, 0);
    let style = layer.style_json(json!({
        "name": "grey_fade",
        "components": {
            "red": {"red": 1.0},
            "green": {"red": 1.0},
            "blue": {"red": 1.0},
            "alpha": {"nir": 1.0, "scale_range": [0, 1000]},
        },
        "scale_range": [0, 3000],
    }));

    let slice = BandSlice::new(at("2020-06-07T00:00:00Z"))
        .with_band("B04", constant_band(2, 2, 1500.0))
        .with_band("B08", vec![0.0, 500.0, 2000.0, f32::NAN]);

    let out = render(&style, 2, 2, &[slice]).unwrap();
    assert_eq!(
        pixels(&out),
        vec![
            [128, 128, 128, 0],
            [128, 128, 128, 128],
            // Clipped to the alpha channel's own range.
            [128, 128, 128, 255],
            // No-data alpha input makes the whole pixel transparent.
            [0, 0, 0, 0],
        ]
    );
}

#[test]
fn test_ramp_index_style() {
    let layer = Layer::from_fixture(0, 0);
    let style = layer.style(names::NDVI);

    let slice = BandSlice::new(at("2020-06-07T00:00:00Z"))
        .with_band("B04", vec![500.0, 0.0, 0.0, 1500.0])
        .with_band("B08", vec![1500.0, 1000.0, 0.0, 500.0]);

    let out = render(&style, 4, 1, &[slice]).unwrap();
    assert_eq!(
        pixels(&out),
        vec![
            [0xFF, 0xFF, 0x0C, 255],
            [0x11, 0x4D, 0x04, 255],
            // 0 / 0 is no-data.
            [0, 0, 0, 0],
            // Below the ramp: first point, fully transparent.
            [0x8F, 0x3F, 0x20, 0],
        ]
    );
}

#[test]
fn test_hybrid_blend() {
    let layer = Layer::from_fixture(0, 0);
    let style = layer.style(names::RGB_NDVI);

    let slice = BandSlice::new(at("2020-06-07T00:00:00Z"))
        .with_band("B04", constant_band(2, 1, 0.0))
        .with_band("B03", constant_band(2, 1, 0.0))
        .with_band("B02", constant_band(2, 1, 0.0))
        .with_band("B08", vec![1000.0, 0.0]);

    let out = render(&style, 2, 1, &[slice]).unwrap();
    // 0.6 * black + 0.4 * maroon; the second pixel has no index value.
    assert_eq!(pixels(&out), vec![[51, 0, 0, 255], [0, 0, 0, 0]]);
}

#[test]
fn test_value_map_first_rule_wins() {
    let layer = Layer::from_fixture(1, 0);
    let style = layer.style(names::OBSERVATIONS);

    let mut water = flag_band(
        8,
        1,
        &[
            wofs::WET,
            wofs::WET | wofs::SEA,
            wofs::CLOUD,
            wofs::NODATA,
            wofs::HIGH_SLOPE,
            wofs::DRY,
            0,
            wofs::DRY | wofs::SEA,
        ],
    );
    water[6] = f32::NAN;
    let slice = BandSlice::new(at("2020-06-07T00:00:00Z")).with_band("water", water);

    let out = render(&style, 8, 1, &[slice]).unwrap();
    assert_eq!(
        pixels(&out),
        vec![
            [0x4F, 0x81, 0xBD, 255],
            [0, 0, 0, 0],
            [0xC2, 0xC1, 0xC0, 255],
            [0x70, 0x70, 0x70, 0],
            [0x77, 0x68, 0x57, 255],
            [0x96, 0x96, 0x6E, 255],
            [0, 0, 0, 0],
            [0, 0, 0, 0],
        ]
    );
}

#[test]
fn test_flag_masks_combine() {
    let layer = Layer::from_fixture(1, 1);
    let style = layer.style(names::SIMPLE_FC);

    let slice = BandSlice::new(at("2020-06-07T00:00:00Z"))
        .with_band("BS", constant_band(4, 1, 50.0))
        .with_band("PV", constant_band(4, 1, 50.0))
        .with_band("NPV", constant_band(4, 1, 50.0))
        .with_band(
            "water",
            flag_band(4, 1, &[wofs::DRY, wofs::WET, wofs::DRY | wofs::SEA, wofs::CLOUD]),
        );

    let out = render(&style, 4, 1, &[slice]).unwrap();
    let alpha: Vec<u8> = pixels(&out).iter().map(|p| p[3]).collect();
    assert_eq!(alpha, vec![255, 0, 0, 0]);
    assert_eq!(pixels(&out)[0], [128, 128, 128, 255]);
}

// ============================================================================
// Multi-date
// ============================================================================

fn delta_only(layer: &Layer) -> ResolvedStyleDef {
    layer.style_json(json!({
        "name": "delta_only",
        "index_expression": "(nir - red) / (nir + red)",
        "range": [0.0, 1.0],
        "multi_date": [{
            "allowed_count_range": [2, 2],
            "animate": false,
            "aggregator_function": "multi_date_delta"
        }]
    }))
}

#[test]
fn test_two_date_handler_accepts_two_rejects_three() {
    let layer = Layer::from_fixture(0, 0);
    let style = delta_only(&layer);

    let two = [
        ndvi_slice("2020-06-01T00:00:00Z", 2, 2, 0.0),
        ndvi_slice("2020-06-11T00:00:00Z", 2, 2, 0.5),
    ];
    assert!(render(&style, 2, 2, &two).is_ok());

    let three = [
        ndvi_slice("2020-06-01T00:00:00Z", 2, 2, 0.0),
        ndvi_slice("2020-06-11T00:00:00Z", 2, 2, 0.5),
        ndvi_slice("2020-06-21T00:00:00Z", 2, 2, 0.5),
    ];
    assert!(matches!(
        render(&style, 2, 2, &three),
        Err(StyleError::UnsupportedDateCount(3))
    ));
}

#[test]
fn test_single_date_style_rejects_multiple_dates() {
    let layer = Layer::from_fixture(0, 0);
    let style = layer.style(names::NDVI);
    let two = [
        ndvi_slice("2020-06-01T00:00:00Z", 1, 1, 0.0),
        ndvi_slice("2020-06-11T00:00:00Z", 1, 1, 0.5),
    ];
    assert!(matches!(
        render(&style, 1, 1, &two),
        Err(StyleError::UnsupportedDateCount(2))
    ));
    assert!(matches!(
        render(&style, 1, 1, &[]),
        Err(StyleError::UnsupportedDateCount(0))
    ));
}

#[test]
fn test_delta_keeps_user_order() {
    let layer = Layer::from_fixture(0, 0);
    let style = layer.style(names::NDVI_DELTA);

    // Later date first; the handler preserves caller order: 0.0 - 0.5.
    let slices = [
        ndvi_slice("2020-06-11T00:00:00Z", 1, 1, 0.5),
        ndvi_slice("2020-06-01T00:00:00Z", 1, 1, 0.0),
    ];
    let out = render(&style, 1, 1, &slices).unwrap();
    assert!(!out.is_animation());
    // RdYlBu over -1..1: -0.5 sits a quarter of the way along.
    let c = colorous::RED_YELLOW_BLUE.eval_continuous(0.25);
    assert_eq!(pixels(&out), vec![[c.r, c.g, c.b, 255]]);
}

#[test]
fn test_delta_sorts_chronologically_by_default() {
    let layer = Layer::from_fixture(0, 0);
    let style = delta_only(&layer);

    let slices = [
        ndvi_slice("2020-06-11T00:00:00Z", 1, 1, 0.5),
        ndvi_slice("2020-06-01T00:00:00Z", 1, 1, 0.0),
    ];
    let out = render(&style, 1, 1, &slices).unwrap();
    // 0.5 - 0.0 on the default 0..1 ramp.
    assert_eq!(pixels(&out), vec![[0, 255, 0, 255]]);
}

#[test]
fn test_animation_frames_sorted() {
    let layer = Layer::from_fixture(0, 0);
    let style = layer.style(names::NDVI_DELTA);

    let slices = [
        ndvi_slice("2020-06-21T00:00:00Z", 1, 1, 1.0),
        ndvi_slice("2020-06-01T00:00:00Z", 1, 1, 0.0),
        ndvi_slice("2020-06-11T00:00:00Z", 1, 1, 0.5),
    ];
    let out = render(&style, 1, 1, &slices).unwrap();
    let frames = out.frames();
    assert_eq!(frames.len(), 3);
    let times: Vec<_> = frames.iter().map(|f| f.time).collect();
    assert_eq!(
        times,
        vec![
            at("2020-06-01T00:00:00Z"),
            at("2020-06-11T00:00:00Z"),
            at("2020-06-21T00:00:00Z"),
        ]
    );
    // Frames use the style's own ramp: black at 0, white at 1.
    assert_eq!(frames[0].image.get_pixel(0, 0).0, [0, 0, 0, 255]);
    assert_eq!(frames[2].image.get_pixel(0, 0).0, [255, 255, 255, 255]);
}

#[test]
fn test_aggregated_mask_excludes_if_any_slice_masks() {
    let layer = Layer::from_fixture(0, 0);
    let style = layer.style_json(json!({
        "name": "mean_rgb",
        "components": {"red": {"red": 1.0}, "green": {"red": 1.0}, "blue": {"red": 1.0}},
        "scale_range": [0.0, 3000.0],
        "pq_masks": [{"band": "SCL", "flags": {"scene": "vegetation"}}],
        "multi_date": [{
            "allowed_count_range": [2, 2],
            "aggregator_function": {"function": "multi_date_mean"}
        }]
    }));

    let first = BandSlice::new(at("2020-06-01T00:00:00Z"))
        .with_band("B04", vec![1000.0, 1000.0])
        .with_band("SCL", vec![4.0, 4.0]);
    let second = BandSlice::new(at("2020-06-11T00:00:00Z"))
        .with_band("B04", vec![2000.0, 2000.0])
        .with_band("SCL", vec![4.0, 9.0]);

    let out = render(&style, 2, 1, &[first, second]).unwrap();
    assert_eq!(pixels(&out), vec![[128, 128, 128, 255], [128, 128, 128, 0]]);
}

// ============================================================================
// Request errors
// ============================================================================

#[test]
fn test_missing_and_misshapen_bands() {
    let layer = Layer::from_fixture(0, 0);
    let style = layer.style(names::NDVI);

    let missing =
        BandSlice::new(at("2020-06-07T00:00:00Z")).with_band("B04", constant_band(2, 2, 1.0));
    assert!(matches!(
        render(&style, 2, 2, &[missing]),
        Err(StyleError::MissingBand(ref b)) if b == "B08"
    ));

    let short = BandSlice::new(at("2020-06-07T00:00:00Z"))
        .with_band("B04", constant_band(2, 2, 1.0))
        .with_band("B08", pattern_band(3, 1, &[1.0]));
    assert!(matches!(
        render(&style, 2, 2, &[short]),
        Err(StyleError::ShapeMismatch { expected: 4, actual: 3, .. })
    ));
}
