//! Benchmarks for style evaluation.
//!
//! Run with: cargo bench --package renderer --bench render_benchmarks

use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use renderer::band_math::IndexRegistry;
use renderer::bands::BandIndex;
use renderer::flags::FlagDefinitions;
use renderer::raster::BandSlice;
use renderer::style::{ResolvedStyleDef, StyleContext};
use renderer::render;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use test_utils::{flag_band, ramp_band, reference_config, wofs};

const SIZES: [u32; 3] = [256, 512, 1024];

/// Compile a named style from a layer of the reference configuration.
fn compile(group: usize, index: usize, name: &str) -> ResolvedStyleDef {
    let layer = reference_config()["layers"][group]["layers"][index].clone();
    let bands = BandIndex::from_value(&layer["bands"]).unwrap();
    let mut flags = BTreeMap::new();
    for f in layer["flags"].as_array().into_iter().flatten() {
        flags.insert(
            f["band"].as_str().unwrap().to_string(),
            FlagDefinitions::from_value(&f["flags_definition"]).unwrap(),
        );
    }
    let registry = IndexRegistry::default();
    let ctx = StyleContext {
        bands: &bands,
        flag_bands: &flags,
        registry: &registry,
    };
    let body = layer["styling"]["styles"]
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["name"] == name)
        .and_then(Value::as_object)
        .unwrap()
        .clone();
    ResolvedStyleDef::compile(name, &body, ctx).unwrap()
}

fn s2_slice(size: u32, day: u32) -> BandSlice {
    let n = (size * size) as usize;
    let s = size as usize;
    BandSlice::new(Utc.with_ymd_and_hms(2020, 6, day, 0, 0, 0).unwrap())
        .with_band("B02", ramp_band(s, s, 0.0, 3000.0))
        .with_band("B03", ramp_band(s, s, 500.0, 2500.0))
        .with_band("B04", ramp_band(s, s, 3000.0, 0.0))
        .with_band("B08", ramp_band(s, s, 100.0, 4000.0))
        .with_band("SCL", vec![4.0; n])
}

// =============================================================================
// SINGLE-DATE STYLES
// =============================================================================

fn bench_single_date(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_date");
    let styles = [
        ("linear", compile(0, 0, "simple_rgb")),
        ("function", compile(0, 0, "ndvi")),
        ("expression", compile(0, 0, "ndvi_expr")),
        ("hybrid", compile(0, 0, "rgb_ndvi")),
    ];

    for size in SIZES {
        let slice = [s2_slice(size, 1)];
        group.throughput(Throughput::Elements(u64::from(size * size)));
        for (label, style) in &styles {
            group.bench_with_input(BenchmarkId::new(*label, size), &size, |b, &size| {
                b.iter(|| render(black_box(style), size, size, black_box(&slice)).unwrap());
            });
        }
    }

    group.finish();
}

// =============================================================================
// FLAG STYLES
// =============================================================================

fn bench_value_map(c: &mut Criterion) {
    let mut group = c.benchmark_group("value_map");
    let style = compile(1, 0, "observations");
    let values = [
        wofs::DRY,
        wofs::WET,
        wofs::WET | wofs::SEA,
        wofs::CLOUD,
        wofs::HIGH_SLOPE,
        wofs::NODATA,
    ];

    for size in SIZES {
        let s = size as usize;
        let slice = [BandSlice::new(Utc.with_ymd_and_hms(2020, 6, 1, 0, 0, 0).unwrap())
            .with_band("water", flag_band(s, s, &values))];
        group.throughput(Throughput::Elements(u64::from(size * size)));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| render(black_box(&style), size, size, black_box(&slice)).unwrap());
        });
    }

    group.finish();
}

// =============================================================================
// MULTI-DATE
// =============================================================================

fn bench_multi_date(c: &mut Criterion) {
    let mut group = c.benchmark_group("multi_date");
    let style = compile(0, 0, "ndvi_delta");

    for size in SIZES {
        let delta = [s2_slice(size, 1), s2_slice(size, 11)];
        let animation = [s2_slice(size, 1), s2_slice(size, 11), s2_slice(size, 21)];
        group.throughput(Throughput::Elements(u64::from(size * size)));
        group.bench_with_input(BenchmarkId::new("delta", size), &size, |b, &size| {
            b.iter(|| render(black_box(&style), size, size, black_box(&delta)).unwrap());
        });
        group.bench_with_input(BenchmarkId::new("animate_3", size), &size, |b, &size| {
            b.iter(|| render(black_box(&style), size, size, black_box(&animation)).unwrap());
        });
    }

    group.finish();
}

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");
    let bands = BandIndex::from_value(&json!({"B04": ["red"], "B08": ["nir"]})).unwrap();
    let flags = BTreeMap::new();
    let registry = IndexRegistry::default();
    let ctx = StyleContext {
        bands: &bands,
        flag_bands: &flags,
        registry: &registry,
    };
    let body = json!({
        "name": "ndvi",
        "index_expression": "(nir - red) / (nir + red)",
        "range": [0.0, 1.0]
    });
    let body = body.as_object().unwrap();

    group.bench_function("index_expression", |b| {
        b.iter(|| ResolvedStyleDef::compile("ndvi", black_box(body), ctx).unwrap());
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_single_date,
    bench_value_map,
    bench_multi_date,
    bench_compile,
);
criterion_main!(benches);
