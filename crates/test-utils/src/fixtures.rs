//! Common test fixtures for ows-engine tests.
//!
//! The reference configuration mirrors a small production deployment: a
//! Sentinel-2 layer with every style kind, an inheriting clone, a water
//! observation layer styled by bit flags and a fractional cover layer masked
//! by the same flags.

use serde_json::{json, Value};

/// Geoboxes as (min_x, min_y, max_x, max_y) in EPSG:4326.
pub mod bbox {
    /// Centred on 150E: solar offset UTC+10.
    pub const CANBERRA: (f64, f64, f64, f64) = (149.5, -35.5, 150.5, -34.5);

    /// Centred on 75W: solar offset UTC-5.
    pub const WASHINGTON: (f64, f64, f64, f64) = (-75.5, 38.5, -74.5, 39.5);

    /// Centred on the prime meridian.
    pub const GREENWICH: (f64, f64, f64, f64) = (-0.5, 51.0, 0.5, 52.0);
}

/// Reference instants.
pub mod time {
    /// Evening UTC, next morning in eastern Australia.
    pub const REFERENCE_TIME: &str = "2020-06-07T20:20:00Z";

    pub const FIRST_OF_MONTH: &str = "2020-06-01T00:00:00Z";
}

/// Layer and style names in the reference configuration.
pub mod names {
    pub const S2: &str = "s2_l2a";
    pub const S2_CLONE: &str = "s2_l2a_clone";
    pub const WOFS: &str = "wofs_albers";
    pub const FC: &str = "ls8_fc_albers";

    pub const SIMPLE_RGB: &str = "simple_rgb";
    pub const SIMPLE_RGB_CLONE: &str = "simple_rgb_clone";
    pub const INFRA_RED: &str = "infra_red";
    pub const NDVI: &str = "ndvi";
    pub const NDVI_EXPR: &str = "ndvi_expr";
    pub const RGB_NDVI: &str = "rgb_ndvi";
    pub const NDVI_DELTA: &str = "ndvi_delta";
    pub const OBSERVATIONS: &str = "observations";
    pub const WET: &str = "wet";
    pub const SIMPLE_FC: &str = "simple_fc";
}

/// Water observation bit flags.
pub mod wofs {
    pub const NODATA: u32 = 1;
    pub const NONCONTIGUOUS: u32 = 1 << 1;
    pub const SEA: u32 = 1 << 2;
    pub const TERRAIN_SHADOW: u32 = 1 << 3;
    pub const HIGH_SLOPE: u32 = 1 << 4;
    pub const CLOUD_SHADOW: u32 = 1 << 5;
    pub const CLOUD: u32 = 1 << 6;
    pub const WET: u32 = 1 << 7;
    pub const DRY: u32 = 0;
}

/// Flag definitions for the water observation band.
pub fn wofs_flags_definition() -> Value {
    let single = |bit: u32| json!({"bits": bit, "values": {"0": false, "1": true}});
    json!({
        "nodata": single(0),
        "noncontiguous": single(1),
        "sea": single(2),
        "terrain_or_low_angle": single(3),
        "high_slope": single(4),
        "cloud_shadow": single(5),
        "cloud": single(6),
        "wet": {"bits": [7, 6, 5, 4, 3, 1, 0], "values": {"128": true}},
        "dry": {"bits": [7, 6, 5, 4, 3, 1, 0], "values": {"0": true}},
    })
}

/// Scene classification of the Sentinel-2 mask band, as an enum flag.
pub fn scl_flags_definition() -> Value {
    json!({
        "scene": {
            "bits": [0, 1, 2, 3],
            "values": {
                "0": "no_data",
                "4": "vegetation",
                "5": "bare_soil",
                "6": "water",
                "8": "cloud_medium",
                "9": "cloud_high",
            }
        }
    })
}

/// Cache rules of the `continental` resource limits.
pub fn dataset_cache_rules() -> Value {
    json!([
        {"min_datasets": 5, "max_age": 86400},
        {"min_datasets": 9, "max_age": 604800},
        {"min_datasets": 17, "max_age": 2592000},
        {"min_datasets": 65, "max_age": 10368000},
    ])
}

fn s2_styles() -> Value {
    json!([
        {
            "name": "simple_rgb",
            "title": "Simple RGB",
            "abstract": "Simple true-colour image, using the red, green and blue bands",
            "components": {
                "red": {"red": 1.0},
                "green": {"green": 1.0},
                "blue": {"blue": 1.0}
            },
            "scale_range": [0.0, 3000.0],
            "pq_masks": [
                {"band": "SCL", "invert": true, "values": [0]}
            ],
            "legend": {"show_legend": true}
        },
        {
            "inherits": {"layer": "s2_l2a", "style": "simple_rgb"},
            "name": "simple_rgb_clone",
            "title": "Simple RGB Clone",
            "scale_range": [0.0, 1500.0]
        },
        {
            "name": "infra_red",
            "title": "False colour multi-band infra-red",
            "components": {
                "red": {"swir_1": 1.0, "scale_range": [5.0, 4000.0]},
                "green": {"nir": 1.0, "scale_range": [25.0, 4000.0]},
                "blue": {"green": 1.0, "scale_range": [0.0, 3000.0]}
            }
        },
        {
            "name": "ndvi",
            "title": "NDVI",
            "index_function": {
                "function": "datacube_ows.band_utils.norm_diff",
                "mapped_bands": true,
                "kwargs": {"band1": "nir", "band2": "red"}
            },
            "needed_bands": ["red", "nir"],
            "color_ramp": [
                {"value": -0.0, "color": "#8F3F20", "alpha": 0.0},
                {"value": 0.0, "color": "#8F3F20", "alpha": 1.0},
                {"value": 0.5, "color": "#FFFF0C"},
                {"value": 1.0, "color": "#114D04"}
            ]
        },
        {
            "name": "ndvi_expr",
            "title": "NDVI expression",
            "index_expression": "(nir-red)/(nir+red)",
            "range": [0.0, 1.0]
        },
        {
            "name": "rgb_ndvi",
            "title": "NDVI plus RGB",
            "component_ratio": 0.6,
            "index_function": {
                "function": "norm_diff",
                "kwargs": {"band1": "nir", "band2": "red"}
            },
            "needed_bands": ["red", "green", "blue", "nir"],
            "range": [0.0, 1.0],
            "components": {
                "red": {"red": 1.0},
                "green": {"green": 1.0},
                "blue": {"blue": 1.0}
            },
            "scale_range": [0.0, 65535.0]
        },
        {
            "name": "ndvi_delta",
            "title": "NDVI delta",
            "index_function": {
                "function": "norm_diff",
                "kwargs": {"band1": "nir", "band2": "red"}
            },
            "needed_bands": ["red", "nir"],
            "color_ramp": [
                {"value": 0.0, "color": "#000000"},
                {"value": 1.0, "color": "#FFFFFF"}
            ],
            "multi_date": [
                {
                    "allowed_count_range": [2, 2],
                    "animate": false,
                    "preserve_user_date_order": true,
                    "aggregator_function": {"function": "datacube_ows.band_utils.multi_date_delta"},
                    "mpl_ramp": "RdYlBu",
                    "range": [-1.0, 1.0],
                    "legend": {"begin": "-1.0", "end": "1.0"}
                },
                {"allowed_count_range": [3, 4], "animate": true}
            ]
        }
    ])
}

fn wofs_styles() -> Value {
    json!([
        {
            "name": "observations",
            "title": "Observations",
            "value_map": {
                "water": [
                    {"title": "No data", "flags": {"nodata": true}, "color": "#707070", "alpha": 0.0},
                    {"title": "Cloud", "flags": {"cloud": true}, "color": "#C2C1C0"},
                    {"title": "Steep", "flags": {"and": {"high_slope": true, "cloud": false}}, "color": "#776857"},
                    {"title": "Wet", "flags": {"and": {"wet": true, "sea": false}}, "color": "#4F81BD"},
                    {"title": "Dry", "flags": {"and": {"dry": true, "sea": false}}, "color": "#96966E"}
                ]
            }
        },
        {
            "name": "wet",
            "title": "Wet Only",
            "value_map": {
                "water": [
                    {
                        "title": "Invalid",
                        "flags": {"or": {"cloud_shadow": true, "cloud": true, "high_slope": true}},
                        "color": "#707070",
                        "alpha": 0.0
                    },
                    {"title": "Wet", "flags": {"or": {"wet": true, "sea": true}}, "color": "#4F81BD"}
                ]
            },
            "multi_date": [
                {"allowed_count_range": [2, 3], "animate": true}
            ]
        }
    ])
}

/// The reference configuration document.
pub fn reference_config() -> Value {
    json!({
        "global": {
            "title": "Open web-services for the Open Data Cube",
            "services": {"wms": true, "wmts": true, "wcs": true}
        },
        "wms": {"max_width": 512, "max_height": 512},
        "wcs": {"default_desc_cache_maxage": 300},
        "resource_limits": {
            "standard": {
                "wms": {
                    "zoomed_out_fill_colour": [150, 180, 200, 160],
                    "min_zoom_factor": 35.0,
                    "max_datasets": 16
                },
                "wcs": {}
            },
            "continental": {
                "wms": {
                    "min_zoom_factor": 10.0,
                    "dataset_cache_rules": dataset_cache_rules()
                },
                "wcs": {"max_datasets": 32}
            },
            "wofs_obs": {
                "inherits": "standard",
                "wcs": {"describe_cache_maxage": 0}
            }
        },
        "layers": [
            {
                "title": "s2",
                "abstract": "Images from the sentinel 2 satellite",
                "layers": [
                    {
                        "name": "s2_l2a",
                        "title": "Surface reflectance (Sentinel-2)",
                        "abstract": "layer s2_l2a",
                        "product_name": "s2_l2a",
                        "bands": {
                            "B02": ["blue"],
                            "B03": ["green"],
                            "B04": ["red"],
                            "B08": ["nir"],
                            "B11": ["swir_1"],
                            "SCL": ["mask"]
                        },
                        "flags": [
                            {"band": "SCL", "flags_definition": scl_flags_definition()}
                        ],
                        "time_resolution": "raw",
                        "resource_limits": "continental",
                        "image_processing": {"apply_solar_corrections": false},
                        "styling": {
                            "default_style": "simple_rgb",
                            "styles": s2_styles()
                        }
                    },
                    {
                        "inherits": {"layer": "s2_l2a"},
                        "name": "s2_l2a_clone",
                        "title": "s2_l2a Clone",
                        "abstract": "Imagery from the s2_l2a Clone",
                        "image_processing": {"apply_solar_corrections": true},
                        "resource_limits": {
                            "inherits": "continental",
                            "wcs": {"max_image_size": 24000000}
                        }
                    }
                ]
            },
            {
                "title": "Water and cover",
                "layers": [
                    {
                        "name": "wofs_albers",
                        "title": "Water Observations from Space",
                        "bands": {"water": []},
                        "flags": [
                            {"band": "water", "flags_definition": wofs_flags_definition()}
                        ],
                        "time_resolution": "day",
                        "resource_limits": "wofs_obs",
                        "styling": {
                            "default_style": "observations",
                            "styles": wofs_styles()
                        }
                    },
                    {
                        "name": "ls8_fc_albers",
                        "title": "Fractional Cover (Landsat 8)",
                        "bands": {
                            "BS": ["bare_soil"],
                            "PV": ["photosynthetic_vegetation", "green_veg"],
                            "NPV": ["non_photosynthetic_vegetation", "brown_veg"]
                        },
                        "flags": [
                            {"band": "water", "flags_definition": wofs_flags_definition()}
                        ],
                        "time_resolution": "month",
                        "resource_limits": "standard",
                        "styling": {
                            "styles": [
                                {
                                    "name": "simple_fc",
                                    "title": "Fractional Cover",
                                    "components": {
                                        "red": {"BS": 1.0},
                                        "green": {"PV": 1.0},
                                        "blue": {"NPV": 1.0}
                                    },
                                    "scale_range": [0.0, 100.0],
                                    "pq_masks": [
                                        {"band": "water", "flags": {"dry": true}},
                                        {
                                            "band": "water",
                                            "flags": {
                                                "terrain_or_low_angle": false,
                                                "high_slope": false,
                                                "cloud_shadow": false,
                                                "cloud": false,
                                                "sea": false
                                            }
                                        }
                                    ]
                                }
                            ]
                        }
                    }
                ]
            }
        ]
    })
}

/// A small YAML document exercising environment substitution.
pub const REFERENCE_CONFIG_YAML: &str = r#"
global:
  title: ${OWS_TEST_TITLE:-YAML test service}
wcs:
  default_desc_cache_maxage: 600
resource_limits:
  basic:
    wms:
      min_zoom_factor: 20.0
      dataset_cache_rules:
        - min_datasets: 5
          max_age: 86400
        - min_datasets: 9
          max_age: 604800
layers:
  - name: yaml_layer
    title: YAML layer
    bands:
      B04: [red]
      B08: [nir]
    time_resolution: year
    resource_limits: basic
    styling:
      styles:
        - name: red_only
          components:
            red: {red: 1.0}
            green: {red: 1.0}
            blue: {red: 1.0}
          scale_range: [0, 3000]
        - name: ndvi
          index_expression: (nir - red) / (nir + red)
          range: [0, 1]
"#;
