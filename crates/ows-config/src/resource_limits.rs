//! Resource limits and the cache / fallback policy derived from them.

use ows_common::{ConfigError, ConfigResult, Rgba};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Fill used when a request is zoomed out too far and none is configured.
pub const DEFAULT_ZOOMED_OUT_FILL: Rgba = Rgba::new(150, 180, 200, 160);

/// Max-age when no dataset cache rule applies: do not cache.
pub const NO_CACHE: u64 = 0;

/// Services that carry their own limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    Wms,
    Wcs,
}

impl Service {
    pub fn as_str(&self) -> &'static str {
        match self {
            Service::Wms => "wms",
            Service::Wcs => "wcs",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Service {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            // WMTS tiles are served under the WMS limits.
            "wms" | "wmts" => Ok(Service::Wms),
            "wcs" => Ok(Service::Wcs),
            other => Err(format!("unknown service '{}'", other)),
        }
    }
}

/// One tier of the dataset-count cache policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRule {
    pub min_datasets: usize,
    pub max_age: u64,
}

/// What a caller should do with a request, given its limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitDecision {
    /// Render real data; cache the response for `max_age` seconds.
    Render { max_age: u64 },
    /// Zoomed out past the limit: paint this colour instead of loading data.
    ZoomedOutFill(Rgba),
    /// More datasets than the service allows.
    TooManyDatasets,
}

/// Limits for a single service.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceLimits {
    pub max_datasets: Option<usize>,
    pub min_zoom_factor: Option<f64>,
    pub zoomed_out_fill_colour: Rgba,
    /// Strictly increasing by `min_datasets`.
    pub dataset_cache_rules: Vec<CacheRule>,
    pub max_image_size: Option<u64>,
    pub describe_cache_maxage: u64,
}

impl ServiceLimits {
    /// Defaults for a service with no configured limits.
    pub fn unlimited(describe_cache_maxage: u64) -> Self {
        Self {
            max_datasets: None,
            min_zoom_factor: None,
            zoomed_out_fill_colour: DEFAULT_ZOOMED_OUT_FILL,
            dataset_cache_rules: Vec::new(),
            max_image_size: None,
            describe_cache_maxage,
        }
    }

    /// Parse one service section. `node` names the owning config node in errors.
    pub fn from_value(
        node: &str,
        value: Option<&Value>,
        default_describe_maxage: u64,
    ) -> ConfigResult<Self> {
        let mut limits = Self::unlimited(default_describe_maxage);
        let obj = match value {
            None | Some(Value::Null) => return Ok(limits),
            Some(Value::Object(obj)) => obj,
            Some(_) => return Err(ConfigError::invalid(node, "resource_limits", "expected a mapping")),
        };

        // Zero means no ceiling.
        limits.max_datasets = optional_uint(node, obj, "max_datasets")?
            .filter(|&n| n > 0)
            .map(|n| n as usize);
        limits.max_image_size = optional_uint(node, obj, "max_image_size")?.filter(|&n| n > 0);
        if let Some(age) = optional_uint(node, obj, "describe_cache_maxage")? {
            limits.describe_cache_maxage = age;
        }
        if let Some(v) = obj.get("min_zoom_factor").filter(|v| !v.is_null()) {
            let zoom = v
                .as_f64()
                .filter(|z| z.is_finite() && *z >= 0.0)
                .ok_or_else(|| {
                    ConfigError::invalid(node, "min_zoom_factor", "expected a non-negative number")
                })?;
            limits.min_zoom_factor = Some(zoom);
        }
        if let Some(v) = obj.get("zoomed_out_fill_colour").filter(|v| !v.is_null()) {
            limits.zoomed_out_fill_colour = Rgba::from_value(v)
                .map_err(|e| ConfigError::invalid(node, "zoomed_out_fill_colour", e))?;
        }
        if let Some(v) = obj.get("dataset_cache_rules").filter(|v| !v.is_null()) {
            limits.dataset_cache_rules = parse_cache_rules(node, v)?;
        }
        Ok(limits)
    }

    /// Cache lifetime for a response built from `dataset_count` datasets.
    ///
    /// The last rule whose `min_datasets` does not exceed the count applies.
    pub fn cache_max_age(&self, dataset_count: usize) -> u64 {
        let applicable = self
            .dataset_cache_rules
            .partition_point(|rule| rule.min_datasets <= dataset_count);
        match applicable {
            0 => NO_CACHE,
            n => self.dataset_cache_rules[n - 1].max_age,
        }
    }

    pub fn zoom_rejected(&self, zoom_factor: f64) -> bool {
        self.min_zoom_factor.is_some_and(|min| zoom_factor < min)
    }

    pub fn dataset_count_exceeded(&self, dataset_count: usize) -> bool {
        self.max_datasets.is_some_and(|max| dataset_count > max)
    }

    /// Combined policy: zoom first, then dataset count, then caching.
    pub fn decide(&self, dataset_count: usize, zoom_factor: Option<f64>) -> LimitDecision {
        if zoom_factor.is_some_and(|z| self.zoom_rejected(z)) {
            return LimitDecision::ZoomedOutFill(self.zoomed_out_fill_colour);
        }
        if self.dataset_count_exceeded(dataset_count) {
            return LimitDecision::TooManyDatasets;
        }
        LimitDecision::Render {
            max_age: self.cache_max_age(dataset_count),
        }
    }
}

/// Limits for every service of a layer.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedResourceLimits {
    pub wms: ServiceLimits,
    pub wcs: ServiceLimits,
}

impl ResolvedResourceLimits {
    pub fn unlimited(default_describe_maxage: u64) -> Self {
        Self {
            wms: ServiceLimits::unlimited(default_describe_maxage),
            wcs: ServiceLimits::unlimited(default_describe_maxage),
        }
    }

    /// Build from a resolved (inheritance-free) resource-limits body.
    pub fn from_body(
        node: &str,
        body: &Map<String, Value>,
        default_describe_maxage: u64,
    ) -> ConfigResult<Self> {
        Ok(Self {
            wms: ServiceLimits::from_value(node, body.get("wms"), default_describe_maxage)?,
            wcs: ServiceLimits::from_value(node, body.get("wcs"), default_describe_maxage)?,
        })
    }

    pub fn service(&self, service: Service) -> &ServiceLimits {
        match service {
            Service::Wms => &self.wms,
            Service::Wcs => &self.wcs,
        }
    }
}

fn optional_uint(node: &str, obj: &Map<String, Value>, field: &str) -> ConfigResult<Option<u64>> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .map(Some)
            .ok_or_else(|| ConfigError::invalid(node, field, "expected a non-negative integer")),
    }
}

fn parse_cache_rules(node: &str, value: &Value) -> ConfigResult<Vec<CacheRule>> {
    const FIELD: &str = "dataset_cache_rules";
    let items = value
        .as_array()
        .ok_or_else(|| ConfigError::invalid(node, FIELD, "expected a list of rules"))?;

    let mut rules: Vec<CacheRule> = Vec::with_capacity(items.len());
    for item in items {
        let obj = item
            .as_object()
            .ok_or_else(|| ConfigError::invalid(node, FIELD, "each rule must be a mapping"))?;
        let min_datasets = optional_uint(node, obj, "min_datasets")?
            .ok_or_else(|| ConfigError::missing(node, "dataset_cache_rules.min_datasets"))?;
        let max_age = optional_uint(node, obj, "max_age")?
            .ok_or_else(|| ConfigError::missing(node, "dataset_cache_rules.max_age"))?;
        if max_age == 0 {
            return Err(ConfigError::invalid(node, FIELD, "max_age must be positive"));
        }
        let rule = CacheRule {
            min_datasets: min_datasets as usize,
            max_age,
        };
        if let Some(prev) = rules.last() {
            if rule.min_datasets <= prev.min_datasets {
                return Err(ConfigError::invalid(
                    node,
                    FIELD,
                    format!(
                        "min_datasets must be strictly increasing ({} after {})",
                        rule.min_datasets, prev.min_datasets
                    ),
                ));
            }
        }
        rules.push(rule);
    }
    Ok(rules)
}
