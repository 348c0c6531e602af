//! Style definitions and their compilation from resolved configuration.
//!
//! A style body (already flattened by inheritance) is compiled once against
//! the owning layer's bands, flag definitions and the index registry. Every
//! band, flag and function reference is checked here, so rendering a
//! compiled [`ResolvedStyleDef`] can only fail on the request itself.

use ows_common::{BandError, ConfigError, ConfigResult, FlagError, RampError, Rgba};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::band_math::{BandRef, BoundFunction, IndexRegistry, IndexSpec};
use crate::bands::BandIndex;
use crate::flags::{FlagDefinitions, FlagExpression};
use crate::ramp::ColorRamp;

/// Everything a style is compiled against.
#[derive(Debug, Clone, Copy)]
pub struct StyleContext<'a> {
    pub bands: &'a BandIndex,
    /// Flag definitions keyed by native mask band name.
    pub flag_bands: &'a BTreeMap<String, FlagDefinitions>,
    pub registry: &'a IndexRegistry,
}

const KNOWN_KEYS: &[&str] = &[
    "name",
    "title",
    "abstract",
    "inherits",
    "components",
    "scale_range",
    "index_function",
    "index_expression",
    "needed_bands",
    "color_ramp",
    "mpl_ramp",
    "range",
    "component_ratio",
    "pq_masks",
    "multi_date",
    "multi_date_handlers",
    "value_map",
];

const CHANNELS: [&str; 4] = ["red", "green", "blue", "alpha"];

// ============================================================================
// Style kinds
// ============================================================================

/// One weighted band term of a linear component.
#[derive(Debug, Clone, PartialEq)]
pub struct Weight {
    pub band: BandRef,
    pub multiplier: f64,
}

/// One output channel of a linear style.
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    pub weights: Vec<Weight>,
    pub scale_range: (f64, f64),
}

impl Component {
    /// Weighted sum of the band values.
    pub fn raw_value(&self, values: &[f64]) -> f64 {
        self.weights
            .iter()
            .map(|w| w.band.value(values) * w.multiplier)
            .sum()
    }

    /// Clip to the scale range and rescale to a byte; `None` for no-data.
    pub fn scale(&self, v: f64) -> Option<u8> {
        if !v.is_finite() {
            return None;
        }
        let (lo, hi) = self.scale_range;
        let clipped = v.clamp(lo, hi);
        Some(((clipped - lo) / (hi - lo) * 255.0).round() as u8)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinearComponents {
    pub red: Component,
    pub green: Component,
    pub blue: Component,
    pub alpha: Option<Component>,
}

impl LinearComponents {
    /// Colour for one pixel; any non-finite channel makes it transparent.
    pub fn color(&self, values: &[f64]) -> Rgba {
        self.try_color(values).unwrap_or(Rgba::TRANSPARENT)
    }

    /// Colour for one pixel, or `None` if any channel is no-data.
    pub fn try_color(&self, values: &[f64]) -> Option<Rgba> {
        let channel = |c: &Component| c.scale(c.raw_value(values));
        let a = match &self.alpha {
            Some(c) => channel(c)?,
            None => 255,
        };
        Some(Rgba::new(
            channel(&self.red)?,
            channel(&self.green)?,
            channel(&self.blue)?,
            a,
        ))
    }

    fn weights_mut(&mut self) -> impl Iterator<Item = &mut Weight> {
        [&mut self.red, &mut self.green, &mut self.blue]
            .into_iter()
            .chain(self.alpha.as_mut())
            .flat_map(|c| c.weights.iter_mut())
    }

    fn bands(&self) -> impl Iterator<Item = &str> {
        [&self.red, &self.green, &self.blue]
            .into_iter()
            .chain(self.alpha.as_ref())
            .flat_map(|c| c.weights.iter().map(|w| w.band.band.as_str()))
    }
}

/// Scalar index mapped through a colour ramp.
#[derive(Debug, Clone, PartialEq)]
pub struct RampIndex {
    pub index: IndexSpec,
    pub ramp: ColorRamp,
}

/// Linear components blended with a ramp index.
#[derive(Debug, Clone, PartialEq)]
pub struct Hybrid {
    pub components: LinearComponents,
    pub index: RampIndex,
    /// Weight of the linear colour; the ramp gets `1 - ratio`.
    pub ratio: f64,
}

impl Hybrid {
    pub fn blend(&self, linear: Rgba, ramp: Rgba) -> Rgba {
        let mix = |l: u8, r: u8| {
            (self.ratio * f64::from(l) + (1.0 - self.ratio) * f64::from(r)).round() as u8
        };
        Rgba::new(
            mix(linear.r, ramp.r),
            mix(linear.g, ramp.g),
            mix(linear.b, ramp.b),
            mix(linear.a, ramp.a),
        )
    }
}

/// A raw-value condition on a mask band.
#[derive(Debug, Clone, PartialEq)]
pub enum Matcher {
    Flags {
        expr: FlagExpression,
        definitions: FlagDefinitions,
    },
    Values(Vec<u32>),
}

impl Matcher {
    pub fn matches(&self, raw: u32) -> Result<bool, FlagError> {
        match self {
            Matcher::Flags { expr, definitions } => expr.evaluate(&definitions.decode(raw)),
            Matcher::Values(values) => Ok(values.contains(&raw)),
        }
    }
}

/// One `pq_masks` entry.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskSpec {
    pub band: String,
    pub matcher: Matcher,
    pub invert: bool,
}

impl MaskSpec {
    /// Whether a pixel survives this entry. No-data samples never do.
    pub fn keeps(&self, raw: Option<u32>) -> Result<bool, FlagError> {
        match raw {
            Some(raw) => Ok(self.matcher.matches(raw)? != self.invert),
            None => Ok(false),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValueMapRule {
    pub title: String,
    pub abstract_text: String,
    pub matcher: Matcher,
    pub color: Rgba,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValueMapBand {
    pub band: String,
    pub rules: Vec<ValueMapRule>,
}

impl ValueMapBand {
    /// Index of the first rule matching a raw sample.
    pub fn first_match(&self, raw: u32) -> Result<Option<usize>, FlagError> {
        for (i, rule) in self.rules.iter().enumerate() {
            if rule.matcher.matches(raw)? {
                return Ok(Some(i));
            }
        }
        Ok(None)
    }
}

/// Categorical colouring; later bands paint over earlier ones.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueMap {
    pub bands: Vec<ValueMapBand>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StyleKind {
    Linear(LinearComponents),
    RampIndex(RampIndex),
    Hybrid(Hybrid),
    ValueMap(ValueMap),
}

impl StyleKind {
    pub fn name(&self) -> &'static str {
        match self {
            StyleKind::Linear(_) => "linear",
            StyleKind::RampIndex(_) => "ramp_index",
            StyleKind::Hybrid(_) => "hybrid",
            StyleKind::ValueMap(_) => "value_map",
        }
    }
}

// ============================================================================
// Multi-date handling
// ============================================================================

/// Reduction of several time slices to one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregator {
    /// Last slice minus first slice.
    Delta,
    Mean,
}

impl Aggregator {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.rsplit('.').next().unwrap_or(name) {
            "multi_date_delta" => Some(Aggregator::Delta),
            "multi_date_mean" => Some(Aggregator::Mean),
            _ => None,
        }
    }

    pub fn apply(&self, series: &[f64]) -> f64 {
        match (self, series) {
            (_, []) => f64::NAN,
            (Aggregator::Delta, [first, .., last]) => last - first,
            (Aggregator::Delta, [_]) => f64::NAN,
            (Aggregator::Mean, _) => series.iter().sum::<f64>() / series.len() as f64,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MultiDateHandler {
    pub min_count: usize,
    pub max_count: usize,
    pub animate: bool,
    pub preserve_user_date_order: bool,
    pub aggregator: Option<Aggregator>,
    /// Ramp for aggregated output; falls back to the style's ramp.
    pub ramp: Option<ColorRamp>,
    pub legend: Option<Value>,
}

impl MultiDateHandler {
    pub fn accepts(&self, count: usize) -> bool {
        (self.min_count..=self.max_count).contains(&count)
    }
}

// ============================================================================
// Resolved style
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedStyleDef {
    pub name: String,
    pub title: String,
    pub abstract_text: String,
    pub kind: StyleKind,
    /// Native bands read by components and the index, in slot order.
    pub needed_bands: Vec<String>,
    pub pq_masks: Vec<MaskSpec>,
    pub multi_date_handlers: Vec<MultiDateHandler>,
    /// Unrecognised keys, kept verbatim.
    pub extra: Map<String, Value>,
}

impl ResolvedStyleDef {
    /// Compile a flattened style body. `node` names the style in errors.
    pub fn compile(
        node: &str,
        body: &Map<String, Value>,
        ctx: StyleContext<'_>,
    ) -> ConfigResult<Self> {
        let name = body
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| ConfigError::missing(node, "name"))?
            .to_string();
        let title = opt_str(node, body, "title")?.unwrap_or_else(|| name.clone());
        let abstract_text = opt_str(node, body, "abstract")?.unwrap_or_default();

        let compiler = Compiler { node, body, ctx };
        let mut kind = compiler.kind()?;
        let needed_bands = compiler.needed_bands(&kind)?;
        bind(&mut kind, &needed_bands).map_err(|e| ConfigError::band(node, e))?;

        let pq_masks = match body.get("pq_masks") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| compiler.mask(item))
                .collect::<ConfigResult<_>>()?,
            Some(_) => return Err(ConfigError::invalid(node, "pq_masks", "expected a list")),
        };
        let multi_date_handlers = compiler.handlers(&kind)?;

        let extra = body
            .iter()
            .filter(|(k, _)| !KNOWN_KEYS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Ok(Self {
            name,
            title,
            abstract_text,
            kind,
            needed_bands,
            pq_masks,
            multi_date_handlers,
            extra,
        })
    }

    /// First handler whose count range contains `count`.
    pub fn handler_for(&self, count: usize) -> Option<&MultiDateHandler> {
        self.multi_date_handlers.iter().find(|h| h.accepts(count))
    }

    /// All native bands a render call must supply.
    pub fn required_bands(&self) -> Vec<String> {
        let mut bands = self.needed_bands.clone();
        let extra = self.pq_masks.iter().map(|m| &m.band);
        let mapped: Vec<&String> = match &self.kind {
            StyleKind::ValueMap(vm) => vm.bands.iter().map(|b| &b.band).collect(),
            _ => Vec::new(),
        };
        for band in extra.chain(mapped) {
            if !bands.contains(band) {
                bands.push(band.clone());
            }
        }
        bands
    }
}

fn bind(kind: &mut StyleKind, needed: &[String]) -> Result<(), BandError> {
    let bind_linear = |lc: &mut LinearComponents| -> Result<(), BandError> {
        for w in lc.weights_mut() {
            w.band.slot = needed
                .iter()
                .position(|n| n == &w.band.band)
                .ok_or_else(|| BandError::UndeclaredBand(w.band.alias.clone()))?;
        }
        Ok(())
    };
    match kind {
        StyleKind::Linear(lc) => bind_linear(lc),
        StyleKind::RampIndex(ri) => ri.index.bind(needed),
        StyleKind::Hybrid(h) => {
            bind_linear(&mut h.components)?;
            h.index.index.bind(needed)
        }
        StyleKind::ValueMap(_) => Ok(()),
    }
}

fn opt_str(node: &str, body: &Map<String, Value>, key: &str) -> ConfigResult<Option<String>> {
    match body.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(ConfigError::invalid(
            node,
            key,
            format!("expected a string, got {}", other),
        )),
    }
}

fn parse_range(node: &str, key: &str, value: &Value) -> ConfigResult<(f64, f64)> {
    let pair = value
        .as_array()
        .filter(|a| a.len() == 2)
        .and_then(|a| Some((a[0].as_f64()?, a[1].as_f64()?)))
        .ok_or_else(|| ConfigError::invalid(node, key, "expected [min, max]"))?;
    if !(pair.0 < pair.1) {
        return Err(ConfigError::invalid(
            node,
            key,
            format!("min {} must be below max {}", pair.0, pair.1),
        ));
    }
    Ok(pair)
}

struct Compiler<'a> {
    node: &'a str,
    body: &'a Map<String, Value>,
    ctx: StyleContext<'a>,
}

impl Compiler<'_> {
    fn has(&self, key: &str) -> bool {
        self.body.get(key).is_some_and(|v| !v.is_null())
    }

    fn conflict(&self, message: impl Into<String>) -> ConfigError {
        ConfigError::ConflictingStyleKind {
            style: self.node.to_string(),
            message: message.into(),
        }
    }

    fn kind(&self) -> ConfigResult<StyleKind> {
        let has_components = self.has("components");
        let has_index = self.has("index_function") || self.has("index_expression");
        let has_ramp = self.has("color_ramp") || self.has("mpl_ramp") || self.has("range");

        if self.has("index_function") && self.has("index_expression") {
            return Err(self.conflict("index_function and index_expression are mutually exclusive"));
        }
        if let Some(vm) = self.body.get("value_map").filter(|v| !v.is_null()) {
            if has_components || has_index || has_ramp {
                return Err(self.conflict("value_map cannot be combined with components or an index"));
            }
            return Ok(StyleKind::ValueMap(self.value_map(vm)?));
        }
        if has_ramp && !has_index {
            return Err(self.conflict("a colour ramp needs index_function or index_expression"));
        }
        match (has_components, has_index) {
            (true, false) => Ok(StyleKind::Linear(self.components()?)),
            (false, true) => Ok(StyleKind::RampIndex(self.ramp_index()?)),
            (true, true) => {
                let ratio = self
                    .body
                    .get("component_ratio")
                    .ok_or_else(|| ConfigError::missing(self.node, "component_ratio"))?
                    .as_f64()
                    .filter(|r| (0.0..=1.0).contains(r))
                    .ok_or_else(|| {
                        ConfigError::invalid(self.node, "component_ratio", "must be a number in [0, 1]")
                    })?;
                Ok(StyleKind::Hybrid(Hybrid {
                    components: self.components()?,
                    index: self.ramp_index()?,
                    ratio,
                }))
            }
            (false, false) => Err(self.conflict("style needs components, an index or a value_map")),
        }
    }

    fn canonical(&self, band: &str) -> ConfigResult<String> {
        self.ctx
            .bands
            .canonical(band)
            .map(str::to_string)
            .map_err(|e| ConfigError::band(self.node, e))
    }

    fn components(&self) -> ConfigResult<LinearComponents> {
        let obj = self
            .body
            .get("components")
            .and_then(Value::as_object)
            .ok_or_else(|| ConfigError::invalid(self.node, "components", "expected a mapping"))?;
        if let Some(key) = obj.keys().find(|k| !CHANNELS.contains(&k.as_str())) {
            return Err(ConfigError::invalid(
                self.node,
                "components",
                format!("unknown component '{}'", key),
            ));
        }
        let style_range = match self.body.get("scale_range") {
            Some(v) if !v.is_null() => Some(parse_range(self.node, "scale_range", v)?),
            _ => None,
        };
        let channel = |name: &str| -> ConfigResult<Option<Component>> {
            let Some(spec) = obj.get(name) else {
                return Ok(None);
            };
            let spec = spec.as_object().ok_or_else(|| {
                ConfigError::invalid(self.node, "components", format!("'{}' must be a mapping", name))
            })?;
            let mut weights = Vec::new();
            let mut range = style_range;
            for (key, v) in spec {
                if key == "scale_range" {
                    range = Some(parse_range(self.node, "scale_range", v)?);
                    continue;
                }
                let multiplier = v.as_f64().ok_or_else(|| {
                    ConfigError::invalid(
                        self.node,
                        "components",
                        format!("multiplier for '{}' in '{}' is not a number", key, name),
                    )
                })?;
                weights.push(Weight {
                    band: BandRef::new(key, &self.canonical(key)?),
                    multiplier,
                });
            }
            let scale_range = range.ok_or_else(|| ConfigError::missing(self.node, "scale_range"))?;
            Ok(Some(Component {
                weights,
                scale_range,
            }))
        };
        let required = |name: &str| -> ConfigResult<Component> {
            channel(name)?.ok_or_else(|| ConfigError::missing(self.node, format!("components.{}", name)))
        };
        Ok(LinearComponents {
            red: required("red")?,
            green: required("green")?,
            blue: required("blue")?,
            alpha: channel("alpha")?,
        })
    }

    fn index(&self) -> ConfigResult<IndexSpec> {
        let result = if let Some(f) = self.body.get("index_function") {
            BoundFunction::from_value(f, self.ctx.registry, self.ctx.bands).map(IndexSpec::Function)
        } else {
            let source = self
                .body
                .get("index_expression")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    ConfigError::invalid(self.node, "index_expression", "expected a string")
                })?;
            IndexSpec::expression(source, self.ctx.bands)
        };
        result.map_err(|e| ConfigError::band(self.node, e))
    }

    fn ramp_from(&self, body: &Map<String, Value>) -> ConfigResult<Option<ColorRamp>> {
        let invalid = |e: RampError| ConfigError::InvalidRamp {
            style: self.node.to_string(),
            message: e.to_string(),
        };
        let ramp = body.get("color_ramp").filter(|v| !v.is_null());
        let palette = body.get("mpl_ramp").filter(|v| !v.is_null());
        let range = body.get("range").filter(|v| !v.is_null());
        match (ramp, palette, range) {
            (Some(_), _, Some(_)) => Err(self.conflict("color_ramp and range are mutually exclusive")),
            (Some(_), Some(_), None) => {
                Err(self.conflict("color_ramp and mpl_ramp are mutually exclusive"))
            }
            (Some(ramp), None, None) => ColorRamp::from_value(ramp).map(Some).map_err(invalid),
            (None, Some(palette), Some(range)) => {
                let name = palette
                    .as_str()
                    .ok_or_else(|| ConfigError::invalid(self.node, "mpl_ramp", "expected a palette name"))?;
                let (min, max) = parse_range(self.node, "range", range)?;
                ColorRamp::from_palette(name, min, max).map(Some).map_err(invalid)
            }
            (None, Some(_), None) => Err(ConfigError::missing(self.node, "range")),
            (None, None, Some(range)) => {
                let (min, max) = parse_range(self.node, "range", range)?;
                ColorRamp::from_range(min, max).map(Some).map_err(invalid)
            }
            (None, None, None) => Ok(None),
        }
    }

    fn ramp_index(&self) -> ConfigResult<RampIndex> {
        let index = self.index()?;
        let ramp = self
            .ramp_from(self.body)?
            .ok_or_else(|| ConfigError::missing(self.node, "color_ramp"))?;
        Ok(RampIndex { index, ramp })
    }

    /// Declared `needed_bands`, validated, or the bands the style actually reads.
    fn needed_bands(&self, kind: &StyleKind) -> ConfigResult<Vec<String>> {
        let mut referenced: Vec<String> = Vec::new();
        let mut push = |band: &str| {
            if !referenced.iter().any(|b| b == band) {
                referenced.push(band.to_string());
            }
        };
        match kind {
            StyleKind::Linear(lc) => lc.bands().for_each(&mut push),
            StyleKind::RampIndex(ri) => ri.index.referenced_bands().iter().for_each(|b| push(b.as_str())),
            StyleKind::Hybrid(h) => {
                h.components.bands().for_each(&mut push);
                h.index.index.referenced_bands().iter().for_each(|b| push(b.as_str()));
            }
            StyleKind::ValueMap(_) => {}
        }

        let Some(declared) = self.body.get("needed_bands").filter(|v| !v.is_null()) else {
            return Ok(referenced);
        };
        let items = declared
            .as_array()
            .ok_or_else(|| ConfigError::invalid(self.node, "needed_bands", "expected a list"))?;
        let mut needed: Vec<String> = Vec::with_capacity(items.len());
        for item in items {
            let band = item.as_str().ok_or_else(|| {
                ConfigError::invalid(self.node, "needed_bands", "band names must be strings")
            })?;
            let native = self.canonical(band)?;
            if !needed.contains(&native) {
                needed.push(native);
            }
        }
        Ok(needed)
    }

    /// Native name of a mask band: a layer band or a declared flag band.
    fn mask_band(&self, band: &str) -> ConfigResult<String> {
        match self.ctx.bands.canonical(band) {
            Ok(native) => Ok(native.to_string()),
            Err(_) if self.ctx.flag_bands.contains_key(band) => Ok(band.to_string()),
            Err(e) => Err(ConfigError::band(self.node, e)),
        }
    }

    fn matcher(&self, field: &str, band: &str, item: &Map<String, Value>) -> ConfigResult<Matcher> {
        match (item.get("flags"), item.get("values")) {
            (Some(_), Some(_)) => Err(ConfigError::invalid(
                self.node,
                field,
                "use either 'flags' or 'values', not both",
            )),
            (Some(flags), None) => {
                let flag_err = |e: FlagError| ConfigError::flag(self.node, e);
                let definitions = self
                    .ctx
                    .flag_bands
                    .get(band)
                    .ok_or_else(|| flag_err(FlagError::UnknownFlagBand(band.to_string())))?;
                let expr = FlagExpression::from_value(flags).map_err(flag_err)?;
                expr.validate(definitions).map_err(flag_err)?;
                Ok(Matcher::Flags {
                    expr,
                    definitions: definitions.clone(),
                })
            }
            (None, Some(values)) => {
                let values = values
                    .as_array()
                    .and_then(|a| {
                        a.iter()
                            .map(|v| v.as_u64().and_then(|v| u32::try_from(v).ok()))
                            .collect::<Option<Vec<_>>>()
                    })
                    .ok_or_else(|| {
                        ConfigError::invalid(self.node, field, "'values' must be a list of integers")
                    })?;
                Ok(Matcher::Values(values))
            }
            (None, None) => Err(ConfigError::missing(self.node, format!("{}.flags", field))),
        }
    }

    fn mask(&self, item: &Value) -> ConfigResult<MaskSpec> {
        let obj = item
            .as_object()
            .ok_or_else(|| ConfigError::invalid(self.node, "pq_masks", "entries must be mappings"))?;
        let band = obj
            .get("band")
            .and_then(Value::as_str)
            .ok_or_else(|| ConfigError::missing(self.node, "pq_masks.band"))?;
        let band = self.mask_band(band)?;
        let matcher = self.matcher("pq_masks", &band, obj)?;
        let invert = obj.get("invert").and_then(Value::as_bool).unwrap_or(false);
        Ok(MaskSpec {
            band,
            matcher,
            invert,
        })
    }

    fn value_map(&self, value: &Value) -> ConfigResult<ValueMap> {
        let obj = value
            .as_object()
            .ok_or_else(|| ConfigError::invalid(self.node, "value_map", "expected a mapping"))?;
        let mut bands = Vec::with_capacity(obj.len());
        for (band, rules) in obj {
            let band = self.mask_band(band)?;
            let rules = rules
                .as_array()
                .ok_or_else(|| ConfigError::invalid(self.node, "value_map", "rules must be a list"))?
                .iter()
                .map(|rule| self.value_map_rule(&band, rule))
                .collect::<ConfigResult<Vec<_>>>()?;
            bands.push(ValueMapBand { band, rules });
        }
        Ok(ValueMap { bands })
    }

    fn value_map_rule(&self, band: &str, rule: &Value) -> ConfigResult<ValueMapRule> {
        let obj = rule
            .as_object()
            .ok_or_else(|| ConfigError::invalid(self.node, "value_map", "rules must be mappings"))?;
        let color = Rgba::from_value(
            obj.get("color")
                .ok_or_else(|| ConfigError::missing(self.node, "value_map.color"))?,
        )
        .map_err(|e| ConfigError::invalid(self.node, "value_map", e))?;
        let alpha = match obj.get("alpha") {
            None => 1.0,
            Some(a) => a.as_f64().filter(|a| (0.0..=1.0).contains(a)).ok_or_else(|| {
                ConfigError::invalid(self.node, "value_map", "alpha must be in [0, 1]")
            })?,
        };
        let text = |key: &str| obj.get(key).and_then(Value::as_str).unwrap_or_default().to_string();
        Ok(ValueMapRule {
            title: text("title"),
            abstract_text: text("abstract"),
            matcher: self.matcher("value_map", band, obj)?,
            color: Rgba::new(
                color.r,
                color.g,
                color.b,
                ows_common::color::unit_to_byte(alpha),
            ),
        })
    }

    fn handlers(&self, kind: &StyleKind) -> ConfigResult<Vec<MultiDateHandler>> {
        let key = if self.has("multi_date") {
            "multi_date"
        } else {
            "multi_date_handlers"
        };
        let items = match self.body.get(key) {
            None | Some(Value::Null) => return Ok(Vec::new()),
            Some(Value::Array(items)) => items,
            Some(_) => return Err(ConfigError::invalid(self.node, key, "expected a list")),
        };
        let mut handlers = Vec::with_capacity(items.len());
        for item in items {
            let obj = item
                .as_object()
                .ok_or_else(|| ConfigError::invalid(self.node, key, "handlers must be mappings"))?;
            let (min_count, max_count) = obj
                .get("allowed_count_range")
                .and_then(Value::as_array)
                .filter(|a| a.len() == 2)
                .and_then(|a| Some((a[0].as_u64()? as usize, a[1].as_u64()? as usize)))
                .filter(|(min, max)| *min >= 2 && min <= max)
                .ok_or_else(|| {
                    ConfigError::invalid(
                        self.node,
                        "allowed_count_range",
                        "expected [min, max] with 2 <= min <= max",
                    )
                })?;
            let animate = obj.get("animate").and_then(Value::as_bool).unwrap_or(false);
            let aggregator = match obj.get("aggregator_function") {
                None | Some(Value::Null) => None,
                Some(spec) => {
                    let name = spec
                        .as_str()
                        .or_else(|| spec.get("function").and_then(Value::as_str))
                        .ok_or_else(|| ConfigError::missing(self.node, "aggregator_function.function"))?;
                    Some(Aggregator::from_name(name).ok_or_else(|| {
                        ConfigError::band(self.node, BandError::UnknownFunction(name.to_string()))
                    })?)
                }
            };
            if !animate {
                if aggregator.is_none() {
                    return Err(ConfigError::missing(self.node, "aggregator_function"));
                }
                if matches!(kind, StyleKind::ValueMap(_)) {
                    return Err(self.conflict("value_map styles only support animated multi-date handlers"));
                }
            }
            handlers.push(MultiDateHandler {
                min_count,
                max_count,
                animate,
                preserve_user_date_order: obj
                    .get("preserve_user_date_order")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
                aggregator,
                ramp: self.ramp_from(obj)?,
                legend: obj.get("legend").cloned(),
            });
        }
        Ok(handlers)
    }
}
