//! Band algebra: index functions and arithmetic index expressions.
//!
//! An [`IndexSpec`] is built at configuration time in two steps. Parsing
//! canonicalises every band reference through the layer's [`BandIndex`];
//! [`IndexSpec::bind`] then assigns each reference a slot in the style's
//! `needed_bands` list. Per-pixel evaluation reads values by slot, so the hot
//! path never touches a string.

use ows_common::BandError;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::bands::BandIndex;

/// Signature of an index function: band values in argument order, then scalar kwargs.
pub type IndexFn = fn(&[f64], &BTreeMap<String, f64>) -> f64;

// ============================================================================
// Function registry
// ============================================================================

#[derive(Debug, Clone)]
struct RegisteredFunction {
    band_args: Vec<String>,
    func: IndexFn,
}

/// Table of index functions available to styles, keyed by name.
#[derive(Debug, Clone)]
pub struct IndexRegistry {
    functions: HashMap<String, RegisteredFunction>,
}

impl Default for IndexRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("norm_diff", &["band1", "band2"], norm_diff);
        registry.register("ratio", &["band1", "band2"], ratio);
        registry.register("delta_bands", &["band1", "band2"], delta_bands);
        registry.register("sum_bands", &["band1", "band2"], sum_bands);
        registry.register("single_band", &["band"], single_band);
        registry
    }
}

impl IndexRegistry {
    /// A registry with no functions.
    pub fn empty() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }

    /// Add or replace a function. `band_args` names the kwargs that carry band names.
    pub fn register(&mut self, name: &str, band_args: &[&str], func: IndexFn) {
        self.functions.insert(
            name.to_string(),
            RegisteredFunction {
                band_args: band_args.iter().map(|a| a.to_string()).collect(),
                func,
            },
        );
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Exact name first, then the last dotted segment (`pkg.module.norm_diff`).
    fn lookup(&self, name: &str) -> Option<&RegisteredFunction> {
        self.functions.get(name).or_else(|| {
            name.rsplit('.')
                .next()
                .and_then(|short| self.functions.get(short))
        })
    }
}

fn scaled(value: f64, params: &BTreeMap<String, f64>) -> f64 {
    value * params.get("scale_factor").copied().unwrap_or(1.0)
}

fn safe_div(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        f64::NAN
    } else {
        num / den
    }
}

fn norm_diff(v: &[f64], params: &BTreeMap<String, f64>) -> f64 {
    scaled(safe_div(v[0] - v[1], v[0] + v[1]), params)
}

fn ratio(v: &[f64], params: &BTreeMap<String, f64>) -> f64 {
    scaled(safe_div(v[0], v[1]), params)
}

fn delta_bands(v: &[f64], params: &BTreeMap<String, f64>) -> f64 {
    scaled(v[0] - v[1], params)
}

fn sum_bands(v: &[f64], params: &BTreeMap<String, f64>) -> f64 {
    scaled(v[0] + v[1], params)
}

fn single_band(v: &[f64], params: &BTreeMap<String, f64>) -> f64 {
    scaled(v[0], params)
}

// ============================================================================
// Bound index specs
// ============================================================================

/// A band reference with its slot in `needed_bands`.
#[derive(Debug, Clone, PartialEq)]
pub struct BandRef {
    /// Name as written in the style.
    pub alias: String,
    /// Native band name.
    pub band: String,
    pub slot: usize,
}

impl BandRef {
    /// An unbound reference; it reads as no-data until bound.
    pub fn new(alias: &str, band: &str) -> Self {
        Self {
            alias: alias.to_string(),
            band: band.to_string(),
            slot: usize::MAX,
        }
    }

    /// Value at this reference's slot.
    #[inline]
    pub fn value(&self, values: &[f64]) -> f64 {
        values.get(self.slot).copied().unwrap_or(f64::NAN)
    }

    /// Value from a band-name mapping, by native name or by alias.
    fn named_value(&self, pixel: &HashMap<String, f64>) -> Result<f64, BandError> {
        pixel
            .get(&self.band)
            .or_else(|| pixel.get(&self.alias))
            .copied()
            .ok_or_else(|| BandError::UnknownBand(self.alias.clone()))
    }
}

/// An index function with its band arguments and scalar parameters bound.
#[derive(Clone)]
pub struct BoundFunction {
    pub name: String,
    pub bands: Vec<BandRef>,
    pub params: BTreeMap<String, f64>,
    func: IndexFn,
}

impl PartialEq for BoundFunction {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.bands == other.bands && self.params == other.params
    }
}

impl fmt::Debug for BoundFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundFunction")
            .field("name", &self.name)
            .field("bands", &self.bands)
            .field("params", &self.params)
            .finish()
    }
}

impl BoundFunction {
    /// Parse an `index_function` block: `{function, kwargs: {...}}`.
    pub fn from_value(
        value: &Value,
        registry: &IndexRegistry,
        bands: &BandIndex,
    ) -> Result<Self, BandError> {
        let (name, kwargs) = match value {
            Value::String(name) => (name.as_str(), None),
            Value::Object(obj) => {
                let name = obj.get("function").and_then(Value::as_str).ok_or_else(|| {
                    BandError::MissingArgument {
                        function: "index_function".to_string(),
                        argument: "function".to_string(),
                    }
                })?;
                (name, obj.get("kwargs").and_then(Value::as_object))
            }
            other => {
                return Err(BandError::InvalidArgument {
                    function: "index_function".to_string(),
                    argument: "function".to_string(),
                    message: format!("expected a mapping, got {}", other),
                })
            }
        };
        let registered = registry
            .lookup(name)
            .ok_or_else(|| BandError::UnknownFunction(name.to_string()))?;
        let empty = Map::new();
        let kwargs = kwargs.unwrap_or(&empty);

        let mut refs = Vec::with_capacity(registered.band_args.len());
        for arg in &registered.band_args {
            let band = kwargs
                .get(arg)
                .ok_or_else(|| BandError::MissingArgument {
                    function: name.to_string(),
                    argument: arg.clone(),
                })?
                .as_str()
                .ok_or_else(|| BandError::InvalidArgument {
                    function: name.to_string(),
                    argument: arg.clone(),
                    message: "band arguments must be strings".to_string(),
                })?;
            refs.push(BandRef::new(band, bands.canonical(band)?));
        }

        let mut params = BTreeMap::new();
        for (key, v) in kwargs {
            if registered.band_args.contains(key) {
                continue;
            }
            let scalar = v.as_f64().ok_or_else(|| BandError::InvalidArgument {
                function: name.to_string(),
                argument: key.clone(),
                message: format!("expected a number, got {}", v),
            })?;
            params.insert(key.clone(), scalar);
        }

        Ok(Self {
            name: name.to_string(),
            bands: refs,
            params,
            func: registered.func,
        })
    }

    fn evaluate(&self, values: &[f64], scratch: &mut Vec<f64>) -> f64 {
        scratch.clear();
        scratch.extend(self.bands.iter().map(|b| b.value(values)));
        (self.func)(scratch, &self.params)
    }

    fn evaluate_named(&self, pixel: &HashMap<String, f64>) -> Result<f64, BandError> {
        let args = self
            .bands
            .iter()
            .map(|b| b.named_value(pixel))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((self.func)(&args, &self.params))
    }
}

/// Arithmetic operator in an index expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => safe_div(a, b),
        }
    }
}

/// Parsed index expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Band(BandRef),
    Neg(Box<Expr>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

impl Expr {
    /// Parse an expression; identifiers are canonicalised through `bands`.
    pub fn parse(source: &str, bands: &BandIndex) -> Result<Self, BandError> {
        let tokens = Lexer::new(source).tokenize()?;
        let mut parser = Parser {
            source,
            tokens,
            pos: 0,
        };
        let expr = parser.parse_sum()?;
        parser.expect_end()?;
        expr.canonicalise(bands)
    }

    fn canonicalise(self, bands: &BandIndex) -> Result<Self, BandError> {
        Ok(match self {
            Expr::Band(r) => Expr::Band(BandRef::new(&r.alias, bands.canonical(&r.alias)?)),
            Expr::Neg(inner) => Expr::Neg(Box::new(inner.canonicalise(bands)?)),
            Expr::Binary { op, lhs, rhs } => Expr::Binary {
                op,
                lhs: Box::new(lhs.canonicalise(bands)?),
                rhs: Box::new(rhs.canonicalise(bands)?),
            },
            n @ Expr::Number(_) => n,
        })
    }

    /// Evaluate with band values indexed by slot.
    pub fn evaluate(&self, values: &[f64]) -> f64 {
        match self {
            Expr::Number(n) => *n,
            Expr::Band(r) => r.value(values),
            Expr::Neg(inner) => -inner.evaluate(values),
            Expr::Binary { op, lhs, rhs } => op.apply(lhs.evaluate(values), rhs.evaluate(values)),
        }
    }

    /// Evaluate with band values looked up by name.
    pub fn evaluate_named(&self, pixel: &HashMap<String, f64>) -> Result<f64, BandError> {
        Ok(match self {
            Expr::Number(n) => *n,
            Expr::Band(r) => r.named_value(pixel)?,
            Expr::Neg(inner) => -inner.evaluate_named(pixel)?,
            Expr::Binary { op, lhs, rhs } => {
                op.apply(lhs.evaluate_named(pixel)?, rhs.evaluate_named(pixel)?)
            }
        })
    }

    fn visit_bands<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Band(r) => out.push(&r.band),
            Expr::Neg(inner) => inner.visit_bands(out),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.visit_bands(out);
                rhs.visit_bands(out);
            }
            Expr::Number(_) => {}
        }
    }

    fn bind(&mut self, needed: &[String]) -> Result<(), BandError> {
        match self {
            Expr::Band(r) => bind_ref(r, needed),
            Expr::Neg(inner) => inner.bind(needed),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.bind(needed)?;
                rhs.bind(needed)
            }
            Expr::Number(_) => Ok(()),
        }
    }
}

fn bind_ref(r: &mut BandRef, needed: &[String]) -> Result<(), BandError> {
    r.slot = needed
        .iter()
        .position(|n| n == &r.band)
        .ok_or_else(|| BandError::UndeclaredBand(r.alias.clone()))?;
    Ok(())
}

/// The scalar index of a ramp or hybrid style.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexSpec {
    Function(BoundFunction),
    Expression { source: String, expr: Expr },
}

impl IndexSpec {
    pub fn expression(source: &str, bands: &BandIndex) -> Result<Self, BandError> {
        Ok(IndexSpec::Expression {
            source: source.to_string(),
            expr: Expr::parse(source, bands)?,
        })
    }

    /// Native bands referenced, deduplicated in first-use order.
    pub fn referenced_bands(&self) -> Vec<String> {
        let mut names: Vec<&str> = Vec::new();
        match self {
            IndexSpec::Function(f) => names.extend(f.bands.iter().map(|b| b.band.as_str())),
            IndexSpec::Expression { expr, .. } => expr.visit_bands(&mut names),
        }
        let mut out: Vec<String> = Vec::with_capacity(names.len());
        for name in names {
            if !out.iter().any(|n| n == name) {
                out.push(name.to_string());
            }
        }
        out
    }

    /// Assign slots against the style's `needed_bands`.
    pub fn bind(&mut self, needed: &[String]) -> Result<(), BandError> {
        match self {
            IndexSpec::Function(f) => f.bands.iter_mut().try_for_each(|r| bind_ref(r, needed)),
            IndexSpec::Expression { expr, .. } => expr.bind(needed),
        }
    }

    /// Evaluate for one pixel; `values` is indexed like `needed_bands`.
    ///
    /// Non-finite results are returned as NaN, the no-data sentinel.
    pub fn evaluate(&self, values: &[f64], scratch: &mut Vec<f64>) -> f64 {
        no_data_if_not_finite(match self {
            IndexSpec::Function(f) => f.evaluate(values, scratch),
            IndexSpec::Expression { expr, .. } => expr.evaluate(values),
        })
    }

    /// Evaluate from a mapping of band name (native or alias) to value.
    ///
    /// Works whether or not the index has been bound. Slower than
    /// [`IndexSpec::evaluate`].
    pub fn evaluate_named(&self, pixel: &HashMap<String, f64>) -> Result<f64, BandError> {
        Ok(no_data_if_not_finite(match self {
            IndexSpec::Function(f) => f.evaluate_named(pixel)?,
            IndexSpec::Expression { expr, .. } => expr.evaluate_named(pixel)?,
        }))
    }
}

fn no_data_if_not_finite(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        f64::NAN
    }
}

// ============================================================================
// Expression lexer / parser
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    End,
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    position: usize,
}

struct Lexer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            pos: 0,
        }
    }

    fn error(&self, position: usize, message: impl Into<String>) -> BandError {
        BandError::Expression {
            expression: self.source.to_string(),
            position,
            message: message.into(),
        }
    }

    fn tokenize(mut self) -> Result<Vec<Token>, BandError> {
        let mut tokens = Vec::new();
        loop {
            while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_whitespace() {
                self.pos += 1;
            }
            let start = self.pos;
            let Some(&c) = self.bytes.get(self.pos) else {
                tokens.push(Token {
                    kind: TokenKind::End,
                    position: start,
                });
                return Ok(tokens);
            };
            let kind = match c {
                b'+' => TokenKind::Plus,
                b'-' => TokenKind::Minus,
                b'*' => TokenKind::Star,
                b'/' => TokenKind::Slash,
                b'(' => TokenKind::LParen,
                b')' => TokenKind::RParen,
                b'0'..=b'9' | b'.' => {
                    tokens.push(self.number(start)?);
                    continue;
                }
                c if c.is_ascii_alphabetic() || c == b'_' => {
                    while self
                        .bytes
                        .get(self.pos)
                        .is_some_and(|b| b.is_ascii_alphanumeric() || *b == b'_')
                    {
                        self.pos += 1;
                    }
                    tokens.push(Token {
                        kind: TokenKind::Ident(self.source[start..self.pos].to_string()),
                        position: start,
                    });
                    continue;
                }
                _ => {
                    let ch = self.source[start..].chars().next().unwrap_or('?');
                    return Err(self.error(start, format!("unexpected character '{}'", ch)));
                }
            };
            self.pos += 1;
            tokens.push(Token {
                kind,
                position: start,
            });
        }
    }

    fn number(&mut self, start: usize) -> Result<Token, BandError> {
        let digits = |lexer: &mut Self| {
            while lexer.bytes.get(lexer.pos).is_some_and(u8::is_ascii_digit) {
                lexer.pos += 1;
            }
        };
        digits(self);
        if self.bytes.get(self.pos) == Some(&b'.') {
            self.pos += 1;
            digits(self);
        }
        if matches!(self.bytes.get(self.pos), Some(b'e' | b'E')) {
            self.pos += 1;
            if matches!(self.bytes.get(self.pos), Some(b'+' | b'-')) {
                self.pos += 1;
            }
            digits(self);
        }
        let raw = &self.source[start..self.pos];
        let value: f64 = raw
            .parse()
            .map_err(|_| self.error(start, format!("invalid number '{}'", raw)))?;
        Ok(Token {
            kind: TokenKind::Number(value),
            position: start,
        })
    }
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> &Token {
        // The lexer always terminates the stream with End.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn error(&self, token: &Token, message: impl Into<String>) -> BandError {
        BandError::Expression {
            expression: self.source.to_string(),
            position: token.position,
            message: message.into(),
        }
    }

    fn parse_sum(&mut self) -> Result<Expr, BandError> {
        let mut lhs = self.parse_product()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.parse_product()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn parse_product(&mut self) -> Result<Expr, BandError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, BandError> {
        if self.peek().kind == TokenKind::Minus {
            self.advance();
            return Ok(Expr::Neg(Box::new(self.parse_unary()?)));
        }
        if self.peek().kind == TokenKind::Plus {
            self.advance();
            return self.parse_unary();
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, BandError> {
        let token = self.advance();
        match token.kind {
            TokenKind::Number(n) => Ok(Expr::Number(n)),
            TokenKind::Ident(name) => Ok(Expr::Band(BandRef::new(&name, &name))),
            TokenKind::LParen => {
                let inner = self.parse_sum()?;
                let close = self.advance();
                if close.kind != TokenKind::RParen {
                    return Err(self.error(&close, "expected ')'"));
                }
                Ok(inner)
            }
            TokenKind::End => Err(self.error(&token, "unexpected end of expression")),
            _ => Err(self.error(&token, "expected a number, band or '('")),
        }
    }

    fn expect_end(&mut self) -> Result<(), BandError> {
        let token = self.peek().clone();
        if token.kind == TokenKind::End {
            Ok(())
        } else {
            Err(self.error(&token, "unexpected trailing input"))
        }
    }
}
