//! Style evaluation for georeferenced raster layers.
//!
//! Turns already-fetched band arrays into RGBA imagery:
//! - Linear band composition
//! - Index functions and expressions through colour ramps
//! - Hybrid blends of the two
//! - Bit-flag value maps and masks
//! - Multi-date animation and aggregation

pub mod band_math;
pub mod bands;
pub mod evaluate;
pub mod flags;
pub mod ramp;
pub mod raster;
pub mod style;

pub use band_math::{IndexFn, IndexRegistry, IndexSpec};
pub use bands::BandIndex;
pub use evaluate::render;
pub use flags::{FlagDefinitions, FlagExpression, FlagValue, FlagValues};
pub use ramp::{ColorRamp, RampPoint};
pub use raster::{fill_image, BandSlice, Frame, RenderOutput};
pub use style::{ResolvedStyleDef, StyleContext, StyleKind};
