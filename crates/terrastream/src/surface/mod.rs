//! Synthetic surface fields over a geographic grid.
//!
//! [`FieldKind`] is the closed set of surfaces; [`SurfaceGenerator`] samples
//! them at individual coordinates or across a whole [`GeoGrid`](crate::GeoGrid).
//! Apart from the injected random source every surface is a pure function of
//! the normalised coordinate (and, for temperature, the time of day).

mod generator;
mod kind;

pub use generator::*;
pub use kind::*;

#[cfg(test)]
mod tests;
