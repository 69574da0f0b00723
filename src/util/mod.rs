//! Utility types and functions.
//!
//! This module contains fundamental types used throughout the crate:
//! - [`Error`] / [`Result`] - Error handling
//! - [`decode_f16_le`] - Half-precision payload decoding
//! - Math type re-exports from glam, [`BBox3f`] and [`Ray`]

mod error;
mod float16;
mod math;

pub use error::*;
pub use float16::*;
pub use math::*;
