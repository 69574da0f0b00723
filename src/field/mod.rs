//! Learned feature field: density features and color for sample points.
//!
//! [`FeatureField`] is the seam the renderer calls through; [`NgpField`]
//! evaluates a trained snapshot on the CPU.

mod hash_grid;
mod mlp;
mod ngp;
mod sh;

pub use hash_grid::HashGrid;
pub use mlp::Mlp;
pub use ngp::NgpField;
pub use sh::{sh_encode, SH_MAX_COEFFS};

use crate::util::Vec3;

/// Width of a density feature vector. Lane 0 is the raw density.
pub const FEATURE_DIMS: usize = 16;

/// Density features of one sample.
pub type Features = [f32; FEATURE_DIMS];

/// Encoded view direction, shared by every sample on a ray.
pub type DirectionEncoding = [f32; SH_MAX_COEFFS];

/// Evaluates density and color at field-frame positions.
///
/// Implementations are immutable and shared across render threads.
pub trait FeatureField: Send + Sync {
    /// One feature vector per position, in order.
    fn density_features(&self, positions: &[Vec3]) -> Vec<Features>;

    /// Encode a (not necessarily unit) view direction.
    fn direction_encoding(&self, direction: Vec3) -> DirectionEncoding;

    /// Raw, pre-activation color of a sample.
    fn color(&self, features: &Features, encoding: &DirectionEncoding) -> [f32; 3];

    /// Raw density of a sample.
    #[inline]
    fn raw_density(&self, features: &Features) -> f32 {
        features[0]
    }
}
