//! Snapshot format constants and the parameter buffer layout.

use std::ops::Range;

use crate::config::{NetworkConfig, COLOR_OUTPUT_DIMS, DENSITY_OUTPUT_DIMS};
use crate::util::{Error, Result};

/// Top-level key holding the trained state.
pub const SNAPSHOT_KEY: &str = "snapshot";

/// Binary payload with all network parameters (f16).
pub const PARAMS_KEY: &str = "params_binary";

/// Binary payload with the Morton-ordered density grid (f16).
pub const DENSITY_GRID_KEY: &str = "density_grid_binary";

/// Optional declared parameter count.
pub const N_PARAMS_KEY: &str = "n_params";

/// Optional parameter precision tag.
pub const PARAMS_TYPE_KEY: &str = "params_type";

/// Optional density grid side length.
pub const DENSITY_GRID_SIZE_KEY: &str = "density_grid_size";

/// The only parameter precision this loader decodes.
pub const PARAMS_TYPE_HALF: &str = "__half";

/// Densities above this (after clamping to [0, 1]) mark a voxel occupied.
pub const DENSITY_THRESHOLD: f32 = 0.01;

/// Sizes, in parameters, of the three segments of the parameter buffer.
///
/// The buffer stores the density network, then the color network, then the
/// hash grid table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterLayout {
    pub density_network: usize,
    pub color_network: usize,
    pub hash_grid: usize,
}

impl ParameterLayout {
    /// Derive the layout from network hyperparameters.
    pub fn from_network(config: &NetworkConfig) -> Self {
        let enc = &config.hash_encoding;
        Self {
            density_network: config
                .density_network
                .param_count(enc.output_dims(), DENSITY_OUTPUT_DIMS),
            color_network: config
                .color_network
                .param_count(config.color_input_dims(), COLOR_OUTPUT_DIMS),
            hash_grid: enc.param_count(),
        }
    }

    #[inline]
    pub fn total(&self) -> usize {
        self.density_network + self.color_network + self.hash_grid
    }

    fn ranges(&self) -> [Range<usize>; 3] {
        let a = self.density_network;
        let b = a + self.color_network;
        [0..a, a..b, b..b + self.hash_grid]
    }
}

impl Default for ParameterLayout {
    fn default() -> Self {
        Self::from_network(&NetworkConfig::default())
    }
}

/// Decoded parameters, split into named segments.
#[derive(Debug, Clone)]
pub struct ParameterSegments {
    data: Vec<f32>,
    layout: ParameterLayout,
}

impl ParameterSegments {
    /// Split a flat decoded buffer. Its length must equal the layout total.
    pub fn split(data: Vec<f32>, layout: ParameterLayout) -> Result<Self> {
        if data.len() != layout.total() {
            return Err(Error::format(format!(
                "parameter buffer holds {} values, expected {} ({} density + {} color + {} grid)",
                data.len(),
                layout.total(),
                layout.density_network,
                layout.color_network,
                layout.hash_grid
            )));
        }
        Ok(Self { data, layout })
    }

    #[inline]
    pub fn layout(&self) -> &ParameterLayout {
        &self.layout
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Weights of the density network.
    pub fn density_network(&self) -> &[f32] {
        &self.data[self.layout.ranges()[0].clone()]
    }

    /// Weights of the color network.
    pub fn color_network(&self) -> &[f32] {
        &self.data[self.layout.ranges()[1].clone()]
    }

    /// Hash grid feature table.
    pub fn hash_grid(&self) -> &[f32] {
        &self.data[self.layout.ranges()[2].clone()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout() {
        let layout = ParameterLayout::default();
        assert_eq!(layout.density_network, 3072);
        assert_eq!(layout.color_network, 7168);
        assert_eq!(layout.hash_grid, 12_196_240);
        assert_eq!(layout.total(), 12_206_480);
    }

    #[test]
    fn test_split() {
        let layout = ParameterLayout { density_network: 2, color_network: 3, hash_grid: 1 };
        let seg = ParameterSegments::split(vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0], layout).unwrap();
        assert_eq!(seg.density_network(), &[0.0, 1.0]);
        assert_eq!(seg.color_network(), &[2.0, 3.0, 4.0]);
        assert_eq!(seg.hash_grid(), &[5.0]);
    }

    #[test]
    fn test_split_mismatch() {
        let layout = ParameterLayout { density_network: 2, color_network: 3, hash_grid: 1 };
        let err = ParameterSegments::split(vec![0.0; 5], layout).unwrap_err();
        assert!(matches!(err, Error::Format(_)));
        assert!(ParameterSegments::split(vec![0.0; 7], layout).is_err());
    }
}
