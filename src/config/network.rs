//! Feature field hyperparameters.
//!
//! Mirrors the tiny-cuda-nn style config file the snapshot was trained
//! with: a hash grid encoding feeding a density MLP, a spherical harmonics
//! direction encoding, and a color MLP over both.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::util::{Error, Result};

/// Output width of the density network; lane 0 is the density logit.
pub const DENSITY_OUTPUT_DIMS: usize = 16;

/// Output width of the color network.
pub const COLOR_OUTPUT_DIMS: usize = 3;

/// Fully fused MLPs pad input and output widths to this many lanes.
pub const MLP_LANE_WIDTH: usize = 16;

/// Round `n` up to the next multiple of `m`.
#[inline]
pub const fn next_multiple(n: usize, m: usize) -> usize {
    n.div_ceil(m) * m
}

/// Activation function of an MLP layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Activation {
    #[default]
    None,
    ReLU,
    Sigmoid,
    Exponential,
}

impl Activation {
    #[inline]
    pub fn apply(self, x: f32) -> f32 {
        match self {
            Self::None => x,
            Self::ReLU => x.max(0.0),
            Self::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            Self::Exponential => x.exp(),
        }
    }
}

/// Multiresolution hash grid encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HashEncodingConfig {
    #[serde(default = "default_hash_otype")]
    pub otype: String,
    pub n_levels: u32,
    pub n_features_per_level: u32,
    pub log2_hashmap_size: u32,
    pub base_resolution: u32,
    pub per_level_scale: f32,
}

fn default_hash_otype() -> String {
    "HashGrid".to_string()
}

impl Default for HashEncodingConfig {
    fn default() -> Self {
        Self {
            otype: default_hash_otype(),
            n_levels: 16,
            n_features_per_level: 2,
            log2_hashmap_size: 19,
            base_resolution: 16,
            per_level_scale: 1.381_912_879_9,
        }
    }
}

/// Geometry of one hash grid level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HashLevel {
    /// Continuous scale applied to positions in [0, 1].
    pub scale: f32,
    /// Grid vertices per axis.
    pub resolution: u32,
    /// Table entries (not features) in this level.
    pub size: usize,
    /// First entry of this level in the full table.
    pub offset: usize,
    /// True if the level is too large for dense indexing.
    pub hashed: bool,
}

impl HashEncodingConfig {
    /// Width of the encoded vector.
    #[inline]
    pub fn output_dims(&self) -> usize {
        (self.n_levels * self.n_features_per_level) as usize
    }

    /// Per-level layout, in table order.
    pub fn levels(&self) -> Vec<HashLevel> {
        let log2_scale = self.per_level_scale.log2();
        let table_size = 1usize << self.log2_hashmap_size;
        let mut offset = 0;
        (0..self.n_levels)
            .map(|level| {
                let scale = (level as f32 * log2_scale).exp2() * self.base_resolution as f32 - 1.0;
                let resolution = scale.ceil() as u32 + 1;
                let dense = (resolution as usize).pow(3);
                let size = next_multiple(dense, 8).min(table_size);
                let info = HashLevel {
                    scale,
                    resolution,
                    size,
                    offset,
                    hashed: dense > size,
                };
                offset += size;
                info
            })
            .collect()
    }

    /// Number of parameters (table entries times features).
    pub fn param_count(&self) -> usize {
        let entries: usize = self.levels().iter().map(|l| l.size).sum();
        entries * self.n_features_per_level as usize
    }
}

/// Fully fused MLP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MlpConfig {
    #[serde(default = "default_mlp_otype")]
    pub otype: String,
    #[serde(default = "default_hidden_activation")]
    pub activation: Activation,
    #[serde(default)]
    pub output_activation: Activation,
    pub n_neurons: usize,
    pub n_hidden_layers: usize,
}

fn default_mlp_otype() -> String {
    "FullyFusedMLP".to_string()
}

fn default_hidden_activation() -> Activation {
    Activation::ReLU
}

impl MlpConfig {
    fn new(n_hidden_layers: usize) -> Self {
        Self {
            otype: default_mlp_otype(),
            activation: Activation::ReLU,
            output_activation: Activation::None,
            n_neurons: 64,
            n_hidden_layers,
        }
    }

    /// `(out, in)` shape of every weight matrix, with padded widths.
    pub fn layer_shapes(&self, input_dims: usize, output_dims: usize) -> Vec<(usize, usize)> {
        let input = next_multiple(input_dims, MLP_LANE_WIDTH);
        let output = next_multiple(output_dims, MLP_LANE_WIDTH);
        if self.n_hidden_layers == 0 {
            return vec![(output, input)];
        }
        let mut shapes = vec![(self.n_neurons, input)];
        for _ in 1..self.n_hidden_layers {
            shapes.push((self.n_neurons, self.n_neurons));
        }
        shapes.push((output, self.n_neurons));
        shapes
    }

    pub fn param_count(&self, input_dims: usize, output_dims: usize) -> usize {
        self.layer_shapes(input_dims, output_dims)
            .iter()
            .map(|(o, i)| o * i)
            .sum()
    }
}

/// Spherical harmonics direction encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShEncodingConfig {
    #[serde(default = "default_sh_otype")]
    pub otype: String,
    pub degree: u32,
}

fn default_sh_otype() -> String {
    "SphericalHarmonics".to_string()
}

impl Default for ShEncodingConfig {
    fn default() -> Self {
        Self { otype: default_sh_otype(), degree: 4 }
    }
}

impl ShEncodingConfig {
    #[inline]
    pub fn output_dims(&self) -> usize {
        (self.degree * self.degree) as usize
    }
}

/// The whole hyperparameter file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(rename = "HashEnc")]
    pub hash_encoding: HashEncodingConfig,
    #[serde(rename = "HashNet")]
    pub density_network: MlpConfig,
    #[serde(rename = "SHEnc")]
    pub direction_encoding: ShEncodingConfig,
    #[serde(rename = "RGBNet")]
    pub color_network: MlpConfig,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            hash_encoding: HashEncodingConfig::default(),
            density_network: MlpConfig::new(1),
            direction_encoding: ShEncodingConfig::default(),
            color_network: MlpConfig::new(2),
        }
    }
}

impl NetworkConfig {
    /// Load and validate a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::from_open(path, e))?;
        let config = Self::from_json(&text).map_err(|e| match e {
            Error::Format(msg) => Error::format(format!("{}: {}", path.display(), msg)),
            other => other,
        })?;
        debug!(
            levels = config.hash_encoding.n_levels,
            log2_hashmap_size = config.hash_encoding.log2_hashmap_size,
            "loaded network config"
        );
        Ok(config)
    }

    /// Parse and validate a JSON document.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text).map_err(|e| Error::format(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Input width of the color network: density features then SH lanes.
    #[inline]
    pub fn color_input_dims(&self) -> usize {
        DENSITY_OUTPUT_DIMS + self.direction_encoding.output_dims()
    }

    pub fn validate(&self) -> Result<()> {
        let enc = &self.hash_encoding;
        if enc.otype != "HashGrid" {
            return Err(Error::config(format!("unsupported encoding '{}'", enc.otype)));
        }
        if enc.n_levels == 0 || enc.n_features_per_level == 0 {
            return Err(Error::config("hash grid needs at least one level and feature"));
        }
        if !(1..=30).contains(&enc.log2_hashmap_size) {
            return Err(Error::config(format!(
                "log2_hashmap_size {} out of range",
                enc.log2_hashmap_size
            )));
        }
        if enc.base_resolution < 2 || !(enc.per_level_scale >= 1.0) {
            return Err(Error::config("hash grid base resolution/scale out of range"));
        }
        let degree = self.direction_encoding.degree;
        if !(1..=4).contains(&degree) {
            return Err(Error::config(format!("SH degree {} unsupported (1..=4)", degree)));
        }
        for (name, mlp) in [("HashNet", &self.density_network), ("RGBNet", &self.color_network)] {
            if mlp.n_neurons == 0 || mlp.n_neurons % MLP_LANE_WIDTH != 0 {
                return Err(Error::config(format!(
                    "{}: n_neurons must be a positive multiple of {} (got {})",
                    name, MLP_LANE_WIDTH, mlp.n_neurons
                )));
            }
        }
        Ok(())
    }
}
