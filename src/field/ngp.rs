//! CPU evaluation of a trained Instant-NGP field.

use smallvec::SmallVec;
use tracing::{debug, info};

use super::hash_grid::HashGrid;
use super::mlp::Mlp;
use super::sh::{sh_encode, SH_MAX_COEFFS};
use super::{DirectionEncoding, FeatureField, Features, FEATURE_DIMS};
use crate::config::{NetworkConfig, COLOR_OUTPUT_DIMS, DENSITY_OUTPUT_DIMS};
use crate::snapshot::ParameterSegments;
use crate::util::{Error, Result, Vec3};

/// Hash grid + density MLP + SH encoding + color MLP.
#[derive(Debug, Clone)]
pub struct NgpField {
    grid: HashGrid,
    density: Mlp,
    color: Mlp,
    sh_degree: u32,
    sh_dims: usize,
}

impl NgpField {
    /// Assemble the field from decoded snapshot parameters.
    #[tracing::instrument(skip_all)]
    pub fn new(params: &ParameterSegments, config: &NetworkConfig) -> Result<Self> {
        config.validate()?;
        let enc = &config.hash_encoding;

        let grid = HashGrid::new(enc, params.hash_grid())?;
        let density = Mlp::new(
            &config.density_network,
            enc.output_dims(),
            DENSITY_OUTPUT_DIMS,
            params.density_network(),
        )?;
        let color = Mlp::new(
            &config.color_network,
            config.color_input_dims(),
            COLOR_OUTPUT_DIMS,
            params.color_network(),
        )?;
        if density.output_dims() < FEATURE_DIMS {
            return Err(Error::config(format!(
                "density network emits {} lanes, need {}",
                density.output_dims(),
                FEATURE_DIMS
            )));
        }

        debug!(
            encoding = grid.output_dims(),
            hashed_levels = grid.levels().iter().filter(|l| l.hashed).count(),
            color_inputs = color.input_dims(),
            "field dimensions"
        );
        info!(params = params.len(), "Feature field ready");

        let sh_degree = config.direction_encoding.degree;
        Ok(Self {
            grid,
            density,
            color,
            sh_degree,
            sh_dims: config.direction_encoding.output_dims(),
        })
    }

    /// Density features of a single field-frame position.
    pub fn features_at(&self, position: Vec3) -> Features {
        let mut encoded: SmallVec<[f32; 64]> = SmallVec::from_elem(0.0, self.grid.output_dims());
        self.grid.encode(position, &mut encoded);
        let mut features = [0.0; FEATURE_DIMS];
        self.density.forward(&encoded, &mut features);
        features
    }
}

impl FeatureField for NgpField {
    fn density_features(&self, positions: &[Vec3]) -> Vec<Features> {
        positions.iter().map(|&p| self.features_at(p)).collect()
    }

    fn direction_encoding(&self, direction: Vec3) -> DirectionEncoding {
        let mut out = [0.0; SH_MAX_COEFFS];
        let d = direction.normalize_or_zero();
        sh_encode((d + Vec3::ONE) * 0.5, self.sh_degree, &mut out);
        out
    }

    fn color(&self, features: &Features, encoding: &DirectionEncoding) -> [f32; 3] {
        let mut input: SmallVec<[f32; 32]> = SmallVec::new();
        input.extend_from_slice(features);
        input.extend_from_slice(&encoding[..self.sh_dims]);
        let mut rgb = [0.0; 3];
        self.color.forward(&input, &mut rgb);
        rgb
    }
}
