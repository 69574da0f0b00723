//! Multiresolution hash grid encoding.

use crate::config::{HashEncodingConfig, HashLevel};
use crate::util::{Error, Result, Vec3};

/// Primes of the spatial hash, one per axis.
const HASH_PRIMES: [u32; 3] = [1, 2_654_435_761, 805_459_861];

/// Trainable feature table indexed per level by grid vertex.
///
/// Table layout is `[level][entry][feature]`, levels packed back to back.
#[derive(Debug, Clone)]
pub struct HashGrid {
    levels: Vec<HashLevel>,
    features_per_level: usize,
    table: Vec<f32>,
}

impl HashGrid {
    pub fn new(config: &HashEncodingConfig, table: &[f32]) -> Result<Self> {
        let expected = config.param_count();
        if table.len() != expected {
            return Err(Error::format(format!(
                "hash grid table holds {} values, expected {}",
                table.len(),
                expected
            )));
        }
        Ok(Self {
            levels: config.levels(),
            features_per_level: config.n_features_per_level as usize,
            table: table.to_vec(),
        })
    }

    /// Width of the encoding written by [`Self::encode`].
    #[inline]
    pub fn output_dims(&self) -> usize {
        self.levels.len() * self.features_per_level
    }

    #[inline]
    pub fn levels(&self) -> &[HashLevel] {
        &self.levels
    }

    /// Encode a position in [0, 1]³ into `out` (level-major).
    ///
    /// Positions outside the unit cube are clamped onto it.
    pub fn encode(&self, position: Vec3, out: &mut [f32]) {
        debug_assert!(out.len() >= self.output_dims());
        let x = position.clamp(Vec3::ZERO, Vec3::ONE);
        let f = self.features_per_level;

        for (l, level) in self.levels.iter().enumerate() {
            let pos = x * level.scale + Vec3::splat(0.5);
            let floor = pos.floor();
            let frac = pos - floor;
            let grid = [floor.x as u32, floor.y as u32, floor.z as u32];
            let frac = [frac.x, frac.y, frac.z];

            let acc = &mut out[l * f..(l + 1) * f];
            acc.fill(0.0);
            for corner in 0..8u32 {
                let mut weight = 1.0;
                let mut vertex = [0u32; 3];
                for dim in 0..3 {
                    if (corner >> dim) & 1 == 1 {
                        weight *= frac[dim];
                        vertex[dim] = grid[dim] + 1;
                    } else {
                        weight *= 1.0 - frac[dim];
                        vertex[dim] = grid[dim];
                    }
                }
                let entry = level.offset + grid_index(level, vertex);
                let features = &self.table[entry * f..(entry + 1) * f];
                for (a, v) in acc.iter_mut().zip(features) {
                    *a += weight * v;
                }
            }
        }
    }
}

/// Entry of `vertex` within its level: dense indexing while the level fits,
/// the xor-prime hash otherwise.
#[inline]
fn grid_index(level: &HashLevel, vertex: [u32; 3]) -> usize {
    let index = if level.hashed {
        vertex
            .iter()
            .zip(HASH_PRIMES)
            .fold(0u32, |h, (&v, prime)| h ^ v.wrapping_mul(prime))
    } else {
        let res = level.resolution;
        vertex[0]
            .wrapping_add(vertex[1].wrapping_mul(res))
            .wrapping_add(vertex[2].wrapping_mul(res.wrapping_mul(res)))
    };
    index as usize % level.size
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> HashEncodingConfig {
        HashEncodingConfig {
            n_levels: 2,
            n_features_per_level: 2,
            log2_hashmap_size: 8,
            base_resolution: 4,
            per_level_scale: 2.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_small_levels() {
        let levels = small_config().levels();
        // scale 3 → 4³ = 64 dense entries; scale 7 → 8³ = 512 hashed into 256
        assert_eq!(levels[0].resolution, 4);
        assert_eq!(levels[0].size, 64);
        assert!(!levels[0].hashed);
        assert_eq!(levels[1].resolution, 8);
        assert_eq!(levels[1].size, 256);
        assert!(levels[1].hashed);
        assert_eq!(small_config().param_count(), (64 + 256) * 2);
    }

    #[test]
    fn test_wrong_table_size() {
        assert!(matches!(HashGrid::new(&small_config(), &[0.0; 3]), Err(Error::Format(_))));
    }

    #[test]
    fn test_constant_table_interpolates_to_constant() {
        let config = small_config();
        let table: Vec<f32> = (0..config.param_count())
            .map(|i| if i % 2 == 0 { 1.0 } else { -2.0 })
            .collect();
        let grid = HashGrid::new(&config, &table).unwrap();
        let mut out = [0.0f32; 4];
        for p in [Vec3::ZERO, Vec3::splat(0.37), Vec3::new(0.9, 0.1, 0.5), Vec3::splat(4.0)] {
            grid.encode(p, &mut out);
            for pair in out.chunks(2) {
                assert!((pair[0] - 1.0).abs() < 1e-5);
                assert!((pair[1] + 2.0).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn test_vertex_hit_exactly() {
        // At a vertex the encoding is that vertex's features.
        let config = small_config();
        let table: Vec<f32> = (0..config.param_count()).map(|i| i as f32).collect();
        let grid = HashGrid::new(&config, &table).unwrap();

        // Level 0: scale 3, pos = x*3 + 0.5; x = 1/6 gives pos = 1.0 exactly.
        let mut out = [0.0f32; 4];
        grid.encode(Vec3::new(1.0 / 6.0, 0.5 / 3.0, 0.5 / 3.0), &mut out);
        let entry = 1 + 4 + 16;
        assert!((out[0] - table[entry * 2]).abs() < 1e-3);
        assert!((out[1] - table[entry * 2 + 1]).abs() < 1e-3);
    }

    #[test]
    fn test_hash_index() {
        let level = HashLevel { scale: 7.0, resolution: 8, size: 256, offset: 0, hashed: true };
        let expected = (1u32 ^ 2u32.wrapping_mul(2_654_435_761) ^ 3u32.wrapping_mul(805_459_861)) as usize % 256;
        assert_eq!(grid_index(&level, [1, 2, 3]), expected);
    }
}
