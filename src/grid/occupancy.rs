//! Coarse 64³ occupancy grid.

use morton::MortonIndexer;
use rayon::prelude::*;
use tracing::info;

use crate::config::{COARSE_GRID_SIDE, DENSITY_GRID_SIDE};
use crate::snapshot::RawDensityVolume;
use crate::util::{BBox3f, Error, Result, Vec3};

/// Offsets of the 8 fine children of a coarse cell, per axis.
pub const CORNER_OFFSETS: [[usize; 3]; 8] = [
    [0, 0, 0],
    [1, 0, 0],
    [0, 1, 0],
    [0, 0, 1],
    [1, 1, 0],
    [1, 0, 1],
    [0, 1, 1],
    [1, 1, 1],
];

/// Linear index strides of the coarse grid: (4096, 64, 1).
pub const COARSE_STRIDES: [usize; 3] = [COARSE_GRID_SIDE * COARSE_GRID_SIDE, COARSE_GRID_SIDE, 1];

const COARSE_CELLS: usize = COARSE_GRID_SIDE * COARSE_GRID_SIDE * COARSE_GRID_SIDE;

#[inline]
fn fine_index(x: usize, y: usize, z: usize) -> usize {
    (x * DENSITY_GRID_SIDE + y) * DENSITY_GRID_SIDE + z
}

/// Binary occupancy over a world-space box, in natural axis order.
///
/// Immutable once built; share it across threads behind an `Arc`.
#[derive(Clone)]
pub struct OccupancyGrid {
    cells: Vec<bool>,
    aabb: BBox3f,
}

impl OccupancyGrid {
    /// Un-swizzle the Morton-ordered raw volume and OR-downsample 2×2×2
    /// blocks: a coarse cell is occupied iff any of its 8 children is.
    #[tracing::instrument(skip_all)]
    pub fn from_raw(volume: &RawDensityVolume, aabb: BBox3f) -> Self {
        let morton = MortonIndexer::CUBE_128;
        let mut fine = vec![false; morton.len()];
        for (index, _) in volume.cells().iter().enumerate().filter(|(_, &occ)| occ) {
            let [x, y, z] = morton.to_coords(index as u32);
            fine[fine_index(x as usize, y as usize, z as usize)] = true;
        }

        let cells: Vec<bool> = (0..COARSE_CELLS)
            .into_par_iter()
            .map(|c| {
                let [i, j, k] = Self::cell_coords(c);
                CORNER_OFFSETS
                    .iter()
                    .any(|[dx, dy, dz]| fine[fine_index(2 * i + dx, 2 * j + dy, 2 * k + dz)])
            })
            .collect();

        let grid = Self { cells, aabb };
        info!(
            occupied = grid.occupied_count(),
            total = COARSE_CELLS,
            "Built occupancy grid"
        );
        grid
    }

    /// Build from explicit coarse cells in natural order.
    pub fn from_cells(cells: Vec<bool>, aabb: BBox3f) -> Result<Self> {
        if cells.len() != COARSE_CELLS {
            return Err(Error::format(format!(
                "occupancy grid needs {} cells, got {}",
                COARSE_CELLS,
                cells.len()
            )));
        }
        Ok(Self { cells, aabb })
    }

    /// Every cell occupied.
    pub fn full(aabb: BBox3f) -> Self {
        Self { cells: vec![true; COARSE_CELLS], aabb }
    }

    #[inline]
    pub fn aabb(&self) -> &BBox3f {
        &self.aabb
    }

    /// Coarse cells in natural order.
    #[inline]
    pub fn cells(&self) -> &[bool] {
        &self.cells
    }

    #[inline]
    pub fn cell(&self, i: usize, j: usize, k: usize) -> bool {
        self.cells[Self::linear_index(i, j, k)]
    }

    #[inline]
    pub fn linear_index(i: usize, j: usize, k: usize) -> usize {
        i * COARSE_STRIDES[0] + j * COARSE_STRIDES[1] + k * COARSE_STRIDES[2]
    }

    #[inline]
    pub fn cell_coords(index: usize) -> [usize; 3] {
        [
            index / COARSE_STRIDES[0],
            (index / COARSE_STRIDES[1]) % COARSE_GRID_SIDE,
            index % COARSE_GRID_SIDE,
        ]
    }

    pub fn occupied_count(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }

    /// Unmasked linear index of a point: `floor(normalized * 64)` per axis
    /// combined with the fixed strides. Points outside the box can land on
    /// an unrelated in-range cell, which is why [`Self::is_occupied`] masks.
    #[inline]
    pub fn raw_index(&self, p: Vec3) -> i64 {
        let cell = (self.aabb.normalize(p) * COARSE_GRID_SIDE as f32).floor();
        cell.x as i64 * COARSE_STRIDES[0] as i64
            + cell.y as i64 * COARSE_STRIDES[1] as i64
            + cell.z as i64 * COARSE_STRIDES[2] as i64
    }

    /// Occupancy of the cell containing `p`.
    ///
    /// Points outside the box (faces inclusive) are always unoccupied,
    /// whatever their raw index. A point on the max face maps to the last
    /// cell along that axis.
    #[inline]
    pub fn is_occupied(&self, p: Vec3) -> bool {
        if !self.aabb.contains(p) {
            return false;
        }
        let last = (COARSE_GRID_SIDE - 1) as f32;
        let cell = (self.aabb.normalize(p) * COARSE_GRID_SIDE as f32)
            .floor()
            .clamp(Vec3::ZERO, Vec3::splat(last));
        self.cell(cell.x as usize, cell.y as usize, cell.z as usize)
    }

    /// Batch query, one value per point.
    pub fn occupancy(&self, points: &[Vec3]) -> Vec<bool> {
        points.iter().map(|&p| self.is_occupied(p)).collect()
    }
}

impl std::fmt::Debug for OccupancyGrid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OccupancyGrid")
            .field("aabb", &self.aabb)
            .field("occupied", &self.occupied_count())
            .finish()
    }
}
