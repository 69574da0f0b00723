//! Raw 128³ occupancy volume in Morton order.

use crate::config::DENSITY_GRID_SIDE;
use crate::util::{Error, Result};

use super::format::DENSITY_THRESHOLD;

/// Number of cells in the raw density volume.
pub const DENSITY_GRID_CELLS: usize = DENSITY_GRID_SIDE * DENSITY_GRID_SIDE * DENSITY_GRID_SIDE;

/// Binary occupancy of the 128³ density grid, indexed by Morton code.
#[derive(Clone, PartialEq, Eq)]
pub struct RawDensityVolume {
    cells: Vec<bool>,
}

impl RawDensityVolume {
    /// An all-empty volume.
    pub fn empty() -> Self {
        Self { cells: vec![false; DENSITY_GRID_CELLS] }
    }

    /// Threshold decoded density samples: a cell is occupied when the sample,
    /// clamped to [0, 1], exceeds [`DENSITY_THRESHOLD`].
    pub fn from_densities(densities: &[f32]) -> Result<Self> {
        if densities.len() != DENSITY_GRID_CELLS {
            return Err(Error::format(format!(
                "density grid holds {} samples, expected {} (128^3)",
                densities.len(),
                DENSITY_GRID_CELLS
            )));
        }
        // NaN fails the comparison and stays empty.
        let cells = densities
            .iter()
            .map(|&d| d.clamp(0.0, 1.0) > DENSITY_THRESHOLD)
            .collect();
        Ok(Self { cells })
    }

    /// Occupancy of the cell at a Morton index.
    #[inline]
    pub fn get(&self, morton_index: usize) -> bool {
        self.cells[morton_index]
    }

    #[inline]
    pub fn set(&mut self, morton_index: usize, occupied: bool) {
        self.cells[morton_index] = occupied;
    }

    /// Cells in Morton order.
    #[inline]
    pub fn cells(&self) -> &[bool] {
        &self.cells
    }

    pub fn occupied_count(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }
}

impl std::fmt::Debug for RawDensityVolume {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RawDensityVolume({} / {} occupied)", self.occupied_count(), self.cells.len())
    }
}
