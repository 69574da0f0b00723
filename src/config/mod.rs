//! Render constants, network hyperparameters and scene metadata.
//!
//! - [`RenderConfig`] - every constant the sampling pipeline uses, gathered
//!   into one immutable value passed to constructors
//! - [`NetworkConfig`] - hash grid / MLP / SH hyperparameters (JSON)
//! - [`SceneMeta`] - camera field of view and poses (JSON)

mod network;
mod scene;

pub use network::*;
pub use scene::*;

use crate::util::{BBox3f, Error, Result, Vec3};

/// √3, the diagonal of the unit cube.
pub const SQRT3: f32 = 1.732_050_8;

/// Side of the raw density volume stored in snapshots.
pub const DENSITY_GRID_SIDE: usize = 128;

/// Side of the coarse occupancy grid.
pub const COARSE_GRID_SIDE: usize = DENSITY_GRID_SIDE / 2;

/// Constants of the probe-then-refine pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    /// First probe distance along each ray.
    pub near: f32,
    /// Last probe distance along each ray (inclusive).
    pub far: f32,
    /// Number of coarse occupancy probes per ray.
    pub probe_count: usize,
    /// Width of the refinement window around each peak. `None` uses the
    /// probe spacing.
    pub coarse_step: Option<f32>,
    /// Distance between fine samples inside a refinement window.
    pub fine_step: f32,
    /// Density curve score a probe must strictly exceed to become a peak.
    pub threshold: f32,
    /// Standard deviation of the smoothing kernel, in probes.
    pub smoothing_sigma: f32,
    /// Upper bound on fine samples per ray.
    pub max_fine_samples: usize,
    /// World-space box covered by the occupancy grid.
    pub aabb: BBox3f,
    /// Scale applied to a world point before the occupancy lookup.
    pub occupancy_scale: f32,
    /// Offset applied after scaling for the occupancy lookup.
    pub occupancy_offset: f32,
    /// Offset mapping a world point into the feature field's frame.
    pub field_offset: f32,
    /// Compositing stops once transmittance drops below this.
    pub transmittance_epsilon: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            near: 0.6,
            far: 2.0,
            probe_count: 256,
            coarse_step: None,
            fine_step: SQRT3 / 1024.0,
            threshold: 0.2,
            smoothing_sigma: 0.4,
            max_fine_samples: 4096,
            aabb: BBox3f::new(Vec3::splat(-0.5), Vec3::splat(1.5)),
            occupancy_scale: 2.0,
            occupancy_offset: 0.5,
            field_offset: 0.5,
            transmittance_epsilon: 1e-4,
        }
    }
}

impl RenderConfig {
    pub fn with_probe_count(mut self, count: usize) -> Self {
        self.probe_count = count;
        self
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_coarse_step(mut self, step: f32) -> Self {
        self.coarse_step = Some(step);
        self
    }

    pub fn with_max_fine_samples(mut self, max: usize) -> Self {
        self.max_fine_samples = max;
        self
    }

    pub fn with_bounds(mut self, near: f32, far: f32) -> Self {
        self.near = near;
        self.far = far;
        self
    }

    /// Spacing between consecutive probes.
    #[inline]
    pub fn probe_spacing(&self) -> f32 {
        if self.probe_count < 2 {
            return self.far - self.near;
        }
        (self.far - self.near) / (self.probe_count - 1) as f32
    }

    /// Width of the refinement window around each peak.
    #[inline]
    pub fn coarse_step(&self) -> f32 {
        self.coarse_step.unwrap_or_else(|| self.probe_spacing())
    }

    /// Probe distances, `probe_count` values from `near` to `far` inclusive.
    pub fn probe_distances(&self) -> Vec<f32> {
        let spacing = self.probe_spacing();
        (0..self.probe_count)
            .map(|i| self.near + spacing * i as f32)
            .collect()
    }

    /// Map a world-space point into the occupancy grid's frame.
    #[inline]
    pub fn to_occupancy_frame(&self, p: Vec3) -> Vec3 {
        p * self.occupancy_scale + Vec3::splat(self.occupancy_offset)
    }

    /// Map a world-space point into the feature field's frame.
    #[inline]
    pub fn to_field_frame(&self, p: Vec3) -> Vec3 {
        p + Vec3::splat(self.field_offset)
    }

    /// Check that every constant is in a usable range.
    pub fn validate(&self) -> Result<()> {
        if !(self.near.is_finite() && self.far.is_finite() && self.near < self.far) {
            return Err(Error::config(format!(
                "near/far bounds must be finite with near < far (got {} .. {})",
                self.near, self.far
            )));
        }
        if self.probe_count < 2 {
            return Err(Error::config(format!(
                "need at least 2 probes per ray (got {})",
                self.probe_count
            )));
        }
        if !(self.fine_step.is_finite() && self.fine_step > 0.0) {
            return Err(Error::config(format!("fine step must be positive (got {})", self.fine_step)));
        }
        if let Some(step) = self.coarse_step {
            if !(step.is_finite() && step > 0.0) {
                return Err(Error::config(format!("coarse step must be positive (got {})", step)));
            }
            if step > self.far - self.near {
                return Err(Error::config(format!(
                    "coarse step {} is wider than the probe range {} .. {}",
                    step, self.near, self.far
                )));
            }
        }
        if !(self.threshold.is_finite() && self.threshold >= 0.0) {
            return Err(Error::config(format!(
                "threshold must be finite and non-negative (got {})",
                self.threshold
            )));
        }
        if !(self.smoothing_sigma.is_finite() && self.smoothing_sigma > 0.0) {
            return Err(Error::config(format!(
                "smoothing sigma must be positive (got {})",
                self.smoothing_sigma
            )));
        }
        if self.max_fine_samples == 0 {
            return Err(Error::config("fine sample budget must be at least 1"));
        }
        if self.aabb.is_empty() {
            return Err(Error::config(format!("occupancy bounds are empty: {:?}", self.aabb)));
        }
        Ok(())
    }
}
