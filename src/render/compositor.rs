//! Front-to-back volumetric compositing.

use bytemuck::{Pod, Zeroable};

use crate::config::{Activation, RenderConfig};

/// Accumulated color and opacity of one pixel.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct PixelResult {
    pub color: [f32; 3],
    pub opacity: f32,
}

impl PixelResult {
    pub const ZERO: Self = Self { color: [0.0; 3], opacity: 0.0 };
}

/// Maps raw densities to absorption coefficients.
pub const DENSITY_ACTIVATION: Activation = Activation::Exponential;

/// Maps raw colors to [0, 1].
pub const COLOR_ACTIVATION: Activation = Activation::Sigmoid;

/// Alpha-composites ordered samples taken at a constant step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeCompositor {
    step: f32,
    transmittance_epsilon: f32,
}

impl VolumeCompositor {
    pub fn new(step: f32, transmittance_epsilon: f32) -> Self {
        Self { step, transmittance_epsilon }
    }

    pub fn from_config(config: &RenderConfig) -> Self {
        Self::new(config.fine_step, config.transmittance_epsilon)
    }

    #[inline]
    pub fn step(&self) -> f32 {
        self.step
    }

    /// Composite raw (pre-activation) samples in ascending distance order.
    ///
    /// Stops once transmittance falls below the epsilon. Empty input gives
    /// [`PixelResult::ZERO`].
    pub fn composite(&self, raw_densities: &[f32], raw_colors: &[[f32; 3]]) -> PixelResult {
        debug_assert_eq!(raw_densities.len(), raw_colors.len());
        let mut color = [0.0f32; 3];
        let mut transmittance = 1.0f32;

        for (&density, rgb) in raw_densities.iter().zip(raw_colors) {
            let sigma = DENSITY_ACTIVATION.apply(density);
            let alpha = 1.0 - (-sigma * self.step).exp();
            let weight = alpha * transmittance;
            for (acc, &c) in color.iter_mut().zip(rgb) {
                *acc += weight * COLOR_ACTIVATION.apply(c);
            }
            transmittance *= 1.0 - alpha;
            if transmittance < self.transmittance_epsilon {
                break;
            }
        }

        PixelResult { color, opacity: 1.0 - transmittance }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SQRT3;

    fn compositor() -> VolumeCompositor {
        VolumeCompositor::new(SQRT3 / 1024.0, 1e-4)
    }

    #[test]
    fn test_empty_is_zero() {
        assert_eq!(compositor().composite(&[], &[]), PixelResult::ZERO);
    }

    #[test]
    fn test_transparent_samples() {
        // Zero density means zero activated density; exp(-100) is as close as a raw value gets
        let out = compositor().composite(&[-100.0; 8], &[[5.0; 3]; 8]);
        assert!(out.opacity < 1e-6);
        assert!(out.color.iter().all(|&c| c < 1e-6));
    }

    #[test]
    fn test_raw_zero_density_is_not_transparent() {
        assert_eq!(DENSITY_ACTIVATION.apply(0.0), 1.0);
        let c = compositor();
        let out = c.composite(&[0.0; 8], &[[0.0; 3]; 8]);
        let expected = 1.0 - (-8.0 * c.step()).exp();
        assert!((out.opacity - expected).abs() < 1e-5);
    }

    #[test]
    fn test_single_sample() {
        let c = compositor();
        let out = c.composite(&[2.0], &[[0.0, 100.0, -100.0]]);
        let alpha = 1.0 - (-(2.0f32.exp()) * c.step()).exp();
        assert!((out.opacity - alpha).abs() < 1e-6);
        assert!((out.color[0] - 0.5 * alpha).abs() < 1e-6);
        assert!((out.color[1] - alpha).abs() < 1e-6);
        assert!(out.color[2].abs() < 1e-6);
    }

    #[test]
    fn test_opacity_grows_with_sample_count() {
        let c = compositor();
        let mut previous = 0.0;
        for n in 1..=64 {
            let out = c.composite(&vec![3.0; n], &vec![[0.0; 3]; n]);
            assert!(out.opacity > previous, "n = {}", n);
            assert!(out.opacity <= 1.0);
            previous = out.opacity;
        }
    }

    #[test]
    fn test_early_exit_within_tolerance() {
        let exact = VolumeCompositor::new(0.01, 0.0);
        let fast = VolumeCompositor::new(0.01, 1e-4);
        let densities = vec![8.0; 200];
        let colors = vec![[1.0, -1.0, 0.5]; 200];
        let a = exact.composite(&densities, &colors);
        let b = fast.composite(&densities, &colors);
        assert!((a.opacity - b.opacity).abs() < 1e-3);
        for (x, y) in a.color.iter().zip(&b.color) {
            assert!((x - y).abs() < 1e-3);
        }
    }

    #[test]
    fn test_pixel_is_pod() {
        let px = [PixelResult { color: [1.0, 2.0, 3.0], opacity: 4.0 }];
        let floats: &[f32] = bytemuck::cast_slice(&px);
        assert_eq!(floats, &[1.0, 2.0, 3.0, 4.0]);
    }
}
