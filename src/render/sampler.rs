//! Adaptive probe-then-refine sampling along a ray.
//!
//! Coarse occupancy probes are smoothed into a density curve; probes whose
//! score exceeds the threshold become peaks, and each peak is expanded into
//! a window of closely spaced fine samples.

use smallvec::SmallVec;
use tracing::trace;

use crate::config::RenderConfig;

/// Peak probe indices of one ray, ascending.
pub type Peaks = SmallVec<[usize; 16]>;

/// Fine sample distances of one ray.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FineSamples {
    /// Strictly increasing distances along the ray.
    pub distances: Vec<f32>,
    /// True if peaks were dropped to respect the sample budget.
    pub truncated: bool,
}

impl FineSamples {
    #[inline]
    pub fn len(&self) -> usize {
        self.distances.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.distances.is_empty()
    }
}

/// Normal density sampled at `count` points centered on `count / 2`.
pub fn smoothing_kernel(count: usize, sigma: f32) -> Vec<f32> {
    let center = (count / 2) as f32;
    let norm = 1.0 / (sigma * (2.0 * std::f32::consts::PI).sqrt());
    (0..count)
        .map(|m| {
            let x = m as f32 - center;
            norm * (-(x * x) / (2.0 * sigma * sigma)).exp()
        })
        .collect()
}

/// Probe indices whose score strictly exceeds `threshold`, ascending.
pub fn select_peaks(curve: &[f32], threshold: f32) -> Peaks {
    curve
        .iter()
        .enumerate()
        .filter(|(_, &score)| score > threshold)
        .map(|(i, _)| i)
        .collect()
}

/// Turns a ray's coarse occupancy probes into fine sample distances.
///
/// Built once per render from a [`RenderConfig`]; stateless per ray.
#[derive(Debug, Clone)]
pub struct DensitySampler {
    distances: Vec<f32>,
    kernel: Vec<f32>,
    coarse_step: f32,
    fine_step: f32,
    threshold: f32,
    max_fine_samples: usize,
}

impl DensitySampler {
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            distances: config.probe_distances(),
            kernel: smoothing_kernel(config.probe_count, config.smoothing_sigma),
            // A window never needs to be wider than the probed range.
            coarse_step: config.coarse_step().min(config.far - config.near),
            fine_step: config.fine_step,
            threshold: config.threshold,
            max_fine_samples: config.max_fine_samples,
        }
    }

    /// Distances of the coarse probes, shared by every ray.
    #[inline]
    pub fn probe_distances(&self) -> &[f32] {
        &self.distances
    }

    #[inline]
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Smooth the occupancy sequence: 'same'-aligned convolution with the
    /// kernel, so an isolated hit at probe `m` scores `kernel[center]` at `m`.
    pub fn density_curve(&self, occupied: &[bool]) -> Vec<f32> {
        let n = occupied.len();
        let center = (self.kernel.len() / 2) as isize;
        let mut curve = vec![0.0f32; n];
        for m in occupied.iter().enumerate().filter(|(_, &o)| o).map(|(m, _)| m as isize) {
            for (i, score) in curve.iter_mut().enumerate() {
                let q = i as isize - m + center;
                if let Some(&k) = usize::try_from(q).ok().and_then(|q| self.kernel.get(q)) {
                    *score += k;
                }
            }
        }
        curve
    }

    /// Peaks of a density curve at this sampler's threshold.
    #[inline]
    pub fn peaks(&self, curve: &[f32]) -> Peaks {
        select_peaks(curve, self.threshold)
    }

    /// Fine samples in `[t - coarse/2, t + coarse/2)` for one peak distance.
    fn window(&self, t: f32) -> impl Iterator<Item = f32> + '_ {
        let lo = t - 0.5 * self.coarse_step;
        let hi = t + 0.5 * self.coarse_step;
        (0..)
            .map(move |k| lo + k as f32 * self.fine_step)
            .take_while(move |&s| s < hi)
    }

    /// Upper bound of samples one window yields.
    #[inline]
    fn window_len(&self) -> usize {
        ((self.coarse_step / self.fine_step).ceil() as usize).saturating_add(1)
    }

    /// Full pipeline for one ray: curve, peaks, windows, budget.
    ///
    /// An all-empty probe sequence returns immediately without smoothing.
    pub fn refine(&self, occupied: &[bool]) -> FineSamples {
        debug_assert_eq!(occupied.len(), self.distances.len());
        if !occupied.iter().any(|&o| o) {
            return FineSamples::default();
        }

        let curve = self.density_curve(occupied);
        let mut peaks = self.peaks(&curve);
        if peaks.is_empty() {
            return FineSamples::default();
        }

        let truncated = self.apply_budget(&mut peaks, &curve);

        let capacity = peaks.len().saturating_mul(self.window_len());
        let mut distances = Vec::with_capacity(capacity.min(self.max_fine_samples));
        'peaks: for &p in &peaks {
            for s in self.window(self.distances[p]) {
                if distances.len() == self.max_fine_samples {
                    break 'peaks;
                }
                if distances.last().is_some_and(|&last| s <= last) {
                    continue;
                }
                distances.push(s);
            }
        }

        trace!(peaks = peaks.len(), samples = distances.len(), truncated, "refined ray");
        FineSamples { distances, truncated }
    }

    /// Drop the lowest-scoring peaks until the expansion fits the budget.
    /// Ties keep the nearer peak. Survivors stay in ascending order.
    fn apply_budget(&self, peaks: &mut Peaks, curve: &[f32]) -> bool {
        let per_window = self.window_len();
        if peaks.len().saturating_mul(per_window) <= self.max_fine_samples {
            return false;
        }
        let keep = (self.max_fine_samples / per_window).max(1);

        let mut ranked = peaks.clone();
        ranked.sort_by(|&a, &b| curve[b].total_cmp(&curve[a]).then(a.cmp(&b)));
        ranked.truncate(keep);
        ranked.sort_unstable();
        *peaks = ranked;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sampler() -> DensitySampler {
        DensitySampler::new(&RenderConfig::default())
    }

    fn hits(n: usize, at: &[usize]) -> Vec<bool> {
        let mut v = vec![false; n];
        for &i in at {
            v[i] = true;
        }
        v
    }

    fn assert_strictly_increasing(d: &[f32]) {
        assert!(d.windows(2).all(|w| w[0] < w[1]), "not increasing: {:?}", d);
    }

    #[test]
    fn test_kernel_shape() {
        let narrow = smoothing_kernel(256, 0.4);
        assert!(narrow[128] > 0.99 && 2.0 * narrow[127] < 0.2);

        let k = smoothing_kernel(256, 1.0);
        assert_eq!(k.len(), 256);
        let peak = 1.0 / (2.0 * std::f32::consts::PI).sqrt();
        assert!((k[128] - peak).abs() < 1e-6);
        assert_eq!(k[127], k[129]);
        assert!(k[0] < 1e-30);
    }

    #[test]
    fn test_empty_ray_short_circuits() {
        let s = sampler();
        let out = s.refine(&vec![false; 256]);
        assert!(out.is_empty());
        assert!(!out.truncated);
    }

    #[test]
    fn test_isolated_hit() {
        let s = sampler();
        let curve = s.density_curve(&hits(256, &[100]));
        // Only the hit itself clears 0.2
        assert!((curve[100] - 0.997_355_7).abs() < 1e-5);
        assert!(curve[99] < 0.05 && curve[101] < 0.05);
        assert_eq!(s.peaks(&curve).as_slice(), &[100]);

        let out = s.refine(&hits(256, &[100]));
        assert!(!out.is_empty());
        assert_strictly_increasing(&out.distances);
        let t = s.probe_distances()[100];
        let half = 0.5 * s.coarse_step;
        assert!(out.distances.iter().all(|&d| d >= t - half && d < t + half));
    }

    #[test]
    fn test_default_peaks_are_occupied_probes() {
        // Single hits, runs and one-probe gaps never promote an empty probe.
        let s = sampler();
        let at = [3, 10, 11, 12, 14, 16, 40, 42, 100, 101, 254, 255];
        let curve = s.density_curve(&hits(256, &at));
        assert_eq!(s.peaks(&curve).as_slice(), &at);
    }

    #[test]
    fn test_huge_coarse_step_is_bounded() {
        let config = RenderConfig {
            coarse_step: Some(1e30),
            max_fine_samples: 1000,
            ..RenderConfig::default()
        };
        let s = DensitySampler::new(&config);
        assert!(s.window_len() < 1024);

        let out = s.refine(&hits(256, &[20, 21, 200]));
        assert!(out.truncated);
        assert!(out.len() <= config.max_fine_samples);
        assert_strictly_increasing(&out.distances);
    }

    #[test]
    fn test_curve_at_sequence_edges() {
        let s = sampler();
        let curve = s.density_curve(&hits(256, &[0, 255]));
        assert_eq!(s.peaks(&curve).as_slice(), &[0, 255]);
    }

    #[test]
    fn test_window_contents() {
        let s = sampler();
        let t = 1.0;
        let w: Vec<f32> = s.window(t).collect();
        assert!(!w.is_empty());
        assert!(w.len() <= s.window_len());
        assert!((w[0] - (t - 0.5 * s.coarse_step)).abs() < 1e-6);
        assert!(w.iter().all(|&d| d < t + 0.5 * s.coarse_step));
        for pair in w.windows(2) {
            assert!((pair[1] - pair[0] - s.fine_step).abs() < 1e-5);
        }
    }

    #[test]
    fn test_threshold_monotonicity() {
        let s = sampler();
        let occupied = hits(256, &[10, 11, 12, 40, 41, 90, 200, 202, 204]);
        let curve = s.density_curve(&occupied);
        let thresholds = [0.0, 0.05, 0.1, 0.2, 0.3, 0.4, 0.5, 0.8, 1.0, 2.0];
        for pair in thresholds.windows(2) {
            let low = select_peaks(&curve, pair[0]);
            let high = select_peaks(&curve, pair[1]);
            assert!(high.iter().all(|p| low.contains(p)), "{:?} ⊄ {:?}", high, low);
        }
    }

    #[test]
    fn test_no_peaks_above_threshold() {
        let config = RenderConfig::default().with_threshold(1.0);
        let s = DensitySampler::new(&config);
        assert!(s.refine(&hits(256, &[70])).is_empty());
    }

    #[test]
    fn test_wide_coarse_step_stays_increasing() {
        let config = RenderConfig::default().with_coarse_step(crate::config::SQRT3 / 64.0);
        let s = DensitySampler::new(&config);
        let out = s.refine(&hits(256, &[50, 51, 52]));
        assert!(!out.is_empty());
        assert_strictly_increasing(&out.distances);
    }

    #[test]
    fn test_budget_keeps_highest_scores() {
        // Room for exactly two windows.
        let probe = DensitySampler::new(&RenderConfig::default());
        let budget = 2 * probe.window_len();
        let s = DensitySampler::new(&RenderConfig::default().with_max_fine_samples(budget));
        let occupied = hits(256, &[30, 31, 32, 120]);
        let curve = s.density_curve(&occupied);
        let all = s.peaks(&curve);
        assert!(all.len() > 2);

        let out = s.refine(&occupied);
        assert!(out.truncated);
        assert!(out.len() <= budget);
        assert_strictly_increasing(&out.distances);

        // The survivor windows are those of the two best probes.
        let mut ranked: Vec<usize> = all.to_vec();
        ranked.sort_by(|&a, &b| curve[b].total_cmp(&curve[a]).then(a.cmp(&b)));
        let best = ranked[0];
        let t = s.probe_distances()[best];
        assert!(out.distances.iter().any(|&d| (d - t).abs() < 0.5 * s.coarse_step));
    }

    #[test]
    fn test_budget_untouched_when_it_fits() {
        let s = sampler();
        let out = s.refine(&hits(256, &[5, 60, 61, 180]));
        assert!(!out.truncated);
        assert!(out.len() <= RenderConfig::default().max_fine_samples);
    }
}
