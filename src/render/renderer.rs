//! Image orchestration: rays, probes, refinement, field calls, compositing.

use std::ops::{AddAssign, Range};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tracing::{debug, info, trace};

use super::camera::Camera;
use super::compositor::{PixelResult, VolumeCompositor};
use super::sampler::{DensitySampler, FineSamples};
use crate::config::RenderConfig;
use crate::field::FeatureField;
use crate::grid::OccupancyGrid;
use crate::util::{Error, Ray, Result, Vec3};

/// Counters gathered while rendering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Rays traced (one per pixel).
    pub rays: u64,
    /// Rays whose probes never hit an occupied cell.
    pub empty_rays: u64,
    /// Rays with at least one peak above the threshold.
    pub rays_with_peaks: u64,
    /// Fine samples evaluated in total.
    pub fine_samples: u64,
    /// Rays that lost peaks to the sample budget.
    pub truncated_rays: u64,
}

impl AddAssign for RenderStats {
    fn add_assign(&mut self, rhs: Self) {
        self.rays += rhs.rays;
        self.empty_rays += rhs.empty_rays;
        self.rays_with_peaks += rhs.rays_with_peaks;
        self.fine_samples += rhs.fine_samples;
        self.truncated_rays += rhs.truncated_rays;
    }
}

/// A finished image.
#[derive(Debug, Clone)]
pub struct RenderOutput {
    pub width: u32,
    pub height: u32,
    /// Row-major pixels.
    pub image: Vec<PixelResult>,
    /// Fine samples per pixel, row-major.
    pub sample_counts: Vec<u32>,
    pub stats: RenderStats,
}

struct RowOutput {
    pixels: Vec<PixelResult>,
    counts: Vec<u32>,
    stats: RenderStats,
}

/// Rays of one batch that produced fine samples.
struct Pending {
    column: usize,
    direction: Vec3,
    samples: Range<usize>,
}

/// Renders images from an occupancy grid and a feature field.
///
/// Grid and field are shared read-only; rows render in parallel.
pub struct Renderer {
    config: RenderConfig,
    grid: Arc<OccupancyGrid>,
    field: Arc<dyn FeatureField>,
    sampler: DensitySampler,
    compositor: VolumeCompositor,
    progress: bool,
}

impl Renderer {
    pub fn new(config: RenderConfig, grid: Arc<OccupancyGrid>, field: Arc<dyn FeatureField>) -> Result<Self> {
        config.validate()?;
        let sampler = DensitySampler::new(&config);
        let compositor = VolumeCompositor::from_config(&config);
        debug!(
            probes = config.probe_count,
            coarse_step = config.coarse_step(),
            fine_step = config.fine_step,
            threshold = config.threshold,
            "renderer configured"
        );
        Ok(Self { config, grid, field, sampler, compositor, progress: false })
    }

    /// Show a progress bar on stderr while rendering.
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    #[inline]
    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    #[inline]
    pub fn sampler(&self) -> &DensitySampler {
        &self.sampler
    }

    /// Occupancy of every coarse probe along `ray`.
    pub fn probe(&self, ray: &Ray) -> Vec<bool> {
        self.sampler
            .probe_distances()
            .iter()
            .map(|&t| self.grid.is_occupied(self.config.to_occupancy_frame(ray.at(t))))
            .collect()
    }

    /// Fine sample distances for one ray.
    pub fn refine(&self, ray: &Ray) -> FineSamples {
        self.sampler.refine(&self.probe(ray))
    }

    /// Trace a single ray on its own.
    pub fn trace_ray(&self, ray: &Ray) -> PixelResult {
        let samples = self.refine(ray);
        if samples.is_empty() {
            return PixelResult::ZERO;
        }
        let positions: Vec<Vec3> = samples
            .distances
            .iter()
            .map(|&t| self.config.to_field_frame(ray.at(t)))
            .collect();
        let features = self.field.density_features(&positions);
        self.shade(ray.direction, &features)
    }

    fn shade(&self, direction: Vec3, features: &[crate::field::Features]) -> PixelResult {
        let encoding = self.field.direction_encoding(direction);
        let densities: Vec<f32> = features.iter().map(|f| self.field.raw_density(f)).collect();
        let colors: Vec<[f32; 3]> = features.iter().map(|f| self.field.color(f, &encoding)).collect();
        self.compositor.composite(&densities, &colors)
    }

    /// Render one row with a single batched field call.
    fn render_row(&self, camera: &Camera, row: u32) -> RowOutput {
        let width = camera.width() as usize;
        let mut pixels = vec![PixelResult::ZERO; width];
        let mut counts = vec![0u32; width];
        let mut stats = RenderStats { rays: width as u64, ..Default::default() };

        let mut positions = Vec::new();
        let mut pending = Vec::new();
        for column in 0..width {
            let ray = camera.ray(column as u32, row);
            let occupied = self.probe(&ray);
            if !occupied.iter().any(|&o| o) {
                stats.empty_rays += 1;
                continue;
            }
            let samples = self.sampler.refine(&occupied);
            if samples.truncated {
                stats.truncated_rays += 1;
            }
            if samples.is_empty() {
                continue;
            }
            stats.rays_with_peaks += 1;
            stats.fine_samples += samples.len() as u64;
            counts[column] = samples.len() as u32;

            let start = positions.len();
            positions.extend(
                samples
                    .distances
                    .iter()
                    .map(|&t| self.config.to_field_frame(ray.at(t))),
            );
            pending.push(Pending { column, direction: ray.direction, samples: start..positions.len() });
        }

        if !positions.is_empty() {
            let features = self.field.density_features(&positions);
            for p in pending {
                pixels[p.column] = self.shade(p.direction, &features[p.samples]);
            }
        }
        trace!(row, samples = stats.fine_samples, "row done");
        RowOutput { pixels, counts, stats }
    }

    /// Render every pixel of `camera`.
    pub fn render(&self, camera: &Camera) -> Result<RenderOutput> {
        self.render_with_cancel(camera, &AtomicBool::new(false))
    }

    /// Render, checking `cancel` between rows. A cancelled render returns
    /// [`Error::Cancelled`] and discards partial rows.
    #[tracing::instrument(skip_all, fields(width = camera.width(), height = camera.height()))]
    pub fn render_with_cancel(&self, camera: &Camera, cancel: &AtomicBool) -> Result<RenderOutput> {
        let (width, height) = (camera.width(), camera.height());
        info!("Rendering {}x{} ({} rays)", width, height, camera.pixel_count());
        let start = Instant::now();

        let bar = self.progress_bar(height as u64);
        let rows: Vec<Option<RowOutput>> = (0..height)
            .into_par_iter()
            .map(|row| {
                if cancel.load(Ordering::Relaxed) {
                    return None;
                }
                let out = self.render_row(camera, row);
                bar.inc(1);
                Some(out)
            })
            .collect();

        if cancel.load(Ordering::Relaxed) || rows.iter().any(Option::is_none) {
            bar.abandon_with_message("cancelled");
            info!("Render cancelled");
            return Err(Error::Cancelled);
        }
        bar.finish_and_clear();

        let mut image = Vec::with_capacity(camera.pixel_count());
        let mut sample_counts = Vec::with_capacity(camera.pixel_count());
        let mut stats = RenderStats::default();
        for row in rows.into_iter().flatten() {
            image.extend(row.pixels);
            sample_counts.extend(row.counts);
            stats += row.stats;
        }

        info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            empty_rays = stats.empty_rays,
            rays_with_peaks = stats.rays_with_peaks,
            fine_samples = stats.fine_samples,
            truncated_rays = stats.truncated_rays,
            "Render finished"
        );
        Ok(RenderOutput { width, height, image, sample_counts, stats })
    }

    fn progress_bar(&self, rows: u64) -> ProgressBar {
        if !self.progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(rows);
        if let Ok(style) = ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} rows {msg}",
        ) {
            bar.set_style(style.progress_chars("#>-"));
        }
        bar
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{DirectionEncoding, Features};
    use crate::util::Mat4;

    /// Uniform density and color everywhere.
    struct ConstantField {
        density: f32,
        color: [f32; 3],
    }

    impl FeatureField for ConstantField {
        fn density_features(&self, positions: &[Vec3]) -> Vec<Features> {
            let mut f = [0.0; 16];
            f[0] = self.density;
            vec![f; positions.len()]
        }

        fn direction_encoding(&self, _direction: Vec3) -> DirectionEncoding {
            [0.0; 16]
        }

        fn color(&self, _features: &Features, _encoding: &DirectionEncoding) -> [f32; 3] {
            self.color
        }
    }

    fn renderer(grid: OccupancyGrid) -> Renderer {
        let field = Arc::new(ConstantField { density: 4.0, color: [2.0, 0.0, -2.0] });
        Renderer::new(RenderConfig::default(), Arc::new(grid), field).unwrap()
    }

    fn camera(size: u32) -> Camera {
        let c2w = Mat4::from_cols_array_2d(&[
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 4.0, 1.0],
        ]);
        Camera::new(size, size, 0.69, c2w, 0.33).unwrap()
    }

    #[test]
    fn test_empty_grid_renders_black() {
        let grid = OccupancyGrid::from_cells(vec![false; 64 * 64 * 64], RenderConfig::default().aabb).unwrap();
        let out = renderer(grid).render(&camera(8)).unwrap();
        assert_eq!(out.image.len(), 64);
        assert!(out.image.iter().all(|p| *p == PixelResult::ZERO));
        assert_eq!(out.stats.rays, 64);
        assert_eq!(out.stats.empty_rays, 64);
        assert_eq!(out.stats.fine_samples, 0);
    }

    #[test]
    fn test_matches_per_ray_trace() {
        let r = renderer(OccupancyGrid::full(RenderConfig::default().aabb));
        let cam = camera(6);
        let out = r.render(&cam).unwrap();
        for j in 0..6 {
            for i in 0..6 {
                let expected = r.trace_ray(&cam.ray(i, j));
                let got = out.image[(j * 6 + i) as usize];
                assert_eq!(got, expected, "pixel ({}, {})", i, j);
            }
        }
        assert!(out.stats.rays_with_peaks > 0);
        assert_eq!(
            out.stats.fine_samples,
            out.sample_counts.iter().map(|&c| c as u64).sum::<u64>()
        );
    }

    #[test]
    fn test_cancelled_render() {
        let r = renderer(OccupancyGrid::full(RenderConfig::default().aabb));
        let cancel = AtomicBool::new(true);
        assert!(matches!(r.render_with_cancel(&camera(4), &cancel), Err(Error::Cancelled)));
    }

    #[test]
    fn test_rejects_invalid_config() {
        let field = Arc::new(ConstantField { density: 0.0, color: [0.0; 3] });
        let grid = Arc::new(OccupancyGrid::full(RenderConfig::default().aabb));
        let config = RenderConfig::default().with_probe_count(1);
        assert!(matches!(Renderer::new(config, grid, field), Err(Error::Config(_))));
    }
}
