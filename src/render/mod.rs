//! Still image rendering.
//!
//! - [`Camera`] - one ray per pixel from a scene pose
//! - [`DensitySampler`] - coarse probes to fine sample distances
//! - [`VolumeCompositor`] - front-to-back alpha compositing
//! - [`Renderer`] - parallel per-row orchestration
//! - [`save_png`] / [`save_heatmap_png`] - image output

mod camera;
mod compositor;
mod image;
mod renderer;
mod sampler;

pub use self::image::{save_heatmap_png, save_png, to_rgb8};
pub use camera::*;
pub use compositor::*;
pub use renderer::*;
pub use sampler::*;
