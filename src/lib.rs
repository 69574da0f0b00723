//! # ngp-render
//!
//! Offline renderer for trained Instant-NGP radiance field snapshots.
//!
//! Rays are probed against a coarse occupancy grid; the hits are smoothed
//! into a density curve and only the regions around its peaks are sampled
//! finely and composited.
//!
//! ## Modules
//!
//! - [`util`] - Errors, half-precision decoding, math types
//! - [`config`] - Render constants, network hyperparameters, scene metadata
//! - [`snapshot`] - MessagePack snapshot decoding
//! - [`grid`] - Coarse occupancy grid
//! - [`field`] - Hash grid / MLP feature field
//! - [`render`] - Camera, sampler, compositor and the parallel renderer
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use ngp_render::prelude::*;
//!
//! let network = NetworkConfig::load("configs/base.json")?;
//! let snapshot = Snapshot::load("snapshots/ISCAData/lego.msgpack", &ParameterLayout::from_network(&network))?;
//! let config = RenderConfig::default();
//! let grid = OccupancyGrid::from_raw(&snapshot.density, config.aabb);
//! let field = NgpField::new(&snapshot.params, &network)?;
//!
//! let scene = SceneMeta::load("data/nerf_synthetic/lego/transforms_test.json")?;
//! let camera = Camera::from_scene(&scene, 0, 800, 800)?;
//! let output = Renderer::new(config, Arc::new(grid), Arc::new(field))?.render(&camera)?;
//! save_png("outputs/lego.png", output.width, output.height, &output.image)?;
//! ```

pub mod config;
pub mod field;
pub mod grid;
pub mod render;
pub mod snapshot;
pub mod util;

// Re-export commonly used types
pub use util::{Error, Result};
pub use morton::MortonIndexer;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{NetworkConfig, RenderConfig, SceneMeta};
    pub use crate::field::{FeatureField, NgpField};
    pub use crate::grid::OccupancyGrid;
    pub use crate::render::{save_heatmap_png, save_png, Camera, PixelResult, RenderOutput, Renderer};
    pub use crate::snapshot::{ParameterLayout, Snapshot};
    pub use crate::util::{Error, Result};
}
