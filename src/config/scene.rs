//! Scene metadata (`transforms_*.json`).

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::util::{Error, Mat4, Result};

/// One camera frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    #[serde(default)]
    pub file_path: Option<String>,
    /// Camera-to-world transform, stored as four rows.
    pub transform_matrix: [[f32; 4]; 4],
}

impl Frame {
    /// Camera-to-world transform as a glam matrix.
    pub fn camera_to_world(&self) -> Mat4 {
        // glam takes columns; the file stores rows.
        Mat4::from_cols_array_2d(&self.transform_matrix).transpose()
    }
}

/// Field of view plus the camera frames of a scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneMeta {
    /// Horizontal field of view in radians.
    pub camera_angle_x: f32,
    pub frames: Vec<Frame>,
}

impl SceneMeta {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::from_open(path, e))?;
        let meta = Self::from_json(&text).map_err(|e| match e {
            Error::Format(msg) => Error::format(format!("{}: {}", path.display(), msg)),
            other => other,
        })?;
        debug!(frames = meta.frames.len(), fov = meta.camera_angle_x, "loaded scene metadata");
        Ok(meta)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let meta: Self = serde_json::from_str(text).map_err(|e| Error::format(e.to_string()))?;
        if meta.frames.is_empty() {
            return Err(Error::config("scene metadata has no frames"));
        }
        if !(meta.camera_angle_x.is_finite()
            && meta.camera_angle_x > 0.0
            && meta.camera_angle_x < std::f32::consts::PI)
        {
            return Err(Error::config(format!(
                "camera_angle_x {} out of range (0, pi)",
                meta.camera_angle_x
            )));
        }
        Ok(meta)
    }

    /// Frame by index.
    pub fn frame(&self, index: usize) -> Result<&Frame> {
        self.frames.get(index).ok_or_else(|| {
            Error::config(format!(
                "frame {} requested but scene has {} frames",
                index,
                self.frames.len()
            ))
        })
    }
}
