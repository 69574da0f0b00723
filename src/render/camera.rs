//! Pinhole camera producing one ray per pixel.

use crate::config::SceneMeta;
use crate::util::{Error, Mat3, Mat4, Ray, Result, Vec3};

/// Scale applied to NeRF pose translations when moving to the NGP frame.
pub const DEFAULT_POSE_SCALE: f32 = 0.33;

/// Largest accepted image side.
pub const MAX_IMAGE_SIDE: u32 = 16384;

/// Cycle vector components (x, y, z) -> (y, z, x).
#[inline]
fn cycle_axes(v: Vec3) -> Vec3 {
    Vec3::new(v.y, v.z, v.x)
}

/// Convert a NeRF (OpenGL) camera-to-world matrix to the NGP convention.
///
/// Columns 1 and 2 are negated, the translation scaled, and every column's
/// axes cycled. Returns the rotation and the camera origin.
pub fn nerf_to_ngp(c2w: Mat4, pose_scale: f32) -> (Mat3, Vec3) {
    let x = cycle_axes(c2w.x_axis.truncate());
    let y = cycle_axes(-c2w.y_axis.truncate());
    let z = cycle_axes(-c2w.z_axis.truncate());
    let origin = cycle_axes(c2w.w_axis.truncate() * pose_scale);
    (Mat3::from_cols(x, y, z), origin)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    width: u32,
    height: u32,
    focal: f32,
    rotation: Mat3,
    origin: Vec3,
}

impl Camera {
    /// `camera_angle_x` is the horizontal field of view in radians.
    pub fn new(width: u32, height: u32, camera_angle_x: f32, c2w: Mat4, pose_scale: f32) -> Result<Self> {
        if !(1..=MAX_IMAGE_SIDE).contains(&width) || !(1..=MAX_IMAGE_SIDE).contains(&height) {
            return Err(Error::config(format!(
                "image size {}x{} out of range (1..={})",
                width, height, MAX_IMAGE_SIDE
            )));
        }
        if !(camera_angle_x > 0.0 && camera_angle_x < std::f32::consts::PI) {
            return Err(Error::config(format!("camera_angle_x {} out of range", camera_angle_x)));
        }
        let focal = 0.5 * width as f32 / (0.5 * camera_angle_x).tan();
        let (rotation, origin) = nerf_to_ngp(c2w, pose_scale);
        Ok(Self { width, height, focal, rotation, origin })
    }

    /// Camera for one frame of a scene.
    pub fn from_scene(meta: &SceneMeta, frame: usize, width: u32, height: u32) -> Result<Self> {
        let pose = meta.frame(frame)?.camera_to_world();
        Self::new(width, height, meta.camera_angle_x, pose, DEFAULT_POSE_SCALE)
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn focal(&self) -> f32 {
        self.focal
    }

    #[inline]
    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Ray through the center of pixel (column `i`, row `j`). The direction
    /// is not normalized: its camera-space z component is 1.
    #[inline]
    pub fn ray(&self, i: u32, j: u32) -> Ray {
        let half_w = 0.5 * self.width as f32;
        let half_h = 0.5 * self.height as f32;
        let local = Vec3::new(
            (i as f32 + 0.5 - half_w) / self.focal,
            (j as f32 + 0.5 - half_h) / self.focal,
            1.0,
        );
        Ray::new(self.origin, self.rotation * local)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::Vec4;

    #[test]
    fn test_identity_pose() {
        let (rot, origin) = nerf_to_ngp(Mat4::IDENTITY, 0.33);
        assert_eq!(origin, Vec3::ZERO);
        // NeRF cameras look down -z; that becomes -y after the axis cycle.
        assert_eq!(rot * Vec3::Z, Vec3::NEG_Y);
        assert_eq!(rot * Vec3::X, Vec3::Z);
    }

    #[test]
    fn test_central_ray_points_at_origin() {
        // Camera 4 units up the NeRF z axis looking at the origin.
        let c2w = Mat4::from_cols(Vec4::X, Vec4::Y, Vec4::Z, Vec4::new(0.0, 0.0, 4.0, 1.0));
        let cam = Camera::new(2, 2, 0.69, c2w, DEFAULT_POSE_SCALE).unwrap();
        assert!((cam.origin() - Vec3::new(0.0, 1.32, 0.0)).length() < 1e-6);

        // Average of the four central pixel rays is the optical axis
        let sum: Vec3 = [(0, 0), (1, 0), (0, 1), (1, 1)]
            .iter()
            .map(|&(i, j)| cam.ray(i, j).direction)
            .sum();
        let axis = (sum / 4.0).normalize();
        assert!((axis - Vec3::NEG_Y).length() < 1e-6);

        // Along the axis the ray reaches the scene center at t = 1.32
        let ray = Ray::new(cam.origin(), axis);
        assert!(ray.at(1.32).length() < 1e-5);
    }

    #[test]
    fn test_focal_length() {
        let angle = 0.691_111_1;
        let cam = Camera::new(800, 800, angle, Mat4::IDENTITY, 1.0).unwrap();
        assert!((cam.focal() - 400.0 / (0.5 * angle).tan()).abs() < 1e-3);
        assert_eq!(cam.pixel_count(), 640_000);
    }

    #[test]
    fn test_ray_direction_unnormalized() {
        let cam = Camera::new(800, 800, 0.69, Mat4::IDENTITY, 1.0).unwrap();
        let corner = cam.ray(0, 0).direction;
        assert!(corner.length() > 1.0);
        // Camera-space z is preserved as the NGP -y component
        assert!((corner.y + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_rejects_bad_sizes() {
        assert!(Camera::new(0, 10, 0.7, Mat4::IDENTITY, 1.0).is_err());
        assert!(Camera::new(10, 20_000, 0.7, Mat4::IDENTITY, 1.0).is_err());
        assert!(Camera::new(10, 10, 0.0, Mat4::IDENTITY, 1.0).is_err());
    }
}
