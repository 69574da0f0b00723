//! Math type re-exports and renderer-specific math types.
//!
//! This module re-exports the `glam` types used throughout the crate and
//! provides the bounding box and ray types shared by the grid and renderer.

pub use glam::{Mat3, Mat4, Vec3, Vec4};

use bytemuck::{Pod, Zeroable};
use std::fmt;

/// Axis-aligned bounding box with single precision.
#[derive(Clone, Copy, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct BBox3f {
    pub min: Vec3,
    pub max: Vec3,
}

impl BBox3f {
    /// Create a new bounding box from min and max points.
    #[inline]
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Check if this box is empty (has no volume).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min.x >= self.max.x || self.min.y >= self.max.y || self.min.z >= self.max.z
    }

    /// Get the size (extents) of the box.
    #[inline]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Closed containment test: both faces count as inside. NaN is outside.
    #[inline]
    pub fn contains(&self, p: Vec3) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }

    /// Map a point to box-relative coordinates, `min -> 0`, `max -> 1`.
    #[inline]
    pub fn normalize(&self, p: Vec3) -> Vec3 {
        (p - self.min) / self.size()
    }
}

impl fmt::Debug for BBox3f {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BBox3f({:?} - {:?})", self.min, self.max)
    }
}

/// A world-space ray. The direction is not required to be unit length;
/// distances along the ray are measured in multiples of it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    #[inline]
    pub const fn new(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction }
    }

    /// Point at parameter `t`.
    #[inline]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox3f() {
        let b = BBox3f::new(Vec3::splat(-0.5), Vec3::splat(1.5));
        assert!(!b.is_empty());
        assert_eq!(b.size(), Vec3::splat(2.0));
        assert_eq!(b.normalize(Vec3::splat(0.5)), Vec3::splat(0.5));
    }

    #[test]
    fn test_contains_is_closed() {
        let b = BBox3f::new(Vec3::ZERO, Vec3::ONE);
        assert!(b.contains(Vec3::ZERO));
        assert!(b.contains(Vec3::ONE));
        assert!(!b.contains(Vec3::new(1.0001, 0.5, 0.5)));
        assert!(!b.contains(Vec3::new(0.5, -0.0001, 0.5)));
        assert!(!b.contains(Vec3::new(f32::NAN, 0.5, 0.5)));
    }

    #[test]
    fn test_ray_at() {
        let r = Ray::new(Vec3::ZERO, Vec3::new(0.0, 0.0, 2.0));
        assert_eq!(r.at(0.5), Vec3::new(0.0, 0.0, 1.0));
    }
}
