//! PNG output of rendered images.

use std::path::Path;

use image::{GrayImage, RgbImage};
use tracing::info;

use super::compositor::PixelResult;
use crate::util::{Error, Result};

#[inline]
fn to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn check_len(width: u32, height: u32, len: usize) -> Result<()> {
    let expected = width as usize * height as usize;
    if len != expected {
        return Err(Error::config(format!(
            "{}x{} image needs {} pixels, got {}",
            width, height, expected, len
        )));
    }
    Ok(())
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    Ok(())
}

/// 8-bit RGB buffer of row-major pixels, colors clamped to [0, 1].
pub fn to_rgb8(width: u32, height: u32, pixels: &[PixelResult]) -> Result<RgbImage> {
    check_len(width, height, pixels.len())?;
    let raw = pixels
        .iter()
        .flat_map(|p| p.color.map(to_u8))
        .collect();
    RgbImage::from_raw(width, height, raw).ok_or_else(|| Error::config("pixel buffer size mismatch"))
}

/// Write row-major pixels as an RGB PNG, creating parent directories.
pub fn save_png(path: impl AsRef<Path>, width: u32, height: u32, pixels: &[PixelResult]) -> Result<()> {
    let path = path.as_ref();
    let img = to_rgb8(width, height, pixels)?;
    create_parent(path)?;
    img.save(path)?;
    info!("Wrote {}", path.display());
    Ok(())
}

/// Write per-pixel fine sample counts as grayscale, brightest at the maximum.
pub fn save_heatmap_png(path: impl AsRef<Path>, width: u32, height: u32, counts: &[u32]) -> Result<()> {
    let path = path.as_ref();
    check_len(width, height, counts.len())?;
    let max = counts.iter().copied().max().unwrap_or(0).max(1) as f32;
    let raw = counts.iter().map(|&c| to_u8(c as f32 / max)).collect();
    let img = GrayImage::from_raw(width, height, raw).ok_or_else(|| Error::config("count buffer size mismatch"))?;
    create_parent(path)?;
    img.save(path)?;
    info!("Wrote heatmap {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_rgb8_clamps() {
        let pixels = [
            PixelResult { color: [0.0, 0.5, 1.0], opacity: 1.0 },
            PixelResult { color: [-1.0, 2.0, f32::NAN], opacity: 0.0 },
        ];
        let img = to_rgb8(2, 1, &pixels).unwrap();
        assert_eq!(img.get_pixel(0, 0).0, [0, 128, 255]);
        assert_eq!(img.get_pixel(1, 0).0[..2], [0, 255]);
    }

    #[test]
    fn test_size_mismatch() {
        assert!(matches!(to_rgb8(2, 2, &[PixelResult::ZERO]), Err(Error::Config(_))));
    }

    #[test]
    fn test_save_creates_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outputs/nested/img.png");
        save_png(&path, 1, 1, &[PixelResult::ZERO]).unwrap();
        assert!(path.exists());

        let heat = dir.path().join("outputs/heat.png");
        save_heatmap_png(&heat, 2, 1, &[0, 7]).unwrap();
        let back = ::image::open(&heat).unwrap().to_luma8();
        assert_eq!(back.get_pixel(0, 0).0, [0]);
        assert_eq!(back.get_pixel(1, 0).0, [255]);
    }
}
