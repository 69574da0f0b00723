//! Real spherical harmonics direction encoding, degrees 1 to 4.

use crate::util::Vec3;

/// Coefficients produced at the highest supported degree.
pub const SH_MAX_COEFFS: usize = 16;

/// Encode a direction given in [0, 1]³ (`(d + 1) / 2` of a unit vector).
///
/// Writes `degree²` coefficients; remaining lanes of `out` are untouched.
pub fn sh_encode(direction: Vec3, degree: u32, out: &mut [f32; SH_MAX_COEFFS]) {
    let Vec3 { x, y, z } = direction * 2.0 - Vec3::ONE;
    let (xy, xz, yz) = (x * y, x * z, y * z);
    let (x2, y2, z2) = (x * x, y * y, z * z);

    out[0] = 0.282_094_79;
    if degree <= 1 {
        return;
    }
    out[1] = -0.488_602_51 * y;
    out[2] = 0.488_602_51 * z;
    out[3] = -0.488_602_51 * x;
    if degree <= 2 {
        return;
    }
    out[4] = 1.092_548_4 * xy;
    out[5] = -1.092_548_4 * yz;
    out[6] = 0.946_174_7 * z2 - 0.315_391_57;
    out[7] = -1.092_548_4 * xz;
    out[8] = 0.546_274_2 * x2 - 0.546_274_2 * y2;
    if degree <= 3 {
        return;
    }
    out[9] = 0.590_043_6 * y * (-3.0 * x2 + y2);
    out[10] = 2.890_611_4 * xy * z;
    out[11] = 0.457_045_8 * y * (1.0 - 5.0 * z2);
    out[12] = 0.373_176_33 * z * (5.0 * z2 - 3.0);
    out[13] = 0.457_045_8 * x * (1.0 - 5.0 * z2);
    out[14] = 1.445_305_7 * z * (x2 - y2);
    out[15] = 0.590_043_6 * x * (-x2 + 3.0 * y2);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(d: Vec3, degree: u32) -> [f32; SH_MAX_COEFFS] {
        let mut out = [0.0; SH_MAX_COEFFS];
        sh_encode((d.normalize() + Vec3::ONE) * 0.5, degree, &mut out);
        out
    }

    #[test]
    fn test_degree_zero_band_is_constant() {
        for d in [Vec3::X, Vec3::NEG_Y, Vec3::new(0.3, -0.2, 0.9)] {
            let out = encode(d, 1);
            assert_eq!(out[0], 0.282_094_79);
            assert!(out[1..].iter().all(|&c| c == 0.0));
        }
    }

    #[test]
    fn test_first_band_along_axes() {
        let out = encode(Vec3::Z, 2);
        assert!(out[1].abs() < 1e-6);
        assert!((out[2] - 0.488_602_51).abs() < 1e-6);
        assert!(out[3].abs() < 1e-6);
    }

    #[test]
    fn test_partial_degree_leaves_tail() {
        let mut out = [7.0; SH_MAX_COEFFS];
        sh_encode(Vec3::splat(0.5), 3, &mut out);
        assert!(out[9..].iter().all(|&c| c == 7.0));
    }

    #[test]
    fn test_energy_is_rotation_invariant() {
        // Sum of squares per band is constant on the sphere:
        // (2l + 1) / (4π) for each band l.
        let dirs = [Vec3::X, Vec3::new(0.2, 0.7, -0.4), Vec3::new(-1.0, 1.0, 1.0)];
        for d in dirs {
            let out = encode(d, 4);
            let mut start = 0;
            for l in 0..4usize {
                let n = 2 * l + 1;
                let energy: f32 = out[start..start + n].iter().map(|c| c * c).sum();
                let expected = n as f32 / (4.0 * std::f32::consts::PI);
                assert!((energy - expected).abs() < 1e-4, "band {} of {:?}", l, d);
                start += n;
            }
        }
    }
}
