//! 3D Morton (Z-order) index encoding.
//!
//! Matches the `morton3D` layout used by Instant-NGP density grids: bit `b`
//! of x lands at bit `3b`, y at `3b + 1` and z at `3b + 2`. Supports up to
//! 10 bits per axis, so every index fits in a `u32`.

/// Maximum number of bits per axis that fit into a 32-bit index.
pub const MAX_BITS: u32 = 10;

/// Spread the low 10 bits of `v` so that there are two zero bits between
/// each original bit.
#[inline]
pub const fn expand_bits(v: u32) -> u32 {
    let mut x = v & 0x0000_03ff;
    x = (x | (x << 16)) & 0x0300_00ff;
    x = (x | (x << 8)) & 0x0300_f00f;
    x = (x | (x << 4)) & 0x030c_30c3;
    x = (x | (x << 2)) & 0x0924_9249;
    x
}

/// Inverse of [`expand_bits`]: gather every third bit back into the low bits.
#[inline]
pub const fn compact_bits(v: u32) -> u32 {
    let mut x = v & 0x0924_9249;
    x = (x ^ (x >> 2)) & 0x030c_30c3;
    x = (x ^ (x >> 4)) & 0x0300_f00f;
    x = (x ^ (x >> 8)) & 0x0300_00ff;
    x = (x ^ (x >> 16)) & 0x0000_03ff;
    x
}

/// Interleave three axis coordinates into one Morton index.
#[inline]
pub const fn encode(x: u32, y: u32, z: u32) -> u32 {
    expand_bits(x) | (expand_bits(y) << 1) | (expand_bits(z) << 2)
}

/// De-interleave a Morton index into `[x, y, z]`.
#[inline]
pub const fn decode(index: u32) -> [u32; 3] {
    [
        compact_bits(index),
        compact_bits(index >> 1),
        compact_bits(index >> 2),
    ]
}

/// Morton indexer for a cube with `2^bits` cells per axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MortonIndexer {
    bits: u32,
}

impl MortonIndexer {
    /// The 128-per-axis cube used by density grid snapshots.
    pub const CUBE_128: Self = Self { bits: 7 };

    /// Create an indexer for a cube of side `2^bits`.
    ///
    /// # Panics
    /// Panics if `bits` is zero or larger than [`MAX_BITS`].
    pub const fn new(bits: u32) -> Self {
        assert!(bits > 0 && bits <= MAX_BITS, "morton bits out of range");
        Self { bits }
    }

    /// Cells per axis.
    #[inline]
    pub const fn side(&self) -> u32 {
        1 << self.bits
    }

    /// Total number of cells in the cube.
    #[inline]
    pub const fn len(&self) -> usize {
        1usize << (3 * self.bits)
    }

    /// Always false; a cube has at least one cell.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Map a linear Morton index to axis coordinates.
    ///
    /// Indices past the end of the cube are wrapped by masking off the
    /// excess high bits.
    #[inline]
    pub fn to_coords(&self, index: u32) -> [u32; 3] {
        debug_assert!((index as usize) < self.len(), "morton index {index} out of range");
        let masked = index & (self.len() as u32 - 1);
        decode(masked)
    }

    /// Map axis coordinates to a linear Morton index.
    ///
    /// Coordinates are masked to the cube's side length.
    #[inline]
    pub fn to_index(&self, x: u32, y: u32, z: u32) -> u32 {
        let mask = self.side() - 1;
        debug_assert!(x <= mask && y <= mask && z <= mask, "coords out of range");
        encode(x & mask, y & mask, z & mask)
    }

    /// Iterate `(morton_index, [x, y, z])` over the whole cube in Morton order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, [u32; 3])> + '_ {
        (0..self.len() as u32).map(move |i| (i, decode(i)))
    }
}

impl Default for MortonIndexer {
    fn default() -> Self {
        Self::CUBE_128
    }
}
