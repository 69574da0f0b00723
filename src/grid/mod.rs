//! Occupancy grid used to skip empty space.
//!
//! The snapshot's raw 128³ volume is un-swizzled from Morton order and
//! reduced to a 64³ grid that answers point queries in a world-space box.

mod occupancy;

pub use occupancy::*;
