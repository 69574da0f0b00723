//! Scene snapshot decoding.
//!
//! A snapshot is a MessagePack document whose `snapshot` map carries two
//! half-precision payloads: every network parameter, and the 128³ density
//! grid in Morton order.
//!
//! - [`Snapshot`] - load and validate a snapshot file
//! - [`ParameterSegments`] - parameter buffer split into named segments
//! - [`RawDensityVolume`] - thresholded density grid
//! - [`msgpack`] - the container codec

pub mod format;
pub mod msgpack;
mod reader;
mod volume;
mod writer;

pub use format::{ParameterLayout, ParameterSegments};
pub use reader::Snapshot;
pub use volume::*;
pub use writer::SnapshotWriter;
