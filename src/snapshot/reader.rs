//! Snapshot reader.

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;
use tracing::{debug, info};

use super::format::*;
use super::msgpack::{self, Value};
use super::volume::RawDensityVolume;
use crate::config::DENSITY_GRID_SIDE;
use crate::util::{decode_f16_le, Error, Result};

/// A decoded scene snapshot: network parameters plus raw occupancy.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub params: ParameterSegments,
    pub density: RawDensityVolume,
}

impl Snapshot {
    /// Memory-map and decode a snapshot file.
    #[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>, layout: &ParameterLayout) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading snapshot from {}", path.display());

        let file = File::open(path).map_err(|e| Error::from_open(path, e))?;
        let size = file.metadata()?.len();
        if size == 0 {
            return Err(Error::format(format!("{} is empty", path.display())));
        }

        // Safety: the file is opened read-only and only read during decode.
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| Error::MmapFailed(e.to_string()))?;
        let snapshot = Self::from_bytes(&mmap, layout)?;

        info!(
            params = snapshot.params.len(),
            occupied = snapshot.density.occupied_count(),
            "Snapshot loaded"
        );
        Ok(snapshot)
    }

    /// Decode a snapshot already in memory.
    pub fn from_bytes(bytes: &[u8], layout: &ParameterLayout) -> Result<Self> {
        let root = msgpack::decode(bytes)?;
        let snapshot = root
            .get(SNAPSHOT_KEY)
            .ok_or_else(|| Error::format(format!("missing '{}' map", SNAPSHOT_KEY)))?;
        if !matches!(snapshot, Value::Map(_)) {
            return Err(Error::format(format!(
                "'{}' is a {}, expected a map",
                SNAPSHOT_KEY,
                snapshot.kind()
            )));
        }

        check_optional_fields(snapshot)?;

        let params = decode_f16_le(binary_field(snapshot, PARAMS_KEY)?)?;
        debug!(decoded = params.len(), expected = layout.total(), "decoded parameters");
        if let Some(declared) = snapshot.get(N_PARAMS_KEY) {
            let declared = declared.as_u64().ok_or_else(|| {
                Error::format(format!("'{}' is a {}, expected an integer", N_PARAMS_KEY, declared.kind()))
            })?;
            if declared != params.len() as u64 {
                return Err(Error::format(format!(
                    "snapshot declares {} parameters but stores {}",
                    declared,
                    params.len()
                )));
            }
        }
        let params = ParameterSegments::split(params, *layout)?;

        let densities = decode_f16_le(binary_field(snapshot, DENSITY_GRID_KEY)?)?;
        let density = RawDensityVolume::from_densities(&densities)?;

        Ok(Self { params, density })
    }
}

/// Fetch a required binary payload.
fn binary_field<'a>(snapshot: &Value<'a>, key: &str) -> Result<&'a [u8]> {
    let value = snapshot
        .get(key)
        .ok_or_else(|| Error::format(format!("missing '{}' payload", key)))?;
    value
        .as_bin()
        .ok_or_else(|| Error::format(format!("'{}' is a {}, expected bin", key, value.kind())))
}

fn check_optional_fields(snapshot: &Value<'_>) -> Result<()> {
    if let Some(kind) = snapshot.get(PARAMS_TYPE_KEY) {
        match kind.as_str() {
            Some(PARAMS_TYPE_HALF) => {}
            Some(other) => {
                return Err(Error::format(format!(
                    "unsupported parameter type '{}' (only {} is decoded)",
                    other, PARAMS_TYPE_HALF
                )))
            }
            None => return Err(Error::format(format!("'{}' is not a string", PARAMS_TYPE_KEY))),
        }
    }
    if let Some(side) = snapshot.get(DENSITY_GRID_SIZE_KEY) {
        if side.as_u64() != Some(DENSITY_GRID_SIDE as u64) {
            return Err(Error::format(format!(
                "density grid size {:?} unsupported, expected {}",
                side, DENSITY_GRID_SIDE
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{SnapshotWriter, DENSITY_GRID_CELLS};

    fn tiny_layout() -> ParameterLayout {
        ParameterLayout { density_network: 2, color_network: 2, hash_grid: 4 }
    }

    fn tiny_writer() -> SnapshotWriter {
        let mut density = vec![0.0; DENSITY_GRID_CELLS];
        density[5] = 0.5;
        SnapshotWriter::new(vec![0.5, 1.0, -1.0, 2.0, 0.0, 0.25, 0.125, 4.0], density)
    }

    #[test]
    fn test_from_bytes() {
        let bytes = tiny_writer().to_bytes();
        let snap = Snapshot::from_bytes(&bytes, &tiny_layout()).unwrap();
        assert_eq!(snap.params.density_network(), &[0.5, 1.0]);
        assert_eq!(snap.params.color_network(), &[-1.0, 2.0]);
        assert_eq!(snap.params.hash_grid(), &[0.0, 0.25, 0.125, 4.0]);
        assert!(snap.density.get(5));
        assert_eq!(snap.density.occupied_count(), 1);
    }

    #[test]
    fn test_declared_count_mismatch() {
        let bytes = tiny_writer().with_declared_params(9).to_bytes();
        let err = Snapshot::from_bytes(&bytes, &tiny_layout()).unwrap_err();
        assert!(err.to_string().contains("declares 9"));
    }

    #[test]
    fn test_layout_mismatch() {
        let bytes = tiny_writer().to_bytes();
        let layout = ParameterLayout { density_network: 2, color_network: 2, hash_grid: 5 };
        assert!(matches!(Snapshot::from_bytes(&bytes, &layout), Err(Error::Format(_))));
    }

    #[test]
    fn test_not_msgpack() {
        assert!(matches!(Snapshot::from_bytes(&[0xc1, 0x00], &tiny_layout()), Err(Error::Format(_))));
        // A valid value but not the expected structure
        assert!(matches!(Snapshot::from_bytes(&[0x01], &tiny_layout()), Err(Error::Format(_))));
    }

    #[test]
    fn test_params_type() {
        let bytes = tiny_writer().with_params_type("float").to_bytes();
        assert!(matches!(Snapshot::from_bytes(&bytes, &tiny_layout()), Err(Error::Format(_))));
    }
}
