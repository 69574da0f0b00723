//! Snapshot writer.
//!
//! Produces files in the layout [`Snapshot`](super::Snapshot) reads, used to
//! build fixtures and synthetic scenes.

use std::path::Path;

use super::format::*;
use super::msgpack::{self, Value};
use crate::config::DENSITY_GRID_SIDE;
use crate::util::{encode_f16_le, Result};

/// Builder for a snapshot container.
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    params: Vec<f32>,
    density: Vec<f32>,
    declared_params: Option<u64>,
    params_type: String,
}

impl SnapshotWriter {
    /// `params` in buffer order; `density` as 128³ samples in Morton order.
    pub fn new(params: Vec<f32>, density: Vec<f32>) -> Self {
        let declared_params = Some(params.len() as u64);
        Self {
            params,
            density,
            declared_params,
            params_type: PARAMS_TYPE_HALF.to_string(),
        }
    }

    /// Override the declared `n_params` field.
    pub fn with_declared_params(mut self, count: u64) -> Self {
        self.declared_params = Some(count);
        self
    }

    pub fn with_params_type(mut self, params_type: impl Into<String>) -> Self {
        self.params_type = params_type.into();
        self
    }

    /// Encode to MessagePack bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let params = encode_f16_le(&self.params);
        let density = encode_f16_le(&self.density);

        let mut fields = vec![
            (Value::Str(PARAMS_TYPE_KEY), Value::Str(&self.params_type)),
            (Value::Str(PARAMS_KEY), Value::Bin(&params)),
            (Value::Str(DENSITY_GRID_KEY), Value::Bin(&density)),
            (Value::Str(DENSITY_GRID_SIZE_KEY), Value::UInt(DENSITY_GRID_SIDE as u64)),
        ];
        if let Some(n) = self.declared_params {
            fields.push((Value::Str(N_PARAMS_KEY), Value::UInt(n)));
        }
        let root = Value::Map(vec![(Value::Str(SNAPSHOT_KEY), Value::Map(fields))]);
        msgpack::encode(&root)
    }

    /// Write the encoded snapshot to `path`.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_bytes())?;
        Ok(())
    }
}
