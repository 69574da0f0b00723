//! Fully fused MLP evaluated on the CPU.

use smallvec::SmallVec;

use crate::config::{next_multiple, Activation, MlpConfig, MLP_LANE_WIDTH};
use crate::util::{Error, Result};

/// Scratch buffer wide enough for every layer of the stock networks.
type Lanes = SmallVec<[f32; 64]>;

#[derive(Debug, Clone)]
struct Layer {
    /// Row-major `[out][in]`.
    weights: Vec<f32>,
    outputs: usize,
    inputs: usize,
}

/// Dense layers without biases, hidden activation between them and an
/// output activation after the last one.
#[derive(Debug, Clone)]
pub struct Mlp {
    layers: Vec<Layer>,
    activation: Activation,
    output_activation: Activation,
}

impl Mlp {
    /// Build from a flat weight buffer. `input_dims` and `output_dims` are
    /// padded to the lane width.
    pub fn new(config: &MlpConfig, input_dims: usize, output_dims: usize, weights: &[f32]) -> Result<Self> {
        let shapes = config.layer_shapes(input_dims, output_dims);
        let expected: usize = shapes.iter().map(|(o, i)| o * i).sum();
        if weights.len() != expected {
            return Err(Error::format(format!(
                "MLP with {} hidden layers of {} needs {} weights, got {}",
                config.n_hidden_layers,
                config.n_neurons,
                expected,
                weights.len()
            )));
        }

        let mut offset = 0;
        let layers = shapes
            .into_iter()
            .map(|(outputs, inputs)| {
                let n = outputs * inputs;
                let layer = Layer {
                    weights: weights[offset..offset + n].to_vec(),
                    outputs,
                    inputs,
                };
                offset += n;
                layer
            })
            .collect();

        Ok(Self {
            layers,
            activation: config.activation,
            output_activation: config.output_activation,
        })
    }

    /// Padded input width.
    #[inline]
    pub fn input_dims(&self) -> usize {
        self.layers.first().map_or(0, |l| l.inputs)
    }

    /// Padded output width.
    #[inline]
    pub fn output_dims(&self) -> usize {
        self.layers.last().map_or(0, |l| l.outputs)
    }

    /// Evaluate one input vector. Missing input lanes are zero; `out`
    /// receives as many outputs as it has room for.
    pub fn forward(&self, input: &[f32], out: &mut [f32]) {
        let width = next_multiple(input.len().max(1), MLP_LANE_WIDTH).max(self.input_dims());
        let mut current: Lanes = SmallVec::from_elem(0.0, width);
        current[..input.len()].copy_from_slice(input);

        let last = self.layers.len().saturating_sub(1);
        for (index, layer) in self.layers.iter().enumerate() {
            let activation = if index == last { self.output_activation } else { self.activation };
            let next: Lanes = layer
                .weights
                .chunks_exact(layer.inputs)
                .map(|row| {
                    let sum: f32 = row.iter().zip(&current[..layer.inputs]).map(|(w, x)| w * x).sum();
                    activation.apply(sum)
                })
                .collect();
            current = next;
        }

        let n = out.len().min(current.len());
        out[..n].copy_from_slice(&current[..n]);
    }
}
