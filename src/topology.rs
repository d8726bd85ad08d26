//! Network topology: the one place tensor shapes and export order are declared.
//!
//! The weight file carries no shape metadata, so producer and reader agree on
//! these shapes out of band. Every size the exporters use is derived from a
//! [`Topology`].

use std::fmt;

use serde::{Deserialize, Serialize};

/// Bytes per exported weight element (`f32`).
pub const BYTES_PER_PARAM: usize = 4;

/// Input width of the default network (28×28 pixels).
pub const INPUT_SIZE: usize = 784;
/// First hidden layer width.
pub const HIDDEN1_SIZE: usize = 128;
/// Second hidden layer width.
pub const HIDDEN2_SIZE: usize = 64;
/// Number of digit classes.
pub const OUTPUT_SIZE: usize = 10;

/// One dense layer, `inputs -> outputs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerShape {
    pub inputs: usize,
    pub outputs: usize,
}

impl LayerShape {
    pub const fn new(inputs: usize, outputs: usize) -> Self {
        Self { inputs, outputs }
    }

    /// Element count of the `inputs × outputs` weight matrix.
    pub const fn weight_len(&self) -> usize {
        self.inputs * self.outputs
    }

    /// Element count of the bias vector.
    pub const fn bias_len(&self) -> usize {
        self.outputs
    }
}

/// Name and shape of one exported tensor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorSpec {
    /// `weights1`, `bias1`, ... (layers are numbered from 1).
    pub name: String,
    /// `[rows, cols]` for weights (rows = layer inputs), `[len]` for biases.
    pub shape: Vec<usize>,
}

impl TensorSpec {
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Ordered list of dense layers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    pub layers: Vec<LayerShape>,
}

impl Topology {
    /// Builds a topology from layer widths, e.g. `&[784, 128, 64, 10]`.
    pub fn from_sizes(sizes: &[usize]) -> Self {
        let layers = sizes
            .windows(2)
            .map(|w| LayerShape::new(w[0], w[1]))
            .collect();
        Self { layers }
    }

    /// The 784 → 128 → 64 → 10 digit classifier.
    pub fn mnist_mlp() -> Self {
        Self::from_sizes(&[INPUT_SIZE, HIDDEN1_SIZE, HIDDEN2_SIZE, OUTPUT_SIZE])
    }

    /// Tensors in export order: weights then bias, layer by layer.
    pub fn tensor_specs(&self) -> Vec<TensorSpec> {
        self.layers
            .iter()
            .enumerate()
            .flat_map(|(i, layer)| {
                let n = i + 1;
                [
                    TensorSpec {
                        name: format!("weights{n}"),
                        shape: vec![layer.inputs, layer.outputs],
                    },
                    TensorSpec {
                        name: format!("bias{n}"),
                        shape: vec![layer.outputs],
                    },
                ]
            })
            .collect()
    }

    /// Total number of parameters across all tensors.
    pub fn param_count(&self) -> usize {
        self.layers
            .iter()
            .map(|l| l.weight_len() + l.bias_len())
            .sum()
    }

    /// Exact byte length of the exported weight file.
    pub fn weight_file_len(&self) -> u64 {
        (self.param_count() * BYTES_PER_PARAM) as u64
    }

    pub fn input_size(&self) -> Option<usize> {
        self.layers.first().map(|l| l.inputs)
    }
}

impl Default for Topology {
    fn default() -> Self {
        Self::mnist_mlp()
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sizes: Vec<usize> = self.input_size().into_iter().collect();
        sizes.extend(self.layers.iter().map(|l| l.outputs));
        write!(f, "MLP: {:?}", sizes)
    }
}
