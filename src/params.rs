//! Trained parameters of a dense network, held in export order.
use crate::error::{ExportError, Result};
use crate::topology::Topology;
use std::fmt;

/// Weights and bias of one dense layer.
///
/// `weights` is row-major with one row per layer input, so element
/// `(i, j)` lives at `i * outputs + j`.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerParams {
    pub weights: Vec<f32>,
    pub bias: Vec<f32>,
}

/// The learned state of the network: two tensors per layer, in layer order.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSet {
    layers: Vec<LayerParams>,
}

impl ParameterSet {
    pub fn new(layers: Vec<LayerParams>) -> Self {
        Self { layers }
    }

    /// Builds a set from a flat tensor list ordered `w1, b1, w2, b2, ...`.
    ///
    /// An odd tensor count leaves a layer without its bias and is rejected.
    pub fn from_tensors(tensors: Vec<Vec<f32>>) -> Result<Self> {
        if tensors.len() % 2 != 0 {
            return Err(ExportError::shape_mismatch(
                "tensor list",
                tensors.len() + 1,
                tensors.len(),
            ));
        }
        let mut iter = tensors.into_iter();
        let mut layers = Vec::new();
        while let (Some(weights), Some(bias)) = (iter.next(), iter.next()) {
            layers.push(LayerParams { weights, bias });
        }
        Ok(Self { layers })
    }

    /// All-zero parameters shaped for `topology`.
    pub fn zeros(topology: &Topology) -> Self {
        Self::from_fn(topology, |_, _| 0.0)
    }

    /// Fills every tensor with `f(tensor_index, element_index)`, tensors
    /// indexed in export order.
    pub fn from_fn(topology: &Topology, mut f: impl FnMut(usize, usize) -> f32) -> Self {
        let layers = topology
            .layers
            .iter()
            .enumerate()
            .map(|(l, shape)| LayerParams {
                weights: (0..shape.weight_len()).map(|i| f(2 * l, i)).collect(),
                bias: (0..shape.bias_len()).map(|i| f(2 * l + 1, i)).collect(),
            })
            .collect();
        Self { layers }
    }

    pub fn layers(&self) -> &[LayerParams] {
        &self.layers
    }

    pub fn layers_mut(&mut self) -> &mut [LayerParams] {
        &mut self.layers
    }

    /// Tensors in export order.
    pub fn tensors(&self) -> impl Iterator<Item = &[f32]> + '_ {
        self.layers
            .iter()
            .flat_map(|l| [l.weights.as_slice(), l.bias.as_slice()])
    }

    pub fn tensor_count(&self) -> usize {
        self.layers.len() * 2
    }

    pub fn param_count(&self) -> usize {
        self.tensors().map(<[f32]>::len).sum()
    }

    /// Checks tensor count and every element count against `topology`.
    ///
    /// The first offending tensor is reported by name.
    pub fn validate(&self, topology: &Topology) -> Result<()> {
        let specs = topology.tensor_specs();
        if self.tensor_count() != specs.len() {
            return Err(ExportError::shape_mismatch(
                "parameter set",
                specs.len(),
                self.tensor_count(),
            ));
        }
        for (spec, tensor) in specs.iter().zip(self.tensors()) {
            if tensor.len() != spec.len() {
                return Err(ExportError::shape_mismatch(
                    spec.name.clone(),
                    spec.len(),
                    tensor.len(),
                ));
            }
        }
        Ok(())
    }

    /// Shape summary against `topology`, one tensor per line.
    pub fn summary(&self, topology: &Topology) -> String {
        let mut out = format!("{topology}\n");
        for (spec, tensor) in topology.tensor_specs().iter().zip(self.tensors()) {
            out.push_str(&format!(
                "  {:<9} {:>12} {:>8} values\n",
                spec.name,
                format!("{:?}", spec.shape),
                tensor.len()
            ));
        }
        out.push_str(&format!("  total     {} parameters", self.param_count()));
        out
    }
}

impl fmt::Display for ParameterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: Vec<usize> = self.tensors().map(<[f32]>::len).collect();
        write!(f, "ParameterSet: {} tensors {:?}", counts.len(), counts)
    }
}
