//! Trainer checkpoints (`.pere`): gzip-compressed JSON of the dense layers.
//!
//! The trainer stores each layer's weights output-major
//! (`weights[out][in]`, f64). The weight file wants input-major `f32`, so
//! loading transposes and narrows.
use crate::error::{ExportError, Result};
use crate::params::{LayerParams, ParameterSet};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use log::info;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

/// Activation recorded by the trainer. Informational only; the weight file
/// does not carry it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ActivationKind {
    ReLU,
    Sigmoid,
    Tanh,
    LeakyReLU,
    ELU,
    Swish,
    Softmax,
    Linear,
}

#[derive(Debug, Serialize, Deserialize)]
struct LayerDto {
    input_size: usize,
    output_size: usize,
    weights: Vec<Vec<f64>>, // [output_size][input_size]
    bias: Vec<f64>,         // [output_size]
    activation: ActivationKind,
}

#[derive(Debug, Serialize, Deserialize)]
struct MlpDto {
    input_size: usize,
    output_size: usize,
    layers: Vec<LayerDto>,
}

impl LayerDto {
    fn into_params(self, index: usize) -> Result<LayerParams> {
        let n = index + 1;
        if self.bias.len() != self.output_size {
            return Err(ExportError::shape_mismatch(
                format!("bias{n}"),
                self.output_size,
                self.bias.len(),
            ));
        }
        if self.weights.len() != self.output_size {
            return Err(ExportError::shape_mismatch(
                format!("weights{n} rows"),
                self.output_size,
                self.weights.len(),
            ));
        }
        if let Some((o, row)) = self
            .weights
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != self.input_size)
        {
            return Err(ExportError::shape_mismatch(
                format!("weights{n} row {o}"),
                self.input_size,
                row.len(),
            ));
        }
        let len = self
            .input_size
            .checked_mul(self.output_size)
            .ok_or_else(|| {
                ExportError::Checkpoint(format!(
                    "weights{n} size {}x{} overflows",
                    self.input_size, self.output_size
                ))
            })?;
        let mut weights = vec![0f32; len];
        for (o, row) in self.weights.iter().enumerate() {
            for (i, &w) in row.iter().enumerate() {
                weights[i * self.output_size + o] = w as f32;
            }
        }
        let bias = self.bias.iter().map(|&b| b as f32).collect();
        Ok(LayerParams { weights, bias })
    }

    fn from_params(layer: &LayerParams, activation: ActivationKind) -> Self {
        let output_size = layer.bias.len();
        let input_size = layer.weights.len().checked_div(output_size).unwrap_or(0);
        let weights = (0..output_size)
            .map(|o| {
                (0..input_size)
                    .map(|i| f64::from(layer.weights[i * output_size + o]))
                    .collect()
            })
            .collect();
        Self {
            input_size,
            output_size,
            weights,
            bias: layer.bias.iter().map(|&b| f64::from(b)).collect(),
            activation,
        }
    }
}

/// Loads a `.pere` checkpoint into export layout.
pub fn load_checkpoint<P: AsRef<Path>>(path: P) -> Result<ParameterSet> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| ExportError::io(path, e))?;
    let mut dec = GzDecoder::new(BufReader::new(file));
    let mut buf = Vec::new();
    dec.read_to_end(&mut buf)
        .map_err(|e| ExportError::io(path, e))?;
    let dto: MlpDto = serde_json::from_slice(&buf)?;

    let mut prev = dto.input_size;
    let mut layers = Vec::with_capacity(dto.layers.len());
    for (index, layer) in dto.layers.into_iter().enumerate() {
        if layer.input_size != prev {
            return Err(ExportError::Checkpoint(format!(
                "layer {} takes {} inputs but the previous layer produces {}",
                index + 1,
                layer.input_size,
                prev
            )));
        }
        prev = layer.output_size;
        layers.push(layer.into_params(index)?);
    }
    if prev != dto.output_size {
        return Err(ExportError::Checkpoint(format!(
            "last layer produces {} outputs, checkpoint declares {}",
            prev, dto.output_size
        )));
    }

    let params = ParameterSet::new(layers);
    info!("loaded checkpoint {} ({})", path.display(), params);
    Ok(params)
}

/// Writes `params` in the trainer's checkpoint format: ReLU hidden layers,
/// softmax output.
pub fn save_checkpoint<P: AsRef<Path>>(params: &ParameterSet, path: P) -> Result<()> {
    let path = path.as_ref();
    let last = params.layers().len().saturating_sub(1);
    let layers: Vec<LayerDto> = params
        .layers()
        .iter()
        .enumerate()
        .map(|(i, layer)| {
            let activation = if i == last {
                ActivationKind::Softmax
            } else {
                ActivationKind::ReLU
            };
            LayerDto::from_params(layer, activation)
        })
        .collect();
    let dto = MlpDto {
        input_size: layers.first().map_or(0, |l| l.input_size),
        output_size: layers.last().map_or(0, |l| l.output_size),
        layers,
    };
    let json = serde_json::to_vec(&dto)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ExportError::io(parent, e))?;
    }
    let file = File::create(path).map_err(|e| ExportError::io(path, e))?;
    let mut enc = GzEncoder::new(file, Compression::default());
    enc.write_all(&json).map_err(|e| ExportError::io(path, e))?;
    enc.finish().map_err(|e| ExportError::io(path, e))?;
    Ok(())
}
