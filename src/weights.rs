//! Flat binary weight file.
//!
//! ```text
//! weights1[784*128] bias1[128] weights2[128*64] bias2[64] weights3[64*10] bias3[10]
//! ```
//!
//! Every element is a little-endian IEEE-754 `f32`. There is no header,
//! separator or padding; shapes come from the [`Topology`] both sides agree
//! on, so the file length is the only integrity check a reader has.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};
use log::info;

use crate::binary::{file_len, write_atomic, write_f32s};
use crate::error::{ExportError, Result};
use crate::params::{LayerParams, ParameterSet};
use crate::topology::Topology;

/// Writes `parameters` for the default 784-128-64-10 topology.
pub fn export<P: AsRef<Path>>(parameters: &ParameterSet, path: P) -> Result<()> {
    export_with_topology(parameters, &Topology::mnist_mlp(), path)
}

/// Writes `parameters` to `path` in `topology`'s tensor order.
///
/// Shapes are checked before the file is touched; on any failure no file
/// that looks complete is left at `path`.
pub fn export_with_topology<P: AsRef<Path>>(
    parameters: &ParameterSet,
    topology: &Topology,
    path: P,
) -> Result<()> {
    let path = path.as_ref();
    parameters.validate(topology)?;
    info!("{}", parameters.summary(topology));

    let written = write_atomic(path, |w| {
        for tensor in parameters.tensors() {
            write_f32s::<LittleEndian, _>(w, tensor)?;
        }
        Ok(())
    })?;

    debug_assert_eq!(written, topology.weight_file_len());
    info!(
        "exported {} parameters ({} bytes) to {}",
        topology.param_count(),
        written,
        path.display()
    );
    Ok(())
}

/// Reads a weight file back into a [`ParameterSet`].
///
/// A file whose length is not exactly `topology.weight_file_len()` is
/// rejected before any element is decoded.
pub fn load_weights<P: AsRef<Path>>(path: P, topology: &Topology) -> Result<ParameterSet> {
    let path = path.as_ref();
    let expected = topology.weight_file_len();
    let actual = file_len(path)?;
    if actual != expected {
        return Err(ExportError::size_mismatch(path, expected, actual));
    }

    let file = File::open(path).map_err(|e| ExportError::io(path, e))?;
    let mut reader = BufReader::new(file);
    let mut read_tensor = |len: usize| -> Result<Vec<f32>> {
        let mut values = vec![0f32; len];
        reader
            .read_f32_into::<LittleEndian>(&mut values)
            .map_err(|e| ExportError::io(path, e))?;
        Ok(values)
    };

    let mut layers = Vec::with_capacity(topology.layers.len());
    for shape in &topology.layers {
        let weights = read_tensor(shape.weight_len())?;
        let bias = read_tensor(shape.bias_len())?;
        layers.push(LayerParams { weights, bias });
    }

    let mut rest = Vec::new();
    reader
        .read_to_end(&mut rest)
        .map_err(|e| ExportError::io(path, e))?;
    if !rest.is_empty() {
        return Err(ExportError::size_mismatch(
            path,
            expected,
            expected + rest.len() as u64,
        ));
    }
    Ok(ParameterSet::new(layers))
}
