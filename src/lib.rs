//! Export boundary between a trained digit classifier and an independent
//! inference program.
//!
//! - Flat little-endian `f32` dump of a 784-128-64-10 MLP's weights and biases
//! - MNIST IDX images/labels files for the first N evaluation records
//! - Trainer checkpoint (`.pere`) and IDX dataset readers feeding the exporters
//! - Read-back verification of every artifact

pub mod binary;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod idx;
pub mod params;
pub mod sample;
pub mod topology;
pub mod verify;
pub mod weights;

pub use checkpoint::{load_checkpoint, save_checkpoint};
pub use config::ExportConfig;
pub use error::{ExportError, Result};
pub use idx::{export_images, export_labels, export_pair, export_sample, IdxFile, Image};
pub use params::{LayerParams, ParameterSet};
pub use sample::ImageLabelSample;
pub use topology::{LayerShape, TensorSpec, Topology};
pub use verify::{verify_sample, verify_weights, SampleReport};
pub use weights::{export as export_weights, export_with_topology, load_weights};
