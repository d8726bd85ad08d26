// export_tool/src/main.rs
use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;
use mlp_export::{
    export_sample, export_with_topology, load_checkpoint, verify_sample, verify_weights,
    ExportConfig, IdxFile, ImageLabelSample,
};
use std::fs;
use std::path::PathBuf;

/// Export a trained MLP checkpoint and the first N MNIST test records for the
/// standalone inference program.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// JSON config file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Trainer checkpoint (.pere)
    #[arg(long)]
    checkpoint: Option<PathBuf>,

    /// MNIST test images (IDX, raw or .gz)
    #[arg(long)]
    test_images: Option<PathBuf>,

    /// MNIST test labels (IDX, raw or .gz)
    #[arg(long)]
    test_labels: Option<PathBuf>,

    /// Directory the weight and sample files are written to
    #[arg(short, long)]
    out_dir: Option<PathBuf>,

    /// Number of leading test records to export
    #[arg(short = 'n', long)]
    samples: Option<usize>,

    /// Skip re-reading the artifacts after export
    #[arg(long)]
    no_verify: bool,
}

impl Args {
    fn into_config(self) -> Result<ExportConfig> {
        let mut cfg = match &self.config {
            Some(path) => ExportConfig::load(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => ExportConfig::default(),
        };
        if let Some(p) = self.checkpoint {
            cfg.checkpoint = p;
        }
        if let Some(p) = self.test_images {
            cfg.test_images = p;
        }
        if let Some(p) = self.test_labels {
            cfg.test_labels = p;
        }
        if let Some(p) = self.out_dir {
            cfg.out_dir = p;
        }
        if let Some(n) = self.samples {
            cfg.sample_count = n;
        }
        if self.no_verify {
            cfg.verify = false;
        }
        Ok(cfg)
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cfg = Args::parse().into_config()?;
    fs::create_dir_all(&cfg.out_dir)
        .with_context(|| format!("creating {}", cfg.out_dir.display()))?;

    // Weights
    let params = load_checkpoint(&cfg.checkpoint)?;
    export_with_topology(&params, &cfg.topology, cfg.weights_path())?;

    // Test slice
    let images = IdxFile::open(&cfg.test_images)?;
    let labels = IdxFile::open(&cfg.test_labels)?;
    let sample = ImageLabelSample::first_n(&images, &labels, cfg.sample_count)?;
    export_sample(&sample, cfg.images_path(), cfg.labels_path())?;

    if cfg.verify {
        let reloaded = verify_weights(cfg.weights_path(), &cfg.topology)?;
        if reloaded != params {
            bail!("{} does not read back bit-exact", cfg.weights_path().display());
        }
        let report = verify_sample(cfg.images_path(), cfg.labels_path())?;
        if report.count != sample.len() {
            bail!(
                "sample files declare {} records, expected {}",
                report.count,
                sample.len()
            );
        }
        info!("verified weights and {} sample records", report.count);
    }

    println!("Weights: {}", cfg.weights_path().display());
    println!("Images:  {}", cfg.images_path().display());
    println!("Labels:  {}", cfg.labels_path().display());
    Ok(())
}
