//! The stateless `mosaic hash` and `mosaic distance` commands.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use mosaic_core::phash::HASH_BITS;
use mosaic_core::{Analyzer, Config, ImageRecord, MediaType, PerceptualHash, SourceReference};
use serde::Serialize;

/// Arguments for the `hash` command.
#[derive(Args, Debug)]
pub struct HashArgs {
    /// Image file to fingerprint
    #[arg(required = true)]
    pub file: PathBuf,
}

/// Arguments for the `distance` command.
#[derive(Args, Debug)]
pub struct DistanceArgs {
    /// First perceptual hash
    pub a: String,

    /// Second perceptual hash
    pub b: String,
}

/// Fingerprint of a single file.
#[derive(Debug, Serialize)]
struct HashReport {
    path: PathBuf,
    media_type: Option<MediaType>,
    width: u32,
    height: u32,
    file_size: u64,
    content_hash: String,
    perceptual_hash: String,
}

#[derive(Debug, Serialize)]
struct DistanceReport {
    distance: u32,
    max_distance: u32,
}

/// Execute the hash command.
pub async fn execute_hash(
    args: HashArgs,
    config: &Config,
    output: &super::output::Output,
) -> anyhow::Result<()> {
    if !args.file.exists() {
        anyhow::bail!(
            "Input file does not exist: {:?}\n\n  Hint: Check the file path and try again.",
            args.file
        );
    }
    let bytes = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("Failed to read {:?}", args.file))?;

    let analyzer = Analyzer::new(config);
    let record = ImageRecord::new(SourceReference::Local(args.file.clone()));
    let analyzed = analyzer.analyze(&bytes, record).await?;

    output.emit(&HashReport {
        path: args.file,
        media_type: analyzed.media_type,
        width: analyzed.width,
        height: analyzed.height,
        file_size: analyzed.file_size,
        content_hash: analyzed.content_hash,
        perceptual_hash: analyzed.perceptual_hash,
    })
}

/// Execute the distance command.
pub fn execute_distance(args: DistanceArgs, output: &super::output::Output) -> anyhow::Result<()> {
    output.emit(&distance_report(&args.a, &args.b)?)
}

fn distance_report(a: &str, b: &str) -> anyhow::Result<DistanceReport> {
    let distance = PerceptualHash::distance_between(a.trim(), b.trim())?;
    Ok(DistanceReport {
        distance,
        max_distance: HASH_BITS,
    })
}
