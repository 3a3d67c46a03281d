//! The `mosaic ingest` command: files, directories and URLs into the catalog.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::Args;
use mosaic_core::pipeline::DiscoveredFile;
use mosaic_core::{
    Config, FileDiscovery, ImageService, MosaicError, NewImage, SourceReference,
};
use tokio_util::sync::CancellationToken;

use super::catalog;
use super::output::Output;

/// Arguments for the `ingest` command.
#[derive(Args, Debug)]
pub struct IngestArgs {
    /// Image file, directory, or http(s) URL to ingest
    #[arg(required = true)]
    pub input: String,

    /// Title for the ingested image(s)
    #[arg(long)]
    pub title: Option<String>,

    /// Alt text for the ingested image(s)
    #[arg(long)]
    pub alt_text: Option<String>,

    /// Tag to attach (repeatable)
    #[arg(short, long = "tag")]
    pub tags: Vec<String>,
}

impl IngestArgs {
    fn new_image(&self, source: SourceReference) -> NewImage {
        NewImage {
            source,
            title: self.title.clone().unwrap_or_default(),
            alt_text: self.alt_text.clone().unwrap_or_default(),
            tags: self.tags.iter().cloned().collect::<BTreeSet<_>>(),
        }
    }
}

/// What the input argument refers to.
#[derive(Debug, PartialEq)]
enum Input {
    Url(String),
    File(PathBuf),
    Directory(PathBuf),
}

fn classify(input: &str) -> anyhow::Result<Input> {
    let lower = input.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return Ok(Input::Url(input.to_string()));
    }

    let path = Path::new(input);
    if path.is_dir() {
        Ok(Input::Directory(path.to_path_buf()))
    } else if path.is_file() {
        Ok(Input::File(path.to_path_buf()))
    } else {
        anyhow::bail!(
            "Input path does not exist: {:?}\n\n  Hint: Check the file path and try again.",
            path
        )
    }
}

/// Execute the ingest command.
pub async fn execute(
    args: IngestArgs,
    config: &Config,
    output: &Output,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let input = classify(&args.input)?;
    let service = catalog::open(config).await?;

    match input {
        Input::Url(url) => {
            let record = service
                .create(args.new_image(SourceReference::Remote(url)), cancel)
                .await?;
            output.emit(&record)
        }
        Input::File(path) => {
            let record = service
                .create(args.new_image(SourceReference::Local(path)), cancel)
                .await?;
            output.emit(&record)
        }
        Input::Directory(dir) => {
            let files = FileDiscovery.discover(&dir);
            if files.is_empty() {
                tracing::warn!("No supported images found in {:?}", dir);
                return Ok(());
            }
            tracing::info!(
                "Found {} image(s), {:.1} MB",
                files.len(),
                FileDiscovery::total_size(&files) as f64 / 1_000_000.0
            );
            ingest_batch(&service, &args, files, output, cancel).await
        }
    }
}

/// Ingest discovered files one by one, streaming each record as a JSON line.
async fn ingest_batch(
    service: &ImageService,
    args: &IngestArgs,
    files: Vec<DiscoveredFile>,
    output: &Output,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let progress = create_progress_bar(files.len() as u64);
    let start_time = Instant::now();

    let mut succeeded: u64 = 0;
    let mut failed: u64 = 0;
    let mut total_bytes: u64 = 0;

    for file in &files {
        let source = SourceReference::Local(file.path.clone());
        match service.create(args.new_image(source), cancel).await {
            Ok(record) => {
                succeeded += 1;
                total_bytes += record.file_size;
                progress.suspend(|| output.emit_line(&record))?;
            }
            Err(MosaicError::Canceled) => {
                progress.abandon_with_message("canceled");
                anyhow::bail!(
                    "Ingestion canceled after {} of {} file(s)",
                    succeeded + failed,
                    files.len()
                );
            }
            Err(e) => {
                failed += 1;
                tracing::error!("Failed: {:?} - {}", file.path, e);
            }
        }

        progress.inc(1);
        let elapsed = start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            progress.set_message(format!("{:.1} img/sec", (succeeded + failed) as f64 / elapsed));
        }
    }

    progress.finish_and_clear();
    print_summary(succeeded, failed, total_bytes, start_time.elapsed());

    if succeeded == 0 {
        anyhow::bail!("No images were ingested ({failed} failed)");
    }
    Ok(())
}

/// Create a progress bar for batch ingestion.
fn create_progress_bar(total: u64) -> indicatif::ProgressBar {
    use indicatif::{ProgressBar, ProgressStyle};

    let pb = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
        )
        .map(|style| style.progress_chars("##-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb.set_message("starting...");
    pb
}

/// Print a summary after batch ingestion.
fn print_summary(succeeded: u64, failed: u64, total_bytes: u64, elapsed: Duration) {
    let secs = elapsed.as_secs_f64();
    let rate = if secs > 0.0 { succeeded as f64 / secs } else { 0.0 };
    let throughput = if secs > 0.0 {
        total_bytes as f64 / 1_000_000.0 / secs
    } else {
        0.0
    };

    eprintln!();
    eprintln!("  ====================================");
    eprintln!("            Ingest summary");
    eprintln!("  ====================================");
    eprintln!("    Ingested:     {:>8}", succeeded);
    if failed > 0 {
        eprintln!("    Failed:       {:>8}", failed);
    }
    eprintln!("  ------------------------------------");
    eprintln!("    Duration:     {:>7.1}s", secs);
    eprintln!("    Rate:         {:>7.1} img/sec", rate);
    eprintln!("    Throughput:   {:>7.1} MB/sec", throughput);
    eprintln!("  ====================================");
}
