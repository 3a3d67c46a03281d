//! Opening the on-disk catalog used by the stateful commands.

use std::sync::Arc;

use anyhow::Context;
use mosaic_core::{
    Config, DefaultFetcher, FsObjectStore, ImageId, ImageService, MemoryMetadataStore,
};

/// Build an [`ImageService`] over the catalog snapshot and object directory
/// named by `config`.
pub async fn open(config: &Config) -> anyhow::Result<ImageService> {
    let catalog_path = config.catalog_path();
    let metadata = MemoryMetadataStore::open(&catalog_path)
        .await
        .with_context(|| format!("Failed to open catalog at {}", catalog_path.display()))?;
    let objects = FsObjectStore::new(config.objects_dir());
    let fetcher = DefaultFetcher::new(&config.limits);

    tracing::debug!(
        "Catalog: {} ({} records), objects: {}",
        catalog_path.display(),
        metadata.len().await,
        objects.root().display()
    );

    Ok(ImageService::new(
        config,
        Arc::new(metadata),
        Arc::new(objects),
        Arc::new(fetcher),
    ))
}

/// Parse an image id argument.
pub fn parse_id(text: &str) -> anyhow::Result<ImageId> {
    text.trim()
        .parse::<ImageId>()
        .with_context(|| format!("Invalid image id: {text:?}"))
}
