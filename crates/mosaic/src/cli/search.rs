//! The `mosaic search` and `mosaic similar` commands.

use clap::Args;
use mosaic_core::{Config, SearchQuery};
use tokio_util::sync::CancellationToken;

use super::catalog;
use super::output::Output;

/// Arguments for the `search` command.
#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Perceptual hash to search for (four base-62 blocks joined by ':')
    #[arg(long, required = true)]
    pub hash: String,

    /// Maximum Hamming distance (0-256) [default: search.default_max_distance]
    #[arg(short = 'd', long)]
    pub max_distance: Option<u32>,

    /// Maximum number of results [default: search.default_limit]
    #[arg(short, long)]
    pub limit: Option<usize>,
}

/// Arguments for the `similar` command.
#[derive(Args, Debug)]
pub struct SimilarArgs {
    /// Id of a stored image to use as the query
    #[arg(required = true)]
    pub id: String,

    /// Maximum Hamming distance (0-256) [default: search.default_max_distance]
    #[arg(short = 'd', long)]
    pub max_distance: Option<u32>,

    /// Maximum number of results [default: search.default_limit]
    #[arg(short, long)]
    pub limit: Option<usize>,
}

/// Fill unset search parameters from the `[search]` config section.
fn resolve(config: &Config, max_distance: Option<u32>, limit: Option<usize>) -> (u32, usize) {
    (
        max_distance.unwrap_or(config.search.default_max_distance),
        limit.unwrap_or(config.search.default_limit),
    )
}

/// Execute the search command.
pub async fn execute_search(
    args: SearchArgs,
    config: &Config,
    output: &Output,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let (max_distance, limit) = resolve(config, args.max_distance, args.limit);
    let query = SearchQuery::new(args.hash.trim(), max_distance, limit);

    let service = catalog::open(config).await?;
    let results = service.search(&query, cancel).await?;
    tracing::debug!("{} result(s)", results.len());
    output.emit(&results)
}

/// Execute the similar command.
pub async fn execute_similar(
    args: SimilarArgs,
    config: &Config,
    output: &Output,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let id = catalog::parse_id(&args.id)?;
    let (max_distance, limit) = resolve(config, args.max_distance, args.limit);

    let service = catalog::open(config).await?;
    let results = service
        .search_similar_to(&id, max_distance, limit, cancel)
        .await?;
    tracing::debug!("{} result(s) similar to {id}", results.len());
    output.emit(&results)
}
