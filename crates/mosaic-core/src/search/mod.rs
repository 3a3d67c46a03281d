//! Near-duplicate search: ranking, index caching and record hydration.

mod cache;
mod hydrate;
mod similarity;

pub use cache::IndexCache;
pub use hydrate::Hydrator;
pub use similarity::{rank, SearchQuery, SimilaritySearch};
