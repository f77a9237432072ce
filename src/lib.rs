mod config;
mod date;
mod error;
mod mem;
mod progress;
mod util;

mod catalog;
mod decompress;
mod enrich;
mod fetch;
mod filter;
mod loader;
mod pipeline;
mod sentiment;
mod stats;
mod store;

pub use crate::config::{PipelineOptions, DEFAULT_CATEGORIES};
pub use crate::date::{iter_year_months, YearMonth};
pub use crate::error::PipelineError;
pub use crate::pipeline::Pipeline;

pub use crate::catalog::{
    load_progress, month_from_archive_name, parse_listing, resolve, save_progress, CatalogEntry,
};
pub use crate::decompress::{decompress, Decompression};
pub use crate::enrich::{enrich_month, MetadataApi, ParentEntityMetadata, RedditInfoApi};
pub use crate::fetch::{Fetcher, HttpFetcher, RemoteSource};
pub use crate::filter::{filter_month, is_relevant, project_curated};
pub use crate::loader::{bulk_load, LoadResult};
pub use crate::sentiment::{
    is_scorable, score_month, Analyzer, PatternModel, SentimentModel, VaderModel,
};
pub use crate::stats::{
    build_posts_all, get_sentiment, monthly_stats, monthly_stats_top_posts, MonthlyStats,
};
pub use crate::store::{
    curated_collection, posts_collection, raw_collection, CollectionWriter, DocumentStore,
    FieldUpdate, JsonlStore, POSTS_ALL,
};

// Expose progress helpers and tracing init for the binary.
pub use crate::progress::{make_count_progress, make_progress_bar_labeled};
pub use crate::util::init_tracing_once;
