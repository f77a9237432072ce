use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rcsent::{
    build_posts_all, get_sentiment, init_tracing_once, load_progress, monthly_stats,
    monthly_stats_top_posts, resolve, save_progress, Analyzer, Decompression, JsonlStore,
    Pipeline, PipelineOptions,
};
use std::path::PathBuf;
use std::str::FromStr;

const DEFAULT_LISTING_URL: &str = "https://files.pushshift.io/reddit/comments/";

#[derive(Parser)]
#[command(name = "rcsent", version, about = "Reddit comment ingestion and sentiment-aggregation pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve the remote archive catalog and write a fresh progress table.
    Catalog {
        /// Remote directory listing URL.
        #[arg(long, default_value = DEFAULT_LISTING_URL)]
        listing_url: String,
        /// Where to write the progress TSV.
        #[arg(long, default_value = "./data/comment_files/catalog_progress.tsv")]
        out: PathBuf,
    },
    /// Process a slice of the catalog: fetch, load, filter, enrich, score.
    Run {
        /// Progress TSV produced by `catalog` (and rewritten as months complete).
        #[arg(long)]
        progress_file: PathBuf,
        /// First catalog index to process (inclusive).
        #[arg(long)]
        start: usize,
        /// Last catalog index to process (inclusive).
        #[arg(long)]
        end: usize,
        /// Comma-separated subreddit allow-list for the filter stage.
        #[arg(long, value_delimiter = ',')]
        categories: Option<Vec<String>>,
        /// Sentiment analyzer: vader or textblob.
        #[arg(long, default_value = "vader")]
        analyzer: String,
        #[arg(long, default_value = "./data/comment_files")]
        staging_dir: PathBuf,
        #[arg(long, default_value = "./data/store")]
        store_dir: PathBuf,
        /// Download archives from this object-storage bucket instead of the
        /// catalog's HTTP links.
        #[arg(long)]
        s3_bucket: Option<String>,
        /// Decompress via the external zstd tool instead of in-process.
        #[arg(long)]
        external_decompress: bool,
        /// Keep the compressed archive after decompression.
        #[arg(long)]
        keep_compressed: bool,
        /// Skip to the next month when a stage fails instead of aborting.
        #[arg(long)]
        continue_on_error: bool,
        /// Disable progress bars.
        #[arg(long)]
        no_progress: bool,
    },
    /// Monthly summary statistics for one month.
    Stats {
        #[arg(long)]
        month: String,
        #[arg(long)]
        category: Option<String>,
        #[arg(long, default_value = "vader")]
        analyzer: String,
        #[arg(long, default_value = "./data/store")]
        store_dir: PathBuf,
    },
    /// Summary statistics for one month range, driven by the progress table.
    StatsRange {
        #[arg(long)]
        progress_file: PathBuf,
        #[arg(long)]
        start: usize,
        #[arg(long)]
        end: usize,
        #[arg(long)]
        category: Option<String>,
        #[arg(long, default_value = "vader")]
        analyzer: String,
        #[arg(long, default_value = "./data/store")]
        store_dir: PathBuf,
    },
    /// Statistics over the comments of a category's top-scored posts.
    StatsTop {
        /// Comma-separated months (YYYY-MM); the first selects the ranking.
        #[arg(long, value_delimiter = ',')]
        months: Vec<String>,
        #[arg(long)]
        category: String,
        #[arg(long, default_value_t = 100)]
        limit: usize,
        #[arg(long, default_value = "vader")]
        analyzer: String,
        #[arg(long, default_value = "./data/store")]
        store_dir: PathBuf,
        /// Rebuild the aggregate posts table from the per-month collections
        /// before ranking.
        #[arg(long)]
        rebuild_posts_all: bool,
    },
}

fn main() -> Result<()> {
    init_tracing_once();
    let cli = Cli::parse();

    match cli.command {
        Command::Catalog { listing_url, out } => {
            let client = reqwest::blocking::Client::builder()
                .user_agent(concat!("rcsent/", env!("CARGO_PKG_VERSION")))
                .build()?;
            let entries = resolve(&client, &listing_url)?;
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent)?;
            }
            save_progress(&out, &entries)?;
            println!("{} months catalogued -> {}", entries.len(), out.display());
        }
        Command::Run {
            progress_file,
            start,
            end,
            categories,
            analyzer,
            staging_dir,
            store_dir,
            s3_bucket,
            external_decompress,
            keep_compressed,
            continue_on_error,
            no_progress,
        } => {
            let analyzer = Analyzer::from_str(&analyzer)?;
            let mut opts = PipelineOptions::default()
                .with_staging_dir(&staging_dir)
                .with_store_dir(&store_dir)
                .with_progress_path(&progress_file)
                .with_analyzer(analyzer)
                .with_keep_compressed(keep_compressed)
                .with_continue_on_error(continue_on_error)
                .with_progress(!no_progress);
            if let Some(cats) = categories {
                opts = opts.with_categories(cats);
            }
            if let Some(bucket) = s3_bucket {
                opts = opts.with_object_storage_bucket(bucket);
            }
            if external_decompress {
                opts = opts.with_decompression(Decompression::External);
            }

            let mut catalog = load_progress(&progress_file)
                .with_context(|| format!("load progress table {}", progress_file.display()))?;
            let pipeline = Pipeline::with_defaults(opts)?;
            pipeline.run(&mut catalog, start..end.saturating_add(1))?;
        }
        Command::Stats { month, category, analyzer, store_dir } => {
            let analyzer = Analyzer::from_str(&analyzer)?;
            let store = JsonlStore::open(&store_dir)?;
            let stats = monthly_stats(&store, &month, category.as_deref(), analyzer)?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Command::StatsRange { progress_file, start, end, category, analyzer, store_dir } => {
            let analyzer = Analyzer::from_str(&analyzer)?;
            let store = JsonlStore::open(&store_dir)?;
            let catalog = load_progress(&progress_file)?;
            let by_month = get_sentiment(&store, start, end, &catalog, category.as_deref(), analyzer)?;
            println!("{}", serde_json::to_string_pretty(&by_month)?);
        }
        Command::StatsTop { months, category, limit, analyzer, store_dir, rebuild_posts_all } => {
            let analyzer = Analyzer::from_str(&analyzer)?;
            let store = JsonlStore::open(&store_dir)?;
            if rebuild_posts_all {
                let n = build_posts_all(&store, &months)?;
                tracing::info!(records = n, "Rebuilt aggregate posts table");
            }
            let stats = monthly_stats_top_posts(&store, &months, &category, limit, analyzer)?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }
    Ok(())
}
