use crate::decompress::Decompression;
use crate::sentiment::Analyzer;
use std::path::{Path, PathBuf};

/// Default category allow-list used by the filter stage when the caller does
/// not supply one (the high-traffic political/sports set the corpus study
/// tracks).
pub const DEFAULT_CATEGORIES: [&str; 4] = ["politics", "sports", "worldnews", "The_Donald"];

/// User-facing options with sensible defaults and builder chaining.
#[derive(Clone, Debug)]
pub struct PipelineOptions {
    pub staging_dir: PathBuf,        // downloads + decompressed archives land here
    pub store_dir: PathBuf,          // document-store root
    pub progress_path: PathBuf,      // catalog progress TSV, rewritten per month
    pub categories: Vec<String>,     // subreddit allow-list for the filter stage
    pub analyzer: Analyzer,          // which sentiment field the score stage writes
    pub decompression: Decompression,
    pub keep_compressed: bool,       // keep the .zst after successful decompression
    pub continue_on_error: bool,     // skip to the next month on a stage failure
    pub object_storage_bucket: Option<String>, // mirror bucket overriding catalog URLs
    pub progress: bool,              // show progress bars
    pub parallelism: Option<usize>,  // Some(N) to size the rayon pool for scoring

    // IO tuning
    pub read_buffer_bytes: usize,    // BufReader capacity
    pub write_buffer_bytes: usize,   // BufWriter capacity
}

impl Default for PipelineOptions {
    fn default() -> Self {
        let staging = PathBuf::from("./data/comment_files");
        // Defaults chosen to be safe but noticeably faster than std defaults.
        let default_read = 256 * 1024;
        let default_write = 256 * 1024;

        Self {
            progress_path: staging.join("catalog_progress.tsv"),
            staging_dir: staging,
            store_dir: PathBuf::from("./data/store"),
            categories: DEFAULT_CATEGORIES.iter().map(|s| s.to_string()).collect(),
            analyzer: Analyzer::Vader,
            decompression: Decompression::InProcess,
            keep_compressed: false,
            continue_on_error: false,
            object_storage_bucket: None,
            progress: true,
            parallelism: None,

            read_buffer_bytes: default_read,
            write_buffer_bytes: default_write,
        }
    }
}

impl PipelineOptions {
    pub fn with_staging_dir(mut self, dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref().to_path_buf();
        self.progress_path = dir.join("catalog_progress.tsv");
        self.staging_dir = dir;
        self
    }
    pub fn with_store_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.store_dir = dir.as_ref().to_path_buf();
        self
    }
    pub fn with_progress_path(mut self, path: impl AsRef<Path>) -> Self {
        self.progress_path = path.as_ref().to_path_buf();
        self
    }
    pub fn with_categories<I, S>(mut self, cats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = cats.into_iter().map(Into::into).collect();
        self
    }
    pub fn with_analyzer(mut self, analyzer: Analyzer) -> Self {
        self.analyzer = analyzer;
        self
    }
    pub fn with_decompression(mut self, strategy: Decompression) -> Self {
        self.decompression = strategy;
        self
    }
    pub fn with_keep_compressed(mut self, yes: bool) -> Self {
        self.keep_compressed = yes;
        self
    }
    pub fn with_continue_on_error(mut self, yes: bool) -> Self {
        self.continue_on_error = yes;
        self
    }
    pub fn with_object_storage_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.object_storage_bucket = Some(bucket.into());
        self
    }
    pub fn with_progress(mut self, yes: bool) -> Self {
        self.progress = yes;
        self
    }
    pub fn with_parallelism(mut self, threads: usize) -> Self {
        self.parallelism = Some(threads);
        self
    }

    // IO buffers tuning
    pub fn with_io_read_buffer(mut self, bytes: usize) -> Self {
        self.read_buffer_bytes = bytes.max(8 * 1024);
        self
    }
    pub fn with_io_write_buffer(mut self, bytes: usize) -> Self {
        self.write_buffer_bytes = bytes.max(8 * 1024);
        self
    }
}
