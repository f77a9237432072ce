//! Run driver: orchestrates fetch → decompress → bulk load → filter →
//! enrich → score over a catalog slice, one month at a time, persisting the
//! progress table after every month. Recovery is re-invocation with a slice
//! starting at the first `downloaded = false` entry.

use crate::catalog::{save_progress, CatalogEntry};
use crate::config::PipelineOptions;
use crate::decompress::decompress;
use crate::enrich::{enrich_month, MetadataApi, RedditInfoApi};
use crate::fetch::{Fetcher, HttpFetcher, RemoteSource};
use crate::filter::filter_month;
use crate::loader::bulk_load;
use crate::sentiment::score_month;
use crate::store::{DocumentStore, JsonlStore};
use crate::util::init_tracing_once;
use anyhow::{Context, Result};
use std::fs;
use std::ops::Range;
use std::time::Instant;

/// The pipeline with its injected collaborators. Collaborators are owned for
/// the lifetime of the run (opened once, closed on all exit paths) rather
/// than re-acquired inside each stage.
pub struct Pipeline {
    opts: PipelineOptions,
    store: Box<dyn DocumentStore>,
    fetcher: Box<dyn Fetcher>,
    metadata_api: Box<dyn MetadataApi>,
}

impl Pipeline {
    pub fn new(
        opts: PipelineOptions,
        store: Box<dyn DocumentStore>,
        fetcher: Box<dyn Fetcher>,
        metadata_api: Box<dyn MetadataApi>,
    ) -> Self {
        Self { opts, store, fetcher, metadata_api }
    }

    /// Production wiring: NDJSON store under the configured store dir,
    /// blocking HTTP fetcher, public metadata endpoint.
    pub fn with_defaults(opts: PipelineOptions) -> Result<Self> {
        let store = JsonlStore::open_with_buffers(
            &opts.store_dir,
            opts.read_buffer_bytes,
            opts.write_buffer_bytes,
        )?;
        let fetcher = HttpFetcher::new(opts.progress)?;
        let api = RedditInfoApi::new()?;
        Ok(Self::new(opts, Box::new(store), Box::new(fetcher), Box::new(api)))
    }

    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.opts
    }

    /// Process `catalog[range]` strictly in order. Each completed month is
    /// marked on its entry and the progress table is rewritten; a failed
    /// month stays unmarked and either aborts the run or is skipped,
    /// depending on `continue_on_error`.
    pub fn run(&self, catalog: &mut [CatalogEntry], range: Range<usize>) -> Result<()> {
        init_tracing_once();
        if let Some(n) = self.opts.parallelism {
            if n > 0 {
                rayon::ThreadPoolBuilder::new().num_threads(n).build_global().ok();
            }
        }
        fs::create_dir_all(&self.opts.staging_dir)
            .with_context(|| format!("create staging dir {}", self.opts.staging_dir.display()))?;

        let end = range.end.min(catalog.len());
        for idx in range.start..end {
            let month = catalog[idx].month.clone();
            let link = catalog[idx].link.clone();
            let started = Instant::now();
            tracing::info!(idx, month = %month, "Processing comments month");

            match self.process_month(&month, &link) {
                Ok((size_in_bytes, comment_count)) => {
                    let entry = &mut catalog[idx];
                    entry.downloaded = true;
                    entry.size_in_bytes = size_in_bytes;
                    entry.comment_count = comment_count;
                    save_progress(&self.opts.progress_path, catalog)?;
                    tracing::info!(
                        month = %month,
                        elapsed_s = started.elapsed().as_secs_f64(),
                        "Month complete"
                    );
                }
                Err(e) => {
                    // Entry stays unmarked; the progress table is persisted
                    // as-is so a re-run resumes from this month.
                    save_progress(&self.opts.progress_path, catalog)?;
                    if self.opts.continue_on_error {
                        tracing::warn!(month = %month, error = %format!("{:#}", e), "Month failed; continuing");
                        continue;
                    }
                    return Err(e.context(format!("month {}", month)));
                }
            }
        }
        Ok(())
    }

    /// One month, fixed stage order. Any stage error aborts the month before
    /// the next stage runs — a partially loaded collection is never filtered.
    fn process_month(&self, month: &str, link: &str) -> Result<(u64, u64)> {
        let source = match &self.opts.object_storage_bucket {
            Some(bucket) => {
                let key = link.rsplit('/').next().unwrap_or(link).to_string();
                RemoteSource::ObjectStorage { bucket: bucket.clone(), key }
            }
            None => RemoteSource::parse(link)?,
        };

        let staged = self.fetcher.fetch(&source, &self.opts.staging_dir)?;
        let (jsonl_path, size_in_bytes) =
            decompress(&staged, self.opts.decompression, self.opts.keep_compressed)?;

        bulk_load(self.store.as_ref(), month, &jsonl_path)?;
        let comment_count = filter_month(self.store.as_ref(), month, &self.opts.categories)?;

        // Enrichment and scoring are independent of each other; both read
        // only the curated collection produced by the filter stage.
        enrich_month(self.store.as_ref(), self.metadata_api.as_ref(), month)?;
        score_month(self.store.as_ref(), month, self.opts.analyzer, self.opts.progress)?;

        Ok((size_in_bytes, comment_count))
    }
}
