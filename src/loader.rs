//! Bulk load: hand one month's decompressed JSONL file to the store's
//! high-throughput import path. Row-by-row insertion is far too slow at
//! archive scale (millions of records per month).

use crate::error::PipelineError;
use crate::store::{raw_collection, DocumentStore};
use crate::util::remove_with_backoff;
use anyhow::Result;
use std::path::Path;
use std::time::Instant;

#[derive(Clone, Debug)]
pub struct LoadResult {
    pub collection: String,
    pub records: u64,
}

/// Import `path` into the month's raw collection. On success the local file
/// is deleted to free disk for the next month; on failure the file is left
/// in place for manual retry and `BulkLoadFailed` propagates.
pub fn bulk_load(store: &dyn DocumentStore, month: &str, path: &Path) -> Result<LoadResult> {
    let collection = raw_collection(month);
    tracing::info!(month, collection = %collection, file = %path.display(), "Bulk loading archive");
    let started = Instant::now();

    let records = store.bulk_import(&collection, path).map_err(|e| PipelineError::BulkLoadFailed {
        collection: collection.clone(),
        reason: e.to_string(),
    })?;

    if let Err(e) = remove_with_backoff(path, 16, 50) {
        tracing::warn!(path = %path.display(), error = %e, "Could not delete decompressed file");
    }

    tracing::info!(
        records,
        elapsed_s = started.elapsed().as_secs_f64(),
        "Bulk load complete"
    );
    Ok(LoadResult { collection, records })
}
