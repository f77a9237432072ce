//! Typed failures for the stages whose callers branch on the cause; anything
//! else travels as a contextual `anyhow` error.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The remote directory listing could not be fetched or parsed.
    #[error("archive catalog unavailable: {0}")]
    CatalogUnavailable(String),

    /// An archive download did not complete.
    #[error("download of {url} failed: {reason}")]
    DownloadFailed { url: String, reason: String },

    /// The staged archive does not carry a supported compression extension.
    #[error("unsupported archive format {0}")]
    UnsupportedArchiveFormat(String),

    /// The store rejected or aborted a bulk import.
    #[error("bulk load into {collection} failed: {reason}")]
    BulkLoadFailed { collection: String, reason: String },

    /// An analyzer name outside the supported set.
    #[error("unknown sentiment analyzer {0:?} (expected \"vader\" or \"textblob\")")]
    InvalidAnalyzer(String),
}
