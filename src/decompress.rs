//! Decompression of staged archives to newline-delimited JSON. One supported
//! format (`.zst`), two interchangeable strategies: shell out to the `zstd`
//! binary, or stream through the in-process decoder.

use crate::error::PipelineError;
use crate::util::{create_with_backoff, open_with_backoff, remove_with_backoff};
use anyhow::{Context, Result};
use std::fs;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::process::Command;
use zstd::stream::read::Decoder;

/// Strategy for turning `RC_YYYY-MM.zst` into `RC_YYYY-MM` JSONL.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decompression {
    /// Shell out to the external `zstd` tool (fastest on multi-core hosts).
    External,
    /// Stream through `zstd::stream::read::Decoder` in-process.
    InProcess,
}

/// Decompress `path` next to itself (extension stripped) and return the
/// output path and its byte size. Fails with `UnsupportedArchiveFormat`
/// before any work when the extension is not `.zst`.
///
/// The compressed input is deleted after success unless `keep_compressed`;
/// deletion failure is logged, never propagated.
pub fn decompress(path: &Path, strategy: Decompression, keep_compressed: bool) -> Result<(PathBuf, u64)> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    if ext != "zst" {
        return Err(PipelineError::UnsupportedArchiveFormat(format!(".{}", ext)).into());
    }
    let out_path = path.with_extension("");

    tracing::info!(src = %path.display(), strategy = ?strategy, "Decompressing archive");
    match strategy {
        Decompression::External => decompress_external(path, &out_path)?,
        Decompression::InProcess => decompress_in_process(path, &out_path)?,
    }

    if !keep_compressed {
        if let Err(e) = remove_with_backoff(path, 16, 50) {
            tracing::warn!(path = %path.display(), error = %e, "Could not delete compressed archive");
        }
    }

    let size = fs::metadata(&out_path)
        .with_context(|| format!("stat {}", out_path.display()))?
        .len();
    tracing::info!(out = %out_path.display(), bytes = size, "Decompression complete");
    Ok((out_path, size))
}

fn decompress_external(src: &Path, dest: &Path) -> Result<()> {
    let status = Command::new("zstd")
        .arg("-d")
        .arg("-f")
        .arg("-T0")
        .arg("--long=31")
        .arg(src)
        .arg("-o")
        .arg(dest)
        .status()
        .with_context(|| format!("spawn zstd for {}", src.display()))?;
    if !status.success() {
        anyhow::bail!("zstd exited with {} for {}", status, src.display());
    }
    Ok(())
}

fn decompress_in_process(src: &Path, dest: &Path) -> Result<()> {
    let file = open_with_backoff(src, 16, 50)
        .with_context(|| format!("open {}", src.display()))?;
    let mut decoder = Decoder::new(file)?;
    // Large monthly frames need a wide window to avoid
    // "Frame requires too much memory" failures.
    decoder.window_log_max(31)?;
    let out = create_with_backoff(dest, 16, 50)
        .with_context(|| format!("create {}", dest.display()))?;
    let mut writer = BufWriter::with_capacity(256 * 1024, out);
    io::copy(&mut decoder, &mut writer)
        .with_context(|| format!("decompress {}", src.display()))?;
    Ok(())
}
