//! Tracing setup and retrying file primitives. The staging directory may sit
//! on a network share or behind a virus scanner, either of which can refuse
//! an open, create, rename, or delete that succeeds moments later; every
//! file operation the pipeline depends on goes through a short retry loop.

use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io;
use std::path::Path;
use std::thread;
use std::time::Duration;

static TRACING: std::sync::Once = std::sync::Once::new();

/// Install the global tracing subscriber once, honoring `RUST_LOG`
/// (defaulting to `info`). Safe to call from both the binary and tests.
pub fn init_tracing_once() {
    TRACING.call_once(|| {
        let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    });
}

// OS error codes that denote a transient refusal rather than a real failure:
// access denied / sharing and lock violations, scanner-blocked files, and
// flaky removable or remote volumes.
fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.raw_os_error(),
        Some(5 | 21 | 32 | 33 | 225 | 433 | 1006 | 1117 | 1224)
    )
}

/// Run `op` up to `tries` times with linearly growing sleeps between
/// attempts, retrying only transient errors.
fn retry_io<T>(
    tries: usize,
    delay_ms: u64,
    mut op: impl FnMut() -> io::Result<T>,
) -> io::Result<T> {
    let tries = tries.max(1);
    let mut last: Option<io::Error> = None;
    for attempt in 0..tries {
        match op() {
            Ok(v) => return Ok(v),
            Err(e) if is_transient(&e) => {
                last = Some(e);
                thread::sleep(Duration::from_millis(delay_ms.saturating_mul(attempt as u64 + 1)));
            }
            Err(e) => return Err(e),
        }
    }
    Err(last.unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "retries exhausted")))
}

pub fn open_with_backoff(path: &Path, tries: usize, delay_ms: u64) -> io::Result<File> {
    retry_io(tries, delay_ms, || File::open(path))
}

pub fn create_with_backoff(path: &Path, tries: usize, delay_ms: u64) -> io::Result<File> {
    retry_io(tries, delay_ms, || File::create(path))
}

/// Delete with retries; a file that is already gone counts as removed.
pub fn remove_with_backoff(path: &Path, tries: usize, delay_ms: u64) -> Result<()> {
    retry_io(tries, delay_ms, || match fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    })
    .with_context(|| format!("remove {}", path.display()))
}

/// Promote `tmp` over `dest`. Rename is the normal path; when the target
/// volume refuses the rename even after retries, fall back to copy + delete
/// so the promotion still lands.
pub fn replace_file_atomic_backoff(tmp: &Path, dest: &Path) -> Result<()> {
    const TRIES: usize = 20;
    const DELAY_MS: u64 = 50;

    if dest.exists() {
        remove_with_backoff(dest, TRIES, DELAY_MS)?;
    }
    if retry_io(TRIES, DELAY_MS, || fs::rename(tmp, dest)).is_ok() {
        return Ok(());
    }
    retry_io(TRIES, DELAY_MS, || fs::copy(tmp, dest).map(|_| ()))
        .with_context(|| format!("promote {} -> {}", tmp.display(), dest.display()))?;
    remove_with_backoff(tmp, TRIES, DELAY_MS)
}
