//! Archive catalog: discovers monthly comment archives from the remote
//! directory listing and persists per-run progress as a flat TSV, the sole
//! on-disk recovery artifact.

use crate::error::PipelineError;
use crate::util::{create_with_backoff, open_with_backoff, replace_file_atomic_backoff};
use anyhow::{Context, Result};
use regex::Regex;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

/// One published monthly archive and its processing status.
/// `downloaded == true` implies the month's curated collection exists and
/// `size_in_bytes > 0`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub month: String, // YYYY-MM
    pub link: String,
    pub downloaded: bool,
    pub size_in_bytes: u64,
    pub comment_count: u64,
}

/// Comment archives are named `RC_<YYYY-MM>.<ext>`; the prefix marks the
/// content type and the extension the compression format.
fn comment_archive_re() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^RC_(\d{4}-\d{2})\.[A-Za-z0-9.]+$").unwrap())
}

/// Parse the remote directory listing (an HTML table, one row per file) into
/// catalog entries, preserving listing order (chronological). Rows whose
/// filename does not carry the comment prefix or a parseable month are
/// skipped.
pub fn parse_listing(html: &str, base_url: &str) -> Vec<CatalogEntry> {
    let doc = Html::parse_document(html);
    let row_sel = Selector::parse("table tr").unwrap();
    let link_sel = Selector::parse("a").unwrap();

    let base = base_url.trim_end_matches('/');
    let mut entries = Vec::new();
    for row in doc.select(&row_sel) {
        let Some(a) = row.select(&link_sel).next() else { continue };
        let filename = a.text().collect::<String>();
        let filename = filename.trim();
        let Some(month) = month_from_archive_name(filename) else { continue };
        entries.push(CatalogEntry {
            month,
            link: format!("{}/{}", base, filename),
            downloaded: false,
            size_in_bytes: 0,
            comment_count: 0,
        });
    }
    entries
}

/// `RC_2012-03.zst` -> `2012-03`; anything that is not a comment archive or
/// whose month segment does not parse yields None.
pub fn month_from_archive_name(filename: &str) -> Option<String> {
    let caps = comment_archive_re().captures(filename)?;
    let month = caps.get(1)?.as_str();
    crate::date::YearMonth::from_str(month).ok()?;
    Some(month.to_string())
}

/// Fetch and parse the remote listing. Fails with `CatalogUnavailable` if the
/// listing cannot be retrieved or parses to an empty table; no retries, the
/// caller decides.
pub fn resolve(client: &reqwest::blocking::Client, listing_url: &str) -> Result<Vec<CatalogEntry>> {
    tracing::info!(url = listing_url, "Resolving archive catalog");
    let resp = client
        .get(listing_url)
        .send()
        .map_err(|e| PipelineError::CatalogUnavailable(e.to_string()))?;
    if !resp.status().is_success() {
        return Err(PipelineError::CatalogUnavailable(format!(
            "{} returned HTTP {}",
            listing_url,
            resp.status()
        ))
        .into());
    }
    let body = resp
        .text()
        .map_err(|e| PipelineError::CatalogUnavailable(e.to_string()))?;

    let entries = parse_listing(&body, listing_url);
    if entries.is_empty() {
        return Err(PipelineError::CatalogUnavailable(format!(
            "no comment archives found in listing at {}",
            listing_url
        ))
        .into());
    }
    tracing::info!(months = entries.len(), "Catalog resolved");
    Ok(entries)
}

const PROGRESS_HEADER: &str = "month\tlink\tdownloaded\tsize_in_bytes\tcomment_count";

/// Rewrite the progress TSV atomically (write to a sibling temp file, then
/// promote). Called after every completed month so a crash never leaves a
/// torn table behind.
pub fn save_progress(path: &Path, entries: &[CatalogEntry]) -> Result<()> {
    let tmp = path.with_extension("tsv.tmp");
    {
        let f = create_with_backoff(&tmp, 16, 50)
            .with_context(|| format!("create {}", tmp.display()))?;
        let mut w = BufWriter::new(f);
        writeln!(w, "{}", PROGRESS_HEADER)?;
        for e in entries {
            writeln!(
                w,
                "{}\t{}\t{}\t{}\t{}",
                e.month, e.link, e.downloaded, e.size_in_bytes, e.comment_count
            )?;
        }
        w.flush()?;
    }
    replace_file_atomic_backoff(&tmp, path)
}

/// Load a previously saved progress table. Malformed rows are an error: the
/// progress file is the only recovery artifact, so silently dropping rows
/// would silently re-process months.
pub fn load_progress(path: &Path) -> Result<Vec<CatalogEntry>> {
    let f = open_with_backoff(path, 16, 50)
        .with_context(|| format!("open {}", path.display()))?;
    let r = BufReader::new(f);
    let mut entries = Vec::new();
    for (idx, line) in r.lines().enumerate() {
        let line = line?;
        if idx == 0 {
            if line != PROGRESS_HEADER {
                anyhow::bail!("unexpected progress header in {}: {}", path.display(), line);
            }
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }
        let cols: Vec<&str> = line.split('\t').collect();
        if cols.len() != 5 {
            anyhow::bail!("malformed progress row {} in {}: {}", idx + 1, path.display(), line);
        }
        entries.push(CatalogEntry {
            month: cols[0].to_string(),
            link: cols[1].to_string(),
            downloaded: cols[2].parse().with_context(|| format!("row {} downloaded flag", idx + 1))?,
            size_in_bytes: cols[3].parse().with_context(|| format!("row {} size", idx + 1))?,
            comment_count: cols[4].parse().with_context(|| format!("row {} count", idx + 1))?,
        });
    }
    Ok(entries)
}
