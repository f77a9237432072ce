//! Metadata enrichment: look up the parent post behind every distinct
//! `link_id` in a month's curated comments and persist one metadata record
//! per post. The lookup API is external, rate-limited, and fallible.

use crate::store::{curated_collection, posts_collection, DocumentStore};
use ahash::AHashSet;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};

/// Metadata for one parent entity (the post a top-level comment replies to).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParentEntityMetadata {
    pub link_id: String,
    pub title: String,
    pub score: i64,
    pub is_self: bool,
    pub datetime: f64, // epoch seconds, as the platform reports it
    pub sub: String,
    pub permalink: String,
}

/// Narrow lookup boundary so tests can stub the external API.
pub trait MetadataApi {
    /// Fetch metadata for the given fullname ids (`t3_`-prefixed). Results
    /// may be fewer than requested; unknown ids are simply absent.
    fn lookup(&self, ids: &[String]) -> Result<Vec<ParentEntityMetadata>>;
}

/// The platform's `/api/info` endpoint accepts at most this many ids per
/// request.
const INFO_BATCH: usize = 100;

/// Blocking adapter over the public info endpoint.
pub struct RedditInfoApi {
    client: reqwest::blocking::Client,
    base_url: String,
    batch_pause: Duration,
}

impl RedditInfoApi {
    pub fn new() -> Result<Self> {
        Self::with_base_url("https://www.reddit.com")
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("rcsent/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            batch_pause: Duration::from_secs(1),
        })
    }
}

impl MetadataApi for RedditInfoApi {
    fn lookup(&self, ids: &[String]) -> Result<Vec<ParentEntityMetadata>> {
        let mut out = Vec::with_capacity(ids.len());
        for (i, chunk) in ids.chunks(INFO_BATCH).enumerate() {
            if i > 0 {
                // The endpoint is rate-limited; pace batches rather than retry.
                std::thread::sleep(self.batch_pause);
            }
            let url = format!("{}/api/info.json?id={}", self.base_url, chunk.join(","));
            let resp = self
                .client
                .get(&url)
                .send()
                .with_context(|| format!("metadata lookup batch {}", i))?
                .error_for_status()
                .with_context(|| format!("metadata lookup batch {}", i))?;
            let body: Value = resp.json().context("parse metadata response")?;

            let children = body
                .pointer("/data/children")
                .and_then(|v| v.as_array())
                .cloned()
                .unwrap_or_default();
            for child in children {
                let Some(data) = child.get("data") else { continue };
                let Some(id) = data.get("id").and_then(|v| v.as_str()) else { continue };
                out.push(ParentEntityMetadata {
                    link_id: id.to_string(),
                    title: data.get("title").and_then(|v| v.as_str()).unwrap_or("").to_string(),
                    score: data.get("score").and_then(|v| v.as_i64()).unwrap_or(0),
                    is_self: data.get("is_self").and_then(|v| v.as_bool()).unwrap_or(false),
                    datetime: data.get("created_utc").and_then(|v| v.as_f64()).unwrap_or(0.0),
                    sub: data.get("subreddit").and_then(|v| v.as_str()).unwrap_or("").to_string(),
                    permalink: data.get("permalink").and_then(|v| v.as_str()).unwrap_or("").to_string(),
                });
            }
        }
        Ok(out)
    }
}

/// Enrich one month: distinct `link_id` over the curated collection, API
/// lookup, then upsert-by-`link_id` into `posts-<month>` so re-running the
/// stage never duplicates records. Returns the distinct-parent count.
pub fn enrich_month(store: &dyn DocumentStore, api: &dyn MetadataApi, month: &str) -> Result<u64> {
    let curated = curated_collection(month);
    let posts = posts_collection(month);
    let started = Instant::now();

    let link_ids = store.distinct(&curated, "link_id")?;
    let distinct = link_ids.len() as u64;
    tracing::info!(month, distinct, "Fetching parent-post metadata");

    // Existing records survive the rewrite; their ids are skipped on insert.
    let mut existing: Vec<Value> = Vec::new();
    let mut seen = AHashSet::new();
    if store.collection_exists(&posts) {
        store.for_each(&posts, &mut |doc| {
            if let Some(id) = doc.get("link_id").and_then(|v| v.as_str()) {
                seen.insert(id.to_string());
            }
            existing.push(doc.clone());
            Ok(())
        })?;
    }

    let fetched = api.lookup(&link_ids)?;
    let mut writer = store.writer(&posts)?;
    for doc in &existing {
        writer.append(doc)?;
    }
    let mut inserted = 0u64;
    for meta in fetched {
        if seen.contains(&meta.link_id) {
            continue;
        }
        seen.insert(meta.link_id.clone());
        writer.append(&serde_json::to_value(&meta)?)?;
        inserted += 1;
    }
    writer.commit()?;

    tracing::info!(
        month,
        inserted,
        elapsed_s = started.elapsed().as_secs_f64(),
        "Enrichment complete"
    );
    Ok(distinct)
}
