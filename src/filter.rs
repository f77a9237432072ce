//! Filter stage: scan the raw per-month collection for top-level comments in
//! the configured categories, project them into the curated collection, then
//! reclaim the raw volume by dropping its collection.

use crate::store::{curated_collection, raw_collection, DocumentStore};
use anyhow::Result;
use serde_json::{Map, Value};
use std::time::Instant;

/// Field subset retained on curated comments.
const CURATED_FIELDS: [&str; 8] = [
    "id", "author", "body", "created_utc", "link_id", "parent_id", "score", "subreddit",
];

/// True for comments in one of `categories` whose immediate parent is the
/// post itself (`link_id == parent_id`), i.e. top-level comments. The
/// equality is field-to-field on the same document, not a literal match.
pub fn is_relevant(doc: &Value, categories: &[String]) -> bool {
    let Some(sub) = doc.get("subreddit").and_then(|v| v.as_str()) else {
        return false;
    };
    if !categories.iter().any(|c| c == sub) {
        return false;
    }
    match (
        doc.get("link_id").and_then(|v| v.as_str()),
        doc.get("parent_id").and_then(|v| v.as_str()),
    ) {
        (Some(link), Some(parent)) => link == parent,
        _ => false,
    }
}

/// Project a raw comment down to the curated field subset.
pub fn project_curated(doc: &Value) -> Value {
    let mut obj = Map::new();
    if let Some(map) = doc.as_object() {
        for k in CURATED_FIELDS {
            if let Some(v) = map.get(k) {
                obj.insert(k.to_string(), v.clone());
            }
        }
    }
    Value::Object(obj)
}

/// Copy relevant records from `comments-raw-<month>` into the curated
/// collection, then drop the raw collection. Returns the raw (pre-filter)
/// record count so the driver can record ingestion volume.
///
/// The drop is irreversible and non-transactional with respect to the copy,
/// so it only runs after the copy cursor is fully drained and committed; the
/// checkpoint line between the two makes a crash in that window detectable
/// (curated count logged, raw collection still present).
pub fn filter_month(store: &dyn DocumentStore, month: &str, categories: &[String]) -> Result<u64> {
    let raw = raw_collection(month);
    let curated = curated_collection(month);
    tracing::info!(month, ?categories, "Filtering to top-level comments");
    let started = Instant::now();

    let mut writer = store.writer(&curated)?;
    let mut raw_count = 0u64;
    store.for_each(&raw, &mut |doc| {
        raw_count += 1;
        if is_relevant(doc, categories) {
            writer.append(&project_curated(doc))?;
        }
        Ok(())
    })?;
    let curated_count = writer.commit()?;

    tracing::info!(
        month,
        raw_count,
        curated_count,
        "Curated copy committed; dropping raw collection {}",
        raw
    );
    store.drop_collection(&raw)?;

    tracing::info!(
        month,
        elapsed_s = started.elapsed().as_secs_f64(),
        "Filter stage complete"
    );
    Ok(raw_count)
}
