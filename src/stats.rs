//! Streaming aggregation over scored curated comments: per-month summary
//! statistics, optionally restricted to one category or to the comments of
//! the top-N parent posts.

use crate::catalog::CatalogEntry;
use crate::sentiment::Analyzer;
use crate::store::{curated_collection, DocumentStore, POSTS_ALL};
use ahash::AHashSet;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Summary statistics for one month (or one month-range in the top-posts
/// variant). Any statistic whose denominator was zero is `None` — an
/// explicit "undefined", never a crash or a sentinel zero.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MonthlyStats {
    pub avg_abs_wght_pol: Option<f64>,
    pub avg_abs_pol: Option<f64>,
    pub comment_count: u64,
    pub avg_wordcount: Option<f64>,
}

/// Running sums behind `MonthlyStats`. One `ingest` per eligible record.
#[derive(Default)]
struct StatsAccum {
    total_words: u64,
    total_abs_polarity: f64,
    total_abs_weighted_polarity: f64,
    total_score: i64,
    comment_count: u64,
}

impl StatsAccum {
    /// Accumulate one scored record. `polarity` comes from the analyzer's
    /// field; records without it are not eligible and must not reach here.
    fn ingest(&mut self, doc: &Value, polarity: f64) {
        // A missing/unsplittable body contributes zero words, not an error.
        if let Some(body) = doc.get("body").and_then(|v| v.as_str()) {
            self.total_words += body.split_whitespace().count() as u64;
        }
        let score = doc.get("score").and_then(|v| v.as_i64()).unwrap_or(0);
        self.total_abs_polarity += polarity.abs();
        self.total_abs_weighted_polarity += score as f64 * polarity.abs();
        self.total_score += score;
        self.comment_count += 1;
    }

    fn finish(self) -> MonthlyStats {
        let div = |num: f64, den: f64| if den == 0.0 { None } else { Some(num / den) };
        MonthlyStats {
            avg_abs_wght_pol: div(self.total_abs_weighted_polarity, self.total_score as f64),
            avg_abs_pol: div(self.total_abs_polarity, self.comment_count as f64),
            comment_count: self.comment_count,
            avg_wordcount: div(self.total_words as f64, self.comment_count as f64),
        }
    }
}

/// Eligible for aggregation: positive score, not a removed body, and
/// actually carries this analyzer's polarity field. A record whose body is
/// absent still counts (it contributes zero words); only `"[deleted]"`
/// bodies are excluded.
fn eligible_polarity(doc: &Value, field: &str) -> Option<f64> {
    let score_ok = doc.get("score").and_then(|v| v.as_i64()).map(|s| s > 0).unwrap_or(false);
    if !score_ok {
        return None;
    }
    if doc.get("body").and_then(|v| v.as_str()) == Some("[deleted]") {
        return None;
    }
    doc.get(field).and_then(|v| v.as_f64())
}

/// Average absolute polarity, score-weighted average absolute polarity,
/// average word count, and record count for one month, optionally restricted
/// to a single category.
pub fn monthly_stats(
    store: &dyn DocumentStore,
    month: &str,
    category: Option<&str>,
    analyzer: Analyzer,
) -> Result<MonthlyStats> {
    let collection = curated_collection(month);
    let field = analyzer.field();
    let mut acc = StatsAccum::default();

    // A month that was never ingested aggregates like an empty collection.
    if store.collection_exists(&collection) {
        store.for_each(&collection, &mut |doc| {
            if let Some(cat) = category {
                if doc.get("subreddit").and_then(|v| v.as_str()) != Some(cat) {
                    return Ok(());
                }
            }
            if let Some(polarity) = eligible_polarity(doc, field) {
                acc.ingest(doc, polarity);
            }
            Ok(())
        })?;
    }
    Ok(acc.finish())
}

/// The platform's canonical prefixed form for post ids.
fn canonical_link_id(id: &str) -> String {
    if id.starts_with("t3_") {
        id.to_string()
    } else {
        format!("t3_{}", id)
    }
}

/// Statistics over all comments belonging to the top `post_limit` posts of
/// `category` (ranked by score from the aggregate parent-entity table,
/// ties broken by `link_id`), accumulated across every month in `months`.
pub fn monthly_stats_top_posts(
    store: &dyn DocumentStore,
    months: &[String],
    category: &str,
    post_limit: usize,
    analyzer: Analyzer,
) -> Result<MonthlyStats> {
    let field = analyzer.field();
    let mut acc = StatsAccum::default();
    let Some(first_month) = months.first() else {
        return Ok(acc.finish());
    };

    let top = if store.collection_exists(POSTS_ALL) {
        store.top_by_score(
            POSTS_ALL,
            &mut |doc| {
                doc.get("yearmonth").and_then(|v| v.as_str()) == Some(first_month.as_str())
                    && doc.get("sub").and_then(|v| v.as_str()) == Some(category)
            },
            post_limit,
        )?
    } else {
        Vec::new()
    };

    let link_ids: AHashSet<String> = top
        .iter()
        .filter_map(|doc| doc.get("link_id").and_then(|v| v.as_str()))
        .map(canonical_link_id)
        .collect();

    for month in months {
        let collection = curated_collection(month);
        if !store.collection_exists(&collection) {
            continue;
        }
        store.for_each(&collection, &mut |doc| {
            let Some(link_id) = doc.get("link_id").and_then(|v| v.as_str()) else {
                return Ok(());
            };
            if !link_ids.contains(link_id) {
                return Ok(());
            }
            if let Some(polarity) = eligible_polarity(doc, field) {
                acc.ingest(doc, polarity);
            }
            Ok(())
        })?;
    }
    Ok(acc.finish())
}

/// Merge the per-month metadata collections into the aggregate `posts-all`
/// table, tagging each record with its month. Upserts by
/// `(yearmonth, link_id)` so rebuilding is repeatable.
pub fn build_posts_all(store: &dyn DocumentStore, months: &[String]) -> Result<u64> {
    let mut docs: Vec<Value> = Vec::new();
    let mut seen: AHashSet<(String, String)> = AHashSet::new();

    if store.collection_exists(POSTS_ALL) {
        store.for_each(POSTS_ALL, &mut |doc| {
            if let (Some(ym), Some(id)) = (
                doc.get("yearmonth").and_then(|v| v.as_str()),
                doc.get("link_id").and_then(|v| v.as_str()),
            ) {
                seen.insert((ym.to_string(), id.to_string()));
            }
            docs.push(doc.clone());
            Ok(())
        })?;
    }

    for month in months {
        let collection = crate::store::posts_collection(month);
        if !store.collection_exists(&collection) {
            continue;
        }
        store.for_each(&collection, &mut |doc| {
            let Some(id) = doc.get("link_id").and_then(|v| v.as_str()) else {
                return Ok(());
            };
            let key = (month.clone(), id.to_string());
            if seen.contains(&key) {
                return Ok(());
            }
            seen.insert(key);
            let mut tagged = doc.clone();
            if let Some(obj) = tagged.as_object_mut() {
                obj.insert("yearmonth".to_string(), Value::from(month.as_str()));
            }
            docs.push(tagged);
            Ok(())
        })?;
    }

    let mut writer = store.writer(POSTS_ALL)?;
    for doc in &docs {
        writer.append(doc)?;
    }
    writer.commit()
}

/// Drive `monthly_stats` across a contiguous catalog slice, one entry per
/// month in range order. `start`/`end` are inclusive catalog indices.
pub fn get_sentiment(
    store: &dyn DocumentStore,
    start: usize,
    end: usize,
    catalog: &[CatalogEntry],
    category: Option<&str>,
    analyzer: Analyzer,
) -> Result<BTreeMap<String, MonthlyStats>> {
    let mut out = BTreeMap::new();
    // A slice that starts past the catalog (or is inverted) selects nothing.
    if start >= catalog.len() || start > end {
        return Ok(out);
    }
    let end = end.min(catalog.len() - 1);
    for (idx, entry) in catalog[start..=end].iter().enumerate() {
        if idx % 10 == 0 {
            tracing::info!(idx = start + idx, month = %entry.month, "Aggregating");
        }
        let stats = monthly_stats(store, &entry.month, category, analyzer)?;
        out.insert(entry.month.clone(), stats);
    }
    Ok(out)
}
