#[path = "common/mod.rs"]
mod common;

use common::*;
use rcsent::{
    curated_collection, load_progress, posts_collection, raw_collection, Analyzer, CatalogEntry,
    DocumentStore, Fetcher, HttpFetcher, JsonlStore, MetadataApi, ParentEntityMetadata, Pipeline,
    PipelineOptions, RemoteSource,
};
use std::fs;
use std::path::{Path, PathBuf};

/// "Downloads" by copying a pre-built archive from a fixture directory.
struct FixtureFetcher {
    fixtures: PathBuf,
}

impl Fetcher for FixtureFetcher {
    fn fetch(&self, source: &RemoteSource, staging_dir: &Path) -> anyhow::Result<PathBuf> {
        fs::create_dir_all(staging_dir)?;
        let dest = staging_dir.join(source.filename());
        fs::copy(self.fixtures.join(source.filename()), &dest)?;
        Ok(dest)
    }
}

struct StubApi;

impl MetadataApi for StubApi {
    fn lookup(&self, ids: &[String]) -> anyhow::Result<Vec<ParentEntityMetadata>> {
        Ok(ids
            .iter()
            .map(|id| ParentEntityMetadata {
                link_id: id.clone(),
                title: format!("post {}", id),
                score: 42,
                is_self: false,
                datetime: 1_577_836_800.0,
                sub: "politics".to_string(),
                permalink: format!("/r/politics/{}", id),
            })
            .collect())
    }
}

fn entry(month: &str) -> CatalogEntry {
    CatalogEntry {
        month: month.to_string(),
        link: format!("https://files.example.org/reddit/comments/RC_{}.zst", month),
        downloaded: false,
        size_in_bytes: 0,
        comment_count: 0,
    }
}

#[test]
fn one_month_end_to_end_with_stubbed_transport() {
    let dir = tempfile::tempdir().unwrap();
    let fixtures = dir.path().join("fixtures");
    let staging = dir.path().join("staging");
    let store_dir = dir.path().join("store");
    let progress = dir.path().join("progress.tsv");

    write_zst_lines(
        &fixtures.join("RC_2020-01.zst"),
        &[
            raw_comment("a", "politics", "this is great news", "t3_p1", "t3_p1", 4).to_string(),
            raw_comment("b", "politics", "so true", "t3_p1", "t1_a", 2).to_string(),
            raw_comment("c", "aww", "cute", "t3_p2", "t3_p2", 9).to_string(),
        ],
    );

    let opts = PipelineOptions::default()
        .with_staging_dir(&staging)
        .with_store_dir(&store_dir)
        .with_progress_path(&progress)
        .with_categories(["politics"])
        .with_analyzer(Analyzer::Vader)
        .with_progress(false);
    let pipeline = Pipeline::new(
        opts,
        Box::new(JsonlStore::open(&store_dir).unwrap()),
        Box::new(FixtureFetcher { fixtures }),
        Box::new(StubApi),
    );

    let mut catalog = vec![entry("2020-01")];
    pipeline.run(&mut catalog, 0..1).unwrap();

    // Catalog entry marked and persisted.
    assert!(catalog[0].downloaded);
    assert_eq!(catalog[0].comment_count, 3);
    assert!(catalog[0].size_in_bytes > 0);
    let reloaded = load_progress(&progress).unwrap();
    assert_eq!(reloaded, catalog);

    // Only the top-level allowed comment survives, scored.
    let store = pipeline.store();
    assert!(!store.collection_exists(&raw_collection("2020-01")));
    let curated = read_collection(&store_dir, &curated_collection("2020-01"));
    assert_eq!(curated.len(), 1);
    assert_eq!(curated[0]["id"], "a");
    assert!(curated[0].get("vader_sentiment").and_then(|v| v.as_f64()).unwrap() > 0.0);

    // Parent metadata fetched for the surviving comment's post.
    let posts = read_collection(&store_dir, &posts_collection("2020-01"));
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0]["link_id"], "t3_p1");

    // Staged archive and decompressed file are both reclaimed.
    assert!(!staging.join("RC_2020-01.zst").exists());
    assert!(!staging.join("RC_2020-01").exists());
}

#[test]
fn a_failed_month_aborts_and_leaves_the_entry_unmarked() {
    let dir = tempfile::tempdir().unwrap();
    let fixtures = dir.path().join("fixtures");
    fs::create_dir_all(&fixtures).unwrap();
    let store_dir = dir.path().join("store");
    let progress = dir.path().join("progress.tsv");

    let opts = PipelineOptions::default()
        .with_staging_dir(dir.path().join("staging"))
        .with_store_dir(&store_dir)
        .with_progress_path(&progress)
        .with_progress(false);
    // No fixture file exists, so the fetch fails.
    let pipeline = Pipeline::new(
        opts,
        Box::new(JsonlStore::open(&store_dir).unwrap()),
        Box::new(FixtureFetcher { fixtures }),
        Box::new(StubApi),
    );

    let mut catalog = vec![entry("2020-01")];
    assert!(pipeline.run(&mut catalog, 0..1).is_err());
    assert!(!catalog[0].downloaded);

    // The table is still persisted so a re-run resumes at this month.
    let reloaded = load_progress(&progress).unwrap();
    assert_eq!(reloaded, catalog);
}

#[test]
fn continue_on_error_skips_the_bad_month() {
    let dir = tempfile::tempdir().unwrap();
    let fixtures = dir.path().join("fixtures");
    let store_dir = dir.path().join("store");
    let progress = dir.path().join("progress.tsv");

    // Only the second month's archive exists.
    write_zst_lines(
        &fixtures.join("RC_2020-02.zst"),
        &[raw_comment("a", "politics", "fine", "t3_p1", "t3_p1", 1).to_string()],
    );

    let opts = PipelineOptions::default()
        .with_staging_dir(dir.path().join("staging"))
        .with_store_dir(&store_dir)
        .with_progress_path(&progress)
        .with_categories(["politics"])
        .with_continue_on_error(true)
        .with_progress(false);
    let pipeline = Pipeline::new(
        opts,
        Box::new(JsonlStore::open(&store_dir).unwrap()),
        Box::new(FixtureFetcher { fixtures }),
        Box::new(StubApi),
    );

    let mut catalog = vec![entry("2020-01"), entry("2020-02")];
    pipeline.run(&mut catalog, 0..2).unwrap();

    assert!(!catalog[0].downloaded);
    assert!(catalog[1].downloaded);
    assert_eq!(catalog[1].comment_count, 1);
}

#[test]
fn object_storage_references_resolve_to_https() {
    let src = RemoteSource::parse("s3://archive-mirror/RC_2020-01.zst").unwrap();
    assert_eq!(src.filename(), "RC_2020-01.zst");
    assert_eq!(
        src.url(),
        "https://archive-mirror.s3.amazonaws.com/RC_2020-01.zst"
    );

    assert!(RemoteSource::parse("s3://bucket-only").is_err());
    assert!(RemoteSource::parse("s3:///no-bucket").is_err());

    let http = RemoteSource::parse("https://files.example.org/RC_2020-01.zst").unwrap();
    assert_eq!(http.url(), "https://files.example.org/RC_2020-01.zst");
    assert_eq!(http.filename(), "RC_2020-01.zst");
}

#[test]
fn http_fetcher_constructs() {
    // Smoke-check the production wiring without touching the network.
    HttpFetcher::new(false).unwrap();
}
