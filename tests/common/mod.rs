use serde_json::{json, Value};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

/// Write a compressed `.zst` file containing the provided JSONL lines.
/// Mirrors the corpus's RC_ monthly files but with tiny content.
pub fn write_zst_lines(path: &Path, lines: &[String]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let f = File::create(path).unwrap();
    let mut enc = zstd::stream::write::Encoder::new(f, 3).unwrap();
    for l in lines {
        writeln!(&mut enc, "{}", l).unwrap();
    }
    enc.finish().unwrap();
}

/// One raw comment record with the full field shape the monthly archives
/// carry (the curated projection keeps only a subset of these).
pub fn raw_comment(
    id: &str,
    subreddit: &str,
    body: &str,
    link_id: &str,
    parent_id: &str,
    score: i64,
) -> Value {
    json!({
        "id": id,
        "author": format!("user_{}", id),
        "body": body,
        "created_utc": 1577836800,
        "link_id": link_id,
        "parent_id": parent_id,
        "score": score,
        "subreddit": subreddit,
        "subreddit_id": "t5_x",
        "controversiality": 0,
        "ups": score,
        "gilded": 0,
        "stickied": false,
        "retrieved_on": 1577923200
    })
}

/// Read a collection file straight off the store root as parsed records.
pub fn read_collection(store_root: &Path, collection: &str) -> Vec<Value> {
    let f = File::open(store_root.join(format!("{}.ndjson", collection))).unwrap();
    let r = BufReader::new(f);
    r.lines()
        .map(|l| l.unwrap())
        .filter(|s| !s.is_empty())
        .map(|s| serde_json::from_str(&s).unwrap())
        .collect()
}
