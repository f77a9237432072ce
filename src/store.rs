//! Document-store boundary. The pipeline addresses collections by name and
//! only needs a narrow capability set: bulk import from a file, streamed
//! scans, distinct-on-a-field, appends, batched field updates, drop, and
//! sort+limit. `JsonlStore` is the bundled adapter: one newline-delimited
//! JSON file per collection under a store root.

use crate::mem::throttle_if_low_memory;
use crate::util::{
    create_with_backoff, open_with_backoff, remove_with_backoff, replace_file_atomic_backoff,
};
use ahash::{AHashMap, AHashSet};
use anyhow::{Context, Result};
use serde_json::Value;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Raw per-month collection; never persists past the filter stage.
pub fn raw_collection(month: &str) -> String {
    format!("comments-raw-{}", month)
}

/// Curated per-month collection of top-level comments.
pub fn curated_collection(month: &str) -> String {
    format!("comments-{}", month)
}

/// Per-month parent-entity metadata collection.
pub fn posts_collection(month: &str) -> String {
    format!("posts-{}", month)
}

/// Aggregate parent-entity table across all months (backs top-posts stats).
pub const POSTS_ALL: &str = "posts-all";

/// One `$set`-style update addressed by the document's `id` field.
#[derive(Clone, Debug)]
pub struct FieldUpdate {
    pub id: String,
    pub field: String,
    pub value: Value,
}

/// Streaming write handle for stages that copy many records into a
/// collection without a per-record round trip. `commit` atomically replaces
/// the collection's content with what was written.
pub trait CollectionWriter {
    fn append(&mut self, doc: &Value) -> Result<()>;
    /// Flush and promote the written records. Returns records written.
    fn commit(self: Box<Self>) -> Result<u64>;
}

/// Capability interface over the document store. Object-safe so stages can
/// hold `&dyn DocumentStore` and tests can substitute adapters.
pub trait DocumentStore {
    /// High-throughput load of a newline-delimited-record file into a fresh
    /// collection. Returns the record count.
    fn bulk_import(&self, collection: &str, path: &Path) -> Result<u64>;

    /// Open a streaming write session whose commit atomically replaces
    /// `collection`.
    fn writer(&self, collection: &str) -> Result<Box<dyn CollectionWriter>>;

    /// Visit every record in `collection` in natural order.
    fn for_each(&self, collection: &str, f: &mut dyn FnMut(&Value) -> Result<()>) -> Result<()>;

    /// Distinct string values of `field` across `collection`, sorted.
    fn distinct(&self, collection: &str, field: &str) -> Result<Vec<String>>;

    /// Apply `$set`-style updates matched on the `id` field. Returns the
    /// number of records that received at least one update.
    fn update_set(&self, collection: &str, updates: &[FieldUpdate]) -> Result<u64>;

    /// Irreversibly drop `collection`.
    fn drop_collection(&self, collection: &str) -> Result<()>;

    fn collection_exists(&self, collection: &str) -> bool;

    fn count(&self, collection: &str) -> Result<u64>;

    /// Records matching `pred`, sorted by numeric `score` descending with a
    /// deterministic secondary sort on `link_id` ascending, truncated to
    /// `limit`.
    fn top_by_score(
        &self,
        collection: &str,
        pred: &mut dyn FnMut(&Value) -> bool,
        limit: usize,
    ) -> Result<Vec<Value>>;
}

/// NDJSON-file-per-collection adapter.
pub struct JsonlStore {
    root: PathBuf,
    read_buf: usize,
    write_buf: usize,
}

impl JsonlStore {
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_buffers(root, 256 * 1024, 256 * 1024)
    }

    pub fn open_with_buffers(root: impl AsRef<Path>, read_buf: usize, write_buf: usize) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).with_context(|| format!("create store root {}", root.display()))?;
        Ok(Self { root, read_buf, write_buf })
    }

    fn path_for(&self, collection: &str) -> PathBuf {
        self.root.join(format!("{}.ndjson", collection))
    }
}

/// Buffered line reader over one collection file. `next_line` strips the
/// trailing `\r?\n` and reports EOF as `false`.
struct LineReader {
    rdr: BufReader<File>,
}

impl LineReader {
    fn open(path: &Path, capacity: usize) -> io::Result<Self> {
        let f = open_with_backoff(path, 16, 50)?;
        Ok(Self { rdr: BufReader::with_capacity(capacity.max(8 * 1024), f) })
    }

    fn next_line(&mut self, buf: &mut String) -> io::Result<bool> {
        buf.clear();
        if self.rdr.read_line(buf)? == 0 {
            return Ok(false);
        }
        if buf.ends_with('\n') {
            buf.pop();
            if buf.ends_with('\r') {
                buf.pop();
            }
        }
        Ok(true)
    }
}

/// Buffered line writer targeting a sibling temp file; `promote` flushes and
/// atomically replaces the real collection file.
struct LineWriter {
    tmp: PathBuf,
    w: BufWriter<File>,
}

impl LineWriter {
    fn create(tmp: &Path, capacity: usize) -> io::Result<Self> {
        let f = create_with_backoff(tmp, 16, 50)?;
        Ok(Self { tmp: tmp.to_path_buf(), w: BufWriter::with_capacity(capacity.max(8 * 1024), f) })
    }

    fn put_line(&mut self, line: &str) -> io::Result<()> {
        self.w.write_all(line.as_bytes())?;
        self.w.write_all(b"\n")
    }

    fn promote(mut self, dest: &Path) -> Result<()> {
        self.w.flush().with_context(|| format!("flush {}", self.tmp.display()))?;
        drop(self.w);
        replace_file_atomic_backoff(&self.tmp, dest)
    }
}

struct JsonlWriter {
    writer: LineWriter,
    dest: PathBuf,
    written: u64,
}

impl CollectionWriter for JsonlWriter {
    fn append(&mut self, doc: &Value) -> Result<()> {
        self.writer.put_line(&serde_json::to_string(doc)?)?;
        self.written += 1;
        Ok(())
    }

    fn commit(self: Box<Self>) -> Result<u64> {
        let JsonlWriter { writer, dest, written } = *self;
        writer.promote(&dest)?;
        Ok(written)
    }
}

impl DocumentStore for JsonlStore {
    fn bulk_import(&self, collection: &str, path: &Path) -> Result<u64> {
        // The store's native layout is NDJSON, so the fast path is a counted
        // line copy with no per-record parse.
        let dest = self.path_for(collection);
        let tmp = dest.with_extension("ndjson.tmp");
        let mut reader = LineReader::open(path, self.read_buf)
            .with_context(|| format!("open {}", path.display()))?;
        let mut writer = LineWriter::create(&tmp, self.write_buf)
            .with_context(|| format!("create {}", tmp.display()))?;

        let mut count = 0u64;
        let mut line = String::with_capacity(16 * 1024);
        while reader.next_line(&mut line)? {
            if line.is_empty() {
                continue;
            }
            writer.put_line(&line)?;
            count += 1;
            throttle_if_low_memory(0.10);
        }
        writer.promote(&dest)?;
        Ok(count)
    }

    fn writer(&self, collection: &str) -> Result<Box<dyn CollectionWriter>> {
        let dest = self.path_for(collection);
        let tmp = dest.with_extension("ndjson.tmp");
        let writer = LineWriter::create(&tmp, self.write_buf)
            .with_context(|| format!("create {}", tmp.display()))?;
        Ok(Box::new(JsonlWriter { writer, dest, written: 0 }))
    }

    fn for_each(&self, collection: &str, f: &mut dyn FnMut(&Value) -> Result<()>) -> Result<()> {
        let path = self.path_for(collection);
        let mut reader = LineReader::open(&path, self.read_buf)
            .with_context(|| format!("open collection {}", collection))?;
        let mut line = String::with_capacity(16 * 1024);
        while reader.next_line(&mut line)? {
            if line.is_empty() {
                continue;
            }
            let doc: Value = serde_json::from_str(&line)
                .with_context(|| format!("parse record in {}", collection))?;
            f(&doc)?;
            throttle_if_low_memory(0.10);
        }
        Ok(())
    }

    fn distinct(&self, collection: &str, field: &str) -> Result<Vec<String>> {
        let mut seen = AHashSet::new();
        self.for_each(collection, &mut |doc| {
            if let Some(v) = doc.get(field).and_then(|v| v.as_str()) {
                if !seen.contains(v) {
                    seen.insert(v.to_string());
                }
            }
            Ok(())
        })?;
        let mut out: Vec<String> = seen.into_iter().collect();
        out.sort();
        Ok(out)
    }

    fn update_set(&self, collection: &str, updates: &[FieldUpdate]) -> Result<u64> {
        if updates.is_empty() {
            return Ok(0);
        }
        let mut by_id: AHashMap<&str, Vec<&FieldUpdate>> = AHashMap::new();
        for u in updates {
            by_id.entry(u.id.as_str()).or_default().push(u);
        }

        let dest = self.path_for(collection);
        let tmp = dest.with_extension("ndjson.tmp");
        let mut reader = LineReader::open(&dest, self.read_buf)
            .with_context(|| format!("open collection {}", collection))?;
        let mut writer = LineWriter::create(&tmp, self.write_buf)
            .with_context(|| format!("create {}", tmp.display()))?;

        let mut matched = 0u64;
        let mut line = String::with_capacity(16 * 1024);
        while reader.next_line(&mut line)? {
            if line.is_empty() {
                continue;
            }
            let mut doc: Value = serde_json::from_str(&line)
                .with_context(|| format!("parse record in {}", collection))?;
            let id = doc
                .get("id")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
                .filter(|id| by_id.contains_key(id.as_str()));

            match id {
                Some(id) => {
                    if let Some(obj) = doc.as_object_mut() {
                        for u in &by_id[id.as_str()] {
                            obj.insert(u.field.clone(), u.value.clone());
                        }
                    }
                    writer.put_line(&serde_json::to_string(&doc)?)?;
                    matched += 1;
                }
                None => writer.put_line(&line)?,
            }
            throttle_if_low_memory(0.10);
        }
        writer.promote(&dest)?;
        Ok(matched)
    }

    fn drop_collection(&self, collection: &str) -> Result<()> {
        remove_with_backoff(&self.path_for(collection), 16, 50)
    }

    fn collection_exists(&self, collection: &str) -> bool {
        self.path_for(collection).exists()
    }

    fn count(&self, collection: &str) -> Result<u64> {
        let mut n = 0u64;
        self.for_each(collection, &mut |_| {
            n += 1;
            Ok(())
        })?;
        Ok(n)
    }

    fn top_by_score(
        &self,
        collection: &str,
        pred: &mut dyn FnMut(&Value) -> bool,
        limit: usize,
    ) -> Result<Vec<Value>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut matches: Vec<(i64, String, Value)> = Vec::new();
        self.for_each(collection, &mut |doc| {
            if pred(doc) {
                let score = doc.get("score").and_then(|v| v.as_i64()).unwrap_or(0);
                let link_id = doc
                    .get("link_id")
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string();
                matches.push((score, link_id, doc.clone()));
            }
            Ok(())
        })?;
        // Score descending; ties broken by link_id ascending so the top set
        // is stable across runs.
        matches.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        matches.truncate(limit);
        Ok(matches.into_iter().map(|(_, _, doc)| doc).collect())
    }
}
