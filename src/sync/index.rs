// The search indexes updated by the synchronization.

use std::collections::HashMap;
use std::io::Write;

use serde_json::json;

use crate::sync::*;

/// A document sent to an index. It is keyed by its `id` field.
pub type IndexDocument = Record;

/// The outcome of merging one document.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct IndexingResult {
    pub key: Option<String>,
    pub succeeded: bool,
    pub error_message: Option<String>,
}

impl IndexingResult {
    fn success(key: &str) -> IndexingResult {
        IndexingResult {
            key: Some(key.to_string()),
            succeeded: true,
            error_message: None,
        }
    }

    fn failure(key: Option<&str>, message: &str) -> IndexingResult {
        IndexingResult {
            key: key.map(|s| s.to_string()),
            succeeded: false,
            error_message: Some(message.to_string()),
        }
    }
}

/// An index that accepts partial documents.
///
/// Merging a document only overwrites the fields it carries; a document with an
/// unknown key is inserted as is. One result is returned per document, in order.
/// An error is only returned when the whole batch could not be sent.
pub trait IndexSink {
    fn merge_or_upload(&mut self, docs: &[IndexDocument]) -> SyncResult<Vec<IndexingResult>>;
}

fn document_key(doc: &IndexDocument) -> Option<&str> {
    match doc.get("id") {
        Some(JSValue::String(s)) if !s.is_empty() => Some(s.as_str()),
        _ => None,
    }
}

/// An index kept in memory, in insertion order.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct MemoryIndex {
    docs: Vec<IndexDocument>,
    positions: HashMap<String, usize>,
}

impl MemoryIndex {
    pub fn new() -> MemoryIndex {
        MemoryIndex::default()
    }

    pub fn get(&self, key: &str) -> Option<&IndexDocument> {
        self.positions.get(key).map(|&idx| &self.docs[idx])
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn documents(&self) -> &[IndexDocument] {
        &self.docs
    }

    fn merge(&mut self, doc: &IndexDocument) -> Result<String, &'static str> {
        let key = document_key(doc).ok_or("document has no id")?.to_string();
        match self.positions.get(&key) {
            Some(&idx) => {
                let existing = &mut self.docs[idx];
                for (k, v) in doc.iter() {
                    existing.insert(k.clone(), v.clone());
                }
            }
            None => {
                self.positions.insert(key.clone(), self.docs.len());
                self.docs.push(doc.clone());
            }
        }
        Ok(key)
    }
}

impl IndexSink for MemoryIndex {
    fn merge_or_upload(&mut self, docs: &[IndexDocument]) -> SyncResult<Vec<IndexingResult>> {
        let res = docs
            .iter()
            .map(|doc| match self.merge(doc) {
                Ok(key) => IndexingResult::success(&key),
                Err(msg) => IndexingResult::failure(None, msg),
            })
            .collect();
        Ok(res)
    }
}

/// An index stored in a JSON file, as an array of documents.
///
/// The file is rewritten after every batch.
#[derive(PartialEq, Debug, Clone)]
pub struct JsonFileIndex {
    path: String,
    index: MemoryIndex,
    // Stored documents that have no usable key. They are written back untouched.
    unkeyed: Vec<IndexDocument>,
}

impl JsonFileIndex {
    /// Opens the index stored at the given path. A missing file is an empty index.
    pub fn open(path: &str) -> SyncResult<JsonFileIndex> {
        let mut index = MemoryIndex::new();
        let mut unkeyed: Vec<IndexDocument> = Vec::new();
        if std::path::Path::new(path).exists() {
            for doc in io_json::read_json_records(path)? {
                if index.merge(&doc).is_err() {
                    unkeyed.push(doc);
                }
            }
        } else {
            info!("Creating a new index at {}", path);
        }
        if !unkeyed.is_empty() {
            warn!(
                "{} documents in {} have no string id, they will be kept as is",
                unkeyed.len(),
                path
            );
        }
        debug!("JsonFileIndex::open: {} documents in {:?}", index.len(), path);
        Ok(JsonFileIndex {
            path: path.to_string(),
            index,
            unkeyed,
        })
    }

    pub fn index(&self) -> &MemoryIndex {
        &self.index
    }

    fn save(&self) -> SyncResult<()> {
        let docs: Vec<&IndexDocument> = self
            .index
            .documents()
            .iter()
            .chain(self.unkeyed.iter())
            .collect();
        let pretty_js = serde_json::to_string_pretty(&docs).context(WritingJsonSnafu {})?;
        fs::write(&self.path, pretty_js).context(WritingFileSnafu {
            path: self.path.clone(),
        })
    }
}

impl IndexSink for JsonFileIndex {
    fn merge_or_upload(&mut self, docs: &[IndexDocument]) -> SyncResult<Vec<IndexingResult>> {
        let res = self.index.merge_or_upload(docs)?;
        self.save()?;
        Ok(res)
    }
}

/// Writes the requested merges as JSON lines instead of applying them.
pub struct DryRunIndex<W: Write> {
    out: W,
}

impl DryRunIndex<std::io::Stdout> {
    pub fn stdout() -> DryRunIndex<std::io::Stdout> {
        DryRunIndex::new(std::io::stdout())
    }
}

impl<W: Write> DryRunIndex<W> {
    pub fn new(out: W) -> DryRunIndex<W> {
        DryRunIndex { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> IndexSink for DryRunIndex<W> {
    fn merge_or_upload(&mut self, docs: &[IndexDocument]) -> SyncResult<Vec<IndexingResult>> {
        let mut res: Vec<IndexingResult> = Vec::with_capacity(docs.len());
        for doc in docs.iter() {
            let line = json!({"action": "mergeOrUpload", "document": doc});
            writeln!(self.out, "{}", line).context(WritingFileSnafu { path: "stdout" })?;
            res.push(match document_key(doc) {
                Some(key) => IndexingResult::success(key),
                None => IndexingResult::failure(None, "document has no id"),
            });
        }
        self.out.flush().context(WritingFileSnafu { path: "stdout" })?;
        Ok(res)
    }
}

/// Sends documents to a sink in batches of a fixed size, and counts the outcomes.
pub struct BatchWriter<'a> {
    sink: &'a mut dyn IndexSink,
    batch_size: usize,
    pending: Vec<IndexDocument>,
    num_batches: usize,
    succeeded: u64,
    failed: u64,
}

impl<'a> BatchWriter<'a> {
    pub fn new(sink: &'a mut dyn IndexSink, batch_size: usize) -> BatchWriter<'a> {
        BatchWriter {
            sink,
            batch_size: batch_size.max(1),
            pending: Vec::new(),
            num_batches: 0,
            succeeded: 0,
            failed: 0,
        }
    }

    pub fn push(&mut self, doc: IndexDocument) -> SyncResult<()> {
        self.pending.push(doc);
        if self.pending.len() >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> SyncResult<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        self.num_batches += 1;
        let results = self.sink.merge_or_upload(&self.pending)?;
        let succeeded = results.iter().filter(|r| r.succeeded).count();
        info!(
            "Batch {}: {} documents indexed with {} succeeded and {} failed",
            self.num_batches,
            self.pending.len(),
            succeeded,
            results.len() - succeeded
        );
        for r in results.iter().filter(|r| !r.succeeded) {
            warn!(
                "Failed to update document {:?}: {}",
                r.key,
                r.error_message.as_deref().unwrap_or("unknown error")
            );
        }
        self.succeeded += succeeded as u64;
        self.failed += (results.len() - succeeded) as u64;
        self.pending.clear();
        Ok(())
    }

    /// Sends the last documents. Returns the number of documents that succeeded
    /// and failed.
    pub fn finish(mut self) -> SyncResult<(u64, u64)> {
        self.flush()?;
        Ok((self.succeeded, self.failed))
    }
}
