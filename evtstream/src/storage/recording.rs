//! A storage wrapper that records every read.
//!
//! This is used for testing to check how the buffered reader splits a chunk into
//! backend calls: one call per source run, slices for contiguous rows, explicit
//! indices for everything else, primary before friend.

use std::sync::Arc;

use evtstream_tabular::{BatchSchema, ColumnBatch};
use parking_lot::Mutex;

use super::{RowSpan, SourceHandle, Storage};
use crate::error::Result;

/// One recorded `read_rows` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadCall {
    pub source: String,
    pub group: String,
    /// Local rows in the order they were requested.
    pub rows: Vec<usize>,
    /// Whether the rows were passed as explicit indices.
    pub fancy: bool,
    pub fields: Vec<String>,
}

/// Wraps a storage and logs the reads made through handles it opened.
#[derive(Debug)]
pub struct RecordingStorage<S: Storage> {
    inner: S,
    calls: Arc<Mutex<Vec<ReadCall>>>,
}

impl<S: Storage> RecordingStorage<S> {
    /// Create a new recording wrapper.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Snapshot of the calls made so far.
    pub fn calls(&self) -> Vec<ReadCall> {
        self.calls.lock().clone()
    }

    /// Forget recorded calls.
    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}

impl<S: Storage> Storage for RecordingStorage<S> {
    fn open(&self, source: &str) -> Result<Box<dyn SourceHandle>> {
        let inner = self.inner.open(source)?;
        Ok(Box::new(RecordingHandle {
            inner,
            calls: Arc::clone(&self.calls),
        }))
    }

    fn expand(&self, source: &str) -> Result<Vec<String>> {
        self.inner.expand(source)
    }
}

#[derive(Debug)]
struct RecordingHandle {
    inner: Box<dyn SourceHandle>,
    calls: Arc<Mutex<Vec<ReadCall>>>,
}

impl SourceHandle for RecordingHandle {
    fn source(&self) -> &str {
        self.inner.source()
    }

    fn num_rows(&mut self, group: &str) -> Result<usize> {
        self.inner.num_rows(group)
    }

    fn schema(&mut self, group: &str) -> Result<Arc<BatchSchema>> {
        self.inner.schema(group)
    }

    fn read_rows(
        &mut self,
        group: &str,
        span: RowSpan<'_>,
        fields: &[String],
        out: &mut ColumnBatch,
    ) -> Result<usize> {
        self.calls.lock().push(ReadCall {
            source: self.inner.source().to_string(),
            group: group.to_string(),
            rows: span.rows().collect(),
            fancy: span.is_fancy(),
            fields: fields.to_vec(),
        });
        self.inner.read_rows(group, span, fields, out)
    }
}
