//! Ordered `(source, group)` pairs and the handles that serve them.

use std::collections::HashMap;
use std::sync::Arc;

use evtstream_tabular::{BatchSchema, ColumnBatch};

use crate::error::{ChunkError, Result};
use crate::storage::{normalize_group, RowSpan, SourceHandle, Storage};

/// One `(source, group)` pair of the virtual row space.
#[derive(Debug)]
struct SourceEntry {
    source: String,
    group: String,
    num_rows: usize,
    /// Index into `SourceRegistry::handles`.
    handle: usize,
    /// Discovered on first use.
    schema: Option<Arc<BatchSchema>>,
}

/// Ordered sources with their row counts.
///
/// A source named by several pairs is opened once and its handle shared by
/// those pairs.
#[derive(Debug)]
pub struct SourceRegistry {
    entries: Vec<SourceEntry>,
    handles: Vec<Box<dyn SourceHandle>>,
}

impl SourceRegistry {
    /// Open every pair and record its row count.
    pub fn open(storage: &dyn Storage, pairs: &[(String, String)]) -> Result<Self> {
        if pairs.is_empty() {
            return Err(ChunkError::resource_access("No sources given"));
        }

        let mut handles: Vec<Box<dyn SourceHandle>> = Vec::new();
        let mut by_source: HashMap<&str, usize> = HashMap::new();
        let mut entries = Vec::with_capacity(pairs.len());

        for (source, group) in pairs {
            let handle = match by_source.get(source.as_str()) {
                Some(&idx) => idx,
                None => {
                    handles.push(storage.open(source)?);
                    by_source.insert(source.as_str(), handles.len() - 1);
                    handles.len() - 1
                }
            };
            let group = normalize_group(group);
            let num_rows = handles[handle].num_rows(&group)?;
            tracing::trace!(source = %source, group = %group, rows = num_rows, "registered source");
            entries.push(SourceEntry {
                source: source.clone(),
                group,
                num_rows,
                handle,
                schema: None,
            });
        }

        Ok(Self { entries, handles })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Row count of each pair, in order.
    pub fn row_counts(&self) -> Vec<usize> {
        self.entries.iter().map(|e| e.num_rows).collect()
    }

    pub fn total_rows(&self) -> usize {
        self.entries.iter().map(|e| e.num_rows).sum()
    }

    /// `(source, group, rows)` of each pair, in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, usize)> + '_ {
        self.entries
            .iter()
            .map(|e| (e.source.as_str(), e.group.as_str(), e.num_rows))
    }

    /// Schema of pair `index`, discovered on first call.
    pub fn schema(&mut self, index: usize) -> Result<Arc<BatchSchema>> {
        let entry = self
            .entries
            .get_mut(index)
            .ok_or_else(|| ChunkError::selection_range(format!("No source at index {}", index)))?;
        if let Some(schema) = &entry.schema {
            return Ok(Arc::clone(schema));
        }
        let schema = self.handles[entry.handle].schema(&entry.group)?;
        tracing::debug!(
            source = %entry.source,
            group = %entry.group,
            columns = schema.num_fields(),
            "discovered schema"
        );
        entry.schema = Some(Arc::clone(&schema));
        Ok(schema)
    }

    /// Read rows of pair `index` into `out`.
    pub fn read(
        &mut self,
        index: usize,
        span: RowSpan<'_>,
        fields: &[String],
        out: &mut ColumnBatch,
    ) -> Result<usize> {
        let entry = self
            .entries
            .get(index)
            .ok_or_else(|| ChunkError::selection_range(format!("No source at index {}", index)))?;
        tracing::trace!(
            source = %entry.source,
            group = %entry.group,
            rows = span.len(),
            fancy = span.is_fancy(),
            "backend read"
        );
        self.handles[entry.handle].read_rows(&entry.group, span, fields, out)
    }
}
