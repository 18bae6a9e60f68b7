//! In-memory storage for tests and embedding.

use std::collections::HashMap;
use std::sync::Arc;

use evtstream_tabular::{BatchSchema, ColumnBatch};

use super::{is_pattern, normalize_group, sorted_matches, RowSpan, SourceHandle, Storage};
use crate::error::{ChunkError, Result};

/// In-memory storage: named sources, each holding batches under group paths.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    sources: HashMap<String, HashMap<String, Arc<ColumnBatch>>>,
}

impl MemoryStorage {
    /// Create a new empty memory storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a group in a source, creating the source if needed.
    pub fn add_group(&mut self, source: impl Into<String>, group: &str, batch: ColumnBatch) {
        self.sources
            .entry(source.into())
            .or_default()
            .insert(normalize_group(group), Arc::new(batch));
    }

    /// Number of sources.
    pub fn num_sources(&self) -> usize {
        self.sources.len()
    }
}

impl Storage for MemoryStorage {
    fn open(&self, source: &str) -> Result<Box<dyn SourceHandle>> {
        let groups = self
            .sources
            .get(source)
            .ok_or_else(|| ChunkError::resource_access(format!("Source not found: {}", source)))?;
        Ok(Box::new(MemorySource {
            source: source.to_string(),
            groups: groups.clone(),
        }))
    }

    /// Patterns match source names.
    fn expand(&self, source: &str) -> Result<Vec<String>> {
        if !is_pattern(source) {
            return Ok(vec![source.to_string()]);
        }
        let pattern = glob::Pattern::new(source).map_err(|e| {
            ChunkError::config(format!("Invalid source pattern {}: {}", source, e))
        })?;
        let matches = self
            .sources
            .keys()
            .filter(|name| pattern.matches(name))
            .cloned()
            .collect();
        sorted_matches(source, matches)
    }
}

/// Handle onto one in-memory source.
#[derive(Debug)]
struct MemorySource {
    source: String,
    groups: HashMap<String, Arc<ColumnBatch>>,
}

impl MemorySource {
    fn group(&self, group: &str) -> Result<&ColumnBatch> {
        self.groups
            .get(&normalize_group(group))
            .map(|b| b.as_ref())
            .ok_or_else(|| {
                ChunkError::resource_access(format!(
                    "Group {} not found in source {}",
                    group, self.source
                ))
            })
    }
}

impl SourceHandle for MemorySource {
    fn source(&self) -> &str {
        &self.source
    }

    fn num_rows(&mut self, group: &str) -> Result<usize> {
        Ok(self.group(group)?.num_rows)
    }

    fn schema(&mut self, group: &str) -> Result<Arc<BatchSchema>> {
        Ok(Arc::clone(&self.group(group)?.schema))
    }

    fn read_rows(
        &mut self,
        group: &str,
        span: RowSpan<'_>,
        fields: &[String],
        out: &mut ColumnBatch,
    ) -> Result<usize> {
        let batch = self.group(group)?;

        if let Some(max) = span.max_row() {
            if max >= batch.num_rows {
                return Err(ChunkError::selection_range(format!(
                    "Row {} out of range for group {} with {} rows",
                    max, group, batch.num_rows
                )));
            }
        }

        for name in fields {
            let src = batch.column_by_name(name).ok_or_else(|| {
                ChunkError::config(format!("Column {} not found in group {}", name, group))
            })?;
            let dst = out.column_by_name_mut(name).ok_or_else(|| {
                ChunkError::config(format!("Column {} not present in output buffer", name))
            })?;
            dst.extend_from_indices(name, src, span.rows())?;
        }

        Ok(span.len())
    }
}
