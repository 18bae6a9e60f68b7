//! Read planning and the reusable chunk buffer.

use std::ops::Range;

use evtstream_tabular::RowContainer;

use crate::error::{ChunkError, Result};
use crate::registry::SourceRegistry;
use crate::selection::SelectionMap;
use crate::storage::RowSpan;

/// Local rows of one source run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunRows {
    /// Ascending, consecutive rows.
    Slice(Range<usize>),
    /// Anything else, in selection order.
    Fancy(Vec<usize>),
}

impl RunRows {
    pub fn len(&self) -> usize {
        match self {
            RunRows::Slice(r) => r.len(),
            RunRows::Fancy(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&mut self, local: usize) {
        match self {
            RunRows::Slice(r) if r.end == local => r.end += 1,
            RunRows::Slice(r) => {
                let mut rows: Vec<usize> = r.clone().collect();
                rows.push(local);
                *self = RunRows::Fancy(rows);
            }
            RunRows::Fancy(rows) => rows.push(local),
        }
    }

    fn span(&self) -> RowSpan<'_> {
        match self {
            RunRows::Slice(r) => RowSpan::Range(r.clone()),
            RunRows::Fancy(rows) => RowSpan::Indices(rows),
        }
    }
}

/// A maximal sequence of selection positions served by one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadRun {
    pub source: usize,
    pub rows: RunRows,
}

/// Split the window `[start, start + max_rows)` of the selection into runs.
pub fn plan_runs(map: &SelectionMap, start: usize, max_rows: usize) -> Result<Vec<ReadRun>> {
    let end = start.saturating_add(max_rows).min(map.len());
    let mut runs: Vec<ReadRun> = Vec::new();
    for position in start..end {
        let (source, local) = map.resolve(position)?;
        match runs.last_mut() {
            Some(run) if run.source == source => run.rows.push(local),
            _ => runs.push(ReadRun {
                source,
                rows: RunRows::Slice(local..local + 1),
            }),
        }
    }
    Ok(runs)
}

/// Fills a fixed-capacity container from the registry.
#[derive(Debug)]
pub struct BufferedReader {
    buffer: RowContainer,
    buffer_len: usize,
    /// Columns this reader fetches from its own sources.
    fields: Vec<String>,
}

impl BufferedReader {
    pub fn new(buffer: RowContainer, buffer_len: usize, fields: Vec<String>) -> Self {
        Self {
            buffer,
            buffer_len,
            fields,
        }
    }

    /// Read up to `max_rows` rows starting at selection position `start`.
    ///
    /// Only this reader's own columns are filled; any other column of the
    /// buffer is left empty. On error the buffer holds no rows.
    pub fn fill(
        &mut self,
        registry: &mut SourceRegistry,
        map: &SelectionMap,
        start: usize,
        max_rows: usize,
    ) -> Result<usize> {
        self.buffer.batch_mut().clear_rows();
        let result = self.fill_runs(registry, map, start, max_rows.min(self.buffer_len));
        if result.is_err() {
            self.buffer.batch_mut().clear_rows();
        }
        result
    }

    fn fill_runs(
        &mut self,
        registry: &mut SourceRegistry,
        map: &SelectionMap,
        start: usize,
        max_rows: usize,
    ) -> Result<usize> {
        let runs = plan_runs(map, start, max_rows)?;
        let mut filled = 0;

        for run in &runs {
            let schema = registry.schema(run.source)?;
            if let Some(missing) = self.fields.iter().find(|f| !schema.contains(f)) {
                let (source, group, _) = registry.iter().nth(run.source).unwrap_or_default();
                return Err(ChunkError::config(format!(
                    "Column {} not found in group {} of source {}",
                    missing, group, source
                )));
            }

            let expected = run.rows.len();
            let read = registry.read(run.source, run.rows.span(), &self.fields, self.buffer.batch_mut())?;
            if read != expected {
                return Err(ChunkError::storage(format!(
                    "Backend returned {} rows, expected {}",
                    read, expected
                )));
            }
            filled += read;
        }

        let batch = self.buffer.batch();
        for name in &self.fields {
            let len = batch.column_by_name(name).map_or(0, |c| c.len());
            if len != filled {
                return Err(ChunkError::storage(format!(
                    "Column {} holds {} rows after reading {}",
                    name, len, filled
                )));
            }
        }

        tracing::trace!(start, runs = runs.len(), rows = filled, "filled buffer");
        Ok(filled)
    }

    pub fn buffer(&self) -> &RowContainer {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut RowContainer {
        &mut self.buffer
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer_len
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }
}
