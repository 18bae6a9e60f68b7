//! Storage abstraction for reading grouped columnar sources.
//!
//! This module provides the [`Storage`] trait, which opens a physical source
//! (a file, a directory, an in-memory fixture), and the [`SourceHandle`] trait,
//! which answers row counts and schemas for the groups inside an opened source
//! and performs a single slice or fancy-indexed read into a caller-owned batch.
//!
//! # Design
//!
//! - **Synchronous**: reads block; the iterator above is single-threaded
//! - **Exclusive handles**: every handle is owned by the registry that opened it,
//!   so handle methods take `&mut self` and may cache freely
//! - **Append-only reads**: a read appends rows to the projected columns of the
//!   output batch; the caller decides where a chunk starts

use std::fmt::Debug;
use std::ops::Range;
use std::sync::Arc;

use evtstream_tabular::{BatchSchema, ColumnBatch};

use crate::error::{ChunkError, Result};

pub mod memory;
pub mod parquet;
pub mod recording;

pub use self::memory::MemoryStorage;
pub use self::parquet::ParquetStorage;
pub use self::recording::{ReadCall, RecordingStorage};

/// Rows to read from one group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowSpan<'a> {
    /// Contiguous local rows.
    Range(Range<usize>),
    /// Explicit local rows, in output order. May be unsorted or repeat.
    Indices(&'a [usize]),
}

impl RowSpan<'_> {
    /// Number of rows the read will produce.
    pub fn len(&self) -> usize {
        match self {
            RowSpan::Range(r) => r.len(),
            RowSpan::Indices(ix) => ix.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether this is an explicit-index read.
    pub fn is_fancy(&self) -> bool {
        matches!(self, RowSpan::Indices(_))
    }

    /// Local rows in output order.
    pub fn rows(&self) -> impl Iterator<Item = usize> + '_ {
        let (range, indices) = match self {
            RowSpan::Range(r) => (r.clone(), &[][..]),
            RowSpan::Indices(ix) => (0..0, *ix),
        };
        range.chain(indices.iter().copied())
    }

    /// Largest local row touched, if any.
    pub fn max_row(&self) -> Option<usize> {
        match self {
            RowSpan::Range(r) if r.is_empty() => None,
            RowSpan::Range(r) => Some(r.end - 1),
            RowSpan::Indices(ix) => ix.iter().copied().max(),
        }
    }
}

/// Opens physical sources.
pub trait Storage: Debug {
    /// Open a source.
    ///
    /// Fails with `ChunkError::ResourceAccess` if the source does not exist.
    fn open(&self, source: &str) -> Result<Box<dyn SourceHandle>>;

    /// The sources a source identifier names, sorted.
    ///
    /// Backends that understand wildcard patterns (`*`, `?`, `[...]`) return
    /// every match; a pattern matching nothing fails with
    /// `ChunkError::ResourceAccess`. By default an identifier names itself.
    fn expand(&self, source: &str) -> Result<Vec<String>> {
        Ok(vec![source.to_string()])
    }
}

/// An opened source containing one or more groups.
pub trait SourceHandle: Debug {
    /// Identifier the handle was opened with.
    fn source(&self) -> &str;

    /// Number of rows in a group.
    ///
    /// Fails with `ChunkError::ResourceAccess` if the group does not resolve.
    fn num_rows(&mut self, group: &str) -> Result<usize>;

    /// Full schema of a group.
    fn schema(&mut self, group: &str) -> Result<Arc<BatchSchema>>;

    /// Append the rows in `span` of the named `fields` to the same-named
    /// columns of `out`. Returns the number of rows appended.
    fn read_rows(
        &mut self,
        group: &str,
        span: RowSpan<'_>,
        fields: &[String],
        out: &mut ColumnBatch,
    ) -> Result<usize>;
}

/// Whether a source identifier is a wildcard pattern.
pub fn is_pattern(source: &str) -> bool {
    source.contains(['*', '?', '['])
}

/// Sort the matches of `pattern`, failing if there are none.
pub(crate) fn sorted_matches(pattern: &str, mut matches: Vec<String>) -> Result<Vec<String>> {
    if matches.is_empty() {
        return Err(ChunkError::resource_access(format!(
            "No sources match {}",
            pattern
        )));
    }
    matches.sort();
    Ok(matches)
}

/// Canonical form of a group path: no leading, trailing or repeated `/`.
pub fn normalize_group(group: &str) -> String {
    group
        .split('/')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}
