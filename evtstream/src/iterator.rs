//! Chunked random-access iterator.
//!
//! A [`ChunkIterator`] owns a registry of opened sources, the selection map
//! built over their row counts, a single reusable buffer and an optional
//! friend. Every read refills the same buffer in place:
//!
//! 1. the primary's own columns are read, one backend call per source run
//! 2. the friend (if any) is filled for the same window and its columns copied
//!    into the buffer
//! 3. the buffer row count is updated
//!
//! A failed read leaves the buffer with zero rows.
//!
//! # Example
//!
//! ```ignore
//! let mut it = ChunkIterator::builder(storage)
//!     .sources(["run0", "run1"])
//!     .groups("geds/hit")
//!     .field_mask(["energy"])
//!     .buffer_len(1000)
//!     .build()?;
//!
//! while let Some(chunk) = it.next_chunk()? {
//!     process(chunk.container, chunk.start, chunk.rows);
//! }
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use evtstream_tabular::{Column, RowContainer, TabularError};

use crate::config::{expand_path, pair_sources, Sources};
use crate::error::{ChunkError, Result};
use crate::friend::FriendLink;
use crate::reader::BufferedReader;
use crate::registry::SourceRegistry;
use crate::selection::{Selection, SelectionMap};
use crate::storage::Storage;

/// Default number of rows per chunk.
pub const DEFAULT_BUFFER_LEN: usize = 3200;

/// Columns to materialize.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FieldMask {
    /// Every column of the first source's schema.
    #[default]
    All,
    /// The named columns, in the given order.
    Only(Vec<String>),
}

impl FieldMask {
    /// Mask of the named columns; duplicates are dropped.
    pub fn only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut fields: Vec<String> = Vec::new();
        for name in names {
            let name = name.into();
            if !fields.contains(&name) {
                fields.push(name);
            }
        }
        FieldMask::Only(fields)
    }
}

impl From<Vec<String>> for FieldMask {
    fn from(names: Vec<String>) -> Self {
        FieldMask::only(names)
    }
}

impl From<Vec<&str>> for FieldMask {
    fn from(names: Vec<&str>) -> Self {
        FieldMask::only(names)
    }
}

impl<const N: usize> From<[&str; N]> for FieldMask {
    fn from(names: [&str; N]) -> Self {
        FieldMask::only(names)
    }
}

/// One chunk of a sequential pass.
#[derive(Debug, Clone, Copy)]
pub struct Chunk<'a> {
    pub container: &'a RowContainer,
    /// Selection position of the first row.
    pub start: usize,
    pub rows: usize,
}

/// Chunked iterator over a selection of rows spread across sources.
#[derive(Debug)]
pub struct ChunkIterator {
    registry: SourceRegistry,
    selection: SelectionMap,
    reader: BufferedReader,
    friend: Option<FriendLink>,
    field_mask: FieldMask,
    cursor: usize,
}

impl ChunkIterator {
    /// Start building an iterator over sources opened through `storage`.
    pub fn builder(storage: Arc<dyn Storage>) -> ChunkIteratorBuilder {
        ChunkIteratorBuilder::new(storage)
    }

    /// Random access: fill the buffer starting at selection position `start`.
    ///
    /// Returns the buffer and the number of rows in it; zero once `start` is
    /// past the end of the selection. Does not move the cursor.
    pub fn read(&mut self, start: usize) -> Result<(&RowContainer, usize)> {
        let rows = self.fill(start, self.reader.buffer_len())?;
        Ok((self.reader.buffer(), rows))
    }

    /// Read the chunk at the cursor and advance past it.
    ///
    /// Returns `None` at the end of the pass. The cursor stays put on error.
    pub fn next_chunk(&mut self) -> Result<Option<Chunk<'_>>> {
        let start = self.cursor;
        let rows = self.fill(start, self.reader.buffer_len())?;
        if rows == 0 {
            return Ok(None);
        }
        self.cursor += rows;
        Ok(Some(Chunk {
            container: self.reader.buffer(),
            start,
            rows,
        }))
    }

    /// Run a fresh pass, calling `f` for every chunk. Returns the rows visited.
    pub fn for_each_chunk<F>(&mut self, mut f: F) -> Result<usize>
    where
        F: FnMut(Chunk<'_>) -> Result<()>,
    {
        self.reset();
        let mut total = 0;
        while let Some(chunk) = self.next_chunk()? {
            total += chunk.rows;
            f(chunk)?;
        }
        Ok(total)
    }

    /// Rewind the cursor to the start of the selection.
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// Number of selected entries.
    pub fn len(&self) -> usize {
        self.selection.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selection.is_empty()
    }

    /// Size of the virtual row space over all sources.
    pub fn total_rows(&self) -> usize {
        self.selection.total_rows()
    }

    pub fn buffer_len(&self) -> usize {
        self.reader.buffer_len()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// The explicit global entries, or `None` when every row is selected.
    pub fn global_entries(&self) -> Option<&[usize]> {
        self.selection.entries()
    }

    /// `(source, group, rows)` of each pair, in order.
    pub fn sources(&self) -> impl Iterator<Item = (&str, &str, usize)> + '_ {
        self.registry.iter()
    }

    /// Columns read from this iterator's own sources.
    pub fn field_names(&self) -> &[String] {
        self.reader.fields()
    }

    pub fn field_mask(&self) -> &FieldMask {
        &self.field_mask
    }

    /// The buffer as left by the last read.
    pub fn container(&self) -> &RowContainer {
        self.reader.buffer()
    }

    pub fn friend(&self) -> Option<&ChunkIterator> {
        self.friend.as_ref().map(FriendLink::iterator)
    }

    /// Replace the field mask and rebuild the buffer layout.
    ///
    /// Friend columns are kept. The buffer is empty afterwards.
    pub fn set_field_mask(&mut self, mask: impl Into<FieldMask>) -> Result<()> {
        let mask = mask.into();
        let reader = build_reader(
            &mut self.registry,
            &mask,
            self.reader.buffer_len(),
            self.friend.as_ref(),
        )?;
        self.reader = reader;
        self.field_mask = mask;
        Ok(())
    }

    /// Fill the buffer with up to `max_rows` rows starting at `start`.
    pub(crate) fn fill(&mut self, start: usize, max_rows: usize) -> Result<usize> {
        let result = self.fill_chunk(start, max_rows);
        if let Err(e) = &result {
            tracing::debug!(start, error = %e, "read failed");
            self.reader.buffer_mut().batch_mut().clear_rows();
        }
        result
    }

    fn fill_chunk(&mut self, start: usize, max_rows: usize) -> Result<usize> {
        let rows = self
            .reader
            .fill(&mut self.registry, &self.selection, start, max_rows)?;
        if let Some(friend) = &mut self.friend {
            friend.sync(start, rows, self.reader.buffer_mut().batch_mut())?;
        }
        self.reader.buffer_mut().batch_mut().sync_num_rows()?;
        tracing::debug!(start, rows, "read chunk");
        Ok(rows)
    }
}

/// Lay out the buffer for `mask` plus the friend's columns.
fn build_reader(
    registry: &mut SourceRegistry,
    mask: &FieldMask,
    buffer_len: usize,
    friend: Option<&FriendLink>,
) -> Result<BufferedReader> {
    let schema = registry.schema(0)?;
    let fields: Vec<String> = match mask {
        FieldMask::All => schema.names().map(String::from).collect(),
        FieldMask::Only(names) => {
            if names.is_empty() {
                return Err(ChunkError::config("Field mask must name at least one column"));
            }
            if let Some(missing) = names.iter().find(|n| !schema.contains(n)) {
                let (source, group, _) = registry.iter().next().unwrap_or_default();
                return Err(ChunkError::config(format!(
                    "Column {} not found in group {} of source {}",
                    missing, group, source
                )));
            }
            names.clone()
        }
    };

    let names: Vec<&str> = fields.iter().map(String::as_str).collect();
    let projected = Arc::new(schema.project(&names)?);
    let mut buffer = RowContainer::with_capacity(projected, buffer_len);

    if let Some(friend) = friend {
        buffer = buffer.into_table();
        for field in friend.columns() {
            let column = Column::with_capacity(field.field_type, buffer_len);
            buffer
                .batch_mut()
                .append_field(field, column)
                .map_err(|e| match e {
                    TabularError::DuplicateColumn(name) => ChunkError::column_collision(format!(
                        "Column {} is read by both the iterator and its friend",
                        name
                    )),
                    other => ChunkError::Tabular(other),
                })?;
        }
    }

    Ok(BufferedReader::new(buffer, buffer_len, fields))
}

/// Builder for [`ChunkIterator`].
#[derive(Debug)]
pub struct ChunkIteratorBuilder {
    storage: Arc<dyn Storage>,
    sources: Option<Sources>,
    groups: Option<Sources>,
    base_path: Option<PathBuf>,
    entry_list: Option<Selection>,
    entry_mask: Option<Selection>,
    field_mask: FieldMask,
    buffer_len: usize,
    friend: Option<ChunkIterator>,
}

impl ChunkIteratorBuilder {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            sources: None,
            groups: None,
            base_path: None,
            entry_list: None,
            entry_mask: None,
            field_mask: FieldMask::All,
            buffer_len: DEFAULT_BUFFER_LEN,
            friend: None,
        }
    }

    /// One source or a list of sources.
    pub fn sources(mut self, sources: impl Into<Sources>) -> Self {
        self.sources = Some(sources.into());
        self
    }

    /// One group path or a list of group paths.
    pub fn groups(mut self, groups: impl Into<Sources>) -> Self {
        self.groups = Some(groups.into());
        self
    }

    /// Directory relative sources are resolved against.
    pub fn base_path(mut self, base_path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(base_path.into());
        self
    }

    /// Entries to iterate. List-like selections conflict with `entry_mask`,
    /// mask-like selections with `entry_list`.
    pub fn selection(mut self, selection: Selection) -> Self {
        match selection {
            Selection::All => {}
            Selection::Entries(_) | Selection::PerSource(_) => self.entry_list = Some(selection),
            Selection::Mask(_) | Selection::PerSourceMask(_) => self.entry_mask = Some(selection),
        }
        self
    }

    /// Global entries, iterated in the order given.
    pub fn entry_list(mut self, entries: Vec<usize>) -> Self {
        self.entry_list = Some(Selection::Entries(entries));
        self
    }

    /// Global boolean mask over the virtual row space.
    pub fn entry_mask(mut self, mask: Vec<bool>) -> Self {
        self.entry_mask = Some(Selection::Mask(mask));
        self
    }

    pub fn field_mask(mut self, mask: impl Into<FieldMask>) -> Self {
        self.field_mask = mask.into();
        self
    }

    /// Rows per chunk.
    pub fn buffer_len(mut self, buffer_len: usize) -> Self {
        self.buffer_len = buffer_len;
        self
    }

    /// Iterator read in lockstep whose columns are merged into every chunk.
    pub fn friend(mut self, friend: ChunkIterator) -> Self {
        self.friend = Some(friend);
        self
    }

    /// Open the sources and lay out the buffer.
    pub fn build(self) -> Result<ChunkIterator> {
        if self.buffer_len == 0 {
            return Err(ChunkError::config("buffer_len must be positive"));
        }
        let selection = match (self.entry_list, self.entry_mask) {
            (Some(_), Some(_)) => {
                return Err(ChunkError::config(
                    "entry_list and entry_mask are mutually exclusive",
                ))
            }
            (Some(selection), None) | (None, Some(selection)) => selection,
            (None, None) => Selection::All,
        };

        let sources = self
            .sources
            .ok_or_else(|| ChunkError::argument_type("No sources given"))?;
        let groups = self
            .groups
            .ok_or_else(|| ChunkError::argument_type("No groups given"))?;
        let base_path = self.base_path.as_deref();
        let mut pairs: Vec<(String, String)> = Vec::new();
        for (source, group) in pair_sources(&sources, &groups)? {
            // A pattern contributes every match, each paired with its group.
            for matched in self.storage.expand(&expand_path(&source, base_path))? {
                pairs.push((matched, group.clone()));
            }
        }

        let mut registry = SourceRegistry::open(self.storage.as_ref(), &pairs)?;
        let selection = SelectionMap::new(&registry.row_counts(), &selection)?;

        let friend = match self.friend {
            Some(friend) => {
                if friend.buffer_len() < self.buffer_len {
                    return Err(ChunkError::config(format!(
                        "Friend buffer_len {} is smaller than buffer_len {}",
                        friend.buffer_len(),
                        self.buffer_len
                    )));
                }
                if friend.len() != selection.len() {
                    tracing::warn!(
                        primary = selection.len(),
                        friend = friend.len(),
                        "friend selection length differs from primary"
                    );
                }
                Some(FriendLink::new(friend))
            }
            None => None,
        };

        let reader = build_reader(
            &mut registry,
            &self.field_mask,
            self.buffer_len,
            friend.as_ref(),
        )?;

        tracing::debug!(
            sources = registry.len(),
            total_rows = selection.total_rows(),
            selected = selection.len(),
            buffer_len = self.buffer_len,
            columns = reader.buffer().batch().schema.num_fields(),
            friend = friend.is_some(),
            "built chunk iterator"
        );

        Ok(ChunkIterator {
            registry,
            selection,
            reader,
            friend,
            field_mask: self.field_mask,
            cursor: 0,
        })
    }
}
