//! Virtual row space and entry selection.
//!
//! The row counts of all `(source, group)` pairs concatenate into one virtual
//! row space. A [`Selection`] picks an ordered sequence of entries from that
//! space, and a [`SelectionMap`] translates a position in that sequence back to
//! a `(source index, local row)` pair.

use crate::error::{ChunkError, Result};

/// Which entries of the virtual row space to iterate.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection {
    /// Every row, in storage order.
    #[default]
    All,
    /// Global entries, in the order given. May be unsorted or repeat.
    Entries(Vec<usize>),
    /// Global boolean mask; must cover the whole row space.
    Mask(Vec<bool>),
    /// One list of local rows per source, concatenated in source order.
    PerSource(Vec<Vec<usize>>),
    /// One boolean mask per source.
    PerSourceMask(Vec<Vec<bool>>),
}

impl Selection {
    pub fn is_all(&self) -> bool {
        matches!(self, Selection::All)
    }
}

/// Resolves selection positions against per-source row counts.
#[derive(Debug, Clone)]
pub struct SelectionMap {
    /// Cumulative row count: `ends[i]` is one past the last global row of source `i`.
    ends: Vec<usize>,
    /// Explicit global entries; `None` selects `[0, total)`.
    entries: Option<Vec<usize>>,
}

impl SelectionMap {
    /// Build a map from the row count of each source.
    pub fn new(row_counts: &[usize], selection: &Selection) -> Result<Self> {
        let mut ends = Vec::with_capacity(row_counts.len());
        let mut total = 0usize;
        for &rows in row_counts {
            total += rows;
            ends.push(total);
        }

        let entries = match selection {
            Selection::All => None,
            Selection::Entries(entries) => {
                if let Some(&bad) = entries.iter().find(|&&e| e >= total) {
                    return Err(ChunkError::selection_range(format!(
                        "Entry {} outside of {} total rows",
                        bad, total
                    )));
                }
                Some(entries.clone())
            }
            Selection::Mask(mask) => {
                if mask.len() != total {
                    return Err(ChunkError::config(format!(
                        "Entry mask has {} values but sources hold {} rows",
                        mask.len(),
                        total
                    )));
                }
                Some(mask_positions(mask).collect())
            }
            Selection::PerSource(lists) => {
                check_per_source(lists.len(), row_counts.len())?;
                let mut entries = Vec::with_capacity(lists.iter().map(Vec::len).sum());
                for (i, list) in lists.iter().enumerate() {
                    let offset = ends[i] - row_counts[i];
                    for &local in list {
                        if local >= row_counts[i] {
                            return Err(ChunkError::selection_range(format!(
                                "Local entry {} outside of source {} with {} rows",
                                local, i, row_counts[i]
                            )));
                        }
                        entries.push(offset + local);
                    }
                }
                Some(entries)
            }
            Selection::PerSourceMask(masks) => {
                check_per_source(masks.len(), row_counts.len())?;
                let mut entries = Vec::new();
                for (i, mask) in masks.iter().enumerate() {
                    if mask.len() != row_counts[i] {
                        return Err(ChunkError::config(format!(
                            "Entry mask for source {} has {} values but the source holds {} rows",
                            i,
                            mask.len(),
                            row_counts[i]
                        )));
                    }
                    let offset = ends[i] - row_counts[i];
                    entries.extend(mask_positions(mask).map(|local| offset + local));
                }
                Some(entries)
            }
        };

        Ok(Self { ends, entries })
    }

    /// Number of selected entries.
    pub fn len(&self) -> usize {
        match &self.entries {
            Some(entries) => entries.len(),
            None => self.total_rows(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Size of the virtual row space.
    pub fn total_rows(&self) -> usize {
        self.ends.last().copied().unwrap_or(0)
    }

    pub fn num_sources(&self) -> usize {
        self.ends.len()
    }

    /// Global entry at a selection position.
    pub fn entry(&self, position: usize) -> Result<usize> {
        if position >= self.len() {
            return Err(ChunkError::selection_range(format!(
                "Position {} outside of selection of length {}",
                position,
                self.len()
            )));
        }
        Ok(match &self.entries {
            Some(entries) => entries[position],
            None => position,
        })
    }

    /// Source index and local row of the entry at a selection position.
    pub fn resolve(&self, position: usize) -> Result<(usize, usize)> {
        let entry = self.entry(position)?;
        // First source whose end lies past the entry; empty sources are skipped.
        let source = self.ends.partition_point(|&end| end <= entry);
        let offset = if source == 0 { 0 } else { self.ends[source - 1] };
        Ok((source, entry - offset))
    }

    /// Explicit global entries, or `None` for the implicit range.
    pub fn entries(&self) -> Option<&[usize]> {
        self.entries.as_deref()
    }
}

fn mask_positions(mask: &[bool]) -> impl Iterator<Item = usize> + '_ {
    mask.iter()
        .enumerate()
        .filter_map(|(i, &keep)| keep.then_some(i))
}

fn check_per_source(given: usize, sources: usize) -> Result<()> {
    if given != sources {
        return Err(ChunkError::argument_type(format!(
            "Per-source selection has {} lists for {} sources",
            given, sources
        )));
    }
    Ok(())
}
