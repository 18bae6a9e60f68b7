//! Lockstep reading of a second iterator whose columns join the primary's.

use evtstream_tabular::{ColumnBatch, FieldInfo};

use crate::error::{ChunkError, Result};
use crate::iterator::ChunkIterator;

/// An owned friend iterator.
///
/// The friend is asked for exactly the primary's window; its whole container,
/// including the columns of its own friend, is copied into the primary's.
#[derive(Debug)]
pub struct FriendLink {
    friend: Box<ChunkIterator>,
}

impl FriendLink {
    pub fn new(friend: ChunkIterator) -> Self {
        Self {
            friend: Box::new(friend),
        }
    }

    /// Columns the friend contributes, in its container order.
    pub fn columns(&self) -> Vec<FieldInfo> {
        self.friend.container().batch().schema.fields.clone()
    }

    pub fn iterator(&self) -> &ChunkIterator {
        &self.friend
    }

    /// Fill the friend for `[start, start + rows)` and copy its columns into `primary`.
    pub fn sync(&mut self, start: usize, rows: usize, primary: &mut ColumnBatch) -> Result<()> {
        let actual = self.friend.fill(start, rows)?;
        if actual != rows {
            return Err(ChunkError::Alignment {
                start,
                expected: rows,
                actual,
            });
        }

        let merged = self.friend.container().batch();
        for (field, column) in merged.schema.fields.iter().zip(&merged.columns) {
            let target = primary.column_by_name_mut(&field.name).ok_or_else(|| {
                ChunkError::config(format!("Friend column {} missing from primary buffer", field.name))
            })?;
            target.clear();
            target.extend_from_indices(&field.name, column, 0..column.len())?;
        }
        Ok(())
    }
}
