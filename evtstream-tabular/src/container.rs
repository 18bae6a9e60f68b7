//! Row containers handed out by chunked iterators.
//!
//! Storage backends describe a group with a plain `BatchSchema`; the container
//! kind is derived from that schema. A group laid out as `t0`, `dt`, `values`
//! is a waveform table, everything else is a plain column table. Both kinds
//! expose the same columnar interface, so the iteration engine never needs to
//! know which one it is filling.

use std::sync::Arc;

use crate::batch::{BatchSchema, Column, ColumnBatch, FieldType};
use crate::error::{Result, TabularError};

/// Waveform start time column.
pub const WAVEFORM_T0: &str = "t0";
/// Waveform sampling period column.
pub const WAVEFORM_DT: &str = "dt";
/// Waveform samples column.
pub const WAVEFORM_VALUES: &str = "values";

/// Concrete layout of a row container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    /// Arbitrary named columns.
    Table,
    /// Digitized traces: `t0`, `dt` and per-row sample arrays.
    Waveform,
}

impl ContainerKind {
    /// Classify a schema.
    pub fn detect(schema: &BatchSchema) -> Self {
        let is = |name: &str, ty: FieldType| {
            schema
                .field_by_name(name)
                .map_or(false, |f| f.field_type == ty)
        };
        if schema.num_fields() == 3
            && is(WAVEFORM_T0, FieldType::Float64)
            && is(WAVEFORM_DT, FieldType::Float64)
            && is(WAVEFORM_VALUES, FieldType::Float64List)
        {
            Self::Waveform
        } else {
            Self::Table
        }
    }
}

/// A table of digitized waveforms.
#[derive(Debug, Clone)]
pub struct WaveformTable {
    batch: ColumnBatch,
}

impl WaveformTable {
    /// Wrap a batch, checking it has the waveform layout.
    pub fn new(batch: ColumnBatch) -> Result<Self> {
        if ContainerKind::detect(&batch.schema) != ContainerKind::Waveform {
            return Err(TabularError::Schema(format!(
                "Not a waveform layout: columns [{}]",
                batch.column_names().collect::<Vec<_>>().join(", ")
            )));
        }
        Ok(Self { batch })
    }

    fn required(&self, name: &str) -> &Column {
        // Layout was validated in `new`; the batch is never re-schemed in place.
        &self.batch.columns[self.batch.schema.index_by_name(name).unwrap_or(0)]
    }

    /// Start time of each trace.
    pub fn t0(&self) -> &Column {
        self.required(WAVEFORM_T0)
    }

    /// Sampling period of each trace.
    pub fn dt(&self) -> &Column {
        self.required(WAVEFORM_DT)
    }

    /// Sample arrays.
    pub fn values(&self) -> &Column {
        self.required(WAVEFORM_VALUES)
    }

    /// Samples of one trace.
    pub fn waveform(&self, row: usize) -> Option<&[f64]> {
        self.values().get_f64_list(row)
    }

    pub fn batch(&self) -> &ColumnBatch {
        &self.batch
    }

    pub fn into_batch(self) -> ColumnBatch {
        self.batch
    }
}

/// A chunk of rows: either a plain table or a waveform table.
#[derive(Debug, Clone)]
pub enum RowContainer {
    Table(ColumnBatch),
    Waveform(WaveformTable),
}

impl RowContainer {
    /// Allocate an empty container for `schema` that holds `capacity` rows.
    pub fn with_capacity(schema: Arc<BatchSchema>, capacity: usize) -> Self {
        let kind = ContainerKind::detect(&schema);
        let batch = ColumnBatch::with_capacity(schema, capacity);
        match kind {
            ContainerKind::Table => Self::Table(batch),
            ContainerKind::Waveform => Self::Waveform(WaveformTable { batch }),
        }
    }

    pub fn kind(&self) -> ContainerKind {
        match self {
            Self::Table(_) => ContainerKind::Table,
            Self::Waveform(_) => ContainerKind::Waveform,
        }
    }

    /// Columnar view shared by every kind.
    pub fn batch(&self) -> &ColumnBatch {
        match self {
            Self::Table(batch) => batch,
            Self::Waveform(wf) => &wf.batch,
        }
    }

    /// Mutable columnar view.
    ///
    /// Callers may refill rows but must not change the schema of a waveform
    /// table; use [`RowContainer::into_table`] first.
    pub fn batch_mut(&mut self) -> &mut ColumnBatch {
        match self {
            Self::Table(batch) => batch,
            Self::Waveform(wf) => &mut wf.batch,
        }
    }

    #[inline]
    pub fn num_rows(&self) -> usize {
        self.batch().num_rows
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.batch().is_empty()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.batch().column_names()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.batch().column_by_name(name)
    }

    pub fn as_waveform(&self) -> Option<&WaveformTable> {
        match self {
            Self::Waveform(wf) => Some(wf),
            Self::Table(_) => None,
        }
    }

    /// Demote to a plain table so extra columns can be attached.
    pub fn into_table(self) -> Self {
        match self {
            Self::Waveform(wf) => Self::Table(wf.batch),
            table => table,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::FieldInfo;

    fn waveform_schema() -> Arc<BatchSchema> {
        Arc::new(BatchSchema::new(vec![
            FieldInfo::new(WAVEFORM_T0, FieldType::Float64),
            FieldInfo::new(WAVEFORM_DT, FieldType::Float64),
            FieldInfo::new(WAVEFORM_VALUES, FieldType::Float64List),
        ]))
    }

    #[test]
    fn test_detect_kind() {
        assert_eq!(ContainerKind::detect(&waveform_schema()), ContainerKind::Waveform);

        let table = BatchSchema::new(vec![
            FieldInfo::new(WAVEFORM_T0, FieldType::Float64),
            FieldInfo::new(WAVEFORM_DT, FieldType::Float64),
            FieldInfo::new(WAVEFORM_VALUES, FieldType::Float64List),
            FieldInfo::new("baseline", FieldType::Int32),
        ]);
        assert_eq!(ContainerKind::detect(&table), ContainerKind::Table);

        let wrong_type = BatchSchema::new(vec![
            FieldInfo::new(WAVEFORM_T0, FieldType::Float64),
            FieldInfo::new(WAVEFORM_DT, FieldType::Float64),
            FieldInfo::new(WAVEFORM_VALUES, FieldType::Float64),
        ]);
        assert_eq!(ContainerKind::detect(&wrong_type), ContainerKind::Table);
    }

    #[test]
    fn test_waveform_accessors() {
        let batch = ColumnBatch::new(
            waveform_schema(),
            vec![
                Column::Float64(vec![Some(0.0), Some(16.0)]),
                Column::Float64(vec![Some(16.0), Some(16.0)]),
                Column::Float64List(vec![Some(vec![1.0, 2.0]), Some(vec![3.0, 4.0])]),
            ],
        )
        .unwrap();
        let wf = WaveformTable::new(batch).unwrap();

        assert_eq!(wf.t0().get_f64(1), Some(16.0));
        assert_eq!(wf.dt().get_f64(0), Some(16.0));
        assert_eq!(wf.waveform(1), Some(&[3.0, 4.0][..]));
        assert_eq!(wf.waveform(2), None);
    }

    #[test]
    fn test_waveform_rejects_table_layout() {
        let schema = Arc::new(BatchSchema::new(vec![FieldInfo::new(
            "baseline",
            FieldType::Int32,
        )]));
        assert!(WaveformTable::new(ColumnBatch::with_capacity(schema, 0)).is_err());
    }

    #[test]
    fn test_container_with_capacity_and_demote() {
        let container = RowContainer::with_capacity(waveform_schema(), 8);
        assert_eq!(container.kind(), ContainerKind::Waveform);
        assert!(container.is_empty());
        assert!(container.as_waveform().is_some());

        let table = container.into_table();
        assert_eq!(table.kind(), ContainerKind::Table);
        assert_eq!(
            table.column_names().collect::<Vec<_>>(),
            vec![WAVEFORM_T0, WAVEFORM_DT, WAVEFORM_VALUES]
        );
    }
}
