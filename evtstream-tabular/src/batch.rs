//! Columnar batch format for event data.
//!
//! A `ColumnBatch` stores rows in typed column vectors together with the schema
//! describing them. Batches double as reusable read buffers: `clear_rows` keeps
//! every column allocation so a refill of the same size does not reallocate.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Result, TabularError};

/// Column value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Boolean,
    Int32,
    Int64,
    Float32,
    Float64,
    String,
    Bytes,
    /// Variable-length array of samples per row (e.g. a digitized waveform).
    Float64List,
}

/// Name and type of one column.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldInfo {
    /// Canonical column name.
    pub name: String,
    /// Value type.
    pub field_type: FieldType,
    /// Nulls permitted.
    pub nullable: bool,
}

impl FieldInfo {
    /// Create a nullable field.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            nullable: true,
        }
    }

    /// Create a non-nullable field.
    pub fn required(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            nullable: false,
        }
    }
}

/// Ordered fields with a name index.
#[derive(Debug, Clone)]
pub struct BatchSchema {
    /// Fields, in column order.
    pub fields: Vec<FieldInfo>,
    /// Lookup by name.
    name_to_index: HashMap<String, usize>,
}

impl BatchSchema {
    /// Schema over `fields`, indexed by name.
    pub fn new(fields: Vec<FieldInfo>) -> Self {
        let name_to_index = fields
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name.clone(), i))
            .collect();

        Self {
            fields,
            name_to_index,
        }
    }

    /// Position of the field named `name`.
    #[inline]
    pub fn index_by_name(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    /// Field named `name`.
    pub fn field_by_name(&self, name: &str) -> Option<&FieldInfo> {
        self.index_by_name(name).map(|i| &self.fields[i])
    }

    /// Whether a column with this name exists.
    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.name_to_index.contains_key(name)
    }

    /// Field count.
    #[inline]
    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }

    /// Column names in schema order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Project to the named fields, in the order given.
    pub fn project(&self, names: &[&str]) -> Result<Self> {
        let fields = names
            .iter()
            .map(|name| {
                self.field_by_name(name)
                    .cloned()
                    .ok_or_else(|| TabularError::Schema(format!("Field {} not found in schema", name)))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(fields))
    }
}

/// Typed values of one column; `None` marks a null.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Boolean(Vec<Option<bool>>),
    Int32(Vec<Option<i32>>),
    Int64(Vec<Option<i64>>),
    Float32(Vec<Option<f32>>),
    Float64(Vec<Option<f64>>),
    String(Vec<Option<String>>),
    Bytes(Vec<Option<Vec<u8>>>),
    Float64List(Vec<Option<Vec<f64>>>),
}

impl Column {
    /// Zero-length column with room for `capacity` values.
    pub fn with_capacity(field_type: FieldType, capacity: usize) -> Self {
        match field_type {
            FieldType::Boolean => Self::Boolean(Vec::with_capacity(capacity)),
            FieldType::Int32 => Self::Int32(Vec::with_capacity(capacity)),
            FieldType::Int64 => Self::Int64(Vec::with_capacity(capacity)),
            FieldType::Float32 => Self::Float32(Vec::with_capacity(capacity)),
            FieldType::Float64 => Self::Float64(Vec::with_capacity(capacity)),
            FieldType::String => Self::String(Vec::with_capacity(capacity)),
            FieldType::Bytes => Self::Bytes(Vec::with_capacity(capacity)),
            FieldType::Float64List => Self::Float64List(Vec::with_capacity(capacity)),
        }
    }

    /// Number of values, nulls included.
    #[inline]
    pub fn len(&self) -> usize {
        match self {
            Self::Boolean(v) => v.len(),
            Self::Int32(v) => v.len(),
            Self::Int64(v) => v.len(),
            Self::Float32(v) => v.len(),
            Self::Float64(v) => v.len(),
            Self::String(v) => v.len(),
            Self::Bytes(v) => v.len(),
            Self::Float64List(v) => v.len(),
        }
    }

    /// True when the column holds no values.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True for a null slot or an index past the end.
    #[inline]
    pub fn is_null(&self, idx: usize) -> bool {
        match self {
            Self::Boolean(v) => v.get(idx).map_or(true, |v| v.is_none()),
            Self::Int32(v) => v.get(idx).map_or(true, |v| v.is_none()),
            Self::Int64(v) => v.get(idx).map_or(true, |v| v.is_none()),
            Self::Float32(v) => v.get(idx).map_or(true, |v| v.is_none()),
            Self::Float64(v) => v.get(idx).map_or(true, |v| v.is_none()),
            Self::String(v) => v.get(idx).map_or(true, |v| v.is_none()),
            Self::Bytes(v) => v.get(idx).map_or(true, |v| v.is_none()),
            Self::Float64List(v) => v.get(idx).map_or(true, |v| v.is_none()),
        }
    }

    /// Value type of this column.
    pub fn field_type(&self) -> FieldType {
        match self {
            Self::Boolean(_) => FieldType::Boolean,
            Self::Int32(_) => FieldType::Int32,
            Self::Int64(_) => FieldType::Int64,
            Self::Float32(_) => FieldType::Float32,
            Self::Float64(_) => FieldType::Float64,
            Self::String(_) => FieldType::String,
            Self::Bytes(_) => FieldType::Bytes,
            Self::Float64List(_) => FieldType::Float64List,
        }
    }

    /// The bool at `idx`, if present.
    #[inline]
    pub fn get_bool(&self, idx: usize) -> Option<bool> {
        match self {
            Self::Boolean(v) => v.get(idx).and_then(|v| *v),
            _ => None,
        }
    }

    /// The i32 at `idx`, if present.
    #[inline]
    pub fn get_i32(&self, idx: usize) -> Option<i32> {
        match self {
            Self::Int32(v) => v.get(idx).and_then(|v| *v),
            _ => None,
        }
    }

    /// The i64 at `idx`, if present.
    #[inline]
    pub fn get_i64(&self, idx: usize) -> Option<i64> {
        match self {
            Self::Int64(v) => v.get(idx).and_then(|v| *v),
            _ => None,
        }
    }

    /// The f32 at `idx`, if present.
    #[inline]
    pub fn get_f32(&self, idx: usize) -> Option<f32> {
        match self {
            Self::Float32(v) => v.get(idx).and_then(|v| *v),
            _ => None,
        }
    }

    /// The f64 at `idx`, if present.
    #[inline]
    pub fn get_f64(&self, idx: usize) -> Option<f64> {
        match self {
            Self::Float64(v) => v.get(idx).and_then(|v| *v),
            _ => None,
        }
    }

    /// The string at `idx`, if present.
    #[inline]
    pub fn get_string(&self, idx: usize) -> Option<&str> {
        match self {
            Self::String(v) => v.get(idx).and_then(|v| v.as_deref()),
            _ => None,
        }
    }

    /// The bytes at `idx`, if present.
    #[inline]
    pub fn get_bytes(&self, idx: usize) -> Option<&[u8]> {
        match self {
            Self::Bytes(v) => v.get(idx).and_then(|v| v.as_deref()),
            _ => None,
        }
    }

    /// The sample array at `idx`, if present.
    #[inline]
    pub fn get_f64_list(&self, idx: usize) -> Option<&[f64]> {
        match self {
            Self::Float64List(v) => v.get(idx).and_then(|v| v.as_deref()),
            _ => None,
        }
    }

    /// Drop all rows, keeping the allocation.
    pub fn clear(&mut self) {
        match self {
            Self::Boolean(v) => v.clear(),
            Self::Int32(v) => v.clear(),
            Self::Int64(v) => v.clear(),
            Self::Float32(v) => v.clear(),
            Self::Float64(v) => v.clear(),
            Self::String(v) => v.clear(),
            Self::Bytes(v) => v.clear(),
            Self::Float64List(v) => v.clear(),
        }
    }

    /// Append the rows of `src` at `indices` (in iteration order) to this column.
    ///
    /// Both columns must have the same type; `name` is only used for errors.
    pub fn extend_from_indices<I>(&mut self, name: &str, src: &Column, indices: I) -> Result<()>
    where
        I: IntoIterator<Item = usize>,
    {
        match (self, src) {
            (Self::Boolean(dst), Self::Boolean(src)) => extend_rows(name, dst, src, indices),
            (Self::Int32(dst), Self::Int32(src)) => extend_rows(name, dst, src, indices),
            (Self::Int64(dst), Self::Int64(src)) => extend_rows(name, dst, src, indices),
            (Self::Float32(dst), Self::Float32(src)) => extend_rows(name, dst, src, indices),
            (Self::Float64(dst), Self::Float64(src)) => extend_rows(name, dst, src, indices),
            (Self::String(dst), Self::String(src)) => extend_rows(name, dst, src, indices),
            (Self::Bytes(dst), Self::Bytes(src)) => extend_rows(name, dst, src, indices),
            (Self::Float64List(dst), Self::Float64List(src)) => {
                extend_rows(name, dst, src, indices)
            }
            (dst, src) => Err(TabularError::TypeMismatch {
                name: name.to_string(),
                expected: dst.field_type(),
                actual: src.field_type(),
            }),
        }
    }
}

fn extend_rows<T, I>(name: &str, dst: &mut Vec<Option<T>>, src: &[Option<T>], indices: I) -> Result<()>
where
    T: Clone,
    I: IntoIterator<Item = usize>,
{
    for idx in indices {
        let value = src.get(idx).ok_or_else(|| {
            TabularError::Schema(format!(
                "Row {} out of bounds for column {} with {} rows",
                idx,
                name,
                src.len()
            ))
        })?;
        dst.push(value.clone());
    }
    Ok(())
}

/// Columnar batch of rows.
#[derive(Debug, Clone)]
pub struct ColumnBatch {
    /// Shared layout of the columns.
    pub schema: Arc<BatchSchema>,
    /// One column per schema field.
    pub columns: Vec<Column>,
    /// Row count, kept in step with the columns by `sync_num_rows`.
    pub num_rows: usize,
}

impl ColumnBatch {
    /// Batch from matching schema and columns. Fails if counts or lengths disagree.
    pub fn new(schema: Arc<BatchSchema>, columns: Vec<Column>) -> Result<Self> {
        if columns.len() != schema.num_fields() {
            return Err(TabularError::Schema(format!(
                "Column count mismatch: schema has {} fields, got {} columns",
                schema.num_fields(),
                columns.len()
            )));
        }

        for (field, col) in schema.fields.iter().zip(&columns) {
            if field.field_type != col.field_type() {
                return Err(TabularError::TypeMismatch {
                    name: field.name.clone(),
                    expected: field.field_type,
                    actual: col.field_type(),
                });
            }
        }

        let num_rows = columns.first().map_or(0, |c| c.len());

        for (i, col) in columns.iter().enumerate() {
            if col.len() != num_rows {
                return Err(TabularError::Schema(format!(
                    "Row count mismatch: column {} has {} rows, expected {}",
                    i,
                    col.len(),
                    num_rows
                )));
            }
        }

        Ok(Self {
            schema,
            columns,
            num_rows,
        })
    }

    /// Create an empty batch whose columns can hold `capacity` rows without reallocating.
    pub fn with_capacity(schema: Arc<BatchSchema>, capacity: usize) -> Self {
        let columns = schema
            .fields
            .iter()
            .map(|f| Column::with_capacity(f.field_type, capacity))
            .collect();
        Self {
            schema,
            columns,
            num_rows: 0,
        }
    }

    /// Get column by name.
    #[inline]
    pub fn column_by_name(&self, name: &str) -> Option<&Column> {
        self.schema.index_by_name(name).map(|i| &self.columns[i])
    }

    /// Get mutable column by name.
    #[inline]
    pub fn column_by_name_mut(&mut self, name: &str) -> Option<&mut Column> {
        match self.schema.index_by_name(name) {
            Some(i) => self.columns.get_mut(i),
            None => None,
        }
    }

    /// Column at position `index`.
    #[inline]
    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    /// Column names in schema order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.schema.names()
    }

    /// True when the batch holds no rows.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.num_rows == 0
    }

    /// Drop all rows, keeping schema and column allocations.
    pub fn clear_rows(&mut self) {
        for col in &mut self.columns {
            col.clear();
        }
        self.num_rows = 0;
    }

    /// Recompute `num_rows` after columns were appended to in place.
    ///
    /// Fails if the columns disagree on their length.
    pub fn sync_num_rows(&mut self) -> Result<usize> {
        let num_rows = self.columns.first().map_or(0, |c| c.len());
        for (field, col) in self.schema.fields.iter().zip(&self.columns) {
            if col.len() != num_rows {
                return Err(TabularError::Schema(format!(
                    "Row count mismatch: column {} has {} rows, expected {}",
                    field.name,
                    col.len(),
                    num_rows
                )));
            }
        }
        self.num_rows = num_rows;
        Ok(num_rows)
    }

    /// Add a column at the end of the schema.
    ///
    /// The column must match the batch row count unless the batch has no columns yet.
    pub fn append_field(&mut self, field: FieldInfo, column: Column) -> Result<()> {
        if self.schema.contains(&field.name) {
            return Err(TabularError::DuplicateColumn(field.name));
        }
        if field.field_type != column.field_type() {
            return Err(TabularError::TypeMismatch {
                name: field.name,
                expected: field.field_type,
                actual: column.field_type(),
            });
        }
        if !self.columns.is_empty() && column.len() != self.num_rows {
            return Err(TabularError::Schema(format!(
                "Row count mismatch: column {} has {} rows, expected {}",
                field.name,
                column.len(),
                self.num_rows
            )));
        }

        let mut fields = self.schema.fields.clone();
        fields.push(field);
        self.num_rows = column.len();
        self.columns.push(column);
        self.schema = Arc::new(BatchSchema::new(fields));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_schema() -> Arc<BatchSchema> {
        Arc::new(BatchSchema::new(vec![
            FieldInfo::required("timestamp", FieldType::Int64),
            FieldInfo::new("channel", FieldType::String),
            FieldInfo::new("is_valid", FieldType::Boolean),
        ]))
    }

    fn sample_batch() -> ColumnBatch {
        ColumnBatch::new(
            sample_schema(),
            vec![
                Column::Int64(vec![Some(10), Some(20), Some(30), Some(40)]),
                Column::String(vec![
                    Some("ch1".to_string()),
                    Some("ch2".to_string()),
                    None,
                    Some("ch4".to_string()),
                ]),
                Column::Boolean(vec![Some(true), Some(false), Some(true), None]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_schema_lookup() {
        let schema = sample_schema();

        assert_eq!(schema.index_by_name("timestamp"), Some(0));
        assert_eq!(schema.index_by_name("channel"), Some(1));
        assert_eq!(schema.index_by_name("unknown"), None);
        assert!(schema.contains("is_valid"));
        assert_eq!(
            schema.names().collect::<Vec<_>>(),
            vec!["timestamp", "channel", "is_valid"]
        );
    }

    #[test]
    fn test_column_batch_creation() {
        let batch = sample_batch();
        assert_eq!(batch.num_rows, 4);

        let ts = batch.column_by_name("timestamp").unwrap();
        assert_eq!(ts.get_i64(0), Some(10));
        assert_eq!(ts.get_i64(3), Some(40));

        let channel = batch.column_by_name("channel").unwrap();
        assert_eq!(channel.get_string(0), Some("ch1"));
        assert_eq!(channel.get_string(2), None); // null
        assert!(channel.is_null(2));

        assert_eq!(batch.column(2).unwrap().get_bool(0), Some(true));
    }

    #[test]
    fn test_new_rejects_type_mismatch() {
        let result = ColumnBatch::new(
            sample_schema(),
            vec![
                Column::Int32(vec![Some(1)]),
                Column::String(vec![None]),
                Column::Boolean(vec![None]),
            ],
        );
        assert!(matches!(result, Err(TabularError::TypeMismatch { .. })));
    }

    #[test]
    fn test_new_rejects_ragged_columns() {
        let result = ColumnBatch::new(
            sample_schema(),
            vec![
                Column::Int64(vec![Some(1), Some(2)]),
                Column::String(vec![None]),
                Column::Boolean(vec![None, None]),
            ],
        );
        assert!(matches!(result, Err(TabularError::Schema(_))));
    }

    #[test]
    fn test_clear_and_refill_in_place() {
        let source = sample_batch();
        let mut buffer = ColumnBatch::with_capacity(sample_schema(), 4);

        for (field, col) in buffer.schema.clone().fields.iter().zip(buffer.columns.iter_mut()) {
            let src = source.column_by_name(&field.name).unwrap();
            col.extend_from_indices(&field.name, src, [2, 1]).unwrap();
        }
        assert_eq!(buffer.sync_num_rows().unwrap(), 2);
        assert_eq!(buffer.column_by_name("timestamp").unwrap().get_i64(0), Some(30));

        buffer.clear_rows();
        assert!(buffer.is_empty());
        assert_eq!(buffer.column_by_name("channel").unwrap().len(), 0);
    }

    #[test]
    fn test_extend_from_indices_errors() {
        let mut dst = Column::Int64(Vec::new());
        let wrong = Column::Float64(vec![Some(1.0)]);
        assert!(matches!(
            dst.extend_from_indices("x", &wrong, [0]),
            Err(TabularError::TypeMismatch { .. })
        ));

        let src = Column::Int64(vec![Some(1)]);
        assert!(dst.extend_from_indices("x", &src, [5]).is_err());
    }

    #[test]
    fn test_sync_num_rows_detects_ragged() {
        let mut batch = ColumnBatch::with_capacity(sample_schema(), 2);
        if let Some(Column::Int64(v)) = batch.column_by_name_mut("timestamp") {
            v.push(Some(1));
        }
        assert!(batch.sync_num_rows().is_err());
    }

    #[test]
    fn test_append_field() {
        let mut batch = sample_batch();
        batch
            .append_field(
                FieldInfo::new("energy", FieldType::Float64),
                Column::Float64(vec![Some(1.0), Some(2.0), None, Some(4.0)]),
            )
            .unwrap();
        assert_eq!(batch.schema.num_fields(), 4);
        assert_eq!(batch.column_by_name("energy").unwrap().get_f64(1), Some(2.0));

        let dup = batch.append_field(
            FieldInfo::new("channel", FieldType::String),
            Column::String(vec![None; 4]),
        );
        assert!(matches!(dup, Err(TabularError::DuplicateColumn(name)) if name == "channel"));

        let short = batch.append_field(
            FieldInfo::new("short", FieldType::Int32),
            Column::Int32(vec![Some(1)]),
        );
        assert!(short.is_err());
    }

    #[test]
    fn test_sample_list_column() {
        let col = Column::Float64List(vec![Some(vec![1.0, 2.0, 3.0]), None]);
        assert_eq!(col.get_f64_list(0), Some(&[1.0, 2.0, 3.0][..]));
        assert!(col.is_null(1));
    }
}
