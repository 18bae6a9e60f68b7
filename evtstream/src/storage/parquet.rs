//! Parquet directory storage.
//!
//! A source is a directory; each group inside it is one Parquet file, so the
//! group `geds/raw` of source `run0` lives at `run0/geds/raw.parquet`. Groups
//! are opened lazily the first time they are touched and stay open for the
//! lifetime of the handle.
//!
//! Reads decode only the requested columns (via a projected schema) and only
//! the row groups that contain a requested row. Decoded rows are then emitted
//! in the order the caller asked for, so unsorted and repeated indices work.

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use evtstream_tabular::{BatchSchema, Column, ColumnBatch, FieldInfo, FieldType};
use parquet::basic::{ConvertedType, Repetition, Type as PhysicalType};
use parquet::file::reader::FileReader;
use parquet::file::serialized_reader::SerializedFileReader;
use parquet::record::reader::RowIter;
use parquet::record::Field;
use parquet::schema::types::Type as SchemaType;

use super::{is_pattern, normalize_group, sorted_matches, RowSpan, SourceHandle, Storage};
use crate::error::{ChunkError, Result};

/// File extension of group files.
pub const GROUP_EXTENSION: &str = "parquet";

/// Storage over directories of Parquet files.
#[derive(Debug, Clone, Default)]
pub struct ParquetStorage {
    root: Option<PathBuf>,
}

impl ParquetStorage {
    /// Storage resolving sources as given.
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage resolving relative sources against `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, source: &str) -> PathBuf {
        let path = Path::new(source);
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl Storage for ParquetStorage {
    fn open(&self, source: &str) -> Result<Box<dyn SourceHandle>> {
        let dir = self.resolve(source);
        if !dir.is_dir() {
            return Err(ChunkError::resource_access(format!(
                "Source directory not found: {}",
                dir.display()
            )));
        }
        tracing::debug!(source, dir = %dir.display(), "opened parquet source");
        Ok(Box::new(ParquetSource {
            source: source.to_string(),
            dir,
            groups: HashMap::new(),
        }))
    }

    /// Patterns match source directories, relative to the root when one is set.
    fn expand(&self, source: &str) -> Result<Vec<String>> {
        if !is_pattern(source) {
            return Ok(vec![source.to_string()]);
        }
        let root = self
            .root
            .as_ref()
            .filter(|_| Path::new(source).is_relative());
        let pattern = match root {
            Some(root) => Path::new(&glob::Pattern::escape(&root.to_string_lossy()))
                .join(source)
                .to_string_lossy()
                .into_owned(),
            None => source.to_string(),
        };

        let paths = glob::glob(&pattern).map_err(|e| {
            ChunkError::config(format!("Invalid source pattern {}: {}", source, e))
        })?;
        let mut matches = Vec::new();
        for entry in paths {
            let path = entry.map_err(|e| ChunkError::resource_access(e.to_string()))?;
            if !path.is_dir() {
                continue;
            }
            let name = match root {
                Some(root) => path.strip_prefix(root).unwrap_or(path.as_path()),
                None => path.as_path(),
            };
            matches.push(name.to_string_lossy().into_owned());
        }
        tracing::debug!(pattern = %pattern, matches = matches.len(), "expanded source pattern");
        sorted_matches(source, matches)
    }
}

/// One opened group file.
struct GroupFile {
    reader: SerializedFileReader<File>,
    schema: Arc<BatchSchema>,
    /// Top-level parquet field index per supported column.
    parquet_index: HashMap<String, usize>,
    /// First row of each row group, plus the total as a final entry.
    row_group_starts: Vec<usize>,
}

impl GroupFile {
    fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            ChunkError::resource_access(format!("Cannot open group file {}: {}", path.display(), e))
        })?;
        let reader = SerializedFileReader::new(file).map_err(|e| {
            ChunkError::storage(format!("Failed to read Parquet file {}: {}", path.display(), e))
        })?;

        let metadata = reader.metadata();
        let mut fields = Vec::new();
        let mut parquet_index = HashMap::new();
        for (idx, field) in metadata.file_metadata().schema().get_fields().iter().enumerate() {
            match parquet_type_to_field_type(field) {
                Some(field_type) => {
                    let nullable = field.get_basic_info().has_repetition()
                        && field.get_basic_info().repetition() == Repetition::OPTIONAL;
                    parquet_index.insert(field.name().to_string(), idx);
                    fields.push(FieldInfo {
                        name: field.name().to_string(),
                        field_type,
                        nullable,
                    });
                }
                None => {
                    tracing::debug!(
                        file = %path.display(),
                        column = field.name(),
                        "skipping column with unsupported type"
                    );
                }
            }
        }

        let mut row_group_starts = Vec::with_capacity(metadata.num_row_groups() + 1);
        let mut total = 0usize;
        for rg_idx in 0..metadata.num_row_groups() {
            row_group_starts.push(total);
            total += metadata.row_group(rg_idx).num_rows() as usize;
        }
        row_group_starts.push(total);

        Ok(Self {
            reader,
            schema: Arc::new(BatchSchema::new(fields)),
            parquet_index,
            row_group_starts,
        })
    }

    fn num_rows(&self) -> usize {
        self.row_group_starts.last().copied().unwrap_or(0)
    }

    /// Decode the projected columns of every row in `wanted` (sorted, unique).
    fn decode_rows(&self, projection: &[usize], wanted: &[usize]) -> Result<HashMap<usize, Vec<Field>>> {
        let full_schema = self.reader.metadata().file_metadata().schema();
        let projected = build_projected_schema(full_schema, projection)?;
        let mut decoded = HashMap::with_capacity(wanted.len());

        for rg_idx in 0..self.row_group_starts.len() - 1 {
            let start = self.row_group_starts[rg_idx];
            let end = self.row_group_starts[rg_idx + 1];
            let first = wanted.partition_point(|&r| r < start);
            let last = wanted.partition_point(|&r| r < end);
            if first == last {
                continue;
            }
            let in_group = &wanted[first..last];

            let row_group_reader = self.reader.get_row_group(rg_idx).map_err(|e| {
                ChunkError::storage(format!("Failed to get row group {}: {}", rg_idx, e))
            })?;
            let row_iter = RowIter::from_row_group(Some(projected.clone()), row_group_reader.as_ref())
                .map_err(|e| {
                    ChunkError::storage(format!(
                        "Failed to create row iterator for row group {}: {}",
                        rg_idx, e
                    ))
                })?;

            // Rows past the last wanted one are never decoded.
            let span = in_group[in_group.len() - 1] - start + 1;
            for (offset, row_result) in row_iter.take(span).enumerate() {
                let row = row_result
                    .map_err(|e| ChunkError::storage(format!("Failed to read row: {}", e)))?;
                let local = start + offset;
                if in_group.binary_search(&local).is_ok() {
                    decoded.insert(
                        local,
                        row.get_column_iter().map(|(_, f)| f.clone()).collect(),
                    );
                }
            }
        }

        Ok(decoded)
    }
}

/// Handle onto one Parquet source directory.
struct ParquetSource {
    source: String,
    dir: PathBuf,
    groups: HashMap<String, GroupFile>,
}

impl fmt::Debug for ParquetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParquetSource")
            .field("source", &self.source)
            .field("dir", &self.dir)
            .field("open_groups", &self.groups.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ParquetSource {
    fn group(&mut self, group: &str) -> Result<&GroupFile> {
        let key = normalize_group(group);
        if key.is_empty() {
            return Err(ChunkError::resource_access(format!(
                "Empty group path in source {}",
                self.source
            )));
        }
        if !self.groups.contains_key(&key) {
            let path = self.dir.join(format!("{}.{}", key, GROUP_EXTENSION));
            let file = GroupFile::open(&path)?;
            tracing::debug!(
                source = %self.source,
                group = %key,
                rows = file.num_rows(),
                columns = file.schema.num_fields(),
                "opened group"
            );
            self.groups.insert(key.clone(), file);
        }
        self.groups
            .get(&key)
            .ok_or_else(|| ChunkError::resource_access(format!("Group {} not open", key)))
    }
}

impl SourceHandle for ParquetSource {
    fn source(&self) -> &str {
        &self.source
    }

    fn num_rows(&mut self, group: &str) -> Result<usize> {
        Ok(self.group(group)?.num_rows())
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
        let file = self.group(group)?;
        let num_rows = file.num_rows();
        if let Some(max) = span.max_row() {
            if max >= num_rows {
                return Err(ChunkError::selection_range(format!(
                    "Row {} out of range for group {} with {} rows",
                    max, group, num_rows
                )));
            }
        }
        if span.is_empty() {
            return Ok(0);
        }

        let projection = fields
            .iter()
            .map(|name| {
                file.parquet_index.get(name).copied().ok_or_else(|| {
                    ChunkError::config(format!("Column {} not found in group {}", name, group))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut wanted: Vec<usize> = span.rows().collect();
        wanted.sort_unstable();
        wanted.dedup();
        let decoded = file.decode_rows(&projection, &wanted)?;

        // The projected row carries fields in schema order, not request order.
        let mut order: Vec<usize> = (0..projection.len()).collect();
        order.sort_by_key(|&i| projection[i]);
        let mut position = vec![0usize; projection.len()];
        for (row_pos, &field_idx) in order.iter().enumerate() {
            position[field_idx] = row_pos;
        }

        for (field_idx, name) in fields.iter().enumerate() {
            let column = out.column_by_name_mut(name).ok_or_else(|| {
                ChunkError::config(format!("Column {} not present in output buffer", name))
            })?;
            for row in span.rows() {
                let values = decoded.get(&row).ok_or_else(|| {
                    ChunkError::storage(format!("Row {} of group {} was not decoded", row, group))
                })?;
                let value = values.get(position[field_idx]).ok_or_else(|| {
                    ChunkError::storage(format!("Column {} missing from decoded row {}", name, row))
                })?;
                append_field_value(column, name, value)?;
            }
        }

        Ok(span.len())
    }
}

/// Build a projected Parquet schema containing only the specified top-level columns.
fn build_projected_schema(full_schema: &SchemaType, column_indices: &[usize]) -> Result<SchemaType> {
    let fields = full_schema.get_fields();
    let mut indices = column_indices.to_vec();
    indices.sort_unstable();
    indices.dedup();

    let projected_fields: Vec<Arc<SchemaType>> = indices
        .iter()
        .filter_map(|&idx| fields.get(idx).cloned())
        .collect();

    // parquet-rs matches projections against the root name.
    SchemaType::group_type_builder(full_schema.name())
        .with_fields(projected_fields)
        .build()
        .map_err(|e| ChunkError::storage(format!("Failed to build projected schema: {}", e)))
}

/// Map a top-level Parquet field to a column type, if supported.
///
/// The column type must be the one the record reader's `Field` for this
/// physical/converted type pair decodes into; anything else is skipped.
fn parquet_type_to_field_type(parquet_type: &Arc<SchemaType>) -> Option<FieldType> {
    let basic_info = parquet_type.get_basic_info();

    if !parquet_type.is_primitive() {
        return if basic_info.converted_type() == ConvertedType::LIST {
            Some(FieldType::Float64List)
        } else {
            None
        };
    }

    match (parquet_type.get_physical_type(), basic_info.converted_type()) {
        (
            _,
            ConvertedType::DECIMAL
            | ConvertedType::INTERVAL
            | ConvertedType::TIME_MILLIS
            | ConvertedType::TIME_MICROS,
        ) => None,
        (PhysicalType::BOOLEAN, _) => Some(FieldType::Boolean),
        // u32 does not fit an i32 column.
        (PhysicalType::INT32, ConvertedType::UINT_32) => Some(FieldType::Int64),
        (PhysicalType::INT32, _) => Some(FieldType::Int32),
        (PhysicalType::INT64, _) => Some(FieldType::Int64),
        (PhysicalType::FLOAT, _) => Some(FieldType::Float32),
        (PhysicalType::DOUBLE, _) => Some(FieldType::Float64),
        (
            PhysicalType::BYTE_ARRAY,
            ConvertedType::UTF8 | ConvertedType::ENUM | ConvertedType::JSON,
        ) => Some(FieldType::String),
        (PhysicalType::BYTE_ARRAY, _) => Some(FieldType::Bytes),
        (PhysicalType::FIXED_LEN_BYTE_ARRAY, _) if basic_info.logical_type().is_some() => None,
        (PhysicalType::FIXED_LEN_BYTE_ARRAY, _) => Some(FieldType::Bytes),
        (PhysicalType::INT96, _) => None,
    }
}

/// Append one decoded value to a column.
fn append_field_value(column: &mut Column, name: &str, field: &Field) -> Result<()> {
    let column_type = column.field_type();
    let mismatch = || {
        ChunkError::storage(format!(
            "Unexpected value {:?} for {:?} column {}",
            field, column_type, name
        ))
    };

    match (column, field) {
        (Column::Boolean(v), Field::Null) => v.push(None),
        (Column::Int32(v), Field::Null) => v.push(None),
        (Column::Int64(v), Field::Null) => v.push(None),
        (Column::Float32(v), Field::Null) => v.push(None),
        (Column::Float64(v), Field::Null) => v.push(None),
        (Column::String(v), Field::Null) => v.push(None),
        (Column::Bytes(v), Field::Null) => v.push(None),
        (Column::Float64List(v), Field::Null) => v.push(None),

        (Column::Boolean(v), Field::Bool(b)) => v.push(Some(*b)),

        (Column::Int32(v), Field::Int(i)) => v.push(Some(*i)),
        (Column::Int32(v), Field::Short(i)) => v.push(Some(*i as i32)),
        (Column::Int32(v), Field::Byte(i)) => v.push(Some(*i as i32)),
        (Column::Int32(v), Field::UShort(i)) => v.push(Some(*i as i32)),
        (Column::Int32(v), Field::UByte(i)) => v.push(Some(*i as i32)),
        // Days since the Unix epoch.
        (Column::Int32(v), Field::Date(d)) => v.push(Some(*d)),

        (Column::Int64(v), Field::Long(i)) => v.push(Some(*i)),
        (Column::Int64(v), Field::UInt(i)) => v.push(Some(i64::from(*i))),
        (Column::Int64(v), Field::ULong(i)) => {
            let value = i64::try_from(*i).map_err(|_| {
                ChunkError::storage(format!("Value {} of column {} overflows Int64", i, name))
            })?;
            v.push(Some(value));
        }
        // Raw epoch offsets in the column's unit.
        (Column::Int64(v), Field::TimestampMillis(t)) => v.push(Some(*t)),
        (Column::Int64(v), Field::TimestampMicros(t)) => v.push(Some(*t)),

        (Column::Float32(v), Field::Float(x)) => v.push(Some(*x)),
        (Column::Float64(v), Field::Double(x)) => v.push(Some(*x)),

        (Column::String(v), Field::Str(s)) => v.push(Some(s.clone())),
        (Column::Bytes(v), Field::Bytes(b)) => v.push(Some(b.data().to_vec())),

        (Column::Float64List(v), Field::ListInternal(list)) => {
            let samples = list
                .elements()
                .iter()
                .map(sample_value)
                .collect::<Option<Vec<f64>>>()
                .ok_or_else(mismatch)?;
            v.push(Some(samples));
        }

        _ => return Err(mismatch()),
    }
    Ok(())
}

fn sample_value(field: &Field) -> Option<f64> {
    match field {
        Field::Double(x) => Some(*x),
        Field::Float(x) => Some(*x as f64),
        Field::Int(i) => Some(*i as f64),
        Field::Long(i) => Some(*i as f64),
        Field::Short(i) => Some(*i as f64),
        _ => None,
    }
}
