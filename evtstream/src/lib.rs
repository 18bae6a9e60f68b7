//! Chunked random-access iteration over columnar event data.
//!
//! Event data is stored as named columns under group paths, spread over many
//! physical sources. This crate streams such data in fixed-size chunks through
//! a single reusable buffer:
//!
//! - [`storage`] - Backends that open sources and read rows of a group
//! - [`selection`] - Virtual row space and entry selection
//! - [`registry`] - Ordered `(source, group)` pairs and their row counts
//! - [`reader`] - Read planning and the reusable buffer
//! - [`friend`] - Lockstep reading of a second iterator
//! - [`iterator`] - The [`ChunkIterator`] and its builder
//! - [`config`] - JSON iterator descriptions

pub mod config;
pub mod error;
pub mod friend;
pub mod iterator;
pub mod reader;
pub mod registry;
pub mod selection;
pub mod storage;

pub use config::{IteratorConfig, Sources};
pub use error::{ChunkError, Result};
pub use iterator::{Chunk, ChunkIterator, ChunkIteratorBuilder, FieldMask, DEFAULT_BUFFER_LEN};
pub use selection::{Selection, SelectionMap};
pub use storage::{MemoryStorage, ParquetStorage, RecordingStorage, RowSpan, SourceHandle, Storage};

// Container types, so callers need only this crate.
pub use evtstream_tabular::{
    BatchSchema, Column, ColumnBatch, ContainerKind, FieldInfo, FieldType, RowContainer,
    WaveformTable,
};
