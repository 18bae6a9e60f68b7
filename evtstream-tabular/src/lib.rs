//! Row container types for evtstream.
//!
//! This crate provides the columnar containers that chunked iterators fill and
//! hand back to callers, independent of the storage backend that produced them.
//!
//! # Design
//!
//! - **Columnar storage**: Data is stored in typed `Vec` per column, not per-row
//! - **Strongly typed**: All column access is through the `Column` enum, no `dyn Any`
//! - **Name canonical**: Column names are the canonical identifier for columns
//! - **Reusable**: Batches can be cleared and refilled without reallocating

pub mod batch;
pub mod container;
pub mod error;

pub use batch::{BatchSchema, Column, ColumnBatch, FieldInfo, FieldType};
pub use container::{ContainerKind, RowContainer, WaveformTable};
pub use error::{Result, TabularError};
