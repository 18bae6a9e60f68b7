pub mod info;
pub mod scan;

use std::path::Path;
use std::sync::Arc;

use evtstream::{ChunkIterator, IteratorConfig, ParquetStorage};

use crate::error::CliResult;

/// Load a config file and build its iterator over Parquet sources.
pub fn open_iterator(config_path: &Path) -> CliResult<ChunkIterator> {
    let config = IteratorConfig::from_path(config_path)?;
    Ok(ChunkIterator::from_config(Arc::new(ParquetStorage::new()), &config)?)
}
