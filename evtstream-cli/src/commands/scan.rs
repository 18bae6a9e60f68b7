use std::path::Path;

use crate::commands::open_iterator;
use crate::error::{CliError, CliResult};

pub fn run(config_path: &Path, start: usize, limit: Option<usize>, columns: bool) -> CliResult<()> {
    if limit == Some(0) {
        return Err(CliError::Usage("--limit must be at least 1".into()));
    }
    let mut iterator = open_iterator(config_path)?;

    let mut position = start;
    let mut chunks = 0usize;
    let mut total = 0usize;
    loop {
        if limit.is_some_and(|limit| chunks >= limit) {
            break;
        }
        let (container, rows) = iterator.read(position)?;
        if rows == 0 {
            break;
        }
        if columns {
            let names: Vec<&str> = container.column_names().collect();
            println!("chunk start={position} rows={rows} columns={}", names.join(","));
        } else {
            println!("chunk start={position} rows={rows}");
        }
        position += rows;
        total += rows;
        chunks += 1;
    }

    println!("{chunks} chunks, {total} rows");
    Ok(())
}
