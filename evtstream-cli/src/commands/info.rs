use std::path::Path;

use evtstream::ChunkIterator;

use crate::commands::open_iterator;
use crate::error::CliResult;

pub fn run(config_path: &Path) -> CliResult<()> {
    let iterator = open_iterator(config_path)?;

    print_iterator(&iterator, "");
    let mut depth = 1;
    let mut friend = iterator.friend();
    while let Some(it) = friend {
        println!("{}Friend:", "  ".repeat(depth));
        print_iterator(it, &"  ".repeat(depth + 1));
        friend = it.friend();
        depth += 1;
    }

    Ok(())
}

fn print_iterator(iterator: &ChunkIterator, indent: &str) {
    for (source, group, rows) in iterator.sources() {
        println!("{indent}Source:     {source} [{group}] {rows} rows");
    }
    println!("{indent}Total rows: {}", iterator.total_rows());
    println!("{indent}Selected:   {}", iterator.len());
    println!("{indent}Buffer len: {}", iterator.buffer_len());
    println!("{indent}Columns:    {}", iterator.field_names().join(", "));
}
