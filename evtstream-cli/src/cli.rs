use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "evtstream", about = "Chunked reader for columnar event data", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug logging (honours RUST_LOG)
    #[arg(long, short = 'v', global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Suppress all logging
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output (also respects NO_COLOR env var)
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Stream an iterator chunk by chunk, printing one line per chunk
    Scan {
        /// JSON iterator description
        #[arg(long, short = 'c', env = "EVTSTREAM_CONFIG")]
        config: PathBuf,

        /// Selection position to start at
        #[arg(long, default_value = "0")]
        start: usize,

        /// Stop after this many chunks
        #[arg(long)]
        limit: Option<usize>,

        /// Also print the column names of each chunk
        #[arg(long)]
        columns: bool,
    },

    /// Show sources, row counts and selection size of an iterator
    Info {
        /// JSON iterator description
        #[arg(long, short = 'c', env = "EVTSTREAM_CONFIG")]
        config: PathBuf,
    },
}
