use clap::Parser;

use crate::buffer::DEFAULT_INITIAL_SIZE;
use crate::sort::DEFAULT_CHUNK_SIZE;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "recsort",
    about = "Sort records in place inside a record buffer"
)]
pub struct Args {
    /// Reverse the result of comparisons
    #[arg(short = 'r', long)]
    pub reverse: bool,

    /// Compare according to numerical value
    #[arg(short = 'n', long = "numeric-sort")]
    pub numeric: bool,

    /// Fold lower case to upper case characters
    #[arg(short = 'f', long = "ignore-case")]
    pub fold_case: bool,

    /// Output only the first of an equal run
    #[arg(short = 'u', long)]
    pub unique: bool,

    /// Stabilize sort by disabling last-resort comparison
    #[arg(short = 's', long)]
    pub stable: bool,

    /// Write result to FILE instead of stdout
    #[arg(short = 'o', long, value_name = "FILE")]
    pub output: Option<String>,

    /// Records are NUL terminated, not newline terminated
    #[arg(short = 'z', long = "zero-terminated")]
    pub zero_terminated: bool,

    /// Stage records in a memory-mapped temp file instead of the heap
    #[arg(long)]
    pub mmap: bool,

    /// Initial buffer size in bytes
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_INITIAL_SIZE)]
    pub buffer_size: usize,

    /// Maximum buffer size in bytes (0 for the default)
    #[arg(long, value_name = "BYTES", default_value_t = 0)]
    pub max_size: usize,

    /// Records per chunk in the chunk-sort phase
    #[arg(long, value_name = "N", default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    /// Input files
    #[arg(value_name = "FILE")]
    pub files: Vec<String>,
}

impl Args {
    /// Get the record delimiter (newline or NUL)
    pub fn record_delimiter(&self) -> u8 {
        if self.zero_terminated {
            0u8
        } else {
            b'\n'
        }
    }
}
