use std::path::PathBuf;

use thiserror::Error;

/// Recoverable failures surfaced by buffer operations.
///
/// Contract violations (growing past the maximum capacity, sorting from
/// offset 0, reading the raw region past the current capacity) are not
/// represented here; those panic.
#[derive(Error, Debug)]
pub enum BufferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("while creating backing file {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("while truncating {path} to size: {size}: {source}")]
    Truncate {
        path: PathBuf,
        size: u64,
        #[source]
        source: std::io::Error,
    },

    #[error("while mmapping {path} with size: {size}: {source}")]
    Map {
        path: PathBuf,
        size: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("file size {size} of {path} is already bigger than max size {max}")]
    SizeExceeded { path: PathBuf, size: u64, max: usize },

    #[error("cannot {op} {len} bytes at offset {offset}: region holds {capacity} bytes")]
    OutOfBounds {
        op: &'static str,
        len: usize,
        offset: usize,
        capacity: usize,
    },

    #[error("not enough capacity in the buffer to return {requested} bytes (have {available})")]
    Capacity { requested: usize, available: usize },

    #[error("while flushing mapping of {path}: {source}")]
    Flush {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("while closing file {path}: {source}")]
    Close {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("while deleting file {path}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid buffer configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, BufferError>;
