//! Growable byte buffer for length-prefixed records, with an in-place sort.
//!
//! A [`Buffer`] stores records back to back without a per-record
//! allocation, on the heap or in a memory-mapped file, and sorts them
//! without decoding them.

pub mod buffer;
pub mod cli;
pub mod compare;
pub mod config;
pub mod error;
pub mod input;
pub mod output;
pub mod record;
pub mod region;
pub mod sort;

pub use buffer::Buffer;
pub use config::BufferConfig;
pub use error::{BufferError, Result};
pub use record::Records;
pub use region::BufferKind;
pub use sort::SortOptions;
