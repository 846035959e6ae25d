use std::path::PathBuf;

use crate::buffer::{Buffer, DEFAULT_INITIAL_SIZE, DEFAULT_MAX_SIZE};
use crate::cli::Args;
use crate::error::{BufferError, Result};
use crate::region::BufferKind;
use crate::sort::SortOptions;

/// How to create a [`Buffer`]
#[derive(Clone, Debug)]
pub struct BufferConfig {
    /// Bytes allocated up front; 0 selects the default
    pub initial_size: usize,
    /// Hard limit on growth; 0 selects the default
    pub max_size: usize,
    pub kind: BufferKind,
    /// Existing file to map instead of a temp file (mmap only)
    pub path: Option<PathBuf>,
    /// Write cursor to resume at when mapping `path`
    pub start_offset: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            initial_size: 0,
            max_size: 0,
            kind: BufferKind::Heap,
            path: None,
            start_offset: 1,
        }
    }
}

impl BufferConfig {
    pub fn with_initial_size(mut self, size: usize) -> Self {
        self.initial_size = size;
        self
    }

    pub fn with_max_size(mut self, size: usize) -> Self {
        self.max_size = size;
        self
    }

    pub fn with_kind(mut self, kind: BufferKind) -> Self {
        self.kind = kind;
        self
    }

    /// Map the given file; implies [`BufferKind::Mmap`]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self.kind = BufferKind::Mmap;
        self
    }

    pub fn with_start_offset(mut self, offset: usize) -> Self {
        self.start_offset = offset;
        self
    }

    /// Initial and maximum size after defaults, rejecting inconsistent values
    pub fn effective_sizes(&self) -> Result<(usize, usize)> {
        let initial = if self.initial_size == 0 {
            DEFAULT_INITIAL_SIZE
        } else {
            self.initial_size
        };
        let max = if self.max_size == 0 {
            DEFAULT_MAX_SIZE
        } else {
            self.max_size
        };

        if initial > max {
            return Err(BufferError::InvalidConfig(format!(
                "initial size {} exceeds max size {}",
                initial, max
            )));
        }
        if self.path.is_some() && self.kind != BufferKind::Mmap {
            return Err(BufferError::InvalidConfig(
                "a backing file requires the mmap buffer kind".to_string(),
            ));
        }
        if self.start_offset > max {
            return Err(BufferError::InvalidConfig(format!(
                "start offset {} exceeds max size {}",
                self.start_offset, max
            )));
        }
        Ok((initial, max))
    }

    /// Create the buffer described by this configuration
    pub fn build(&self) -> Result<Buffer> {
        let (initial, max) = self.effective_sizes()?;
        match &self.path {
            Some(path) => Buffer::open_mmap(path, initial, max, self.start_offset),
            None => Buffer::with_kind(initial, max, self.kind),
        }
    }
}

/// Runtime configuration of `recsort`, derived from CLI arguments
#[derive(Clone, Debug)]
pub struct Config {
    pub reverse: bool,
    pub numeric: bool,
    pub fold_case: bool,
    pub unique: bool,
    pub stable: bool,
    pub record_delimiter: u8,
    pub output_file: Option<String>,
    pub input_files: Vec<String>,
    pub buffer: BufferConfig,
    pub sort: SortOptions,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            reverse: false,
            numeric: false,
            fold_case: false,
            unique: false,
            stable: false,
            record_delimiter: b'\n',
            output_file: None,
            input_files: vec![],
            buffer: BufferConfig::default(),
            sort: SortOptions::default(),
        }
    }
}

impl Config {
    /// Build configuration from parsed CLI arguments
    pub fn from_args(args: &Args) -> Result<Self> {
        if args.chunk_size == 0 {
            return Err(BufferError::InvalidConfig(
                "chunk size must be positive".to_string(),
            ));
        }

        let kind = if args.mmap {
            BufferKind::Mmap
        } else {
            BufferKind::Heap
        };
        let buffer = BufferConfig::default()
            .with_kind(kind)
            .with_initial_size(args.buffer_size)
            .with_max_size(args.max_size);
        buffer.effective_sizes()?;

        Ok(Config {
            reverse: args.reverse,
            numeric: args.numeric,
            fold_case: args.fold_case,
            unique: args.unique,
            stable: args.stable,
            record_delimiter: args.record_delimiter(),
            output_file: args.output.clone(),
            input_files: args.files.clone(),
            buffer,
            sort: SortOptions::default().with_chunk_size(args.chunk_size),
        })
    }

    /// Whether last-resort comparison is enabled
    pub fn use_last_resort(&self) -> bool {
        !self.stable && !self.unique
    }
}
