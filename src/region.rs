//! Backing storage for a [`Buffer`](crate::Buffer).
//!
//! A region is either a zeroed heap allocation that is reallocated on growth,
//! or a file mapped up front to the buffer's maximum size and grown by
//! extending the file underneath the mapping.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use memmap2::{MmapMut, MmapOptions};
use tracing::{debug, trace};

use crate::error::{BufferError, Result};

/// Allocation strategy backing a buffer
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BufferKind {
    /// Zeroed heap allocation, copied into a larger allocation on growth
    #[default]
    Heap,
    /// Memory-mapped file, grown by truncating the file to a larger size
    Mmap,
}

impl fmt::Display for BufferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BufferKind::Heap => f.write_str("heap"),
            BufferKind::Mmap => f.write_str("mmap"),
        }
    }
}

/// A mapped file plus the handles needed to tear it down.
pub(crate) struct MappedFile {
    mmap: MmapMut,
    file: File,
    path: PathBuf,
}

pub(crate) enum Region {
    Heap(Box<[u8]>),
    Mapped(MappedFile),
}

impl Default for Region {
    fn default() -> Self {
        Region::Heap(Box::default())
    }
}

impl Region {
    /// Allocate `size` zeroed bytes on the heap
    pub(crate) fn heap(size: usize) -> Self {
        trace!(size, "allocating heap region");
        Region::Heap(vec![0u8; size].into_boxed_slice())
    }

    /// Create a temp file of `size` bytes and map it up to `max_size`
    pub(crate) fn temp_mapped(size: usize, max_size: usize) -> Result<Self> {
        Self::temp_mapped_in(&std::env::temp_dir(), size, max_size)
    }

    /// Like [`Region::temp_mapped`], creating the file in `dir`.
    ///
    /// The file is deleted if sizing or mapping it fails.
    pub(crate) fn temp_mapped_in(dir: &Path, size: usize, max_size: usize) -> Result<Self> {
        let named = tempfile::Builder::new()
            .prefix("buffer")
            .tempfile_in(dir)
            .map_err(|source| BufferError::Create {
                path: dir.to_path_buf(),
                source,
            })?;

        truncate(named.as_file(), named.path(), size as u64)?;
        let mmap = map(named.as_file(), named.path(), max_size)?;

        let (file, temp_path) = named.into_parts();
        let path = temp_path.keep().map_err(|e| BufferError::Create {
            path: e.path.to_path_buf(),
            source: e.error,
        })?;
        debug!(path = %path.display(), size, max_size, "mapped temp buffer file");

        Ok(Region::Mapped(MappedFile { mmap, file, path }))
    }

    /// Open or create the file at `path` and map it up to `max_size`.
    ///
    /// Returns the region together with the size the file had before it was
    /// opened, so the caller can resume writing after existing content.
    pub(crate) fn open_mapped(path: &Path, size: usize, max_size: usize) -> Result<(Self, u64)> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|source| BufferError::Create {
                path: path.to_path_buf(),
                source,
            })?;

        let existing = file.metadata()?.len();
        if existing > max_size as u64 {
            return Err(BufferError::SizeExceeded {
                path: path.to_path_buf(),
                size: existing,
                max: max_size,
            });
        }

        truncate(&file, path, existing.max(size as u64))?;
        let mmap = map(&file, path, max_size)?;
        debug!(path = %path.display(), existing, size, max_size, "mapped existing buffer file");

        let region = Region::Mapped(MappedFile {
            mmap,
            file,
            path: path.to_path_buf(),
        });
        Ok((region, existing))
    }

    pub(crate) fn kind(&self) -> BufferKind {
        match self {
            Region::Heap(_) => BufferKind::Heap,
            Region::Mapped(_) => BufferKind::Mmap,
        }
    }

    pub(crate) fn path(&self) -> Option<&Path> {
        match self {
            Region::Heap(_) => None,
            Region::Mapped(m) => Some(&m.path),
        }
    }

    /// Entire addressable span. For mapped regions this covers the maximum
    /// size, of which only the prefix up to the file length is backed.
    pub(crate) fn bytes(&self) -> &[u8] {
        match self {
            Region::Heap(buf) => &buf[..],
            Region::Mapped(m) => &m.mmap[..],
        }
    }

    pub(crate) fn bytes_mut(&mut self) -> &mut [u8] {
        match self {
            Region::Heap(buf) => &mut buf[..],
            Region::Mapped(m) => &mut m.mmap[..],
        }
    }

    /// Grow the region to `new_size` bytes, keeping the first `live` bytes.
    pub(crate) fn grow(&mut self, new_size: usize, live: usize) -> Result<()> {
        match self {
            Region::Heap(buf) => {
                let mut grown = vec![0u8; new_size].into_boxed_slice();
                grown[..live].copy_from_slice(&buf[..live]);
                *buf = grown;
                Ok(())
            }
            Region::Mapped(m) => truncate(&m.file, &m.path, new_size as u64),
        }
    }

    /// Write dirty pages of a mapped region back to its file
    pub(crate) fn flush(&self) -> Result<()> {
        match self {
            Region::Heap(_) => Ok(()),
            Region::Mapped(m) => m.mmap.flush().map_err(|source| BufferError::Flush {
                path: m.path.clone(),
                source,
            }),
        }
    }

    /// Free the region. Mapped regions are torn down in order: unmap,
    /// truncate to zero, close, remove. Every step runs even if an earlier
    /// one failed; the first failure is returned.
    pub(crate) fn release(self) -> Result<()> {
        let MappedFile { mmap, file, path } = match self {
            Region::Heap(_) => return Ok(()),
            Region::Mapped(m) => m,
        };

        drop(mmap);
        let truncated = truncate(&file, &path, 0);
        let closed = close_file(file).map_err(|source| BufferError::Close {
            path: path.clone(),
            source,
        });
        let removed = fs::remove_file(&path).map_err(|source| BufferError::Remove {
            path: path.clone(),
            source,
        });
        debug!(path = %path.display(), "released mapped buffer file");

        truncated.and(closed).and(removed)
    }

    /// Unmap and close a mapped region, keeping the first `len` bytes on disk.
    pub(crate) fn persist(self, len: usize) -> Result<()> {
        let MappedFile { mmap, file, path } = match self {
            Region::Heap(_) => return Ok(()),
            Region::Mapped(m) => m,
        };

        mmap.flush().map_err(|source| BufferError::Flush {
            path: path.clone(),
            source,
        })?;
        drop(mmap);
        truncate(&file, &path, len as u64)?;
        close_file(file).map_err(|source| BufferError::Close {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), len, "persisted mapped buffer file");
        Ok(())
    }
}

fn truncate(file: &File, path: &Path, size: u64) -> Result<()> {
    file.set_len(size).map_err(|source| BufferError::Truncate {
        path: path.to_path_buf(),
        size,
        source,
    })
}

fn map(file: &File, path: &Path, len: usize) -> Result<MmapMut> {
    // SAFETY: the file is owned by the region for the lifetime of the mapping
    // and is not resized below the buffer's capacity while mapped.
    unsafe { MmapOptions::new().len(len).map_mut(file) }.map_err(|source| BufferError::Map {
        path: path.to_path_buf(),
        size: len,
        source,
    })
}

/// Close a file descriptor and report the result, which `Drop` would discard
#[cfg(unix)]
fn close_file(file: File) -> io::Result<()> {
    use std::os::unix::io::IntoRawFd;

    let fd = file.into_raw_fd();
    if unsafe { libc::close(fd) } == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(not(unix))]
fn close_file(file: File) -> io::Result<()> {
    drop(file);
    Ok(())
}
