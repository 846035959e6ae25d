//! Growable record buffer.
//!
//! A [`Buffer`] is an arena of bytes with a write cursor. Offsets handed out
//! by the buffer stay valid across growth; slices do not, because a heap
//! backed buffer is reallocated when it grows.

use std::fmt;
use std::io;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::{BufferError, Result};
use crate::record::{self, LEN_PREFIX, Records};
use crate::region::{BufferKind, Region};

/// Initial capacity used when zero is requested
pub const DEFAULT_INITIAL_SIZE: usize = 64;

/// Maximum capacity used when zero is requested
pub const DEFAULT_MAX_SIZE: usize = i32::MAX as usize;

/// Upper bound on a single growth step, unless the request itself is larger
const MAX_GROW_STEP: usize = 1 << 30;

/// Byte buffer holding length-prefixed records. NOT thread-safe.
///
/// Offset 0 is reserved as the end-of-chain sentinel, so the write cursor
/// starts at 1. The owner should call [`Buffer::release`]; dropping the
/// buffer releases it on a best-effort basis.
pub struct Buffer {
    region: Region,
    offset: usize,
    capacity: usize,
    max_capacity: usize,
}

impl Buffer {
    /// Heap buffer with an effectively unlimited maximum size
    pub fn new(size: usize) -> Self {
        let size = if size == 0 { DEFAULT_INITIAL_SIZE } else { size };
        Self::from_region(Region::heap(size), 1, size, usize::MAX)
    }

    /// Allocate `size` bytes up front, never growing past `max_size`.
    ///
    /// Zero sizes fall back to defaults. Panics if `size > max_size` after
    /// defaulting.
    pub fn with_kind(size: usize, max_size: usize, kind: BufferKind) -> Result<Self> {
        let (size, max_size) = apply_defaults(size, max_size);
        assert!(
            size <= max_size,
            "initial size {} exceeds max size {}",
            size,
            max_size
        );

        let region = match kind {
            BufferKind::Heap => Region::heap(size),
            BufferKind::Mmap => Region::temp_mapped(size, max_size)?,
        };
        let mut buffer = Self::from_region(region, 1, size, max_size);
        buffer.region.bytes_mut()[0] = 0;
        debug!(kind = %kind, size, max_size, "created buffer");
        Ok(buffer)
    }

    /// Map the file at `path`, creating it if needed.
    ///
    /// An existing file is never shrunk: the write cursor resumes at the
    /// larger of `start_offset` and the file's size, so records already on
    /// disk are kept. The file is extended to cover the cursor.
    pub fn open_mmap(
        path: impl AsRef<Path>,
        size: usize,
        max_size: usize,
        start_offset: usize,
    ) -> Result<Self> {
        let path = path.as_ref();
        let (size, max_size) = apply_defaults(size, max_size);
        assert!(
            size <= max_size,
            "initial size {} exceeds max size {}",
            size,
            max_size
        );
        if start_offset > max_size {
            return Err(BufferError::InvalidConfig(format!(
                "start offset {} exceeds max size {}",
                start_offset, max_size
            )));
        }
        let (region, existing) = Region::open_mapped(path, size.max(start_offset), max_size)?;

        let existing = existing as usize;
        let offset = start_offset.max(existing).max(1);
        let capacity = size.max(existing).max(offset);
        debug!(
            path = %path.display(),
            existing,
            offset,
            capacity,
            "reopened mapped buffer"
        );
        Ok(Self::from_region(region, offset, capacity, max_size))
    }

    fn from_region(region: Region, offset: usize, capacity: usize, max_capacity: usize) -> Self {
        Self {
            region,
            offset,
            capacity,
            max_capacity,
        }
    }

    /// The first `n` bytes of the region, regardless of what was written
    pub fn first(&self, n: usize) -> Result<&[u8]> {
        if self.capacity < n {
            return Err(BufferError::Capacity {
                requested: n,
                available: self.capacity,
            });
        }
        Ok(&self.data()[..n])
    }

    pub fn is_empty(&self) -> bool {
        self.offset == 1
    }

    /// Number of bytes written so far, including the reserved first byte
    pub fn len(&self) -> usize {
        self.offset
    }

    /// All written bytes
    pub fn bytes(&self) -> &[u8] {
        &self.data()[1..self.offset]
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn max_capacity(&self) -> usize {
        self.max_capacity
    }

    pub fn kind(&self) -> BufferKind {
        self.region.kind()
    }

    /// Backing file of a mapped buffer
    pub fn path(&self) -> Option<&Path> {
        self.region.path()
    }

    /// The usable region, `[0, capacity)`
    fn data(&self) -> &[u8] {
        &self.region.bytes()[..self.capacity]
    }

    fn data_mut(&mut self) -> &mut [u8] {
        let capacity = self.capacity;
        &mut self.region.bytes_mut()[..capacity]
    }

    /// Ensure there is room for `n` more bytes after the write cursor.
    ///
    /// Nothing happens while the free space exceeds `n`; otherwise capacity
    /// grows by the current capacity plus `n`, capped at 1 GiB per
    /// step unless `n` alone is larger, and never past the maximum size.
    ///
    /// Panics if the buffer can never hold `n` more bytes.
    pub fn grow(&mut self, n: usize) {
        if self.max_capacity - self.offset < n {
            panic!(
                "Buffer max size exceeded: {}. Offset: {}. Grow: {}",
                self.max_capacity, self.offset, n
            );
        }
        if self.capacity - self.offset > n {
            return;
        }

        let grow_by = self.capacity.saturating_add(n).min(MAX_GROW_STEP).max(n);
        let old = self.capacity;
        self.capacity = old.saturating_add(grow_by).min(self.max_capacity);
        if self.capacity == old {
            // Already at max size and exactly `n` bytes free.
            return;
        }

        if let Err(e) = self.region.grow(self.capacity, self.offset) {
            panic!("while growing buffer to size {}: {}", self.capacity, e);
        }
        debug!(kind = %self.kind(), from = old, to = self.capacity, "grew buffer");
    }

    /// Carve `n` bytes off the end of the buffer.
    ///
    /// The slice is only valid until the next mutating call.
    pub fn allocate(&mut self, n: usize) -> &mut [u8] {
        let off = self.allocate_offset(n);
        &mut self.data_mut()[off..off + n]
    }

    /// Like [`Buffer::allocate`], returning the offset of the allocation
    pub fn allocate_offset(&mut self, n: usize) -> usize {
        self.grow(n);
        self.offset += n;
        self.offset - n
    }

    fn write_len(&mut self, len: usize) {
        let prefix = self.allocate(LEN_PREFIX);
        record::put_len(prefix, len);
    }

    /// Write a length prefix for `len` bytes and return the payload slice
    /// for the caller to fill.
    ///
    /// Records should not be mixed with plain [`Buffer::append`] calls in
    /// the same range.
    pub fn record_allocate(&mut self, len: usize) -> &mut [u8] {
        self.record_allocate_offset(len).0
    }

    /// Like [`Buffer::record_allocate`], also returning the record's offset
    pub fn record_allocate_offset(&mut self, len: usize) -> (&mut [u8], usize) {
        self.grow(record::encoded_len(len));
        let start = self.offset;
        self.write_len(len);
        (self.allocate(len), start)
    }

    /// Append `payload` as a record, returning its offset
    pub fn write_record(&mut self, payload: &[u8]) -> usize {
        let (dst, start) = self.record_allocate_offset(payload.len());
        dst.copy_from_slice(payload);
        start
    }

    /// Read the record at `offset`.
    ///
    /// Returns the payload and the offset of the following record, which is
    /// 0 once the chain reaches the write cursor. An offset at or past the
    /// write cursor yields an empty payload and 0.
    pub fn read_record_at(&self, offset: usize) -> (&[u8], usize) {
        if offset == 0 || offset.saturating_add(LEN_PREFIX) > self.offset {
            return (&[], 0);
        }

        let data = self.data();
        let start = offset + LEN_PREFIX;
        let mut next = start + record::get_len(&data[offset..]);
        assert!(
            next <= self.capacity,
            "record at offset {} runs past capacity {}",
            offset,
            self.capacity
        );
        let payload = &data[start..next];
        if next >= self.offset {
            next = 0;
        }
        (payload, next)
    }

    /// Iterate over every record payload in write order
    pub fn records(&self) -> Records<'_> {
        Records::new(self, 1, self.offset)
    }

    /// Iterate over the record payloads in `[start, end)`
    pub fn records_between(&self, start: usize, end: usize) -> Records<'_> {
        Records::new(self, start, end.min(self.offset))
    }

    /// Region from `offset` to the current capacity, including bytes past
    /// the write cursor that were never written or are stale.
    ///
    /// Panics if `offset` is past the current capacity.
    pub(crate) fn raw_from(&self, offset: usize) -> &[u8] {
        assert!(offset <= self.capacity, "offset beyond current size");
        &self.data()[offset..]
    }

    pub(crate) fn raw_from_mut(&mut self, offset: usize) -> &mut [u8] {
        assert!(offset <= self.capacity, "offset beyond current size");
        &mut self.data_mut()[offset..]
    }

    /// Append raw bytes, returning how many were written
    pub fn append(&mut self, p: &[u8]) -> usize {
        self.allocate(p.len()).copy_from_slice(p);
        p.len()
    }

    /// Overwrite bytes at `offset` without moving the write cursor.
    ///
    /// Does not grow the buffer; the span must already lie within capacity.
    pub fn write_at(&mut self, p: &[u8], offset: usize) -> Result<usize> {
        self.check_bounds("write", p.len(), offset)?;
        self.data_mut()[offset..offset + p.len()].copy_from_slice(p);
        Ok(p.len())
    }

    /// Like [`Buffer::write_at`], preceded by a length prefix
    pub fn write_record_at(&mut self, p: &[u8], offset: usize) -> Result<usize> {
        self.check_bounds("write record of", record::encoded_len(p.len()), offset)?;
        let dst = &mut self.data_mut()[offset..];
        record::put_len(dst, p.len());
        dst[LEN_PREFIX..LEN_PREFIX + p.len()].copy_from_slice(p);
        Ok(p.len())
    }

    /// Read `n` bytes at `offset`
    pub fn read_at(&self, n: usize, offset: usize) -> Result<&[u8]> {
        self.check_bounds("read", n, offset)?;
        Ok(&self.data()[offset..offset + n])
    }

    fn check_bounds(&self, op: &'static str, len: usize, offset: usize) -> Result<()> {
        match offset.checked_add(len) {
            Some(end) if end <= self.capacity => Ok(()),
            _ => Err(BufferError::OutOfBounds {
                op,
                len,
                offset,
                capacity: self.capacity,
            }),
        }
    }

    /// Discard the contents, keeping the allocation
    pub fn reset(&mut self) {
        self.offset = 1;
    }

    /// Flush a mapped buffer's dirty pages to its file. No-op on the heap.
    pub fn flush(&self) -> Result<()> {
        self.region.flush()
    }

    /// Free the backing region. A mapped buffer's file is unmapped,
    /// truncated to zero and deleted.
    pub fn release(mut self) -> Result<()> {
        std::mem::take(&mut self.region).release()
    }

    /// Unmap a mapped buffer, keeping its written bytes on disk so it can be
    /// reopened with [`Buffer::open_mmap`]. A heap buffer is simply freed.
    pub fn persist(mut self) -> Result<()> {
        let len = self.offset;
        std::mem::take(&mut self.region).persist(len)
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("kind", &self.kind())
            .field("path", &self.path())
            .field("len", &self.offset)
            .field("capacity", &self.capacity)
            .field("max_capacity", &self.max_capacity)
            .finish()
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        if let Err(e) = std::mem::take(&mut self.region).release() {
            warn!(error = %e, "failed to release buffer on drop");
        }
    }
}

impl io::Write for Buffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.append(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        Buffer::flush(self).map_err(io::Error::other)
    }
}

fn apply_defaults(size: usize, max_size: usize) -> (usize, usize) {
    let size = if size == 0 { DEFAULT_INITIAL_SIZE } else { size };
    let max_size = if max_size == 0 { DEFAULT_MAX_SIZE } else { max_size };
    (size, max_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_buffer_reserves_first_byte() {
        let buf = Buffer::new(0);
        assert!(buf.is_empty());
        assert_eq!(buf.len(), 1);
        assert_eq!(buf.capacity(), DEFAULT_INITIAL_SIZE);
        assert_eq!(buf.first(1).unwrap(), &[0]);
        assert!(buf.bytes().is_empty());
    }

    #[test]
    fn test_defaults_applied() {
        let buf = Buffer::with_kind(0, 0, BufferKind::Heap).unwrap();
        assert_eq!(buf.capacity(), DEFAULT_INITIAL_SIZE);
        assert_eq!(buf.max_capacity(), DEFAULT_MAX_SIZE);
        buf.release().unwrap();
    }

    #[test]
    #[should_panic(expected = "exceeds max size")]
    fn test_initial_larger_than_max_panics() {
        let _ = Buffer::with_kind(128, 64, BufferKind::Heap);
    }

    #[test]
    fn test_allocate_advances_cursor() {
        let mut buf = Buffer::new(8);
        buf.allocate(3).copy_from_slice(b"abc");
        assert_eq!(buf.len(), 4);
        assert_eq!(buf.allocate_offset(2), 4);
        assert_eq!(buf.len(), 6);
        assert_eq!(&buf.bytes()[..3], b"abc");
    }

    #[test]
    fn test_grow_is_noop_when_room_remains() {
        let mut buf = Buffer::new(64);
        buf.grow(10);
        assert_eq!(buf.capacity(), 64);
    }

    #[test]
    fn test_grow_when_free_space_equals_request() {
        let mut buf = Buffer::new(16);
        buf.allocate(5);
        // cursor 6, exactly 10 bytes free
        buf.grow(10);
        // 16 + (16 + 10)
        assert_eq!(buf.capacity(), 42);
        assert_eq!(buf.len(), 6);
    }

    #[test]
    fn test_grow_at_max_with_exact_room_keeps_capacity() {
        let mut buf = Buffer::with_kind(16, 16, BufferKind::Heap).unwrap();
        buf.append(b"abcde");
        buf.grow(10);
        assert_eq!(buf.capacity(), 16);
        assert_eq!(buf.bytes(), b"abcde");
        buf.release().unwrap();
    }

    #[test]
    fn test_grow_doubles_plus_request() {
        let mut buf = Buffer::new(16);
        buf.allocate(10);
        buf.grow(20);
        // 16 + (16 + 20)
        assert_eq!(buf.capacity(), 52);
    }

    #[test]
    fn test_grow_clamped_to_max() {
        let mut buf = Buffer::with_kind(16, 40, BufferKind::Heap).unwrap();
        buf.allocate(10);
        buf.grow(20);
        assert_eq!(buf.capacity(), 40);
        buf.release().unwrap();
    }

    #[test]
    #[should_panic(expected = "Buffer max size exceeded")]
    fn test_grow_past_max_panics() {
        let mut buf = Buffer::with_kind(16, 32, BufferKind::Heap).unwrap();
        buf.grow(32);
    }

    #[test]
    fn test_record_allocate_writes_prefix() {
        let mut buf = Buffer::new(8);
        let (payload, off) = buf.record_allocate_offset(3);
        payload.copy_from_slice(b"xyz");
        assert_eq!(off, 1);
        assert_eq!(buf.bytes(), &[0, 0, 0, 3, b'x', b'y', b'z']);
    }

    #[test]
    fn test_read_record_chain_terminates() {
        let mut buf = Buffer::new(8);
        let a = buf.write_record(b"a");
        let b = buf.write_record(b"bb");

        let (p, next) = buf.read_record_at(a);
        assert_eq!(p, b"a");
        assert_eq!(next, b);
        let (p, next) = buf.read_record_at(b);
        assert_eq!(p, b"bb");
        assert_eq!(next, 0);
    }

    #[test]
    fn test_read_record_past_cursor_is_sentinel() {
        let mut buf = Buffer::new(64);
        buf.write_record(b"a");
        let (p, next) = buf.read_record_at(buf.len());
        assert!(p.is_empty());
        assert_eq!(next, 0);
        let (p, next) = buf.read_record_at(1000);
        assert!(p.is_empty());
        assert_eq!(next, 0);
    }

    #[test]
    fn test_write_at_out_of_bounds() {
        let mut buf = Buffer::new(16);
        assert!(buf.write_at(b"abcd", 12).is_ok());
        let err = buf.write_at(b"abcde", 12).unwrap_err();
        assert!(matches!(err, BufferError::OutOfBounds { offset: 12, len: 5, .. }));
        assert!(buf.read_at(5, 12).is_err());
        assert!(buf.write_record_at(b"a", 12).is_err());
        assert!(buf.read_at(4, usize::MAX).is_err());
    }

    #[test]
    fn test_write_record_at_then_read() {
        let mut buf = Buffer::new(32);
        let off = buf.allocate_offset(4 + 5);
        buf.write_record_at(b"hello", off).unwrap();
        assert_eq!(buf.read_record_at(off), (&b"hello"[..], 0));
    }

    #[test]
    fn test_first_capacity_error() {
        let buf = Buffer::new(16);
        assert!(matches!(
            buf.first(17),
            Err(BufferError::Capacity { requested: 17, available: 16 })
        ));
    }

    #[test]
    fn test_raw_from_spans_to_capacity() {
        let mut buf = Buffer::new(16);
        buf.append(b"ab");
        assert_eq!(buf.raw_from(1).len(), 15);
        assert!(buf.raw_from(16).is_empty());
    }

    #[test]
    #[should_panic(expected = "offset beyond current size")]
    fn test_raw_from_past_capacity_panics() {
        let buf = Buffer::new(16);
        buf.raw_from(17);
    }

    #[test]
    fn test_reset_keeps_capacity() {
        let mut buf = Buffer::new(8);
        buf.append(&[7u8; 100]);
        let cap = buf.capacity();
        buf.reset();
        assert!(buf.is_empty());
        assert_eq!(buf.capacity(), cap);
        assert_eq!(buf.first(1).unwrap(), &[0]);
    }

    #[test]
    fn test_io_write() {
        use std::io::Write;

        let mut buf = Buffer::new(4);
        write!(buf, "hello {}", 42).unwrap();
        assert_eq!(buf.bytes(), b"hello 42");
    }
}
