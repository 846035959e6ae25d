//! Length-prefixed record layout.
//!
//! Every record is a 4-byte big-endian payload length followed by the
//! payload. Records are packed back to back, so the offset of the next
//! record is `offset + 4 + len`. Offset 0 is never a record start and is
//! used as the "no more records" sentinel.

use crate::buffer::Buffer;

/// Size of the length prefix in front of every record
pub const LEN_PREFIX: usize = 4;

/// Total encoded size of a record with a payload of `payload_len` bytes
#[inline]
pub fn encoded_len(payload_len: usize) -> usize {
    LEN_PREFIX + payload_len
}

/// Write the length prefix for a payload of `len` bytes into `dst[..4]`
///
/// Panics if `len` does not fit in a `u32`.
#[inline]
pub fn put_len(dst: &mut [u8], len: usize) {
    let len = u32::try_from(len)
        .unwrap_or_else(|_| panic!("record payload of {} bytes exceeds u32 length prefix", len));
    dst[..LEN_PREFIX].copy_from_slice(&len.to_be_bytes());
}

/// Read the length prefix at the start of `src`
#[inline]
pub fn get_len(src: &[u8]) -> usize {
    let mut prefix = [0u8; LEN_PREFIX];
    prefix.copy_from_slice(&src[..LEN_PREFIX]);
    u32::from_be_bytes(prefix) as usize
}

/// The full encoded record (prefix and payload) at the start of `buf`
#[inline]
pub fn raw_record(buf: &[u8]) -> &[u8] {
    &buf[..encoded_len(get_len(buf))]
}

/// The payload of the encoded record at the start of `buf`
#[inline]
pub fn payload(buf: &[u8]) -> &[u8] {
    &raw_record(buf)[LEN_PREFIX..]
}

/// Iterator over record payloads, following the offset chain of a buffer
pub struct Records<'a> {
    buffer: &'a Buffer,
    next: usize,
    end: usize,
}

impl<'a> Records<'a> {
    pub(crate) fn new(buffer: &'a Buffer, start: usize, end: usize) -> Self {
        Self {
            buffer,
            next: start,
            end,
        }
    }

    /// Offset of the record the next call to `next` will yield, or 0
    pub fn offset(&self) -> usize {
        self.next
    }
}

impl<'a> Iterator for Records<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        if self.next == 0 || self.next >= self.end {
            return None;
        }
        let (payload, next) = self.buffer.read_record_at(self.next);
        self.next = next;
        Some(payload)
    }
}
