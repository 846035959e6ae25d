//! In-place sorting of the records held in a [`Buffer`].
//!
//! Records are sorted without decoding them into owned values:
//!
//! 1. Walk the record chain and note the offset of every `chunk_size`-th
//!    record. These offsets split the range into chunks.
//! 2. Sort each chunk by ordering its record offsets, then rewrite the chunk
//!    through a scratch buffer.
//! 3. Merge neighbouring chunks pairwise, bottom up over a balanced tree of
//!    chunk indices. The left half of every merge is staged in the scratch
//!    buffer so the destination never overwrites unread input.
//!
//! The sort is stable: records comparing equal keep their relative order.

use std::cmp::Ordering;

use tracing::{debug, warn};

use crate::buffer::Buffer;
use crate::record::{self, LEN_PREFIX};

/// Records per chunk in the chunk-sort phase
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Tuning for [`Buffer::sort_between_with`]
#[derive(Clone, Copy, Debug)]
pub struct SortOptions {
    /// Number of consecutive records sorted together before merging
    pub chunk_size: usize,
}

impl Default for SortOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl SortOptions {
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }
}

impl Buffer {
    /// Sort every record in the buffer
    pub fn sort<F>(&mut self, cmp: F)
    where
        F: FnMut(&[u8], &[u8]) -> Ordering,
    {
        let end = self.len();
        self.sort_between(1, end, cmp);
    }

    /// Sort the records in `[start, end)` by comparing their payloads
    pub fn sort_between<F>(&mut self, start: usize, end: usize, cmp: F)
    where
        F: FnMut(&[u8], &[u8]) -> Ordering,
    {
        self.sort_between_with(start, end, &SortOptions::default(), cmp);
    }

    /// Sort the records in `[start, end)` with explicit options.
    ///
    /// `start` must be the offset of a record and `end` the offset just past
    /// one; `end` is clamped to the write cursor.
    ///
    /// Panics if `start` is 0 or `options.chunk_size` is 0.
    pub fn sort_between_with<F>(&mut self, start: usize, end: usize, options: &SortOptions, cmp: F)
    where
        F: FnMut(&[u8], &[u8]) -> Ordering,
    {
        let end = end.min(self.len());
        if start >= end {
            return;
        }
        if start == 0 {
            panic!("start can never be zero");
        }
        assert!(options.chunk_size > 0, "chunk size must be positive");

        let offsets = self.chunk_offsets(start, end, options.chunk_size);
        let scratch_size = ((end - start) / 2) as f64 * 1.1;
        debug!(
            start,
            end,
            chunks = offsets.len() - 1,
            scratch = scratch_size as usize,
            "sorting buffer records"
        );

        let mut sorter = Sorter {
            buf: self,
            tmp: Buffer::new(scratch_size as usize),
            cmp,
            small: Vec::with_capacity(options.chunk_size),
        };

        for pair in offsets.windows(2) {
            sorter.sort_chunk(pair[0], pair[1]);
        }
        sorter.sort(&offsets, 0, offsets.len() - 1);

        if let Err(e) = sorter.tmp.release() {
            warn!(error = %e, "failed to release sort scratch buffer");
        }
    }

    /// Offsets of every `chunk_size`-th record in `[start, end)`, followed by `end`
    fn chunk_offsets(&self, start: usize, end: usize, chunk_size: usize) -> Vec<usize> {
        let mut offsets = Vec::new();
        let (mut next, mut count) = (start, 0usize);
        while next != 0 && next < end {
            if count % chunk_size == 0 {
                offsets.push(next);
            }
            next = self.read_record_at(next).1;
            count += 1;
        }
        assert!(!offsets.is_empty(), "no records between {} and {}", start, end);
        if offsets.last() != Some(&end) {
            offsets.push(end);
        }
        offsets
    }
}

struct Sorter<'a, F> {
    buf: &'a mut Buffer,
    tmp: Buffer,
    cmp: F,
    small: Vec<usize>,
}

impl<F> Sorter<'_, F>
where
    F: FnMut(&[u8], &[u8]) -> Ordering,
{
    /// Sort the records in `[start, end)` by moving their offsets around,
    /// then copy them back in order.
    fn sort_chunk(&mut self, start: usize, end: usize) {
        let Sorter {
            buf,
            tmp,
            cmp,
            small,
        } = self;

        tmp.reset();
        small.clear();
        let mut next = start;
        while next != 0 && next < end {
            small.push(next);
            next = buf.read_record_at(next).1;
        }

        small.sort_by(|&a, &b| cmp(buf.read_record_at(a).0, buf.read_record_at(b).0));

        for &off in small.iter() {
            tmp.append(record::raw_record(buf.raw_from(off)));
        }
        let sorted = tmp.bytes();
        assert_eq!(sorted.len(), end - start, "chunk changed size while sorting");
        buf.raw_from_mut(start)[..sorted.len()].copy_from_slice(sorted);
    }

    /// Sort chunks `lo..hi`, where chunk `i` spans `[offsets[i], offsets[i + 1])`
    fn sort(&mut self, offsets: &[usize], lo: usize, hi: usize) {
        assert!(lo <= hi);
        let mid = lo + (hi - lo) / 2;
        if lo == mid {
            return;
        }

        // Each index is a chunk boundary, so the halves share `mid`.
        self.sort(offsets, lo, mid);
        self.sort(offsets, mid, hi);
        self.merge(offsets[lo], offsets[mid], offsets[hi]);
    }

    /// Merge the sorted runs `[lo, mid)` and `[mid, hi)` into `[lo, hi)`
    fn merge(&mut self, lo: usize, mid: usize, hi: usize) {
        if lo == mid || mid == hi {
            return;
        }
        let Sorter { buf, tmp, cmp, .. } = self;

        tmp.reset();
        tmp.append(&buf.raw_from(lo)[..mid - lo]);
        let left = tmp.bytes();
        let data = &mut buf.raw_from_mut(0)[..hi];

        let (mut l, mut r, mut dst) = (0, mid, lo);
        while dst < hi {
            if l == left.len() {
                // The rest of the right run is already in place.
                assert_eq!(dst, r);
                return;
            }
            if r == hi {
                let rest = &left[l..];
                assert_eq!(rest.len(), hi - dst, "left run does not fill the merge range");
                data[dst..hi].copy_from_slice(rest);
                return;
            }

            let ls = record::raw_record(&left[l..]);
            let rlen = record::raw_record(&data[r..]).len();

            // Ties go to the left run.
            if cmp(&data[r + LEN_PREFIX..r + rlen], &ls[LEN_PREFIX..]) == Ordering::Less {
                data.copy_within(r..r + rlen, dst);
                r += rlen;
                dst += rlen;
            } else {
                data[dst..dst + ls.len()].copy_from_slice(ls);
                l += ls.len();
                dst += ls.len();
            }
        }
    }
}
