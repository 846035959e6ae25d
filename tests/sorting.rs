//! In-place record sorting: scenarios and properties

use std::cmp::Ordering;

use proptest::prelude::*;
use recbuf::{Buffer, BufferKind, SortOptions};

fn fill(buf: &mut Buffer, records: &[Vec<u8>]) {
    for r in records {
        buf.write_record(r);
    }
}

fn payloads(buf: &Buffer) -> Vec<Vec<u8>> {
    buf.records().map(|p| p.to_vec()).collect()
}

fn is_sorted_by<F: Fn(&[u8], &[u8]) -> Ordering>(records: &[Vec<u8>], cmp: F) -> bool {
    records
        .windows(2)
        .all(|w| cmp(&w[0], &w[1]) != Ordering::Greater)
}

/// Small deterministic generator so scenario tests need no extra crate
fn xorshift(seed: &mut u64) -> u64 {
    *seed ^= *seed << 13;
    *seed ^= *seed >> 7;
    *seed ^= *seed << 17;
    *seed
}

// ============================================================
// Scenarios
// ============================================================

#[test]
fn test_fruit_example() {
    let mut buf = Buffer::new(0);
    fill(&mut buf, &[b"banana".to_vec(), b"apple".to_vec(), b"cherry".to_vec()]);
    buf.sort(|a, b| a.cmp(b));
    assert_eq!(
        payloads(&buf),
        vec![b"apple".to_vec(), b"banana".to_vec(), b"cherry".to_vec()]
    );
}

#[test]
fn test_five_thousand_single_bytes() {
    let mut seed = 0x9e37_79b9_7f4a_7c15;
    let records: Vec<Vec<u8>> = (0..5000)
        .map(|_| vec![xorshift(&mut seed) as u8])
        .collect();

    let mut buf = Buffer::new(0);
    fill(&mut buf, &records);
    let len = buf.len();
    buf.sort(|a, b| a.cmp(b));

    let sorted = payloads(&buf);
    assert_eq!(sorted.len(), 5000);
    assert!(is_sorted_by(&sorted, |a, b| a.cmp(b)));
    assert_eq!(buf.len(), len);

    let mut want = records;
    want.sort();
    assert_eq!(sorted, want);
}

#[test]
fn test_sort_in_mapped_buffer() {
    let mut seed = 42;
    let records: Vec<Vec<u8>> = (0..3000)
        .map(|_| {
            let n = xorshift(&mut seed);
            format!("{:x}", n % 100_000).into_bytes()
        })
        .collect();

    let mut buf = Buffer::with_kind(64, 1 << 22, BufferKind::Mmap).unwrap();
    fill(&mut buf, &records);
    buf.sort(|a, b| a.cmp(b));

    let mut want = records;
    want.sort();
    assert_eq!(payloads(&buf), want);
    buf.release().unwrap();
}

#[test]
fn test_sort_is_idempotent() {
    let mut seed = 7;
    let records: Vec<Vec<u8>> = (0..2500)
        .map(|_| xorshift(&mut seed).to_le_bytes()[..3].to_vec())
        .collect();

    let mut buf = Buffer::new(0);
    fill(&mut buf, &records);
    buf.sort(|a, b| a.cmp(b));
    let once = buf.bytes().to_vec();
    buf.sort(|a, b| a.cmp(b));
    assert_eq!(buf.bytes(), &once[..]);
}

#[test]
fn test_sort_by_length_then_bytes() {
    let records: Vec<Vec<u8>> = ["ccc", "a", "bb", "aaa", "", "b"]
        .iter()
        .map(|s| s.as_bytes().to_vec())
        .collect();
    let cmp = |a: &[u8], b: &[u8]| a.len().cmp(&b.len()).then_with(|| a.cmp(b));

    let mut buf = Buffer::new(0);
    fill(&mut buf, &records);
    buf.sort(cmp);
    assert_eq!(
        payloads(&buf),
        ["", "a", "b", "bb", "aaa", "ccc"]
            .iter()
            .map(|s| s.as_bytes().to_vec())
            .collect::<Vec<_>>()
    );
}

// ============================================================
// Properties
// ============================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Sorting yields a non-decreasing permutation of the input and keeps
    /// the byte length of the range
    #[test]
    fn prop_sort_is_ordered_permutation(
        records in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..24), 0..400),
        chunk_size in 1usize..40,
    ) {
        let mut buf = Buffer::new(0);
        fill(&mut buf, &records);
        let len = buf.len();

        let opts = SortOptions::default().with_chunk_size(chunk_size);
        buf.sort_between_with(1, len, &opts, |a, b| a.cmp(b));

        let sorted = payloads(&buf);
        prop_assert_eq!(buf.len(), len);
        prop_assert!(is_sorted_by(&sorted, |a, b| a.cmp(b)));

        let mut want = records.clone();
        want.sort();
        let mut got = sorted.clone();
        got.sort();
        prop_assert_eq!(got, want);
    }

    /// Equal keys keep their input order
    #[test]
    fn prop_sort_is_stable(
        keys in prop::collection::vec(0u8..4, 0..300),
        chunk_size in 1usize..20,
    ) {
        let records: Vec<Vec<u8>> = keys
            .iter()
            .enumerate()
            .map(|(i, &k)| {
                let mut r = vec![k];
                r.extend_from_slice(&(i as u32).to_be_bytes());
                r
            })
            .collect();

        let mut buf = Buffer::new(0);
        fill(&mut buf, &records);
        let opts = SortOptions::default().with_chunk_size(chunk_size);
        let end = buf.len();
        buf.sort_between_with(1, end, &opts, |a, b| a[0].cmp(&b[0]));

        let mut want = records.clone();
        want.sort_by_key(|r| r[0]);
        prop_assert_eq!(payloads(&buf), want);
    }

    /// A second sort under the same comparator changes nothing
    #[test]
    fn prop_sort_idempotent(
        records in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..8), 0..200),
        chunk_size in 1usize..16,
    ) {
        let mut buf = Buffer::new(0);
        fill(&mut buf, &records);
        let opts = SortOptions::default().with_chunk_size(chunk_size);
        let end = buf.len();
        buf.sort_between_with(1, end, &opts, |a, b| b.cmp(a));
        let once = buf.bytes().to_vec();
        buf.sort_between_with(1, end, &opts, |a, b| b.cmp(a));
        prop_assert_eq!(buf.bytes(), &once[..]);
    }
}
