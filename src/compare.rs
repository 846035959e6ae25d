use std::cmp::Ordering;

use crate::config::Config;

/// Compare two record payloads the way `sort` does in the C locale
///
/// 1. Compare with -n / -f applied
/// 2. If equal and last-resort is enabled, compare bytewise
/// 3. -r reverses both steps
pub fn compare_records(a: &[u8], b: &[u8], config: &Config) -> Ordering {
    let primary = compare_with_options(a, b, config);
    if primary != Ordering::Equal {
        return maybe_reverse(primary, config.reverse);
    }

    if config.use_last_resort() {
        return maybe_reverse(a.cmp(b), config.reverse);
    }

    Ordering::Equal
}

fn compare_with_options(a: &[u8], b: &[u8], config: &Config) -> Ordering {
    if config.numeric {
        compare_numeric(a, b)
    } else if config.fold_case {
        compare_fold_case(a, b)
    } else {
        a.cmp(b)
    }
}

/// Numeric comparison on the leading number of each record.
///
/// Records without a leading number compare as 0. No exponent support.
pub fn compare_numeric(a: &[u8], b: &[u8]) -> Ordering {
    // -0 == +0; NaN cannot be produced by the parser
    leading_number(a)
        .partial_cmp(&leading_number(b))
        .unwrap_or(Ordering::Equal)
}

/// Parse the leading `[blanks][sign]digits[.digits]` of a byte string
fn leading_number(s: &[u8]) -> f64 {
    let s = match s.iter().position(|&c| c != b' ' && c != b'\t') {
        Some(i) => &s[i..],
        None => return 0.0,
    };

    let mut end = usize::from(matches!(s.first(), Some(b'-' | b'+')));
    let mut seen_dot = false;
    while let Some(&c) = s.get(end) {
        match c {
            b'0'..=b'9' => end += 1,
            b'.' if !seen_dot => {
                seen_dot = true;
                end += 1;
            }
            _ => break,
        }
    }

    std::str::from_utf8(&s[..end])
        .ok()
        .and_then(|n| n.parse().ok())
        .unwrap_or(0.0)
}

/// ASCII case-insensitive comparison (a-z folded to A-Z)
fn compare_fold_case(a: &[u8], b: &[u8]) -> Ordering {
    a.iter()
        .map(u8::to_ascii_uppercase)
        .cmp(b.iter().map(u8::to_ascii_uppercase))
}

#[inline]
fn maybe_reverse(ord: Ordering, reverse: bool) -> Ordering {
    if reverse { ord.reverse() } else { ord }
}
