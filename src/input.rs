use std::io::{self, BufRead};

use bstr::io::BufReadExt;

use crate::buffer::Buffer;
use crate::error::Result;
use crate::record;

/// Split `reader` on `delimiter` and append every record to `buf`.
///
/// The delimiter is stripped. Returns the number of records read. Fails
/// instead of panicking when a record would push the buffer past its
/// maximum size.
pub fn read_records<R: BufRead>(mut reader: R, delimiter: u8, buf: &mut Buffer) -> Result<usize> {
    let mut count = 0;
    reader.for_byte_record(delimiter, |rec| {
        let needed = record::encoded_len(rec.len());
        if buf.max_capacity() - buf.len() < needed {
            return Err(io::Error::new(
                io::ErrorKind::OutOfMemory,
                format!(
                    "record of {} bytes does not fit: buffer max size is {}",
                    rec.len(),
                    buf.max_capacity()
                ),
            ));
        }
        buf.write_record(rec);
        count += 1;
        Ok(true)
    })?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::BufferKind;
    use std::io::Cursor;

    fn read(input: &[u8], delimiter: u8) -> Vec<Vec<u8>> {
        let mut buf = Buffer::new(8);
        read_records(Cursor::new(input), delimiter, &mut buf).unwrap();
        buf.records().map(|r| r.to_vec()).collect()
    }

    #[test]
    fn test_read_records_newline() {
        assert_eq!(read(b"a\nb\nc\n", b'\n'), vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn test_read_records_no_trailing_newline() {
        assert_eq!(read(b"a\nb\nc", b'\n'), vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn test_read_records_nul_delimiter() {
        assert_eq!(read(b"a\0b\0c\0", 0u8), vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn test_empty_records() {
        assert_eq!(
            read(b"\n\na\n\n", b'\n'),
            vec![b"".to_vec(), b"".to_vec(), b"a".to_vec(), b"".to_vec()]
        );
    }

    #[test]
    fn test_record_past_max_size_is_error() {
        let mut buf = Buffer::with_kind(16, 32, BufferKind::Heap).unwrap();
        let input = vec![b'x'; 40];
        assert!(read_records(Cursor::new(input), b'\n', &mut buf).is_err());
        assert!(buf.is_empty());
        buf.release().unwrap();
    }
}
