use std::cmp::Ordering;
use std::fs::File;
use std::io::{self, BufWriter, Write};

use crate::buffer::Buffer;
use crate::compare::compare_records;
use crate::config::Config;

/// Write every record in `buf`, each followed by the record delimiter.
///
/// With `-u`, only the first record of each run comparing equal is written.
pub fn write_records<W: Write>(writer: W, buf: &Buffer, config: &Config) -> io::Result<()> {
    let mut writer = BufWriter::new(writer);
    let delimiter = [config.record_delimiter];
    let mut prev: Option<&[u8]> = None;

    for record in buf.records() {
        if config.unique {
            let dup = prev.is_some_and(|p| compare_records(p, record, config) == Ordering::Equal);
            if dup {
                continue;
            }
            prev = Some(record);
        }
        writer.write_all(record)?;
        writer.write_all(&delimiter)?;
    }

    writer.flush()
}

/// Open output file or return stdout
pub fn open_output(config: &Config) -> io::Result<Box<dyn Write>> {
    match &config.output_file {
        Some(path) => Ok(Box::new(File::create(path)?)),
        None => Ok(Box::new(io::stdout())),
    }
}
