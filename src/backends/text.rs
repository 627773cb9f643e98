//! Plain text backend: one line per record, values separated by spaces

use crate::buffer::Entry;
use crate::codec;
use crate::config::RecorderConfig;
use crate::error::Result;
use crate::types::{CellValue, Record};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

/// Text line for one record
pub(crate) fn record_line(record: Record) -> String {
    record
        .into_values()
        .iter()
        .map(CellValue::as_string)
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn flush<I>(config: &RecorderConfig, path: &Path, entries: I) -> Result<()>
where
    I: IntoIterator<Item = Entry>,
{
    let mut out = String::new();
    for entry in entries {
        for record in super::entry_records(entry) {
            out.push_str(&record_line(record));
            out.push('\n');
        }
    }
    if out.is_empty() {
        return Ok(());
    }

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(&codec::encode(config.encoding, &out))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_line() {
        let record = Record::Row(vec!["a".into(), CellValue::Int(2), CellValue::Empty]);
        assert_eq!(record_line(record), "a 2 ");
        assert_eq!(record_line(Record::map([("k", "v")])), "v");
    }
}
