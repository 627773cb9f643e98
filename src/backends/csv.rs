//! Delimited text backend
//!
//! Fast mode appends lines to the end of the file. Slow mode, and any flush
//! that has to replace an existing header line, reads every record, edits
//! them in memory and rewrites the file.

use super::FlushContext;
use crate::buffer::{Entry, Mode};
use crate::codec;
use crate::config::RecorderConfig;
use crate::error::{RecorderError, Result};
use crate::header::Header;
use crate::types::CellValue;
use csv::{QuoteStyle, ReaderBuilder, StringRecord, Terminator, WriterBuilder};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

type Cells = Vec<(u32, CellValue)>;

/// Split text into physical records, keeping blank lines
///
/// Line breaks inside quoted fields do not end a record.
pub(crate) fn split_records(text: &str, quote: u8) -> Vec<&str> {
    let quote = quote as char;
    let mut records = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;

    for (i, ch) in text.char_indices() {
        if ch == quote {
            in_quotes = !in_quotes;
        } else if ch == '\n' && !in_quotes {
            records.push(text[start..i].trim_end_matches('\r'));
            start = i + 1;
        }
    }
    if start < text.len() {
        records.push(text[start..].trim_end_matches('\r'));
    }
    records
}

/// Fields of one physical record
pub(crate) fn parse_record(line: &str, config: &RecorderConfig) -> Result<Vec<String>> {
    if line.is_empty() {
        return Ok(Vec::new());
    }
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(config.delimiter)
        .quote(config.quote)
        .from_reader(line.as_bytes());
    let mut record = StringRecord::new();
    if reader.read_record(&mut record)? {
        Ok(record.iter().map(str::to_string).collect())
    } else {
        Ok(Vec::new())
    }
}

/// Serialize one row without its line terminator
pub(crate) fn format_row(fields: &[String], config: &RecorderConfig) -> Result<String> {
    if fields.is_empty() {
        return Ok(String::new());
    }
    let mut writer = WriterBuilder::new()
        .delimiter(config.delimiter)
        .quote(config.quote)
        .quote_style(QuoteStyle::Necessary)
        .terminator(Terminator::Any(b'\n'))
        .flexible(true)
        .from_writer(Vec::new());
    writer.write_record(fields)?;
    let bytes = writer
        .into_inner()
        .map_err(|e| RecorderError::Csv(e.to_string()))?;
    let line = String::from_utf8(bytes).map_err(|e| RecorderError::Csv(e.to_string()))?;
    Ok(line.trim_end_matches('\n').to_string())
}

/// Every record of the file, parsed
pub(crate) fn load_rows(path: &Path, config: &RecorderConfig) -> Result<Vec<Vec<String>>> {
    let text = codec::read_to_string(path, config.encoding)?;
    split_records(&text, config.quote)
        .into_iter()
        .map(|line| parse_record(line, config))
        .collect()
}

/// Header stored at the configured header row
pub(crate) fn read_header(rows: &[Vec<String>], header_row: u32) -> Header {
    if header_row == 0 {
        return Header::positional();
    }
    match rows.get(header_row as usize - 1) {
        Some(names) => Header::from_existing(names.iter().map(|n| Some(n.as_str()))),
        None => Header::new(),
    }
}

/// Lay `cells` onto a row, growing it as needed
fn apply_cells(row: &mut Vec<String>, cells: Cells) {
    for (col, value) in cells {
        let idx = col as usize - 1;
        if row.len() <= idx {
            row.resize(idx + 1, String::new());
        }
        row[idx] = value.as_string();
    }
}

pub fn flush(
    ctx: &mut FlushContext<'_>,
    path: &Path,
    target: Option<&str>,
    entries: Vec<Entry>,
) -> Result<()> {
    let config = ctx.config;
    let text = codec::read_to_string(path, config.encoding)?;
    let records = split_records(&text, config.quote);
    let extent = records.len() as u32;

    let mut rows: Option<Vec<Vec<String>>> = None;
    if ctx.mode == Mode::Slow {
        rows = Some(
            records
                .iter()
                .map(|line| parse_record(line, config))
                .collect::<Result<_>>()?,
        );
    }

    let target_name = ctx.target_name(target).to_string();
    let header_row = config.header_row;
    let header = ctx.headers.get_or_load(target, || {
        if header_row == 0 {
            return Ok(Header::positional());
        }
        match records.get(header_row as usize - 1) {
            Some(line) => Ok(read_header(&[parse_record(line, config)?], 1)),
            None => Ok(Header::new()),
        }
    })?;
    header.sync_extent(extent, header_row);

    let max_col = rows
        .as_ref()
        .and_then(|r| r.iter().map(Vec::len).max())
        .unwrap_or(0)
        .max(header.len()) as u32;

    let mut writes: Vec<(Option<i64>, Vec<Cells>)> = Vec::with_capacity(entries.len());
    for entry in entries {
        let coord = match &entry {
            Entry::Data { coord, .. } | Entry::Block { coord, .. } => *coord,
            other => {
                log::trace!("csv ignores {:?}", other);
                continue;
            }
        };
        let start_col = coord.resolve_col(max_col)?;
        let mut block = Vec::with_capacity(entry.height());
        for record in super::entry_records(entry) {
            block.push(header.place(&record, start_col, config.auto_new_header, &target_name)?);
        }
        writes.push((coord.row, block));
    }

    let rewrite_header = header.needs_rewrite();
    if rows.is_none() && rewrite_header && header_row <= extent {
        log::debug!("rewriting header line of {}", path.display());
        rows = Some(
            records
                .iter()
                .map(|line| parse_record(line, config))
                .collect::<Result<_>>()?,
        );
    }

    let first_data_row = if header.is_empty() {
        1
    } else {
        header_row + 1
    };
    let mut placement = ctx.mode.placement(extent, first_data_row);

    match rows {
        Some(mut rows) => {
            for (row, block) in writes {
                let start = placement.place(row, block.len())?;
                for (i, cells) in block.into_iter().enumerate() {
                    let idx = start as usize - 1 + i;
                    if rows.len() <= idx {
                        rows.resize(idx + 1, Vec::new());
                    }
                    apply_cells(&mut rows[idx], cells);
                }
            }
            if rewrite_header {
                let idx = header_row as usize - 1;
                if rows.len() <= idx {
                    rows.resize(idx + 1, Vec::new());
                }
                rows[idx] = header.to_values().iter().map(CellValue::as_string).collect();
            }

            let mut out = String::new();
            for row in &rows {
                out.push_str(&format_row(row, config)?);
                out.push('\n');
            }
            fs::write(path, codec::encode(config.encoding, &out))?;
        }
        None => {
            let mut out = String::new();
            if !text.is_empty() && !text.ends_with('\n') {
                out.push('\n');
            }
            let mut last = extent;
            if rewrite_header {
                while last + 1 < header_row {
                    out.push('\n');
                    last += 1;
                }
                let names: Vec<String> =
                    header.to_values().iter().map(CellValue::as_string).collect();
                out.push_str(&format_row(&names, config)?);
                out.push('\n');
                last = header_row;
            }
            for (row, block) in writes {
                let start = placement.place(row, block.len())?;
                while last + 1 < start {
                    out.push('\n');
                    last += 1;
                }
                for cells in block {
                    let mut fields = Vec::new();
                    apply_cells(&mut fields, cells);
                    out.push_str(&format_row(&fields, config)?);
                    out.push('\n');
                    last += 1;
                }
            }
            if !out.is_empty() {
                let mut file = OpenOptions::new().create(true).append(true).open(path)?;
                file.write_all(&codec::encode(config.encoding, &out))?;
            }
        }
    }

    if rewrite_header {
        header.mark_written();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_keeps_blank_lines_and_quoted_breaks() {
        let text = "a,b\n\n\"x\ny\",z\r\nlast";
        let records = split_records(text, b'"');
        assert_eq!(records, vec!["a,b", "", "\"x\ny\",z", "last"]);
    }

    #[test]
    fn test_parse_and_format_record() {
        let config = RecorderConfig::default();
        let fields = parse_record("\"x\ny\",\"q\"\"q\",3", &config).unwrap();
        assert_eq!(fields, vec!["x\ny", "q\"q", "3"]);
        assert_eq!(
            format_row(&fields, &config).unwrap(),
            "\"x\ny\",\"q\"\"q\",3"
        );
        assert_eq!(format_row(&[], &config).unwrap(), "");
    }

    #[test]
    fn test_custom_delimiter() {
        let config = RecorderConfig {
            delimiter: b';',
            ..RecorderConfig::default()
        };
        let fields = vec!["a,b".to_string(), "c".to_string()];
        assert_eq!(format_row(&fields, &config).unwrap(), "a,b;c");
        assert_eq!(parse_record("a,b;c", &config).unwrap(), fields);
    }

    #[test]
    fn test_read_header() {
        let rows = vec![vec!["name".to_string(), "".to_string()]];
        let header = read_header(&rows, 1);
        assert_eq!(header.len(), 1);
        assert!(read_header(&rows, 2).is_empty());
        assert!(read_header(&rows, 0).is_positional());
    }
}
