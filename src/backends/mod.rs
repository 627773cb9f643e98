//! Format backends
//!
//! Each backend receives the drained buffer for one target and writes it
//! out. Spreadsheet-only operations never reach the other backends.

pub mod bytes;
pub mod csv;
pub mod db;
pub mod json;
pub mod text;
pub mod xlsx;

use crate::buffer::{Entry, Mode};
use crate::config::{FileType, RecorderConfig};
use crate::error::Result;
use crate::header::HeaderRegistry;
use indexmap::IndexMap;
use std::path::Path;

/// Shared state a flush reads and updates
pub struct FlushContext<'a> {
    pub config: &'a RecorderConfig,
    pub headers: &'a mut HeaderRegistry,
    pub mode: Mode,
}

impl FlushContext<'_> {
    /// Name used for a target in error messages
    pub fn target_name<'t>(&'t self, target: Option<&'t str>) -> &'t str {
        target
            .or(self.config.table.as_deref())
            .unwrap_or("default")
    }
}

/// Write every pending entry to `path`
pub fn flush(
    ctx: &mut FlushContext<'_>,
    file_type: FileType,
    path: &Path,
    batches: IndexMap<Option<String>, Vec<Entry>>,
) -> Result<()> {
    match file_type {
        FileType::Csv => {
            for (target, entries) in batches {
                csv::flush(ctx, path, target.as_deref(), entries)?;
            }
            Ok(())
        }
        FileType::Xlsx => xlsx::flush(ctx, path, batches),
        FileType::Db => db::flush(ctx, path, batches),
        FileType::Txt | FileType::Jsonl | FileType::Json | FileType::Bytes => {
            let entries = batches.into_values().flatten();
            match file_type {
                FileType::Txt => text::flush(ctx.config, path, entries),
                FileType::Jsonl => json::flush_lines(ctx.config, path, entries),
                FileType::Json => json::flush_document(ctx.config, path, entries),
                _ => bytes::flush(path, entries),
            }
        }
    }
}

/// Records carried by a data entry, in row order
pub(crate) fn entry_records(entry: Entry) -> Vec<crate::types::Record> {
    match entry {
        Entry::Data { record, .. } => vec![record],
        Entry::Block { records, .. } => records,
        other => {
            log::trace!("ignoring {:?} on a non-spreadsheet output", other);
            Vec::new()
        }
    }
}
