//! Buffered recorder
//!
//! Submissions are buffered per target and flushed when the pending count
//! reaches the cache size, when [`Recorder::record`] is called, or when the
//! recorder is dropped. All state sits behind one fair mutex, so submitting
//! threads queue in order while a flush runs.

use crate::backends::{self, FlushContext};
use crate::backup::backup_file;
use crate::buffer::{Buffer, Entry, Mode, StyleTarget};
use crate::config::{FileType, RecorderConfig};
use crate::coord::{parse_col_span, parse_coord, CoordInput};
use crate::error::{RecorderError, Result};
use crate::header::{Header, HeaderRegistry};
use crate::reader::RowsQuery;
use crate::setter::Setter;
use crate::types::{CellStyle, CellValue, Data, Record};
use calamine::{open_workbook_auto, Reader};
use indexmap::IndexMap;
use parking_lot::FairMutex;
use std::fs;
use std::path::{Path, PathBuf};

/// State shared by the recorder and its setter
#[derive(Debug, Default)]
pub(crate) struct Inner {
    pub(crate) config: RecorderConfig,
    pub(crate) buffer: Buffer,
    pub(crate) headers: HeaderRegistry,
    pub(crate) flushes: usize,
}

impl Inner {
    pub(crate) fn file_type(&self) -> Result<FileType> {
        self.config.file_type().ok_or(RecorderError::NoPath)
    }

    /// Buffer key for a submission
    ///
    /// Only spreadsheets and databases have more than one target.
    fn target(&self, table: Option<&str>) -> Result<Option<String>> {
        Ok(match self.file_type()? {
            FileType::Xlsx | FileType::Db => table
                .map(str::to_string)
                .or_else(|| self.config.table.clone()),
            _ => None,
        })
    }

    fn submit(&mut self, target: Option<String>, entries: Vec<Entry>) -> Result<()> {
        for entry in entries {
            self.buffer.push(target.clone(), entry, 1);
        }
        let cache_size = self.config.cache_size;
        if cache_size > 0 && self.buffer.count() >= cache_size {
            log::debug!("cache size {} reached", cache_size);
            self.flush()?;
        }
        Ok(())
    }

    fn add_data(&mut self, data: Data, coord: &CoordInput, table: Option<&str>) -> Result<()> {
        let file_type = self.file_type()?;
        if file_type == FileType::Bytes {
            return Err(RecorderError::TypeMismatch(
                "binary output only accepts bytes; use add_bytes".to_string(),
            ));
        }
        let target = self.target(table)?;
        let coord = parse_coord(coord, self.config.data_col)?;
        if coord.row.is_some() && file_type.is_random_access() {
            self.buffer.force_slow();
        }

        let block = data.is_block();
        let (before, after) = (self.config.before.as_ref(), self.config.after.as_ref());
        let mut records: Vec<Record> = data
            .into_records()
            .into_iter()
            .map(|r| r.padded(before, after))
            .collect();

        let entries = if !block {
            match records.pop() {
                Some(record) => vec![Entry::Data { coord, record }],
                None => Vec::new(),
            }
        } else if self.buffer.mode() == Mode::Fast && coord.row.is_none() {
            // Appended rows are independent in fast mode
            records
                .into_iter()
                .map(|record| Entry::Data { coord, record })
                .collect()
        } else {
            vec![Entry::Block { coord, records }]
        };
        self.submit(target, entries)
    }

    /// Submit a spreadsheet-only operation; other outputs ignore it
    fn add_sheet_op(&mut self, entry: Entry, table: Option<&str>) -> Result<()> {
        if self.file_type()? != FileType::Xlsx {
            log::trace!("ignoring {:?}: output is not a spreadsheet", entry);
            return Ok(());
        }
        let target = self.target(table)?;
        self.buffer.force_slow();
        self.submit(target, vec![entry])
    }

    pub(crate) fn flush(&mut self) -> Result<()> {
        let path = self.config.path.clone().ok_or(RecorderError::NoPath)?;
        let file_type = self.file_type()?;
        if self.buffer.is_empty() {
            self.buffer.clear();
            return Ok(());
        }

        let (mode, batches) = self.buffer.take();
        let pending: usize = batches.values().map(Vec::len).sum();
        log::debug!(
            "flushing {} entries to {} in {:?} mode",
            pending,
            path.display(),
            mode
        );
        self.write(file_type, &path, mode, batches)?;

        self.flushes += 1;
        let interval = self.config.backup.interval;
        if interval > 0 && self.flushes % interval == 0 {
            if let Some(folder) = self.config.backup_folder() {
                let new_name = self.config.backup.new_name;
                backup_file(&path, &folder, None, new_name, !new_name)?;
            }
        }
        Ok(())
    }

    fn write(
        &mut self,
        file_type: FileType,
        path: &Path,
        mode: Mode,
        batches: IndexMap<Option<String>, Vec<Entry>>,
    ) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        // Headers only change once the write went through
        let mut headers = self.headers.clone();
        let mut ctx = FlushContext {
            config: &self.config,
            headers: &mut headers,
            mode,
        };
        backends::flush(&mut ctx, file_type, path, batches)?;
        self.headers = headers;
        Ok(())
    }

    /// Replace the header of the default target and write it out now
    pub(crate) fn set_header(&mut self, names: Vec<String>) -> Result<()> {
        let file_type = self.file_type()?;
        self.flush()?;
        let target = self.target(None)?;
        self.headers
            .insert(target.as_deref(), Header::declared(names));

        if file_type.has_header() && self.config.header_row > 0 {
            let path = self.config.path.clone().ok_or(RecorderError::NoPath)?;
            let mut batches = IndexMap::new();
            batches.insert(target, Vec::new());
            self.write(file_type, &path, Mode::Fast, batches)?;
        }
        Ok(())
    }

    fn backup(
        &mut self,
        folder: Option<&Path>,
        name: Option<&str>,
        overwrite: bool,
    ) -> Result<Option<PathBuf>> {
        self.flush()?;
        let path = self.config.path.clone().ok_or(RecorderError::NoPath)?;
        let folder = match folder {
            Some(f) => f.to_path_buf(),
            None => self
                .config
                .backup_folder()
                .unwrap_or_else(|| PathBuf::from("backup")),
        };
        backup_file(&path, &folder, name, false, overwrite)
    }
}

/// Buffered writer for csv, xlsx, json, jsonl, txt, binary and SQLite outputs
///
/// # Examples
///
/// ```no_run
/// use recordstream::{Recorder, Record};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let recorder = Recorder::new("people.csv", 100);
///
/// recorder.add_data(Record::map([("name", "Alice"), ("city", "Paris")]))?;
/// recorder.add_data(["Bob", "Lyon"])?;
/// recorder.add_data_at(["updated"], "C2")?;
///
/// recorder.record()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Recorder {
    inner: FairMutex<Inner>,
}

impl Recorder {
    /// Recorder writing to `path`, flushing every `cache_size` submissions
    ///
    /// A `cache_size` of 0 disables automatic flushing.
    pub fn new<P: AsRef<Path>>(path: P, cache_size: usize) -> Self {
        Self::with_config(RecorderConfig::new(path, cache_size))
    }

    /// Recorder without a destination; set one with `set().path(..)`
    pub fn unbound(cache_size: usize) -> Self {
        Self::with_config(RecorderConfig {
            cache_size,
            ..RecorderConfig::default()
        })
    }

    pub fn with_config(config: RecorderConfig) -> Self {
        Recorder {
            inner: FairMutex::new(Inner {
                config,
                ..Inner::default()
            }),
        }
    }

    /// Change settings; the recorder stays locked while the setter lives
    pub fn set(&self) -> Setter<'_> {
        Setter::new(self.inner.lock())
    }

    /// Append data in a new row at the data column
    ///
    /// A single record becomes one row, a block of records becomes
    /// consecutive rows.
    pub fn add_data(&self, data: impl Into<Data>) -> Result<()> {
        self.inner
            .lock()
            .add_data(data.into(), &CoordInput::Append, None)
    }

    /// Write data at a coordinate: `"B3"`, `(3, "B")`, `-1`, `"new,C"`, ...
    pub fn add_data_at(&self, data: impl Into<Data>, coord: impl Into<CoordInput>) -> Result<()> {
        self.inner
            .lock()
            .add_data(data.into(), &coord.into(), None)
    }

    /// Write data at a coordinate of a named sheet or table
    pub fn add_data_to(
        &self,
        data: impl Into<Data>,
        coord: impl Into<CoordInput>,
        table: Option<&str>,
    ) -> Result<()> {
        self.inner
            .lock()
            .add_data(data.into(), &coord.into(), table)
    }

    /// Append raw bytes, or overwrite at `seek` bytes from the start
    pub fn add_bytes(&self, data: impl Into<Vec<u8>>, seek: Option<u64>) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.file_type()? != FileType::Bytes {
            return Err(RecorderError::TypeMismatch(
                "bytes can only be written to binary output".to_string(),
            ));
        }
        let entry = Entry::Bytes {
            data: data.into(),
            seek,
        };
        inner.submit(None, vec![entry])
    }

    /// Attach a hyperlink to a cell; `content` replaces the displayed value
    ///
    /// `table` picks the sheet; `None` uses the default one. The same holds
    /// for every spreadsheet operation below.
    pub fn set_link(
        &self,
        coord: impl Into<CoordInput>,
        url: Option<&str>,
        content: Option<CellValue>,
        table: Option<&str>,
    ) -> Result<()> {
        let mut inner = self.inner.lock();
        let coord = parse_coord(&coord.into(), inner.config.data_col)?;
        let entry = Entry::Link {
            coord,
            url: url.map(str::to_string),
            content,
        };
        inner.add_sheet_op(entry, table)
    }

    /// Embed an image anchored at a cell
    ///
    /// Sizes are in pixels. With only one of them given the image keeps
    /// its aspect ratio.
    pub fn set_img(
        &self,
        coord: impl Into<CoordInput>,
        path: impl AsRef<Path>,
        width: Option<f64>,
        height: Option<f64>,
        table: Option<&str>,
    ) -> Result<()> {
        let mut inner = self.inner.lock();
        let coord = parse_coord(&coord.into(), inner.config.data_col)?;
        let entry = Entry::Image {
            coord,
            path: path.as_ref().to_path_buf(),
            width,
            height,
        };
        inner.add_sheet_op(entry, table)
    }

    /// Style a cell (`"B3"`), range (`"A1:C3"`), row (`"4"`) or column (`"C"`)
    ///
    /// With `replace` the existing style is reset first; otherwise only the
    /// properties `style` sets are changed.
    pub fn set_style(
        &self,
        target: &str,
        style: Option<CellStyle>,
        replace: bool,
        table: Option<&str>,
    ) -> Result<()> {
        let target = StyleTarget::parse(target)?;
        let entry = Entry::Style {
            target,
            style,
            replace,
        };
        self.inner.lock().add_sheet_op(entry, table)
    }

    /// Set a row height; negative rows count back from the last row
    pub fn set_row_height(&self, row: i64, height: f64, table: Option<&str>) -> Result<()> {
        if row == 0 {
            return Err(RecorderError::InvalidCoordinate("row 0".to_string()));
        }
        self.inner
            .lock()
            .add_sheet_op(Entry::RowHeight { row, height }, table)
    }

    /// Set the width of `"B"`, `"2"` or a span like `"A:C"`
    pub fn set_col_width(&self, cols: &str, width: f64, table: Option<&str>) -> Result<()> {
        let cols = parse_col_span(cols)?;
        self.inner
            .lock()
            .add_sheet_op(Entry::ColWidth { cols, width }, table)
    }

    /// Flush everything pending
    pub fn record(&self) -> Result<()> {
        self.inner.lock().flush()
    }

    /// Start a row query against the persisted file
    pub fn rows(&self) -> RowsQuery {
        RowsQuery::new(self.inner.lock().config.clone())
    }

    /// Drop pending data without writing it
    pub fn clear(&self) {
        self.inner.lock().buffer.clear();
    }

    /// Drop pending data and remove the output file
    pub fn delete(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.buffer.clear();
        inner.headers.clear();
        if let Some(path) = inner.config.path.clone() {
            if path.exists() {
                log::info!("deleting {}", path.display());
                fs::remove_file(path)?;
            }
        }
        Ok(())
    }

    /// Flush, then copy the output file into `folder`
    ///
    /// Returns `None` when nothing has been written yet.
    pub fn backup(
        &self,
        folder: Option<&Path>,
        name: Option<&str>,
        overwrite: bool,
    ) -> Result<Option<PathBuf>> {
        self.inner.lock().backup(folder, name, overwrite)
    }

    /// Cached header of a target, if it has been loaded or declared
    pub fn header(&self, table: Option<&str>) -> Option<Vec<Option<String>>> {
        let inner = self.inner.lock();
        let target = inner.target(table).ok()?;
        inner
            .headers
            .get(target.as_deref())
            .map(|h| h.names().to_vec())
    }

    /// Sheet names of a workbook or table names of a database
    pub fn tables(&self) -> Result<Vec<String>> {
        let mut inner = self.inner.lock();
        let file_type = inner.file_type()?;
        inner.flush()?;
        let path = inner.config.path.clone().ok_or(RecorderError::NoPath)?;
        match file_type {
            FileType::Xlsx if !path.exists() => Ok(Vec::new()),
            FileType::Xlsx => Ok(open_workbook_auto(&path)?.sheet_names().to_vec()),
            FileType::Db => backends::db::tables(&rusqlite::Connection::open(&path)?),
            other => Err(RecorderError::NotSupported(format!(
                "{} output has no tables",
                other.name()
            ))),
        }
    }

    /// Flush, then run a statement against the database
    pub fn run_sql(&self, sql: &str) -> Result<Vec<Vec<CellValue>>> {
        let mut inner = self.inner.lock();
        if inner.file_type()? != FileType::Db {
            return Err(RecorderError::NotSupported(
                "run_sql needs a database output".to_string(),
            ));
        }
        inner.flush()?;
        let path = inner.config.path.clone().ok_or(RecorderError::NoPath)?;
        let conn = rusqlite::Connection::open(&path)?;
        backends::db::run_sql(&conn, sql)
    }

    /// Entries waiting for the next flush
    pub fn pending(&self) -> usize {
        self.inner.lock().buffer.count()
    }

    /// Placement mode of the current epoch
    pub fn mode(&self) -> Mode {
        self.inner.lock().buffer.mode()
    }

    pub fn path(&self) -> Option<PathBuf> {
        self.inner.lock().config.path.clone()
    }

    pub fn file_type(&self) -> Option<FileType> {
        self.inner.lock().config.file_type()
    }

    /// Snapshot of the current settings
    pub fn config(&self) -> RecorderConfig {
        self.inner.lock().config.clone()
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        if inner.buffer.is_empty() || inner.config.path.is_none() {
            return;
        }
        if let Err(e) = inner.flush() {
            log::warn!("failed to flush on drop: {}", e);
        }
    }
}
