//! Fluent settings for a [`Recorder`](crate::Recorder)
//!
//! ```no_run
//! use recordstream::Recorder;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let recorder = Recorder::unbound(500);
//! recorder
//!     .set()
//!     .path("out/report.csv")?
//!     .delimiter(b';')
//!     .auto_new_header(true)
//!     .header(["url", "title", "status"])?;
//! # Ok(())
//! # }
//! ```

use crate::codec;
use crate::config::FileType;
use crate::coord::ColSpec;
use crate::error::{RecorderError, Result};
use crate::recorder::Inner;
use crate::types::{CellStyle, Record};
use parking_lot::FairMutexGuard;
use std::path::Path;

/// Holds the recorder lock until dropped
pub struct Setter<'a> {
    inner: FairMutexGuard<'a, Inner>,
}

impl<'a> Setter<'a> {
    pub(crate) fn new(inner: FairMutexGuard<'a, Inner>) -> Self {
        Setter { inner }
    }

    /// Flush anything pending for the current destination
    fn flush_pending(&mut self) -> Result<()> {
        if self.inner.config.path.is_some() && !self.inner.buffer.is_empty() {
            self.inner.flush()?;
        }
        Ok(())
    }

    /// Switch to a new output file; pending data goes to the old one first
    pub fn path<P: AsRef<Path>>(&mut self, path: P) -> Result<&mut Self> {
        self.flush_pending()?;
        let inner = &mut *self.inner;
        inner.config.path = Some(path.as_ref().to_path_buf());
        inner.config.file_type = None;
        inner.headers.clear();
        inner.flushes = 0;
        Ok(self)
    }

    /// Override the type derived from the file extension
    pub fn file_type(&mut self, file_type: FileType) -> Result<&mut Self> {
        self.flush_pending()?;
        self.inner.config.file_type = Some(file_type);
        self.inner.headers.clear();
        Ok(self)
    }

    /// Auto-flush threshold; 0 disables
    pub fn cache_size(&mut self, size: usize) -> &mut Self {
        self.inner.config.cache_size = size;
        self
    }

    /// Default sheet or table
    pub fn table(&mut self, table: Option<&str>) -> &mut Self {
        self.inner.config.table = table.map(str::to_string);
        self
    }

    /// Values placed before every record
    pub fn before(&mut self, before: Option<Record>) -> &mut Self {
        self.inner.config.before = before;
        self
    }

    /// Values placed after every record
    pub fn after(&mut self, after: Option<Record>) -> &mut Self {
        self.inner.config.after = after;
        self
    }

    pub fn delimiter(&mut self, delimiter: u8) -> &mut Self {
        self.inner.config.delimiter = delimiter;
        self
    }

    pub fn quote_char(&mut self, quote: u8) -> &mut Self {
        self.inner.config.quote = quote;
        self
    }

    /// Encoding label for text outputs, e.g. `"gbk"`
    pub fn encoding(&mut self, label: &str) -> Result<&mut Self> {
        self.inner.config.encoding = codec::lookup(label)?;
        Ok(self)
    }

    /// Replace the header and write it to the header row immediately
    pub fn header<I, S>(&mut self, names: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inner
            .set_header(names.into_iter().map(Into::into).collect())?;
        Ok(self)
    }

    /// Row holding the header; 0 means there is none
    pub fn header_row(&mut self, row: u32) -> &mut Self {
        self.inner.config.header_row = row;
        self.inner.headers.clear();
        self
    }

    /// Add unknown keys to the header instead of failing
    pub fn auto_new_header(&mut self, on: bool) -> &mut Self {
        self.inner.config.auto_new_header = on;
        self
    }

    /// Copy style and height of the last existing row onto appended rows
    pub fn follow_styles(&mut self, on: bool) -> &mut Self {
        self.inner.config.row_styles.follow = on;
        self
    }

    /// Height of appended rows
    pub fn row_height(&mut self, height: Option<f64>) -> &mut Self {
        self.inner.config.row_styles.height = height;
        self
    }

    /// Style of appended cells
    pub fn styles(&mut self, style: Option<CellStyle>) -> &mut Self {
        self.inner.config.row_styles.style = style;
        self
    }

    pub fn link_style(&mut self, style: Option<CellStyle>) -> &mut Self {
        self.inner.config.row_styles.link_style = style;
        self
    }

    /// Column used when a coordinate names none
    pub fn data_col(&mut self, col: impl Into<ColSpec>) -> Result<&mut Self> {
        let col = col.into().to_index()?;
        if col < 1 {
            return Err(RecorderError::InvalidConfig(format!(
                "data column must be positive, got {}",
                col
            )));
        }
        self.inner.config.data_col = col;
        Ok(self)
    }

    /// Back up every `interval` flushes; 0 disables
    pub fn backup_interval(&mut self, interval: usize) -> &mut Self {
        self.inner.config.backup.interval = interval;
        self
    }

    pub fn backup_folder<P: AsRef<Path>>(&mut self, folder: P) -> &mut Self {
        self.inner.config.backup.folder = Some(folder.as_ref().to_path_buf());
        self
    }

    /// Keep every automatic backup under a timestamped name
    pub fn backup_new_name(&mut self, on: bool) -> &mut Self {
        self.inner.config.backup.new_name = on;
        self
    }
}

#[cfg(test)]
mod tests {
    use crate::config::FileType;
    use crate::Recorder;
    use tempfile::TempDir;

    #[test]
    fn test_chained_settings() {
        let dir = TempDir::new().unwrap();
        let recorder = Recorder::unbound(10);
        recorder
            .set()
            .path(dir.path().join("a.csv"))
            .unwrap()
            .delimiter(b';')
            .header_row(2)
            .data_col("C")
            .unwrap();

        let config = recorder.config();
        assert_eq!(config.delimiter, b';');
        assert_eq!(config.header_row, 2);
        assert_eq!(config.data_col, 3);
        assert_eq!(recorder.file_type(), Some(FileType::Csv));
    }

    #[test]
    fn test_invalid_settings() {
        let recorder = Recorder::unbound(0);
        assert!(recorder.set().encoding("nope").is_err());
        assert!(recorder.set().data_col(-1).is_err());
    }

    #[test]
    fn test_path_change_flushes_old_destination() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("first.txt");
        let recorder = Recorder::new(&first, 0);
        recorder.add_data("one").unwrap();

        recorder.set().path(dir.path().join("second.txt")).unwrap();
        recorder.add_data("two").unwrap();
        recorder.record().unwrap();

        assert_eq!(std::fs::read_to_string(first).unwrap(), "one\n");
        assert_eq!(
            std::fs::read_to_string(dir.path().join("second.txt")).unwrap(),
            "two\n"
        );
    }

    #[test]
    fn test_header_written_immediately() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("h.csv");
        let recorder = Recorder::new(&path, 0);
        recorder.set().header(["a", "b"]).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a,b\n");
        assert_eq!(
            recorder.header(None),
            Some(vec![Some("a".to_string()), Some("b".to_string())])
        );
    }
}
