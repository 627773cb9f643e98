//! Recorder settings

use crate::types::{CellStyle, Record};
use encoding_rs::{Encoding, UTF_8};
use std::path::{Path, PathBuf};

/// Output encoding, chosen from the file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Csv,
    Xlsx,
    Txt,
    Jsonl,
    Json,
    Bytes,
    Db,
}

impl FileType {
    /// Type for a path; unknown extensions are written as plain text
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "csv" => FileType::Csv,
            "xlsx" | "xlsm" => FileType::Xlsx,
            "jsonl" => FileType::Jsonl,
            "json" => FileType::Json,
            "bin" | "byte" | "bytes" => FileType::Bytes,
            "db" | "sqlite" | "sqlite3" => FileType::Db,
            _ => FileType::Txt,
        }
    }

    /// Formats where an explicit row addresses existing content
    pub fn is_random_access(self) -> bool {
        matches!(self, FileType::Csv | FileType::Xlsx)
    }

    /// Formats with a header row
    pub fn has_header(self) -> bool {
        matches!(self, FileType::Csv | FileType::Xlsx)
    }

    pub fn name(self) -> &'static str {
        match self {
            FileType::Csv => "csv",
            FileType::Xlsx => "xlsx",
            FileType::Txt => "txt",
            FileType::Jsonl => "jsonl",
            FileType::Json => "json",
            FileType::Bytes => "bytes",
            FileType::Db => "db",
        }
    }
}

/// When and where automatic backups go
#[derive(Debug, Clone, Default)]
pub struct BackupPolicy {
    /// Back up every N flushes; 0 disables
    pub interval: usize,
    /// Defaults to `backup/` next to the output file
    pub folder: Option<PathBuf>,
    /// Timestamp each backup instead of overwriting one copy
    pub new_name: bool,
}

/// Styling applied to rows appended to a spreadsheet
#[derive(Debug, Clone, Default)]
pub struct RowStyles {
    /// Copy style and height from the row above the first appended row
    pub follow: bool,
    pub height: Option<f64>,
    pub style: Option<CellStyle>,
    pub link_style: Option<CellStyle>,
}

/// Everything the setter can change
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    pub path: Option<PathBuf>,
    pub file_type: Option<FileType>,
    /// Auto-flush threshold; 0 disables
    pub cache_size: usize,
    /// Default sheet or table
    pub table: Option<String>,
    pub before: Option<Record>,
    pub after: Option<Record>,
    pub delimiter: u8,
    pub quote: u8,
    pub encoding: &'static Encoding,
    /// 0 means the target has no header row
    pub header_row: u32,
    pub auto_new_header: bool,
    /// Column used when a coordinate names none
    pub data_col: i64,
    pub row_styles: RowStyles,
    pub backup: BackupPolicy,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        RecorderConfig {
            path: None,
            file_type: None,
            cache_size: 1000,
            table: None,
            before: None,
            after: None,
            delimiter: b',',
            quote: b'"',
            encoding: UTF_8,
            header_row: 1,
            auto_new_header: false,
            data_col: 1,
            row_styles: RowStyles::default(),
            backup: BackupPolicy::default(),
        }
    }
}

impl RecorderConfig {
    pub fn new<P: AsRef<Path>>(path: P, cache_size: usize) -> Self {
        RecorderConfig {
            path: Some(path.as_ref().to_path_buf()),
            cache_size,
            ..Self::default()
        }
    }

    /// Explicit type, else derived from the path
    pub fn file_type(&self) -> Option<FileType> {
        self.file_type
            .or_else(|| self.path.as_deref().map(FileType::from_path))
    }

    /// First row below the header
    pub fn first_data_row(&self) -> u32 {
        self.header_row + 1
    }

    pub fn backup_folder(&self) -> Option<PathBuf> {
        if let Some(folder) = &self.backup.folder {
            return Some(folder.clone());
        }
        let parent = self.path.as_deref()?.parent()?;
        Some(parent.join("backup"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_type_from_extension() {
        assert_eq!(FileType::from_path(Path::new("a.CSV")), FileType::Csv);
        assert_eq!(FileType::from_path(Path::new("a.xlsx")), FileType::Xlsx);
        assert_eq!(FileType::from_path(Path::new("a.sqlite")), FileType::Db);
        assert_eq!(FileType::from_path(Path::new("a.bin")), FileType::Bytes);
        assert_eq!(FileType::from_path(Path::new("a.log")), FileType::Txt);
        assert_eq!(FileType::from_path(Path::new("noext")), FileType::Txt);
    }

    #[test]
    fn test_defaults() {
        let config = RecorderConfig::new("out/data.csv", 10);
        assert_eq!(config.file_type(), Some(FileType::Csv));
        assert_eq!(config.first_data_row(), 2);
        assert_eq!(
            config.backup_folder(),
            Some(PathBuf::from("out").join("backup"))
        );
        assert!(RecorderConfig::default().file_type().is_none());
    }
}
