//! Reading rows back out of a persisted file
//!
//! Reads go straight to the file; pending buffered data is not visible
//! until it has been flushed.

use crate::backends::{csv, json};
use crate::config::{FileType, RecorderConfig};
use crate::error::{RecorderError, Result};
use crate::header::Header;
use crate::types::CellValue;
use calamine::{open_workbook_auto, Data, Reader};
use std::path::Path;
use std::sync::Arc;

/// One row returned by [`RowsQuery::fetch`]
#[derive(Debug, Clone, PartialEq)]
pub struct RowData {
    row: u32,
    keys: Arc<[Option<String>]>,
    values: Vec<CellValue>,
}

impl RowData {
    /// 1-based row number in the file
    pub fn row(&self) -> u32 {
        self.row
    }

    pub fn values(&self) -> &[CellValue] {
        &self.values
    }

    /// Value at a 0-based position among the selected columns
    pub fn get(&self, idx: usize) -> Option<&CellValue> {
        self.values.get(idx)
    }

    /// Value of the column with this header name
    pub fn get_by_name(&self, name: &str) -> Option<&CellValue> {
        let idx = self.keys.iter().position(|k| k.as_deref() == Some(name))?;
        self.values.get(idx)
    }

    /// Header name of each selected column
    pub fn keys(&self) -> &[Option<String>] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn to_strings(&self) -> Vec<String> {
        self.values.iter().map(|c| c.as_string()).collect()
    }
}

/// Full content of a target: header plus every row, row 1 first
pub(crate) struct Table {
    pub header: Header,
    pub rows: Vec<Vec<CellValue>>,
    pub first_data_row: u32,
}

/// Convert calamine Data to our CellValue
fn datatype_to_cellvalue(dt: &Data) -> CellValue {
    match dt {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::String(s.clone()),
        Data::Float(f) => CellValue::Float(*f),
        Data::Int(i) => CellValue::Int(*i),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(d) => CellValue::DateTime(d.as_f64()),
        Data::Error(e) => CellValue::Error(format!("{:?}", e)),
        Data::DateTimeIso(s) => CellValue::String(s.clone()),
        Data::DurationIso(s) => CellValue::String(s.clone()),
    }
}

fn read_csv(config: &RecorderConfig, path: &Path) -> Result<Table> {
    let raw = csv::load_rows(path, config)?;
    let header = csv::read_header(&raw, config.header_row);
    let rows = raw
        .into_iter()
        .map(|r| r.into_iter().map(CellValue::String).collect())
        .collect();
    Ok(Table {
        header,
        rows,
        first_data_row: config.first_data_row(),
    })
}

fn read_xlsx(config: &RecorderConfig, path: &Path, table: Option<&str>) -> Result<Table> {
    let mut workbook = open_workbook_auto(path)?;
    let sheet_names = workbook.sheet_names().to_vec();
    let sheet = match table.or(config.table.as_deref()) {
        Some(name) => name.to_string(),
        None => sheet_names.first().cloned().ok_or_else(|| RecorderError::MissingTarget {
            target: "sheet 0".to_string(),
            available: String::new(),
        })?,
    };
    if !sheet_names.contains(&sheet) {
        return Err(RecorderError::MissingTarget {
            target: sheet,
            available: sheet_names.join(", "),
        });
    }

    let range = workbook.worksheet_range(&sheet)?;
    let mut rows: Vec<Vec<CellValue>> = Vec::new();
    if let Some((end_row, end_col)) = range.end() {
        for r in 0..=end_row {
            let values = (0..=end_col)
                .map(|c| {
                    range
                        .get_value((r, c))
                        .map(datatype_to_cellvalue)
                        .unwrap_or(CellValue::Empty)
                })
                .collect();
            rows.push(values);
        }
    }

    let header = if config.header_row == 0 {
        Header::positional()
    } else {
        match rows.get(config.header_row as usize - 1) {
            Some(names) => Header::from_existing(
                names
                    .iter()
                    .map(|v: &CellValue| Some(v.as_string())),
            ),
            None => Header::new(),
        }
    };
    Ok(Table {
        header,
        rows,
        first_data_row: config.first_data_row(),
    })
}

/// Rows of JSON items; object keys form the header as they are met
fn json_table(items: Vec<serde_json::Value>) -> Table {
    let mut header = Header::new();
    let mut rows = Vec::with_capacity(items.len());
    for item in items {
        let row = match item {
            serde_json::Value::Object(map) => {
                let mut values = Vec::new();
                for (key, value) in &map {
                    let idx = header.grow(key) as usize - 1;
                    if values.len() <= idx {
                        values.resize(idx + 1, CellValue::Empty);
                    }
                    values[idx] = json::json_to_value(value);
                }
                values
            }
            serde_json::Value::Array(values) => values.iter().map(json::json_to_value).collect(),
            scalar => vec![json::json_to_value(&scalar)],
        };
        rows.push(row);
    }
    Table {
        header,
        rows,
        first_data_row: 1,
    }
}

fn read_text_lines(config: &RecorderConfig, path: &Path) -> Result<Vec<String>> {
    let text = crate::codec::read_to_string(path, config.encoding)?;
    Ok(text
        .lines()
        .map(|l| l.trim_end_matches('\r').to_string())
        .collect())
}

pub(crate) fn read_table(config: &RecorderConfig, table: Option<&str>) -> Result<Table> {
    let path = config.path.as_deref().ok_or(RecorderError::NoPath)?;
    let file_type = config.file_type().ok_or(RecorderError::NoPath)?;
    match file_type {
        FileType::Csv => read_csv(config, path),
        FileType::Xlsx => read_xlsx(config, path, table),
        FileType::Json => Ok(json_table(json::load_document(config, path)?)),
        FileType::Jsonl => {
            let items = read_text_lines(config, path)?
                .iter()
                .filter(|l| !l.trim().is_empty())
                .map(|l| serde_json::from_str(l))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(json_table(items))
        }
        FileType::Txt => Ok(Table {
            header: Header::positional(),
            rows: read_text_lines(config, path)?
                .into_iter()
                .map(|l| vec![CellValue::String(l)])
                .collect(),
            first_data_row: 1,
        }),
        FileType::Bytes | FileType::Db => Err(RecorderError::NotSupported(format!(
            "reading rows from {} output",
            file_type.name()
        ))),
    }
}

/// Filtered, column-selected read of a persisted file
///
/// # Examples
///
/// ```no_run
/// use recordstream::Recorder;
///
/// let recorder = Recorder::new("tasks.csv", 100);
/// let pending = recorder
///     .rows()
///     .cols(["url", "title"])
///     .sign_col("status")
///     .signs(["pending"])
///     .count(10)
///     .fetch()
///     .unwrap();
/// for row in pending {
///     println!("{} {:?}", row.row(), row.get_by_name("url"));
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RowsQuery {
    config: RecorderConfig,
    table: Option<String>,
    cols: Option<Vec<String>>,
    sign_col: Option<String>,
    signs: Vec<CellValue>,
    deny_sign: bool,
    count: Option<usize>,
    begin_row: Option<u32>,
    is_header: bool,
}

impl RowsQuery {
    pub fn new(config: RecorderConfig) -> Self {
        RowsQuery {
            config,
            table: None,
            cols: None,
            sign_col: None,
            signs: Vec::new(),
            deny_sign: false,
            count: None,
            begin_row: None,
            is_header: false,
        }
    }

    /// Query a file directly, with default settings for its type
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        Self::new(RecorderConfig::new(path, 0))
    }

    /// Sheet to read
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Only return these columns, by header name or column letter
    pub fn cols<I, S>(mut self, cols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cols = Some(cols.into_iter().map(Into::into).collect());
        self
    }

    /// Column compared against the signs
    pub fn sign_col(mut self, col: impl Into<String>) -> Self {
        self.sign_col = Some(col.into());
        self
    }

    /// Values that mark a row as matching; default is the empty value
    pub fn signs<I, V>(mut self, signs: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<CellValue>,
    {
        self.signs = signs.into_iter().map(Into::into).collect();
        self
    }

    /// Keep rows that do NOT match the signs
    pub fn deny_sign(mut self, deny: bool) -> Self {
        self.deny_sign = deny;
        self
    }

    pub fn count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    /// First row to consider, default the row after the header
    pub fn begin_row(mut self, row: u32) -> Self {
        self.begin_row = Some(row);
        self
    }

    /// Resolve column names against the header only, never as letters
    pub fn is_header(mut self, is_header: bool) -> Self {
        self.is_header = is_header;
        self
    }

    fn resolve(&self, header: &Header, key: &str) -> Result<u32> {
        header
            .resolve(key, self.is_header)
            .ok_or_else(|| RecorderError::UnknownColumn {
                column: key.to_string(),
                target: self
                    .table
                    .clone()
                    .or_else(|| self.config.table.clone())
                    .unwrap_or_else(|| "default".to_string()),
            })
    }

    /// Read the file and collect the matching rows
    pub fn fetch(self) -> Result<Vec<RowData>> {
        let table = read_table(&self.config, self.table.as_deref())?;
        let header = &table.header;

        let sign_pos = match &self.sign_col {
            Some(col) => Some(self.resolve(header, col)?),
            None => None,
        };
        let signs: Vec<String> = if self.signs.is_empty() {
            vec![String::new()]
        } else {
            self.signs.iter().map(CellValue::as_string).collect()
        };
        let selected = match &self.cols {
            Some(cols) => Some(
                cols.iter()
                    .map(|c| self.resolve(header, c))
                    .collect::<Result<Vec<_>>>()?,
            ),
            None => None,
        };
        let selected_keys: Option<Arc<[Option<String>]>> = selected
            .as_ref()
            .map(|positions| positions.iter().map(|p| header.name_at(*p)).collect());

        let begin = self.begin_row.unwrap_or(table.first_data_row).max(1);
        let mut out = Vec::new();
        for (i, values) in table.rows.iter().enumerate() {
            let row = i as u32 + 1;
            if row < begin {
                continue;
            }
            if self.count.is_some_and(|n| out.len() >= n) {
                break;
            }

            if let Some(pos) = sign_pos {
                let value = values
                    .get(pos as usize - 1)
                    .map(CellValue::as_string)
                    .unwrap_or_default();
                if signs.contains(&value) == self.deny_sign {
                    continue;
                }
            }

            let (keys, values) = match (&selected, &selected_keys) {
                (Some(positions), Some(keys)) => (
                    keys.clone(),
                    positions
                        .iter()
                        .map(|p| {
                            values
                                .get(*p as usize - 1)
                                .cloned()
                                .unwrap_or_else(|| CellValue::String(String::new()))
                        })
                        .collect(),
                ),
                _ => (
                    (1..=values.len() as u32)
                        .map(|p| header.name_at(p))
                        .collect::<Arc<[_]>>(),
                    values.clone(),
                ),
            };
            out.push(RowData { row, keys, values });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_datatype_conversion() {
        let dt = Data::String("test".to_string());
        assert_eq!(datatype_to_cellvalue(&dt), CellValue::String("test".to_string()));
        assert_eq!(datatype_to_cellvalue(&Data::Int(42)), CellValue::Int(42));
    }

    #[test]
    fn test_filter_by_sign_column() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tasks.csv");
        std::fs::write(&path, "name,status\na,active\nb,inactive\nc,active\n").unwrap();

        let rows = RowsQuery::open(&path)
            .sign_col("status")
            .signs(["active"])
            .fetch()
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].row(), 2);
        assert_eq!(rows[1].row(), 4);
        assert_eq!(rows[1].get_by_name("name"), Some(&CellValue::from("c")));

        let denied = RowsQuery::open(&path)
            .sign_col("status")
            .signs(["active"])
            .deny_sign(true)
            .fetch()
            .unwrap();
        assert_eq!(denied.len(), 1);
        assert_eq!(denied[0].to_strings(), vec!["b", "inactive"]);
    }

    #[test]
    fn test_select_columns_and_count() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.csv");
        std::fs::write(&path, "a,b,c\n1,2\n4,5,6\n7,8,9\n").unwrap();

        let rows = RowsQuery::open(&path).cols(["c", "A"]).count(2).fetch().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].to_strings(), vec!["", "1"]);
        assert_eq!(rows[1].to_strings(), vec!["6", "4"]);
        assert_eq!(rows[1].keys(), &[Some("c".to_string()), Some("a".to_string())]);

        let err = RowsQuery::open(&path).cols(["A"]).is_header(true).fetch();
        assert!(matches!(err, Err(RecorderError::UnknownColumn { .. })));
    }

    #[test]
    fn test_empty_sign_matches_blank_cells() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.csv");
        std::fs::write(&path, "url,done\nx,1\ny\nz,\n").unwrap();

        let rows = RowsQuery::open(&path).sign_col("done").fetch().unwrap();
        let urls: Vec<_> = rows.iter().map(|r| r.to_strings()[0].clone()).collect();
        assert_eq!(urls, vec!["y", "z"]);
    }

    #[test]
    fn test_text_and_jsonl() {
        let dir = TempDir::new().unwrap();
        let txt = dir.path().join("log.txt");
        std::fs::write(&txt, "first\nsecond\n").unwrap();
        let rows = RowsQuery::open(&txt).begin_row(2).fetch().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].values(), &[CellValue::from("second")]);

        let jsonl = dir.path().join("items.jsonl");
        std::fs::write(&jsonl, "{\"k\":1}\n{\"k\":2,\"v\":\"x\"}\n").unwrap();
        let rows = RowsQuery::open(&jsonl).cols(["v"]).fetch().unwrap();
        assert_eq!(rows[1].values(), &[CellValue::from("x")]);
        assert_eq!(rows[0].values(), &[CellValue::String(String::new())]);
    }

    #[test]
    fn test_bytes_not_supported() {
        let result = RowsQuery::open("blob.bin").fetch();
        assert!(matches!(result, Err(RecorderError::NotSupported(_))));
    }
}
