//! Value, style and record types accepted by the recorder

use indexmap::IndexMap;
use std::fmt;

/// Formatting applied to spreadsheet cells
///
/// Every property is optional. When a style is applied without replacing
/// the existing one, only the properties that are `Some` are changed.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CellStyle {
    /// Bold font
    pub bold: Option<bool>,
    /// Italic font
    pub italic: Option<bool>,
    /// Single underline
    pub underline: Option<bool>,
    /// Font size in points
    pub font_size: Option<f64>,
    /// Font color as ARGB hex (e.g. `FF0000FF`)
    pub font_color: Option<String>,
    /// Solid background fill as ARGB hex
    pub fill_color: Option<String>,
    /// Number format code (e.g. `#,##0.00`)
    pub number_format: Option<String>,
    /// Thin borders on all sides
    pub border: Option<bool>,
}

impl CellStyle {
    /// Empty style that changes nothing
    pub fn new() -> Self {
        Self::default()
    }

    /// Bold text for headers
    pub fn header_bold() -> Self {
        Self::new().bold(true)
    }

    /// `#,##0`
    pub fn number_integer() -> Self {
        Self::new().number_format("#,##0")
    }

    /// `#,##0.00`
    pub fn number_decimal() -> Self {
        Self::new().number_format("#,##0.00")
    }

    /// Dollar amounts, `$#,##0.00`
    pub fn number_currency() -> Self {
        Self::new().number_format("$#,##0.00")
    }

    /// `0.00%`
    pub fn number_percentage() -> Self {
        Self::new().number_format("0.00%")
    }

    /// US style dates
    pub fn date_default() -> Self {
        Self::new().number_format("mm/dd/yyyy")
    }

    /// Yellow fill
    pub fn highlight_yellow() -> Self {
        Self::new().fill_color("FFFFFF00")
    }

    /// Green fill
    pub fn highlight_green() -> Self {
        Self::new().fill_color("FF00FF00")
    }

    /// Red fill
    pub fn highlight_red() -> Self {
        Self::new().fill_color("FFFF0000")
    }

    pub fn border_thin() -> Self {
        Self::new().border(true)
    }

    /// Blue underlined text, used for hyperlinks
    pub fn hyperlink() -> Self {
        Self::new().font_color("FF0000FF").underline(true)
    }

    pub fn bold(mut self, bold: bool) -> Self {
        self.bold = Some(bold);
        self
    }

    pub fn italic(mut self, italic: bool) -> Self {
        self.italic = Some(italic);
        self
    }

    pub fn underline(mut self, underline: bool) -> Self {
        self.underline = Some(underline);
        self
    }

    pub fn font_size(mut self, size: f64) -> Self {
        self.font_size = Some(size);
        self
    }

    pub fn font_color(mut self, argb: impl Into<String>) -> Self {
        self.font_color = Some(argb.into());
        self
    }

    pub fn fill_color(mut self, argb: impl Into<String>) -> Self {
        self.fill_color = Some(argb.into());
        self
    }

    pub fn number_format(mut self, code: impl Into<String>) -> Self {
        self.number_format = Some(code.into());
        self
    }

    pub fn border(mut self, border: bool) -> Self {
        self.border = Some(border);
        self
    }
}

/// A single value written to a cell, column or field
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CellValue {
    /// Empty cell
    #[default]
    Empty,
    /// String value
    String(String),
    /// Integer value
    Int(i64),
    /// Float value
    Float(f64),
    /// Boolean value
    Bool(bool),
    /// Spreadsheet serial date
    DateTime(f64),
    /// Error value
    Error(String),
    /// Formula text, with or without the leading `=`
    Formula(String),
}

impl CellValue {
    /// Text form used by delimited and plain text outputs
    pub fn as_string(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::String(s) => s.clone(),
            CellValue::Int(i) => itoa::Buffer::new().format(*i).to_owned(),
            CellValue::Float(f) => f.to_string(),
            CellValue::Bool(b) => b.to_string(),
            CellValue::DateTime(d) => d.to_string(),
            CellValue::Error(e) => format!("ERROR: {}", e),
            CellValue::Formula(f) => f.clone(),
        }
    }

    /// `Empty`, or a string with nothing in it
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::String(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Integer view, truncating floats and parsing strings
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            CellValue::Int(i) => Some(*i),
            CellValue::Float(f) => Some(*f as i64),
            CellValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Float(f) => Some(*f),
            CellValue::Int(i) => Some(*i as f64),
            CellValue::DateTime(d) => Some(*d),
            CellValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Accepts `true`/`yes`/`1` and `false`/`no`/`0` in strings
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CellValue::Bool(b) => Some(*b),
            CellValue::Int(i) => Some(*i != 0),
            CellValue::String(s) => match s.to_lowercase().as_str() {
                "true" | "yes" | "1" => Some(true),
                "false" | "no" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_string())
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::String(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::String(s)
    }
}

impl From<i64> for CellValue {
    fn from(i: i64) -> Self {
        CellValue::Int(i)
    }
}

impl From<i32> for CellValue {
    fn from(i: i32) -> Self {
        CellValue::Int(i as i64)
    }
}

impl From<u32> for CellValue {
    fn from(i: u32) -> Self {
        CellValue::Int(i as i64)
    }
}

impl From<f64> for CellValue {
    fn from(f: f64) -> Self {
        CellValue::Float(f)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(CellValue::Empty)
    }
}

/// One unit of data: a bare value, a positional row or a keyed row
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Record {
    /// Single scalar
    Value(CellValue),
    /// Values placed left to right from the target column
    Row(Vec<CellValue>),
    /// Values placed by header name
    Map(IndexMap<String, CellValue>),
}

impl Record {
    /// Build a keyed record from `(name, value)` pairs
    pub fn map<K, V, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<CellValue>,
    {
        Record::Map(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Values in positional order, dropping map keys
    pub fn into_values(self) -> Vec<CellValue> {
        match self {
            Record::Value(v) => vec![v],
            Record::Row(values) => values,
            Record::Map(map) => map.into_values().collect(),
        }
    }

    /// Wrap this record between the configured `before` and `after` padding
    ///
    /// Rows concatenate, maps merge. Mixing a map with a positional padding
    /// degrades the result to a positional row.
    pub fn padded(self, before: Option<&Record>, after: Option<&Record>) -> Record {
        if before.is_none() && after.is_none() {
            return self;
        }
        let all_maps = matches!(self, Record::Map(_))
            && before.map_or(true, |b| matches!(b, Record::Map(_)))
            && after.map_or(true, |a| matches!(a, Record::Map(_)));

        if all_maps {
            let mut merged = IndexMap::new();
            for part in [before.cloned(), Some(self), after.cloned()]
                .into_iter()
                .flatten()
            {
                if let Record::Map(map) = part {
                    merged.extend(map);
                }
            }
            return Record::Map(merged);
        }

        let mut values = before.cloned().map(Record::into_values).unwrap_or_default();
        values.extend(self.into_values());
        values.extend(after.cloned().map(Record::into_values).unwrap_or_default());
        Record::Row(values)
    }
}

impl From<CellValue> for Record {
    fn from(value: CellValue) -> Self {
        Record::Value(value)
    }
}

impl From<Vec<CellValue>> for Record {
    fn from(values: Vec<CellValue>) -> Self {
        Record::Row(values)
    }
}

impl From<IndexMap<String, CellValue>> for Record {
    fn from(map: IndexMap<String, CellValue>) -> Self {
        Record::Map(map)
    }
}

/// Payload of a single `add_data` call
#[derive(Debug, Clone, PartialEq)]
pub enum Data {
    /// One record, written as one row
    One(Record),
    /// A 2-D block, written as consecutive rows
    Many(Vec<Record>),
}

impl Data {
    /// Build a 2-D block from nested rows of values
    pub fn rows<I, R, V>(rows: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = V>,
        V: Into<CellValue>,
    {
        Data::Many(
            rows.into_iter()
                .map(|r| Record::Row(r.into_iter().map(Into::into).collect()))
                .collect(),
        )
    }

    /// Records in submission order
    pub fn into_records(self) -> Vec<Record> {
        match self {
            Data::One(record) => vec![record],
            Data::Many(records) => records,
        }
    }

    pub fn is_block(&self) -> bool {
        matches!(self, Data::Many(_))
    }
}

impl From<Record> for Data {
    fn from(record: Record) -> Self {
        Data::One(record)
    }
}

impl From<Vec<Record>> for Data {
    fn from(records: Vec<Record>) -> Self {
        Data::Many(records)
    }
}

impl From<CellValue> for Data {
    fn from(value: CellValue) -> Self {
        Data::One(Record::Value(value))
    }
}

impl From<&str> for Data {
    fn from(s: &str) -> Self {
        Data::One(Record::Value(s.into()))
    }
}

impl From<String> for Data {
    fn from(s: String) -> Self {
        Data::One(Record::Value(s.into()))
    }
}

impl From<i64> for Data {
    fn from(i: i64) -> Self {
        Data::One(Record::Value(i.into()))
    }
}

impl From<f64> for Data {
    fn from(f: f64) -> Self {
        Data::One(Record::Value(f.into()))
    }
}

impl From<bool> for Data {
    fn from(b: bool) -> Self {
        Data::One(Record::Value(b.into()))
    }
}

impl From<Vec<CellValue>> for Data {
    fn from(values: Vec<CellValue>) -> Self {
        Data::One(Record::Row(values))
    }
}

impl From<Vec<Vec<CellValue>>> for Data {
    fn from(rows: Vec<Vec<CellValue>>) -> Self {
        Data::Many(rows.into_iter().map(Record::Row).collect())
    }
}

impl From<IndexMap<String, CellValue>> for Data {
    fn from(map: IndexMap<String, CellValue>) -> Self {
        Data::One(Record::Map(map))
    }
}

impl From<Vec<IndexMap<String, CellValue>>> for Data {
    fn from(maps: Vec<IndexMap<String, CellValue>>) -> Self {
        Data::Many(maps.into_iter().map(Record::Map).collect())
    }
}

impl<T: Into<CellValue>, const N: usize> From<[T; N]> for Data {
    fn from(values: [T; N]) -> Self {
        Data::One(Record::Row(values.into_iter().map(Into::into).collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_value_conversions() {
        let val = CellValue::Int(42);
        assert_eq!(val.as_i64(), Some(42));
        assert_eq!(val.as_f64(), Some(42.0));
        assert_eq!(val.as_string(), "42");

        let val = CellValue::String("true".to_string());
        assert_eq!(val.as_bool(), Some(true));
        assert!(CellValue::String(String::new()).is_empty());
    }

    #[test]
    fn test_array_into_row() {
        let data: Data = [1, 2, 3].into();
        assert_eq!(
            data,
            Data::One(Record::Row(vec![
                CellValue::Int(1),
                CellValue::Int(2),
                CellValue::Int(3)
            ]))
        );
        assert!(!data.is_block());
        assert!(Data::rows([[1, 2], [3, 4]]).is_block());
    }

    #[test]
    fn test_padding_rows_and_maps() {
        let before = Record::Row(vec!["x".into()]);
        let after = Record::Row(vec!["z".into()]);
        let padded = Record::Row(vec!["y".into()]).padded(Some(&before), Some(&after));
        assert_eq!(
            padded,
            Record::Row(vec!["x".into(), "y".into(), "z".into()])
        );

        let before = Record::map([("site", "a")]);
        let padded = Record::map([("name", "b")]).padded(Some(&before), None);
        match padded {
            Record::Map(map) => {
                assert_eq!(map.keys().collect::<Vec<_>>(), vec!["site", "name"]);
            }
            other => panic!("expected map, got {:?}", other),
        }
    }

    #[test]
    fn test_map_with_row_padding_degrades() {
        let before = Record::Row(vec!["x".into()]);
        let padded = Record::map([("name", "b")]).padded(Some(&before), None);
        assert_eq!(padded, Record::Row(vec!["x".into(), "b".into()]));
    }
}
