//! Coordinate expressions and column letter conversion
//!
//! A coordinate is a `(row, col)` pair where the row may be `None`
//! (append a new row) or negative (counted back from the last row), and the
//! column is 1-based and may also be negative. Negative components stay
//! unresolved until flush time, when the extent of the target is known.

use crate::error::{RecorderError, Result};

/// Normalized coordinate, not yet resolved against a file extent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coord {
    /// `None` appends a new row
    pub row: Option<i64>,
    pub col: i64,
}

impl Coord {
    pub fn new(row: Option<i64>, col: i64) -> Self {
        Coord { row, col }
    }

    /// Append at `col`
    pub fn append(col: i64) -> Self {
        Coord { row: None, col }
    }

    /// Column resolved against the widest known row
    pub fn resolve_col(&self, max_col: u32) -> Result<u32> {
        resolve_index(self.col, max_col, "column")
    }
}

/// Resolve a possibly negative 1-based index against an extent
///
/// `-1` is the last existing position. Results below 1 are rejected.
pub fn resolve_index(index: i64, extent: u32, what: &str) -> Result<u32> {
    let resolved = if index < 0 {
        extent as i64 + index + 1
    } else {
        index
    };
    if resolved < 1 || resolved > u32::MAX as i64 {
        return Err(RecorderError::InvalidCoordinate(format!(
            "{} {} is outside the target (extent {})",
            what, index, extent
        )));
    }
    Ok(resolved as u32)
}

/// Row part of an explicit `(row, col)` pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowSpec {
    New,
    At(i64),
    Text(String),
}

/// Column part of an explicit `(row, col)` pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColSpec {
    Index(i64),
    Letters(String),
}

impl ColSpec {
    /// 1-based column number
    pub fn to_index(&self) -> Result<i64> {
        match self {
            ColSpec::Index(0) => Err(RecorderError::InvalidCoordinate(
                "column 0 does not exist".to_string(),
            )),
            ColSpec::Index(i) => Ok(*i),
            ColSpec::Letters(s) => {
                let trimmed = s.trim();
                if let Ok(i) = trimmed.parse::<i64>() {
                    return ColSpec::Index(i).to_index();
                }
                letter_to_col(trimmed).map(|c| c as i64)
            }
        }
    }
}

/// Any coordinate expression a caller may pass
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CoordInput {
    /// Append a new row at the default column
    #[default]
    Append,
    /// Go to this row at the default column
    Row(i64),
    /// Textual address: `"A3"`, `"3A"`, `"$A$3"`, `"A-1"`, `"3,B"`, `"new,2"`, `"C"`
    Text(String),
    /// Explicit `(row, col)` pair
    Pair(RowSpec, ColSpec),
}

macro_rules! int_conversions {
    ($($t:ty),*) => {
        $(
            impl From<$t> for RowSpec {
                fn from(v: $t) -> Self {
                    RowSpec::At(v as i64)
                }
            }

            impl From<$t> for ColSpec {
                fn from(v: $t) -> Self {
                    ColSpec::Index(v as i64)
                }
            }

            impl From<$t> for CoordInput {
                fn from(v: $t) -> Self {
                    CoordInput::Row(v as i64)
                }
            }
        )*
    };
}

int_conversions!(i32, i64, u32, usize);

impl From<Option<i64>> for RowSpec {
    fn from(v: Option<i64>) -> Self {
        v.map(RowSpec::At).unwrap_or(RowSpec::New)
    }
}

impl From<&str> for RowSpec {
    fn from(v: &str) -> Self {
        RowSpec::Text(v.to_string())
    }
}

impl From<&str> for ColSpec {
    fn from(v: &str) -> Self {
        ColSpec::Letters(v.to_string())
    }
}

impl From<String> for ColSpec {
    fn from(v: String) -> Self {
        ColSpec::Letters(v)
    }
}

impl From<&str> for CoordInput {
    fn from(v: &str) -> Self {
        CoordInput::Text(v.to_string())
    }
}

impl From<String> for CoordInput {
    fn from(v: String) -> Self {
        CoordInput::Text(v)
    }
}

impl From<()> for CoordInput {
    fn from(_: ()) -> Self {
        CoordInput::Append
    }
}

impl<T: Into<CoordInput>> From<Option<T>> for CoordInput {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(CoordInput::Append)
    }
}

impl<R: Into<RowSpec>, C: Into<ColSpec>> From<(R, C)> for CoordInput {
    fn from((row, col): (R, C)) -> Self {
        CoordInput::Pair(row.into(), col.into())
    }
}

/// Normalize a coordinate expression
///
/// `default_col` is used when the expression names no column.
pub fn parse_coord(input: &CoordInput, default_col: i64) -> Result<Coord> {
    let coord = match input {
        CoordInput::Append | CoordInput::Row(0) => Coord::append(default_col),
        CoordInput::Row(r) => Coord::new(Some(*r), default_col),
        CoordInput::Text(text) => parse_text(text, default_col)?,
        CoordInput::Pair(row, col) => {
            let row = match row {
                RowSpec::New => None,
                RowSpec::At(r) => Some(*r),
                RowSpec::Text(t) => parse_row_token(t)?,
            };
            Coord::new(row, col.to_index()?)
        }
    };

    if coord.row == Some(0) || coord.col == 0 {
        return Err(RecorderError::InvalidCoordinate(format!("{:?}", input)));
    }
    Ok(coord)
}

fn parse_row_token(token: &str) -> Result<Option<i64>> {
    let token = token.trim();
    match token.to_ascii_lowercase().as_str() {
        "" | "new" | "none" | "newline" => Ok(None),
        _ => token
            .parse::<i64>()
            .map(Some)
            .map_err(|_| RecorderError::InvalidCoordinate(format!("row '{}'", token))),
    }
}

fn parse_text(text: &str, default_col: i64) -> Result<Coord> {
    let invalid = || RecorderError::InvalidCoordinate(format!("'{}'", text));
    let text = text.trim();

    if text.is_empty() {
        return Ok(Coord::append(default_col));
    }

    if let Some((row, col)) = text.split_once(',') {
        let row = parse_row_token(row)?;
        let col = ColSpec::Letters(col.trim().to_string()).to_index()?;
        return Ok(Coord::new(row, col));
    }

    if text.chars().all(|c| c.is_ascii_alphabetic()) {
        return Ok(Coord::append(letter_to_col(text)? as i64));
    }

    if let Ok(row) = text.parse::<i64>() {
        return Ok(Coord::new(Some(row), default_col));
    }

    let cleaned: String = text.chars().filter(|c| *c != '$').collect();
    let split = cleaned
        .find(|c: char| !c.is_ascii_alphabetic())
        .ok_or_else(invalid)?;

    if split > 0 {
        // Letters then digits: "A3", "A-3"
        let (letters, digits) = cleaned.split_at(split);
        let row = digits.parse::<i64>().map_err(|_| invalid())?;
        return Ok(Coord::new(Some(row), letter_to_col(letters)? as i64));
    }

    // Digits then letters: "3A", "-3A"
    let split = cleaned
        .find(|c: char| c.is_ascii_alphabetic())
        .ok_or_else(invalid)?;
    let (digits, letters) = cleaned.split_at(split);
    if !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(invalid());
    }
    let row = digits.parse::<i64>().map_err(|_| invalid())?;
    Ok(Coord::new(Some(row), letter_to_col(letters)? as i64))
}

/// Convert a 1-based column number to letters (1 -> A, 26 -> Z, 27 -> AA)
pub fn col_to_letter(col: u32) -> String {
    let mut result = String::new();
    let mut col = col;

    while col > 0 {
        col -= 1;
        result.insert(0, (b'A' + (col % 26) as u8) as char);
        col /= 26;
    }

    result
}

/// Convert column letters to a 1-based column number, case-insensitive
pub fn letter_to_col(letters: &str) -> Result<u32> {
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(RecorderError::InvalidCoordinate(format!(
            "'{}' is not a column",
            letters
        )));
    }
    letters.chars().try_fold(0u32, |acc, c| {
        let digit = (c.to_ascii_uppercase() as u8 - b'A' + 1) as u32;
        acc.checked_mul(26)
            .and_then(|v| v.checked_add(digit))
            .ok_or_else(|| RecorderError::InvalidCoordinate(format!("'{}' overflows", letters)))
    })
}

/// `"A1"`-style address for a resolved cell
pub fn cell_address(row: u32, col: u32) -> String {
    format!("{}{}", col_to_letter(col), row)
}

/// Parse a column span: `"B"`, `"2"`, `"A:C"` or `"1:3"`
pub fn parse_col_span(span: &str) -> Result<(u32, u32)> {
    let one = |s: &str| -> Result<u32> {
        let idx = ColSpec::Letters(s.trim().to_string()).to_index()?;
        u32::try_from(idx).map_err(|_| {
            RecorderError::InvalidCoordinate(format!("column span '{}' must be positive", span))
        })
    };
    let (first, last) = match span.split_once(':') {
        Some((a, b)) => (one(a)?, one(b)?),
        None => {
            let c = one(span)?;
            (c, c)
        }
    };
    Ok((first.min(last), first.max(last)))
}
