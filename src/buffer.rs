//! Pending write operations and the fast/slow placement strategies

use crate::coord::{letter_to_col, parse_coord, resolve_index, Coord, CoordInput};
use crate::error::{RecorderError, Result};
use crate::types::{CellStyle, CellValue, Record};
use indexmap::IndexMap;
use std::path::PathBuf;

/// Cells a style operation covers
#[derive(Debug, Clone, PartialEq)]
pub enum StyleTarget {
    Cell(Coord),
    /// Inclusive rectangle between two corners
    Range(Coord, Coord),
    Row(i64),
    Col(u32),
}

impl StyleTarget {
    /// Parse `"B3"`, `"A1:C3"`, `"4"` (whole row) or `"C"` (whole column)
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        if let Some((a, b)) = text.split_once(':') {
            let a = parse_coord(&CoordInput::from(a), 1)?;
            let b = parse_coord(&CoordInput::from(b), 1)?;
            if a.row.is_none() || b.row.is_none() {
                return Err(RecorderError::InvalidCoordinate(format!(
                    "range '{}' needs rows on both corners",
                    text
                )));
            }
            return Ok(StyleTarget::Range(a, b));
        }
        if let Ok(row) = text.parse::<i64>() {
            if row == 0 {
                return Err(RecorderError::InvalidCoordinate("row 0".to_string()));
            }
            return Ok(StyleTarget::Row(row));
        }
        if !text.is_empty() && text.chars().all(|c| c.is_ascii_alphabetic()) {
            return Ok(StyleTarget::Col(letter_to_col(text)?));
        }
        Ok(StyleTarget::Cell(parse_coord(&CoordInput::from(text), 1)?))
    }
}

/// One buffered operation
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    /// One record at a coordinate
    Data { coord: Coord, record: Record },
    /// Consecutive rows starting at a coordinate
    Block { coord: Coord, records: Vec<Record> },
    /// Hyperlink and/or display value
    Link {
        coord: Coord,
        url: Option<String>,
        content: Option<CellValue>,
    },
    Image {
        coord: Coord,
        path: PathBuf,
        width: Option<f64>,
        height: Option<f64>,
    },
    /// `None` style with `replace` resets to the default style
    Style {
        target: StyleTarget,
        style: Option<CellStyle>,
        replace: bool,
    },
    RowHeight { row: i64, height: f64 },
    ColWidth { cols: (u32, u32), width: f64 },
    /// Raw bytes, appended or written at an absolute offset
    Bytes { data: Vec<u8>, seek: Option<u64> },
}

impl Entry {
    /// Number of rows a data entry spans
    pub fn height(&self) -> usize {
        match self {
            Entry::Block { records, .. } => records.len(),
            _ => 1,
        }
    }
}

/// Flush strategy for the current epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Strict append after the last row
    #[default]
    Fast,
    /// Random access against the live extent
    Slow,
}

impl Mode {
    /// Placement strategy for a target whose last used row is `extent`
    ///
    /// `first_data_row` keeps appended rows below the header.
    pub fn placement(self, extent: u32, first_data_row: u32) -> Box<dyn Placement> {
        match self {
            Mode::Fast => Box::new(FastPlacement {
                next: extent.max(first_data_row.saturating_sub(1)) + 1,
            }),
            Mode::Slow => Box::new(SlowPlacement {
                extent,
                first_data_row,
            }),
        }
    }
}

/// Decides which rows a data entry lands on
pub trait Placement {
    /// First row for an entry spanning `height` rows at `row`
    fn place(&mut self, row: Option<i64>, height: usize) -> Result<u32>;

    /// Last row written or known so far
    fn extent(&self) -> u32;
}

/// Append-only placement: a running "next free row" counter
#[derive(Debug)]
pub struct FastPlacement {
    next: u32,
}

impl Placement for FastPlacement {
    fn place(&mut self, _row: Option<i64>, height: usize) -> Result<u32> {
        let start = self.next;
        self.next += height as u32;
        Ok(start)
    }

    fn extent(&self) -> u32 {
        self.next - 1
    }
}

/// Random-access placement resolved against the live extent
#[derive(Debug)]
pub struct SlowPlacement {
    extent: u32,
    first_data_row: u32,
}

impl Placement for SlowPlacement {
    fn place(&mut self, row: Option<i64>, height: usize) -> Result<u32> {
        let start = match row {
            None => self.extent.max(self.first_data_row.saturating_sub(1)) + 1,
            Some(r) => resolve_index(r, self.extent, "row")?,
        };
        let end = start + (height.max(1) as u32) - 1;
        self.extent = self.extent.max(end);
        Ok(start)
    }

    fn extent(&self) -> u32 {
        self.extent
    }
}

/// Ordered per-target log of pending operations
#[derive(Debug, Default)]
pub struct Buffer {
    entries: IndexMap<Option<String>, Vec<Entry>>,
    count: usize,
    mode: Mode,
}

impl Buffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry counting as `weight` toward the flush threshold
    pub fn push(&mut self, target: Option<String>, entry: Entry, weight: usize) {
        self.entries.entry(target).or_default().push(entry);
        self.count += weight;
    }

    /// Pending count across all targets
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.entries.values().all(Vec::is_empty)
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Switch to slow placement for the rest of this epoch
    pub fn force_slow(&mut self) {
        if self.mode == Mode::Fast {
            log::debug!("switching to slow mode until next flush");
        }
        self.mode = Mode::Slow;
    }

    /// Drain everything and start a new fast epoch
    pub fn take(&mut self) -> (Mode, IndexMap<Option<String>, Vec<Entry>>) {
        let mode = std::mem::take(&mut self.mode);
        self.count = 0;
        (mode, std::mem::take(&mut self.entries))
    }

    /// Drop pending entries without writing them
    pub fn clear(&mut self) {
        self.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fast_placement_counts_up() {
        let mut p = Mode::Fast.placement(5, 2);
        assert_eq!(p.place(None, 1).unwrap(), 6);
        assert_eq!(p.place(None, 3).unwrap(), 7);
        assert_eq!(p.place(None, 1).unwrap(), 10);
        assert_eq!(p.extent(), 10);
    }

    #[test]
    fn test_fast_placement_skips_header() {
        let mut p = Mode::Fast.placement(0, 2);
        assert_eq!(p.place(None, 1).unwrap(), 2);
    }

    #[test]
    fn test_slow_placement_resolves_negative_rows() {
        let mut p = Mode::Slow.placement(5, 2);
        assert_eq!(p.place(Some(-1), 1).unwrap(), 5);
        assert_eq!(p.place(Some(9), 1).unwrap(), 9);
        assert_eq!(p.extent(), 9);
        assert_eq!(p.place(None, 2).unwrap(), 10);
        assert_eq!(p.extent(), 11);
        assert!(p.place(Some(-20), 1).is_err());
    }

    #[test]
    fn test_take_resets_epoch() {
        let mut buffer = Buffer::new();
        buffer.push(
            None,
            Entry::RowHeight {
                row: 1,
                height: 20.0,
            },
            1,
        );
        buffer.push(
            Some("b".to_string()),
            Entry::ColWidth {
                cols: (1, 2),
                width: 9.0,
            },
            1,
        );
        buffer.force_slow();
        assert_eq!(buffer.count(), 2);

        let (mode, batches) = buffer.take();
        assert_eq!(mode, Mode::Slow);
        assert_eq!(batches.len(), 2);
        assert_eq!(buffer.count(), 0);
        assert_eq!(buffer.mode(), Mode::Fast);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_style_targets() {
        assert_eq!(
            StyleTarget::parse("B3").unwrap(),
            StyleTarget::Cell(Coord::new(Some(3), 2))
        );
        assert_eq!(StyleTarget::parse("4").unwrap(), StyleTarget::Row(4));
        assert_eq!(StyleTarget::parse("c").unwrap(), StyleTarget::Col(3));
        assert!(matches!(
            StyleTarget::parse("A1:C3").unwrap(),
            StyleTarget::Range(_, _)
        ));
        assert!(StyleTarget::parse("A:C").is_err());
    }
}
