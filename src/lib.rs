//! # recordstream
//!
//! Buffered record writing to csv, xlsx, json, jsonl, plain text, binary
//! and SQLite files.
//!
//! ## Features
//!
//! - **Buffered writes**: submissions are cached and flushed in batches
//! - **Coordinates**: `"B3"`, `(3, "B")`, negative rows counted from the end
//! - **Header aware**: keyed records are placed by column name, and the
//!   header can grow as new keys appear
//! - **Fast and slow placement**: plain appends stream to the end of the
//!   file, explicit rows switch the batch to in-place editing
//! - **Spreadsheet extras**: links, images, styles, row heights and
//!   column widths
//! - **Thread safe**: one recorder can be shared between threads
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use recordstream::{Data, Record, Recorder};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let recorder = Recorder::new("out/people.xlsx", 1000);
//! recorder.set().auto_new_header(true);
//!
//! recorder.add_data(Record::map([("name", "Alice"), ("city", "Paris")]))?;
//! recorder.add_data(Record::map([("name", "Bob"), ("email", "bob@example.com")]))?;
//! recorder.add_data_at(Data::rows([["x", "y"], ["z", "w"]]), "E5")?;
//! recorder.record()?;
//!
//! for row in recorder.rows().cols(["name"]).fetch()? {
//!     println!("{}: {:?}", row.row(), row.values());
//! }
//! # Ok(())
//! # }
//! ```

pub mod backends;
pub mod backup;
pub mod buffer;
pub mod codec;
pub mod config;
pub mod coord;
pub mod error;
pub mod header;
pub mod reader;
pub mod recorder;
pub mod setter;
pub mod types;

pub use buffer::Mode;
pub use config::{FileType, RecorderConfig};
pub use coord::{Coord, CoordInput};
pub use error::{RecorderError, Result};
pub use reader::{RowData, RowsQuery};
pub use recorder::Recorder;
pub use setter::Setter;
pub use types::{CellStyle, CellValue, Data, Record};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_value_types() {
        let values = [
            CellValue::from("text"),
            CellValue::from(42),
            CellValue::from(2.5),
            CellValue::from(true),
            CellValue::Empty,
        ];
        let strings: Vec<String> = values.iter().map(|v| v.as_string()).collect();
        assert_eq!(strings, vec!["text", "42", "2.5", "true", ""]);
    }

    #[test]
    fn test_file_type_reexport() {
        let recorder = Recorder::new("report.jsonl", 0);
        assert_eq!(recorder.file_type(), Some(FileType::Jsonl));
        assert_eq!(recorder.mode(), Mode::Fast);
    }
}
