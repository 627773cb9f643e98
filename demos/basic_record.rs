//! Basic recording example
//!
//! Writes the same people to csv, xlsx and jsonl, then reads back the
//! rows that still need a follow-up.

use recordstream::types::{CellStyle, CellValue};
use recordstream::{Record, Recorder};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let people = [
        ("Alice", 30, "done"),
        ("Bob", 25, ""),
        ("Carol", 41, ""),
    ];

    for path in ["demo_out/people.csv", "demo_out/people.xlsx", "demo_out/people.jsonl"] {
        let recorder = Recorder::new(path, 100);
        recorder.set().auto_new_header(true);

        for (name, age, status) in people {
            recorder.add_data(Record::map([
                ("name", CellValue::from(name)),
                ("age", CellValue::from(age)),
                ("status", CellValue::from(status)),
            ]))?;
        }

        // Spreadsheet-only operations are ignored by the other formats
        recorder.set_style("1", Some(CellStyle::header_bold()), false, None)?;
        recorder.set_col_width("A:C", 18.0, None)?;
        recorder.record()?;
        println!("Wrote {}", path);
    }

    let recorder = Recorder::new("demo_out/people.csv", 100);
    for row in recorder.rows().cols(["name"]).sign_col("status").fetch()? {
        println!("row {} still pending: {}", row.row(), row.to_strings().join(", "));
    }

    // Overwrite a cell in place; this switches the batch to slow mode
    recorder.add_data_at("done", (-1, "C"))?;
    recorder.record()?;
    println!("Marked the last row as done");

    Ok(())
}
