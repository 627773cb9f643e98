//! Spreadsheet backend built on umya-spreadsheet
//!
//! The workbook is loaded, edited in memory and saved once per flush. Each
//! target is a sheet; the default target is the first sheet.

use super::FlushContext;
use crate::buffer::{Entry, StyleTarget};
use crate::config::RecorderConfig;
use crate::coord::{cell_address, resolve_index};
use crate::error::{RecorderError, Result};
use crate::header::Header;
use crate::types::{CellStyle, CellValue, Record};
use indexmap::IndexMap;
use std::borrow::Cow;
use std::path::Path;
use umya_spreadsheet::structs::drawing::spreadsheet::MarkerType;
use umya_spreadsheet::{Border, Hyperlink, Image, Spreadsheet, Style, Worksheet};

fn is_illegal(c: char) -> bool {
    matches!(c, '\u{0}'..='\u{8}' | '\u{b}'..='\u{c}' | '\u{e}'..='\u{1f}')
}

/// Strip control characters the file format cannot store
pub(crate) fn clean_text(s: &str) -> Cow<'_, str> {
    if s.chars().any(is_illegal) {
        Cow::Owned(s.chars().filter(|c| !is_illegal(*c)).collect())
    } else {
        Cow::Borrowed(s)
    }
}

fn write_value(ws: &mut Worksheet, col: u32, row: u32, value: &CellValue) {
    if value.is_empty() {
        // Only clear cells that already exist
        if ws.get_cell((col, row)).is_some() {
            ws.get_cell_mut((col, row)).set_blank();
        }
        return;
    }
    let cell = ws.get_cell_mut((col, row));
    match value {
        CellValue::String(s) => {
            cell.set_value_string(clean_text(s).into_owned());
        }
        CellValue::Int(i) => {
            cell.set_value_number(*i as f64);
        }
        CellValue::Float(f) | CellValue::DateTime(f) => {
            cell.set_value_number(*f);
        }
        CellValue::Bool(b) => {
            cell.set_value_bool(*b);
        }
        CellValue::Formula(f) => {
            cell.set_formula(f.trim_start_matches('=').to_string());
        }
        CellValue::Error(e) => {
            cell.set_value_string(format!("ERROR: {}", clean_text(e)));
        }
        CellValue::Empty => {}
    }
}

/// Apply the properties `style` sets onto `target`
pub(crate) fn apply_style(target: &mut Style, style: &CellStyle) {
    let font = target.get_font_mut();
    if let Some(bold) = style.bold {
        font.set_bold(bold);
    }
    if let Some(italic) = style.italic {
        font.set_italic(italic);
    }
    if let Some(underline) = style.underline {
        font.set_underline(if underline { "single" } else { "none" });
    }
    if let Some(size) = style.font_size {
        font.set_size(size);
    }
    if let Some(color) = &style.font_color {
        font.get_color_mut().set_argb(color.clone());
    }
    if let Some(fill) = &style.fill_color {
        target.set_background_color(fill.clone());
    }
    if let Some(code) = &style.number_format {
        target.get_number_format_mut().set_format_code(code.clone());
    }
    if let Some(border) = style.border {
        let kind = if border {
            Border::BORDER_THIN
        } else {
            Border::BORDER_NONE
        };
        let borders = target.get_borders_mut();
        borders.get_left_mut().set_border_style(kind);
        borders.get_right_mut().set_border_style(kind);
        borders.get_top_mut().set_border_style(kind);
        borders.get_bottom_mut().set_border_style(kind);
    }
}

fn style_cell(ws: &mut Worksheet, col: u32, row: u32, style: Option<&CellStyle>, replace: bool) {
    let cell = ws.get_cell_mut((col, row));
    if replace {
        cell.set_style(Style::default());
    }
    if let Some(style) = style {
        apply_style(cell.get_style_mut(), style);
    }
}

/// Header stored at the configured header row of a sheet
pub(crate) fn read_header(ws: &Worksheet, header_row: u32) -> Header {
    if header_row == 0 {
        return Header::positional();
    }
    let cols = ws.get_highest_column();
    Header::from_existing((1..=cols).map(|c| Some(ws.get_value((c, header_row)))))
}

fn write_header(ws: &mut Worksheet, header: &Header, header_row: u32) {
    let values = header.to_values();
    for (i, value) in values.iter().enumerate() {
        write_value(ws, i as u32 + 1, header_row, value);
    }
    // Clear stale names past the end of the header
    for col in values.len() as u32 + 1..=ws.get_highest_column() {
        write_value(ws, col, header_row, &CellValue::Empty);
    }
}

/// Decorate a row that did not exist before this flush
fn decorate_new_row(ws: &mut Worksheet, config: &RecorderConfig, row: u32, template: u32, cols: &[u32]) {
    let styles = &config.row_styles;
    if styles.follow && template > 0 {
        for col in 1..=ws.get_highest_column() {
            if let Some(style) = ws.get_cell((col, template)).map(|c| c.get_style().clone()) {
                ws.get_cell_mut((col, row)).set_style(style);
            }
        }
        if let Some(height) = ws.get_row_dimension(&template).map(|r| *r.get_height()) {
            if height > 0.0 {
                ws.get_row_dimension_mut(&row).set_height(height);
            }
        }
    }
    if let Some(style) = &styles.style {
        for col in cols {
            apply_style(ws.get_cell_mut((*col, row)).get_style_mut(), style);
        }
    }
    if let Some(height) = styles.height {
        ws.get_row_dimension_mut(&row).set_height(height);
    }
}

/// Drawing units per pixel
const EMU_PER_PIXEL: f64 = 9525.0;

/// Image extent after applying a requested size in pixels
///
/// With one dimension given the other follows the aspect ratio.
pub(crate) fn scaled_extent(
    cx: i64,
    cy: i64,
    width: Option<f64>,
    height: Option<f64>,
) -> (i64, i64) {
    let emu = |px: f64| (px * EMU_PER_PIXEL).round() as i64;
    let ratio =
        |part: i64, whole: i64, to: i64| (part as f64 * to as f64 / whole as f64).round() as i64;
    match (width, height) {
        (Some(w), Some(h)) => (emu(w), emu(h)),
        (Some(w), None) if cx > 0 => (emu(w), ratio(cy, cx, emu(w))),
        (None, Some(h)) if cy > 0 => (ratio(cx, cy, emu(h)), emu(h)),
        _ => (cx, cy),
    }
}

fn load_image(
    path: &Path,
    marker: MarkerType,
    width: Option<f64>,
    height: Option<f64>,
) -> Result<Image> {
    if !path.is_file() {
        return Err(RecorderError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("image {} not found", path.display()),
        )));
    }
    let mut image = Image::default();
    image.new_image(&path.to_string_lossy(), marker);
    if let Some(anchor) = image.get_one_cell_anchor_mut() {
        let extent = anchor.get_extent_mut();
        let (cx, cy) = scaled_extent(*extent.get_cx(), *extent.get_cy(), width, height);
        extent.set_cx(cx);
        extent.set_cy(cy);
    }
    Ok(image)
}

fn available_sheets(book: &Spreadsheet) -> String {
    book.get_sheet_collection()
        .iter()
        .map(|ws| ws.get_name().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Sheet for `target`, creating it when missing
///
/// A workbook created by this flush gets its blank first sheet renamed
/// instead of keeping an unused `Sheet1`.
fn sheet_mut<'b>(
    book: &'b mut Spreadsheet,
    target: Option<&str>,
    rename_blank: bool,
) -> Result<&'b mut Worksheet> {
    let Some(name) = target else {
        let available = available_sheets(book);
        return book.get_sheet_mut(&0).ok_or(RecorderError::MissingTarget {
            target: "sheet 0".to_string(),
            available,
        });
    };

    if book.get_sheet_by_name(name).is_none() {
        let blank_first = book.get_sheet_count() == 1
            && book
                .get_sheet(&0)
                .map_or(false, |ws| ws.get_highest_row() == 0);
        if rename_blank && blank_first {
            if let Some(ws) = book.get_sheet_mut(&0) {
                ws.set_name(name);
            }
        } else {
            log::debug!("creating sheet {}", name);
            book.new_sheet(name)
                .map_err(|e| RecorderError::Xlsx(e.to_string()))?;
        }
    }

    let available = available_sheets(book);
    book.get_sheet_by_name_mut(name)
        .ok_or_else(|| RecorderError::MissingTarget {
            target: name.to_string(),
            available,
        })
}

pub fn flush(
    ctx: &mut FlushContext<'_>,
    path: &Path,
    batches: IndexMap<Option<String>, Vec<Entry>>,
) -> Result<()> {
    let config = ctx.config;
    let existed = path.exists();
    let mut book = if existed {
        umya_spreadsheet::reader::xlsx::read(path)?
    } else {
        umya_spreadsheet::new_file()
    };
    let rename_blank = !existed && !batches.contains_key(&None);
    if let Some(first) = book.get_sheet(&0) {
        ctx.headers.set_default(first.get_name());
    }

    for (target, entries) in batches {
        let target = target.as_deref();
        let target_name = ctx.target_name(target).to_string();
        let ws = sheet_mut(&mut book, target, rename_blank)?;

        // Cached by sheet name, so the default target and its name agree
        let sheet_name = ws.get_name().to_string();
        let extent = ws.get_highest_row();
        let header = ctx
            .headers
            .get_or_load(Some(sheet_name.as_str()), || Ok(read_header(ws, config.header_row)))?;
        header.sync_extent(extent, config.header_row);

        if let Some(keys) = entries.iter().find_map(first_map_keys) {
            header.declare(keys);
        }
        let first_data_row = if header.is_empty() {
            1
        } else {
            config.header_row + 1
        };

        let max_col = ws.get_highest_column().max(header.len() as u32);
        let mut placement = ctx.mode.placement(extent, first_data_row);

        for entry in entries {
            match entry {
                Entry::Data { coord, record } => {
                    let col = coord.resolve_col(max_col)?;
                    let row = placement.place(coord.row, 1)?;
                    let cells = header.place(&record, col, config.auto_new_header, &target_name)?;
                    write_row(ws, config, row, extent, cells);
                }
                Entry::Block { coord, records } => {
                    let col = coord.resolve_col(max_col)?;
                    let start = placement.place(coord.row, records.len())?;
                    for (i, record) in records.iter().enumerate() {
                        let cells =
                            header.place(record, col, config.auto_new_header, &target_name)?;
                        write_row(ws, config, start + i as u32, extent, cells);
                    }
                }
                Entry::Link {
                    coord,
                    url,
                    content,
                } => {
                    let col = coord.resolve_col(max_col)?;
                    let row = placement.place(coord.row, 1)?;
                    if let Some(url) = &url {
                        let mut link = Hyperlink::default();
                        link.set_url(url.clone());
                        ws.get_cell_mut((col, row)).set_hyperlink(link);
                    }
                    match (&content, &url) {
                        (Some(value), _) => write_value(ws, col, row, value),
                        (None, Some(url)) if ws.get_value((col, row)).is_empty() => {
                            write_value(ws, col, row, &CellValue::String(url.clone()))
                        }
                        _ => {}
                    }
                    if let Some(style) = &config.row_styles.link_style {
                        apply_style(ws.get_cell_mut((col, row)).get_style_mut(), style);
                    }
                }
                Entry::Image {
                    coord,
                    path: image_path,
                    width,
                    height,
                } => {
                    let col = coord.resolve_col(max_col)?;
                    let row = placement.place(coord.row, 1)?;
                    let mut marker = MarkerType::default();
                    marker.set_coordinate(cell_address(row, col));
                    ws.add_image(load_image(&image_path, marker, width, height)?);
                }
                Entry::Style {
                    target: cells,
                    style,
                    replace,
                } => {
                    let extent = placement.extent();
                    let width = ws.get_highest_column().max(1);
                    let resolve_row = |row: Option<i64>| match row {
                        Some(r) => resolve_index(r, extent, "row"),
                        None => Ok(extent + 1),
                    };
                    let (rows, cols) = match cells {
                        StyleTarget::Cell(c) => {
                            let r = resolve_row(c.row)?;
                            let c = c.resolve_col(max_col)?;
                            ((r, r), (c, c))
                        }
                        StyleTarget::Range(a, b) => {
                            let (r1, r2) = (resolve_row(a.row)?, resolve_row(b.row)?);
                            let (c1, c2) = (a.resolve_col(max_col)?, b.resolve_col(max_col)?);
                            ((r1.min(r2), r1.max(r2)), (c1.min(c2), c1.max(c2)))
                        }
                        StyleTarget::Row(r) => {
                            let r = resolve_index(r, extent, "row")?;
                            ((r, r), (1, width))
                        }
                        StyleTarget::Col(c) => ((1, extent.max(1)), (c, c)),
                    };
                    for r in rows.0..=rows.1 {
                        for c in cols.0..=cols.1 {
                            style_cell(ws, c, r, style.as_ref(), replace);
                        }
                    }
                }
                Entry::RowHeight { row, height } => {
                    let row = resolve_index(row, placement.extent(), "row")?;
                    ws.get_row_dimension_mut(&row).set_height(height);
                }
                Entry::ColWidth { cols, width } => {
                    for col in cols.0..=cols.1 {
                        ws.get_column_dimension_by_number_mut(&col).set_width(width);
                    }
                }
                Entry::Bytes { .. } => {
                    log::trace!("spreadsheet ignores raw bytes");
                }
            }
        }

        if header.needs_rewrite() {
            log::info!("writing header row of {}", target_name);
            write_header(ws, header, config.header_row);
            header.mark_written();
        }
    }

    if let Some(first) = book.get_sheet(&0) {
        ctx.headers.set_default(first.get_name());
    }
    umya_spreadsheet::writer::xlsx::write(&book, path)?;
    Ok(())
}

/// Keys of the first keyed record, which declare an empty header
fn first_map_keys(entry: &Entry) -> Option<indexmap::map::Keys<'_, String, CellValue>> {
    let records = match entry {
        Entry::Data { record, .. } => std::slice::from_ref(record),
        Entry::Block { records, .. } => records.as_slice(),
        _ => return None,
    };
    records.iter().find_map(|r| match r {
        Record::Map(map) => Some(map.keys()),
        _ => None,
    })
}

fn write_row(
    ws: &mut Worksheet,
    config: &RecorderConfig,
    row: u32,
    extent: u32,
    cells: Vec<(u32, CellValue)>,
) {
    for (col, value) in &cells {
        write_value(ws, *col, row, value);
    }
    if row > extent {
        let cols: Vec<u32> = cells.iter().map(|(c, _)| *c).collect();
        decorate_new_row(ws, config, row, extent, &cols);
    }
}
