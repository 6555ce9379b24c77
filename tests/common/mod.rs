#![allow(dead_code)]

use sheetplot::channel::{Envelope, ParserEvent};
use sheetplot::ingest::row::RawRow;
use std::io::Write;
use std::path::PathBuf;
use tempfile::TempDir;

/// Write `content` to `name` inside a fresh temp dir. Keep the TempDir alive while using the path.
pub fn write_temp_file(name: &str, content: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join(name);
    std::fs::write(&path, content).expect("Failed to write test file");
    (dir, path)
}

/// `t,value,label` with `rows` data rows: t = i, value = i * 2, label = row_i
pub fn numbered_csv(rows: usize) -> String {
    let mut out = String::from("t,value,label\n");
    for i in 0..rows {
        out.push_str(&format!("{},{},row_{}\n", i, i * 2, i));
    }
    out
}

pub fn gzip_file(name: &str, content: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join(name);
    let file = std::fs::File::create(&path).expect("Failed to create gzip file");
    let mut encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
    encoder
        .write_all(content.as_bytes())
        .expect("Failed to write gzip data");
    encoder.finish().expect("Failed to finish gzip stream");
    (dir, path)
}

/// Two-sheet workbook.
///
/// `Summary` holds `k` / `only`. `Sales` holds `t, amount, when, note` with three rows:
/// t = i, amount = 1.5 * (i + 1), when = 2024-01-02 (date formatted), note set on the first row only.
pub fn sales_workbook() -> (TempDir, PathBuf) {
    use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};

    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("sales.xlsx");
    let mut workbook = Workbook::new();

    let summary = workbook.add_worksheet();
    summary.set_name("Summary").expect("sheet name");
    summary.write_string(0, 0, "k").expect("write header");
    summary.write_string(1, 0, "only").expect("write cell");

    let sales = workbook.add_worksheet();
    sales.set_name("Sales").expect("sheet name");
    for (col, header) in ["t", "amount", "when", "note"].iter().enumerate() {
        sales
            .write_string(0, col as u16, *header)
            .expect("write header");
    }
    let date_format = Format::new().set_num_format("yyyy-mm-dd");
    let when = ExcelDateTime::from_ymd(2024, 1, 2).expect("valid date");
    for i in 0..3u32 {
        let row = i + 1;
        sales.write_number(row, 0, i as f64).expect("write t");
        sales
            .write_number(row, 1, 1.5 * (i as f64 + 1.0))
            .expect("write amount");
        sales
            .write_datetime_with_format(row, 2, &when, &date_format)
            .expect("write date");
    }
    sales.write_string(1, 3, "first").expect("write note");

    workbook.save(&path).expect("Failed to save workbook");
    (dir, path)
}

pub fn raw(fields: &[&str]) -> RawRow {
    fields.iter().map(|f| Some(f.to_string())).collect()
}

/// `n` rows of `[i]` starting at `start`
pub fn raw_rows(start: usize, n: usize) -> Vec<RawRow> {
    (start..start + n).map(|i| vec![Some(i.to_string())]).collect()
}

pub fn envelope(generation: u64, event: ParserEvent) -> Envelope {
    Envelope { generation, event }
}
