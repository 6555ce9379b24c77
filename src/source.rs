//! Streaming file parser.
//!
//! [`start_streaming_parse`] checks the path and format on the caller's thread, then spawns a
//! parser thread that pushes one schema, at most one total, row batches in file order, and a
//! final `Finished` or `Failed` through an [`EventSink`].

use crate::channel::{Closed, EventSink, ParserEvent};
use crate::error_display::user_message_from_source;
use crate::ingest::row::RawRow;
use calamine::{open_workbook_auto, Data, DataType, Reader};
use sheetplot_cli::{CompressionFormat, FileFormat};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Rows per `Rows` event unless configured otherwise
pub const DEFAULT_BATCH_SIZE: usize = 500;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Not a regular file: {}", .0.display())]
    NotAFile(PathBuf),
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("Excel: {0}")]
    Excel(#[from] calamine::Error),
    #[error("Excel file has no worksheets")]
    EmptyWorkbook,
    #[error("Excel: no sheet named or numbered '{0}'")]
    SheetNotFound(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamOptions {
    pub format: Option<FileFormat>,
    pub compression: Option<CompressionFormat>,
    pub delimiter: Option<u8>,
    /// 0-based index or sheet name; first sheet when unset
    pub sheet: Option<String>,
    pub batch_size: usize,
    /// Count delimited records up front so progress has a denominator
    pub count_total: bool,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            format: None,
            compression: None,
            delimiter: None,
            sheet: None,
            batch_size: DEFAULT_BATCH_SIZE,
            count_total: true,
        }
    }
}

impl StreamOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_format(mut self, format: FileFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_compression(mut self, compression: CompressionFormat) -> Self {
        self.compression = Some(compression);
        self
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = Some(delimiter);
        self
    }

    pub fn with_sheet(mut self, sheet: impl Into<String>) -> Self {
        self.sheet = Some(sheet.into());
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_count_total(mut self, count_total: bool) -> Self {
        self.count_total = count_total;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
enum SourceKind {
    Delimited {
        delimiter: u8,
        compression: Option<CompressionFormat>,
    },
    Excel {
        sheet: Option<String>,
    },
}

#[derive(Debug, Clone)]
struct ParsePlan {
    path: PathBuf,
    kind: SourceKind,
    batch_size: usize,
    count_total: bool,
}

/// Why the parser thread stopped before completing.
enum Halt {
    Closed,
    Failed(SourceError),
}

impl From<Closed> for Halt {
    fn from(_: Closed) -> Self {
        Halt::Closed
    }
}

impl From<SourceError> for Halt {
    fn from(e: SourceError) -> Self {
        Halt::Failed(e)
    }
}

impl From<csv::Error> for Halt {
    fn from(e: csv::Error) -> Self {
        Halt::Failed(e.into())
    }
}

impl From<std::io::Error> for Halt {
    fn from(e: std::io::Error) -> Self {
        Halt::Failed(e.into())
    }
}

impl From<calamine::Error> for Halt {
    fn from(e: calamine::Error) -> Self {
        Halt::Failed(e.into())
    }
}

/// Start parsing `path` on a background thread.
///
/// Path, format and open errors are returned directly; errors found while reading are reported
/// through the sink as `ParserEvent::Failed`.
pub fn start_streaming_parse(
    path: &Path,
    options: &StreamOptions,
    sink: EventSink,
) -> Result<JoinHandle<()>, SourceError> {
    let plan = resolve(path, options)?;
    let handle = thread::Builder::new()
        .name("sheetplot-parser".to_string())
        .spawn(move || run_parser(plan, sink))?;
    Ok(handle)
}

fn resolve(path: &Path, options: &StreamOptions) -> Result<ParsePlan, SourceError> {
    let metadata = std::fs::metadata(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => SourceError::NotFound(path.to_path_buf()),
        _ => SourceError::Io(e),
    })?;
    if !metadata.is_file() {
        return Err(SourceError::NotAFile(path.to_path_buf()));
    }

    let format = options
        .format
        .or_else(|| FileFormat::from_path(path))
        .ok_or_else(|| SourceError::UnsupportedFormat(describe_extension(path)))?;
    let compression = options
        .compression
        .or_else(|| CompressionFormat::from_extension(path));

    // Surface permission problems before the session starts
    File::open(path)?;

    let kind = match format {
        FileFormat::Excel => {
            if let Some(c) = compression {
                return Err(SourceError::UnsupportedFormat(format!(
                    "compressed Excel workbook (.{})",
                    c.extension()
                )));
            }
            SourceKind::Excel {
                sheet: options.sheet.clone(),
            }
        }
        delimited => SourceKind::Delimited {
            delimiter: options
                .delimiter
                .or_else(|| delimited.delimiter())
                .unwrap_or(b','),
            compression,
        },
    };

    Ok(ParsePlan {
        path: path.to_path_buf(),
        kind,
        batch_size: options.batch_size.max(1),
        count_total: options.count_total,
    })
}

fn describe_extension(path: &Path) -> String {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!(".{}", ext),
        None => "file has no extension (use --format)".to_string(),
    }
}

fn run_parser(plan: ParsePlan, sink: EventSink) {
    let generation = sink.generation();
    info!(generation, path = %plan.path.display(), "parser started");

    let result = match &plan.kind {
        SourceKind::Delimited {
            delimiter,
            compression,
        } => stream_delimited(&plan, *delimiter, *compression, &sink),
        SourceKind::Excel { sheet } => stream_excel(&plan, sheet.as_deref(), &sink),
    };

    match result {
        Ok(rows) => {
            info!(generation, rows, "parser finished");
            let _ = sink.emit(ParserEvent::Finished);
        }
        Err(Halt::Closed) => debug!(generation, "parser stopped: subscription closed"),
        Err(Halt::Failed(e)) => {
            warn!(generation, error = %e, "parser failed");
            let _ = sink.emit(ParserEvent::Failed(user_message_from_source(&e)));
        }
    }
}

/// Groups rows into fixed-size `Rows` events.
struct Batcher<'a> {
    sink: &'a EventSink,
    batch: Vec<RawRow>,
    size: usize,
    sent: usize,
}

impl<'a> Batcher<'a> {
    fn new(sink: &'a EventSink, size: usize) -> Self {
        Self {
            sink,
            batch: Vec::with_capacity(size),
            size,
            sent: 0,
        }
    }

    fn push(&mut self, row: RawRow) -> Result<(), Closed> {
        self.batch.push(row);
        if self.batch.len() >= self.size {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Closed> {
        if self.batch.is_empty() {
            return Ok(());
        }
        let rows = std::mem::replace(&mut self.batch, Vec::with_capacity(self.size));
        self.sent += rows.len();
        self.sink.emit(ParserEvent::Rows(rows))
    }

    /// Send the remainder and return the number of rows sent.
    fn finish(mut self) -> Result<usize, Closed> {
        self.flush()?;
        Ok(self.sent)
    }
}

fn open_reader(
    path: &Path,
    compression: Option<CompressionFormat>,
) -> Result<Box<dyn Read + Send>, SourceError> {
    let file = BufReader::new(File::open(path)?);
    Ok(match compression {
        None => Box::new(file),
        Some(CompressionFormat::Gzip) => Box::new(flate2::read::MultiGzDecoder::new(file)),
        Some(CompressionFormat::Zstd) => Box::new(zstd::Decoder::new(file)?),
        Some(CompressionFormat::Bzip2) => Box::new(bzip2::read::BzDecoder::new(file)),
        Some(CompressionFormat::Xz) => Box::new(xz2::read::XzDecoder::new(file)),
    })
}

fn csv_reader(
    path: &Path,
    delimiter: u8,
    compression: Option<CompressionFormat>,
) -> Result<csv::Reader<Box<dyn Read + Send>>, SourceError> {
    Ok(csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(open_reader(path, compression)?))
}

/// Data records in a delimited file (header excluded).
fn count_records(
    path: &Path,
    delimiter: u8,
    compression: Option<CompressionFormat>,
) -> Result<u64, SourceError> {
    let mut reader = csv_reader(path, delimiter, compression)?;
    let mut record = csv::ByteRecord::new();
    let mut count = 0u64;
    while reader.read_byte_record(&mut record)? {
        count += 1;
    }
    Ok(count)
}

fn field_text(field: &[u8]) -> String {
    String::from_utf8_lossy(field).into_owned()
}

fn stream_delimited(
    plan: &ParsePlan,
    delimiter: u8,
    compression: Option<CompressionFormat>,
    sink: &EventSink,
) -> Result<usize, Halt> {
    let mut reader = csv_reader(&plan.path, delimiter, compression)?;
    let headers: Vec<String> = reader.byte_headers()?.iter().map(field_text).collect();
    sink.emit(ParserEvent::Schema(headers))?;

    if plan.count_total {
        let total = count_records(&plan.path, delimiter, compression)?;
        sink.emit(ParserEvent::Total(total))?;
    }

    let mut batcher = Batcher::new(sink, plan.batch_size);
    let mut record = csv::ByteRecord::new();
    while reader.read_byte_record(&mut record)? {
        batcher.push(record.iter().map(|f| Some(field_text(f))).collect())?;
    }
    Ok(batcher.finish()?)
}

/// Text of an Excel cell. Empty cells read as `""`, the same as an empty delimited field.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(_) => cell
            .as_datetime()
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| cell.to_string()),
        Data::Error(_) => cell.to_string(),
    }
}

fn stream_excel(plan: &ParsePlan, sheet: Option<&str>, sink: &EventSink) -> Result<usize, Halt> {
    let mut workbook = open_workbook_auto(&plan.path)?;
    let sheet_names = workbook.sheet_names().to_vec();
    if sheet_names.is_empty() {
        return Err(SourceError::EmptyWorkbook.into());
    }

    let range = match sheet {
        Some(sel) => {
            if let Ok(idx) = sel.parse::<usize>() {
                workbook
                    .worksheet_range_at(idx)
                    .ok_or_else(|| SourceError::SheetNotFound(sel.to_string()))??
            } else if sheet_names.iter().any(|name| name == sel) {
                workbook.worksheet_range(sel)?
            } else {
                return Err(SourceError::SheetNotFound(sel.to_string()).into());
            }
        }
        None => workbook
            .worksheet_range_at(0)
            .ok_or(SourceError::EmptyWorkbook)??,
    };

    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .map(|header| header.iter().map(cell_text).collect())
        .unwrap_or_default();
    let has_header = !headers.is_empty();
    sink.emit(ParserEvent::Schema(headers))?;
    if has_header {
        sink.emit(ParserEvent::Total(range.height().saturating_sub(1) as u64))?;
    }

    let mut batcher = Batcher::new(sink, plan.batch_size);
    for row in rows {
        batcher.push(row.iter().map(|cell| Some(cell_text(cell))).collect())?;
    }
    Ok(batcher.finish()?)
}
