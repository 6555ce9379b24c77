//! User-facing error message formatting.
//!
//! Uses typed error matching (SourceError variants, csv error kinds, io::ErrorKind) rather than
//! string parsing to produce short, actionable messages for the status line.

use crate::source::SourceError;
use std::io;
use std::path::Path;

/// Format a SourceError as a user-facing message by matching on its variant.
pub fn user_message_from_source(err: &SourceError) -> String {
    match err {
        SourceError::NotFound(path) => format!("File not found: {}", path.display()),
        SourceError::NotAFile(path) => {
            format!("Path is a directory, not a file: {}", path.display())
        }
        SourceError::UnsupportedFormat(what) => format!(
            "Unsupported file format: {}. Supported: csv, tsv, psv (optionally compressed) and xls/xlsx/xlsm/xlsb.",
            what
        ),
        SourceError::Io(e) => user_message_from_io(e, None),
        SourceError::Csv(e) => user_message_from_csv(e),
        SourceError::Excel(e) => format!("Could not read workbook: {}", e),
        SourceError::EmptyWorkbook => "Workbook has no worksheets.".to_string(),
        SourceError::SheetNotFound(sel) => {
            format!("No sheet named or numbered '{}' in workbook.", sel)
        }
    }
}

/// Format a csv::Error, including the line number when the reader knows it.
pub fn user_message_from_csv(err: &csv::Error) -> String {
    let line = err
        .position()
        .map(|p| format!(" (line {})", p.line()))
        .unwrap_or_default();
    match err.kind() {
        csv::ErrorKind::Io(e) => user_message_from_io(e, None),
        csv::ErrorKind::Utf8 { .. } => format!("Invalid UTF-8 in delimited file{}.", line),
        csv::ErrorKind::UnequalLengths { .. } => {
            format!("Record has an unexpected number of fields{}.", line)
        }
        _ => format!("Could not parse delimited file{}: {}", line, err),
    }
}

/// Format an io::Error as a user-facing message by matching on ErrorKind.
pub fn user_message_from_io(err: &io::Error, context: Option<&str>) -> String {
    use std::io::ErrorKind;

    let base: String = match err.kind() {
        ErrorKind::NotFound => "File or directory not found.".to_string(),
        ErrorKind::PermissionDenied => "Permission denied. Check read access.".to_string(),
        ErrorKind::InvalidData | ErrorKind::InvalidInput => {
            "Invalid or corrupted data.".to_string()
        }
        ErrorKind::UnexpectedEof => "Unexpected end of file.".to_string(),
        ErrorKind::Interrupted => "Operation interrupted.".to_string(),
        ErrorKind::OutOfMemory => "Out of memory.".to_string(),
        ErrorKind::Other => {
            let msg = err.to_string();
            if msg.contains("No space left") {
                return "No space left on device. Free up disk space and try again.".to_string();
            }
            if msg.contains("Is a directory") {
                return "Path is a directory, not a file.".to_string();
            }
            return if context.is_some() {
                format!("I/O error: {}", msg)
            } else {
                msg
            };
        }
        _ => err.to_string(),
    };

    match context {
        Some(ctx) if !ctx.is_empty() => format!("{} {}", base, ctx),
        _ => base,
    }
}

/// Format a color_eyre Report by downcasting to known error types.
/// Walks the cause chain to find SourceError or io::Error.
pub fn user_message_from_report(report: &color_eyre::eyre::Report, path: Option<&Path>) -> String {
    let with_path = |msg: String| match path {
        Some(p) => format!("Failed to load {}: {}", p.display(), msg),
        None => msg,
    };

    for cause in report.chain() {
        if let Some(se) = cause.downcast_ref::<SourceError>() {
            return with_path(user_message_from_source(se));
        }
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            return with_path(user_message_from_io(io_err, None));
        }
    }

    // Fallback: use first line of display to avoid long tracebacks
    let display = report.to_string();
    let first_line = display.lines().next().unwrap_or("An error occurred");
    with_path(first_line.trim().to_string())
}
