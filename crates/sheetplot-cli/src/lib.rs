//! Shared CLI definitions for sheetplot.
//!
//! Used by the main application and by the build script (manpage).

use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};

/// File format for data files (used to bypass extension-based detection).
/// When `--format` is not specified, format is auto-detected from the file extension.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum FileFormat {
    /// Comma-separated values
    Csv,
    /// Tab-separated values
    Tsv,
    /// Pipe-separated values
    Psv,
    /// Excel (.xls, .xlsx, .xlsm, .xlsb)
    Excel,
}

impl FileFormat {
    /// Detect file format from path extension, looking through a compression suffix
    /// (`data.csv.gz` is CSV). Returns None when extension is missing or unknown.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension().and_then(|e| e.to_str())?;
        if let Some(format) = Self::from_extension(ext) {
            return Some(format);
        }
        CompressionFormat::from_extension(path)?;
        path.file_stem()
            .map(Path::new)
            .and_then(|stem| stem.extension())
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Parse format from extension string (e.g. "csv", "xlsx").
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "tsv" | "tab" => Some(Self::Tsv),
            "psv" => Some(Self::Psv),
            "xls" | "xlsx" | "xlsm" | "xlsb" => Some(Self::Excel),
            _ => None,
        }
    }

    /// Field delimiter for delimited text formats. Excel has none.
    pub fn delimiter(self) -> Option<u8> {
        match self {
            Self::Csv => Some(b','),
            Self::Tsv => Some(b'\t'),
            Self::Psv => Some(b'|'),
            Self::Excel => None,
        }
    }
}

/// Compression format for data files
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum CompressionFormat {
    /// Gzip compression (.gz) - Most common, good balance of speed and compression
    Gzip,
    /// Zstandard compression (.zst) - Modern, fast compression with good ratios
    Zstd,
    /// Bzip2 compression (.bz2) - Good compression ratio, slower than gzip
    Bzip2,
    /// XZ compression (.xz) - Excellent compression ratio, slower than bzip2
    Xz,
}

impl CompressionFormat {
    /// Detect compression format from file extension
    pub fn from_extension(path: &Path) -> Option<Self> {
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            match ext.to_lowercase().as_str() {
                "gz" => Some(Self::Gzip),
                "zst" | "zstd" => Some(Self::Zstd),
                "bz2" | "bz" => Some(Self::Bzip2),
                "xz" => Some(Self::Xz),
                _ => None,
            }
        } else {
            None
        }
    }

    /// Get file extension for this compression format
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Gzip => "gz",
            Self::Zstd => "zst",
            Self::Bzip2 => "bz2",
            Self::Xz => "xz",
        }
    }
}

/// Command-line arguments for sheetplot
#[derive(Clone, Parser, Debug)]
#[command(
    name = "sheetplot",
    version,
    about = "Stream CSV and Excel files into a terminal line chart",
    long_about = include_str!("../long_about.txt")
)]
pub struct Args {
    /// Path to the data file to open. Without a path the open prompt is shown (press `o` to open later)
    #[arg(value_name = "PATH")]
    pub path: Option<PathBuf>,

    /// Force file format (csv, tsv, psv, excel).
    /// By default format is auto-detected from the file extension.
    #[arg(long = "format", value_enum)]
    pub format: Option<FileFormat>,

    /// Specify the compression format explicitly (gzip, zstd, bzip2, xz)
    /// If not specified, compression is auto-detected from file extension.
    #[arg(long = "compression", value_enum)]
    pub compression: Option<CompressionFormat>,

    /// Specify the delimiter to use when reading a delimited text file
    #[arg(long = "delimiter")]
    pub delimiter: Option<u8>,

    /// Excel sheet to load: 0-based index (e.g. 0) or sheet name (e.g. "Sales")
    #[arg(long = "sheet", value_name = "SHEET")]
    pub sheet: Option<String>,

    /// Number of rows the parser sends per batch (default: 500)
    #[arg(long = "batch-size", value_name = "N")]
    pub batch_size: Option<usize>,

    /// Milliseconds between flushes of pending rows into the chart (default: 250)
    #[arg(long = "flush-interval-ms", value_name = "MS")]
    pub flush_interval_ms: Option<u64>,

    /// Maximum rows moved into the chart per flush (default: 500)
    #[arg(long = "flush-chunk-size", value_name = "N")]
    pub flush_chunk_size: Option<usize>,

    /// Skip the row counting pass for delimited files (progress becomes indeterminate)
    #[arg(long = "no-count-total", action)]
    pub no_count_total: bool,

    /// Run the ingestion pipeline without a terminal and print the loaded dataset as JSON
    #[arg(long = "headless", action, requires = "path")]
    pub headless: bool,

    /// Axis column to use in headless output (default: row index)
    #[arg(long = "axis", value_name = "COLUMN", requires = "headless")]
    pub axis: Option<String>,

    /// Series column to select in headless output. Use once per column
    #[arg(long = "series", value_name = "COLUMN", requires = "headless")]
    pub series: Vec<String>,

    /// Enable debug mode to show operational information
    #[arg(long = "debug", action)]
    pub debug: bool,

    /// Clear all cache data and exit
    #[arg(long = "clear-cache", action)]
    pub clear_cache: bool,

    /// Generate default configuration file at ~/.config/sheetplot/config.toml
    #[arg(long = "generate-config", action)]
    pub generate_config: bool,

    /// Force overwrite existing config file when using --generate-config
    #[arg(long = "force", requires = "generate_config", action)]
    pub force: bool,
}

impl Args {
    /// Path is optional for the interactive UI; without one the app starts at the open prompt.
    pub fn opens_prompt(&self) -> bool {
        self.path.is_none() && !self.headless
    }
}
