use crate::chart_data::{Palette, DEFAULT_PALETTE};
use color_eyre::eyre::eyre;
use color_eyre::Result;
use ratatui::style::Color;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use supports_color::Stream;

/// Manages config directory and config file operations
#[derive(Clone)]
pub struct ConfigManager {
    pub(crate) config_dir: PathBuf,
}

impl ConfigManager {
    /// Create a ConfigManager with a custom config directory (primarily for testing)
    pub fn with_dir(config_dir: PathBuf) -> Self {
        Self { config_dir }
    }

    /// Create a new ConfigManager for the given app name
    pub fn new(app_name: &str) -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| eyre!("Could not determine config directory"))?
            .join(app_name);

        Ok(Self { config_dir })
    }

    /// Get the config directory path
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Get path to a specific config file or subdirectory
    pub fn config_path(&self, path: &str) -> PathBuf {
        self.config_dir.join(path)
    }

    /// Ensure the config directory exists
    pub fn ensure_config_dir(&self) -> Result<()> {
        if !self.config_dir.exists() {
            std::fs::create_dir_all(&self.config_dir)?;
        }
        Ok(())
    }

    /// Generate default configuration template as a string
    pub fn generate_default_config(&self) -> String {
        DEFAULT_CONFIG_TEMPLATE.to_string()
    }

    /// Write default configuration to config file
    pub fn write_default_config(&self, force: bool) -> Result<PathBuf> {
        let config_path = self.config_path("config.toml");

        if config_path.exists() && !force {
            return Err(eyre!(
                "Config file already exists at {}. Use --force to overwrite.",
                config_path.display()
            ));
        }

        self.ensure_config_dir()?;
        std::fs::write(&config_path, DEFAULT_CONFIG_TEMPLATE)?;

        Ok(config_path)
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Configuration format version (for future compatibility)
    pub version: String,
    pub file_loading: FileLoadingConfig,
    pub ingest: IngestConfig,
    pub performance: PerformanceConfig,
    pub chart: ChartConfig,
    pub theme: ThemeConfig,
    pub history: HistoryConfig,
    pub logging: LoggingConfig,
    pub debug: DebugConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLoadingConfig {
    pub delimiter: Option<u8>,
    pub compression: Option<String>,
    pub sheet: Option<String>,
    pub batch_size: usize,
    pub count_total: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub flush_interval_ms: u64,
    pub flush_chunk_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    pub event_poll_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    pub palette: Vec<String>,
    pub streaming_opacity: f64,
    pub max_render_points: usize,
    pub export_width: u32,
    pub export_height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeConfig {
    pub color_mode: String,
    pub colors: ColorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorConfig {
    pub keybind_hints: String,
    pub keybind_labels: String,
    pub primary: String,
    pub success: String,
    pub error: String,
    pub warning: String,
    pub dimmed: String,
    pub background: String,
    pub controls_bg: String,
    pub text_primary: String,
    pub text_secondary: String,
    pub sidebar_border: String,
    pub sidebar_border_active: String,
    pub chart_axis: String,
    pub progress_bar: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub enabled: bool,
    pub limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DebugConfig {
    pub enabled: bool,
}

// Default implementations
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: "0.1".to_string(),
            file_loading: FileLoadingConfig::default(),
            ingest: IngestConfig::default(),
            performance: PerformanceConfig::default(),
            chart: ChartConfig::default(),
            theme: ThemeConfig::default(),
            history: HistoryConfig::default(),
            logging: LoggingConfig::default(),
            debug: DebugConfig::default(),
        }
    }
}

impl Default for FileLoadingConfig {
    fn default() -> Self {
        Self {
            delimiter: None,
            compression: None,
            sheet: None,
            batch_size: crate::source::DEFAULT_BATCH_SIZE,
            count_total: true,
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            flush_interval_ms: 250,
            flush_chunk_size: 500,
        }
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            event_poll_interval_ms: 25,
        }
    }
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            palette: DEFAULT_PALETTE.iter().map(|c| c.to_string()).collect(),
            streaming_opacity: 0.5,
            max_render_points: 4000,
            export_width: 1280,
            export_height: 720,
        }
    }
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            color_mode: "auto".to_string(),
            colors: ColorConfig::default(),
        }
    }
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            keybind_hints: "cyan".to_string(),
            keybind_labels: "indexed(252)".to_string(),
            primary: "cyan".to_string(),
            success: "green".to_string(),
            error: "red".to_string(),
            warning: "yellow".to_string(),
            dimmed: "dark_gray".to_string(),
            background: "reset".to_string(),
            controls_bg: "indexed(236)".to_string(),
            text_primary: "white".to_string(),
            text_secondary: "dark_gray".to_string(),
            sidebar_border: "dark_gray".to_string(),
            sidebar_border_active: "cyan".to_string(),
            chart_axis: "dark_gray".to_string(),
            progress_bar: "cyan".to_string(),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            limit: 100,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// Configuration loading and merging
impl AppConfig {
    /// Load configuration from all layers (default → user)
    pub fn load(app_name: &str) -> Result<Self> {
        let config_manager = ConfigManager::new(app_name)?;
        Self::load_from(&config_manager)
    }

    /// Load defaults merged with `config.toml` from the manager's directory, then validate
    pub fn load_from(config_manager: &ConfigManager) -> Result<Self> {
        let mut config = AppConfig::default();
        let user_config = Self::load_user_config(config_manager)?;
        config.merge(user_config);
        config.validate()?;
        Ok(config)
    }

    /// Load user configuration from ~/.config/sheetplot/config.toml
    fn load_user_config(config_manager: &ConfigManager) -> Result<AppConfig> {
        let config_path = config_manager.config_path("config.toml");

        if !config_path.exists() {
            return Ok(AppConfig::default());
        }

        let content = std::fs::read_to_string(&config_path).map_err(|e| {
            eyre!(
                "Failed to read config file at {}: {}",
                config_path.display(),
                e
            )
        })?;

        toml::from_str(&content).map_err(|e| {
            eyre!(
                "Failed to parse config file at {}: {}",
                config_path.display(),
                e
            )
        })
    }

    /// Merge another config into this one (other takes precedence)
    pub fn merge(&mut self, other: AppConfig) {
        if other.version != AppConfig::default().version {
            self.version = other.version;
        }

        self.file_loading.merge(other.file_loading);
        self.ingest.merge(other.ingest);
        self.performance.merge(other.performance);
        self.chart.merge(other.chart);
        self.theme.merge(other.theme);
        self.history.merge(other.history);
        self.logging.merge(other.logging);
        self.debug.merge(other.debug);
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !self.version.starts_with("0.1") {
            return Err(eyre!(
                "Unsupported config version: {}. Expected 0.1.x",
                self.version
            ));
        }

        if self.file_loading.batch_size == 0 {
            return Err(eyre!("batch_size must be greater than 0"));
        }
        if let Some(c) = &self.file_loading.compression {
            if parse_compression(c).is_none() {
                return Err(eyre!(
                    "Invalid compression: {}. Must be 'gzip', 'zstd', 'bzip2', or 'xz'",
                    c
                ));
            }
        }

        if self.ingest.flush_interval_ms == 0 {
            return Err(eyre!("flush_interval_ms must be greater than 0"));
        }
        if self.ingest.flush_chunk_size == 0 {
            return Err(eyre!("flush_chunk_size must be greater than 0"));
        }

        if self.performance.event_poll_interval_ms == 0 {
            return Err(eyre!("event_poll_interval_ms must be greater than 0"));
        }

        if !(0.0..=1.0).contains(&self.chart.streaming_opacity) {
            return Err(eyre!(
                "streaming_opacity must be between 0.0 and 1.0, got {}",
                self.chart.streaming_opacity
            ));
        }
        if self.chart.export_width == 0 || self.chart.export_height == 0 {
            return Err(eyre!("export_width and export_height must be greater than 0"));
        }
        Palette::from_hex(&self.chart.palette)
            .map_err(|e| eyre!("Invalid chart palette: {}", e))?;

        match self.theme.color_mode.as_str() {
            "light" | "dark" | "auto" => {}
            _ => {
                return Err(eyre!(
                    "Invalid color_mode: {}. Must be 'light', 'dark', or 'auto'",
                    self.theme.color_mode
                ))
            }
        }

        let parser = ColorParser::new();
        self.theme.colors.validate(&parser)?;

        if self.logging.level.parse::<tracing::Level>().is_err() {
            return Err(eyre!(
                "Invalid logging level: {}. Must be one of trace, debug, info, warn, error",
                self.logging.level
            ));
        }

        Ok(())
    }

    /// Palette from config; validated by `validate`, falls back to the default palette.
    pub fn palette(&self) -> Palette {
        Palette::from_hex(&self.chart.palette).unwrap_or_default()
    }
}

/// Compression name as written in config ("gzip", "zstd", "bzip2", "xz")
pub fn parse_compression(s: &str) -> Option<sheetplot_cli::CompressionFormat> {
    use sheetplot_cli::CompressionFormat;
    match s.trim().to_lowercase().as_str() {
        "gzip" | "gz" => Some(CompressionFormat::Gzip),
        "zstd" | "zst" => Some(CompressionFormat::Zstd),
        "bzip2" | "bz2" => Some(CompressionFormat::Bzip2),
        "xz" => Some(CompressionFormat::Xz),
        _ => None,
    }
}

// Merge implementations for each config section
impl FileLoadingConfig {
    pub fn merge(&mut self, other: Self) {
        let default = FileLoadingConfig::default();
        if other.delimiter.is_some() {
            self.delimiter = other.delimiter;
        }
        if other.compression.is_some() {
            self.compression = other.compression;
        }
        if other.sheet.is_some() {
            self.sheet = other.sheet;
        }
        if other.batch_size != default.batch_size {
            self.batch_size = other.batch_size;
        }
        if other.count_total != default.count_total {
            self.count_total = other.count_total;
        }
    }
}

impl IngestConfig {
    pub fn merge(&mut self, other: Self) {
        let default = IngestConfig::default();
        if other.flush_interval_ms != default.flush_interval_ms {
            self.flush_interval_ms = other.flush_interval_ms;
        }
        if other.flush_chunk_size != default.flush_chunk_size {
            self.flush_chunk_size = other.flush_chunk_size;
        }
    }
}

impl PerformanceConfig {
    pub fn merge(&mut self, other: Self) {
        let default = PerformanceConfig::default();
        if other.event_poll_interval_ms != default.event_poll_interval_ms {
            self.event_poll_interval_ms = other.event_poll_interval_ms;
        }
    }
}

impl ChartConfig {
    pub fn merge(&mut self, other: Self) {
        let default = ChartConfig::default();
        if other.palette != default.palette {
            self.palette = other.palette;
        }
        if other.streaming_opacity != default.streaming_opacity {
            self.streaming_opacity = other.streaming_opacity;
        }
        if other.max_render_points != default.max_render_points {
            self.max_render_points = other.max_render_points;
        }
        if other.export_width != default.export_width {
            self.export_width = other.export_width;
        }
        if other.export_height != default.export_height {
            self.export_height = other.export_height;
        }
    }
}

impl ThemeConfig {
    pub fn merge(&mut self, other: Self) {
        let default = ThemeConfig::default();
        if other.color_mode != default.color_mode {
            self.color_mode = other.color_mode;
        }
        self.colors.merge(other.colors);
    }
}

impl ColorConfig {
    /// Validate all color strings can be parsed
    fn validate(&self, parser: &ColorParser) -> Result<()> {
        for (name, value) in self.entries() {
            parser
                .parse(value)
                .map_err(|e| eyre!("Invalid color value for '{}': {}", name, e))?;
        }
        Ok(())
    }

    /// `(name, value)` for every color, in declaration order
    fn entries(&self) -> [(&'static str, &String); 15] {
        [
            ("keybind_hints", &self.keybind_hints),
            ("keybind_labels", &self.keybind_labels),
            ("primary", &self.primary),
            ("success", &self.success),
            ("error", &self.error),
            ("warning", &self.warning),
            ("dimmed", &self.dimmed),
            ("background", &self.background),
            ("controls_bg", &self.controls_bg),
            ("text_primary", &self.text_primary),
            ("text_secondary", &self.text_secondary),
            ("sidebar_border", &self.sidebar_border),
            ("sidebar_border_active", &self.sidebar_border_active),
            ("chart_axis", &self.chart_axis),
            ("progress_bar", &self.progress_bar),
        ]
    }

    pub fn merge(&mut self, other: Self) {
        let default = ColorConfig::default();

        macro_rules! merge_color {
            ($($field:ident),*) => {
                $(
                    if other.$field != default.$field {
                        self.$field = other.$field;
                    }
                )*
            };
        }

        merge_color!(
            keybind_hints,
            keybind_labels,
            primary,
            success,
            error,
            warning,
            dimmed,
            background,
            controls_bg,
            text_primary,
            text_secondary,
            sidebar_border,
            sidebar_border_active,
            chart_axis,
            progress_bar
        );
    }
}

impl HistoryConfig {
    pub fn merge(&mut self, other: Self) {
        let default = HistoryConfig::default();
        if other.enabled != default.enabled {
            self.enabled = other.enabled;
        }
        if other.limit != default.limit {
            self.limit = other.limit;
        }
    }
}

impl LoggingConfig {
    pub fn merge(&mut self, other: Self) {
        let default = LoggingConfig::default();
        if other.level != default.level {
            self.level = other.level;
        }
    }
}

impl DebugConfig {
    pub fn merge(&mut self, other: Self) {
        let default = DebugConfig::default();
        if other.enabled != default.enabled {
            self.enabled = other.enabled;
        }
    }
}

/// Color parser with terminal capability detection
pub struct ColorParser {
    supports_true_color: bool,
    supports_256: bool,
    no_color: bool,
}

impl ColorParser {
    /// Create a new ColorParser with automatic terminal capability detection
    pub fn new() -> Self {
        let no_color = std::env::var("NO_COLOR").is_ok();
        let support = supports_color::on(Stream::Stdout);

        Self {
            supports_true_color: support.as_ref().map(|s| s.has_16m).unwrap_or(false),
            supports_256: support.as_ref().map(|s| s.has_256).unwrap_or(false),
            no_color,
        }
    }

    /// Parse a color string (hex, indexed or named) and convert to appropriate terminal color
    pub fn parse(&self, s: &str) -> Result<Color> {
        if self.no_color {
            return Ok(Color::Reset);
        }

        let trimmed = s.trim();

        if trimmed.starts_with('#') && trimmed.len() == 7 {
            let (r, g, b) = parse_hex(trimmed)?;
            return Ok(self.rgb(r, g, b));
        }

        // Indexed colors: "indexed(236)" for explicit 256-color palette
        if trimmed.to_lowercase().starts_with("indexed(") && trimmed.ends_with(')') {
            let num_str = &trimmed[8..trimmed.len() - 1];
            let num = num_str.parse::<u8>().map_err(|_| {
                eyre!(
                    "Invalid indexed color: '{}'. Expected format: indexed(0-255)",
                    trimmed
                )
            })?;
            return Ok(Color::Indexed(num));
        }

        let lower = trimmed.to_lowercase();
        match lower.as_str() {
            "black" => Ok(Color::Black),
            "red" => Ok(Color::Red),
            "green" => Ok(Color::Green),
            "yellow" => Ok(Color::Yellow),
            "blue" => Ok(Color::Blue),
            "magenta" => Ok(Color::Magenta),
            "cyan" => Ok(Color::Cyan),
            "white" => Ok(Color::White),

            "bright_black" | "bright black" => Ok(Color::Indexed(8)),
            "bright_red" | "bright red" => Ok(Color::Indexed(9)),
            "bright_green" | "bright green" => Ok(Color::Indexed(10)),
            "bright_yellow" | "bright yellow" => Ok(Color::Indexed(11)),
            "bright_blue" | "bright blue" => Ok(Color::Indexed(12)),
            "bright_magenta" | "bright magenta" => Ok(Color::Indexed(13)),
            "bright_cyan" | "bright cyan" => Ok(Color::Indexed(14)),
            "bright_white" | "bright white" => Ok(Color::Indexed(15)),

            "gray" | "grey" => Ok(Color::Indexed(8)),
            "dark_gray" | "dark gray" | "dark_grey" | "dark grey" => Ok(Color::Indexed(8)),
            "light_gray" | "light gray" | "light_grey" | "light grey" => Ok(Color::Indexed(7)),

            "reset" | "default" => Ok(Color::Reset),

            _ => Err(eyre!(
                "Unknown color name: '{}'. Supported: basic ANSI colors (red, blue, etc.), \
                 bright variants (bright_red, etc.), indexed(n), or hex colors (#ff0000)",
                trimmed
            )),
        }
    }

    /// Convert RGB values to appropriate terminal color based on capabilities
    pub fn rgb(&self, r: u8, g: u8, b: u8) -> Color {
        if self.no_color {
            Color::Reset
        } else if self.supports_true_color {
            Color::Rgb(r, g, b)
        } else if self.supports_256 {
            Color::Indexed(rgb_to_256_color(r, g, b))
        } else {
            rgb_to_basic_ansi(r, g, b)
        }
    }
}

impl Default for ColorParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse hex color string (#ff0000) to RGB components
fn parse_hex(s: &str) -> Result<(u8, u8, u8)> {
    if !s.starts_with('#') || s.len() != 7 || !s.is_ascii() {
        return Err(eyre!(
            "Invalid hex color format: '{}'. Expected format: #rrggbb",
            s
        ));
    }

    let r = u8::from_str_radix(&s[1..3], 16)
        .map_err(|_| eyre!("Invalid red component in hex color: {}", s))?;
    let g = u8::from_str_radix(&s[3..5], 16)
        .map_err(|_| eyre!("Invalid green component in hex color: {}", s))?;
    let b = u8::from_str_radix(&s[5..7], 16)
        .map_err(|_| eyre!("Invalid blue component in hex color: {}", s))?;

    Ok((r, g, b))
}

/// Convert RGB to nearest 256-color palette index
/// Uses standard xterm 256-color palette
pub fn rgb_to_256_color(r: u8, g: u8, b: u8) -> u8 {
    // Gray shade (r ≈ g ≈ b) maps to the grayscale ramp (232-255)
    let max_diff = r.max(g).max(b) as i16 - r.min(g).min(b) as i16;
    if max_diff < 10 {
        let gray = (r as u16 + g as u16 + b as u16) / 3;
        if gray < 8 {
            return 16;
        } else if gray > 247 {
            return 231;
        } else {
            return 232 + ((gray - 8) * 24 / 240) as u8;
        }
    }

    // 6x6x6 color cube (16-231)
    let r_idx = (r as u16 * 5 / 255) as u8;
    let g_idx = (g as u16 * 5 / 255) as u8;
    let b_idx = (b as u16 * 5 / 255) as u8;

    16 + 36 * r_idx + 6 * g_idx + b_idx
}

/// Convert RGB to nearest basic ANSI color (8 colors)
pub fn rgb_to_basic_ansi(r: u8, g: u8, b: u8) -> Color {
    let r_bright = r > 128;
    let g_bright = g > 128;
    let b_bright = b > 128;

    let max_diff = r.max(g).max(b) as i16 - r.min(g).min(b) as i16;
    if max_diff < 30 {
        let avg = (r as u16 + g as u16 + b as u16) / 3;
        return if avg < 64 { Color::Black } else { Color::White };
    }

    match (r_bright, g_bright, b_bright) {
        (false, false, false) => Color::Black,
        (true, false, false) => Color::Red,
        (false, true, false) => Color::Green,
        (true, true, false) => Color::Yellow,
        (false, false, true) => Color::Blue,
        (true, false, true) => Color::Magenta,
        (false, true, true) => Color::Cyan,
        (true, true, true) => Color::White,
    }
}

/// Theme containing parsed colors ready for use
#[derive(Debug, Clone)]
pub struct Theme {
    pub colors: HashMap<String, Color>,
}

impl Theme {
    /// Create a Theme from a ThemeConfig by parsing all color strings
    pub fn from_config(config: &ThemeConfig) -> Result<Self> {
        let parser = ColorParser::new();
        let mut colors = HashMap::new();
        for (name, value) in config.colors.entries() {
            colors.insert(name.to_string(), parser.parse(value)?);
        }
        Ok(Self { colors })
    }

    /// Get a color by name, returns Reset if not found
    pub fn get(&self, name: &str) -> Color {
        self.colors.get(name).copied().unwrap_or(Color::Reset)
    }
}

// Default configuration template
const DEFAULT_CONFIG_TEMPLATE: &str = include_str!("../config/default.toml");
