use color_eyre::eyre::eyre;
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Sender};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Style};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, StatefulWidget, Wrap};
use ratatui::{buffer::Buffer, layout::Rect, widgets::Widget};

pub mod cache;
pub mod channel;
pub mod chart_data;
pub mod chart_export;
pub mod config;
pub mod error_display;
pub mod ingest;
pub mod logging;
pub mod selection;
pub mod source;
pub mod widgets;

pub use cache::{CacheManager, RecentFiles};
pub use config::{
    rgb_to_256_color, rgb_to_basic_ansi, AppConfig, ColorParser, ConfigManager, Theme,
};
pub use sheetplot_cli::{Args, CompressionFormat, FileFormat};

use channel::{Dispatch, Envelope, ParserEvent, Subscription};
use chart_data::{project, ChartProjection, Palette, Rgb};
use ingest::scheduler::TickOutcome;
use ingest::{Ingest, ReadModel};
use selection::AxisColumn;
use source::{start_streaming_parse, StreamOptions};
use widgets::chart::{ChartView, ProgressGauge};
use widgets::controls::{format_count, Controls};
use widgets::debug::DebugState;
use widgets::sidebar::{Sidebar, SidebarFocus, SidebarState, SIDEBAR_WIDTH};
use widgets::text_input::{TextInput, TextInputEvent};

/// Application name used for cache directory and other app-specific paths
pub const APP_NAME: &str = "sheetplot";

/// Upper bound on queued events handled between two frames
const MAX_EVENTS_PER_FRAME: usize = 64;

/// Everything needed to start a file session: how to parse, and how fast to reveal rows.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    pub stream: StreamOptions,
    pub flush_interval: Duration,
    pub chunk_size: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl SessionOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        let loading = &config.file_loading;
        let mut stream = StreamOptions::new()
            .with_batch_size(loading.batch_size)
            .with_count_total(loading.count_total);
        if let Some(delimiter) = loading.delimiter {
            stream = stream.with_delimiter(delimiter);
        }
        if let Some(sheet) = &loading.sheet {
            stream = stream.with_sheet(sheet.as_str());
        }
        if let Some(compression) = loading
            .compression
            .as_deref()
            .and_then(config::parse_compression)
        {
            stream = stream.with_compression(compression);
        }
        Self {
            stream,
            flush_interval: Duration::from_millis(config.ingest.flush_interval_ms),
            chunk_size: config.ingest.flush_chunk_size,
        }
    }

    /// Config values overridden by command-line flags.
    pub fn from_args_and_config(args: &Args, config: &AppConfig) -> Result<Self> {
        let mut opts = Self::from_config(config);
        let mut stream = opts.stream;
        if let Some(format) = args.format {
            stream = stream.with_format(format);
        }
        if let Some(compression) = args.compression {
            stream = stream.with_compression(compression);
        }
        if let Some(delimiter) = args.delimiter {
            stream = stream.with_delimiter(delimiter);
        }
        if let Some(sheet) = &args.sheet {
            stream = stream.with_sheet(sheet.as_str());
        }
        opts.stream = stream;
        if let Some(batch_size) = args.batch_size {
            if batch_size == 0 {
                return Err(eyre!("--batch-size must be greater than 0"));
            }
            opts.stream.batch_size = batch_size;
        }
        if args.no_count_total {
            opts.stream.count_total = false;
        }
        if let Some(ms) = args.flush_interval_ms {
            if ms == 0 {
                return Err(eyre!("--flush-interval-ms must be greater than 0"));
            }
            opts.flush_interval = Duration::from_millis(ms);
        }
        if let Some(chunk) = args.flush_chunk_size {
            if chunk == 0 {
                return Err(eyre!("--flush-chunk-size must be greater than 0"));
            }
            opts.chunk_size = chunk;
        }
        Ok(opts)
    }

    pub fn new_ingest(&self) -> Ingest {
        Ingest::with_cadence(self.flush_interval, self.chunk_size)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    Key(KeyEvent),
    Resize(u16, u16),
    Open(PathBuf),
    /// Start the session after the UI has shown "Opening"
    DoOpen(PathBuf),
    Parser(Envelope),
    FlushTick,
    ExportChart(PathBuf),
    Exit,
    Crash(String),
}

impl From<Envelope> for AppEvent {
    fn from(envelope: Envelope) -> Self {
        AppEvent::Parser(envelope)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum LoadState {
    #[default]
    Idle,
    Opening(PathBuf),
    Streaming,
    Done,
    Failed(String),
}

#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub enum InputMode {
    #[default]
    Normal,
    OpenPrompt,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusMessage {
    pub text: String,
    pub is_error: bool,
}

pub struct App {
    events: Sender<AppEvent>,
    config: AppConfig,
    theme: Theme,
    color_parser: ColorParser,
    palette: Palette,
    cache: Option<CacheManager>,
    recent: RecentFiles,
    session_options: SessionOptions,
    ingest: Ingest,
    subscription: Option<Subscription>,
    generation: u64,
    parser_thread: Option<JoinHandle<()>>,
    source_path: Option<PathBuf>,
    load_state: LoadState,
    status: Option<StatusMessage>,
    input_mode: InputMode,
    path_input: TextInput,
    sidebar: SidebarState,
    debug: DebugState,
    throbber_frame: u8,
}

impl App {
    pub fn new(events: Sender<AppEvent>) -> App {
        let config = AppConfig::default();
        let theme = Theme::from_config(&config.theme).unwrap_or_else(|e| {
            warn!("Failed to create default theme: {}. Using fallback.", e);
            Theme {
                colors: std::collections::HashMap::new(),
            }
        });
        Self::new_with_config(events, theme, config, None)
    }

    pub fn new_with_config(
        events: Sender<AppEvent>,
        theme: Theme,
        config: AppConfig,
        cache: Option<CacheManager>,
    ) -> App {
        let session_options = SessionOptions::from_config(&config);
        let recent = match (&cache, config.history.enabled) {
            (Some(cache), true) => RecentFiles::load(cache, config.history.limit),
            _ => RecentFiles::new(0),
        };
        let path_input = TextInput::new().with_text_color(theme.get("text_primary"));
        let mut debug = DebugState::default();
        debug.enabled = config.debug.enabled;
        App {
            events,
            palette: config.palette(),
            theme,
            color_parser: ColorParser::new(),
            cache,
            recent,
            ingest: session_options.new_ingest(),
            session_options,
            subscription: None,
            generation: 0,
            parser_thread: None,
            source_path: None,
            load_state: LoadState::Idle,
            status: None,
            input_mode: InputMode::Normal,
            path_input,
            sidebar: SidebarState::default(),
            debug,
            throbber_frame: 0,
            config,
        }
    }

    pub fn with_session_options(mut self, options: SessionOptions) -> Self {
        self.ingest = options.new_ingest();
        self.session_options = options;
        self
    }

    pub fn enable_debug(&mut self) {
        self.debug.enabled = true;
    }

    pub fn send_event(&mut self, event: AppEvent) -> Result<()> {
        self.events.send(event)?;
        Ok(())
    }

    pub fn ingest(&self) -> &Ingest {
        &self.ingest
    }

    pub fn read_model(&self) -> ReadModel<'_> {
        self.ingest.read_model()
    }

    pub fn load_state(&self) -> &LoadState {
        &self.load_state
    }

    pub fn status(&self) -> Option<&StatusMessage> {
        self.status.as_ref()
    }

    pub fn input_mode(&self) -> InputMode {
        self.input_mode
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    pub fn recent_files(&self) -> &RecentFiles {
        &self.recent
    }

    fn color(&self, name: &str) -> Color {
        self.theme.get(name)
    }

    fn set_status(&mut self, text: impl Into<String>, is_error: bool) {
        self.status = Some(StatusMessage {
            text: text.into(),
            is_error,
        });
    }

    /// True when the flush scheduler wants a tick at `now`.
    pub fn flush_due(&self, now: Instant) -> bool {
        self.ingest.is_tick_due(now)
    }

    pub fn next_flush_in(&self, now: Instant) -> Option<Duration> {
        self.ingest.next_tick_in(now)
    }

    pub fn event(&mut self, event: AppEvent) -> Option<AppEvent> {
        self.debug.num_events += 1;
        match event {
            AppEvent::Key(key) => {
                self.debug.on_key(&key);
                self.key(&key)
            }
            AppEvent::Open(path) => {
                self.load_state = LoadState::Opening(path.clone());
                self.set_status(format!("Opening {}", path.display()), false);
                Some(AppEvent::DoOpen(path))
            }
            AppEvent::DoOpen(path) => {
                self.start_session(path);
                None
            }
            AppEvent::Parser(envelope) => {
                self.on_parser_event(envelope);
                None
            }
            AppEvent::FlushTick => {
                self.flush(Instant::now());
                None
            }
            AppEvent::ExportChart(path) => {
                self.export_chart(&path);
                None
            }
            AppEvent::Resize(..) | AppEvent::Exit | AppEvent::Crash(_) => None,
        }
    }

    /// Start parsing `path` under a new generation. The current session is replaced only once the
    /// parser has started; a failed start leaves its rows, headers and selection in place.
    fn start_session(&mut self, path: PathBuf) {
        let generation = self.generation + 1;
        let subscription = Subscription::open(generation);
        let sink = subscription.sink(self.events.clone());
        let handle = match start_streaming_parse(&path, &self.session_options.stream, sink) {
            Ok(handle) => handle,
            Err(e) => {
                let message = error_display::user_message_from_source(&e);
                warn!(path = %path.display(), error = %e, "could not open file");
                self.load_state = LoadState::Failed(message.clone());
                self.set_status(message, true);
                return;
            }
        };

        if let Some(mut old) = self.subscription.take() {
            old.close();
        }
        self.ingest.reset();
        self.sidebar.reset();
        self.generation = generation;
        self.debug.generation = generation;

        info!(generation, path = %path.display(), "session started");
        self.parser_thread = Some(handle);
        self.subscription = Some(subscription);
        self.load_state = LoadState::Streaming;
        self.set_status(format!("Loading {}", path.display()), false);
        self.remember(&path);
        self.source_path = Some(path);
    }

    fn remember(&mut self, path: &Path) {
        if !self.config.history.enabled {
            return;
        }
        let absolute = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        self.recent.push(absolute);
        if let Some(cache) = &self.cache {
            if let Err(e) = self.recent.save(cache) {
                warn!("Could not save recent files: {}", e);
            }
        }
    }

    fn on_parser_event(&mut self, envelope: Envelope) {
        let Some(subscription) = &self.subscription else {
            self.debug.stale_envelopes += 1;
            return;
        };
        let is_schema = matches!(envelope.event, ParserEvent::Schema(_));
        match subscription.dispatch(envelope, &mut self.ingest, Instant::now()) {
            Dispatch::Stale => self.debug.stale_envelopes += 1,
            Dispatch::Applied | Dispatch::TickScheduled => {
                if is_schema {
                    self.sidebar.reset();
                }
            }
            Dispatch::Failed(message) => {
                self.load_state = LoadState::Failed(message.clone());
                self.set_status(message, true);
            }
        }
        self.debug.pending_rows = self.ingest.pending_len();
    }

    fn flush(&mut self, now: Instant) {
        self.debug.num_ticks += 1;
        if let TickOutcome::Finished(_) = self.ingest.tick(now) {
            if self.load_state == LoadState::Streaming {
                self.load_state = LoadState::Done;
                let loaded = self.ingest.visible_rows().len() as u64;
                self.set_status(format!("Loaded {} rows", format_count(loaded)), false);
            }
        }
        self.debug.pending_rows = self.ingest.pending_len();
    }

    fn key(&mut self, event: &KeyEvent) -> Option<AppEvent> {
        if event.modifiers.contains(KeyModifiers::CONTROL) && event.code == KeyCode::Char('c') {
            return Some(AppEvent::Exit);
        }
        match self.input_mode {
            InputMode::OpenPrompt => self.prompt_key(event),
            InputMode::Normal => self.normal_key(event),
        }
    }

    pub fn open_prompt(&mut self) {
        self.input_mode = InputMode::OpenPrompt;
        self.path_input.clear();
        self.path_input.set_history(
            self.recent
                .entries()
                .iter()
                .map(|p| p.display().to_string())
                .collect(),
        );
        self.path_input.set_focused(true);
    }

    fn prompt_key(&mut self, event: &KeyEvent) -> Option<AppEvent> {
        match self.path_input.handle_key(event) {
            TextInputEvent::Submit => {
                let value = self.path_input.value().trim().to_string();
                if value.is_empty() {
                    return None;
                }
                self.input_mode = InputMode::Normal;
                self.path_input.set_focused(false);
                Some(AppEvent::Open(expand_home(&value)))
            }
            TextInputEvent::Cancel => {
                self.input_mode = InputMode::Normal;
                self.path_input.set_focused(false);
                None
            }
            TextInputEvent::None | TextInputEvent::HistoryChanged => None,
        }
    }

    fn normal_key(&mut self, event: &KeyEvent) -> Option<AppEvent> {
        match event.code {
            KeyCode::Char('q') | KeyCode::Esc => Some(AppEvent::Exit),
            KeyCode::Char('o') => {
                self.open_prompt();
                None
            }
            KeyCode::Char('r') => self.source_path.clone().map(AppEvent::Open),
            KeyCode::Char('e') => {
                if self.ingest.selection().series().is_empty() {
                    self.set_status("Select a series before exporting", true);
                    None
                } else {
                    Some(AppEvent::ExportChart(chart_export::default_export_path(
                        self.source_path.as_deref(),
                    )))
                }
            }
            KeyCode::Tab | KeyCode::BackTab => {
                self.sidebar.toggle_focus();
                None
            }
            KeyCode::Up | KeyCode::Char('k') => {
                let len = self.focused_list_len();
                self.sidebar.move_cursor(-1, len);
                None
            }
            KeyCode::Down | KeyCode::Char('j') => {
                let len = self.focused_list_len();
                self.sidebar.move_cursor(1, len);
                None
            }
            KeyCode::Enter | KeyCode::Char(' ') => {
                self.apply_sidebar_choice();
                None
            }
            _ => None,
        }
    }

    fn focused_list_len(&self) -> usize {
        match self.sidebar.focus {
            SidebarFocus::Axis => self.ingest.axis_candidates().len(),
            SidebarFocus::Series => self.ingest.series_candidates().len(),
        }
    }

    fn apply_sidebar_choice(&mut self) {
        match self.sidebar.focus {
            SidebarFocus::Axis => {
                let candidates = self.ingest.axis_candidates();
                if let Some(axis) = self
                    .sidebar
                    .cursor(candidates.len())
                    .and_then(|i| candidates.get(i).cloned())
                {
                    self.ingest.set_axis_column(axis);
                }
            }
            SidebarFocus::Series => {
                let candidates = self.ingest.series_candidates();
                if let Some(column) = self
                    .sidebar
                    .cursor(candidates.len())
                    .and_then(|i| candidates.get(i).cloned())
                {
                    self.ingest.toggle_series_column(&column);
                }
            }
        }
    }

    pub fn projection(&self) -> ChartProjection {
        project(
            self.ingest.visible_rows(),
            self.ingest.selection(),
            &self.palette,
            self.ingest.is_finished(),
            self.config.chart.streaming_opacity,
        )
    }

    fn export_chart(&mut self, path: &Path) {
        let projection = self.projection();
        let size = (self.config.chart.export_width, self.config.chart.export_height);
        match chart_export::write_chart_png(path, &projection, size) {
            Ok(()) => {
                info!(path = %path.display(), "chart exported");
                self.set_status(format!("Chart saved to {}", path.display()), false);
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "chart export failed");
                let message = error_display::user_message_from_report(&e, None);
                self.set_status(format!("Export failed: {}", message), true);
            }
        }
    }

    /// Terminal color for a palette color at the projection's opacity.
    fn terminal_color(&self, rgb: Rgb, opacity: f64) -> Color {
        let Rgb(r, g, b) = rgb.blend(Rgb(0, 0, 0), opacity);
        self.color_parser.rgb(r, g, b)
    }

    fn is_busy(&self) -> bool {
        matches!(self.load_state, LoadState::Opening(_) | LoadState::Streaming)
    }

    fn render_placeholder(&self, area: Rect, buf: &mut Buffer) {
        let (text, color) = match &self.load_state {
            LoadState::Opening(path) => (format!("Opening {}...", path.display()), "dimmed"),
            LoadState::Failed(message) => (message.clone(), "error"),
            LoadState::Streaming => ("Waiting for the header row...".to_string(), "dimmed"),
            LoadState::Idle | LoadState::Done => (
                "Press o to open a CSV, TSV or Excel file".to_string(),
                "dimmed",
            ),
        };
        let inner = centered_rect(area, 60, 20);
        Paragraph::new(text)
            .style(Style::default().fg(self.color(color)))
            .alignment(ratatui::layout::Alignment::Center)
            .wrap(Wrap { trim: true })
            .render(inner, buf);
    }

    fn render_open_prompt(&mut self, area: Rect, buf: &mut Buffer) {
        let popup = centered_rect(area, 60, 20);
        let popup = Rect {
            height: area.height.min(3),
            ..popup
        };
        Clear.render(popup, buf);
        let block = Block::default()
            .borders(Borders::ALL)
            .title("Open file (Enter to open, Esc to cancel, Up/Down for recent)")
            .border_style(Style::default().fg(self.color("sidebar_border_active")));
        let inner = block.inner(popup);
        block.render(popup, buf);
        (&self.path_input).render(inner, buf);
    }
}

impl Widget for &mut App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        self.debug.num_frames += 1;
        if self.is_busy() {
            self.throbber_frame = self.throbber_frame.wrapping_add(1);
        }

        let background_color = self.color("background");
        Block::default()
            .style(Style::default().bg(background_color))
            .render(area, buf);

        let mut constraints = vec![
            Constraint::Fill(1),   // Sidebar + chart
            Constraint::Length(1), // Progress
            Constraint::Length(1), // Status
            Constraint::Length(1), // Controls
        ];
        if self.debug.enabled {
            constraints.push(Constraint::Length(1));
        }
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints(constraints)
            .split(area);

        if self.ingest.has_schema() {
            let main = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Length(SIDEBAR_WIDTH), Constraint::Fill(1)])
                .split(layout[0]);

            let projection = self.projection();
            let series_colors: Vec<Color> = projection
                .series
                .iter()
                .map(|s| self.terminal_color(s.color, projection.opacity))
                .collect();
            let named_colors: Vec<(String, Color)> = projection
                .series
                .iter()
                .zip(series_colors.iter())
                .map(|(s, c)| (s.column.clone(), *c))
                .collect();

            let axis_candidates = self.ingest.axis_candidates();
            let series_candidates = self.ingest.series_candidates();
            Sidebar {
                axis_candidates: &axis_candidates,
                series_candidates: &series_candidates,
                selection: self.ingest.selection(),
                series_colors: &named_colors,
                theme: &self.theme,
            }
            .render(main[0], buf, &mut self.sidebar);

            let title = self
                .source_path
                .as_ref()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            ChartView {
                projection: &projection,
                series_colors: &series_colors,
                theme: &self.theme,
                max_points: self.config.chart.max_render_points,
                title,
            }
            .render(main[1], buf);

            ProgressGauge {
                progress: self.ingest.progress(),
                theme: &self.theme,
            }
            .render(layout[1], buf);
        } else {
            self.render_placeholder(layout[0], buf);
        }

        if let Some(status) = &self.status {
            let color = if status.is_error {
                self.color("error")
            } else {
                self.color("text_secondary")
            };
            Paragraph::new(status.text.as_str())
                .style(Style::default().fg(color))
                .render(layout[2], buf);
        }

        let hints: Vec<(&'static str, &'static str)> = match self.input_mode {
            InputMode::OpenPrompt => vec![("Enter", "Open"), ("Esc", "Cancel")],
            InputMode::Normal => vec![
                ("o", "Open"),
                ("Tab", "Axis/Series"),
                ("Space", "Select"),
                ("e", "Export PNG"),
                ("r", "Reload"),
                ("q", "Quit"),
            ],
        };
        let mut controls = Controls::new(hints)
            .with_colors(
                self.color("controls_bg"),
                self.color("keybind_hints"),
                self.color("keybind_labels"),
            )
            .with_busy(self.is_busy(), self.throbber_frame);
        if self.ingest.has_schema() {
            controls = controls.with_status(format!(
                "Rows: {}",
                format_count(self.ingest.visible_rows().len() as u64)
            ));
        }
        (&controls).render(layout[3], buf);

        if self.debug.enabled && layout.len() > 4 {
            (&self.debug).render(layout[4], buf);
        }

        if self.input_mode == InputMode::OpenPrompt {
            self.render_open_prompt(layout[0], buf);
        }
    }
}

fn centered_rect(r: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

/// `~/data.csv` -> `$HOME/data.csv`
fn expand_home(input: &str) -> PathBuf {
    match input.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(input)),
        None => PathBuf::from(input),
    }
}

/// Run the terminal UI until the user quits.
pub fn run(path: Option<PathBuf>, options: SessionOptions, config: AppConfig) -> Result<()> {
    let theme = Theme::from_config(&config.theme)
        .or_else(|e| Theme::from_config(&AppConfig::default().theme).map_err(|_| e))?;
    let cache = CacheManager::new(APP_NAME).ok();
    let poll_interval = Duration::from_millis(config.performance.event_poll_interval_ms);

    let mut terminal = ratatui::try_init().map_err(|e| {
        eyre!(
            "sheetplot requires an interactive terminal (TTY). No terminal detected: {}. \
             Use --headless for non-interactive runs.",
            e
        )
    })?;
    let (tx, rx) = mpsc::channel::<AppEvent>();
    let mut app = App::new_with_config(tx.clone(), theme, config, cache).with_session_options(options);

    terminal.draw(|frame| frame.render_widget(&mut app, frame.area()))?;
    match path {
        Some(path) => tx.send(AppEvent::Open(path))?,
        None => app.open_prompt(),
    }

    let result = event_loop(&mut terminal, &mut app, &tx, &rx, poll_interval);
    ratatui::restore();
    result
}

fn event_loop(
    terminal: &mut ratatui::DefaultTerminal,
    app: &mut App,
    tx: &Sender<AppEvent>,
    rx: &mpsc::Receiver<AppEvent>,
    poll_interval: Duration,
) -> Result<()> {
    terminal.draw(|frame| frame.render_widget(&mut *app, frame.area()))?;
    loop {
        // Wake up in time for the next flush even when the terminal is idle
        let timeout = app
            .next_flush_in(Instant::now())
            .map_or(poll_interval, |d| d.min(poll_interval));
        if crossterm::event::poll(timeout)? {
            match crossterm::event::read()? {
                crossterm::event::Event::Key(key) => {
                    if key.is_press() {
                        tx.send(AppEvent::Key(key))?
                    }
                }
                crossterm::event::Event::Resize(cols, rows) => {
                    tx.send(AppEvent::Resize(cols, rows))?
                }
                _ => {}
            }
        }

        let mut updated = false;
        for _ in 0..MAX_EVENTS_PER_FRAME {
            match rx.try_recv() {
                Ok(AppEvent::Exit) => return Ok(()),
                Ok(AppEvent::Crash(msg)) => return Err(eyre!(msg)),
                Ok(event) => {
                    if let Some(next) = app.event(event) {
                        tx.send(next)?;
                    }
                    updated = true;
                }
                Err(mpsc::TryRecvError::Empty) => break,
                Err(mpsc::TryRecvError::Disconnected) => return Ok(()),
            }
        }

        if app.flush_due(Instant::now()) {
            app.event(AppEvent::FlushTick);
            updated = true;
        }

        if updated {
            terminal.draw(|frame| frame.render_widget(&mut *app, frame.area()))?;
        }
    }
}

/// Outcome of a headless load.
#[derive(Debug)]
pub struct HeadlessRun {
    pub ingest: Ingest,
    /// Parser failure, if the stream ended early
    pub error: Option<String>,
    /// Requested columns that the file does not have
    pub unknown_columns: Vec<String>,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct HeadlessReport<'a> {
    #[serde(flatten)]
    model: ReadModel<'a>,
    percent_loaded: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

impl HeadlessRun {
    pub fn to_json(&self) -> Result<String> {
        let report = HeadlessReport {
            model: self.ingest.read_model(),
            percent_loaded: self.ingest.percent_loaded(),
            error: self.error.as_deref(),
        };
        Ok(serde_json::to_string_pretty(&report)?)
    }
}

/// Stream `path` through the same channel, scheduler and selection as the terminal UI, without a
/// terminal. Returns once ingestion has finished.
pub fn load_headless(
    path: &Path,
    options: &SessionOptions,
    axis: Option<&str>,
    series: &[String],
) -> Result<HeadlessRun> {
    let mut ingest = options.new_ingest();
    let subscription = Subscription::open(1);
    let (tx, rx) = mpsc::channel::<Envelope>();
    let handle = start_streaming_parse(path, &options.stream, subscription.sink(tx))
        .map_err(|e| eyre!(error_display::user_message_from_source(&e)))?;

    let mut error = None;
    let mut unknown_columns = Vec::new();
    let mut disconnected = false;
    while !ingest.is_finished() {
        let now = Instant::now();
        if ingest.is_tick_due(now) {
            ingest.tick(now);
            continue;
        }
        let wait = ingest
            .next_tick_in(now)
            .unwrap_or(Duration::from_millis(100));
        if disconnected {
            std::thread::sleep(wait);
            continue;
        }
        match rx.recv_timeout(wait) {
            Ok(envelope) => {
                let is_schema = matches!(envelope.event, ParserEvent::Schema(_));
                match subscription.dispatch(envelope, &mut ingest, Instant::now()) {
                    Dispatch::Failed(message) => error = Some(message),
                    Dispatch::Applied if is_schema => {
                        unknown_columns = apply_selection(&mut ingest, axis, series);
                    }
                    _ => {}
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                disconnected = true;
                if !ingest.stream_ended() {
                    let message = "Parser stopped unexpectedly".to_string();
                    warn!("{}", message);
                    error = Some(message);
                    ingest.on_stream_end(Instant::now());
                }
            }
        }
    }
    drop(subscription);
    if handle.join().is_err() {
        warn!("parser thread panicked");
    }
    debug!(rows = ingest.visible_rows().len(), "headless load complete");

    Ok(HeadlessRun {
        ingest,
        error,
        unknown_columns,
    })
}

/// Apply `--axis` / `--series`. Returns the names that are not columns of the file.
pub fn apply_selection(ingest: &mut Ingest, axis: Option<&str>, series: &[String]) -> Vec<String> {
    let mut unknown = Vec::new();
    if let Some(name) = axis {
        let axis = AxisColumn::resolve(name, ingest.schema());
        if !ingest.set_axis_column(axis) {
            unknown.push(name.to_string());
        }
    }
    for column in series {
        if ingest.selection().is_selected(column) {
            continue;
        }
        if ingest.toggle_series_column(column).is_none() {
            unknown.push(column.clone());
        }
    }
    unknown
}

/// `--headless`: load the file, print the read model as JSON to stdout.
pub fn run_headless(path: &Path, options: &SessionOptions, axis: Option<&str>, series: &[String]) -> Result<()> {
    let run = load_headless(path, options, axis, series)?;
    for column in &run.unknown_columns {
        warn!(column = %column, "no such column");
        eprintln!("Warning: no column named '{}'", column);
    }
    println!("{}", run.to_json()?);
    match &run.error {
        Some(message) => Err(eyre!(message.clone())),
        None => Ok(()),
    }
}
