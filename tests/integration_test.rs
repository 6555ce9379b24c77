use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use sheetplot::channel::ParserEvent;
use sheetplot::config::{AppConfig, Theme};
use sheetplot::ingest::row::Value;
use sheetplot::selection::AxisColumn;
use sheetplot::{load_headless, App, AppEvent, InputMode, LoadState, SessionOptions};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

mod common;
use common::{numbered_csv, write_temp_file};

fn key(code: KeyCode) -> AppEvent {
    AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
}

fn fast_options() -> SessionOptions {
    SessionOptions {
        flush_interval: Duration::from_millis(1),
        chunk_size: 4,
        ..SessionOptions::default()
    }
}

fn new_app() -> (App, Receiver<AppEvent>) {
    let (tx, rx) = mpsc::channel();
    let app = App::new(tx).with_session_options(fast_options());
    (app, rx)
}

/// Feed parser events back into the app until the session for `generation` reports the end of
/// its stream, then flush until ingestion is finished.
fn run_session(app: &mut App, rx: &Receiver<AppEvent>, generation: u64) {
    loop {
        let event = rx
            .recv_timeout(Duration::from_secs(10))
            .expect("parser event");
        let end_of_stream = matches!(
            &event,
            AppEvent::Parser(envelope) if envelope.generation == generation
                && matches!(envelope.event, ParserEvent::Finished | ParserEvent::Failed(_))
        );
        app.event(event);
        if end_of_stream {
            break;
        }
    }
    for _ in 0..100 {
        if app.ingest().is_finished() {
            break;
        }
        app.event(AppEvent::FlushTick);
    }
}

fn open(app: &mut App, path: &Path) {
    match app.event(AppEvent::Open(path.to_path_buf())) {
        Some(next @ AppEvent::DoOpen(_)) => {
            app.event(next);
        }
        _ => panic!("expected a deferred open"),
    }
}

#[test]
fn test_app_creation() {
    let (app, _rx) = new_app();
    assert_eq!(app.input_mode(), InputMode::Normal);
    assert_eq!(app.load_state(), &LoadState::Idle);
    assert_eq!(app.generation(), 0);
    assert!(app.source_path().is_none());
    assert!(app.read_model().headers.is_empty());
}

#[test]
fn test_app_accepts_theme_from_config() {
    let config = AppConfig::default();
    let theme = Theme::from_config(&config.theme).expect("Failed to create theme");
    let (tx, _rx) = mpsc::channel::<AppEvent>();
    let app = App::new_with_config(tx, theme, config, None);
    assert_eq!(app.load_state(), &LoadState::Idle);
    assert!(app.recent_files().is_empty());
}

#[test]
fn test_open_streams_file_into_read_model() {
    let (_dir, path) = write_temp_file("data.csv", &numbered_csv(10));
    let (mut app, rx) = new_app();

    assert!(matches!(
        app.event(AppEvent::Open(path.clone())),
        Some(AppEvent::DoOpen(_))
    ));
    assert!(matches!(app.load_state(), LoadState::Opening(_)));

    assert!(app.event(AppEvent::DoOpen(path.clone())).is_none());
    assert_eq!(app.load_state(), &LoadState::Streaming);
    assert_eq!(app.generation(), 1);
    assert_eq!(app.source_path(), Some(path.as_path()));

    run_session(&mut app, &rx, 1);

    assert_eq!(app.load_state(), &LoadState::Done);
    let model = app.read_model();
    assert_eq!(model.headers, ["t", "value", "label"]);
    assert_eq!(model.loaded_count, 10);
    assert_eq!(model.total_count, 10);
    assert!(model.finished);
    assert_eq!(model.visible_rows[3].get("value"), Some(&Value::Number(6.0)));
    assert_eq!(app.status().map(|s| s.text.as_str()), Some("Loaded 10 rows"));
    assert_eq!(
        app.ingest().series_candidates(),
        vec!["t".to_string(), "value".to_string()]
    );
}

#[test]
fn test_sidebar_keys_select_axis_and_series() {
    let (_dir, path) = write_temp_file("data.csv", &numbered_csv(6));
    let (mut app, rx) = new_app();
    open(&mut app, &path);
    run_session(&mut app, &rx, 1);

    // Axis list: Index, t, value, label. Move to "t" and pick it.
    app.event(key(KeyCode::Down));
    app.event(key(KeyCode::Enter));
    assert_eq!(
        app.read_model().axis_column,
        &AxisColumn::Column("t".to_string())
    );

    // Series list now excludes the axis: only "value"
    app.event(key(KeyCode::Tab));
    app.event(key(KeyCode::Char(' ')));
    assert_eq!(app.read_model().series_columns, ["value".to_string()]);

    let projection = app.projection();
    assert_eq!(projection.series.len(), 1);
    assert_eq!(projection.series[0].values.len(), 6);
    assert_eq!(projection.opacity, 1.0);

    // Toggle off again
    app.event(key(KeyCode::Enter));
    assert!(app.read_model().series_columns.is_empty());
}

#[test]
fn test_reopen_drops_stale_events_from_previous_session() {
    let (_dir_a, first) = write_temp_file("first.csv", "old\n1\n2\n3\n");
    let (_dir_b, second) = write_temp_file("second.csv", &numbered_csv(5));
    let (mut app, rx) = new_app();

    app.event(AppEvent::DoOpen(first));
    app.event(AppEvent::DoOpen(second.clone()));
    assert_eq!(app.generation(), 2);

    run_session(&mut app, &rx, 2);

    let model = app.read_model();
    assert_eq!(model.headers, ["t", "value", "label"]);
    assert_eq!(model.loaded_count, 5);
    assert!(model
        .visible_rows
        .iter()
        .all(|row| row.get("old").is_none()));
    assert_eq!(app.source_path(), Some(second.as_path()));
}

#[test]
fn test_failed_open_reports_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    let (mut app, _rx) = new_app();

    app.event(AppEvent::DoOpen(dir.path().join("missing.csv")));
    assert!(matches!(app.load_state(), LoadState::Failed(_)));
    assert!(app.status().is_some_and(|s| s.is_error));
    assert!(app.source_path().is_none());
    assert_eq!(app.generation(), 0);
    assert!(app.read_model().headers.is_empty());
}

#[test]
fn test_failed_open_keeps_loaded_file() {
    let (dir, path) = write_temp_file("data.csv", &numbered_csv(10));
    let (mut app, rx) = new_app();
    open(&mut app, &path);
    run_session(&mut app, &rx, 1);

    app.event(key(KeyCode::Tab));
    app.event(key(KeyCode::Enter));
    assert_eq!(app.read_model().series_columns, ["t".to_string()]);

    let unsupported = dir.path().join("data.parquet");
    std::fs::write(&unsupported, "PAR1").expect("write fixture");
    for bad in [dir.path().join("missing.csv"), unsupported] {
        app.event(AppEvent::DoOpen(bad));
        assert!(matches!(app.load_state(), LoadState::Failed(_)));
        assert!(app.status().is_some_and(|s| s.is_error));

        let model = app.read_model();
        assert_eq!(model.headers, ["t", "value", "label"]);
        assert_eq!(model.loaded_count, 10);
        assert_eq!(model.visible_rows.len(), 10);
        assert_eq!(model.series_columns, ["t".to_string()]);
        assert!(model.finished);
        assert_eq!(app.generation(), 1);
        assert_eq!(app.source_path(), Some(path.as_path()));
    }

    // The kept file can still be reloaded
    assert!(matches!(
        app.event(key(KeyCode::Char('r'))),
        Some(AppEvent::Open(_))
    ));
}

#[test]
fn test_failed_open_mid_stream_keeps_session_running() {
    let (dir, path) = write_temp_file("data.csv", &numbered_csv(8));
    let (mut app, rx) = new_app();
    open(&mut app, &path);

    app.event(AppEvent::DoOpen(dir.path().join("missing.csv")));
    assert_eq!(app.generation(), 1);

    // Events from the first parser are still accepted
    run_session(&mut app, &rx, 1);
    assert!(app.ingest().is_finished());
    assert_eq!(app.read_model().loaded_count, 8);
}

#[test]
fn test_open_prompt_submits_path() {
    let (mut app, _rx) = new_app();

    assert!(app.event(key(KeyCode::Char('o'))).is_none());
    assert_eq!(app.input_mode(), InputMode::OpenPrompt);

    // q is text while the prompt is open
    for c in "q.csv".chars() {
        assert!(app.event(key(KeyCode::Char(c))).is_none());
    }
    match app.event(key(KeyCode::Enter)) {
        Some(AppEvent::Open(path)) => assert_eq!(path, PathBuf::from("q.csv")),
        _ => panic!("expected an Open event"),
    }
    assert_eq!(app.input_mode(), InputMode::Normal);
}

#[test]
fn test_open_prompt_cancel() {
    let (mut app, _rx) = new_app();
    app.event(key(KeyCode::Char('o')));
    app.event(key(KeyCode::Char('x')));
    assert!(app.event(key(KeyCode::Esc)).is_none());
    assert_eq!(app.input_mode(), InputMode::Normal);

    // Empty submit keeps the prompt open
    app.event(key(KeyCode::Char('o')));
    assert!(app.event(key(KeyCode::Enter)).is_none());
    assert_eq!(app.input_mode(), InputMode::OpenPrompt);
}

#[test]
fn test_quit_keys() {
    let (mut app, _rx) = new_app();
    assert!(matches!(app.event(key(KeyCode::Char('q'))), Some(AppEvent::Exit)));
    assert!(matches!(app.event(key(KeyCode::Esc)), Some(AppEvent::Exit)));
    let ctrl_c = AppEvent::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
    assert!(matches!(app.event(ctrl_c), Some(AppEvent::Exit)));
}

#[test]
fn test_reload_and_export_need_context() {
    let (mut app, _rx) = new_app();
    assert!(app.event(key(KeyCode::Char('r'))).is_none());

    assert!(app.event(key(KeyCode::Char('e'))).is_none());
    assert!(app.status().is_some_and(|s| s.is_error));
}

#[test]
fn test_reload_reopens_current_file() {
    let (_dir, path) = write_temp_file("data.csv", &numbered_csv(2));
    let (mut app, rx) = new_app();
    open(&mut app, &path);
    run_session(&mut app, &rx, 1);

    match app.event(key(KeyCode::Char('r'))) {
        Some(AppEvent::Open(reopened)) => assert_eq!(reopened, path),
        _ => panic!("expected reload to reopen the file"),
    }
}

#[test]
fn test_export_key_targets_png_once_a_series_is_selected() {
    let (_dir, path) = write_temp_file("sales.csv", &numbered_csv(20));
    let (mut app, rx) = new_app();
    open(&mut app, &path);
    run_session(&mut app, &rx, 1);

    app.event(key(KeyCode::Tab));
    app.event(key(KeyCode::Enter));
    assert_eq!(app.read_model().series_columns, ["t".to_string()]);

    match app.event(key(KeyCode::Char('e'))) {
        Some(AppEvent::ExportChart(out)) => {
            let name = out.to_string_lossy().to_string();
            assert!(name.starts_with("sales-chart-"), "got {}", name);
            assert!(name.ends_with(".png"));
        }
        _ => panic!("expected an export request"),
    }
}

#[test]
fn test_headless_load_with_selection() {
    let (_dir, path) = write_temp_file("data.csv", &numbered_csv(12));
    let run = load_headless(
        &path,
        &fast_options(),
        Some("t"),
        &["value".to_string(), "nope".to_string()],
    )
    .expect("headless load");

    assert!(run.error.is_none());
    assert_eq!(run.unknown_columns, vec!["nope".to_string()]);
    assert!(run.ingest.is_finished());
    assert_eq!(run.ingest.visible_rows().len(), 12);

    let json: serde_json::Value =
        serde_json::from_str(&run.to_json().expect("json")).expect("valid json");
    assert_eq!(json["headers"], serde_json::json!(["t", "value", "label"]));
    assert_eq!(json["axisColumn"], "t");
    assert_eq!(json["seriesColumns"], serde_json::json!(["value"]));
    assert_eq!(json["loadedCount"], 12);
    assert_eq!(json["totalCount"], 12);
    assert_eq!(json["finished"], true);
    assert_eq!(json["percentLoaded"], 100.0);
    assert_eq!(json["visibleRows"][2]["value"], 4.0);
    assert_eq!(json["visibleRows"][2]["label"], "row_2");
    assert!(json.get("error").is_none());
}

#[test]
fn test_headless_axis_prefers_idx_column_over_row_index() {
    let (_dir, path) = write_temp_file("data.csv", "idx,v\n10,1\n20,2\n30,3\n");

    let run = load_headless(&path, &fast_options(), Some("idx"), &["v".to_string()])
        .expect("headless load");
    assert!(run.unknown_columns.is_empty());
    assert_eq!(
        run.ingest.selection().axis(),
        &AxisColumn::Column("idx".to_string())
    );

    let (_dir, path) = write_temp_file("data.csv", &numbered_csv(3));
    let run = load_headless(&path, &fast_options(), Some("idx"), &[]).expect("headless load");
    assert!(run.unknown_columns.is_empty());
    assert_eq!(run.ingest.selection().axis(), &AxisColumn::Index);
}

#[test]
fn test_headless_missing_file_is_an_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    let result = load_headless(
        &dir.path().join("missing.csv"),
        &fast_options(),
        None,
        &[],
    );
    assert!(result.is_err());
}
