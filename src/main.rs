mod app;
mod charts;
mod config;
mod data;
mod format;
mod tooltip;
mod ui;
mod view;

use anyhow::{anyhow, Context, Result};
use app::App;
use clap::Parser;
use config::{Cli, Settings};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, MouseButton, MouseEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, layout::Rect, Terminal};
use std::{
    fs::{self, OpenOptions},
    io,
    sync::Mutex,
    time::Duration,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use view::ViewMode;

const EVENT_POLL_MILLIS: u64 = 100;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::resolve(Cli::parse())?;
    init_logging(&settings)?;
    info!(source = %settings.source, log_file = %settings.log_file.display(), "starting dashboard");

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(settings.source);
    app.start_load();
    let res = run_app(&mut terminal, &mut app);
    drop(app);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        error!(error = ?err, "dashboard stopped");
        eprintln!("Error: {err:?}");
    }

    info!("dashboard closed");
    Ok(())
}

/// Log to a file: stdout is the dashboard.
fn init_logging(settings: &Settings) -> Result<()> {
    if let Some(dir) = settings.log_file.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create log directory {}", dir.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&settings.log_file)
        .with_context(|| format!("failed to open log file {}", settings.log_file.display()))?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(settings.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|err| anyhow!("failed to install log subscriber: {err}"))
}

#[derive(Debug, PartialEq)]
enum Action {
    None,
    Quit,
    SelectView(ViewMode),
    HoverNext,
    HoverPrev,
    ClearHover,
}

fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    loop {
        // Pick up the projection once the background load finishes (non-blocking)
        app.process_load_results();

        terminal.draw(|f| ui::ui(f, app))?;
        // Note: clickable_regions are updated during ui() rendering

        if event::poll(Duration::from_millis(EVENT_POLL_MILLIS))? {
            let action = match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => handle_input(app, key.code),
                Event::Mouse(mouse) => handle_mouse(app, mouse.kind, mouse.column, mouse.row),
                _ => Action::None,
            };

            if apply_action(app, action) {
                return Ok(());
            }
        }
    }
}

/// Returns true when the dashboard should exit.
fn apply_action(app: &mut App, action: Action) -> bool {
    match action {
        Action::Quit => return true,
        Action::SelectView(mode) => app.select_view(mode),
        Action::HoverNext => app.hover_next(),
        Action::HoverPrev => app.hover_prev(),
        Action::ClearHover => app.clear_hover(),
        Action::None => {}
    }
    false
}

fn handle_input(app: &App, key: KeyCode) -> Action {
    match key {
        KeyCode::Char('q') => Action::Quit,
        KeyCode::Char(c @ '1'..='3') => {
            let idx = c as usize - '1' as usize;
            ViewMode::from_index(idx).map(Action::SelectView).unwrap_or(Action::None)
        }
        KeyCode::Tab => Action::SelectView(app.view.next()),
        KeyCode::BackTab => Action::SelectView(app.view.prev()),
        KeyCode::Right | KeyCode::Char('l') => Action::HoverNext,
        KeyCode::Left | KeyCode::Char('h') => Action::HoverPrev,
        KeyCode::Esc => Action::ClearHover,
        _ => Action::None,
    }
}

/// Check if a point (x, y) is inside a Rect
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, kind: MouseEventKind, x: u16, y: u16) -> Action {
    match kind {
        MouseEventKind::Moved | MouseEventKind::Drag(MouseButton::Left) => {
            app.hover_at(x, y);
            Action::None
        }
        MouseEventKind::Down(MouseButton::Left) => app
            .clickable_regions
            .view_tabs
            .iter()
            .find(|(rect, _)| point_in_rect(x, y, *rect))
            .map(|(_, mode)| Action::SelectView(*mode))
            .unwrap_or(Action::None),
        _ => Action::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{parse_rows, DataSource, LoadMessage};
    use ratatui::backend::TestBackend;
    use std::path::PathBuf;

    fn drawn_app() -> App {
        let mut app = App::new(DataSource::Path(PathBuf::from("p.csv")));
        let rows = parse_rows(
            "Year,Portfolio (Selling $20K),Market Return (%)\n1,100000,5.0\n2,95000,-3.2\n3,99000,4.4",
        )
        .unwrap();
        app.apply(LoadMessage::Rows(rows));
        let mut terminal = Terminal::new(TestBackend::new(120, 32)).unwrap();
        terminal.draw(|f| ui::ui(f, &mut app)).unwrap();
        app
    }

    fn press(app: &mut App, key: KeyCode) -> bool {
        let action = handle_input(app, key);
        apply_action(app, action)
    }

    #[test]
    fn logging_installs_once() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            source: DataSource::Path(PathBuf::from("p.csv")),
            log_file: dir.path().join("logs").join("projection-tui.log"),
            verbose: false,
        };

        init_logging(&settings).unwrap();
        assert!(settings.log_file.exists());

        let err = init_logging(&settings).unwrap_err();
        assert!(err.to_string().contains("log subscriber"));
    }

    #[test]
    fn number_keys_pick_views() {
        let app = App::new(DataSource::Path(PathBuf::from("p.csv")));
        assert_eq!(handle_input(&app, KeyCode::Char('1')), Action::SelectView(ViewMode::Portfolio));
        assert_eq!(handle_input(&app, KeyCode::Char('2')), Action::SelectView(ViewMode::Margin));
        assert_eq!(handle_input(&app, KeyCode::Char('3')), Action::SelectView(ViewMode::Market));
        assert_eq!(handle_input(&app, KeyCode::Char('4')), Action::None);
        assert_eq!(handle_input(&app, KeyCode::Char('q')), Action::Quit);
    }

    #[test]
    fn tab_cycles_views() {
        let mut app = App::new(DataSource::Path(PathBuf::from("p.csv")));
        assert!(!press(&mut app, KeyCode::Tab));
        assert_eq!(app.view, ViewMode::Margin);
        press(&mut app, KeyCode::Tab);
        press(&mut app, KeyCode::Tab);
        assert_eq!(app.view, ViewMode::Portfolio);
        press(&mut app, KeyCode::BackTab);
        assert_eq!(app.view, ViewMode::Market);
        assert!(press(&mut app, KeyCode::Char('q')));
    }

    #[test]
    fn clicking_a_tab_selects_it() {
        let mut app = drawn_app();
        let (rect, mode) = app.clickable_regions.view_tabs[2];
        assert_eq!(mode, ViewMode::Market);

        let action = handle_mouse(&mut app, MouseEventKind::Down(MouseButton::Left), rect.x + 2, rect.y);
        assert_eq!(action, Action::SelectView(ViewMode::Market));

        let miss = handle_mouse(&mut app, MouseEventKind::Down(MouseButton::Left), 0, 0);
        assert_eq!(miss, Action::None);
    }

    #[test]
    fn moving_over_chart_hovers_a_year() {
        let mut app = drawn_app();
        let plot = app.clickable_regions.chart.unwrap().plot;

        handle_mouse(&mut app, MouseEventKind::Moved, plot.x + plot.width - 1, plot.y + 1);
        assert_eq!(app.hovered_year, Some(3));

        handle_mouse(&mut app, MouseEventKind::Moved, plot.x, plot.y + 1);
        assert_eq!(app.hovered_year, Some(1));

        handle_mouse(&mut app, MouseEventKind::Moved, 0, 0);
        assert_eq!(app.hovered_year, None);
    }

    #[test]
    fn arrow_keys_move_hover() {
        let mut app = drawn_app();
        press(&mut app, KeyCode::Right);
        press(&mut app, KeyCode::Right);
        assert_eq!(app.hovered_year, Some(2));
        press(&mut app, KeyCode::Left);
        assert_eq!(app.hovered_year, Some(1));
        press(&mut app, KeyCode::Esc);
        assert_eq!(app.hovered_year, None);
    }
}
