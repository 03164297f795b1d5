//! ksd-events - Knowledge System Event Viewer
//!
//! Reads the whole hot log once and shows it as a scrollable list.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, Event as TermEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ksd_core::context::DEFAULT_HOT_LOG;
use ksd_core::format::truncate;
use ksd_core::{events, Config, Event, KsContext, Theme};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Layout},
    text::Line,
    widgets::{List, ListItem, ListState, Paragraph},
    Frame, Terminal,
};

/// Browse every event in the knowledge-system hot log
#[derive(Parser, Debug)]
#[command(name = "ksd-events", version, about)]
struct Args {
    /// Log file to read instead of the configured hot log
    path: Option<PathBuf>,
}

/// Viewer state.
struct Viewer {
    events: Vec<Event>,
    error: Option<String>,
    list_state: ListState,
    should_quit: bool,
}

impl Viewer {
    fn new(loaded: ksd_core::Result<Vec<Event>>) -> Self {
        let (events, error) = match loaded {
            Ok(events) => (events, None),
            Err(e) => (Vec::new(), Some(format!("reading events: {}", e))),
        };
        let mut list_state = ListState::default();
        if !events.is_empty() {
            list_state.select(Some(0));
        }
        Self {
            events,
            error,
            list_state,
            should_quit: false,
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true
            }
            _ if self.error.is_some() => {}
            KeyCode::Down | KeyCode::Char('j') => self.select_next(),
            KeyCode::Up | KeyCode::Char('k') => self.select_previous(),
            KeyCode::Home | KeyCode::Char('g') => self.select_first(),
            KeyCode::End | KeyCode::Char('G') => self.select_last(),
            _ => {}
        }
    }

    fn select_next(&mut self) {
        if let Some(i) = self.list_state.selected() {
            if i + 1 < self.events.len() {
                self.list_state.select(Some(i + 1));
            }
        }
    }

    fn select_previous(&mut self) {
        if let Some(i) = self.list_state.selected() {
            self.list_state.select(Some(i.saturating_sub(1)));
        }
    }

    fn select_first(&mut self) {
        if !self.events.is_empty() {
            self.list_state.select(Some(0));
        }
    }

    fn select_last(&mut self) {
        if !self.events.is_empty() {
            self.list_state.select(Some(self.events.len() - 1));
        }
    }
}

/// Read `path`, retrying `fallback` when that fails.
///
/// If both fail the first error is kept; it names the configured log.
fn load_events(path: &Path, fallback: &Path) -> ksd_core::Result<Vec<Event>> {
    match events::read_all(path) {
        Ok(events) => Ok(events),
        Err(e) if path != fallback => {
            tracing::warn!(path = %path.display(), error = %e, "Reading hot log failed, trying fallback");
            events::read_all(fallback).map_err(|_| e)
        }
        Err(e) => Err(e),
    }
}

/// `time | type | content` with the type padded and the content cut at 60.
fn event_row(event: &Event) -> String {
    format!(
        "{} | {:<8} | {}",
        event.display_time(),
        event.event_type,
        truncate(event.primary_text(), 60)
    )
}

fn render(frame: &mut Frame, viewer: &mut Viewer, theme: &Theme) {
    if let Some(error) = &viewer.error {
        let text = vec![
            Line::styled(format!("Error: {}", error), theme.normal),
            Line::default(),
            Line::styled("Press q to quit.", theme.help),
        ];
        frame.render_widget(Paragraph::new(text), frame.area());
        return;
    }

    let [title_area, list_area, help_area] = Layout::vertical([
        Constraint::Length(2),
        Constraint::Min(1),
        Constraint::Length(2),
    ])
    .areas(frame.area());

    frame.render_widget(
        Paragraph::new(Line::styled("Knowledge System Event Viewer", theme.title)),
        title_area,
    );

    if viewer.events.is_empty() {
        frame.render_widget(Paragraph::new("No events found."), list_area);
    } else {
        let items: Vec<ListItem> = viewer
            .events
            .iter()
            .map(|e| ListItem::new(event_row(e)).style(theme.normal))
            .collect();
        let list = List::new(items).highlight_style(theme.selected);
        frame.render_stateful_widget(list, list_area, &mut viewer.list_state);
    }

    frame.render_widget(
        Paragraph::new(vec![
            Line::default(),
            Line::styled("↑/↓: navigate • q: quit", theme.help),
        ]),
        help_area,
    );
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load().context("failed to load configuration")?;
    let _log_guard =
        ksd_core::logging::init(&config.logging).context("failed to initialize logging")?;

    let loaded = match args.path {
        Some(path) => {
            tracing::info!(path = %path.display(), "Loading events");
            events::read_all(&path)
        }
        None => {
            let path = KsContext::discover()
                .map(|ctx| ctx.hot_log)
                .unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "No knowledge-system context, using default hot log path");
                    PathBuf::from(DEFAULT_HOT_LOG)
                });
            tracing::info!(path = %path.display(), "Loading events");
            load_events(&path, Path::new(DEFAULT_HOT_LOG))
        }
    };
    let mut viewer = Viewer::new(loaded);
    let theme = Theme::from_env();

    // Setup terminal
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("failed to create terminal")?;

    let result = run_viewer(&mut terminal, &mut viewer, &theme);

    // Restore terminal
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor().context("failed to show cursor")?;

    result
}

fn run_viewer(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    viewer: &mut Viewer,
    theme: &Theme,
) -> Result<()> {
    while !viewer.should_quit {
        terminal.draw(|frame| render(frame, viewer, theme))?;

        if event::poll(Duration::from_millis(100))? {
            if let TermEvent::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    viewer.handle_key(key);
                }
            }
        }
    }
    Ok(())
}
