//! Application state for the dashboard.
//!
//! [`App::update`] is the only place state changes. It consumes one message,
//! mutates in place and returns the next [`Cmd`]. It performs no I/O; the
//! scheduler runs whatever it asks for.

mod dashboard;
mod search;

use std::sync::Arc;
use std::time::Duration;

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ksd_core::config::DashboardConfig;
use ksd_core::{Error, KsContext, MetricsSnapshot};

use crate::command::{ChangeKind, Cmd, Msg, Task, Tool};

/// Top-level screens, one active at a time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Screen {
    #[default]
    Dashboard,
    Search,
    Analytics,
    Processes,
    Capture,
}

impl Screen {
    pub const ALL: [Screen; 5] = [
        Screen::Dashboard,
        Screen::Search,
        Screen::Analytics,
        Screen::Processes,
        Screen::Capture,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Screen::Dashboard => "Dashboard",
            Screen::Search => "Search",
            Screen::Analytics => "Analytics",
            Screen::Processes => "Processes",
            Screen::Capture => "Capture",
        }
    }

    /// Digit and mnemonic letter bound to this screen.
    pub fn keys(&self) -> [char; 2] {
        match self {
            Screen::Dashboard => ['1', 'd'],
            Screen::Search => ['2', 's'],
            Screen::Analytics => ['3', 'a'],
            Screen::Processes => ['4', 'p'],
            Screen::Capture => ['5', 'c'],
        }
    }

    fn from_key(c: char) -> Option<Screen> {
        Screen::ALL.into_iter().find(|s| s.keys().contains(&c))
    }
}

/// Search screen state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchSession {
    /// Term that produced `results`
    pub term: String,
    /// True while keystrokes go to `input`
    pub editing: bool,
    pub input: String,
    pub results: Vec<String>,
}

/// Health of the hot log watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Watching,
    /// Waiting to re-arm after consecutive failures
    Backoff { failures: u32 },
    /// No watch possible; refreshing on a timer
    Polling,
}

/// Main application state.
pub struct App {
    ctx: Arc<KsContext>,
    /// Current screen
    pub screen: Screen,
    /// Latest successful refresh
    pub metrics: MetricsSnapshot,
    pub search: SearchSession,
    /// Sticky error; replaces the whole view until quit
    pub error: Option<Error>,
    /// Last refresh failure, cleared by the next successful refresh
    pub refresh_error: Option<String>,
    watch: WatchState,
    /// Terminal size
    pub width: u16,
    pub height: u16,
    /// Whether the app should quit
    pub should_quit: bool,
    next_request: u64,
    metrics_request: u64,
    search_request: u64,
    refresh_interval: Duration,
    watch_backoff: Duration,
}

impl App {
    pub fn new(ctx: Arc<KsContext>, config: &DashboardConfig) -> Self {
        Self {
            ctx,
            screen: Screen::default(),
            metrics: MetricsSnapshot::default(),
            search: SearchSession::default(),
            error: None,
            refresh_error: None,
            watch: WatchState::Watching,
            width: 80,
            height: 24,
            should_quit: false,
            next_request: 0,
            metrics_request: 0,
            search_request: 0,
            refresh_interval: config.refresh_interval(),
            watch_backoff: config.watch_backoff(),
        }
    }

    #[cfg(test)]
    pub fn with_watch_backoff(mut self, backoff: Duration) -> Self {
        self.watch_backoff = backoff;
        self
    }

    pub fn ctx(&self) -> &KsContext {
        &self.ctx
    }

    pub fn watch_state(&self) -> WatchState {
        self.watch
    }

    /// Commands to run at startup: first refresh and the first watch.
    pub fn init(&mut self) -> Cmd {
        Cmd::batch([self.refresh(), Cmd::Run(Task::WatchLog)])
    }

    /// Apply one message.
    pub fn update(&mut self, msg: Msg) -> Cmd {
        match msg {
            Msg::Key(key) => self.handle_key(key),
            Msg::Resize { width, height } => {
                self.width = width;
                self.height = height;
                Cmd::None
            }
            Msg::Tick => Cmd::batch([self.refresh(), Cmd::Tick(self.refresh_interval)]),
            Msg::MetricsLoaded { request, snapshot } => {
                if request != self.metrics_request {
                    tracing::debug!(request, latest = self.metrics_request, "Dropping stale metrics");
                    return Cmd::None;
                }
                self.metrics = *snapshot;
                self.refresh_error = None;
                Cmd::None
            }
            Msg::MetricsFailed { request, error } => {
                if request == self.metrics_request {
                    self.refresh_error = Some(error.to_string());
                }
                Cmd::None
            }
            Msg::SearchCompleted {
                request,
                term,
                results,
            } => {
                if request != self.search_request {
                    tracing::debug!(request, latest = self.search_request, "Dropping stale search");
                    return Cmd::None;
                }
                self.search.term = term;
                self.search.results = results;
                Cmd::None
            }
            Msg::SearchFailed { request, error } => {
                if request == self.search_request {
                    self.set_error(error);
                }
                Cmd::None
            }
            Msg::LogChanged(kind) => {
                self.watch = WatchState::Watching;
                match kind {
                    ChangeKind::Write => Cmd::batch([self.refresh(), Cmd::Run(Task::WatchLog)]),
                    ChangeKind::Other => Cmd::Run(Task::WatchLog),
                }
            }
            Msg::WatchFailed(error) => {
                let failures = match self.watch {
                    WatchState::Backoff { failures } => failures + 1,
                    _ => 1,
                };
                tracing::warn!(%error, failures, "Hot log watch failed, retrying");
                self.watch = WatchState::Backoff { failures };
                Cmd::Sequence(vec![
                    Cmd::delay(self.watch_backoff, Cmd::None),
                    Cmd::Run(Task::WatchLog),
                ])
            }
            Msg::WatchUnavailable(error) => {
                tracing::warn!(%error, "Hot log watch unavailable, polling instead");
                self.watch = WatchState::Polling;
                Cmd::Tick(self.refresh_interval)
            }
            Msg::ToolExited { tool, result } => match result {
                Ok(()) => {
                    tracing::info!(tool = tool.name(), "Tool finished");
                    self.refresh()
                }
                Err(error) => {
                    self.set_error(error);
                    Cmd::None
                }
            },
        }
    }

    /// Issue a metrics reload, superseding any in flight.
    fn refresh(&mut self) -> Cmd {
        self.metrics_request = self.issue_request();
        Cmd::Run(Task::LoadMetrics {
            request: self.metrics_request,
        })
    }

    fn issue_request(&mut self) -> u64 {
        self.next_request += 1;
        self.next_request
    }

    fn set_error(&mut self, error: Error) {
        tracing::error!(%error, "Dashboard error");
        self.error = Some(error);
    }

    /// Handle keyboard input.
    fn handle_key(&mut self, key: KeyEvent) -> Cmd {
        if key.kind != KeyEventKind::Press {
            return Cmd::None;
        }

        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return Cmd::None;
        }

        // Sticky error: nothing but quit
        if self.error.is_some() {
            if key.code == KeyCode::Char('q') {
                self.should_quit = true;
            }
            return Cmd::None;
        }

        if self.screen == Screen::Search && self.search.editing {
            return self.handle_search_edit_key(key);
        }

        match key.code {
            KeyCode::Char('q') => {
                self.should_quit = true;
                Cmd::None
            }
            KeyCode::Char('f') => self.refresh(),
            KeyCode::Char(c) => match Screen::from_key(c) {
                Some(screen) => {
                    self.screen = screen;
                    Cmd::None
                }
                None => self.handle_screen_key(key),
            },
            _ => self.handle_screen_key(key),
        }
    }

    fn handle_screen_key(&mut self, key: KeyEvent) -> Cmd {
        match self.screen {
            Screen::Dashboard => self.handle_dashboard_key(key),
            Screen::Search => self.handle_search_key(key),
            Screen::Analytics | Screen::Processes | Screen::Capture => Cmd::None,
        }
    }
}
