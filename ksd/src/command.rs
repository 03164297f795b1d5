//! Commands and messages exchanged between the dashboard and the scheduler.
//!
//! A [`Cmd`] is plain data describing work to do. The scheduler in
//! [`crate::runtime`] turns it into concurrent work and every completion
//! comes back as exactly one [`Msg`]. Nothing here performs I/O.

use std::time::Duration;

use crossterm::event::KeyEvent;
use ksd_core::{Error, MetricsSnapshot, Result};

/// Deferred work returned by the state machine.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Cmd {
    /// Nothing to do
    #[default]
    None,
    /// Run a task off the control thread; it yields one message
    Run(Task),
    /// Hand the terminal to an interactive tool until it exits
    Exec(Tool),
    /// Deliver `Msg::Tick` after the duration
    Tick(Duration),
    /// Dispatch the inner command after the duration; with `None` it is a pause
    Delay(Duration, Box<Cmd>),
    /// Start every command concurrently, completion order unconstrained
    Batch(Vec<Cmd>),
    /// Run commands one after another, each to completion
    Sequence(Vec<Cmd>),
}

impl Cmd {
    /// Combine commands, dropping `None`s and flattening single entries.
    pub fn batch(cmds: impl IntoIterator<Item = Cmd>) -> Cmd {
        let mut cmds: Vec<Cmd> = cmds.into_iter().filter(|c| !c.is_none()).collect();
        match cmds.len() {
            0 => Cmd::None,
            1 => cmds.remove(0),
            _ => Cmd::Batch(cmds),
        }
    }

    pub fn delay(after: Duration, cmd: Cmd) -> Cmd {
        Cmd::Delay(after, Box::new(cmd))
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Cmd::None)
    }
}

/// Background work that produces one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    /// Count events, pending reviews and read the newest event
    LoadMetrics { request: u64 },
    /// Wait for one change on the hot log
    WatchLog,
    /// Run the search tool for `term`
    Search { request: u64, term: String },
}

/// Interactive external tools that take over the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    Review,
    CheckTriggers,
    KnowledgeQuery,
    JsonViewer,
}

impl Tool {
    pub fn name(&self) -> &'static str {
        match self {
            Tool::Review => "review",
            Tool::CheckTriggers => "check-triggers",
            Tool::KnowledgeQuery => "knowledge-query",
            Tool::JsonViewer => "json-viewer",
        }
    }
}

/// How a watched file changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Data was written; metrics are stale
    Write,
    /// Creation, rename, metadata change or anything else
    Other,
}

/// Everything the state machine reacts to.
#[derive(Debug)]
pub enum Msg {
    Key(KeyEvent),
    Resize {
        width: u16,
        height: u16,
    },
    Tick,
    MetricsLoaded {
        request: u64,
        snapshot: Box<MetricsSnapshot>,
    },
    MetricsFailed {
        request: u64,
        error: Error,
    },
    SearchCompleted {
        request: u64,
        term: String,
        results: Vec<String>,
    },
    SearchFailed {
        request: u64,
        error: Error,
    },
    LogChanged(ChangeKind),
    /// The watcher broke; worth retrying
    WatchFailed(Error),
    /// No path to watch; retrying would not help
    WatchUnavailable(Error),
    ToolExited {
        tool: Tool,
        result: Result<()>,
    },
}

impl Msg {
    /// The failure message for a task that never produced its own.
    pub fn task_failed(task: &Task, error: Error) -> Msg {
        match task {
            Task::LoadMetrics { request } => Msg::MetricsFailed {
                request: *request,
                error,
            },
            Task::Search { request, .. } => Msg::SearchFailed {
                request: *request,
                error,
            },
            Task::WatchLog => Msg::WatchFailed(error),
        }
    }
}
