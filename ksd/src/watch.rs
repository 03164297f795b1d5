//! Single-shot hot log watch.
//!
//! [`watch_once`] blocks until the watcher reports one change (or one error)
//! for the hot log and returns it as a message. Plain opens and reads are
//! skipped. The dashboard re-issues the
//! watch after every message, so there is no long-lived subscription.

use std::path::Path;
use std::sync::mpsc;

use ksd_core::{Error, Result};
use notify::event::{AccessKind, AccessMode, ModifyKind};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::command::{ChangeKind, Msg};

/// Wait for the next change to `path`.
pub fn watch_once(path: Option<&Path>) -> Msg {
    let Some(path) = path.filter(|p| !p.as_os_str().is_empty()) else {
        return Msg::WatchUnavailable(Error::Watch("no hot log path configured".to_string()));
    };

    match wait_for_change(path) {
        Ok(kind) => {
            tracing::trace!(path = %path.display(), ?kind, "Hot log changed");
            Msg::LogChanged(kind)
        }
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "Hot log watch failed");
            Msg::WatchFailed(e)
        }
    }
}

fn wait_for_change(path: &Path) -> Result<ChangeKind> {
    let (tx, rx) = mpsc::channel();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| {
            let _ = tx.send(res);
        },
        Config::default(),
    )
    .map_err(watch_error)?;

    watcher
        .watch(path, RecursiveMode::NonRecursive)
        .map_err(watch_error)?;

    loop {
        let event = rx
            .recv()
            .map_err(|_| Error::Watch("watcher stopped before reporting".to_string()))?
            .map_err(watch_error)?;

        if is_access_only(&event.kind) {
            tracing::trace!(kind = ?event.kind, "Ignoring hot log access");
            continue;
        }
        return Ok(classify(&event.kind));
    }
}

fn watch_error(e: notify::Error) -> Error {
    Error::Watch(e.to_string())
}

/// Opens, reads and read-only closes. They say nothing about the content and
/// must not end the watch, or the write that follows an open is missed.
fn is_access_only(kind: &EventKind) -> bool {
    matches!(kind, EventKind::Access(access) if *access != AccessKind::Close(AccessMode::Write))
}

/// Only data modifications make metrics stale.
pub fn classify(kind: &EventKind) -> ChangeKind {
    match kind {
        EventKind::Modify(ModifyKind::Data(_))
        | EventKind::Modify(ModifyKind::Any)
        | EventKind::Access(AccessKind::Close(AccessMode::Write)) => ChangeKind::Write,
        _ => ChangeKind::Other,
    }
}
