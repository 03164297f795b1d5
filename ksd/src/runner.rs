//! Production task runner.
//!
//! Binds each [`Task`] to the hot log reader, the process adapter and the
//! file watcher. Every failure is returned as a message.

use std::sync::Arc;

use ksd_core::config::DashboardConfig;
use ksd_core::{events, Error, KsContext, MetricsSnapshot, Result};

use crate::command::{Msg, Task};
use crate::process::{self, Launcher};
use crate::runtime::TaskRunner;
use crate::watch;

pub struct LiveRunner {
    ctx: Arc<KsContext>,
    dashboard: DashboardConfig,
    launcher: Launcher,
}

impl LiveRunner {
    pub fn new(ctx: Arc<KsContext>, dashboard: DashboardConfig, launcher: Launcher) -> Self {
        Self {
            ctx,
            dashboard,
            launcher,
        }
    }

    /// Gather one metrics snapshot.
    pub fn load_metrics(&self) -> Result<MetricsSnapshot> {
        let total = self.count_events()?;
        let pending = self.pending_reviews();
        let latest =
            events::tail_last_event_within(&self.ctx.hot_log, self.dashboard.tail_window_bytes);
        let now = chrono::Local::now().format("%H:%M:%S").to_string();

        tracing::debug!(total, pending, has_latest = latest.is_some(), "Metrics refreshed");
        Ok(MetricsSnapshot::new(total, pending, latest, now))
    }

    /// Total captured events, from the configured counter or the log itself.
    pub fn count_events(&self) -> Result<u64> {
        match self.launcher.event_count() {
            Some(inv) => {
                let out = process::run_captured(&inv)?;
                parse_count(&out).ok_or_else(|| Error::Process {
                    command: inv.display.clone(),
                    message: format!("expected a number, got {:?}", out),
                })
            }
            None => Ok(events::count_events(&self.ctx.hot_log)? as u64),
        }
    }

    /// Pending reviews; the queue tooling is optional, so failures count as 0.
    fn pending_reviews(&self) -> u64 {
        let Some(inv) = self.launcher.pending_count() else {
            return 0;
        };
        match process::run_captured(&inv) {
            Ok(out) => parse_count(&out).unwrap_or(0),
            Err(e) => {
                tracing::warn!(error = %e, "Pending review count unavailable");
                0
            }
        }
    }

    fn search(&self, term: &str) -> Result<Vec<String>> {
        let out = process::run_captured(&self.launcher.search(term))?;
        Ok(split_results(&out))
    }
}

impl TaskRunner for LiveRunner {
    fn run(&self, task: Task) -> Msg {
        match task {
            Task::LoadMetrics { request } => match self.load_metrics() {
                Ok(snapshot) => Msg::MetricsLoaded {
                    request,
                    snapshot: Box::new(snapshot),
                },
                Err(error) => {
                    tracing::warn!(%error, "Metrics refresh failed");
                    Msg::MetricsFailed { request, error }
                }
            },
            Task::WatchLog => watch::watch_once(Some(&self.ctx.hot_log)),
            Task::Search { request, term } => match self.search(&term) {
                Ok(results) => {
                    tracing::info!(%term, hits = results.len(), "Search completed");
                    Msg::SearchCompleted {
                        request,
                        term,
                        results,
                    }
                }
                Err(error) => {
                    tracing::warn!(%term, %error, "Search failed");
                    Msg::SearchFailed { request, error }
                }
            },
        }
    }
}

fn parse_count(out: &str) -> Option<u64> {
    out.split_whitespace().next()?.parse().ok()
}

/// One result per non-blank output line, in tool order.
fn split_results(out: &str) -> Vec<String> {
    out.lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ksd_core::config::ToolsConfig;
    use ksd_core::ContextKind;
    use std::path::Path;
    use tempfile::TempDir;

    fn runner(root: &Path, tools: ToolsConfig) -> LiveRunner {
        let ctx = Arc::new(KsContext {
            root: root.to_path_buf(),
            knowledge_dir: root.join("knowledge"),
            events_dir: root.join("knowledge/events"),
            hot_log: root.join("hot.jsonl"),
            model: None,
            kind: ContextKind::Standalone,
        });
        let launcher = Launcher::new(ctx.clone(), tools);
        LiveRunner::new(ctx, DashboardConfig::default(), launcher)
    }

    fn sh_tools() -> ToolsConfig {
        ToolsConfig {
            shell: "sh".to_string(),
            preamble: String::new(),
            pending_count: None,
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count("12\n"), Some(12));
        assert_eq!(parse_count("  7 hot.jsonl"), Some(7));
        assert_eq!(parse_count(""), None);
        assert_eq!(parse_count("null"), None);
    }

    #[test]
    fn test_split_results_drops_blank_lines() {
        assert_eq!(split_results("a\n\n  \nb  \n"), vec!["a", "b"]);
        assert!(split_results("").is_empty());
    }

    #[test]
    fn test_load_metrics_from_log() {
        let dir = TempDir::new().unwrap();
        let lines: String = (0..9)
            .map(|i| format!("{{\"ts\":\"2025-01-01T00:00:0{}Z\",\"type\":\"thought\",\"content\":\"n{}\"}}\n", i, i))
            .collect();
        std::fs::write(dir.path().join("hot.jsonl"), lines).unwrap();

        let snapshot = runner(dir.path(), sh_tools()).load_metrics().unwrap();
        assert_eq!(snapshot.total_events, 9);
        assert_eq!(snapshot.until_theme, 1);
        assert_eq!(snapshot.pending_reviews, 0);
        assert_eq!(
            snapshot.latest_event.as_ref().map(|e| e.primary_text()),
            Some("n8")
        );
        assert_eq!(snapshot.last_refresh.len(), 8);
    }

    #[test]
    fn test_configured_counters() {
        let dir = TempDir::new().unwrap();
        let mut tools = sh_tools();
        tools.event_count = Some("echo 20".to_string());
        tools.pending_count = Some("echo 3".to_string());

        let snapshot = runner(dir.path(), tools).load_metrics().unwrap();
        assert_eq!(snapshot.total_events, 20);
        assert_eq!(snapshot.pending_reviews, 3);
        assert!(snapshot.latest_event.is_none());
    }

    #[test]
    fn test_failing_pending_count_is_zero() {
        let dir = TempDir::new().unwrap();
        let mut tools = sh_tools();
        tools.pending_count = Some("exit 1".to_string());

        let snapshot = runner(dir.path(), tools).load_metrics().unwrap();
        assert_eq!(snapshot.pending_reviews, 0);
    }

    #[test]
    fn test_bad_event_count_fails_refresh() {
        let dir = TempDir::new().unwrap();
        let mut tools = sh_tools();
        tools.event_count = Some("echo lots".to_string());

        let msg = runner(dir.path(), tools).run(Task::LoadMetrics { request: 4 });
        assert!(matches!(
            msg,
            Msg::MetricsFailed {
                request: 4,
                error: Error::Process { .. }
            }
        ));
    }

    #[test]
    fn test_search_task() {
        let dir = TempDir::new().unwrap();
        let mut tools = sh_tools();
        tools.search = "printf 'first\\n\\nsecond\\n'; echo".to_string();

        match runner(dir.path(), tools).run(Task::Search {
            request: 2,
            term: "memory".to_string(),
        }) {
            Msg::SearchCompleted {
                request,
                term,
                results,
            } => {
                assert_eq!(request, 2);
                assert_eq!(term, "memory");
                assert_eq!(results, vec!["first", "second", "memory"]);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_search_failure_is_message() {
        let dir = TempDir::new().unwrap();
        let mut tools = sh_tools();
        tools.search = "exit 2;".to_string();

        let msg = runner(dir.path(), tools).run(Task::Search {
            request: 5,
            term: "x".to_string(),
        });
        assert!(matches!(msg, Msg::SearchFailed { request: 5, .. }));
    }
}
