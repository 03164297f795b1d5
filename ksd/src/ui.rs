//! UI rendering for the dashboard.
//!
//! [`view`] projects the app state to styled text and does nothing else, so
//! the same state always yields the same text. [`render`] draws it.

use ksd_core::format::truncate;
use ksd_core::{Error, Event, MetricsSnapshot, Theme, TriggerStatus};
use ratatui::{
    text::{Line, Span, Text},
    widgets::Paragraph,
    Frame,
};

use crate::app::{App, Screen, WatchState};

/// Width of the title and section rules.
const RULE_WIDTH: usize = 80;
/// Latest event preview wrapping.
const PREVIEW_WIDTH: usize = 70;
const PREVIEW_LINES: usize = 3;
/// Longest metadata string shown before truncation.
const METADATA_WIDTH: usize = 50;
/// Rows around the search results list (header, prompt, help).
const SEARCH_CHROME_ROWS: u16 = 18;
const MIN_SEARCH_ROWS: usize = 3;

/// Render the application UI.
pub fn render(frame: &mut Frame, app: &App, theme: &Theme) {
    frame.render_widget(Paragraph::new(view(app, theme)), frame.area());
}

/// The full screen as text.
pub fn view(app: &App, theme: &Theme) -> Text<'static> {
    if let Some(error) = &app.error {
        return error_view(error, theme);
    }

    let mut lines = header_lines(app, theme);
    lines.push(Line::default());
    match app.screen {
        Screen::Dashboard => dashboard_lines(&app.metrics, theme, &mut lines),
        Screen::Search => search_lines(app, theme, &mut lines),
        Screen::Analytics => analytics_lines(&app.metrics, theme, &mut lines),
        Screen::Processes => process_lines(&app.metrics, theme, &mut lines),
        Screen::Capture => capture_lines(theme, &mut lines),
    }
    lines.push(Line::default());
    lines.push(Line::styled(help_text(app), theme.help));

    Text::from(lines)
}

fn error_view(error: &Error, theme: &Theme) -> Text<'static> {
    Text::from(vec![
        Line::styled(format!("Error: {}", error), theme.normal),
        Line::default(),
        Line::styled("Press q to quit.", theme.help),
    ])
}

fn header_lines(app: &App, theme: &Theme) -> Vec<Line<'static>> {
    let ctx = app.ctx();
    let (title, paths) = match ctx.conversation_name() {
        Some(name) => (
            format!("KNOWLEDGE SYSTEM - {}", name.to_uppercase()),
            format!("Knowledge: {}", ctx.knowledge_dir.display()),
        ),
        None => (
            "KNOWLEDGE SYSTEM DASHBOARD".to_string(),
            format!(
                "Knowledge: {} | Hot Log: {}",
                ctx.knowledge_dir.display(),
                ctx.hot_log.display()
            ),
        ),
    };

    let mut nav = format!("Current: {}", app.screen.title());
    if let Some(name) = ctx.conversation_name() {
        nav.push_str(&format!(" | Context: {}", name));
    }

    let mut lines = vec![
        Line::styled(format!("{:^width$}", title, width = RULE_WIDTH), theme.title),
        Line::default(),
        Line::styled(paths, theme.status),
        Line::styled(nav, theme.status),
    ];
    if let Some(health) = health_text(app) {
        lines.push(Line::styled(health, theme.pending));
    }
    lines.push(rule('═', RULE_WIDTH, theme));
    lines
}

/// Watch and refresh problems that don't warrant the error view.
fn health_text(app: &App) -> Option<String> {
    let watch = match app.watch_state() {
        WatchState::Watching => None,
        WatchState::Backoff { failures } => Some(format!(
            "Watch: retrying ({} consecutive {})",
            failures,
            if failures == 1 { "failure" } else { "failures" }
        )),
        WatchState::Polling => Some("Watch: unavailable, polling".to_string()),
    };
    let refresh = app
        .refresh_error
        .as_ref()
        .map(|e| format!("Refresh failed: {}", e));

    match (watch, refresh) {
        (Some(w), Some(r)) => Some(format!("{} | {}", w, r)),
        (w, r) => w.or(r),
    }
}

fn rule(ch: char, width: usize, theme: &Theme) -> Line<'static> {
    Line::styled(ch.to_string().repeat(width), theme.separator)
}

// ========== Dashboard ==========

fn dashboard_lines(metrics: &MetricsSnapshot, theme: &Theme, lines: &mut Vec<Line<'static>>) {
    let reviews = if metrics.pending_reviews > 0 {
        Span::styled(metrics.pending_reviews.to_string(), theme.pending)
    } else {
        Span::raw("0")
    };
    lines.push(Line::from(vec![
        Span::raw("Events: "),
        Span::styled(metrics.total_events.to_string(), theme.ready),
        Span::raw(" | Reviews: "),
        reviews,
        Span::raw(format!(
            " | Active: {} | Updated: {}",
            metrics.active_processes, metrics.last_refresh
        )),
    ]));
    lines.push(rule('─', RULE_WIDTH, theme));

    lines.push(Line::raw("ANALYSIS TRIGGERS:"));
    let mut spans = vec![Span::raw("  ")];
    for (i, status) in metrics.triggers().iter().enumerate() {
        if i > 0 {
            spans.push(Span::raw(" | "));
        }
        spans.push(Span::raw(format!("{}: ", status.trigger.display_name())));
        spans.push(countdown_span(status, "to go", theme));
    }
    lines.push(Line::from(spans));

    if let Some(event) = &metrics.latest_event {
        latest_event_lines(event, theme, lines);
    }

    if metrics.pending_reviews > 0 {
        lines.push(rule('─', RULE_WIDTH, theme));
        lines.push(Line::raw("PENDING REVIEWS:"));
        lines.push(Line::raw(format!(
            "  {} analysis/analyses ready for review",
            metrics.pending_reviews
        )));
    }
}

fn countdown_span(status: &TriggerStatus, unit: &str, theme: &Theme) -> Span<'static> {
    if status.ready {
        Span::styled("Ready", theme.ready)
    } else {
        Span::raw(format!("{} {}", status.remaining, unit))
    }
}

fn latest_event_lines(event: &Event, theme: &Theme, lines: &mut Vec<Line<'static>>) {
    lines.push(rule('─', RULE_WIDTH, theme));
    lines.push(Line::styled("LATEST EVENT", theme.header));
    lines.push(Line::from(vec![
        Span::raw("Type: "),
        Span::styled(event.event_type.clone(), theme.ready),
        Span::raw(" | Time: "),
        Span::styled(event.display_time(), theme.normal),
    ]));

    lines.push(Line::raw("Content:"));
    for line in wrap_preview(event.primary_text(), PREVIEW_WIDTH, PREVIEW_LINES) {
        lines.push(Line::from(vec![
            Span::raw("  "),
            Span::styled(line, theme.normal),
        ]));
    }

    let labelled = [
        ("Topic: ", event.topic.as_deref(), theme.ready),
        ("Context: ", event.context.as_deref(), theme.status),
    ];
    for (label, value, style) in labelled {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            lines.push(Line::from(vec![
                Span::raw(label),
                Span::styled(value.to_string(), style),
            ]));
        }
    }

    if !event.tags.is_empty() {
        lines.push(Line::from(vec![
            Span::raw("Tags: "),
            Span::styled(event.tags.join(", "), theme.pending),
        ]));
    }

    if !event.metadata.is_empty() {
        lines.push(Line::raw("Metadata:"));
        for (key, value) in &event.metadata {
            let shown = match value {
                serde_json::Value::String(s) => truncate(s, METADATA_WIDTH),
                other => other.to_string(),
            };
            lines.push(Line::from(vec![
                Span::raw("  "),
                Span::styled(key.clone(), theme.status),
                Span::raw(": "),
                Span::styled(shown, theme.normal),
            ]));
        }
    }
}

/// Wrap `text` into at most `max_lines` lines of `width` characters.
///
/// Breaks after a space, comma or period within the last 20 columns when
/// possible. If text remains, the last line ends in `...`.
fn wrap_preview(text: &str, width: usize, max_lines: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut rest = text.trim();

    while lines.len() < max_lines && !rest.is_empty() {
        if rest.chars().count() <= width {
            lines.push(rest.to_string());
            rest = "";
            break;
        }

        let head: Vec<(usize, char)> = rest.char_indices().take(width).collect();
        let cut = head
            .iter()
            .rev()
            .take(20)
            .find(|(_, c)| matches!(c, ' ' | ',' | '.'))
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or_else(|| rest.char_indices().nth(width).map_or(rest.len(), |(i, _)| i));

        lines.push(rest[..cut].trim().to_string());
        rest = rest[cut..].trim();
    }

    if !rest.is_empty() {
        if let Some(last) = lines.last_mut() {
            let keep = width.saturating_sub(3);
            if last.chars().count() > keep {
                *last = last.chars().take(keep).collect();
            }
            last.push_str("...");
        }
    }
    lines
}

// ========== Other Screens ==========

/// Result rows that fit on the search screen.
fn search_rows(height: u16) -> usize {
    (height.saturating_sub(SEARCH_CHROME_ROWS) as usize).max(MIN_SEARCH_ROWS)
}

fn search_lines(app: &App, theme: &Theme, lines: &mut Vec<Line<'static>>) {
    let search = &app.search;
    lines.push(Line::styled("SEARCH KNOWLEDGE BASE", theme.header));
    lines.push(Line::default());

    if search.editing {
        lines.push(Line::from(vec![
            Span::raw("Enter search term: "),
            Span::styled(format!("{}_", search.input), theme.selected),
        ]));
        lines.push(Line::styled("Press Enter to search, Esc to cancel", theme.help));
    } else {
        lines.push(Line::raw("Press Enter to start search"));
    }
    lines.push(Line::default());

    if search.results.is_empty() {
        return;
    }

    lines.push(rule('─', 60, theme));
    lines.push(Line::raw(format!(
        "Results for '{}' ({} found):",
        search.term,
        search.results.len()
    )));
    lines.push(Line::default());

    let rows = search_rows(app.height);
    for result in search.results.iter().take(rows) {
        lines.push(Line::styled(format!("• {}", result), theme.normal));
    }
    if search.results.len() > rows {
        lines.push(Line::styled(
            format!("... and {} more results", search.results.len() - rows),
            theme.help,
        ));
    }
}

fn analytics_lines(metrics: &MetricsSnapshot, theme: &Theme, lines: &mut Vec<Line<'static>>) {
    lines.push(Line::styled("KNOWLEDGE SYSTEM ANALYTICS", theme.header));
    lines.push(Line::default());
    lines.push(Line::from(vec![
        Span::raw("Total Events: "),
        Span::styled(metrics.total_events.to_string(), theme.ready),
    ]));
    lines.push(Line::from(vec![
        Span::raw("Pending Reviews: "),
        Span::styled(metrics.pending_reviews.to_string(), theme.pending),
    ]));
    lines.push(Line::raw(format!(
        "Active Processes: {}",
        metrics.active_processes
    )));
    lines.push(Line::default());
    lines.push(Line::raw("Analysis Readiness:"));
    for status in metrics.triggers() {
        lines.push(Line::from(vec![
            Span::raw(format!("  {}: ", status.trigger.analysis_name())),
            countdown_span(&status, "events needed", theme),
        ]));
    }
}

fn process_lines(metrics: &MetricsSnapshot, theme: &Theme, lines: &mut Vec<Line<'static>>) {
    lines.push(Line::styled("BACKGROUND PROCESSES", theme.header));
    lines.push(Line::default());

    if metrics.active_processes > 0 {
        lines.push(Line::from(vec![
            Span::raw("ACTIVE: "),
            Span::styled(metrics.active_processes.to_string(), theme.pending),
        ]));
    } else {
        lines.push(Line::raw("ACTIVE: None"));
    }

    lines.push(Line::default());
    if metrics.pending_reviews > 0 {
        lines.push(Line::raw(format!("PENDING ({}):", metrics.pending_reviews)));
        lines.push(Line::styled("• Reviews available for processing", theme.ready));
    } else {
        lines.push(Line::raw("PENDING: None"));
    }

    lines.push(Line::default());
    lines.push(Line::raw("TRIGGERS:"));
    for status in metrics.triggers() {
        let name = status.trigger.analysis_name();
        if status.ready {
            lines.push(Line::styled(format!("• {} ready", name), theme.ready));
        } else {
            lines.push(Line::raw(format!(
                "• {} needs {} more events",
                name, status.remaining
            )));
        }
    }
}

fn capture_lines(theme: &Theme, lines: &mut Vec<Line<'static>>) {
    lines.push(Line::styled("CAPTURE EVENT", theme.header));
    lines.push(Line::default());
    lines.push(Line::raw("Event capture form coming soon..."));
    lines.push(Line::raw("For now, use the capture tool directly."));
}

fn help_text(app: &App) -> &'static str {
    match app.screen {
        Screen::Dashboard => {
            "Navigation: [1-5] Screens • Actions: [R] Review • [T] Triggers • [X] fx • [K] KG • [F] Refresh • [Q] Quit"
        }
        Screen::Search if app.search.editing => {
            "Input: Type search term • [Enter] Search • [Esc] Cancel • [Backspace] Delete"
        }
        Screen::Search => "Navigation: [1-5] Screens • Search: [Enter] Start • [Q] Quit",
        Screen::Processes => "Navigation: [1-5] Screens • [F] Refresh • [Q] Quit",
        Screen::Analytics | Screen::Capture => "Navigation: [1-5] Screens • [Q] Quit",
    }
}
