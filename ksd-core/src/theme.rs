//! Terminal styles shared by the dashboard and the event viewer.
//!
//! Views take a `Theme` by reference instead of reading global styles.
//! Only built with the `tui` feature.

use ratatui::style::{Color, Modifier, Style};

/// Style for every kind of text the dashboard draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Theme {
    /// Screen title
    pub title: Style,
    /// Section headers
    pub header: Style,
    /// Paths, navigation and secondary values
    pub status: Style,
    /// Counts that need attention
    pub pending: Style,
    /// Healthy values and ready triggers
    pub ready: Style,
    /// Help line
    pub help: Style,
    /// Rules between sections
    pub separator: Style,
    /// Search input
    pub selected: Style,
    /// Body text
    pub normal: Style,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            title: Style::new()
                .fg(Color::Indexed(205))
                .add_modifier(Modifier::BOLD),
            header: Style::new()
                .fg(Color::Indexed(212))
                .add_modifier(Modifier::BOLD),
            status: Style::new().fg(Color::Indexed(248)),
            pending: Style::new().fg(Color::Indexed(214)),
            ready: Style::new().fg(Color::Indexed(46)),
            help: Style::new().fg(Color::Indexed(241)),
            separator: Style::new().fg(Color::Indexed(237)),
            selected: Style::new()
                .bg(Color::Indexed(237))
                .fg(Color::Indexed(255)),
            normal: Style::new().fg(Color::Indexed(252)),
        }
    }
}

impl Theme {
    /// No colors or modifiers, for `NO_COLOR` terminals.
    pub fn plain() -> Self {
        let plain = Style::new();
        Self {
            title: plain,
            header: plain,
            status: plain,
            pending: plain,
            ready: plain,
            help: plain,
            separator: plain,
            selected: Style::new().add_modifier(Modifier::REVERSED),
            normal: plain,
        }
    }

    /// Pick the theme for the current environment.
    pub fn from_env() -> Self {
        match std::env::var_os("NO_COLOR") {
            Some(v) if !v.is_empty() => Self::plain(),
            _ => Self::default(),
        }
    }
}
