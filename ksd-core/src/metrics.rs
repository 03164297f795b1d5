//! Dashboard metrics snapshot and analysis trigger countdowns.
//!
//! Analysis tools fire every N captured events. The dashboard shows how many
//! events remain before each one is due: `period - (total % period)`.

use crate::events::Event;

/// The periodic analyses tracked by the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    /// Theme extraction, every 10 events
    Theme,
    /// Connection finding, every 20 events
    Connections,
    /// Pattern detection, every 30 events
    Patterns,
}

impl Trigger {
    pub const ALL: [Trigger; 3] = [Trigger::Theme, Trigger::Connections, Trigger::Patterns];

    pub fn period(&self) -> u64 {
        match self {
            Trigger::Theme => 10,
            Trigger::Connections => 20,
            Trigger::Patterns => 30,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Trigger::Theme => "Theme",
            Trigger::Connections => "Connections",
            Trigger::Patterns => "Patterns",
        }
    }

    /// Long name used on the analytics and process screens.
    pub fn analysis_name(&self) -> &'static str {
        match self {
            Trigger::Theme => "Theme extraction",
            Trigger::Connections => "Connection finding",
            Trigger::Patterns => "Pattern analysis",
        }
    }

    /// Events remaining before this trigger is due.
    ///
    /// Always in `1..=period`; exactly `period` right after the trigger fired.
    pub fn countdown(&self, total: u64) -> u64 {
        self.period() - (total % self.period())
    }

    /// True when `total` just reached a multiple of the period.
    pub fn is_ready(&self, total: u64) -> bool {
        total > 0 && total % self.period() == 0
    }
}

/// Countdown state of one trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerStatus {
    pub trigger: Trigger,
    pub remaining: u64,
    pub ready: bool,
}

/// One refresh worth of dashboard numbers.
///
/// Built whole by a refresh and swapped in whole; never patched field by field.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MetricsSnapshot {
    pub total_events: u64,
    pub pending_reviews: u64,
    /// Background analysis processes (not tracked yet, always 0)
    pub active_processes: u64,
    pub until_theme: u64,
    pub until_connections: u64,
    pub until_patterns: u64,
    /// Wall-clock time of the refresh, `HH:MM:SS`
    pub last_refresh: String,
    pub latest_event: Option<Event>,
}

impl MetricsSnapshot {
    /// Build a snapshot, deriving the trigger countdowns from `total_events`.
    pub fn new(
        total_events: u64,
        pending_reviews: u64,
        latest_event: Option<Event>,
        last_refresh: impl Into<String>,
    ) -> Self {
        Self {
            total_events,
            pending_reviews,
            active_processes: 0,
            until_theme: Trigger::Theme.countdown(total_events),
            until_connections: Trigger::Connections.countdown(total_events),
            until_patterns: Trigger::Patterns.countdown(total_events),
            last_refresh: last_refresh.into(),
            latest_event,
        }
    }

    pub fn trigger_status(&self, trigger: Trigger) -> TriggerStatus {
        let remaining = match trigger {
            Trigger::Theme => self.until_theme,
            Trigger::Connections => self.until_connections,
            Trigger::Patterns => self.until_patterns,
        };
        TriggerStatus {
            trigger,
            remaining,
            ready: trigger.is_ready(self.total_events),
        }
    }

    pub fn triggers(&self) -> [TriggerStatus; 3] {
        Trigger::ALL.map(|t| self.trigger_status(t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_theme_countdown_edges() {
        assert_eq!(Trigger::Theme.countdown(0), 10);
        assert_eq!(Trigger::Theme.countdown(9), 1);
        assert_eq!(Trigger::Theme.countdown(10), 10);
        assert_eq!(Trigger::Theme.countdown(11), 9);
    }

    #[test]
    fn test_countdown_is_periodic() {
        for trigger in Trigger::ALL {
            let p = trigger.period();
            for n in 0..(3 * p) {
                assert_eq!(trigger.countdown(n), trigger.countdown(n + p));
                assert!((1..=p).contains(&trigger.countdown(n)));
            }
        }
    }

    #[test]
    fn test_ready_only_at_nonzero_multiples() {
        assert!(!Trigger::Theme.is_ready(0));
        assert!(!Trigger::Theme.is_ready(9));
        assert!(Trigger::Theme.is_ready(10));
        assert!(!Trigger::Connections.is_ready(10));
        assert!(Trigger::Connections.is_ready(20));
        assert!(Trigger::Patterns.is_ready(60));
    }

    #[test]
    fn test_snapshot_derives_countdowns() {
        let snapshot = MetricsSnapshot::new(25, 2, None, "12:00:00");
        assert_eq!(snapshot.until_theme, 5);
        assert_eq!(snapshot.until_connections, 15);
        assert_eq!(snapshot.until_patterns, 5);
        assert_eq!(snapshot.active_processes, 0);
        assert_eq!(snapshot.pending_reviews, 2);

        let statuses = snapshot.triggers();
        assert!(statuses.iter().all(|s| !s.ready));
    }

    #[test]
    fn test_snapshot_nine_to_ten() {
        let nine = MetricsSnapshot::new(9, 0, None, "");
        assert_eq!(nine.until_theme, 1);
        assert!(!nine.trigger_status(Trigger::Theme).ready);

        let ten = MetricsSnapshot::new(10, 0, None, "");
        assert_eq!(ten.until_theme, 10);
        assert!(ten.trigger_status(Trigger::Theme).ready);
        assert!(!ten.trigger_status(Trigger::Connections).ready);
    }
}
