//! # ksd-core
//!
//! Core library for ksd - the knowledge-system dashboard.
//!
//! This library provides:
//! - The tolerant event record model and hot-log reader
//! - Dashboard metrics and analysis trigger countdowns
//! - Knowledge-system context discovery (`.ks-env`)
//! - Dashboard settings and logging infrastructure
//! - Shared text helpers, and terminal styles with the `tui` feature
//!
//! The event log is treated as read-only input: nothing here writes to it.
//!
//! ## Example
//!
//! ```rust,no_run
//! use ksd_core::{events, KsContext};
//!
//! let ctx = KsContext::discover().expect("no .ks-env found");
//! if let Some(event) = events::tail_last_event(&ctx.hot_log) {
//!     println!("{} {}", event.display_time(), event.primary_text());
//! }
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use context::{ContextKind, KsContext};
pub use error::{Error, Result};
pub use events::Event;
pub use metrics::{MetricsSnapshot, Trigger, TriggerStatus};
#[cfg(feature = "tui")]
pub use theme::Theme;

// Public modules
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod format;
pub mod logging;
pub mod metrics;
#[cfg(feature = "tui")]
pub mod theme;
