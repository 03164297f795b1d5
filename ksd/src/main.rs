//! ksd - Knowledge System Dashboard
//!
//! Terminal UI showing live metrics for the knowledge-system hot log, with
//! shortcuts to the review, trigger, query and search tools.

mod app;
mod command;
mod process;
mod runner;
mod runtime;
mod ui;
mod watch;

use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ksd_core::{Config, KsContext, Theme};
use ratatui::{backend::CrosstermBackend, Terminal};

use crate::app::App;
use crate::command::{Msg, Tool};
use crate::process::Launcher;
use crate::runner::LiveRunner;
use crate::runtime::{Delivery, Scheduler};

type Term = Terminal<CrosstermBackend<io::Stdout>>;

/// Interactive dashboard for the knowledge system
#[derive(Parser, Debug)]
#[command(name = "ksd", version, about)]
struct Args {
    /// Print a status summary and exit instead of starting the dashboard
    #[arg(short, long)]
    status: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Both are fatal before the terminal is touched
    let config = Config::load().context("failed to load configuration")?;
    let ctx = Arc::new(
        KsContext::discover().context("failed to resolve knowledge-system context")?,
    );

    // Initialize logging (to file, not stdout since we have a TUI)
    let _log_guard =
        ksd_core::logging::init(&config.logging).context("failed to initialize logging")?;

    let launcher = Launcher::new(ctx.clone(), config.tools.clone());
    let runner = Arc::new(LiveRunner::new(
        ctx.clone(),
        config.dashboard.clone(),
        launcher.clone(),
    ));

    if args.status {
        return print_status(&runner);
    }

    tracing::info!(
        root = %ctx.root.display(),
        hot_log = %ctx.hot_log.display(),
        conversation = ctx.is_conversation(),
        "ksd starting up"
    );

    let mut scheduler = Scheduler::new(runner).context("failed to start scheduler")?;
    let mut app = App::new(ctx, &config.dashboard);
    let theme = Theme::from_env();

    // Setup terminal
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("failed to create terminal")?;

    // Run the main loop
    let result = run_app(&mut terminal, &mut app, &mut scheduler, &launcher, &theme);

    // Restore terminal
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor().context("failed to show cursor")?;

    tracing::info!("ksd shutting down");

    result
}

fn print_status(runner: &LiveRunner) -> Result<()> {
    let total = runner
        .count_events()
        .context("failed to count captured events")?;

    println!("Knowledge System Status");
    println!("{}", "─".repeat(24));
    println!("Captured Events: {}", total);
    println!("Interactive TUI: ksd (no arguments)");
    Ok(())
}

/// Run the main application loop.
///
/// Draws, drains finished work, then polls the keyboard for up to 100ms.
fn run_app(
    terminal: &mut Term,
    app: &mut App,
    scheduler: &mut Scheduler,
    launcher: &Launcher,
    theme: &Theme,
) -> Result<()> {
    let size = terminal.size()?;
    app.update(Msg::Resize {
        width: size.width,
        height: size.height,
    });
    scheduler.dispatch(app.init());

    loop {
        // Render
        terminal.draw(|frame| ui::render(frame, app, theme))?;

        // Apply finished work, one message at a time
        while let Some(delivery) = scheduler.try_next() {
            let cmd = match delivery {
                Delivery::Message(msg) => app.update(msg),
                Delivery::Handover(tool) => {
                    let result = run_tool(terminal, launcher, tool)?;
                    app.update(Msg::ToolExited { tool, result })
                }
            };
            scheduler.dispatch(cmd);
        }

        // Handle events
        if event::poll(Duration::from_millis(100))? {
            let msg = match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => Some(Msg::Key(key)),
                Event::Resize(width, height) => Some(Msg::Resize { width, height }),
                _ => None,
            };
            if let Some(msg) = msg {
                let cmd = app.update(msg);
                scheduler.dispatch(cmd);
            }
        }

        // Check if we should quit
        if app.should_quit {
            break;
        }
    }

    Ok(())
}

/// Give the terminal to an interactive tool and take it back afterwards.
///
/// The outer `Result` is terminal trouble; the inner one is the tool's exit.
fn run_tool(
    terminal: &mut Term,
    launcher: &Launcher,
    tool: Tool,
) -> Result<ksd_core::Result<()>> {
    let invocation = launcher.invocation(tool);

    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor().context("failed to show cursor")?;

    let result = process::run_interactive(&invocation);
    if let Err(e) = &result {
        tracing::warn!(tool = tool.name(), error = %e, "Tool exited with an error");
    }

    enable_raw_mode().context("failed to enable raw mode")?;
    execute!(terminal.backend_mut(), EnterAlternateScreen)
        .context("failed to enter alternate screen")?;
    terminal.clear().context("failed to clear terminal")?;

    Ok(result)
}
