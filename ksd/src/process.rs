//! External tool invocation.
//!
//! Every tool is a shell snippet run as `<shell> -c "<preamble>; <command>"`
//! with the knowledge-system variables exported. Two modes:
//!
//! - captured: stdout is collected and returned, used for search and counts
//! - interactive: the child inherits the terminal, used for review, trigger
//!   checks, knowledge queries and the JSON viewer
//!
//! No timeouts are enforced; a hung tool blocks until it exits.

use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::Arc;

use ksd_core::config::ToolsConfig;
use ksd_core::{Error, KsContext, Result};

use crate::command::Tool;

/// A fully resolved child process description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub env: Vec<(String, String)>,
    /// Command line shown in errors and logs
    pub display: String,
}

impl Invocation {
    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd.envs(self.env.iter().map(|(k, v)| (k, v)));
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        cmd
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::Process {
            command: self.display.clone(),
            message: message.into(),
        }
    }
}

/// Builds invocations for the configured tools in the resolved context.
#[derive(Debug, Clone)]
pub struct Launcher {
    ctx: Arc<KsContext>,
    tools: ToolsConfig,
}

impl Launcher {
    pub fn new(ctx: Arc<KsContext>, tools: ToolsConfig) -> Self {
        Self { ctx, tools }
    }

    /// Invocation for an interactive tool.
    pub fn invocation(&self, tool: Tool) -> Invocation {
        match tool {
            Tool::Review => self.shell(&self.tools.review),
            Tool::CheckTriggers => self.shell(&self.tools.check_triggers),
            Tool::KnowledgeQuery => self.shell(&self.tools.knowledge_query),
            Tool::JsonViewer => self.shell(&format!(
                "{} {}",
                self.tools.json_viewer,
                shell_quote(&self.ctx.hot_log.to_string_lossy())
            )),
        }
    }

    /// Invocation for a captured search of `term`.
    pub fn search(&self, term: &str) -> Invocation {
        self.shell(&format!("{} {}", self.tools.search, shell_quote(term)))
    }

    /// Invocation printing the pending-review count, if configured.
    pub fn pending_count(&self) -> Option<Invocation> {
        non_empty(&self.tools.pending_count).map(|cmd| self.shell(cmd))
    }

    /// Invocation printing the event count, if configured.
    pub fn event_count(&self) -> Option<Invocation> {
        non_empty(&self.tools.event_count).map(|cmd| self.shell(cmd))
    }

    fn shell(&self, command: &str) -> Invocation {
        let script = if self.tools.preamble.trim().is_empty() {
            command.to_string()
        } else {
            format!("{}; {}", self.tools.preamble, command)
        };
        Invocation {
            program: self.tools.shell.clone(),
            args: vec!["-c".to_string(), script],
            working_dir: self.ctx.working_dir().map(PathBuf::from),
            env: self.ctx.tool_env(),
            display: command.to_string(),
        }
    }
}

fn non_empty(cmd: &Option<String>) -> Option<&str> {
    cmd.as_deref().map(str::trim).filter(|c| !c.is_empty())
}

/// Wrap `s` in single quotes for a POSIX shell.
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Run to completion and return trimmed stdout.
pub fn run_captured(inv: &Invocation) -> Result<String> {
    tracing::debug!(command = %inv.display, "Running captured command");

    let output = inv
        .command()
        .stdin(Stdio::null())
        .output()
        .map_err(|e| inv.error(format!("failed to start: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let message = match stderr.trim() {
            "" => output.status.to_string(),
            err => format!("{}: {}", output.status, err),
        };
        return Err(inv.error(message));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Run with the terminal inherited; the caller must have released it.
pub fn run_interactive(inv: &Invocation) -> Result<()> {
    tracing::info!(command = %inv.display, "Running interactive command");

    let status = inv
        .command()
        .status()
        .map_err(|e| inv.error(format!("failed to start: {}", e)))?;

    if status.success() {
        Ok(())
    } else {
        Err(inv.error(status.to_string()))
    }
}
