//! Knowledge-system context discovery
//!
//! The knowledge system is configured by a shell-style `.ks-env` file at the
//! project root. Discovery walks up from the working directory to find it,
//! then reads its `export KEY=value` lines.
//!
//! A working directory that holds both a `knowledge/` directory and a
//! `logex-config.yaml` is a *conversation*: a sub-project with its own local
//! knowledge directory and hot log. In that case the `.ks-env` path keys are
//! ignored and external tools run from the conversation directory.

use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the environment file marking the project root.
pub const ENV_FILE: &str = ".ks-env";

/// Marker file that, next to `knowledge/`, identifies a conversation directory.
pub const CONVERSATION_MARKER: &str = "logex-config.yaml";

/// Hot log location used when `KS_HOT_LOG` is not set, relative to the root.
pub const DEFAULT_HOT_LOG: &str = "knowledge/events/hot.jsonl";

/// Where the dashboard is running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextKind {
    /// Main knowledge-system checkout
    Standalone,
    /// Conversation/experiment sub-project
    Conversation { dir: PathBuf, name: String },
}

/// Resolved knowledge-system paths, read once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KsContext {
    pub root: PathBuf,
    pub knowledge_dir: PathBuf,
    pub events_dir: PathBuf,
    pub hot_log: PathBuf,
    pub model: Option<String>,
    pub kind: ContextKind,
}

impl KsContext {
    /// Discover the context from the current directory and process environment.
    pub fn discover() -> Result<Self> {
        let cwd = std::env::current_dir()
            .map_err(|e| Error::Config(format!("getting current directory: {}", e)))?;
        Self::discover_from(&cwd, |name| std::env::var(name).ok())
    }

    /// Discover the context starting at `cwd`, resolving variables with `env`.
    pub fn discover_from<F>(cwd: &Path, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let root = find_project_root(cwd)?;
        let kind = detect_conversation(cwd);

        let mut ctx = match &kind {
            ContextKind::Conversation { dir, .. } => {
                let knowledge_dir = dir.join("knowledge");
                let events_dir = knowledge_dir.join("events");
                KsContext {
                    root: root.clone(),
                    hot_log: events_dir.join("hot.jsonl"),
                    knowledge_dir,
                    events_dir,
                    model: None,
                    kind: kind.clone(),
                }
            }
            ContextKind::Standalone => {
                let knowledge_dir = root.join("knowledge");
                KsContext {
                    root: root.clone(),
                    events_dir: knowledge_dir.join("events"),
                    hot_log: root.join(DEFAULT_HOT_LOG),
                    knowledge_dir,
                    model: None,
                    kind: ContextKind::Standalone,
                }
            }
        };

        let env_path = root.join(ENV_FILE);
        let content = fs::read_to_string(&env_path)
            .map_err(|e| Error::Config(format!("opening {}: {}", env_path.display(), e)))?;

        for (key, value) in parse_exports(&content) {
            let value = expand_vars(&value, |name| match name {
                "KS_ROOT" => Some(root.to_string_lossy().into_owned()),
                other => env(other),
            });
            ctx.apply(&key, value);
        }

        if let Some(model) = env("KS_MODEL").filter(|m| !m.is_empty()) {
            ctx.model = Some(model);
        }

        tracing::debug!(
            root = %ctx.root.display(),
            hot_log = %ctx.hot_log.display(),
            conversation = ctx.is_conversation(),
            "Resolved knowledge-system context"
        );

        Ok(ctx)
    }

    fn apply(&mut self, key: &str, value: String) {
        let local = self.is_conversation();
        match key {
            "KS_KNOWLEDGE_DIR" if !local => self.knowledge_dir = PathBuf::from(value),
            "KS_EVENTS_DIR" if !local => self.events_dir = PathBuf::from(value),
            "KS_HOT_LOG" if !local && !value.is_empty() => self.hot_log = PathBuf::from(value),
            "KS_MODEL" => self.model = Some(value),
            _ => {}
        }
    }

    pub fn is_conversation(&self) -> bool {
        matches!(self.kind, ContextKind::Conversation { .. })
    }

    /// Directory external tools should run in, if not the inherited one.
    pub fn working_dir(&self) -> Option<&Path> {
        match &self.kind {
            ContextKind::Conversation { dir, .. } => Some(dir),
            ContextKind::Standalone => None,
        }
    }

    /// Display name of the conversation, if any.
    pub fn conversation_name(&self) -> Option<&str> {
        match &self.kind {
            ContextKind::Conversation { name, .. } => Some(name),
            ContextKind::Standalone => None,
        }
    }

    /// Variables exported to every external tool.
    pub fn tool_env(&self) -> Vec<(String, String)> {
        vec![
            ("KS_ROOT".to_string(), self.root.to_string_lossy().into_owned()),
            (
                "KS_KNOWLEDGE_DIR".to_string(),
                self.knowledge_dir.to_string_lossy().into_owned(),
            ),
            (
                "KS_EVENTS_DIR".to_string(),
                self.events_dir.to_string_lossy().into_owned(),
            ),
            (
                "KS_HOT_LOG".to_string(),
                self.hot_log.to_string_lossy().into_owned(),
            ),
        ]
    }
}

/// Walk up from `start` until a directory containing `.ks-env` is found.
pub fn find_project_root(start: &Path) -> Result<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(ENV_FILE).is_file())
        .map(Path::to_path_buf)
        .ok_or_else(|| Error::Config(format!("{} not found above {}", ENV_FILE, start.display())))
}

fn detect_conversation(cwd: &Path) -> ContextKind {
    if cwd.join("knowledge").is_dir() && cwd.join(CONVERSATION_MARKER).exists() {
        let name = cwd
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        ContextKind::Conversation {
            dir: cwd.to_path_buf(),
            name,
        }
    } else {
        ContextKind::Standalone
    }
}

/// Extract `export KEY=value` pairs, trimming surrounding quotes.
fn parse_exports(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.strip_prefix("export "))
        .filter_map(|assignment| assignment.split_once('='))
        .map(|(key, value)| {
            let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
            (key.trim().to_string(), value.to_string())
        })
        .collect()
}

/// Expand `$NAME` and `${NAME}`; unknown names expand to nothing.
fn expand_vars<F>(value: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }

        let name: String = if chars.peek() == Some(&'{') {
            chars.next();
            chars.by_ref().take_while(|&c| c != '}').collect()
        } else {
            let mut name = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_ascii_alphanumeric() || c == '_' {
                    name.push(c);
                    chars.next();
                } else {
                    break;
                }
            }
            name
        };

        if name.is_empty() {
            out.push('$');
        } else if let Some(v) = lookup(&name) {
            out.push_str(&v);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn project(env_file: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(ENV_FILE), env_file).unwrap();
        dir
    }

    #[test]
    fn test_parse_exports() {
        let parsed = parse_exports(
            "# comment\n\nexport KS_MODEL=\"sonnet\"\nKS_IGNORED=1\nexport KS_HOT_LOG='$KS_ROOT/hot.jsonl'\n",
        );
        assert_eq!(
            parsed,
            vec![
                ("KS_MODEL".to_string(), "sonnet".to_string()),
                ("KS_HOT_LOG".to_string(), "$KS_ROOT/hot.jsonl".to_string()),
            ]
        );
    }

    #[test]
    fn test_expand_vars() {
        let lookup = |name: &str| match name {
            "KS_ROOT" => Some("/ks".to_string()),
            _ => None,
        };
        assert_eq!(expand_vars("$KS_ROOT/a", lookup), "/ks/a");
        assert_eq!(expand_vars("${KS_ROOT}x", lookup), "/ksx");
        assert_eq!(expand_vars("$UNSET/b", lookup), "/b");
        assert_eq!(expand_vars("cost $", lookup), "cost $");
    }

    #[test]
    fn test_standalone_context() {
        let dir = project(
            "export KS_KNOWLEDGE_DIR=\"$KS_ROOT/kb\"\n\
             export KS_EVENTS_DIR=\"$KS_ROOT/kb/events\"\n\
             export KS_HOT_LOG=\"$KS_ROOT/kb/events/hot.jsonl\"\n\
             export KS_MODEL=\"opus\"\n",
        );
        let root = dir.path();

        let ctx = KsContext::discover_from(root, no_env).unwrap();
        assert_eq!(ctx.root, root);
        assert_eq!(ctx.knowledge_dir, root.join("kb"));
        assert_eq!(ctx.events_dir, root.join("kb/events"));
        assert_eq!(ctx.hot_log, root.join("kb/events/hot.jsonl"));
        assert_eq!(ctx.model.as_deref(), Some("opus"));
        assert!(!ctx.is_conversation());
        assert!(ctx.working_dir().is_none());
    }

    #[test]
    fn test_root_found_from_subdirectory() {
        let dir = project("export KS_MODEL=haiku\n");
        let nested = dir.path().join("tools/plumbing");
        fs::create_dir_all(&nested).unwrap();

        let ctx = KsContext::discover_from(&nested, no_env).unwrap();
        assert_eq!(ctx.root, dir.path());
    }

    #[test]
    fn test_hot_log_fallback() {
        let dir = project("# nothing exported\n");
        let ctx = KsContext::discover_from(dir.path(), no_env).unwrap();
        assert_eq!(ctx.hot_log, dir.path().join(DEFAULT_HOT_LOG));
    }

    #[test]
    fn test_conversation_context() {
        let dir = project("export KS_HOT_LOG=\"$KS_ROOT/knowledge/events/hot.jsonl\"\n");
        let convo = dir.path().join("conversations/alpha");
        fs::create_dir_all(convo.join("knowledge")).unwrap();
        fs::write(convo.join(CONVERSATION_MARKER), "name: alpha\n").unwrap();

        let ctx = KsContext::discover_from(&convo, no_env).unwrap();
        assert!(ctx.is_conversation());
        assert_eq!(ctx.conversation_name(), Some("alpha"));
        assert_eq!(ctx.working_dir(), Some(convo.as_path()));
        // Local paths win over .ks-env
        assert_eq!(ctx.hot_log, convo.join("knowledge/events/hot.jsonl"));
        assert_eq!(ctx.knowledge_dir, convo.join("knowledge"));
    }

    #[test]
    fn test_knowledge_dir_without_marker_is_standalone() {
        let dir = project("");
        let sub = dir.path().join("sub");
        fs::create_dir_all(sub.join("knowledge")).unwrap();

        let ctx = KsContext::discover_from(&sub, no_env).unwrap();
        assert!(!ctx.is_conversation());
    }

    #[test]
    fn test_model_env_override() {
        let dir = project("export KS_MODEL=haiku\n");
        let ctx = KsContext::discover_from(dir.path(), |name| {
            (name == "KS_MODEL").then(|| "sonnet".to_string())
        })
        .unwrap();
        assert_eq!(ctx.model.as_deref(), Some("sonnet"));
    }

    #[test]
    fn test_missing_env_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let err = KsContext::discover_from(dir.path(), no_env).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_tool_env_exports_paths() {
        let dir = project("");
        let ctx = KsContext::discover_from(dir.path(), no_env).unwrap();
        let env = ctx.tool_env();
        assert!(env
            .iter()
            .any(|(k, v)| k == "KS_HOT_LOG" && v.ends_with("hot.jsonl")));
    }
}
