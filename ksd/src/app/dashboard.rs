use super::*;

impl App {
    // ========== Dashboard Actions ==========

    /// Handle keyboard input on the dashboard screen.
    ///
    /// Each action hands the terminal to one external tool.
    pub(super) fn handle_dashboard_key(&mut self, key: KeyEvent) -> Cmd {
        match key.code {
            KeyCode::Char('r') => {
                if self.metrics.pending_reviews > 0 {
                    Cmd::Exec(Tool::Review)
                } else {
                    Cmd::None
                }
            }
            KeyCode::Char('t') => Cmd::Exec(Tool::CheckTriggers),
            KeyCode::Char('k') => Cmd::Exec(Tool::KnowledgeQuery),
            KeyCode::Char('x') => Cmd::Exec(Tool::JsonViewer),
            _ => Cmd::None,
        }
    }
}
