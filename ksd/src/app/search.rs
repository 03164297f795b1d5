use super::*;

impl App {
    // ========== Search Screen ==========

    /// Handle keyboard input on the search screen when not editing.
    pub(super) fn handle_search_key(&mut self, key: KeyEvent) -> Cmd {
        if key.code == KeyCode::Enter {
            self.search.editing = true;
            self.search.input.clear();
        }
        Cmd::None
    }

    /// Handle keyboard input while typing a search term.
    ///
    /// Every printable key, `q` and digits included, goes to the buffer.
    pub(super) fn handle_search_edit_key(&mut self, key: KeyEvent) -> Cmd {
        match key.code {
            KeyCode::Enter => self.submit_search(),
            KeyCode::Esc => {
                self.search.editing = false;
                self.search.input.clear();
                Cmd::None
            }
            KeyCode::Backspace => {
                self.search.input.pop();
                Cmd::None
            }
            KeyCode::Char(c)
                if !c.is_control()
                    && !key
                        .modifiers
                        .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
            {
                self.search.input.push(c);
                Cmd::None
            }
            _ => Cmd::None,
        }
    }

    fn submit_search(&mut self) -> Cmd {
        self.search.editing = false;
        if self.search.input.is_empty() {
            return Cmd::None;
        }

        let term = self.search.input.clone();
        self.search.term = term.clone();
        self.search_request = self.issue_request();
        tracing::debug!(%term, request = self.search_request, "Submitting search");

        Cmd::Run(Task::Search {
            request: self.search_request,
            term,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::{ctrl, key, test_app, type_text};

    fn search_screen() -> App {
        let mut app = test_app();
        app.update(key(KeyCode::Char('2')));
        assert_eq!(app.screen, Screen::Search);
        app
    }

    fn submitted(cmd: Cmd) -> (u64, String) {
        match cmd {
            Cmd::Run(Task::Search { request, term }) => (request, term),
            other => panic!("expected a search, got {:?}", other),
        }
    }

    #[test]
    fn test_typing_without_edit_mode_does_nothing() {
        let mut app = search_screen();
        type_text(&mut app, "foo");

        assert!(app.search.input.is_empty());
        assert!(!app.search.editing);
        // 'f' refreshed, 'o' did nothing
        assert_eq!(app.screen, Screen::Search);
    }

    #[test]
    fn test_search_round_trip() {
        let mut app = search_screen();
        app.search.results = vec!["old".to_string()];

        app.update(key(KeyCode::Enter));
        assert!(app.search.editing);
        type_text(&mut app, "foo");
        let (request, term) = submitted(app.update(key(KeyCode::Enter)));
        assert_eq!(term, "foo");
        assert!(!app.search.editing);

        app.update(Msg::SearchCompleted {
            request,
            term: "foo".to_string(),
            results: vec!["a".to_string(), "b".to_string()],
        });
        assert_eq!(app.search.results, vec!["a", "b"]);
        assert_eq!(app.search.term, "foo");
    }

    #[test]
    fn test_edit_mode_captures_command_keys() {
        let mut app = search_screen();
        app.update(key(KeyCode::Enter));
        type_text(&mut app, "q1d f");

        assert_eq!(app.search.input, "q1d f");
        assert_eq!(app.screen, Screen::Search);
        assert!(!app.should_quit);
    }

    #[test]
    fn test_ctrl_c_quits_while_editing() {
        let mut app = search_screen();
        app.update(key(KeyCode::Enter));
        app.update(ctrl('c'));
        assert!(app.should_quit);
        assert!(app.search.input.is_empty());
    }

    #[test]
    fn test_backspace_and_escape() {
        let mut app = search_screen();
        app.update(key(KeyCode::Enter));
        type_text(&mut app, "abc");
        app.update(key(KeyCode::Backspace));
        assert_eq!(app.search.input, "ab");

        app.update(key(KeyCode::Esc));
        assert!(!app.search.editing);
        assert!(app.search.input.is_empty());

        // Backspace on an empty buffer is harmless
        app.update(key(KeyCode::Enter));
        app.update(key(KeyCode::Backspace));
        assert!(app.search.input.is_empty());
    }

    #[test]
    fn test_enter_restarts_with_empty_buffer() {
        let mut app = search_screen();
        app.update(key(KeyCode::Enter));
        type_text(&mut app, "first");
        app.update(key(KeyCode::Enter));

        app.update(key(KeyCode::Enter));
        assert!(app.search.editing);
        assert!(app.search.input.is_empty());
    }

    #[test]
    fn test_empty_submit_emits_nothing() {
        let mut app = search_screen();
        app.update(key(KeyCode::Enter));
        assert_eq!(app.update(key(KeyCode::Enter)), Cmd::None);
        assert!(!app.search.editing);
    }

    #[test]
    fn test_later_search_wins() {
        let mut app = search_screen();
        app.update(key(KeyCode::Enter));
        type_text(&mut app, "slow");
        let (first, _) = submitted(app.update(key(KeyCode::Enter)));

        app.update(key(KeyCode::Enter));
        type_text(&mut app, "fast");
        let (second, _) = submitted(app.update(key(KeyCode::Enter)));

        app.update(Msg::SearchCompleted {
            request: second,
            term: "fast".to_string(),
            results: vec!["new".to_string()],
        });
        app.update(Msg::SearchCompleted {
            request: first,
            term: "slow".to_string(),
            results: vec!["stale".to_string()],
        });

        assert_eq!(app.search.term, "fast");
        assert_eq!(app.search.results, vec!["new"]);
    }

    #[test]
    fn test_search_failure_is_sticky() {
        let mut app = search_screen();
        app.update(key(KeyCode::Enter));
        type_text(&mut app, "x");
        let (request, _) = submitted(app.update(key(KeyCode::Enter)));

        app.update(Msg::SearchFailed {
            request,
            error: ksd_core::Error::Process {
                command: "query".to_string(),
                message: "exit status: 2".to_string(),
            },
        });
        assert!(app.error.is_some());
    }
}
