use tokio::task::JoinHandle;
use anyhow::Result;

use crate::client::AskClient;
use crate::transcript::{Message, Transcript};

/// The one reply shown for every failed request, whatever the cause.
pub const ERROR_REPLY: &str = "Error fetching response. Try again.";

/// Ticks between thinking-ellipsis frames (15 * 20ms = 300ms).
const ELLIPSIS_TICKS: u16 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

/// In-progress character-by-character disclosure of a bot reply.
///
/// `shown` is always a prefix of `full` ending on a char boundary. The
/// reveal is dropped the moment the last character is out, so at most
/// one is ever alive.
#[derive(Debug)]
pub struct Reveal {
    full: String,
    shown: String,
}

impl Reveal {
    fn new(full: String) -> Self {
        Self {
            full,
            shown: String::new(),
        }
    }

    /// The currently visible prefix.
    pub fn visible(&self) -> &str {
        &self.shown
    }

    pub fn revealed_chars(&self) -> usize {
        self.shown.chars().count()
    }

    fn is_done(&self) -> bool {
        self.shown.len() == self.full.len()
    }

    /// Disclose the next character. Returns true once the full text is out.
    fn advance(&mut self) -> bool {
        if let Some(c) = self.full[self.shown.len()..].chars().next() {
            self.shown.push(c);
        }
        self.is_done()
    }

    fn into_text(self) -> String {
        self.full
    }
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,

    // Draft being composed
    pub draft: String,
    pub draft_cursor: usize, // cursor position in draft, in chars

    // Conversation state
    pub transcript: Transcript,
    pub awaiting_response: bool,
    pub reveal: Option<Reveal>,
    pub ask_task: Option<JoinHandle<Result<String>>>,

    // Chat viewport
    pub chat_scroll: u16,
    pub chat_height: u16, // Height of chat area for scroll calculations
    pub chat_width: u16,  // Width of chat area for wrap calculations

    // Animation state
    pub animation_frame: u16,

    pub client: AskClient,
}

impl App {
    pub fn new(client: AskClient) -> Self {
        Self {
            should_quit: false,
            input_mode: InputMode::Editing,

            draft: String::new(),
            draft_cursor: 0,

            transcript: Transcript::new(),
            awaiting_response: false,
            reveal: None,
            ask_task: None,

            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,

            animation_frame: 0,

            client,
        }
    }

    /// Synchronous half of a submission: append the user message, clear
    /// the draft, raise the awaiting flag. Returns the query to send, or
    /// None when the draft is blank or a turn is already in flight.
    pub fn begin_submit(&mut self) -> Option<String> {
        if self.awaiting_response || self.ask_task.is_some() {
            return None;
        }
        if self.draft.trim().is_empty() {
            return None;
        }

        let query = std::mem::take(&mut self.draft);
        self.draft_cursor = 0;

        self.transcript.append(Message::user(query.clone()));
        self.awaiting_response = true;
        self.scroll_chat_to_bottom();

        Some(query)
    }

    /// Submit the current draft to the answering service.
    pub fn submit(&mut self) {
        if let Some(query) = self.begin_submit() {
            tracing::debug!(chars = query.chars().count(), "submitting query");
            let client = self.client.clone();
            self.ask_task = Some(tokio::spawn(async move { client.ask(&query).await }));
        }
    }

    /// Resolve the outstanding request. Success starts the reveal loop;
    /// any failure collapses into the literal error reply.
    pub fn finish_request(&mut self, result: Result<String>) {
        match result {
            Ok(text) => {
                self.reveal = Some(Reveal::new(text));
            }
            Err(err) => {
                tracing::warn!(error = %err, "ask request failed");
                self.transcript.append(Message::bot(ERROR_REPLY));
                self.awaiting_response = false;
            }
        }
        self.scroll_chat_to_bottom();
    }

    /// One reveal step: disclose the next character, committing the full
    /// text as a single bot message once the last one is out.
    pub fn advance_reveal(&mut self) {
        let done = match &mut self.reveal {
            Some(reveal) => reveal.advance(),
            None => return,
        };

        if done {
            if let Some(reveal) = self.reveal.take() {
                self.transcript.append(Message::bot(reveal.into_text()));
            }
            self.awaiting_response = false;
        }
        self.scroll_chat_to_bottom();
    }

    /// Driven by the 20ms tick: poll the outstanding request, then step
    /// the reveal loop. A reveal created on this tick is not advanced
    /// until the next one, so the empty prefix gets its full tick.
    pub async fn on_tick(&mut self) {
        self.animation_frame = self.animation_frame.wrapping_add(1);

        let reveal_was_active = self.reveal.is_some();

        if let Some(task) = self.ask_task.take() {
            if task.is_finished() {
                let result = match task.await {
                    Ok(result) => result,
                    Err(err) => Err(anyhow::anyhow!("ask task failed: {}", err)),
                };
                self.finish_request(result);
            } else {
                self.ask_task = Some(task);
            }
        }

        if reveal_was_active {
            self.advance_reveal();
        }
    }

    /// Partial text of the in-flight bot turn, if a reveal is running.
    pub fn partial_reply(&self) -> Option<&str> {
        self.reveal.as_ref().map(|r| r.visible())
    }

    /// Animated ellipsis shown while the service is thinking.
    pub fn thinking_dots(&self) -> String {
        ".".repeat(((self.animation_frame / ELLIPSIS_TICKS) % 3) as usize + 1)
    }

    // Chat scrolling
    pub fn scroll_chat_down(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_add(1);
    }

    pub fn scroll_chat_up(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_sub(1);
    }

    /// Scroll so the newest message (or the in-flight bot line) is visible.
    pub fn scroll_chat_to_bottom(&mut self) {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: u16 = 0;

        for msg in self.transcript.all() {
            total_lines += 1; // Role line ("You:" or "Bot:")
            for line in msg.text.lines() {
                // Character count, not byte length, for proper UTF-8 handling
                let char_count = line.chars().count();
                if char_count == 0 {
                    total_lines += 1;
                } else {
                    total_lines += ((char_count / wrap_width) + 1) as u16;
                }
            }
            total_lines += 1; // Blank line after message
        }

        if self.awaiting_response {
            // "Bot:" plus the partial text or the thinking ellipsis
            let partial_chars = self
                .partial_reply()
                .map(|p| p.chars().count())
                .unwrap_or(3);
            total_lines += 1 + ((partial_chars / wrap_width) + 1) as u16;
        }

        let visible_height = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };

        if total_lines > visible_height {
            self.chat_scroll = total_lines.saturating_sub(visible_height);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::Role;
    use anyhow::anyhow;

    fn test_app() -> App {
        App::new(AskClient::new("http://127.0.0.1:8000"))
    }

    #[test]
    fn blank_draft_is_not_submitted() {
        let mut app = test_app();
        for draft in ["", "   ", "\t\n  "] {
            app.draft = draft.to_string();
            assert!(app.begin_submit().is_none());
            assert_eq!(app.draft, draft, "draft must be left untouched");
            assert!(app.transcript.is_empty());
            assert!(!app.awaiting_response);
        }
    }

    #[test]
    fn submit_appends_user_message_and_clears_draft() {
        let mut app = test_app();
        app.draft = "hello".to_string();
        app.draft_cursor = 5;

        let query = app.begin_submit().unwrap();
        assert_eq!(query, "hello");
        assert_eq!(app.draft, "");
        assert_eq!(app.draft_cursor, 0);
        assert_eq!(app.transcript.last(), Some(&Message::user("hello")));
        assert!(app.awaiting_response);
    }

    #[test]
    fn submit_keeps_surrounding_whitespace_in_the_message() {
        let mut app = test_app();
        app.draft = "  hello  ".to_string();

        let query = app.begin_submit().unwrap();
        assert_eq!(query, "  hello  ");
        assert_eq!(app.transcript.last(), Some(&Message::user("  hello  ")));
    }

    #[test]
    fn submit_is_rejected_while_a_turn_is_in_flight() {
        let mut app = test_app();
        app.draft = "first".to_string();
        app.begin_submit().unwrap();

        app.draft = "second".to_string();
        assert!(app.begin_submit().is_none());
        assert_eq!(app.draft, "second");
        assert_eq!(app.transcript.len(), 1);
    }

    #[test]
    fn reveal_discloses_one_char_per_step_monotonically() {
        let mut app = test_app();
        app.draft = "hello".to_string();
        app.begin_submit().unwrap();
        app.finish_request(Ok("hi there".to_string()));

        let expected = [
            "", "h", "hi", "hi ", "hi t", "hi th", "hi the", "hi ther", "hi there",
        ];
        for (steps, prefix) in expected.iter().enumerate() {
            assert_eq!(app.partial_reply(), Some(*prefix), "after {} steps", steps);
            assert_eq!(
                app.reveal.as_ref().unwrap().revealed_chars(),
                prefix.chars().count()
            );
            app.advance_reveal();
        }

        // Committed exactly once, reveal gone, flag cleared
        assert!(app.reveal.is_none());
        assert!(!app.awaiting_response);
        assert_eq!(
            app.transcript.all(),
            &[Message::user("hello"), Message::bot("hi there")]
        );

        // Extra steps are no-ops
        app.advance_reveal();
        assert_eq!(app.transcript.len(), 2);
    }

    #[test]
    fn reveal_handles_multibyte_characters() {
        let mut app = test_app();
        app.draft = "hola".to_string();
        app.begin_submit().unwrap();
        app.finish_request(Ok("¡sí!".to_string()));

        app.advance_reveal();
        assert_eq!(app.partial_reply(), Some("¡"));
        app.advance_reveal();
        assert_eq!(app.partial_reply(), Some("¡s"));
        app.advance_reveal();
        assert_eq!(app.partial_reply(), Some("¡sí"));
        app.advance_reveal();
        assert_eq!(app.transcript.last(), Some(&Message::bot("¡sí!")));
        assert!(app.reveal.is_none());
    }

    #[test]
    fn empty_reply_commits_on_first_step() {
        let mut app = test_app();
        app.draft = "hello".to_string();
        app.begin_submit().unwrap();
        app.finish_request(Ok(String::new()));

        app.advance_reveal();
        assert!(app.reveal.is_none());
        assert!(!app.awaiting_response);
        assert_eq!(app.transcript.last(), Some(&Message::bot("")));
    }

    #[test]
    fn failed_request_substitutes_the_error_reply() {
        let mut app = test_app();
        app.draft = "ping".to_string();
        app.begin_submit().unwrap();
        app.finish_request(Err(anyhow!("connection refused")));

        assert!(app.reveal.is_none());
        assert!(!app.awaiting_response);
        assert_eq!(
            app.transcript.all(),
            &[Message::user("ping"), Message::bot(ERROR_REPLY)]
        );

        // A new submission is allowed again
        app.draft = "pong".to_string();
        assert!(app.begin_submit().is_some());
    }

    #[test]
    fn error_reply_renders_as_an_ordinary_bot_turn() {
        let mut app = test_app();
        app.draft = "ping".to_string();
        app.begin_submit().unwrap();
        app.finish_request(Err(anyhow!("boom")));

        let last = app.transcript.last().unwrap();
        assert_eq!(last.sender, Role::Bot);
        assert_eq!(last.text, ERROR_REPLY);
    }

    #[tokio::test]
    async fn unreachable_service_resolves_into_the_error_reply() {
        // Nothing listens on port 9; the connect fails and the failure is
        // reconciled through the same path as a bad response body.
        let mut app = App::new(AskClient::new("http://127.0.0.1:9"));
        app.draft = "ping".to_string();
        app.submit();
        assert!(app.ask_task.is_some());

        while app.ask_task.is_some() {
            app.on_tick().await;
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }

        assert!(!app.awaiting_response);
        assert_eq!(
            app.transcript.all(),
            &[Message::user("ping"), Message::bot(ERROR_REPLY)]
        );
    }

    #[tokio::test]
    async fn reveal_created_on_a_tick_is_not_advanced_until_the_next() {
        let mut app = test_app();
        app.draft = "hello".to_string();
        app.begin_submit().unwrap();
        app.ask_task = Some(tokio::spawn(async { Ok("hi".to_string()) }));

        // Yield so the spawned task settles and is_finished() observes it
        while app.ask_task.is_some() {
            tokio::task::yield_now().await;
            app.on_tick().await;
        }

        // The tick that resolved the request leaves the prefix empty
        assert_eq!(app.partial_reply(), Some(""));

        app.on_tick().await;
        assert_eq!(app.partial_reply(), Some("h"));
        app.on_tick().await;
        assert_eq!(app.partial_reply(), Some("hi"));
        app.on_tick().await;
        assert!(app.reveal.is_none());
        assert_eq!(app.transcript.last(), Some(&Message::bot("hi")));
    }
}
