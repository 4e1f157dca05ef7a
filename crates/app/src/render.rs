use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use cogito_chat::{AccumulatedResponse, Message, Role, TurnObserver};

const DIM: &str = "\x1b[2m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

#[derive(Debug, Default)]
struct RenderProgress {
    reasoning_len: usize,
    content_len: usize,
    reasoning_shown: bool,
}

/// Streams turn updates to stdout, printing only what each update adds.
pub struct TerminalRenderer {
    show_reasoning: AtomicBool,
    assistant_label: Mutex<String>,
    progress: Mutex<RenderProgress>,
}

impl TerminalRenderer {
    pub fn new(show_reasoning: bool, assistant_label: impl Into<String>) -> Self {
        Self {
            show_reasoning: AtomicBool::new(show_reasoning),
            assistant_label: Mutex::new(assistant_label.into()),
            progress: Mutex::new(RenderProgress::default()),
        }
    }

    pub fn show_reasoning(&self) -> bool {
        self.show_reasoning.load(Ordering::Relaxed)
    }

    /// Flips reasoning visibility and returns the new value.
    pub fn toggle_reasoning(&self) -> bool {
        !self.show_reasoning.fetch_xor(true, Ordering::Relaxed)
    }

    pub fn set_assistant_label(&self, label: impl Into<String>) {
        *self
            .assistant_label
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = label.into();
    }

    pub fn assistant_label(&self) -> String {
        self.assistant_label
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn begin_turn(&self) {
        *self.progress.lock().unwrap_or_else(PoisonError::into_inner) = RenderProgress::default();
    }

    fn render_increment(&self, response: &AccumulatedResponse) -> String {
        let mut progress = self.progress.lock().unwrap_or_else(PoisonError::into_inner);
        let mut out = String::new();

        // Hidden reasoning still advances the cursor so toggling mid-turn
        // does not dump the backlog.
        if let Some(fresh) = response.reasoning.get(progress.reasoning_len..)
            && !fresh.is_empty()
            && self.show_reasoning()
        {
            if !progress.reasoning_shown {
                out.push_str(DIM);
                out.push_str("Thinking: ");
                progress.reasoning_shown = true;
            } else {
                out.push_str(DIM);
            }
            out.push_str(fresh);
            out.push_str(RESET);
        }
        progress.reasoning_len = response.reasoning.len();

        if let Some(fresh) = response.content.get(progress.content_len..)
            && !fresh.is_empty()
        {
            if progress.content_len == 0 {
                if progress.reasoning_shown {
                    out.push_str("\n\n");
                }
                out.push_str(&format!("{BOLD}{}:{RESET} ", self.assistant_label()));
            }
            out.push_str(fresh);
        }
        progress.content_len = response.content.len();

        out
    }
}

impl TurnObserver for TerminalRenderer {
    fn on_update(&self, response: &AccumulatedResponse) {
        let increment = self.render_increment(response);
        if increment.is_empty() {
            return;
        }

        let mut stdout = std::io::stdout().lock();
        if let Err(error) = stdout
            .write_all(increment.as_bytes())
            .and_then(|()| stdout.flush())
        {
            tracing::debug!(error = %error, "failed to write stream update");
        }
    }

    fn on_commit(&self, _message: &Message) {
        println!();
    }
}

/// Formats the transcript for `/history`.
pub fn format_history(
    messages: &[Message],
    assistant_label: &str,
    show_reasoning: bool,
    show_advanced: bool,
) -> String {
    let mut out = String::new();
    for message in messages {
        match message.role {
            Role::System if !show_advanced => continue,
            Role::System => out.push_str(&format!("{DIM}System: {}{RESET}\n", message.content)),
            Role::User => out.push_str(&format!("{BOLD}User:{RESET} {}\n", message.content)),
            Role::Assistant => {
                if show_reasoning && let Some(reasoning) = &message.reasoning {
                    out.push_str(&format!("{DIM}Thinking: {reasoning}{RESET}\n"));
                }
                out.push_str(&format!(
                    "{BOLD}{assistant_label}:{RESET} {}\n",
                    message.content
                ));
            }
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use cogito_chat::ResponseStatus;

    use super::*;

    fn response(reasoning: &str, content: &str) -> AccumulatedResponse {
        AccumulatedResponse {
            reasoning: reasoning.to_string(),
            content: content.to_string(),
            status: ResponseStatus::InProgress,
        }
    }

    #[test]
    fn only_new_suffixes_are_rendered() {
        let renderer = TerminalRenderer::new(true, "DeepSeek-R1");

        let first = renderer.render_increment(&response("Consider", ""));
        assert!(first.contains("Thinking: Consider"));

        let second = renderer.render_increment(&response("Consider edge cases.", "def"));
        assert!(second.contains(" edge cases."));
        assert!(!second.contains("Consider"));
        assert!(second.contains("DeepSeek-R1:"));
        assert!(second.ends_with("def"));

        let third = renderer.render_increment(&response("Consider edge cases.", "def add"));
        assert_eq!(third, " add");
    }

    #[test]
    fn hidden_reasoning_is_skipped_but_tracked() {
        let renderer = TerminalRenderer::new(false, "Assistant");
        assert_eq!(renderer.render_increment(&response("secret", "")), "");

        assert!(renderer.toggle_reasoning());
        let next = renderer.render_increment(&response("secret plan", ""));
        assert!(next.contains(" plan"));
        assert!(!next.contains("secret"));
    }

    #[test]
    fn begin_turn_resets_progress() {
        let renderer = TerminalRenderer::new(true, "Assistant");
        renderer.render_increment(&response("", "first answer"));
        renderer.begin_turn();
        let rendered = renderer.render_increment(&response("", "second"));
        assert!(rendered.ends_with("second"));
        assert!(rendered.contains("Assistant:"));
    }

    #[test]
    fn history_hides_system_message_unless_advanced() {
        let messages = vec![
            Message::system("Be helpful."),
            Message::user("hi"),
            Message::assistant("hello", "greet back"),
        ];

        let basic = format_history(&messages, "DeepSeek-R1", false, false);
        assert!(!basic.contains("Be helpful."));
        assert!(!basic.contains("greet back"));
        assert!(basic.contains("hi"));
        assert!(basic.contains("DeepSeek-R1:"));

        let advanced = format_history(&messages, "DeepSeek-R1", true, true);
        assert!(advanced.contains("System: Be helpful."));
        assert!(advanced.contains("Thinking: greet back"));
    }
}
