use std::io::Write;

use cogito_chat::{ChatError, ChatResult, Message, SessionController};
use cogito_llm::{default_deepseek_models, lookup_model};
use snafu::{ResultExt, Snafu};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::render::{TerminalRenderer, format_history};
use crate::settings::Settings;

const HELP: &str = "\
Commands:
  /clear       start over, keeping the system prompt
  /reset       start over without a system prompt
  /retry       re-run the last unanswered message
  /history     print the conversation so far
  /model [id]  list models or switch to one
  /reasoning   toggle the model's reasoning display
  /advanced    toggle advanced details
  /help        show this help
  /quit        exit
  //text       send a message that starts with '/'
Press Ctrl-C while a reply streams to cancel it.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Say(String),
    Clear,
    Reset,
    Retry,
    History,
    Model(Option<String>),
    Reasoning,
    Advanced,
    Help,
    Quit,
    Unknown(String),
}

impl Command {
    /// Parses one input line; blank lines yield `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }

        let Some(rest) = trimmed.strip_prefix('/') else {
            return Some(Self::Say(line.to_string()));
        };
        // `//` escapes a message that itself starts with a slash.
        if rest.starts_with('/') {
            return Some(Self::Say(rest.to_string()));
        }

        let (name, argument) = match rest.split_once(char::is_whitespace) {
            Some((name, argument)) => (name, argument.trim()),
            None => (rest, ""),
        };
        let command = match name {
            "clear" => Self::Clear,
            "reset" => Self::Reset,
            "retry" => Self::Retry,
            "history" => Self::History,
            "model" => Self::Model((!argument.is_empty()).then(|| argument.to_string())),
            "reasoning" => Self::Reasoning,
            "advanced" => Self::Advanced,
            "help" | "?" => Self::Help,
            "quit" | "exit" | "q" => Self::Quit,
            _ => Self::Unknown(name.to_string()),
        };
        Some(command)
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ReplError {
    #[snafu(display("failed to read input on `{stage}`: {source}"))]
    ReadInput {
        stage: &'static str,
        source: std::io::Error,
    },
}

pub type ReplResult<T> = Result<T, ReplError>;

pub struct Repl {
    controller: SessionController,
    renderer: TerminalRenderer,
    show_advanced: bool,
}

impl Repl {
    pub fn new(controller: SessionController, settings: &Settings) -> Self {
        let label = lookup_model(controller.model_id()).name;
        Self {
            controller,
            renderer: TerminalRenderer::new(settings.show_reasoning, label),
            show_advanced: settings.show_advanced,
        }
    }

    pub async fn run(mut self) -> ReplResult<()> {
        println!(
            "cogito ({}). Type /help for commands.",
            self.renderer.assistant_label()
        );
        if !self.controller.is_configured() {
            println!("No API key configured. Set DEEPSEEK_API_KEY or pass --api-key.");
        }
        if self.show_advanced {
            self.print_history();
        }

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            print!("> ");
            let _ = std::io::stdout().flush();

            // Once a turn has installed the Ctrl-C handler the default exit
            // no longer applies, so the prompt handles it explicitly.
            let next = tokio::select! {
                next = lines.next_line() => next,
                _ = tokio::signal::ctrl_c() => Ok(None),
            };
            let Some(line) = next.context(ReadInputSnafu {
                stage: "read-repl-line",
            })?
            else {
                println!();
                break;
            };

            let Some(command) = Command::parse(&line) else {
                continue;
            };
            match command {
                Command::Say(text) => {
                    let outcome = self.run_turn(Some(&text)).await;
                    self.report(outcome);
                }
                Command::Retry => {
                    let outcome = self.run_turn(None).await;
                    self.report(outcome);
                }
                Command::Clear => {
                    self.controller.clear_session(true);
                    println!("Conversation cleared.");
                }
                Command::Reset => {
                    self.controller.clear_session(false);
                    println!("Conversation reset without a system prompt.");
                }
                Command::History => self.print_history(),
                Command::Model(None) => self.print_models(),
                Command::Model(Some(id)) => {
                    let model = lookup_model(&id);
                    self.controller.set_model(&model.id);
                    self.renderer.set_assistant_label(&model.name);
                    println!("Now using {} ({}).", model.name, model.id);
                    if !model.streams_reasoning && self.renderer.show_reasoning() {
                        println!("This model does not stream its reasoning.");
                    }
                }
                Command::Reasoning => {
                    let shown = self.renderer.toggle_reasoning();
                    println!("Reasoning display {}.", if shown { "on" } else { "off" });
                }
                Command::Advanced => {
                    self.show_advanced = !self.show_advanced;
                    println!(
                        "Advanced details {}.",
                        if self.show_advanced { "on" } else { "off" }
                    );
                }
                Command::Help => println!("{HELP}"),
                Command::Quit => break,
                Command::Unknown(name) => println!("Unknown command /{name}. Type /help."),
            }
        }

        Ok(())
    }

    /// Drives one turn, cancelling it on Ctrl-C without leaving the loop.
    async fn run_turn(&self, text: Option<&str>) -> ChatResult<Message> {
        self.renderer.begin_turn();
        let turn = async {
            match text {
                Some(text) => self.controller.submit_turn_with(text, &self.renderer).await,
                None => self.controller.retry_last_turn(&self.renderer).await,
            }
        };
        tokio::pin!(turn);

        loop {
            tokio::select! {
                outcome = &mut turn => return outcome,
                signal = tokio::signal::ctrl_c() => match signal {
                    Ok(()) => {
                        if self.controller.cancel_turn() {
                            tracing::info!("turn cancelled from the terminal");
                        }
                    }
                    Err(error) => {
                        tracing::warn!(error = %error, "ctrl-c handler unavailable");
                        return turn.await;
                    }
                },
            }
        }
    }

    fn report(&self, outcome: ChatResult<Message>) {
        let error = match outcome {
            Ok(_) => return,
            Err(error) => error,
        };

        println!();
        match &error {
            ChatError::EmptyInput { .. } | ChatError::TurnDiscarded { .. } => {}
            ChatError::ConfigurationMissing { .. } => {
                eprintln!("{error}. Set DEEPSEEK_API_KEY or pass --api-key, then restart.");
            }
            error if error.is_retryable() => eprintln!("{error}. Send /retry to try again."),
            error => eprintln!("{error}"),
        }
    }

    fn print_history(&self) {
        let history = format_history(
            &self.controller.transcript(),
            &self.renderer.assistant_label(),
            self.renderer.show_reasoning(),
            self.show_advanced,
        );
        if history.is_empty() {
            println!("(no messages yet)");
        } else {
            print!("{history}");
        }
    }

    fn print_models(&self) {
        for model in default_deepseek_models() {
            let marker = if model.id == self.controller.model_id() {
                "*"
            } else {
                " "
            };
            let reasoning = if model.streams_reasoning {
                "reasoning"
            } else {
                ""
            };
            let description = model.description.unwrap_or_default();
            println!(
                "{marker} {:<20} {:<12} {reasoning:<10} {description}",
                model.id, model.name
            );
        }
    }
}
