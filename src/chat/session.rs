//! Interactive chat REPL.
//!
//! Owns the editor loop, slash-command dispatch, and the per-turn pipeline:
//! cache check, retrieval query, streamed provider call, history append.

use std::path::Path;
use std::time::Instant;

use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{CompletionType, Config, Context, Editor, Helper};

use super::adapter::Message;
use super::cache::ResponseCache;
use super::client::{ChatClient, ChatError, ChatEvent};
use super::history::ChatHistory;
use super::prompt::build_messages;
use crate::config::Settings;
use crate::retrieval::{RetrievalError, RetrievalService, SearchResult};
use crate::ui;
use crate::ui::lang::{Language, Messages, fill};

/// Slash commands offered by completion.
const COMMANDS: &[&str] = &[
    "/help", "/load", "/reset", "/history", "/clear", "/lang", "/exit",
];

/// Line-editor helper providing slash-command completion.
struct ReplHelper;

impl Completer for ReplHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        if !line.starts_with('/') {
            return Ok((0, Vec::new()));
        }

        let prefix = &line[..pos];
        let candidates = COMMANDS
            .iter()
            .filter(|c| c.starts_with(prefix))
            .map(|c| Pair {
                display: (*c).to_string(),
                replacement: (*c).to_string(),
            })
            .collect();

        Ok((0, candidates))
    }
}

impl Hinter for ReplHelper {
    type Hint = String;
}
impl Highlighter for ReplHelper {}
impl Validator for ReplHelper {}
impl Helper for ReplHelper {}

/// Outcome of one handled input.
enum Flow {
    Continue,
    Exit,
}

/// Interactive chat session.
pub struct ChatSession {
    settings: Settings,
    client: ChatClient,
    retrieval: Option<RetrievalService>,
    cache: Option<ResponseCache>,
    history: Option<ChatHistory>,
    language: Language,
}

impl ChatSession {
    /// Assemble a session from settings.
    pub fn new(settings: Settings) -> anyhow::Result<Self> {
        let language: Language = settings
            .language
            .parse()
            .unwrap_or_else(|e: String| {
                tracing::warn!(target: "chat", "{e}; falling back to English");
                Language::En
            });

        let client = ChatClient::from_settings(&settings)
            .map_err(|e| anyhow::anyhow!("failed to build HTTP client: {e}"))?;

        let messages = language.messages();
        let retrieval = crate::retrieval::from_settings(
            &settings,
            Box::new(move |model| {
                ui::print_dim(&fill(messages.embedding_preparing, "model", model));
            }),
        );

        let cache = settings
            .cache
            .enabled
            .then(|| ResponseCache::load(settings.cache_file(), settings.cache.ttl_secs));

        let history = settings
            .history
            .enabled
            .then(|| ChatHistory::load(settings.history_file(), settings.history.max_items));

        Ok(Self {
            settings,
            client,
            retrieval,
            cache,
            history,
            language,
        })
    }

    fn messages(&self) -> &'static Messages {
        self.language.messages()
    }

    /// Run the REPL until the user exits.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        let config = Config::builder()
            .completion_type(CompletionType::List)
            .build();
        let mut editor: Editor<ReplHelper, DefaultHistory> = Editor::with_config(config)?;
        editor.set_helper(Some(ReplHelper));

        ui::print_welcome(self.messages());
        ui::print_help(self.messages());

        let mut interrupted = false;

        loop {
            println!();
            match editor.readline(self.messages().user_prompt) {
                Ok(line) => {
                    interrupted = false;

                    let input = line.trim();
                    if input.is_empty() {
                        continue;
                    }
                    let _ = editor.add_history_entry(input);

                    let flow = if let Some(stripped) = input.strip_prefix('/') {
                        self.handle_command(stripped).await
                    } else {
                        self.handle_prompt(input).await;
                        Flow::Continue
                    };

                    if matches!(flow, Flow::Exit) {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    if interrupted {
                        break;
                    }
                    interrupted = true;
                    println!("{}", self.messages().interrupt_hint);
                }
                Err(ReadlineError::Eof) => break,
                Err(e) => {
                    ui::print_error(self.messages(), &e.to_string());
                    break;
                }
            }
        }

        ui::print_status(self.messages().exit_message);
        Ok(())
    }

    /// Dispatch a slash command (already stripped of the leading `/`).
    async fn handle_command(&mut self, input: &str) -> Flow {
        let mut parts = input.split_whitespace();
        let command = parts.next().unwrap_or("");
        let args: Vec<&str> = parts.collect();

        match command {
            "exit" | "quit" => return Flow::Exit,
            "help" => ui::print_help(self.messages()),
            "clear" => {
                ui::clear_screen();
                ui::print_dim(self.messages().clear_message);
            }
            "history" => {
                let interactions = self
                    .history
                    .as_ref()
                    .map(|h| h.recent(10).to_vec())
                    .unwrap_or_default();
                ui::print_history(self.messages(), &interactions);
            }
            "lang" => match args.first().map(|s| s.parse::<Language>()) {
                Some(Ok(language)) => {
                    self.language = language;
                    ui::print_status(self.messages().language_changed);
                }
                _ => ui::print_error(self.messages(), self.messages().invalid_command),
            },
            "load" => self.handle_load(args.first().copied()).await,
            "reset" => self.handle_reset().await,
            _ => ui::print_dim(self.messages().invalid_command),
        }

        Flow::Continue
    }

    /// `/load <path>`: ingest a document into the knowledge base.
    async fn handle_load(&mut self, path: Option<&str>) {
        let messages = self.messages();

        let Some(path) = path else {
            ui::print_dim(messages.load_usage);
            return;
        };

        let Some(retrieval) = self.retrieval.as_mut() else {
            ui::print_error(messages, messages.kb_unavailable);
            return;
        };

        match retrieval.ingest(Path::new(path)).await {
            Ok(chunks) if chunks.is_empty() => {
                ui::print_dim(messages.load_empty);
            }
            Ok(chunks) => {
                ui::print_load_result(messages, path, &chunks);
            }
            Err(RetrievalError::DocumentNotFound(_)) => {
                ui::print_error(messages, &fill(messages.load_not_found, "path", path));
            }
            Err(e) => {
                ui::print_error(messages, &e.to_string());
            }
        }
    }

    /// `/reset`: clear the knowledge base and persist the empty state.
    async fn handle_reset(&mut self) {
        let messages = self.messages();

        let Some(retrieval) = self.retrieval.as_mut() else {
            ui::print_error(messages, messages.kb_unavailable);
            return;
        };

        match retrieval.reset().await {
            Ok(()) => ui::print_status(messages.kb_cleared),
            Err(e) => ui::print_error(messages, &e.to_string()),
        }
    }

    /// One non-command turn: context lookup, cache, provider call, history.
    async fn handle_prompt(&mut self, input: &str) {
        let messages = self.messages();

        if !self.client.has_key() {
            ui::print_error(messages, messages.missing_api_key);
            return;
        }

        let context = self.retrieve_context(input).await;

        // Cached answers are only valid for context-free prompts: once
        // documents are loaded, the same question can have a new answer.
        let cache_key = context.is_empty().then(|| {
            ResponseCache::key(
                &self.client.provider().to_string(),
                self.client.model(),
                input,
            )
        });

        if let (Some(cache), Some(key)) = (self.cache.as_ref(), cache_key.as_ref()) {
            if let Some(response) = cache.get(key) {
                let response = response.to_string();
                println!("{response}");
                ui::print_dim(messages.cached_note);
                if let Some(history) = self.history.as_mut() {
                    history.add_interaction(input, response);
                }
                return;
            }
        }

        let outgoing: Vec<Message> = build_messages(messages, &context, input);

        let started = Instant::now();
        let mut printer = ui::StreamingPrinter::start(messages);

        let result = self
            .client
            .stream_chat(&outgoing, &mut |event| match event {
                ChatEvent::Delta(delta) => printer.delta(&delta),
                ChatEvent::Retrying {
                    attempt,
                    max,
                    error,
                } => {
                    let line = fill(messages.retry_message, "error", &error);
                    let line = fill(&line, "retry", &attempt.to_string());
                    let line = fill(&line, "max", &max.to_string());
                    eprintln!("{line}");
                }
            })
            .await;

        printer.finish();

        match result {
            Ok(response) => {
                ui::print_response_time(messages, started.elapsed());

                if let (Some(cache), Some(key)) = (self.cache.as_mut(), cache_key) {
                    cache.put(key, response.clone());
                }
                if let Some(history) = self.history.as_mut() {
                    history.add_interaction(input, response);
                }
            }
            Err(e) => {
                let text = match &e {
                    ChatError::Timeout => messages.timeout.to_string(),
                    other => other.to_string(),
                };
                ui::print_error(messages, &text);
            }
        }
    }

    /// Query the knowledge base; retrieval failures degrade to no context.
    async fn retrieve_context(&self, input: &str) -> Vec<SearchResult> {
        let Some(retrieval) = self.retrieval.as_ref() else {
            return Vec::new();
        };

        match retrieval.query(input, self.settings.retrieval.top_k).await {
            Ok(results) => results,
            Err(e) => {
                tracing::warn!(target: "retrieval", "context lookup failed: {e}");
                ui::print_error(self.messages(), &e.to_string());
                Vec::new()
            }
        }
    }
}
