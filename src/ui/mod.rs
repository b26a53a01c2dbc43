//! Terminal output: styled messages and streamed response rendering.

pub mod lang;

use std::io::Write;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use is_terminal::IsTerminal;
use owo_colors::OwoColorize;

use crate::chat::history::Interaction;
use crate::retrieval::TextChunk;
use lang::{Messages, fill};

/// Characters of chunk content shown in load previews.
const PREVIEW_CHARS: usize = 200;

/// Print the welcome banner.
pub fn print_welcome(messages: &Messages) {
    println!();
    println!("{}", messages.welcome.cyan().bold());
}

/// Print the command help.
pub fn print_help(messages: &Messages) {
    println!("{}", messages.help.dimmed());
}

/// Print an error line.
pub fn print_error(messages: &Messages, error: &str) {
    eprintln!("{}: {error}", messages.error_prefix.red().bold());
}

/// Print a confirmation line.
pub fn print_status(text: &str) {
    println!("{}", text.green());
}

/// Print a dimmed informational line.
pub fn print_dim(text: &str) {
    println!("{}", text.dimmed());
}

/// Clear the terminal screen.
pub fn clear_screen() {
    let term = console::Term::stdout();
    let _ = term.clear_screen();
}

/// Render recent chat history, oldest first.
pub fn print_history(messages: &Messages, interactions: &[Interaction]) {
    if interactions.is_empty() {
        print_dim(messages.history_empty);
        return;
    }

    println!("{}", messages.history_title.cyan().bold());
    for interaction in interactions {
        let when = chrono::DateTime::from_timestamp(interaction.timestamp as i64, 0)
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();

        println!("{} {}", when.dimmed(), interaction.prompt.green());
        println!("  {}", interaction.response);
    }
}

/// Render the result of loading a document: chunk count plus previews.
pub fn print_load_result(messages: &Messages, path: &str, chunks: &[TextChunk]) {
    print_status(&fill(messages.load_success, "path", path));
    print_status(&fill(messages.load_chunks, "count", &chunks.len().to_string()));

    if chunks.is_empty() {
        return;
    }

    println!();
    print_dim(messages.load_preview_title);
    for (i, chunk) in chunks.iter().take(3).enumerate() {
        let preview = chunk.preview(PREVIEW_CHARS);
        let ellipsis = if chunk.content.chars().count() > PREVIEW_CHARS {
            "..."
        } else {
            ""
        };
        println!("{} {preview}{ellipsis}", format!("[{}]", i + 1).cyan());
    }
}

/// Streams a response to stdout, showing a spinner until the first delta.
pub struct StreamingPrinter {
    spinner: Option<ProgressBar>,
}

impl StreamingPrinter {
    /// Start with a "thinking" spinner. Skipped when stdout is not a
    /// terminal so piped output stays clean.
    pub fn start(messages: &Messages) -> Self {
        if !std::io::stdout().is_terminal() {
            return Self { spinner: None };
        }

        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner} {msg}").expect("static template is valid"),
        );
        spinner.set_message(messages.thinking.to_string());
        spinner.enable_steady_tick(Duration::from_millis(100));

        Self {
            spinner: Some(spinner),
        }
    }

    /// Write one content delta, dropping the spinner on the first.
    pub fn delta(&mut self, text: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }

        let mut stdout = std::io::stdout().lock();
        let _ = stdout.write_all(text.as_bytes());
        let _ = stdout.flush();
    }

    /// Finish the stream: clear a still-running spinner, terminate the line.
    pub fn finish(mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
        println!();
    }
}

/// Print the response-time footer.
pub fn print_response_time(messages: &Messages, elapsed: Duration) {
    let line = fill(
        messages.response_time,
        "time",
        &format!("{:.2}", elapsed.as_secs_f64()),
    );
    println!("{}", line.dimmed());
}
