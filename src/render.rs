//! Terminal output for the chat front end.
//!
//! [`Renderer`] is the display side of a conversation. [`StreamPrinter`]
//! adapts any renderer into the [`StreamHandler`] a stream is dispatched to.

use std::io::{self, Stdout, Write};

use crate::Error;
use crate::dispatch::StreamHandler;
use crate::types::{EmbeddedDocument, Session};

/// ANSI escape code for dim text (used for informational lines).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for cyan text (used for session titles).
const ANSI_CYAN: &str = "\x1b[36m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// Trait for rendering chat output.
///
/// Implementations decide how text reaches the user; plain text with or
/// without ANSI styling is provided.
pub trait Renderer: Send {
    /// Print a chunk of the answer as it streams in.
    fn print_text(&mut self, text: &str);

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);

    /// Print the title of the session being shown.
    fn print_title(&mut self, title: &str);

    /// Called when an answer is complete.
    fn finish_response(&mut self);

    /// Called when the user interrupts an answer.
    fn print_interrupted(&mut self) {}

    /// Print multi-line help, one informational line at a time.
    fn print_help(&mut self, help: &str) {
        for line in help.lines().filter(|line| !line.trim().is_empty()) {
            self.print_info(line);
        }
    }
}

/// Plain text renderer with optional ANSI styling.
pub struct PlainTextRenderer {
    stdout: Stdout,
    use_color: bool,
    line_start: bool,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self {
            stdout: io::stdout(),
            use_color,
            line_start: true,
        }
    }

    fn flush(&mut self) {
        let _ = self.stdout.flush();
    }

    fn styled(&self, style: &str, text: &str) -> String {
        if self.use_color {
            format!("{style}{text}{ANSI_RESET}")
        } else {
            text.to_string()
        }
    }

    // Informational output always starts on a fresh line.
    fn break_line(&mut self) {
        if !self.line_start {
            println!();
            self.line_start = true;
        }
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for PlainTextRenderer {
    fn print_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        print!("{text}");
        self.line_start = text.ends_with('\n');
        self.flush();
    }

    fn print_error(&mut self, error: &str) {
        self.break_line();
        let line = self.styled(ANSI_RED, &format!("Error: {error}"));
        eprintln!("{line}");
    }

    fn print_info(&mut self, info: &str) {
        self.break_line();
        println!("{}", self.styled(ANSI_DIM, info));
        self.flush();
    }

    fn print_title(&mut self, title: &str) {
        self.break_line();
        println!("{}", self.styled(ANSI_CYAN, &format!("== {title} ==")));
        self.flush();
    }

    fn finish_response(&mut self) {
        self.break_line();
        self.flush();
    }

    fn print_interrupted(&mut self) {
        self.break_line();
        println!("{}", self.styled(ANSI_DIM, "[interrupted]"));
        self.flush();
    }
}

/// Forwards a chat stream's events to a [`Renderer`].
pub struct StreamPrinter<'a, R: Renderer + ?Sized> {
    renderer: &'a mut R,
}

impl<'a, R: Renderer + ?Sized> StreamPrinter<'a, R> {
    pub fn new(renderer: &'a mut R) -> Self {
        Self { renderer }
    }
}

impl<R: Renderer + ?Sized> StreamHandler for StreamPrinter<'_, R> {
    fn on_delta(&mut self, text: &str) {
        self.renderer.print_text(text);
    }

    fn on_complete(&mut self) {
        self.renderer.finish_response();
    }

    fn on_error(&mut self, error: &Error) {
        self.renderer.print_error(&error.to_string());
    }
}

/// One line describing a session in a listing.
pub fn session_summary(session: &Session) -> String {
    let mut line = format!(
        "{}  {}  ({} turns)",
        session.id,
        session.title,
        session.turns.len()
    );
    if let Some(document) = &session.document {
        line.push_str(&format!(" [{}]", document.name));
    }
    line
}

/// One line describing an embedded document.
pub fn document_summary(document: &EmbeddedDocument) -> String {
    format!(
        "{}  {} chunks, {}",
        document.document_name,
        document.chunk_count,
        human_size(document.file_size)
    )
}

fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
