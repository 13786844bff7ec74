//! User-facing diagnostic messages.
//!
//! Every fatal message carries its root cause and at least one suggested fix.

use std::fmt;

/// Common suggestion messages for consistent error handling.
pub mod suggestions {
    /// Suggestion when a forced backend cannot be provided.
    pub const GPU_DISABLE: &str = "Run with `--gpu disable` (or `--gpu auto`) to continue on the CPU";

    /// Suggestion to see each provisioning step.
    pub const VERBOSE: &str = "Rerun with `--verbose` to see each build step";

    /// Suggestion when a cached library may be stale or broken.
    pub const RECOMPILE: &str = "Rebuild the backend from scratch with `--recompile`";

    /// Suggestion when the host cannot run the backend at all.
    pub const PLATFORM: &str = "This backend only runs on the platform it was written for";
}

/// A fatal message with its causes and suggested fixes.
#[derive(Debug, Clone, Default)]
pub struct Diagnostic {
    /// Primary message
    pub message: String,
    /// Causes, outermost first; may span several lines
    pub context: Vec<String>,
    /// Suggested fixes
    pub suggestions: Vec<String>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic {
            message: message.into(),
            ..Diagnostic::default()
        }
    }

    /// Add a cause.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context.push(context.into());
        self
    }

    /// Add a suggestion for fixing the issue.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Render for a terminal, with ANSI colors when `color` is set.
    pub fn format(&self, color: bool) -> String {
        let paint = |code: &str, text: &str| {
            if color {
                format!("\x1b[{}m{}\x1b[0m", code, text)
            } else {
                text.to_string()
            }
        };

        let mut output = format!("{}: {}\n", paint("1;31", "error"), self.message);

        // Compiler output keeps its line breaks, indented under the cause.
        for ctx in &self.context {
            let mut lines = ctx.lines();
            if let Some(first) = lines.next() {
                output.push_str(&format!("  caused by: {}\n", first));
            }
            for line in lines {
                output.push_str(&format!("    {}\n", line));
            }
        }

        if !self.suggestions.is_empty() {
            output.push_str(&format!("\n{}: consider:\n", paint("1;32", "help")));
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                output.push_str(&format!("  {}. {}\n", i + 1, suggestion));
            }
        }

        output
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format(false))
    }
}

/// Print a diagnostic to stderr.
pub fn emit(diagnostic: &Diagnostic, color: bool) {
    eprint!("{}", diagnostic.format(color));
}
