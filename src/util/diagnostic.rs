//! User-friendly diagnostic messages.
//!
//! Fatal errors are reported with their root cause, the chain of context
//! that led to them, and suggested fixes (taken from the `help` of errors
//! that carry one).

use std::fmt;

/// A fatal error message with optional suggestions.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Primary message
    pub message: String,
    /// Additional context lines
    pub context: Vec<String>,
    /// Suggested fixes
    pub suggestions: Vec<String>,
}

impl Diagnostic {
    /// Create a new error diagnostic.
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic {
            message: message.into(),
            context: Vec::new(),
            suggestions: Vec::new(),
        }
    }

    /// Build an error diagnostic from an error and its chain of causes.
    pub fn from_error(err: &anyhow::Error) -> Self {
        let mut diag = Diagnostic::error(err.to_string());
        for cause in err.chain().skip(1) {
            diag = diag.with_context(cause.to_string());
        }
        diag
    }

    /// Add context to the diagnostic.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context.push(context.into());
        self
    }

    /// Add a suggestion for fixing the issue.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Format the diagnostic for terminal output.
    pub fn format(&self, color: bool) -> String {
        let mut output = String::new();

        let error_prefix = if color {
            "\x1b[1;31merror\x1b[0m"
        } else {
            "error"
        };

        output.push_str(&format!("{}: {}\n", error_prefix, self.message));

        for ctx in &self.context {
            output.push_str(&format!("  caused by: {}\n", ctx));
        }

        if !self.suggestions.is_empty() {
            output.push('\n');
            let help_prefix = if color {
                "\x1b[1;32mhelp\x1b[0m"
            } else {
                "help"
            };
            output.push_str(&format!("{}: consider:\n", help_prefix));
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                output.push_str(&format!("  {}. {}\n", i + 1, suggestion));
            }
        }

        output
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format(false))
    }
}

/// Print a diagnostic to stderr.
pub fn emit(diagnostic: &Diagnostic, color: bool) {
    eprint!("{}", diagnostic.format(color));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_formatting() {
        let diag = Diagnostic::error("missing tool `builtin:serial-discovery@1.0.0`")
            .with_context("download returned HTTP 404")
            .with_suggestion("Check your network connection");

        let output = diag.format(false);
        assert!(output.starts_with("error: missing tool"));
        assert!(output.contains("caused by: download returned HTTP 404"));
        assert!(output.contains("help: consider:"));
        assert!(output.contains("1. Check your network connection"));
    }

    #[test]
    fn test_from_error_walks_chain() {
        let err = anyhow::anyhow!("connection refused").context("failed to download");
        let diag = Diagnostic::from_error(&err);

        assert_eq!(diag.message, "failed to download");
        assert_eq!(diag.context, vec!["connection refused".to_string()]);
    }
}
