//! Terminal output utilities for styled CLI output.

use console::{Term, style};
use std::fmt::Display;

/// Terminal output helper for consistent styled output.
pub struct Output {
    term: Term,
    err: Term,
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

impl Output {
    /// Create a new output helper writing to stdout, with errors on stderr.
    pub fn new() -> Self {
        Self {
            term: Term::stdout(),
            err: Term::stderr(),
        }
    }

    /// Print an error message with a red X.
    pub fn error(&self, message: impl Display) {
        drop(
            self.err
                .write_line(&format!("{} {}", style("✗").red().bold(), message)),
        );
    }

    /// Print a plain message without any prefix.
    pub fn print(&self, message: impl Display) {
        drop(self.term.write_line(&message.to_string()));
    }

    pub fn newline(&self) {
        drop(self.term.write_line(""));
    }

    pub fn header(&self, message: impl Display) {
        drop(
            self.term
                .write_line(&style(message).bold().cyan().to_string()),
        );
    }

    pub fn subheader(&self, message: impl Display) {
        drop(self.term.write_line(&style(message).bold().to_string()));
    }

    /// Print a labeled value with indentation.
    pub fn labeled_indent(&self, label: impl Display, value: impl Display, indent: usize) {
        let spaces = " ".repeat(indent);
        drop(
            self.term
                .write_line(&format!("{spaces}{}: {}", style(label).dim(), value)),
        );
    }

    pub fn dim(&self, message: impl Display) {
        drop(self.term.write_line(&style(message).dim().to_string()));
    }

    /// Print the "showing X of Y" footer under a list.
    pub fn showing(&self, shown: usize, total: usize) {
        drop(self.term.write_line(&format!(
            "{} {} of {} user(s)",
            style("Showing").dim(),
            style(shown).cyan().bold(),
            style(total).cyan()
        )));
    }
}
