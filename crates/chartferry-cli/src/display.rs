//! Progress output for CLI commands
//!
//! Everything here goes to stderr; stdout carries only the JSON response
//! the pipeline reads back.

use console::style;

/// A pipeline step starting, e.g. `Packaging webapp 1.2.3`
pub fn step(verb: &str, detail: &str) {
    eprintln!("{} {}", style(verb).cyan().bold(), detail);
}

/// An indented detail line under the current step
pub fn detail(label: &str, value: &str) {
    eprintln!("  {} {}", style(format!("{}:", label)).dim(), value);
}

/// A step finishing
pub fn success(message: &str) {
    eprintln!("{} {}", style("✓").green().bold(), message);
}

pub fn warning(message: &str) {
    eprintln!("{} {}", style("warning:").yellow().bold(), message);
}
