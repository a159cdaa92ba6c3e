//! Colored operator console
//!
//! Four line sinks matching the streams the operator watches during a
//! run: importer stdout in green, importer diagnostics in red, feedback
//! in yellow, and our own fine print dimmed.

use owo_colors::OwoColorize;

/// Importer diagnostic line.
pub fn error(message: &str) {
    println!("{}", message.red());
}

/// Feedback-channel line.
pub fn feedback(message: &str) {
    println!("{}", message.yellow());
}

/// Low-importance progress detail.
pub fn fineprint(message: &str) {
    println!("{}", message.bright_black());
}

/// Importer standard-output line.
pub fn output(message: &str) {
    println!("{}", message.green());
}
