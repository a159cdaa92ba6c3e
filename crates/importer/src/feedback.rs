//! Feedback-line grammar
//!
//! The importer reports progress over the feedback pipe one line at a
//! time. Two line shapes drive control flow; everything else is surfaced
//! to the operator and otherwise ignored.

use once_cell::sync::Lazy;
use regex::Regex;

static ISSUED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^issued: (\S+) (\S+)").expect("issued pattern is valid"));

/// A classified feedback line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Feedback {
    /// The store issued a fresh identifier for the record at `pointer`.
    Issued { pointer: String, new_id: String },
    /// The current entry has been fully imported.
    EntryImported,
    /// Informational chatter.
    Other,
}

/// Classify one feedback line.
pub fn parse(line: &str) -> Feedback {
    if line == "entry imported" {
        return Feedback::EntryImported;
    }
    if let Some(captures) = ISSUED_RE.captures(line) {
        return Feedback::Issued {
            pointer: captures[1].to_string(),
            new_id: captures[2].to_string(),
        };
    }
    Feedback::Other
}
