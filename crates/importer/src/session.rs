//! The seam between the migration controller and the importer process

use anyhow::Result;

/// Buffered channel content collected while shutting a session down.
#[derive(Debug, Default, Clone)]
pub struct DrainReport {
    pub diagnostics: Vec<String>,
    pub output: Vec<String>,
    pub feedback: Vec<String>,
}

/// One live importer, as the controller sees it.
///
/// The three `try_*` methods are non-blocking and deliver at most one
/// complete line per call; absence of data on one channel must never
/// stall the others. `finish` closes the input channel, drains the three
/// output channels to end-of-stream, and reaps the process.
pub trait ImporterSession {
    /// Write one translated entry line to the importer's input channel.
    fn send_line(&mut self, line: &str) -> Result<()>;

    /// Next line from the feedback rendezvous channel, if any.
    fn try_feedback(&mut self) -> Option<String>;

    /// Next line from the importer's standard output, if any.
    fn try_output(&mut self) -> Option<String>;

    /// Next line from the importer's diagnostic channel, if any.
    fn try_diagnostic(&mut self) -> Option<String>;

    /// Whether the importer process is still alive.
    fn is_running(&mut self) -> bool;

    /// Resolve a legacy pointer to its legacy identifier via the
    /// importer's synchronous lookup command. Returns the trimmed output.
    fn lookup_legacy_id(&mut self, pointer: i64) -> Result<String>;

    /// Close input, drain all channels, reap the process.
    fn finish(&mut self) -> Result<DrainReport>;
}
