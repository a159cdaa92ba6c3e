//! Shared fixtures for controller integration tests

use anyhow::Result;
use reissue_importer::session::{DrainReport, ImporterSession};
use std::collections::VecDeque;

/// An in-memory importer with scripted feedback, used to exercise the
/// controller without a real subprocess.
pub struct ScriptedImporter {
    /// Every wire line the controller sent, in order.
    pub sent: Vec<String>,
    /// Legacy pointers the controller looked up, in order.
    pub lookups: Vec<i64>,
    scripts: VecDeque<Vec<String>>,
    queue: VecDeque<String>,
    running: bool,
    die_after_sends: Option<usize>,
    lookup_reply: Box<dyn FnMut(i64) -> String + Send>,
}

impl ScriptedImporter {
    pub fn new() -> Self {
        Self {
            sent: Vec::new(),
            lookups: Vec::new(),
            scripts: VecDeque::new(),
            queue: VecDeque::new(),
            running: true,
            die_after_sends: None,
            lookup_reply: Box::new(|pointer| format!("LEG{}", pointer)),
        }
    }

    /// Queue the feedback lines to emit in response to the next sent
    /// entry. Entries without a script get a bare `entry imported`.
    pub fn on_next_entry(mut self, feedback: &[&str]) -> Self {
        self.scripts
            .push_back(feedback.iter().map(|s| s.to_string()).collect());
        self
    }

    /// Simulate the process dying instead of acknowledging the nth sent
    /// entry (1-based).
    pub fn die_on_send(mut self, n: usize) -> Self {
        self.die_after_sends = Some(n);
        self
    }

    /// Override the reply of the legacy-pointer lookup command.
    pub fn lookup_replies(mut self, reply: impl FnMut(i64) -> String + Send + 'static) -> Self {
        self.lookup_reply = Box::new(reply);
        self
    }
}

impl ImporterSession for ScriptedImporter {
    fn send_line(&mut self, line: &str) -> Result<()> {
        self.sent.push(line.to_string());

        if self.die_after_sends == Some(self.sent.len()) {
            self.running = false;
            return Ok(());
        }

        let feedback = self
            .scripts
            .pop_front()
            .unwrap_or_else(|| vec!["entry imported".to_string()]);
        self.queue.extend(feedback);
        Ok(())
    }

    fn try_feedback(&mut self) -> Option<String> {
        self.queue.pop_front()
    }

    fn try_output(&mut self) -> Option<String> {
        None
    }

    fn try_diagnostic(&mut self) -> Option<String> {
        None
    }

    fn is_running(&mut self) -> bool {
        self.running
    }

    fn lookup_legacy_id(&mut self, pointer: i64) -> Result<String> {
        self.lookups.push(pointer);
        Ok((self.lookup_reply)(pointer))
    }

    fn finish(&mut self) -> Result<DrainReport> {
        self.running = false;
        Ok(DrainReport::default())
    }
}

/// A well-formed log line with the given payload JSON.
pub fn log_line(date: &str, time: &str, payload: &str) -> String {
    format!("{} {} {} {}", "0".repeat(64), date, time, payload)
}
