//! Migration controller
//!
//! A small state machine that replays the master log into the target
//! store through the importer: read an entry, rewrite it, remap its
//! identifiers, send it, then poll the importer's three output channels
//! until the entry is confirmed or the process dies. The identifier map
//! and the accumulated pointer offset live here and have exactly one
//! writer: the feedback-handling step.

use crate::console;
use anyhow::{Context, Result};
use reissue_core::digest;
use reissue_core::entry::LogEntry;
use reissue_core::idmap::IdMap;
use reissue_core::record::{truncate, Record};
use reissue_core::remap::{remap_records, IncomingLinks};
use reissue_core::rewrite::{rewrite_records, Action};
use reissue_importer::feedback::{self, Feedback};
use reissue_importer::session::{DrainReport, ImporterSession};
use std::collections::HashSet;
use std::io::BufRead;
use std::path::PathBuf;
use std::time::Duration;

/// Where the controller currently is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    ReadingLog,
    Transforming,
    Sending,
    AwaitingFeedback,
    Done,
    Failed,
}

/// The accumulated pointer offset, adjustable only when identifier
/// offsetting is enabled. Hooks receive it mutably so they can
/// compensate for entries they skip or duplicate.
#[derive(Debug)]
pub struct IdOffset {
    enabled: bool,
    value: i64,
}

impl IdOffset {
    fn new(enabled: bool) -> Self {
        Self { enabled, value: 0 }
    }

    /// Decrement the offset by `n`.
    pub fn seal(&mut self, n: i64) -> Result<()> {
        self.shift(-n, "seal")
    }

    /// Increment the offset by `n`.
    pub fn prise(&mut self, n: i64) -> Result<()> {
        self.shift(n, "prise")
    }

    fn shift(&mut self, delta: i64, operation: &str) -> Result<()> {
        if !self.enabled {
            anyhow::bail!(
                "{} requires identifier offsetting to be enabled in the config",
                operation
            );
        }
        self.value += delta;
        Ok(())
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn value(&self) -> i64 {
        self.value
    }
}

/// Context handed to the post-issue hook for each issued identifier.
#[derive(Debug)]
pub struct IssueEvent<'a> {
    pub pointer: &'a str,
    pub new_id: &'a str,
    pub counter: u64,
    pub legacy_id: Option<&'a str>,
    pub timestamp: &'a str,
}

/// Per-record rewrite decision callback.
pub type RewriteFn = Box<dyn FnMut(&mut Record, Option<&Record>, &mut IdOffset) -> Action + Send>;

/// Post-issue hook; entries pushed into the buffer are replayed before
/// any further physical log line, most recent first.
pub type AfterIssueFn = Box<dyn FnMut(&IssueEvent<'_>, &mut IdOffset, &mut Vec<LogEntry>) + Send>;

/// Custom legacy-identifier derivation from the legacy sequence counter.
pub type LegacyIdFn = Box<dyn Fn(u64) -> Option<String> + Send>;

/// Everything the controller consumes from configuration. Validation
/// happens upstream; the controller trusts what it is given.
pub struct ControllerOptions {
    pub rewrite: Option<RewriteFn>,
    pub after_issue: Option<AfterIssueFn>,
    pub legacy_id_fn: Option<LegacyIdFn>,
    pub old_secret: Option<String>,
    pub incoming_links: IncomingLinks,
    pub mapping_exclude: HashSet<String>,
    pub id_offsetting: bool,
    pub id_map_file: Option<PathBuf>,
    pub poll_interval: Duration,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            rewrite: None,
            after_issue: None,
            legacy_id_fn: None,
            old_secret: None,
            incoming_links: IncomingLinks::new(),
            mapping_exclude: HashSet::new(),
            id_offsetting: false,
            id_map_file: None,
            poll_interval: Duration::from_micros(100),
        }
    }
}

enum AwaitOutcome {
    Imported,
    Died,
}

/// Drives one full replay of a master log.
pub struct Controller {
    options: ControllerOptions,
    id_map: IdMap,
    offset: IdOffset,
    issue_counter: u64,
    pending: Vec<LogEntry>,
    state: RunState,
}

impl Controller {
    pub fn new(options: ControllerOptions) -> Self {
        let offset = IdOffset::new(options.id_offsetting);
        Self {
            options,
            id_map: IdMap::new(),
            offset,
            issue_counter: 0,
            pending: Vec::new(),
            state: RunState::ReadingLog,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn id_map(&self) -> &IdMap {
        &self.id_map
    }

    pub fn offset(&self) -> i64 {
        self.offset.value()
    }

    /// Decrement the accumulated offset by `n`.
    pub fn seal(&mut self, n: i64) -> Result<()> {
        self.offset.seal(n)
    }

    /// Increment the accumulated offset by `n`.
    pub fn prise(&mut self, n: i64) -> Result<()> {
        self.offset.prise(n)
    }

    /// Replay the whole log. On success the identifier map is persisted
    /// (when a path is configured); on any failure it is discarded.
    pub fn run<R, I>(&mut self, log: R, importer: &mut I) -> Result<()>
    where
        R: BufRead,
        I: ImporterSession,
    {
        let result = self.replay(log, importer);
        self.state = if result.is_ok() {
            RunState::Done
        } else {
            RunState::Failed
        };
        result
    }

    fn replay<R, I>(&mut self, log: R, importer: &mut I) -> Result<()>
    where
        R: BufRead,
        I: ImporterSession,
    {
        let mut lines = log.lines();

        loop {
            self.state = RunState::ReadingLog;
            let entry = match self.next_entry(&mut lines)? {
                Some(entry) => entry,
                None => break,
            };

            self.state = RunState::Transforming;
            let mut entry = match self.transform(entry) {
                Some(entry) => entry,
                None => continue,
            };

            remap_records(
                &mut entry.records,
                &self.id_map,
                &self.options.incoming_links,
                &self.options.mapping_exclude,
            );

            self.state = RunState::Sending;
            let wire = entry.wire_line()?;
            console::fineprint(&truncate(&wire, 150));
            importer.send_line(&wire)?;

            self.state = RunState::AwaitingFeedback;
            match self.await_feedback(importer, &entry.timestamp())? {
                AwaitOutcome::Imported => {}
                AwaitOutcome::Died => {
                    console::error("importer process exited unexpectedly");
                    let report = importer.finish()?;
                    display_drain(&report);
                    anyhow::bail!("importer exited before confirming the entry import");
                }
            }
        }

        let report = importer.finish()?;
        display_drain(&report);

        if let Some(path) = &self.options.id_map_file {
            self.id_map.save(path)?;
        }

        Ok(())
    }

    /// Pop a pending synthetic entry, or read and parse the next physical
    /// log line. A non-matching line is a fatal format error.
    fn next_entry<B: BufRead>(&mut self, lines: &mut std::io::Lines<B>) -> Result<Option<LogEntry>> {
        if let Some(entry) = self.pending.pop() {
            return Ok(Some(entry));
        }

        match lines.next() {
            None => Ok(None),
            Some(line) => {
                let line = line.context("failed to read from the master log")?;
                LogEntry::parse(&line).map(Some)
            }
        }
    }

    /// Run the configured rewrite callback, then drop the entry entirely
    /// if nothing is left of its payload.
    fn transform(&mut self, mut entry: LogEntry) -> Option<LogEntry> {
        if let Some(callback) = self.options.rewrite.as_mut() {
            let offset = &mut self.offset;
            rewrite_records(&mut entry.records, &mut |record, parent| {
                callback(record, parent, offset)
            });
        }

        if entry.records.is_empty() {
            console::fineprint(&format!("skipping entry {} {}", entry.date, entry.time));
            return None;
        }

        Some(entry)
    }

    /// Poll the three output channels with a flat delay until the entry
    /// is confirmed or the importer dies. There is no timeout: a wedged
    /// importer stalls the run indefinitely.
    fn await_feedback<I: ImporterSession>(
        &mut self,
        importer: &mut I,
        timestamp: &str,
    ) -> Result<AwaitOutcome> {
        loop {
            let feedback_line = importer.try_feedback();
            let diagnostic_line = importer.try_diagnostic();
            let output_line = importer.try_output();

            if let Some(line) = output_line {
                console::output(&line);
            }
            if let Some(line) = diagnostic_line {
                console::error(&line);
            }

            let mut imported = false;
            if let Some(line) = feedback_line {
                console::feedback(&line);
                match feedback::parse(&line) {
                    Feedback::Issued { pointer, new_id } => {
                        self.handle_issued(importer, &pointer, &new_id, timestamp)?;
                    }
                    Feedback::EntryImported => imported = true,
                    Feedback::Other => {}
                }
            }

            if !importer.is_running() {
                return Ok(AwaitOutcome::Died);
            }
            if imported {
                return Ok(AwaitOutcome::Imported);
            }

            std::thread::sleep(self.options.poll_interval);
        }
    }

    /// One `issued:` line: advance the legacy sequence counter, resolve
    /// the legacy identifier, grow the map, and give the post-issue hook
    /// its chance to inject synthetic entries.
    fn handle_issued<I: ImporterSession>(
        &mut self,
        importer: &mut I,
        pointer: &str,
        new_id: &str,
        timestamp: &str,
    ) -> Result<()> {
        self.issue_counter += 1;

        let mut legacy_id: Option<String> = None;
        let mut legacy_pointer: i64 = 0;

        if !self.offset.enabled() {
            legacy_pointer = self.issue_counter as i64;
            legacy_id = match &self.options.legacy_id_fn {
                Some(derive) => derive(self.issue_counter),
                None => self
                    .options
                    .old_secret
                    .as_deref()
                    .map(|secret| digest::salted_id_hash(self.issue_counter, secret)),
            };
        } else if self.offset.value() != 0 {
            let issued_pointer: i64 = pointer
                .parse()
                .with_context(|| format!("issued pointer is not numeric: {}", pointer))?;
            legacy_pointer = issued_pointer - self.offset.value();
            let looked_up = importer.lookup_legacy_id(legacy_pointer)?;
            if !looked_up.is_empty() {
                legacy_id = Some(looked_up);
            }
        }

        if let Some(legacy) = &legacy_id {
            self.id_map.record_issue(legacy, new_id);
            console::fineprint(&format!(
                "Saved map {} → {} ({} → {})",
                legacy, new_id, legacy_pointer, pointer
            ));
        }

        if let Some(hook) = self.options.after_issue.as_mut() {
            let mut injected = Vec::new();
            let event = IssueEvent {
                pointer,
                new_id,
                counter: self.issue_counter,
                legacy_id: legacy_id.as_deref(),
                timestamp,
            };
            hook(&event, &mut self.offset, &mut injected);
            self.pending.append(&mut injected);
        }

        Ok(())
    }
}

fn display_drain(report: &DrainReport) {
    for line in &report.diagnostics {
        console::error(line);
    }
    for line in &report.output {
        console::output(line);
    }
    for line in &report.feedback {
        console::feedback(line);
    }
}
