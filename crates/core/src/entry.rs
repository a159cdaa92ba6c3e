//! Master-log entry parsing and wire-line serialization
//!
//! A physical log line is `<digest> <date> <time> <json array>`. The
//! digest is carried but never verified. The translated line handed to
//! the importer always carries the zero-content digest instead.

use crate::digest;
use crate::record::truncate;
use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([0-9a-f]{64}) ([0-9-]+) ([0-9:]+) (\[.*\])$")
        .expect("log line pattern is valid")
});

/// One entry of the master log: digest, date, time, and an ordered
/// sequence of records.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub digest: String,
    pub date: String,
    pub time: String,
    pub records: Vec<Value>,
}

impl LogEntry {
    /// Parse a physical log line. Any line that does not match the format
    /// is a fatal format error.
    pub fn parse(line: &str) -> Result<Self> {
        let captures = LINE_RE.captures(line).with_context(|| {
            format!("unrecognised line format: {}", truncate(line, 200))
        })?;

        let json = &captures[4];
        let records: Vec<Value> = serde_json::from_str(json)
            .with_context(|| format!("malformed entry payload: {}", truncate(json, 200)))?;

        Ok(Self {
            digest: captures[1].to_string(),
            date: captures[2].to_string(),
            time: captures[3].to_string(),
            records,
        })
    }

    /// Build a synthetic entry, as manufactured by a post-issue hook.
    pub fn synthetic(date: &str, time: &str, records: Vec<Value>) -> Self {
        Self {
            digest: digest::empty_digest().to_string(),
            date: date.to_string(),
            time: time.to_string(),
            records,
        }
    }

    /// The `date time` pair, as handed to hooks.
    pub fn timestamp(&self) -> String {
        format!("{} {}", self.date, self.time)
    }

    /// Serialize for the importer's input channel. The digest slot always
    /// holds the hash of the empty string, not a content digest.
    pub fn wire_line(&self) -> Result<String> {
        let payload = serde_json::to_string(&self.records)
            .context("failed to serialize entry payload")?;
        Ok(format!(
            "{} {} {} {}",
            digest::empty_digest(),
            self.date,
            self.time,
            payload
        ))
    }
}
