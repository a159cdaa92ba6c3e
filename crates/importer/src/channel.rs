//! Independently pollable line channels over byte streams
//!
//! Each importer output stream gets a dedicated reader thread that feeds
//! complete lines into an unbounded channel. The controller polls with
//! [`LineChannel::try_line`] so a silent stream never stalls draining of
//! the others, and sweeps the remainder with [`LineChannel::drain`] at the
//! end of the run. Reader threads terminate at end-of-stream, which closes
//! the channel.

use anyhow::{Context, Result};
use crossbeam_channel::Receiver;
use std::io::{BufRead, BufReader, Read};
use std::thread::JoinHandle;

/// A pollable stream of complete lines.
pub struct LineChannel {
    rx: Receiver<String>,
    handle: Option<JoinHandle<()>>,
}

impl LineChannel {
    /// Start a reader thread over the given byte stream.
    pub fn spawn<R>(name: &str, stream: R) -> Result<Self>
    where
        R: Read + Send + 'static,
    {
        let (tx, rx) = crossbeam_channel::unbounded();
        let thread_name = format!("{}-reader", name);

        let handle = std::thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                let reader = BufReader::new(stream);
                for line in reader.lines() {
                    match line {
                        Ok(line) => {
                            if tx.send(line).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            tracing::debug!("reader stopped: {}", e);
                            break;
                        }
                    }
                }
            })
            .with_context(|| format!("failed to start {}", thread_name))?;

        Ok(Self {
            rx,
            handle: Some(handle),
        })
    }

    /// Non-blocking poll: the next complete line, if one is buffered.
    pub fn try_line(&self) -> Option<String> {
        self.rx.try_recv().ok()
    }

    /// Blocking sweep of everything left on the stream, up to end-of-stream.
    pub fn drain(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        while let Ok(line) = self.rx.recv() {
            lines.push(line);
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        lines
    }
}
