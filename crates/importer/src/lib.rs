//! Reissue Importer - subprocess plumbing for the external importer
//!
//! The importer runs as an independent OS process. This crate assembles
//! its command line, creates the named-pipe feedback rendezvous, turns its
//! three output streams into independently pollable line channels, and
//! exposes the whole thing behind the [`ImporterSession`] seam the
//! migration controller is written (and tested) against.

pub mod channel;
pub mod command;
pub mod feedback;
pub mod fifo;
pub mod process;
pub mod session;

pub use channel::LineChannel;
pub use command::ImporterCommand;
pub use feedback::Feedback;
pub use fifo::FeedbackPipe;
pub use process::ImporterProcess;
pub use session::{DrainReport, ImporterSession};

/// Common result type used throughout reissue-importer
pub type Result<T> = anyhow::Result<T>;
