//! Reissue Core - Record-tree engines for master-log replay
//!
//! This crate provides the data layer of the replay pipeline:
//! - Open-ended record trees (ordered field maps over JSON values)
//! - Recursive rewrite/filter engine with splice semantics
//! - Recursive identifier remapping against a growing identifier map
//! - Master-log entry parsing and wire-line serialization
//! - Digest helpers (zero-content digest, salted legacy-pointer hash)

pub mod digest;
pub mod entry;
pub mod idmap;
pub mod record;
pub mod remap;
pub mod rewrite;

// Re-export main types for convenience
pub use entry::LogEntry;
pub use idmap::IdMap;
pub use record::Record;
pub use remap::IncomingLinks;
pub use rewrite::Action;

/// Common result type used throughout reissue-core
pub type Result<T> = anyhow::Result<T>;
