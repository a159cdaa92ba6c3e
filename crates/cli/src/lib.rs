//! Reissue CLI library - exports modules for testing and embedding

pub mod config;
pub mod console;
pub mod controller;
