//! Shared plumbing for the Prism crates: logging, command line, profiling and collections.

pub mod cli;
pub mod collections;
pub mod log;
pub mod profile;
