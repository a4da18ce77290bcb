//! Domain logic for the live-recompilation code server.
//!
//! Everything here is independent of HTTP: module registry and versioned
//! output directories, the job runner that serializes compiles per module,
//! progress snapshots, the request-path grammar, and source-map lookup.

pub mod compiler;
pub mod error;
pub mod job;
pub mod job_runner;
pub mod names;
pub mod outbox;
pub mod outbox_table;
pub mod paths;
pub mod progress;
pub mod source_handler;

#[cfg(test)]
pub(crate) mod test_helpers;
