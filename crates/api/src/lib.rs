//! Code server HTTP library.
//!
//! Exposes the building blocks (config, state, error handling, handlers,
//! router) so integration tests and the binary entrypoint share them.

pub mod config;
pub mod error;
pub mod handlers;
pub mod html;
pub mod mime;
pub mod response;
pub mod router;
pub mod state;
