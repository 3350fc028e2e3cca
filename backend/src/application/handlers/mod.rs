//! Application handlers.
//!
//! Command handlers that orchestrate billing operations.

pub mod billing;
