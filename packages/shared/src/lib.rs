//! Shared utilities for the kakehashi workspace.
//!
//! Small helpers used by both the broker and the client binaries:
//! clock abstraction and tracing setup.

pub mod logger;
pub mod time;
