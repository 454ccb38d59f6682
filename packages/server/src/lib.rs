//! Signaling and session broker library.
//!
//! Pairs peers into two-party rooms, drives the call
//! request/accept/reject state machine, and relays negotiation messages
//! by peer-targeted routing.

// layers
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;
