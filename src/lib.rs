#![cfg_attr(not(test), deny(clippy::panic))]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::too_many_arguments,
    clippy::too_many_lines
)]

//! # Arcadia Server
//!
//! Server-side control plane for a multi-tenant game-hosting platform:
//! a persistent storage service owning the catalog, a lobby service
//! coordinating sessions, rooms, and invitations, and short-lived match
//! services running one game each. All links speak the same length-prefixed
//! JSON TCP protocol.

/// Game artifact storage layout and content hashing
pub mod artifacts;

/// Configuration loading and sections
pub mod config;

/// Lobby service: sessions, rooms, invites, match handoff
pub mod lobby;

/// Structured logging configuration
pub mod logging;

/// Match service framework and the reference game implementations
pub mod matchsvc;

/// Connection helpers: retry, port scanning, readiness probes
pub mod net;

/// Wire protocol: framing, message shapes, reason tokens, validation
pub mod protocol;

/// Storage service: persistent collections behind a request interface
pub mod storage;
