//! relaycast core: wire-level envelope model and the shared error surface.
//!
//! This crate defines the JSON envelope peers exchange with the hub, the
//! ack/error reply shapes, message-status vocabulary, and the error type
//! shared by the hub and its tooling. It carries no transport or runtime
//! dependencies so it can be reused by peer SDKs and tests.
//!
//! All fallible paths surface as `RelayError`/`Result`; panics, `unwrap`,
//! and `expect` are compile-denied so malformed traffic can never take the
//! hub down.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod protocol;

/// Shared result type.
pub use error::{RelayError, Result};
