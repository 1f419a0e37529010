//! relaycast hub library entry.
//!
//! This crate wires the transport, middleware pipeline, topology resolver,
//! connection registry, message store, and hot-reload coordinator into a
//! cohesive broadcast hub. It is intended to be consumed by the binary
//! (`main.rs`) and by integration tests.

pub mod api;
pub mod app_state;
pub mod broadcast;
pub mod config;
pub mod pipeline;
pub mod reload;
pub mod router;
pub mod routing;
pub mod store;
pub mod transport;
