//! Transport layer: WebSocket upgrade and per-connection pump pair.

pub mod ws;
