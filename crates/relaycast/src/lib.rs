//! Top-level facade crate for relaycast.
//!
//! Re-exports the protocol types and the hub library so users can depend on a single crate.

pub mod core {
    pub use relaycast_core::*;
}

pub mod hub {
    pub use relaycast_hub::*;
}
