//! Message store contract and backend selection.
//!
//! The hub relies only on read-after-write consistency within the process
//! and treats TTL as advisory (zero TTL = no expiry). Store failures are
//! logged by callers and never fail delivery.

pub mod memory;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use relaycast_core::protocol::MessageStatus;
use relaycast_core::{RelayError, Result};

use crate::config::{StoreBackend, StoreSection};

#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn store_message(&self, id: &str, bytes: &[u8], ttl: Duration) -> Result<()>;
    async fn get_message(&self, id: &str) -> Result<Vec<u8>>;
    async fn delete_message(&self, id: &str) -> Result<()>;
    async fn set_status(&self, id: &str, status: MessageStatus, ttl: Duration) -> Result<()>;
    async fn get_status(&self, id: &str) -> Result<MessageStatus>;
    async fn stats(&self) -> Result<serde_json::Value>;
    async fn close(&self) -> Result<()>;
}

/// Select and construct the store backend once, at startup.
///
/// Only the in-memory backend ships with the hub; cache-server and
/// relational backends are external collaborators deployed alongside it.
pub fn build_store(cfg: &StoreSection) -> Result<Arc<dyn MessageStore>> {
    match cfg.backend {
        StoreBackend::Memory => Ok(Arc::new(memory::MemoryStore::new())),
        other => Err(RelayError::Config(format!(
            "store backend '{}' is not bundled with this build; use 'memory'",
            other.as_str()
        ))),
    }
}

/// Advisory TTL from config; zero disables expiry.
pub fn message_ttl(cfg: &StoreSection) -> Duration {
    Duration::from_secs(cfg.message_ttl_secs)
}
