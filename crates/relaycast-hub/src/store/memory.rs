//! In-memory message store with lazy TTL expiry.
//!
//! Expiry is checked on read; entries are evicted when a read finds them
//! stale. A TTL of zero means no expiry.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::RwLock;

use relaycast_core::protocol::MessageStatus;
use relaycast_core::{RelayError, Result};

use super::MessageStore;

struct Entry<T> {
    value: T,
    expires_at: Option<Instant>,
}

impl<T> Entry<T> {
    fn new(value: T, ttl: Duration) -> Self {
        let expires_at = (!ttl.is_zero()).then(|| Instant::now() + ttl);
        Self { value, expires_at }
    }

    fn expired(&self) -> bool {
        self.expires_at.is_some_and(|t| Instant::now() >= t)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    messages: RwLock<HashMap<String, Entry<Vec<u8>>>>,
    statuses: RwLock<HashMap<String, Entry<MessageStatus>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn read_live<T: Clone>(map: &RwLock<HashMap<String, Entry<T>>>, id: &str) -> Option<T> {
    {
        let guard = map.read();
        match guard.get(id) {
            Some(e) if !e.expired() => return Some(e.value.clone()),
            Some(_) => {}
            None => return None,
        }
    }
    // stale entry: evict under the write lock
    map.write().remove(id);
    None
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn store_message(&self, id: &str, bytes: &[u8], ttl: Duration) -> Result<()> {
        self.messages
            .write()
            .insert(id.to_string(), Entry::new(bytes.to_vec(), ttl));
        Ok(())
    }

    async fn get_message(&self, id: &str) -> Result<Vec<u8>> {
        read_live(&self.messages, id)
            .ok_or_else(|| RelayError::NotFound(format!("message {id}")))
    }

    async fn delete_message(&self, id: &str) -> Result<()> {
        self.messages.write().remove(id);
        Ok(())
    }

    async fn set_status(&self, id: &str, status: MessageStatus, ttl: Duration) -> Result<()> {
        self.statuses
            .write()
            .insert(id.to_string(), Entry::new(status, ttl));
        Ok(())
    }

    async fn get_status(&self, id: &str) -> Result<MessageStatus> {
        read_live(&self.statuses, id)
            .ok_or_else(|| RelayError::NotFound(format!("status for message {id}")))
    }

    async fn stats(&self) -> Result<serde_json::Value> {
        Ok(serde_json::json!({
            "type": "memory",
            "stored_messages": self.messages.read().len(),
            "message_statuses": self.statuses.read().len(),
        }))
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn store_and_read_back() {
        let s = MemoryStore::new();
        s.store_message("m1", b"payload", Duration::ZERO).await.unwrap();
        assert_eq!(s.get_message("m1").await.unwrap(), b"payload");

        s.set_status("m1", MessageStatus::Processing, Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(s.get_status("m1").await.unwrap(), MessageStatus::Processing);

        s.set_status("m1", MessageStatus::Success, Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(s.get_status("m1").await.unwrap(), MessageStatus::Success);
    }

    #[tokio::test]
    async fn missing_entries_are_not_found() {
        let s = MemoryStore::new();
        assert!(s.get_message("nope").await.is_err());
        assert!(s.get_status("nope").await.is_err());
    }

    #[tokio::test]
    async fn zero_ttl_never_expires() {
        let s = MemoryStore::new();
        s.store_message("m1", b"x", Duration::ZERO).await.unwrap();
        assert!(s.get_message("m1").await.is_ok());
    }

    #[tokio::test]
    async fn expired_entries_vanish_on_read() {
        let s = MemoryStore::new();
        s.store_message("m1", b"x", Duration::from_nanos(1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(s.get_message("m1").await.is_err());
        assert!(s.messages.read().is_empty(), "stale entry evicted");
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let s = MemoryStore::new();
        s.store_message("m1", b"x", Duration::ZERO).await.unwrap();
        s.delete_message("m1").await.unwrap();
        s.delete_message("m1").await.unwrap();
        assert!(s.get_message("m1").await.is_err());
    }
}
