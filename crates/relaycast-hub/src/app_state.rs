//! Shared application state for the relaycast hub.
//!
//! The router/pipeline/broadcaster triple lives in one immutable `HubCore`
//! value swapped wholesale on reload; every reader clones the current Arc
//! and therefore observes a fully-old or fully-new topology, never a mix.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::mpsc;

use relaycast_core::Result;

use crate::broadcast::{Broadcaster, ConnectionHandle};
use crate::config::HubConfig;
use crate::pipeline::Pipeline;
use crate::reload::RoutePause;
use crate::routing::{PatternMatcher, Router};
use crate::store::{self, MessageStore};

/// One immutable routing generation: topology snapshot plus the registry
/// built for it. Rebuilt from scratch on every reload.
pub struct HubCore {
    pub config: Arc<HubConfig>,
    pub broadcaster: Broadcaster,
}

impl HubCore {
    pub fn build(config: Arc<HubConfig>, pause: Arc<RoutePause>) -> Self {
        // fresh matcher = wholesale pattern-cache invalidation across reloads
        let matcher = Arc::new(PatternMatcher::new());
        let router = Router::new(&config, Arc::clone(&matcher), pause);
        let pipeline = Pipeline::standard();
        let broadcaster = Broadcaster::new(&config, router, pipeline, matcher);
        Self {
            config,
            broadcaster,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    core: RwLock<Arc<HubCore>>,
    store: Arc<dyn MessageStore>,
    pause: Arc<RoutePause>,
    message_ttl: Duration,
}

impl AppState {
    pub fn new(config: HubConfig) -> Result<Self> {
        let store = store::build_store(&config.store)?;
        let message_ttl = store::message_ttl(&config.store);
        let pause = Arc::new(RoutePause::new());
        let core = HubCore::build(Arc::new(config), Arc::clone(&pause));
        Ok(Self {
            inner: Arc::new(AppStateInner {
                core: RwLock::new(Arc::new(core)),
                store,
                pause,
                message_ttl,
            }),
        })
    }

    /// Current routing generation. Hold the returned Arc for one operation,
    /// re-fetch for the next.
    pub fn core(&self) -> Arc<HubCore> {
        self.inner.core.read().clone()
    }

    pub fn store(&self) -> &Arc<dyn MessageStore> {
        &self.inner.store
    }

    pub fn pause(&self) -> Arc<RoutePause> {
        Arc::clone(&self.inner.pause)
    }

    pub fn message_ttl(&self) -> Duration {
        self.inner.message_ttl
    }

    /// Register a peer's send handle against the live core. Goes through
    /// the core lock, so a registration racing `apply_config` lands in the
    /// post-swap registry rather than a drained one.
    pub fn register(&self, handle: ConnectionHandle) {
        self.inner.core.read().broadcaster.add(handle);
    }

    /// Remove a peer's registration, but only while `tx` still identifies
    /// the registered handle. A stale socket dying after a same-id
    /// reconnect must not evict the fresh connection.
    pub fn deregister(&self, id: &str, tx: &mpsc::Sender<Vec<u8>>) {
        self.inner.core.read().broadcaster.remove_handle(id, tx);
    }

    /// Swap in a new configuration: build a fresh core, migrate every
    /// registered connection handle into it, then publish it. Runs under
    /// the write lock while routing is paused, so no resolve observes a
    /// half-migrated registry.
    pub fn apply_config(&self, config: Arc<HubConfig>) -> Result<()> {
        let fresh = HubCore::build(config, Arc::clone(&self.inner.pause));
        let mut guard = self.inner.core.write();
        let migrated = guard.broadcaster.drain_handles();
        let count = migrated.len();
        for handle in migrated {
            fresh.broadcaster.add(handle);
        }
        *guard = Arc::new(fresh);
        tracing::info!(connections = count, "topology swapped, connections migrated");
        Ok(())
    }

    /// Registry + router + store statistics for the control surface.
    pub async fn stats(&self) -> serde_json::Value {
        let core = self.core();
        let mut stats = core.broadcaster.stats();
        stats["configured_peers"] = serde_json::json!(core
            .config
            .peers
            .iter()
            .map(|p| p.name.as_str())
            .collect::<Vec<_>>());
        match self.inner.store.stats().await {
            Ok(s) => {
                stats["store"] = s;
            }
            Err(e) => tracing::warn!(error = %e, "store stats unavailable"),
        }
        stats
    }
}
