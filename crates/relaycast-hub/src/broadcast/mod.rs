//! Connection registry and fan-out broadcaster.
//!
//! Owns the live peer-id → send-handle map behind a single reader/writer
//! lock (lookups and fan-out read, add/remove and the reload migration
//! write) and orchestrates pipeline → resolve → executeAt override →
//! blacklist → transform → fan-out. A full queue or vanished handle skips
//! that one target; only a disconnected `executeAt` target fails the whole
//! broadcast.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;

use relaycast_core::protocol::{Envelope, EnvelopeKind};
use relaycast_core::{RelayError, Result};

use crate::config::{HubConfig, RuleConfig, Transform};
use crate::pipeline::Pipeline;
use crate::routing::{blacklist, PatternMatcher, Router};

/// Bounded backpressure buffer per connection; one slow consumer must not
/// stall fan-out to everyone else.
pub const OUTBOUND_QUEUE_CAPACITY: usize = 256;

/// Send-capable handle to one peer's outbound queue. The lifecycle manager
/// owns the queue and socket; the registry holds only this handle.
#[derive(Clone)]
pub struct ConnectionHandle {
    id: String,
    tx: mpsc::Sender<Vec<u8>>,
}

impl ConnectionHandle {
    pub fn new(id: impl Into<String>, tx: mpsc::Sender<Vec<u8>>) -> Self {
        Self { id: id.into(), tx }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_connected(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Non-blocking enqueue onto the peer's outbound queue.
    pub fn try_send(&self, bytes: Vec<u8>) -> Result<()> {
        self.tx.try_send(bytes).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => RelayError::QueueFull(self.id.clone()),
            mpsc::error::TrySendError::Closed(_) => {
                RelayError::Internal(format!("connection {} gone", self.id))
            }
        })
    }
}

/// Outcome of one broadcast: how many targets were resolved after
/// filtering, and how many enqueues succeeded.
#[derive(Debug, Clone, Copy)]
pub struct BroadcastOutcome {
    pub targets: usize,
    pub delivered: usize,
}

pub struct Broadcaster {
    connections: RwLock<HashMap<String, ConnectionHandle>>,
    router: Router,
    pipeline: Pipeline,
    rules: Vec<RuleConfig>,
    matcher: Arc<PatternMatcher>,
}

impl Broadcaster {
    pub fn new(
        cfg: &HubConfig,
        router: Router,
        pipeline: Pipeline,
        matcher: Arc<PatternMatcher>,
    ) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            router,
            pipeline,
            rules: cfg.rules.clone(),
            matcher,
        }
    }

    /// Insert or overwrite by id. A reconnect under the same identifier
    /// replaces the prior handle; dropping it closes the old queue, which
    /// winds the stale socket down.
    pub fn add(&self, handle: ConnectionHandle) {
        let id = handle.id().to_string();
        self.connections.write().insert(id.clone(), handle);
        tracing::info!(peer = %id, "connection registered");
    }

    /// Remove by id; a second call is a no-op.
    pub fn remove(&self, id: &str) {
        if self.connections.write().remove(id).is_some() {
            tracing::info!(peer = %id, "connection removed");
        }
    }

    /// Remove by id only when `tx` is still the registered handle's queue.
    /// Late deregistration from a replaced socket leaves the fresh
    /// registration alone.
    pub fn remove_handle(&self, id: &str, tx: &mpsc::Sender<Vec<u8>>) {
        let mut conns = self.connections.write();
        if conns.get(id).is_some_and(|h| h.tx.same_channel(tx)) {
            conns.remove(id);
            tracing::info!(peer = %id, "connection removed");
        }
    }

    pub fn connection_ids(&self) -> Vec<String> {
        self.connections.read().keys().cloned().collect()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.read().len()
    }

    /// Take every registered handle, emptying the registry. Used by the
    /// reload swap to migrate live connections into the fresh registry.
    pub fn drain_handles(&self) -> Vec<ConnectionHandle> {
        self.connections.write().drain().map(|(_, h)| h).collect()
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Decode, filter, resolve, and fan out one raw envelope.
    ///
    /// Returns success with zero targets when the pipeline drops the
    /// envelope; partial delivery is still success. The only hard error is
    /// a command whose `executeAt` target is not connected.
    pub fn broadcast(&self, raw: &[u8]) -> Result<BroadcastOutcome> {
        let env = Envelope::decode(raw)?;

        let Some(env) = self.pipeline.process(env)? else {
            return Ok(BroadcastOutcome {
                targets: 0,
                delivered: 0,
            });
        };

        tracing::info!(from = %env.from, kind = %env.kind, id = %env.id, "broadcasting");

        let connected = self.connection_ids();
        let mut targets = self.router.resolve(&env.from, &connected);

        // A command pinned to one peer overrides resolution entirely; if
        // that peer is absent the whole broadcast fails, surfaced to the
        // sender rather than silently dropped.
        if env.is(EnvelopeKind::Command) && !env.body.execute_at.is_empty() {
            let at = env.body.execute_at.clone();
            if connected.iter().any(|c| *c == at) {
                tracing::info!(target = %at, "command pinned to executeAt target");
                targets = vec![at];
            } else {
                return Err(RelayError::TargetNotConnected(at));
            }
        }

        let targets =
            blacklist::filter_targets(&env, targets, self.router.groups(), &self.matcher);

        let payload = self.transformed_payload(&env, raw)?;

        let mut delivered = 0;
        {
            let conns = self.connections.read();
            for target in &targets {
                let Some(handle) = conns.get(target) else {
                    tracing::debug!(%target, "target handle missing, skipped");
                    continue;
                };
                if !handle.is_connected() {
                    tracing::debug!(%target, "target disconnected, skipped");
                    continue;
                }
                match handle.try_send(payload.clone()) {
                    Ok(()) => delivered += 1,
                    Err(e) => tracing::warn!(%target, error = %e, "enqueue failed, skipped"),
                }
            }
        }

        tracing::info!(delivered, targets = targets.len(), "broadcast complete");
        Ok(BroadcastOutcome {
            targets: targets.len(),
            delivered,
        })
    }

    /// Transform declared for this sender, if any: the sender's group wins,
    /// otherwise the first enabled matching rule carrying one.
    fn transform_for(&self, from: &str) -> Option<&Transform> {
        if let Some(group) = self.router.group_for(from) {
            return group.transform.as_ref().filter(|t| !t.is_noop());
        }
        self.rules
            .iter()
            .filter(|r| r.enabled && self.matcher.matches_any(from, &r.from_sources))
            .find_map(|r| r.transform.as_ref())
            .filter(|t| !t.is_noop())
    }

    /// Apply content prefixing / sender relabeling after target resolution.
    /// Without a transform the original bytes are fanned out untouched.
    fn transformed_payload(&self, env: &Envelope, raw: &[u8]) -> Result<Vec<u8>> {
        let Some(t) = self.transform_for(&env.from) else {
            return Ok(raw.to_vec());
        };

        let mut out = env.clone();
        if !t.prefix_chat.is_empty() && out.is(EnvelopeKind::Chat) {
            out.body.chat_message = format!("{}{}", t.prefix_chat, out.body.chat_message);
        }
        if !t.prefix_event.is_empty() && out.is(EnvelopeKind::Event) {
            out.body.event_detail = format!("{}{}", t.prefix_event, out.body.event_detail);
        }
        if !t.change_from.is_empty() {
            out.from = t.change_from.clone();
        }
        out.encode()
    }

    /// Read-only, lock-scoped snapshot for the stats surface.
    pub fn stats(&self) -> serde_json::Value {
        let conns = self.connections.read();
        let ids: Vec<&String> = conns.keys().collect();
        serde_json::json!({
            "total_connections": conns.len(),
            "connections": ids,
            "router_info": self.router.info(),
        })
    }
}
