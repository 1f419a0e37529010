//! Message-processing pipeline: an ordered chain of pure transform/filter
//! stages run before routing.
//!
//! A stage returning `Ok(None)` drops the envelope silently (not an error);
//! a stage returning `Err` halts the chain and propagates. Stages never
//! touch registry or router state; logging is their only side effect.

use relaycast_core::protocol::Envelope;
use relaycast_core::Result;

pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;
    fn process(&self, env: Envelope) -> Result<Option<Envelope>>;
}

#[derive(Default)]
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Built-in chain in required order: sender check, type check, logging.
    pub fn standard() -> Self {
        let mut p = Self::new();
        p.push(Box::new(HasSender));
        p.push(Box::new(ValidKind));
        p.push(Box::new(LogStage));
        p
    }

    pub fn push(&mut self, stage: Box<dyn Stage>) {
        self.stages.push(stage);
    }

    pub fn process(&self, env: Envelope) -> Result<Option<Envelope>> {
        let mut current = env;
        for stage in &self.stages {
            match stage.process(current)? {
                Some(next) => current = next,
                None => {
                    tracing::debug!(stage = stage.name(), "envelope dropped by pipeline");
                    return Ok(None);
                }
            }
        }
        Ok(Some(current))
    }
}

/// Drops envelopes with no sender identity.
pub struct HasSender;

impl Stage for HasSender {
    fn name(&self) -> &'static str {
        "has_sender"
    }

    fn process(&self, env: Envelope) -> Result<Option<Envelope>> {
        if env.from.is_empty() {
            tracing::warn!("envelope missing sender");
            return Ok(None);
        }
        Ok(Some(env))
    }
}

/// Drops envelopes whose type is empty or outside the closed kind set.
pub struct ValidKind;

impl Stage for ValidKind {
    fn name(&self) -> &'static str {
        "valid_kind"
    }

    fn process(&self, env: Envelope) -> Result<Option<Envelope>> {
        if env.parse_kind().is_none() {
            tracing::warn!(kind = %env.kind, "envelope type not in the allowed set");
            return Ok(None);
        }
        Ok(Some(env))
    }
}

/// Passthrough logging.
pub struct LogStage;

impl Stage for LogStage {
    fn name(&self) -> &'static str {
        "log"
    }

    fn process(&self, env: Envelope) -> Result<Option<Envelope>> {
        tracing::debug!(from = %env.from, kind = %env.kind, id = %env.id, "processing envelope");
        Ok(Some(env))
    }
}
