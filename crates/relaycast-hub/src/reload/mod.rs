//! Configuration hot-reload coordinator.
//!
//! Polls the config file's modification time on a fixed cadence. On change
//! it raises the shared [`RoutePause`] flag (the resolver returns no
//! targets while it is set), then reloads automatically or asks the
//! operator, and only clears the flag after the new topology has been
//! swapped in and live connections migrated. Any failure resumes routing on
//! the old configuration; the process keeps running.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::RwLock;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use relaycast_core::Result;

use crate::config::{self, HubConfig};

const POLL_INTERVAL: Duration = Duration::from_secs(2);
/// Settle time after an mtime change so partially written files are not read.
const WRITE_SETTLE: Duration = Duration::from_millis(100);
/// Upper bound on interactive re-prompts before the reload is treated as
/// denied (misbehaving terminals must not spin the prompt forever).
const MAX_PROMPT_ATTEMPTS: usize = 32;

/// Shared routing pause flag with a human-readable reason.
///
/// Checked at the top of every resolve call; this is the sole mechanism
/// keeping messages off a topology that is mid-swap.
#[derive(Default)]
pub struct RoutePause {
    reason: RwLock<Option<String>>,
}

impl RoutePause {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pause(&self, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::info!(%reason, "routing paused");
        *self.reason.write() = Some(reason);
    }

    pub fn resume(&self) {
        *self.reason.write() = None;
        tracing::info!("routing resumed");
    }

    pub fn is_paused(&self) -> bool {
        self.reason.read().is_some()
    }

    pub fn reason(&self) -> Option<String> {
        self.reason.read().clone()
    }
}

/// Applies a validated candidate config; rebuilds the router/pipeline/
/// registry triple and migrates live connections. An error discards the
/// candidate.
pub type ReloadCallback = Box<dyn Fn(Arc<HubConfig>) -> Result<()> + Send + Sync>;

pub struct HotReloader {
    config_path: PathBuf,
    pause: Arc<RoutePause>,
    interactive: bool,
    on_reload: ReloadCallback,
}

impl HotReloader {
    pub fn new(
        config_path: PathBuf,
        pause: Arc<RoutePause>,
        interactive: bool,
        on_reload: ReloadCallback,
    ) -> Self {
        Self {
            config_path,
            pause,
            interactive,
            on_reload,
        }
    }

    /// Start the poll loop; it exits when the shutdown signal flips.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut last_mod = self.mod_time();
        let mut tick = tokio::time::interval(POLL_INTERVAL);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tracing::info!(path = %self.config_path.display(), "config watch started");

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let Some(modified) = self.mod_time() else {
                        tracing::warn!(path = %self.config_path.display(), "config file stat failed");
                        continue;
                    };
                    if last_mod.is_some_and(|prev| modified > prev) {
                        last_mod = Some(modified);
                        tracing::info!(path = %self.config_path.display(), "config file changed");
                        self.pause.pause("config file changed, reload pending");
                        tokio::time::sleep(WRITE_SETTLE).await;

                        if self.interactive {
                            self.interactive_reload().await;
                        } else {
                            self.perform_reload();
                        }
                    } else if last_mod.is_none() {
                        last_mod = Some(modified);
                    }
                }
                _ = shutdown.changed() => {
                    tracing::info!("config watch stopped");
                    return;
                }
            }
        }
    }

    fn mod_time(&self) -> Option<SystemTime> {
        std::fs::metadata(&self.config_path)
            .and_then(|m| m.modified())
            .ok()
    }

    /// Bounded confirm/deny/preview loop on the operator terminal.
    async fn interactive_reload(&self) {
        println!("\n[reload] config file changed; routing is paused, connections stay open");
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        for _ in 0..MAX_PROMPT_ATTEMPTS {
            println!("apply new configuration? (y/n/preview)");
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                // stdin closed or unreadable: treat as deny
                _ => break,
            };
            match line.trim().to_lowercase().as_str() {
                "y" | "yes" => {
                    self.perform_reload();
                    return;
                }
                "n" | "no" => {
                    println!("[reload] denied; keeping the old configuration");
                    self.pause.resume();
                    return;
                }
                "p" | "preview" => self.preview(),
                _ => println!("[reload] please answer y, n, or preview"),
            }
        }
        println!("[reload] no usable answer; keeping the old configuration");
        self.pause.resume();
    }

    /// Load + validate the candidate, hand it to the swap callback, and
    /// clear the pause flag only if both succeed.
    fn perform_reload(&self) {
        let path = self.config_path.display().to_string();
        let cfg = match config::load_from_file(&path) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::error!(error = %e, "reload failed, keeping old configuration");
                self.pause.resume();
                return;
            }
        };

        if let Err(e) = (self.on_reload)(Arc::new(cfg)) {
            tracing::error!(error = %e, "reload callback failed, keeping old configuration");
            self.pause.resume();
            return;
        }

        self.pause.resume();
        tracing::info!("configuration reloaded");
    }

    /// Validate and summarize the candidate without applying it.
    fn preview(&self) {
        let path = self.config_path.display().to_string();
        match config::load_from_file(&path) {
            Err(e) => println!("[preview] candidate config is invalid: {e}"),
            Ok(cfg) => {
                println!("[preview] server: {}", cfg.server.ws_url());
                println!("[preview] store: {}", cfg.store.backend.as_str());
                for (i, g) in cfg.groups.iter().filter(|g| g.enabled).enumerate() {
                    println!("[preview] group {}: {} ({} members)", i + 1, g.name, g.members.len());
                }
                let enabled = cfg.rules.iter().filter(|r| r.enabled).count();
                println!("[preview] rules: {enabled} enabled / {} total", cfg.rules.len());
            }
        }
    }
}
