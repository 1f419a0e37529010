//! Topology resolver: computes the target peer set for a sender.
//!
//! Groups are consulted first and short-circuit (a sender in a group is
//! routed full-mesh to the other members, rules are not consulted). Rules
//! are the fallback and accumulate across every enabled match. The resolver
//! holds an immutable snapshot of the topology; a reload builds a fresh
//! `Router` rather than mutating this one.

use std::collections::HashSet;
use std::sync::Arc;

use crate::config::{GroupConfig, HubConfig, RuleConfig};
use crate::reload::RoutePause;
use crate::routing::PatternMatcher;

pub struct Router {
    groups: Vec<GroupConfig>,
    rules: Vec<RuleConfig>,
    matcher: Arc<PatternMatcher>,
    pause: Arc<RoutePause>,
}

impl Router {
    pub fn new(cfg: &HubConfig, matcher: Arc<PatternMatcher>, pause: Arc<RoutePause>) -> Self {
        Self {
            groups: cfg.groups.clone(),
            rules: cfg.rules.clone(),
            matcher,
            pause,
        }
    }

    /// Resolve the ordered, de-duplicated target set for `from` given the
    /// currently connected peer ids. Returns empty while routing is paused.
    pub fn resolve(&self, from: &str, connected: &[String]) -> Vec<String> {
        if let Some(reason) = self.pause.reason() {
            tracing::info!(%reason, "routing paused, skipping resolution");
            return Vec::new();
        }

        // Groups win and short-circuit; first declared group containing the
        // sender is the routing domain.
        for group in &self.groups {
            if group.members.iter().any(|m| m == from) {
                let targets: Vec<String> = group
                    .members
                    .iter()
                    .filter(|m| m.as_str() != from && connected.contains(m))
                    .cloned()
                    .collect();
                tracing::debug!(group = %group.name, ?targets, "group route");
                return targets;
            }
        }

        // Fallback: accumulate across all enabled matching rules.
        let mut targets = Vec::new();
        for rule in &self.rules {
            if !rule.enabled {
                continue;
            }
            if self.matcher.matches_any(from, &rule.from_sources) {
                let expanded = self.expand_targets(&rule.to_targets, from, connected);
                tracing::debug!(rule = %rule.name, ?expanded, "rule route");
                targets.extend(expanded);
            }
        }

        dedup_preserving_order(targets)
    }

    /// Expand `"*"` to every other connected peer, pass literals through,
    /// then keep only connected targets.
    fn expand_targets(&self, to_targets: &[String], from: &str, connected: &[String]) -> Vec<String> {
        let mut resolved = Vec::new();
        for target in to_targets {
            if target == "*" {
                resolved.extend(connected.iter().filter(|c| c.as_str() != from).cloned());
            } else {
                resolved.push(target.clone());
            }
        }
        resolved.retain(|t| connected.contains(t));
        resolved
    }

    /// First declared group containing `peer`, if any. Shared with the
    /// blacklist filter and the transform step.
    pub fn group_for(&self, peer: &str) -> Option<&GroupConfig> {
        self.groups
            .iter()
            .find(|g| g.members.iter().any(|m| m == peer))
    }

    /// Static reachability check against group/rule data, ignoring the live
    /// connection set. Diagnostics only, not on the hot path.
    pub fn is_valid_route(&self, from: &str, to: &str) -> bool {
        for group in &self.groups {
            if group.members.iter().any(|m| m == from) && group.members.iter().any(|m| m == to) {
                return true;
            }
        }
        for rule in &self.rules {
            if !rule.enabled {
                continue;
            }
            if self.matcher.matches_any(from, &rule.from_sources)
                && (rule.to_targets.iter().any(|t| t == "*")
                    || rule.to_targets.iter().any(|t| t == to))
            {
                return true;
            }
        }
        false
    }

    /// Topology summary for the stats surface.
    pub fn info(&self) -> serde_json::Value {
        serde_json::json!({
            "groups_count": self.groups.len(),
            "rules_count": self.rules.len(),
            "groups": self.groups,
            "rules": self.rules,
        })
    }

    pub fn groups(&self) -> &[GroupConfig] {
        &self.groups
    }
}

fn dedup_preserving_order(targets: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(targets.len());
    targets.into_iter().filter(|t| seen.insert(t.clone())).collect()
}
