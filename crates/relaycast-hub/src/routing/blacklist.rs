//! Per-group blacklist filtering, applied per target after resolution.
//!
//! A rule blocks delivery to one target when it is enabled and every
//! populated predicate (`from`, `to`, `content`) matches; an empty
//! predicate matches everything on that dimension. Targets outside any
//! group are never blocked.

use relaycast_core::protocol::Envelope;

use crate::config::{BlacklistRuleConfig, GroupConfig};
use crate::routing::PatternMatcher;

/// Keep only the targets no enabled blacklist rule vetoes.
pub fn filter_targets(
    env: &Envelope,
    targets: Vec<String>,
    groups: &[GroupConfig],
    matcher: &PatternMatcher,
) -> Vec<String> {
    targets
        .into_iter()
        .filter(|target| {
            let blocked = should_block(env, target, groups, matcher);
            if blocked {
                tracing::debug!(from = %env.from, %target, kind = %env.kind, "blocked by blacklist");
            }
            !blocked
        })
        .collect()
}

/// Whether delivery of `env` to `target` is vetoed by the target's group.
pub fn should_block(
    env: &Envelope,
    target: &str,
    groups: &[GroupConfig],
    matcher: &PatternMatcher,
) -> bool {
    // First declared group containing the target owns the veto list.
    let Some(group) = groups.iter().find(|g| g.members.iter().any(|m| m == target)) else {
        return false;
    };

    group
        .blacklist
        .iter()
        .any(|rule| rule.enabled && rule_matches(env, rule, target, matcher))
}

fn rule_matches(
    env: &Envelope,
    rule: &BlacklistRuleConfig,
    target: &str,
    matcher: &PatternMatcher,
) -> bool {
    if !rule.from.is_empty() && !matcher.matches_any_wildcard(&env.from, &rule.from) {
        return false;
    }
    if !rule.to.is_empty() && !matcher.matches_any_wildcard(target, &rule.to) {
        return false;
    }
    if !rule.content.is_empty() && !matcher.matches_content(env.content(), &rule.content) {
        return false;
    }
    true
}
