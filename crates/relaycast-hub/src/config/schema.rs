use serde::{Deserialize, Serialize};

use relaycast_core::{RelayError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HubConfig {
    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub store: StoreSection,

    /// Fixed-membership routing domains, scanned in declaration order.
    #[serde(default)]
    pub groups: Vec<GroupConfig>,

    /// Pattern-based fallback rules, consulted only when no group matches.
    #[serde(default)]
    pub rules: Vec<RuleConfig>,

    /// Known peer endpoints; surfaced in stats, never dialed by the hub.
    #[serde(default)]
    pub peers: Vec<PeerConfig>,
}

impl HubConfig {
    /// Starter config written when no config file exists yet: one full-mesh
    /// chat group, one event group, and a disabled monitoring rule to show
    /// the rule syntax.
    pub fn sample() -> Self {
        Self {
            groups: vec![
                GroupConfig {
                    name: "全平台互通".into(),
                    members: vec![
                        "creative".into(),
                        "survival".into(),
                        "test_client".into(),
                        "debug_client".into(),
                        "qq_bot".into(),
                    ],
                    message_types: vec!["chat".into()],
                    enabled: true,
                    transform: None,
                    blacklist: Vec::new(),
                },
                GroupConfig {
                    name: "事件广播".into(),
                    members: vec![
                        "creative".into(),
                        "survival".into(),
                        "test_client".into(),
                        "qq_bot".into(),
                    ],
                    message_types: vec!["event".into()],
                    enabled: true,
                    transform: Some(Transform {
                        prefix_event: "【事件】 ".into(),
                        ..Transform::default()
                    }),
                    blacklist: Vec::new(),
                },
            ],
            rules: vec![RuleConfig {
                name: "monitor-forward".into(),
                from_sources: vec!["*".into()],
                to_targets: vec!["monitor_system".into()],
                message_types: vec!["event".into()],
                enabled: false,
                transform: None,
            }],
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.server.validate()?;

        for (i, g) in self.groups.iter().enumerate() {
            if g.name.is_empty() {
                return Err(RelayError::Config(format!("groups[{i}].name must not be empty")));
            }
            if g.members.is_empty() {
                return Err(RelayError::Config(format!(
                    "group '{}' must have at least one member",
                    g.name
                )));
            }
        }
        for (i, r) in self.rules.iter().enumerate() {
            if r.name.is_empty() {
                return Err(RelayError::Config(format!("rules[{i}].name must not be empty")));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// WebSocket endpoint path.
    #[serde(default = "default_path")]
    pub path: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            path: default_path(),
        }
    }
}

impl ServerSection {
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(RelayError::Config("server.host must not be empty".into()));
        }
        if self.port == 0 {
            return Err(RelayError::Config("server.port must not be 0".into()));
        }
        if !self.path.starts_with('/') {
            return Err(RelayError::Config("server.path must start with '/'".into()));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}{}", self.bind_addr(), self.path)
    }
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8765
}
fn default_path() -> String {
    "/ws".into()
}

/// Message store backend selection, fixed at construction time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Redis,
    Mysql,
    Postgres,
}

impl StoreBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Redis => "redis",
            Self::Mysql => "mysql",
            Self::Postgres => "postgres",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreSection {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Advisory TTL for stored messages and statuses; 0 disables expiry.
    #[serde(default = "default_message_ttl_secs")]
    pub message_ttl_secs: u64,

    #[serde(default)]
    pub redis: RedisSection,

    #[serde(default)]
    pub mysql: SqlSection,

    #[serde(default)]
    pub postgres: SqlSection,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            message_ttl_secs: default_message_ttl_secs(),
            redis: RedisSection::default(),
            mysql: SqlSection::default(),
            postgres: SqlSection::default(),
        }
    }
}

fn default_message_ttl_secs() -> u64 {
    3600
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RedisSection {
    #[serde(default = "default_localhost")]
    pub host: String,
    #[serde(default = "default_redis_port")]
    pub port: u16,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub db: u32,
}

impl Default for RedisSection {
    fn default() -> Self {
        Self {
            host: default_localhost(),
            port: default_redis_port(),
            password: String::new(),
            db: 0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SqlSection {
    #[serde(default = "default_localhost")]
    pub host: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub database: String,
}

fn default_localhost() -> String {
    "localhost".into()
}
fn default_redis_port() -> u16 {
    6379
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupConfig {
    pub name: String,
    pub members: Vec<String>,
    #[serde(default)]
    pub message_types: Vec<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<Transform>,
    #[serde(default)]
    pub blacklist: Vec<BlacklistRuleConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleConfig {
    pub name: String,
    /// Source patterns; empty matches every sender.
    #[serde(default)]
    pub from_sources: Vec<String>,
    /// Target patterns; the literal `"*"` expands to all other connected peers.
    #[serde(default)]
    pub to_targets: Vec<String>,
    #[serde(default)]
    pub message_types: Vec<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<Transform>,
}

/// Per-group delivery veto. A rule blocks a target when every populated
/// predicate matches; an empty predicate matches everything.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BlacklistRuleConfig {
    pub name: String,
    #[serde(default)]
    pub from: Vec<String>,
    #[serde(default)]
    pub to: Vec<String>,
    #[serde(default)]
    pub content: Vec<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Outgoing content relabeling, applied after target resolution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Transform {
    #[serde(default)]
    pub prefix_chat: String,
    #[serde(default)]
    pub prefix_event: String,
    #[serde(default)]
    pub change_from: String,
}

impl Transform {
    pub fn is_noop(&self) -> bool {
        self.prefix_chat.is_empty() && self.prefix_event.is_empty() && self.change_from.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PeerConfig {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub auto_reconnect: bool,
    #[serde(default = "default_reconnect_interval_secs")]
    pub reconnect_interval_secs: u64,
}

fn default_reconnect_interval_secs() -> u64 {
    5
}

fn default_true() -> bool {
    true
}
