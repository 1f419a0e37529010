//! Hub config loader (strict parsing).

pub mod schema;

use std::fs;
use std::path::Path;

use relaycast_core::{RelayError, Result};

pub use schema::{
    BlacklistRuleConfig, GroupConfig, HubConfig, PeerConfig, RuleConfig, StoreBackend,
    StoreSection, Transform,
};

pub fn load_from_file(path: &str) -> Result<HubConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| RelayError::Config(format!("read config failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<HubConfig> {
    let cfg: HubConfig =
        serde_yaml::from_str(s).map_err(|e| RelayError::Config(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Load the config file, writing a commented default one first if it does
/// not exist yet. Returns the config and whether the file was just created.
pub fn load_or_init(path: &str) -> Result<(HubConfig, bool)> {
    if Path::new(path).exists() {
        return Ok((load_from_file(path)?, false));
    }
    let cfg = HubConfig::sample();
    let body = serde_yaml::to_string(&cfg)
        .map_err(|e| RelayError::Config(format!("render default config failed: {e}")))?;
    let header = "\
# relaycast hub configuration (auto-generated defaults)
# Adjust groups/rules/store to your deployment and restart or hot-reload.

";
    fs::write(path, format!("{header}{body}"))
        .map_err(|e| RelayError::Config(format!("write default config failed: {e}")))?;
    Ok((cfg, true))
}
