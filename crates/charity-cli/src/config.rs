use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use charity_ledger::LedgerConfig;

/// Configuration file for the `charity` binary.
///
/// ```toml
/// start_time = 1700000000
///
/// [ledger]
/// max_text_len = 4096
/// event_capacity = 1024
///
/// [accounts]
/// alice = 100
/// bob = 250
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Clock start for scripted sessions, unix seconds. Wall-clock time when
    /// unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<u64>,
    pub ledger: LedgerConfig,
    /// Opening balances by account reference (label or hex id).
    pub accounts: BTreeMap<String, u64>,
}

impl CliConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    /// The config at `path`, or the defaults when no path was given.
    pub fn load_or_default(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn to_toml(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
