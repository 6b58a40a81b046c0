use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
    time::Duration,
};

use alloy_primitives::Address;
use clap::Parser;
use color_eyre::eyre::Result;
use serde::Deserialize;
use url::Url;

#[derive(Debug, clap::Parser)]
struct Args {
    #[clap(long, default_value = "ledger-watch.toml", env = "LEDGER_WATCH_CONFIG")]
    config: PathBuf,

    /// Block number to start scanning from. Overrides `sync.start_block`
    #[clap(long)]
    block: Option<u64>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    pub rpc: RpcConfig,

    #[serde(default)]
    pub sync: SyncConfig,
}

#[derive(Deserialize, Clone, Debug)]
pub struct RpcConfig {
    pub url: Url,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Deserialize, Clone, Debug)]
pub struct SyncConfig {
    /// Initial cursor value. `0` means "start at whatever the head is"
    #[serde(default)]
    pub start_block: u64,

    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Addresses subscribed at startup
    #[serde(default)]
    pub seed_addresses: BTreeSet<Address>,
}

impl Config {
    pub fn read() -> Result<Self> {
        let args = Args::parse();

        let mut config = Self::read_from(args.config.as_path())?;
        if let Some(block) = args.block {
            config.sync.start_block = block;
        }

        Ok(config)
    }

    pub fn read_from(path: &Path) -> Result<Self> {
        Ok(toml::from_str(&std::fs::read_to_string(path)?)?)
    }
}

impl RpcConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl SyncConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            start_block: 0,
            interval_secs: default_interval_secs(),
            seed_addresses: Default::default(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_interval_secs() -> u64 {
    10
}
