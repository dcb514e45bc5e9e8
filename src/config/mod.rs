use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::chain::lcd::ClientConfig;
use crate::chain::networks::{ChainOptions, NetworkName};
use crate::chain::types::{Coins, Msg};
use crate::chain::wallet::KeyStore;
use crate::confirm::{ConfirmProps, SessionSettings};

pub const DEFAULT_ASSETS_URL: &str = "https://assets.terrarebels.net/station";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub tx: TxConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub wallet: WalletConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub name: NetworkName,
    /// Base URL of the published `chains.json`
    pub assets_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TxConfig {
    pub gas_adjustment: f64,
    pub poll_interval_ms: u64,
    pub memo: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    pub keystore_path: PathBuf,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            name: NetworkName::Mainnet,
            assets_url: DEFAULT_ASSETS_URL.to_string(),
        }
    }
}

impl Default for TxConfig {
    fn default() -> Self {
        Self {
            gas_adjustment: 1.75,
            poll_interval_ms: 1000,
            memo: String::new(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            connect_timeout_secs: 10,
            max_retries: 3,
        }
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            keystore_path: default_keystore_path(),
        }
    }
}

/// `<data dir>/station/keys.json`, or the working directory when the platform has none
pub fn default_keystore_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("station")
        .join("keys.json")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            tx: TxConfig::default(),
            http: HttpConfig::default(),
            wallet: WalletConfig::default(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let config: Config = toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.tx.gas_adjustment.is_finite() && self.tx.gas_adjustment >= 1.0) {
            anyhow::bail!("tx.gas_adjustment must be at least 1.0, got {}", self.tx.gas_adjustment);
        }
        if self.tx.poll_interval_ms == 0 {
            anyhow::bail!("tx.poll_interval_ms must be positive");
        }
        Ok(())
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            gas_adjustment: self.tx.gas_adjustment,
            poll_interval: Duration::from_millis(self.tx.poll_interval_ms),
        }
    }

    pub fn client_config(&self, chain: &ChainOptions) -> ClientConfig {
        ClientConfig {
            connection_timeout: self.http.connect_timeout_secs,
            request_timeout: self.http.timeout_secs,
            max_retries: self.http.max_retries,
            ..ClientConfig::from_chain(chain)
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_secs)
    }

    /// Confirmation props carrying the configured default memo
    pub fn confirm_props(&self, msgs: Vec<Msg>, balance: Coins) -> ConfirmProps {
        ConfirmProps::new(msgs, balance).with_memo(self.tx.memo.clone())
    }

    pub fn open_keystore(&self) -> Result<KeyStore> {
        let path = &self.wallet.keystore_path;
        KeyStore::open(path).with_context(|| format!("opening key store {}", path.display()))
    }
}
