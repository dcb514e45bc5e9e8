//! Network registry: built-in endpoint table merged with the remote
//! `chains.json` document published alongside the wallet's assets.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkName {
    Mainnet,
    Classic,
    Testnet,
}

impl NetworkName {
    pub const ALL: [NetworkName; 3] = [NetworkName::Mainnet, NetworkName::Classic, NetworkName::Testnet];

    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkName::Mainnet => "mainnet",
            NetworkName::Classic => "classic",
            NetworkName::Testnet => "testnet",
        }
    }
}

impl fmt::Display for NetworkName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NetworkName {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet" => Ok(NetworkName::Mainnet),
            "classic" => Ok(NetworkName::Classic),
            "testnet" => Ok(NetworkName::Testnet),
            other => Err(anyhow!("Unknown network: {}", other)),
        }
    }
}

/// Endpoints and identifiers of one network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainOptions {
    pub name: NetworkName,
    #[serde(rename = "chainID")]
    pub chain_id: String,
    pub lcd: String,
    pub fcd: String,
    pub api: String,
    pub mantle: String,
    #[serde(rename = "walletconnectID")]
    pub walletconnect_id: u32,
}

impl ChainOptions {
    pub fn is_classic(&self) -> bool {
        self.name == NetworkName::Classic
    }

    fn apply(mut self, patch: &ChainOverride) -> Self {
        if let Some(chain_id) = &patch.chain_id {
            self.chain_id = chain_id.clone();
        }
        if let Some(lcd) = &patch.lcd {
            self.lcd = lcd.clone();
        }
        if let Some(fcd) = &patch.fcd {
            self.fcd = fcd.clone();
        }
        if let Some(api) = &patch.api {
            self.api = api.clone();
        }
        if let Some(mantle) = &patch.mantle {
            self.mantle = mantle.clone();
        }
        if let Some(id) = patch.walletconnect_id {
            self.walletconnect_id = id;
        }
        self
    }
}

/// One entry of the remote document; every field is optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ChainOverride {
    #[serde(rename = "chainID")]
    pub chain_id: Option<String>,
    pub lcd: Option<String>,
    pub fcd: Option<String>,
    pub api: Option<String>,
    pub mantle: Option<String>,
    #[serde(rename = "walletconnectID")]
    pub walletconnect_id: Option<u32>,
}

/// Built-in endpoints, used whenever the remote document is unavailable
pub fn default_network(name: NetworkName) -> ChainOptions {
    let (chain_id, lcd, fcd, api, mantle, walletconnect_id) = match name {
        NetworkName::Mainnet => (
            "phoenix-1",
            "https://phoenix-lcd.terra.dev",
            "https://phoenix-fcd.terra.dev",
            "https://phoenix-api.terra.dev",
            "https://phoenix-mantle.terra.dev",
            2,
        ),
        NetworkName::Classic => (
            "columbus-5",
            "https://lcd.terrarebels.net",
            "https://fcd.terrarebels.net",
            "https://api.terrarebels.net",
            "https://lcd.terrarebels.net",
            1,
        ),
        NetworkName::Testnet => (
            "pisco-1",
            "https://pisco-lcd.terra.dev",
            "https://pisco-fcd.terra.dev",
            "https://pisco-api.terra.dev",
            "https://pisco-mantle.terra.dev",
            0,
        ),
    };

    ChainOptions {
        name,
        chain_id: chain_id.to_string(),
        lcd: lcd.to_string(),
        fcd: fcd.to_string(),
        api: api.to_string(),
        mantle: mantle.to_string(),
        walletconnect_id,
    }
}

/// Resolves [`ChainOptions`] per network. The remote document is fetched at
/// most once per registry; a failed fetch is remembered as "no overrides".
pub struct ChainRegistry {
    http: Client,
    source: Option<String>,
    overrides: OnceCell<HashMap<NetworkName, ChainOverride>>,
}

impl ChainRegistry {
    /// Registry backed by `{assets_url}/chains.json`
    pub fn new(assets_url: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            source: Some(format!("{}/chains.json", assets_url.trim_end_matches('/'))),
            overrides: OnceCell::new(),
        })
    }

    /// Registry that never leaves the built-in table
    pub fn offline() -> Self {
        Self {
            http: Client::new(),
            source: None,
            overrides: OnceCell::new(),
        }
    }

    pub async fn resolve_network(&self, name: NetworkName) -> ChainOptions {
        let base = default_network(name);
        match self.overrides().await.get(&name) {
            Some(patch) => base.apply(patch),
            None => base,
        }
    }

    pub async fn resolve_all(&self) -> Vec<ChainOptions> {
        let mut networks = Vec::with_capacity(NetworkName::ALL.len());
        for name in NetworkName::ALL {
            networks.push(self.resolve_network(name).await);
        }
        networks
    }

    async fn overrides(&self) -> &HashMap<NetworkName, ChainOverride> {
        self.overrides
            .get_or_init(|| async {
                match &self.source {
                    Some(url) => match self.fetch(url).await {
                        Ok(overrides) => overrides,
                        Err(e) => {
                            log::warn!("Using built-in networks, failed to load {}: {}", url, e);
                            HashMap::new()
                        }
                    },
                    None => HashMap::new(),
                }
            })
            .await
    }

    async fn fetch(&self, url: &str) -> Result<HashMap<NetworkName, ChainOverride>> {
        log::debug!("Fetching network overrides from {}", url);

        let response = self.http.get(url).send().await?;
        if !response.status().is_success() {
            return Err(anyhow!("HTTP {}", response.status()));
        }

        let document: HashMap<String, ChainOverride> = serde_json::from_str(&response.text().await?)?;

        // Unknown network keys (e.g. localterra) are ignored
        Ok(document
            .into_iter()
            .filter_map(|(key, patch)| key.parse::<NetworkName>().ok().map(|name| (name, patch)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_offline_uses_defaults() {
        let registry = ChainRegistry::offline();
        for name in NetworkName::ALL {
            let chain = registry.resolve_network(name).await;
            assert!(!chain.lcd.is_empty());
            assert!(!chain.chain_id.is_empty());
        }
        assert_eq!(registry.resolve_network(NetworkName::Classic).await.chain_id, "columbus-5");
    }

    #[tokio::test]
    async fn test_override_replaces_present_fields_only() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/chains.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "classic": { "lcd": "https://lcd.example.org", "walletconnectID": 9 },
                "localterra": { "lcd": "http://localhost:1317" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let registry = ChainRegistry::new(&server.uri(), Duration::from_secs(5)).unwrap();
        let classic = registry.resolve_network(NetworkName::Classic).await;
        assert_eq!(classic.lcd, "https://lcd.example.org");
        assert_eq!(classic.walletconnect_id, 9);
        assert_eq!(classic.chain_id, "columbus-5");
        assert_eq!(classic.fcd, "https://fcd.terrarebels.net");

        // Second resolution reuses the cached document (expect(1) above)
        let mainnet = registry.resolve_network(NetworkName::Mainnet).await;
        assert_eq!(mainnet, default_network(NetworkName::Mainnet));
    }

    #[tokio::test]
    async fn test_failed_fetch_falls_back_to_defaults() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/chains.json"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let registry = ChainRegistry::new(&server.uri(), Duration::from_secs(5)).unwrap();
        for chain in registry.resolve_all().await {
            assert_eq!(chain, default_network(chain.name));
        }
    }

    #[tokio::test]
    async fn test_malformed_document_falls_back_to_defaults() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/chains.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let registry = ChainRegistry::new(&server.uri(), Duration::from_secs(5)).unwrap();
        let testnet = registry.resolve_network(NetworkName::Testnet).await;
        assert_eq!(testnet.chain_id, "pisco-1");
    }

    #[test]
    fn test_parse_network_name() {
        assert_eq!("Classic".parse::<NetworkName>().unwrap(), NetworkName::Classic);
        assert!("bombay".parse::<NetworkName>().is_err());
    }
}
