//! REST client for the LCD (light client daemon) and FCD endpoints of a
//! Terra network, plus the [`ChainClient`] capability the confirmation
//! workflow is written against.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::chain::account_types::{Account, AccountInfo};
use crate::chain::networks::ChainOptions;
use crate::chain::types::{
    u64_string, AuthInfo, BroadcastResult, Coin, Coins, Fee, Msg, SignedTx, SignerInfo, TxBody,
    TxInfo, UnsignedTx,
};
use crate::fee::FeeCalculator;

/// Fallback shown to users when an error carries no readable message
pub const DEFAULT_ERROR_MESSAGE: &str = "Oops! Something went wrong";

#[derive(Debug, Error)]
pub enum LcdError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("LCD returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl LcdError {
    /// `message` field of a JSON error body, if the LCD sent one
    pub fn api_message(&self) -> Option<String> {
        match self {
            LcdError::Api { body, .. } => serde_json::from_str::<Value>(body)
                .ok()?
                .get("message")?
                .as_str()
                .filter(|m| !m.is_empty())
                .map(str::to_string),
            _ => None,
        }
    }

    /// Message fit for display; `default` when the error has none
    pub fn user_message(&self, default: &str) -> String {
        self.api_message().unwrap_or_else(|| default.to_string())
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            LcdError::Api { status, body } => {
                *status == 404 || body.to_ascii_lowercase().contains("not found")
            }
            _ => false,
        }
    }

    fn is_retryable(&self) -> bool {
        match self {
            LcdError::Network(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            LcdError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Configuration for the LCD client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// LCD base URL (e.g., "https://phoenix-lcd.terra.dev")
    pub lcd_url: String,
    /// FCD base URL, used for gas prices
    pub fcd_url: String,
    pub chain_id: String,
    /// Connection timeout in seconds
    pub connection_timeout: u64,
    /// Request timeout in seconds
    pub request_timeout: u64,
    /// Maximum retry attempts for read-only queries
    pub max_retries: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            lcd_url: "https://phoenix-lcd.terra.dev".to_string(),
            fcd_url: "https://phoenix-fcd.terra.dev".to_string(),
            chain_id: "phoenix-1".to_string(),
            connection_timeout: 10,
            request_timeout: 30,
            max_retries: 3,
        }
    }
}

impl ClientConfig {
    pub fn from_chain(chain: &ChainOptions) -> Self {
        Self {
            lcd_url: chain.lcd.clone(),
            fcd_url: chain.fcd.clone(),
            chain_id: chain.chain_id.clone(),
            ..Self::default()
        }
    }
}

/// Gas reported by a simulation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct GasInfo {
    #[serde(with = "u64_string")]
    pub gas_wanted: u64,
    #[serde(with = "u64_string")]
    pub gas_used: u64,
}

/// Options for [`ChainClient::create_tx`]
#[derive(Debug, Clone)]
pub struct CreateTxOptions {
    pub fee_denom: String,
    /// Price for `fee_denom`; without one the fee amount is left empty
    pub gas_price: Option<Decimal>,
    pub gas_adjustment: f64,
    pub memo: String,
}

/// Chain operations the confirmation workflow depends on
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Simulate `msgs` from `address` and return the unsigned transaction with
    /// an adjusted gas limit and a fee in the requested denomination
    async fn create_tx(
        &self,
        address: &str,
        msgs: &[Msg],
        options: &CreateTxOptions,
    ) -> Result<UnsignedTx, LcdError>;

    async fn account_info(&self, address: &str) -> Result<AccountInfo, LcdError>;

    /// Broadcast in sync mode: mempool check only, no inclusion wait
    async fn broadcast_sync(&self, tx: &SignedTx) -> Result<BroadcastResult, LcdError>;

    /// `None` while the transaction is not known to the node
    async fn tx_info(&self, txhash: &str) -> Result<Option<TxInfo>, LcdError>;
}

#[derive(Deserialize)]
struct AccountResponse {
    account: Value,
}

#[derive(Deserialize)]
struct SimulateResponse {
    gas_info: GasInfo,
}

#[derive(Deserialize)]
struct TxResponseEnvelope<T> {
    tx_response: T,
}

#[derive(Deserialize)]
struct BalancesResponse {
    balances: Coins,
}

#[derive(Deserialize)]
struct SmartQueryResponse<T> {
    data: T,
}

#[derive(Serialize)]
struct BroadcastRequest<'a> {
    tx_bytes: &'a str,
    mode: &'static str,
}

/// REST client for one network
#[derive(Clone)]
pub struct LcdClient {
    config: ClientConfig,
    http: Client,
}

impl LcdClient {
    pub fn new(config: ClientConfig) -> Result<Self, LcdError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout))
            .connect_timeout(Duration::from_secs(config.connection_timeout))
            .build()?;

        log::debug!("LCD client for {} at {}", config.chain_id, config.lcd_url);
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn chain_id(&self) -> &str {
        &self.config.chain_id
    }

    /// GET `{lcd}{path}` with retries
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, LcdError> {
        let url = format!("{}{}", self.config.lcd_url.trim_end_matches('/'), path);
        self.get_url(&url, query).await
    }

    async fn get_url<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, LcdError> {
        let http = &self.http;
        self.with_retry(|| async move {
            let response = http.get(url).query(query).send().await?;
            read_json(response).await
        })
        .await
    }

    /// POST `{lcd}{path}` once; never retried
    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, LcdError> {
        let url = format!("{}{}", self.config.lcd_url.trim_end_matches('/'), path);
        let result = match self.http.post(&url).json(body).send().await {
            Ok(response) => read_json(response).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = &result {
            log::warn!("POST {} failed: {}", path, e);
        }
        result
    }

    /// Query account information with polymorphic account support.
    /// Returns default account info (sequence=0, account_number=0) for new accounts
    pub async fn query_account(&self, address: &str) -> Result<AccountInfo, LcdError> {
        let path = format!("/cosmos/auth/v1beta1/accounts/{}", address);
        match self.get::<AccountResponse>(&path, &[]).await {
            Ok(response) => {
                let account = Account::decode(&response.account)?;
                log::debug!("Decoded account type: {}", account.account_type());

                account.account_info().ok_or_else(|| {
                    LcdError::InvalidResponse(format!(
                        "unsupported account type {}",
                        account.account_type()
                    ))
                })
            }
            Err(e) if e.is_not_found() => {
                log::info!("Account {} not found on chain, treating as new", address);
                Ok(AccountInfo {
                    address: address.to_string(),
                    ..AccountInfo::default()
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Simulate an unsigned transaction; the signature slot is left empty
    pub async fn simulate(&self, tx: &UnsignedTx) -> Result<GasInfo, LcdError> {
        let body = json!({
            "tx": {
                "body": tx.body,
                "auth_info": tx.auth_info,
                "signatures": [""],
            }
        });

        let response: SimulateResponse = self.post("/cosmos/tx/v1beta1/simulate", &body).await?;
        log::debug!(
            "Simulation: gas_wanted={}, gas_used={}",
            response.gas_info.gas_wanted,
            response.gas_info.gas_used
        );
        Ok(response.gas_info)
    }

    pub async fn broadcast(&self, tx: &SignedTx) -> Result<BroadcastResult, LcdError> {
        let tx_bytes = tx.to_base64();
        let request = BroadcastRequest {
            tx_bytes: &tx_bytes,
            mode: "BROADCAST_MODE_SYNC",
        };

        let response: TxResponseEnvelope<BroadcastResult> =
            self.post("/cosmos/tx/v1beta1/txs", &request).await?;
        let result = response.tx_response;

        if result.code == 0 {
            log::info!("Broadcast accepted: {}", result.txhash);
        } else {
            log::warn!("Broadcast rejected with code {}: {}", result.code, result.raw_log);
        }
        Ok(result)
    }

    pub async fn query_tx(&self, txhash: &str) -> Result<Option<TxInfo>, LcdError> {
        let path = format!("/cosmos/tx/v1beta1/txs/{}", txhash);
        match self.get::<TxResponseEnvelope<TxInfo>>(&path, &[]).await {
            Ok(response) => Ok(Some(response.tx_response)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn query_balance(&self, address: &str) -> Result<Coins, LcdError> {
        let path = format!("/cosmos/bank/v1beta1/balances/{}", address);
        let response: BalancesResponse = self.get(&path, &[]).await?;
        Ok(response.balances)
    }

    /// Gas price table from the FCD
    pub async fn gas_prices(&self) -> Result<FeeCalculator, LcdError> {
        let url = format!("{}/v1/txs/gas_prices", self.config.fcd_url.trim_end_matches('/'));
        let prices: HashMap<String, String> = self.get_url(&url, &[]).await?;
        Ok(FeeCalculator::new(&prices))
    }

    /// CosmWasm smart query; `query` is the contract's JSON query message
    pub async fn query_contract_smart<T: DeserializeOwned>(
        &self,
        contract: &str,
        query: &Value,
    ) -> Result<T, LcdError> {
        let encoded = crate::chain::terraswap::to_base64(query)?;
        let path = format!("/cosmwasm/wasm/v1/contract/{}/smart/{}", contract, encoded);
        let response: SmartQueryResponse<T> = self.get(&path, &[]).await?;
        Ok(response.data)
    }

    /// Execute a query with linear back-off on transient failures
    async fn with_retry<T, F, Fut>(&self, f: F) -> Result<T, LcdError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, LcdError>>,
    {
        let mut retries = 0;
        loop {
            match f().await {
                Ok(result) => return Ok(result),
                Err(e) if retries < self.config.max_retries && e.is_retryable() => {
                    retries += 1;
                    log::debug!("Retrying LCD request ({}/{}): {}", retries, self.config.max_retries, e);
                    tokio::time::sleep(Duration::from_millis(100 * retries as u64)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, LcdError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(LcdError::Api {
            status: status.as_u16(),
            body,
        });
    }

    Ok(serde_json::from_str(&body)?)
}

#[async_trait]
impl ChainClient for LcdClient {
    async fn create_tx(
        &self,
        address: &str,
        msgs: &[Msg],
        options: &CreateTxOptions,
    ) -> Result<UnsignedTx, LcdError> {
        let account = self.query_account(address).await?;

        let mut tx = UnsignedTx {
            body: TxBody {
                messages: msgs.to_vec(),
                memo: options.memo.clone(),
                timeout_height: 0,
            },
            auth_info: AuthInfo {
                signer_infos: vec![SignerInfo {
                    public_key: account.pub_key.clone(),
                    mode_info: json!({ "single": { "mode": "SIGN_MODE_DIRECT" } }),
                    sequence: account.sequence,
                }],
                fee: Fee::default(),
            },
        };

        let gas = self.simulate(&tx).await?;
        let gas_limit = (gas.gas_used as f64 * options.gas_adjustment).ceil() as u64;
        tx.auth_info.fee.gas_limit = gas_limit;

        if let Some(price) = options.gas_price {
            let amount = Decimal::from(gas_limit)
                .checked_mul(price)
                .map(|fee| fee.ceil().normalize().to_string())
                .ok_or_else(|| LcdError::InvalidResponse("fee overflow".to_string()))?;
            tx.set_fee(Coin::new(options.fee_denom.clone(), amount));
        }

        Ok(tx)
    }

    async fn account_info(&self, address: &str) -> Result<AccountInfo, LcdError> {
        self.query_account(address).await
    }

    async fn broadcast_sync(&self, tx: &SignedTx) -> Result<BroadcastResult, LcdError> {
        self.broadcast(tx).await
    }

    async fn tx_info(&self, txhash: &str) -> Result<Option<TxInfo>, LcdError> {
        self.query_tx(txhash).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> LcdClient {
        LcdClient::new(ClientConfig {
            lcd_url: server.uri(),
            fcd_url: server.uri(),
            chain_id: "pisco-1".to_string(),
            connection_timeout: 5,
            request_timeout: 5,
            max_retries: 2,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_query_account_not_found_is_new_account() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cosmos/auth/v1beta1/accounts/terra1new"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "code": 5,
                "message": "rpc error: code = NotFound desc = account terra1new not found",
                "details": []
            })))
            .expect(1)
            .mount(&server)
            .await;

        let info = client(&server).query_account("terra1new").await.unwrap();
        assert_eq!(info.address, "terra1new");
        assert_eq!(info.sequence, 0);
        assert_eq!(info.account_number, 0);
    }

    #[tokio::test]
    async fn test_create_tx_applies_gas_adjustment_and_fee() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cosmos/auth/v1beta1/accounts/terra1abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "account": {
                    "@type": "/cosmos.auth.v1beta1.BaseAccount",
                    "address": "terra1abc",
                    "account_number": "12",
                    "sequence": "4"
                }
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/cosmos/tx/v1beta1/simulate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "gas_info": { "gas_wanted": "0", "gas_used": "100000" },
                "result": null
            })))
            .expect(1)
            .mount(&server)
            .await;

        let options = CreateTxOptions {
            fee_denom: "uluna".to_string(),
            gas_price: Some(Decimal::new(15, 3)),
            gas_adjustment: 1.75,
            memo: "hi".to_string(),
        };
        let msgs = vec![Msg(json!({ "@type": "/cosmos.bank.v1beta1.MsgSend" }))];

        let tx = client(&server).create_tx("terra1abc", &msgs, &options).await.unwrap();
        assert_eq!(tx.gas_limit(), 175_000);
        assert_eq!(tx.auth_info.fee.amount, vec![Coin::new("uluna", "2625")]);
        assert_eq!(tx.auth_info.signer_infos[0].sequence, 4);
        assert_eq!(tx.body.memo, "hi");
    }

    #[tokio::test]
    async fn test_simulation_error_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/cosmos/tx/v1beta1/simulate"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "code": 3,
                "message": "insufficient funds: invalid request",
                "details": []
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server).simulate(&UnsignedTx::default()).await.unwrap_err();
        assert_eq!(
            err.user_message(DEFAULT_ERROR_MESSAGE),
            "insufficient funds: invalid request"
        );
    }

    #[tokio::test]
    async fn test_user_message_defaults_without_body() {
        let err = LcdError::Api {
            status: 502,
            body: "<html>bad gateway</html>".to_string(),
        };
        assert_eq!(err.user_message(DEFAULT_ERROR_MESSAGE), DEFAULT_ERROR_MESSAGE);
        let err = LcdError::InvalidResponse("x".to_string());
        assert_eq!(err.user_message("fallback"), "fallback");
    }

    #[tokio::test]
    async fn test_broadcast_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/cosmos/tx/v1beta1/txs"))
            .and(body_partial_json(json!({ "mode": "BROADCAST_MODE_SYNC" })))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let result = client(&server).broadcast(&SignedTx::new(vec![1, 2, 3])).await;
        assert!(matches!(result, Err(LcdError::Api { status: 503, .. })));
    }

    #[tokio::test]
    async fn test_broadcast_returns_rejection_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/cosmos/tx/v1beta1/txs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "tx_response": {
                    "txhash": "",
                    "code": 5,
                    "codespace": "sdk",
                    "raw_log": "insufficient funds"
                }
            })))
            .mount(&server)
            .await;

        let result = client(&server).broadcast(&SignedTx::new(vec![9])).await.unwrap();
        assert_eq!(result.code, 5);
        assert_eq!(result.raw_log, "insufficient funds");
    }

    #[tokio::test]
    async fn test_query_tx_pending_and_retry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cosmos/tx/v1beta1/txs/PENDING"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "code": 5,
                "message": "tx not found: PENDING"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/cosmos/tx/v1beta1/txs/FLAKY"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/cosmos/tx/v1beta1/txs/FLAKY"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "tx_response": { "txhash": "FLAKY", "height": "77", "code": 0, "raw_log": "[]" }
            })))
            .mount(&server)
            .await;

        let lcd = client(&server);
        assert!(lcd.query_tx("PENDING").await.unwrap().is_none());

        let info = lcd.query_tx("FLAKY").await.unwrap().unwrap();
        assert_eq!(info.height, 77);
    }

    #[tokio::test]
    async fn test_gas_prices_and_balance() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/txs/gas_prices"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "uluna": "0.015",
                "uusd": "0.15"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex("^/cosmos/bank/v1beta1/balances/.+$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "balances": [{ "denom": "uluna", "amount": "42" }],
                "pagination": { "next_key": null, "total": "1" }
            })))
            .mount(&server)
            .await;

        let lcd = client(&server);
        let calc = lcd.gas_prices().await.unwrap();
        assert_eq!(calc.gas_price("uusd"), Some(Decimal::new(15, 2)));

        let balance = lcd.query_balance("terra1abc").await.unwrap();
        assert_eq!(balance.amount_of("uluna"), 42);
    }
}
