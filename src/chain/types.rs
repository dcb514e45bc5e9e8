//! Wire-level types shared by the LCD client, the confirmation workflow and the
//! signing capability. Amounts are integer strings in the smallest unit, as the
//! LCD returns them.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single denomination/amount pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    pub amount: String,
}

impl Coin {
    pub fn new(denom: impl Into<String>, amount: impl Into<String>) -> Self {
        Self {
            denom: denom.into(),
            amount: amount.into(),
        }
    }

    /// Integer amount; malformed amounts count as zero
    pub fn amount_u128(&self) -> u128 {
        self.amount.trim().parse::<u128>().unwrap_or(0)
    }
}

/// An ordered list of coins, e.g. an account balance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Coins(pub Vec<Coin>);

impl Coins {
    pub fn new(coins: Vec<Coin>) -> Self {
        Self(coins)
    }

    /// Build from `(denom, amount)` pairs
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self(pairs.into_iter().map(|(d, a)| Coin::new(d, a)).collect())
    }

    pub fn get(&self, denom: &str) -> Option<&Coin> {
        self.0.iter().find(|c| c.denom == denom)
    }

    /// Amount held in `denom`, zero when absent
    pub fn amount_of(&self, denom: &str) -> u128 {
        self.get(denom).map(Coin::amount_u128).unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Coin> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A transaction message in its JSON (`@type`-tagged) form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Msg(pub Value);

impl Msg {
    pub fn type_url(&self) -> Option<&str> {
        self.0.get("@type").and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TxBody {
    pub messages: Vec<Msg>,
    #[serde(default)]
    pub memo: String,
    #[serde(default, with = "u64_string")]
    pub timeout_height: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fee {
    pub amount: Vec<Coin>,
    #[serde(with = "u64_string")]
    pub gas_limit: u64,
    #[serde(default)]
    pub payer: String,
    #[serde(default)]
    pub granter: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignerInfo {
    pub public_key: Option<Value>,
    pub mode_info: Value,
    #[serde(with = "u64_string")]
    pub sequence: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthInfo {
    #[serde(default)]
    pub signer_infos: Vec<SignerInfo>,
    pub fee: Fee,
}

/// Transaction produced by simulation, waiting for a fee and a signature.
/// Only the gas limit and the fee are ever touched by this crate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnsignedTx {
    pub body: TxBody,
    pub auth_info: AuthInfo,
}

impl UnsignedTx {
    pub fn gas_limit(&self) -> u64 {
        self.auth_info.fee.gas_limit
    }

    /// Replace whatever fee the simulation attached, keeping the gas limit
    pub fn set_fee(&mut self, fee: Coin) {
        self.auth_info.fee.amount = vec![fee];
    }
}

/// Signed transaction bytes as returned by the signing capability
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTx {
    pub tx_bytes: Vec<u8>,
}

impl SignedTx {
    pub fn new(tx_bytes: Vec<u8>) -> Self {
        Self { tx_bytes }
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.tx_bytes)
    }
}

/// Result of a sync-mode broadcast (checked by the mempool, not yet included)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BroadcastResult {
    pub txhash: String,
    #[serde(default)]
    pub code: u32,
    #[serde(default)]
    pub codespace: String,
    #[serde(default)]
    pub raw_log: String,
}

/// Transaction as reported by the chain once it is found by hash
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TxInfo {
    pub txhash: String,
    #[serde(with = "u64_string")]
    pub height: u64,
    #[serde(default)]
    pub code: u32,
    #[serde(default)]
    pub raw_log: String,
    #[serde(default, with = "u64_string")]
    pub gas_wanted: u64,
    #[serde(default, with = "u64_string")]
    pub gas_used: u64,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub logs: Value,
}

impl TxInfo {
    pub fn is_included(&self) -> bool {
        self.height > 0
    }
}

/// Cosmos REST encodes 64-bit integers as strings; accept both forms
pub(crate) mod u64_string {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Str(String),
            Num(u64),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Num(n) => Ok(n),
            Raw::Str(s) if s.is_empty() => Ok(0),
            Raw::Str(s) => s.parse().map_err(de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coins_lookup() {
        let balance = Coins::from_pairs([("uluna", "1000"), ("uusd", "oops")]);
        assert_eq!(balance.amount_of("uluna"), 1000);
        assert_eq!(balance.amount_of("uusd"), 0);
        assert_eq!(balance.amount_of("ukrw"), 0);
    }

    #[test]
    fn test_tx_info_accepts_string_numbers() {
        let info: TxInfo = serde_json::from_value(serde_json::json!({
            "txhash": "ABC",
            "height": "1234",
            "code": 0,
            "raw_log": "[]",
            "gas_wanted": "200000",
            "gas_used": 150000
        }))
        .unwrap();

        assert_eq!(info.height, 1234);
        assert_eq!(info.gas_used, 150000);
        assert!(info.is_included());
    }

    #[test]
    fn test_set_fee_keeps_gas_limit() {
        let mut tx = UnsignedTx::default();
        tx.auth_info.fee.gas_limit = 175_000;
        tx.auth_info.fee.amount = vec![Coin::new("uluna", "1")];

        tx.set_fee(Coin::new("uusd", "26250"));

        assert_eq!(tx.gas_limit(), 175_000);
        assert_eq!(tx.auth_info.fee.amount, vec![Coin::new("uusd", "26250")]);
    }
}
