//! Terraswap pair helpers: asset info, swap message construction and swap
//! simulation through a smart query.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::chain::address::is_account_address;
use crate::chain::lcd::{LcdClient, LcdError};
use crate::chain::messages::{self, ExecuteMsg};
use crate::chain::types::{Coin, Msg};

/// Asset info as Terraswap expects it: a cw20 contract or a native denom
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenInfo {
    Token { contract_addr: String },
    NativeToken { denom: String },
}

pub fn to_token_info(token: &str) -> TokenInfo {
    if is_account_address(token) {
        TokenInfo::Token {
            contract_addr: token.to_string(),
        }
    } else {
        TokenInfo::NativeToken {
            denom: token.to_string(),
        }
    }
}

/// What is offered in a swap: `from` is a native denom or a cw20 address
#[derive(Debug, Clone)]
pub struct Offer {
    pub amount: String,
    pub from: String,
}

#[derive(Debug, Clone, Default)]
pub struct SwapOptions {
    pub belief_price: Option<String>,
    pub max_spread: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct Asset<'a> {
    amount: &'a str,
    info: TokenInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SimulationResult {
    pub return_amount: String,
    pub spread_amount: String,
    pub commission_amount: String,
}

fn offer_asset(offer: &Offer) -> Result<Value, serde_json::Error> {
    serde_json::to_value(Asset {
        amount: &offer.amount,
        info: to_token_info(&offer.from),
    })
}

/// Swap `offer` on `pair`. Native offers call the pair directly with funds
/// attached; cw20 offers go through the token's `send` with a swap hook.
pub fn swap_msgs(
    sender: &str,
    pair: &str,
    offer: &Offer,
    options: &SwapOptions,
) -> Result<Vec<Msg>, serde_json::Error> {
    let swap = ExecuteMsg::Swap {
        offer_asset: Some(offer_asset(offer)?),
        belief_price: options.belief_price.clone(),
        max_spread: options.max_spread.clone(),
    };

    if !is_account_address(&offer.from) {
        let funds = vec![Coin::new(offer.from.clone(), offer.amount.clone())];
        return Ok(vec![messages::execute_contract(
            sender,
            pair,
            serde_json::to_value(&swap)?,
            funds,
        )]);
    }

    let hook = ExecuteMsg::Swap {
        offer_asset: None,
        belief_price: options.belief_price.clone(),
        max_spread: options.max_spread.clone(),
    };

    let send = ExecuteMsg::Send {
        amount: offer.amount.clone(),
        contract: pair.to_string(),
        msg: to_base64(&hook)?,
    };

    Ok(vec![messages::execute_contract(
        sender,
        &offer.from,
        serde_json::to_value(&send)?,
        Vec::new(),
    )])
}

/// Ask the pair what `offer` would return
pub async fn simulate_terraswap(
    lcd: &LcdClient,
    pair: &str,
    offer: &Offer,
) -> Result<SimulationResult, LcdError> {
    let query = serde_json::json!({
        "simulation": { "offer_asset": offer_asset(offer)? }
    });
    lcd.query_contract_smart(pair, &query).await
}

/// base64 of the compact JSON encoding
pub fn to_base64<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    Ok(BASE64.encode(serde_json::to_vec(value)?))
}
