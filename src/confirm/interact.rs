//! Free-form contract execution: the user pastes an execute message as JSON
//! and optionally attaches funds.

use serde_json::Value;
use thiserror::Error;

use super::ConfirmProps;
use crate::chain::address::is_account_address;
use crate::chain::messages::execute_contract;
use crate::chain::types::{Coin, Coins};
use crate::chain::wallet::User;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InteractError {
    #[error("JSON is invalid")]
    InvalidJson,

    #[error("Contract address is invalid: {0}")]
    InvalidAddress(String),

    #[error("Amount is invalid for {0}")]
    InvalidAmount(String),
}

/// Field error for the JSON input, `None` when it parses
pub fn validate_json(input: &str) -> Option<String> {
    match parse_json(input) {
        Ok(_) => None,
        Err(e) => Some(e.to_string()),
    }
}

fn parse_json(input: &str) -> Result<Value, InteractError> {
    if input.trim().is_empty() {
        return Err(InteractError::InvalidJson);
    }
    serde_json::from_str(input).map_err(|_| InteractError::InvalidJson)
}

/// Attached funds; zero amounts are dropped, malformed ones rejected
fn funds(coins: Vec<Coin>) -> Result<Vec<Coin>, InteractError> {
    let mut funds = Vec::with_capacity(coins.len());
    for coin in coins {
        let amount = coin.amount.trim();
        if amount.is_empty() || amount.parse::<u128>().is_err() {
            return Err(InteractError::InvalidAmount(coin.denom));
        }
        if coin.amount_u128() > 0 {
            funds.push(Coin::new(coin.denom, amount));
        }
    }
    Ok(funds)
}

/// Confirmation of a `MsgExecuteContract` sent by `user` to `contract`
pub fn interact(
    user: &User,
    contract: &str,
    json: &str,
    coins: Vec<Coin>,
    balance: Coins,
) -> Result<ConfirmProps, InteractError> {
    if !is_account_address(contract) {
        return Err(InteractError::InvalidAddress(contract.to_string()));
    }

    let msg = parse_json(json)?;
    let funds = funds(coins)?;

    Ok(ConfirmProps::new(vec![execute_contract(&user.address, contract, msg, funds)], balance)
        .with_submit_labels("Interact", "Interacting...")
        .with_message(format!("Interacted with {}", contract)))
}
