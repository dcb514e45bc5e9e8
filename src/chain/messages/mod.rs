//! Constructors for the JSON (`@type`-tagged) messages the wallet submits.

use serde::Serialize;
use serde_json::{json, Value};

use crate::chain::types::{Coin, Msg};

pub const MSG_SEND: &str = "/cosmos.bank.v1beta1.MsgSend";
pub const MSG_DELEGATE: &str = "/cosmos.staking.v1beta1.MsgDelegate";
pub const MSG_UNDELEGATE: &str = "/cosmos.staking.v1beta1.MsgUndelegate";
pub const MSG_BEGIN_REDELEGATE: &str = "/cosmos.staking.v1beta1.MsgBeginRedelegate";
pub const MSG_WITHDRAW_REWARD: &str = "/cosmos.distribution.v1beta1.MsgWithdrawDelegatorReward";
pub const MSG_EXECUTE_CONTRACT: &str = "/cosmwasm.wasm.v1.MsgExecuteContract";

/// Execute messages understood by Terraswap pairs and cw20 tokens
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecuteMsg {
    Swap {
        /// Absent in the hook a cw20 `send` forwards to the pair
        #[serde(skip_serializing_if = "Option::is_none")]
        offer_asset: Option<Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        belief_price: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        max_spread: Option<String>,
    },
    Send {
        amount: String,
        contract: String,
        /// base64 encoded hook message for the receiving contract
        msg: String,
    },
}

pub fn send(from: &str, to: &str, amount: Vec<Coin>) -> Msg {
    Msg(json!({
        "@type": MSG_SEND,
        "from_address": from,
        "to_address": to,
        "amount": amount,
    }))
}

pub fn delegate(delegator: &str, validator: &str, amount: Coin) -> Msg {
    Msg(json!({
        "@type": MSG_DELEGATE,
        "delegator_address": delegator,
        "validator_address": validator,
        "amount": amount,
    }))
}

pub fn undelegate(delegator: &str, validator: &str, amount: Coin) -> Msg {
    Msg(json!({
        "@type": MSG_UNDELEGATE,
        "delegator_address": delegator,
        "validator_address": validator,
        "amount": amount,
    }))
}

pub fn redelegate(delegator: &str, source: &str, destination: &str, amount: Coin) -> Msg {
    Msg(json!({
        "@type": MSG_BEGIN_REDELEGATE,
        "delegator_address": delegator,
        "validator_src_address": source,
        "validator_dst_address": destination,
        "amount": amount,
    }))
}

pub fn withdraw_reward(delegator: &str, validator: &str) -> Msg {
    Msg(json!({
        "@type": MSG_WITHDRAW_REWARD,
        "delegator_address": delegator,
        "validator_address": validator,
    }))
}

/// `MsgExecuteContract` carrying an already-built JSON execute message
pub fn execute_contract(sender: &str, contract: &str, msg: Value, funds: Vec<Coin>) -> Msg {
    Msg(json!({
        "@type": MSG_EXECUTE_CONTRACT,
        "sender": sender,
        "contract": contract,
        "msg": msg,
        "funds": funds,
    }))
}
