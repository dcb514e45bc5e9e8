//! Transaction confirmation workflow.
//!
//! A screen describes what it wants to submit with [`ConfirmProps`] and hands
//! it to a [`ConfirmSession`], which simulates the transaction, lets the user
//! settle the fee, acquires a key, signs, broadcasts and follows the
//! transaction until it is included.

mod error;
pub mod interact;
mod poll;
mod session;

pub use error::{chain_error, check_error, parse_error, ConfirmError};
pub use poll::PollHandle;
pub use session::{ConfirmResult, ConfirmSession, FeeDenomOption, SessionSettings};

use std::fmt;
use std::sync::Arc;

use crate::chain::types::{Coin, Coins, Msg, TxInfo};
use crate::fee::{fee_denom_list, is_fee_available, FeeValidator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Idle,
    Simulating,
    Simulated,
    AwaitingPassword,
    Submitting,
    Polling,
    Succeeded,
    Failed,
    Cancelled,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Simulating => "simulating",
            SessionState::Simulated => "simulated",
            SessionState::AwaitingPassword => "awaiting password",
            SessionState::Submitting => "submitting",
            SessionState::Polling => "polling",
            SessionState::Succeeded => "succeeded",
            SessionState::Failed => "failed",
            SessionState::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Turns an included transaction into the success message
pub type ResultParser = Arc<dyn Fn(&TxInfo) -> Option<String> + Send + Sync>;

/// Fee denominations offered to the user
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeeDenomOptions {
    pub default_value: Option<String>,
    pub list: Vec<String>,
}

/// One label/value row shown above the fee
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmContent {
    pub title: String,
    pub content: String,
}

/// Everything a confirmation needs to know about the intended transaction
#[derive(Clone)]
pub struct ConfirmProps {
    pub msgs: Vec<Msg>,
    pub contents: Vec<ConfirmContent>,
    pub fee_denom: FeeDenomOptions,
    pub balance: Coins,
    pub validate: FeeValidator,
    pub warning: Vec<String>,
    pub parse_result: Option<ResultParser>,
    pub memo: String,
    /// Idle and in-flight labels of the submit button
    pub submit_labels: [String; 2],
    pub message: String,
}

impl ConfirmProps {
    /// Fee denoms default to what the balance holds; a fee is valid when the
    /// balance covers it.
    pub fn new(msgs: Vec<Msg>, balance: Coins) -> Self {
        let list = fee_denom_list(&balance);
        let held = balance.clone();

        Self {
            msgs,
            contents: Vec::new(),
            fee_denom: FeeDenomOptions {
                default_value: None,
                list,
            },
            balance,
            validate: Arc::new(move |fee: &Coin| is_fee_available(fee, &held)),
            warning: Vec::new(),
            parse_result: None,
            memo: String::new(),
            submit_labels: ["Submit".to_string(), "Submitting...".to_string()],
            message: "Transaction submitted".to_string(),
        }
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = memo.into();
        self
    }

    pub fn with_contents(mut self, contents: Vec<ConfirmContent>) -> Self {
        self.contents = contents;
        self
    }

    pub fn with_fee_denoms(mut self, fee_denom: FeeDenomOptions) -> Self {
        self.fee_denom = fee_denom;
        self
    }

    pub fn with_validate(mut self, validate: FeeValidator) -> Self {
        self.validate = validate;
        self
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warning.push(warning.into());
        self
    }

    pub fn with_parse_result(mut self, parser: ResultParser) -> Self {
        self.parse_result = Some(parser);
        self
    }

    pub fn with_submit_labels(mut self, idle: impl Into<String>, busy: impl Into<String>) -> Self {
        self.submit_labels = [idle.into(), busy.into()];
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

impl fmt::Debug for ConfirmProps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfirmProps")
            .field("msgs", &self.msgs)
            .field("contents", &self.contents)
            .field("fee_denom", &self.fee_denom)
            .field("balance", &self.balance)
            .field("warning", &self.warning)
            .field("memo", &self.memo)
            .field("submit_labels", &self.submit_labels)
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}
