//! Polymorphic account decoding for the auth module's REST response.
//!
//! `/cosmos/auth/v1beta1/accounts/{address}` returns an `@type`-tagged JSON
//! object whose shape depends on the account kind; vesting and module accounts
//! nest the base account one or two levels down.

use serde::Deserialize;
use serde_json::Value;

use super::types::u64_string;

#[derive(Debug, Clone, Deserialize)]
pub struct BaseAccount {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub pub_key: Option<Value>,
    #[serde(default, with = "u64_string")]
    pub account_number: u64,
    #[serde(default, with = "u64_string")]
    pub sequence: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BaseVestingAccount {
    pub base_account: BaseAccount,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VestingAccount {
    pub base_vesting_account: BaseVestingAccount,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModuleAccount {
    pub base_account: BaseAccount,
    #[serde(default)]
    pub name: String,
}

/// Every account kind the wallet may be asked to sign for
#[derive(Debug, Clone)]
pub enum Account {
    Base(BaseAccount),
    Module(ModuleAccount),
    ContinuousVesting(VestingAccount),
    DelayedVesting(VestingAccount),
    PeriodicVesting(VestingAccount),
    PermanentLocked(VestingAccount),
    /// Forward compatibility for account types added by later chain upgrades
    Unsupported { type_url: String },
}

/// Common account information extracted from any account type
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountInfo {
    pub address: String,
    pub account_number: u64,
    pub sequence: u64,
    pub pub_key: Option<Value>,
}

impl Account {
    /// Decode the `account` field of the auth query response
    pub fn decode(value: &Value) -> Result<Self, serde_json::Error> {
        let type_url = value
            .get("@type")
            .and_then(Value::as_str)
            .unwrap_or_default();

        let account = match type_url {
            "/cosmos.auth.v1beta1.BaseAccount" => Account::Base(BaseAccount::deserialize(value)?),
            "/cosmos.auth.v1beta1.ModuleAccount" => Account::Module(ModuleAccount::deserialize(value)?),
            "/cosmos.vesting.v1beta1.ContinuousVestingAccount" => {
                Account::ContinuousVesting(VestingAccount::deserialize(value)?)
            }
            "/cosmos.vesting.v1beta1.DelayedVestingAccount" => {
                Account::DelayedVesting(VestingAccount::deserialize(value)?)
            }
            "/cosmos.vesting.v1beta1.PeriodicVestingAccount" => {
                Account::PeriodicVesting(VestingAccount::deserialize(value)?)
            }
            "/cosmos.vesting.v1beta1.PermanentLockedAccount" => {
                Account::PermanentLocked(VestingAccount::deserialize(value)?)
            }
            unsupported => {
                log::warn!("Encountered unsupported account type: {}", unsupported);
                Account::Unsupported {
                    type_url: unsupported.to_string(),
                }
            }
        };

        Ok(account)
    }

    pub fn account_type(&self) -> &str {
        match self {
            Account::Base(_) => "BaseAccount",
            Account::Module(_) => "ModuleAccount",
            Account::ContinuousVesting(_) => "ContinuousVestingAccount",
            Account::DelayedVesting(_) => "DelayedVestingAccount",
            Account::PeriodicVesting(_) => "PeriodicVestingAccount",
            Account::PermanentLocked(_) => "PermanentLockedAccount",
            Account::Unsupported { type_url } => type_url,
        }
    }

    fn base(&self) -> Option<&BaseAccount> {
        match self {
            Account::Base(base) => Some(base),
            Account::Module(module) => Some(&module.base_account),
            Account::ContinuousVesting(v)
            | Account::DelayedVesting(v)
            | Account::PeriodicVesting(v)
            | Account::PermanentLocked(v) => Some(&v.base_vesting_account.base_account),
            Account::Unsupported { .. } => None,
        }
    }

    /// Number and sequence needed for signing; `None` for unsupported kinds
    pub fn account_info(&self) -> Option<AccountInfo> {
        self.base().map(|base| AccountInfo {
            address: base.address.clone(),
            account_number: base.account_number,
            sequence: base.sequence,
            pub_key: base.pub_key.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_base_account() {
        let account = Account::decode(&json!({
            "@type": "/cosmos.auth.v1beta1.BaseAccount",
            "address": "terra1abc",
            "pub_key": null,
            "account_number": "42",
            "sequence": "7"
        }))
        .unwrap();

        let info = account.account_info().unwrap();
        assert_eq!(account.account_type(), "BaseAccount");
        assert_eq!(info.account_number, 42);
        assert_eq!(info.sequence, 7);
    }

    #[test]
    fn test_decode_vesting_account() {
        let account = Account::decode(&json!({
            "@type": "/cosmos.vesting.v1beta1.ContinuousVestingAccount",
            "base_vesting_account": {
                "base_account": {
                    "address": "terra1vest",
                    "account_number": "3",
                    "sequence": "11"
                },
                "original_vesting": []
            },
            "start_time": "0"
        }))
        .unwrap();

        let info = account.account_info().unwrap();
        assert_eq!(info.address, "terra1vest");
        assert_eq!(info.sequence, 11);
    }

    #[test]
    fn test_unsupported_account_has_no_info() {
        let account = Account::decode(&json!({
            "@type": "/terra.future.v9.ShinyAccount",
            "whatever": 1
        }))
        .unwrap();

        assert_eq!(account.account_type(), "/terra.future.v9.ShinyAccount");
        assert!(account.account_info().is_none());
    }
}
