//! Staking queries against the LCD and the helpers the staking screens use to
//! summarise them.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::chain::lcd::{LcdClient, LcdError};
use crate::chain::types::Coin;

/// Validators are requested in a single page; the set is far below this
const PAGE_LIMIT: &str = "999";

pub const BOND_STATUSES: [&str; 3] = [
    "BOND_STATUS_UNBONDED",
    "BOND_STATUS_UNBONDING",
    "BOND_STATUS_BONDED",
];

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ValidatorDescription {
    #[serde(default)]
    pub moniker: String,
    #[serde(default)]
    pub identity: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub details: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Validator {
    pub operator_address: String,
    #[serde(default)]
    pub jailed: bool,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub tokens: String,
    #[serde(default)]
    pub delegator_shares: String,
    #[serde(default)]
    pub description: ValidatorDescription,
    #[serde(default)]
    pub commission: Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DelegationInfo {
    pub delegator_address: String,
    pub validator_address: String,
    #[serde(default)]
    pub shares: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Delegation {
    pub delegation: DelegationInfo,
    pub balance: Coin,
}

impl Delegation {
    pub fn validator_address(&self) -> &str {
        &self.delegation.validator_address
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UnbondingEntry {
    #[serde(default)]
    pub creation_height: String,
    pub completion_time: DateTime<Utc>,
    pub initial_balance: String,
    pub balance: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UnbondingDelegation {
    pub delegator_address: String,
    pub validator_address: String,
    #[serde(default)]
    pub entries: Vec<UnbondingEntry>,
}

/// An unbonding entry tagged with the validator it unbonds from
#[derive(Debug, Clone, PartialEq)]
pub struct FlatUnbonding {
    pub validator_address: String,
    pub entry: UnbondingEntry,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StakingPool {
    pub bonded_tokens: String,
    pub not_bonded_tokens: String,
}

#[derive(Deserialize)]
struct ValidatorsResponse {
    validators: Vec<Validator>,
}

#[derive(Deserialize)]
struct DelegationsResponse {
    delegation_responses: Vec<Delegation>,
}

#[derive(Deserialize)]
struct DelegationResponse {
    delegation_response: Delegation,
}

#[derive(Deserialize)]
struct UnbondingsResponse {
    unbonding_responses: Vec<UnbondingDelegation>,
}

#[derive(Deserialize)]
struct PoolResponse {
    pool: StakingPool,
}

/// Validators of every bond status, first occurrence of each operator kept
pub async fn query_validators(lcd: &LcdClient) -> Result<Vec<Validator>, LcdError> {
    let mut seen = HashSet::new();
    let mut validators = Vec::new();

    for status in BOND_STATUSES {
        let query = [
            ("status", status.to_string()),
            ("pagination.limit", PAGE_LIMIT.to_string()),
        ];
        let response: ValidatorsResponse = lcd.get("/cosmos/staking/v1beta1/validators", &query).await?;

        for validator in response.validators {
            if seen.insert(validator.operator_address.clone()) {
                validators.push(validator);
            }
        }
    }

    log::debug!("Loaded {} validators", validators.len());
    Ok(validators)
}

pub async fn query_validator(lcd: &LcdClient, operator: &str) -> Result<Validator, LcdError> {
    #[derive(Deserialize)]
    struct Response {
        validator: Validator,
    }

    let path = format!("/cosmos/staking/v1beta1/validators/{}", operator);
    let response: Response = lcd.get(&path, &[]).await?;
    Ok(response.validator)
}

/// Delegations of `delegator` with a non-zero balance
pub async fn query_delegations(lcd: &LcdClient, delegator: &str) -> Result<Vec<Delegation>, LcdError> {
    let path = format!("/cosmos/staking/v1beta1/delegations/{}", delegator);
    let query = [("pagination.limit", PAGE_LIMIT.to_string())];
    let response: DelegationsResponse = lcd.get(&path, &query).await?;

    Ok(response
        .delegation_responses
        .into_iter()
        .filter(|d| d.balance.amount_u128() > 0)
        .collect())
}

/// The delegation to one validator; any failure (including "no delegation")
/// reads as `None`
pub async fn query_delegation(lcd: &LcdClient, delegator: &str, validator: &str) -> Option<Delegation> {
    let path = format!(
        "/cosmos/staking/v1beta1/validators/{}/delegations/{}",
        validator, delegator
    );

    match lcd.get::<DelegationResponse>(&path, &[]).await {
        Ok(response) => Some(response.delegation_response),
        Err(e) => {
            log::debug!("No delegation from {} to {}: {}", delegator, validator, e);
            None
        }
    }
}

pub async fn query_unbondings(
    lcd: &LcdClient,
    delegator: &str,
) -> Result<Vec<UnbondingDelegation>, LcdError> {
    let path = format!(
        "/cosmos/staking/v1beta1/delegators/{}/unbonding_delegations",
        delegator
    );
    let response: UnbondingsResponse = lcd.get(&path, &[]).await?;
    Ok(response.unbonding_responses)
}

pub async fn query_pool(lcd: &LcdClient) -> Result<StakingPool, LcdError> {
    let response: PoolResponse = lcd.get("/cosmos/staking/v1beta1/pool", &[]).await?;
    Ok(response.pool)
}

pub fn find_validator<'a>(validators: &'a [Validator], operator: &str) -> anyhow::Result<&'a Validator> {
    validators
        .iter()
        .find(|v| v.operator_address == operator)
        .ok_or_else(|| anyhow::anyhow!("{} is not a validator", operator))
}

pub fn find_moniker<'a>(validators: &'a [Validator], operator: &str) -> anyhow::Result<&'a str> {
    Ok(find_validator(validators, operator)?.description.moniker.as_str())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StakeAction {
    Delegate,
    Redelegate,
    Undelegate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvailableStakeActions {
    pub delegate: bool,
    pub redelegate: bool,
    pub undelegate: bool,
}

impl AvailableStakeActions {
    pub fn is_available(&self, action: StakeAction) -> bool {
        match action {
            StakeAction::Delegate => self.delegate,
            StakeAction::Redelegate => self.redelegate,
            StakeAction::Undelegate => self.undelegate,
        }
    }
}

/// Delegating is always possible. Redelegating to `destination` needs a
/// delegation elsewhere; undelegating needs one to `destination`.
pub fn available_stake_actions(destination: &str, delegations: &[Delegation]) -> AvailableStakeActions {
    AvailableStakeActions {
        delegate: true,
        redelegate: delegations.iter().any(|d| d.validator_address() != destination),
        undelegate: delegations.iter().any(|d| d.validator_address() == destination),
    }
}

pub fn calc_delegations_total(delegations: &[Delegation]) -> String {
    delegations
        .iter()
        .map(|d| d.balance.amount_u128())
        .sum::<u128>()
        .to_string()
}

pub fn sum_entries(entries: &[UnbondingEntry]) -> u128 {
    entries
        .iter()
        .map(|e| e.initial_balance.trim().parse::<u128>().unwrap_or(0))
        .sum()
}

pub fn calc_unbondings_total(unbondings: &[UnbondingDelegation]) -> String {
    unbondings
        .iter()
        .map(|u| sum_entries(&u.entries))
        .sum::<u128>()
        .to_string()
}

/// Every entry of every unbonding, soonest completion first
pub fn flatten_unbondings(unbondings: &[UnbondingDelegation]) -> Vec<FlatUnbonding> {
    let mut flat: Vec<FlatUnbonding> = unbondings
        .iter()
        .flat_map(|u| {
            u.entries.iter().map(move |entry| FlatUnbonding {
                validator_address: u.validator_address.clone(),
                entry: entry.clone(),
            })
        })
        .collect();

    flat.sort_by_key(|f| f.entry.completion_time);
    flat
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::lcd::ClientConfig;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn delegation(validator: &str, amount: &str) -> Delegation {
        Delegation {
            delegation: DelegationInfo {
                delegator_address: "terra1me".to_string(),
                validator_address: validator.to_string(),
                shares: amount.to_string(),
            },
            balance: Coin::new("uluna", amount),
        }
    }

    fn unbonding(validator: &str, entries: &[(&str, &str)]) -> UnbondingDelegation {
        UnbondingDelegation {
            delegator_address: "terra1me".to_string(),
            validator_address: validator.to_string(),
            entries: entries
                .iter()
                .map(|(time, amount)| UnbondingEntry {
                    creation_height: "1".to_string(),
                    completion_time: time.parse().unwrap(),
                    initial_balance: amount.to_string(),
                    balance: amount.to_string(),
                })
                .collect(),
        }
    }

    fn client(server: &MockServer) -> LcdClient {
        LcdClient::new(ClientConfig {
            lcd_url: server.uri(),
            fcd_url: server.uri(),
            max_retries: 0,
            ..ClientConfig::default()
        })
        .unwrap()
    }

    fn validator_json(operator: &str, moniker: &str) -> Value {
        json!({
            "operator_address": operator,
            "jailed": false,
            "status": "BOND_STATUS_BONDED",
            "tokens": "100",
            "delegator_shares": "100",
            "description": { "moniker": moniker }
        })
    }

    #[test]
    fn test_stake_actions() {
        let delegations = vec![delegation("terravaloper1a", "10")];

        let same = available_stake_actions("terravaloper1a", &delegations);
        assert!(same.delegate);
        assert!(!same.redelegate);
        assert!(same.undelegate);

        let other = available_stake_actions("terravaloper1b", &delegations);
        assert!(other.is_available(StakeAction::Redelegate));
        assert!(!other.is_available(StakeAction::Undelegate));

        let none = available_stake_actions("terravaloper1b", &[]);
        assert_eq!(
            none,
            AvailableStakeActions { delegate: true, redelegate: false, undelegate: false }
        );
    }

    #[test]
    fn test_totals() {
        assert_eq!(calc_delegations_total(&[]), "0");
        assert_eq!(
            calc_delegations_total(&[delegation("a", "10"), delegation("b", "32")]),
            "42"
        );

        let unbondings = vec![
            unbonding("a", &[("2024-01-02T00:00:00Z", "5"), ("2024-01-01T00:00:00Z", "6")]),
            unbonding("b", &[("2023-12-31T00:00:00Z", "7")]),
        ];
        assert_eq!(calc_unbondings_total(&unbondings), "18");
        assert_eq!(calc_unbondings_total(&[]), "0");
    }

    #[test]
    fn test_flatten_unbondings_sorted() {
        let unbondings = vec![
            unbonding("a", &[("2024-01-02T00:00:00Z", "5"), ("2024-01-01T00:00:00Z", "6")]),
            unbonding("b", &[("2023-12-31T00:00:00Z", "7")]),
        ];

        let flat = flatten_unbondings(&unbondings);
        let order: Vec<(&str, &str)> = flat
            .iter()
            .map(|f| (f.validator_address.as_str(), f.entry.initial_balance.as_str()))
            .collect();
        assert_eq!(order, vec![("b", "7"), ("a", "6"), ("a", "5")]);
    }

    #[test]
    fn test_find_moniker() {
        let validators: Vec<Validator> =
            serde_json::from_value(json!([validator_json("terravaloper1a", "Alpha")])).unwrap();

        assert_eq!(find_moniker(&validators, "terravaloper1a").unwrap(), "Alpha");
        assert!(find_validator(&validators, "terravaloper1z").is_err());
    }

    #[tokio::test]
    async fn test_validators_are_deduplicated() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cosmos/staking/v1beta1/validators"))
            .and(query_param("status", "BOND_STATUS_BONDED"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "validators": [validator_json("terravaloper1a", "Alpha"), validator_json("terravaloper1b", "Beta")]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/cosmos/staking/v1beta1/validators"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "validators": [validator_json("terravaloper1a", "Alpha")]
            })))
            .mount(&server)
            .await;

        let validators = query_validators(&client(&server)).await.unwrap();
        let operators: Vec<&str> = validators.iter().map(|v| v.operator_address.as_str()).collect();
        assert_eq!(operators, vec!["terravaloper1a", "terravaloper1b"]);
    }

    #[tokio::test]
    async fn test_delegations_skip_zero_and_missing_delegation() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cosmos/staking/v1beta1/delegations/terra1me"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "delegation_responses": [
                    {
                        "delegation": { "delegator_address": "terra1me", "validator_address": "terravaloper1a", "shares": "1.0" },
                        "balance": { "denom": "uluna", "amount": "1" }
                    },
                    {
                        "delegation": { "delegator_address": "terra1me", "validator_address": "terravaloper1b", "shares": "0" },
                        "balance": { "denom": "uluna", "amount": "0" }
                    }
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/cosmos/staking/v1beta1/validators/terravaloper1z/delegations/terra1me"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "code": 5,
                "message": "delegation with delegator terra1me not found"
            })))
            .mount(&server)
            .await;

        let lcd = client(&server);
        let delegations = query_delegations(&lcd, "terra1me").await.unwrap();
        assert_eq!(delegations.len(), 1);
        assert_eq!(delegations[0].validator_address(), "terravaloper1a");

        assert!(query_delegation(&lcd, "terra1me", "terravaloper1z").await.is_none());
    }

    #[tokio::test]
    async fn test_pool() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cosmos/staking/v1beta1/pool"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "pool": { "bonded_tokens": "900", "not_bonded_tokens": "100" }
            })))
            .mount(&server)
            .await;

        let pool = query_pool(&client(&server)).await.unwrap();
        assert_eq!(pool.bonded_tokens, "900");
    }
}
