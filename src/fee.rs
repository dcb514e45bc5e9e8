//! Fee calculation and fee-denomination selection.
//!
//! A fee is payable in any denomination with a gas price; which ones are
//! offered depends on what the account holds and on the caller's own
//! validation (balance left after the transaction amount, etc).

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use std::sync::Arc;

use rust_decimal::Decimal;

use crate::chain::types::{Coin, Coins};

/// Native staking denomination
pub const NATIVE_DENOM: &str = "uluna";

/// Caller supplied fee check, typically "does the balance still cover the
/// transfer amount plus this fee"
pub type FeeValidator = Arc<dyn Fn(&Coin) -> bool + Send + Sync>;

/// Gas price table, one price per denomination
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeeCalculator {
    gas_prices: BTreeMap<String, Decimal>,
}

impl FeeCalculator {
    /// Build from the FCD price table; unparsable prices are skipped
    pub fn new(gas_prices: &HashMap<String, String>) -> Self {
        let gas_prices = gas_prices
            .iter()
            .filter_map(|(denom, price)| match Decimal::from_str(price.trim()) {
                Ok(price) => Some((denom.clone(), price)),
                Err(e) => {
                    log::warn!("Ignoring gas price {} for {}: {}", price, denom, e);
                    None
                }
            })
            .collect();

        Self { gas_prices }
    }

    pub fn from_prices<'a>(prices: impl IntoIterator<Item = (&'a str, Decimal)>) -> Self {
        Self {
            gas_prices: prices
                .into_iter()
                .map(|(denom, price)| (denom.to_string(), price))
                .collect(),
        }
    }

    pub fn gas_price(&self, denom: &str) -> Option<Decimal> {
        self.gas_prices.get(denom).copied()
    }

    pub fn gas_prices(&self) -> &BTreeMap<String, Decimal> {
        &self.gas_prices
    }

    /// `ceil(gas × price)` as an integer amount; `None` when the denom has no price
    pub fn fee_from_gas(&self, gas: u64, denom: &str) -> Option<String> {
        let price = self.gas_price(denom)?;
        let fee = Decimal::from(gas).checked_mul(price)?.ceil();
        Some(fee.normalize().to_string())
    }
}

/// True when the balance holds at least `fee.amount` of `fee.denom`
pub fn is_fee_available(fee: &Coin, balance: &Coins) -> bool {
    fee.amount_u128() <= balance.amount_of(&fee.denom)
}

/// Denominations the account actually holds, in balance order
pub fn fee_denom_list(balance: &Coins) -> Vec<String> {
    balance
        .iter()
        .filter(|coin| coin.amount_u128() > 0)
        .map(|coin| coin.denom.clone())
        .collect()
}

/// Inputs for [`select_fee_denom`]
pub struct FeeDenomRequest<'a> {
    pub candidates: &'a [String],
    pub balance: &'a Coins,
    /// Simulated gas limit; `None` before simulation
    pub gas: Option<u64>,
    pub calculator: Option<&'a FeeCalculator>,
    pub validate: &'a (dyn Fn(&Coin) -> bool + Send + Sync),
    pub default_denom: Option<&'a str>,
    pub is_classic: bool,
}

impl FeeDenomRequest<'_> {
    /// Fee a candidate would cost. Before simulation this is the fee for a
    /// single unit of gas, never less than 1.
    pub fn fee_for(&self, denom: &str) -> Coin {
        let gas = self.gas.unwrap_or(1);
        let amount = self
            .calculator
            .and_then(|calc| calc.fee_from_gas(gas, denom))
            .unwrap_or_else(|| gas.to_string());

        let amount = if self.gas.is_none() && amount == "0" {
            "1".to_string()
        } else {
            amount
        };

        Coin::new(denom, amount)
    }

    pub fn is_eligible(&self, denom: &str) -> bool {
        let fee = self.fee_for(denom);
        is_fee_available(&fee, self.balance) && (self.validate)(&fee)
    }

    pub fn eligible(&self) -> Vec<&str> {
        self.candidates
            .iter()
            .map(String::as_str)
            .filter(|denom| self.is_eligible(denom))
            .collect()
    }
}

/// Pick the fee denomination to preselect.
///
/// An eligible caller default always wins. Otherwise classic networks take the
/// first eligible candidate in list order, while the current network prefers
/// the native denom when it is eligible. `None` means nothing can pay the fee.
pub fn select_fee_denom(request: &FeeDenomRequest<'_>) -> Option<String> {
    let eligible = request.eligible();

    if let Some(default) = request.default_denom {
        if eligible.contains(&default) {
            return Some(default.to_string());
        }
    }

    let picked = if request.is_classic {
        eligible.first().copied()
    } else if eligible.contains(&NATIVE_DENOM) {
        Some(NATIVE_DENOM)
    } else {
        eligible.first().copied()
    };

    picked.map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calculator() -> FeeCalculator {
        FeeCalculator::from_prices([
            ("uluna", Decimal::new(15, 3)),
            ("uusd", Decimal::new(15, 2)),
            ("ukrw", Decimal::new(1785, 1)),
        ])
    }

    fn accept_all(_: &Coin) -> bool {
        true
    }

    fn request<'a>(
        candidates: &'a [String],
        balance: &'a Coins,
        calc: Option<&'a FeeCalculator>,
    ) -> FeeDenomRequest<'a> {
        FeeDenomRequest {
            candidates,
            balance,
            gas: None,
            calculator: calc,
            validate: &accept_all,
            default_denom: None,
            is_classic: false,
        }
    }

    fn denoms(list: &[&str]) -> Vec<String> {
        list.iter().map(|d| d.to_string()).collect()
    }

    #[test]
    fn test_fee_from_gas_rounds_up() {
        let calc = calculator();
        assert_eq!(calc.fee_from_gas(100_000, "uluna").as_deref(), Some("1500"));
        assert_eq!(calc.fee_from_gas(100_001, "uluna").as_deref(), Some("1501"));
        assert_eq!(calc.fee_from_gas(1, "uusd").as_deref(), Some("1"));
        assert_eq!(calc.fee_from_gas(1, "unknown"), None);
    }

    #[test]
    fn test_new_skips_bad_prices() {
        let mut prices = HashMap::new();
        prices.insert("uluna".to_string(), "0.015".to_string());
        prices.insert("uusd".to_string(), "cheap".to_string());

        let calc = FeeCalculator::new(&prices);
        assert_eq!(calc.gas_price("uluna"), Some(Decimal::new(15, 3)));
        assert_eq!(calc.gas_price("uusd"), None);
    }

    #[test]
    fn test_empty_candidates() {
        let balance = Coins::from_pairs([("uluna", "1000000")]);
        let calc = calculator();
        assert_eq!(select_fee_denom(&request(&[], &balance, Some(&calc))), None);
    }

    #[test]
    fn test_zero_balance_is_not_eligible() {
        let balance = Coins::from_pairs([("uluna", "0")]);
        let candidates = denoms(&["uluna"]);
        let calc = calculator();
        assert_eq!(select_fee_denom(&request(&candidates, &balance, Some(&calc))), None);
        assert_eq!(select_fee_denom(&request(&candidates, &balance, None)), None);
    }

    #[test]
    fn test_falls_back_to_held_denom() {
        let balance = Coins::from_pairs([("uusd", "5000000")]);
        let candidates = denoms(&["uluna", "uusd"]);
        let calc = calculator();
        assert_eq!(
            select_fee_denom(&request(&candidates, &balance, Some(&calc))).as_deref(),
            Some("uusd")
        );
    }

    #[test]
    fn test_native_preference_depends_on_network() {
        let balance = Coins::from_pairs([("uusd", "5000000"), ("uluna", "5000000")]);
        let candidates = denoms(&["uusd", "uluna"]);
        let calc = calculator();

        let mut req = request(&candidates, &balance, Some(&calc));
        assert_eq!(select_fee_denom(&req).as_deref(), Some("uluna"));

        req.is_classic = true;
        assert_eq!(select_fee_denom(&req).as_deref(), Some("uusd"));
    }

    #[test]
    fn test_default_only_when_eligible() {
        let balance = Coins::from_pairs([("uusd", "5000000"), ("uluna", "5000000")]);
        let candidates = denoms(&["uusd", "uluna", "ukrw"]);
        let calc = calculator();

        let mut req = request(&candidates, &balance, Some(&calc));
        req.default_denom = Some("uusd");
        assert_eq!(select_fee_denom(&req).as_deref(), Some("uusd"));

        req.default_denom = Some("ukrw");
        assert_eq!(select_fee_denom(&req).as_deref(), Some("uluna"));
    }

    #[test]
    fn test_gas_estimate_and_validator_filter() {
        let balance = Coins::from_pairs([("uluna", "2000"), ("uusd", "100000")]);
        let candidates = denoms(&["uluna", "uusd"]);
        let calc = calculator();
        let reject_uusd = |fee: &Coin| fee.denom != "uusd";

        let mut req = request(&candidates, &balance, Some(&calc));
        req.gas = Some(200_000);
        // 200_000 × 0.015 = 3000 uluna > 2000 held; 200_000 × 0.15 = 30000 uusd is fine
        assert_eq!(select_fee_denom(&req).as_deref(), Some("uusd"));

        req.validate = &reject_uusd;
        assert_eq!(select_fee_denom(&req), None);
    }

    #[test]
    fn test_fee_denom_list_skips_empty() {
        let balance = Coins::from_pairs([("uluna", "0"), ("uusd", "10"), ("ukrw", "1")]);
        assert_eq!(fee_denom_list(&balance), denoms(&["uusd", "ukrw"]));
    }

    #[test]
    fn test_is_fee_available() {
        let balance = Coins::from_pairs([("uusd", "10")]);
        assert!(is_fee_available(&Coin::new("uusd", "10"), &balance));
        assert!(!is_fee_available(&Coin::new("uusd", "11"), &balance));
        assert!(!is_fee_available(&Coin::new("uluna", "1"), &balance));
    }
}
