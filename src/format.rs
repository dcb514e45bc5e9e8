//! Display formatting for amounts, denominations, addresses and dates.
//!
//! Everything here is pure. Malformed numeric input is treated as zero and
//! malformed JSON as an empty string; nothing in this module returns an error.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::chain::address;
use crate::chain::types::Coin;

/// Decimal places of every native Terra denomination
pub const DEFAULT_DECIMALS: u32 = 6;

/// Fiat currency codes with a native `u<code>` stable denomination
pub const CURRENCIES: &[&str] = &[
    "KRW", "USD", "SDR", "CNY", "JPY", "EUR", "GBP", "INR", "CAD", "CHF", "HKD",
    "AUD", "SGD", "THB", "SEK", "NOK", "DKK", "IDR", "PHP", "MNT", "MYR", "TWD",
];

/// Token metadata for cw20 contracts, keyed by contract address
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WhitelistToken {
    pub symbol: Option<String>,
    pub name: Option<String>,
    pub icon: Option<String>,
    pub decimals: Option<u32>,
}

pub type Whitelist = HashMap<String, WhitelistToken>;

#[derive(Debug, Clone, Copy, Default)]
pub struct FormatConfig {
    /// Drop the fractional part entirely
    pub integer: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayCoin {
    pub value: String,
    pub unit: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DateConfig {
    pub to_locale: bool,
    pub short: bool,
}

fn parse(number: &str) -> Decimal {
    let trimmed = number.trim();
    if trimmed.is_empty() {
        return Decimal::ZERO;
    }
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .unwrap_or(Decimal::ZERO)
}

/// `None` past the 28 digits a `Decimal` can hold
fn pow10(decimals: u32) -> Option<Decimal> {
    (0..decimals).try_fold(Decimal::ONE, |acc, _| acc.checked_mul(Decimal::TEN))
}

/// `value × 10^decimals`; out of range is zero
fn scale_up(value: Decimal, decimals: u32) -> Decimal {
    pow10(decimals)
        .and_then(|factor| value.checked_mul(factor))
        .unwrap_or(Decimal::ZERO)
}

/// `value / 10^decimals`; out of range is zero
fn scale_down(value: Decimal, decimals: u32) -> Decimal {
    pow10(decimals)
        .and_then(|factor| value.checked_div(factor))
        .unwrap_or(Decimal::ZERO)
}

fn truncate_dp(value: Decimal, decimals: u32) -> Decimal {
    value.round_dp_with_strategy(decimals, RoundingStrategy::ToZero)
}

fn plain(value: Decimal) -> String {
    if value.is_zero() {
        return "0".to_string();
    }
    value.normalize().to_string()
}

fn group_thousands(fixed: &str) -> String {
    let (sign, unsigned) = match fixed.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", fixed),
    };
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (unsigned, None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    match frac_part {
        Some(frac) => format!("{}{}.{}", sign, grouped, frac),
        None => format!("{}{}", sign, grouped),
    }
}

fn decimal_value(value: Decimal, decimals: u32) -> String {
    let value = truncate_dp(value, decimals);
    let value = if value.is_zero() { Decimal::ZERO } else { value };
    group_thousands(&format!("{:.*}", decimals as usize, value))
}

/// Group and pad a decimal string to exactly `decimals` places, truncating
/// extra digits: `"1234.5"` → `"1,234.500000"`
pub fn decimal(number: &str, decimals: u32) -> String {
    decimal_value(parse(number), decimals)
}

pub fn decimal_n(number: &str, decimals: u32) -> f64 {
    truncate_dp(parse(number), decimals).to_f64().unwrap_or(0.0)
}

/// Scale an integer amount down by `decimals` and format it for display
pub fn amount(amount: &str, decimals: u32, config: FormatConfig) -> String {
    let value = scale_down(parse(amount), decimals);
    decimal_value(value, if config.integer { 0 } else { decimals })
}

pub fn amount_n(amount: &str, decimals: u32, config: FormatConfig) -> f64 {
    let value = scale_down(parse(amount), decimals);
    truncate_dp(value, if config.integer { 0 } else { decimals })
        .to_f64()
        .unwrap_or(0.0)
}

/// Human input → integer amount in the smallest unit, truncated toward zero
pub fn to_amount_with(input: &str, decimals: u32) -> String {
    if input.trim().is_empty() {
        return "0".to_string();
    }
    plain(scale_up(parse(input), decimals).trunc())
}

pub fn to_amount(input: &str) -> String {
    to_amount_with(input, DEFAULT_DECIMALS)
}

/// Integer amount → plain human input (no grouping, no trailing zeros)
pub fn to_input_with(amount: &str, decimals: u32) -> String {
    if amount.trim().is_empty() {
        return "0".to_string();
    }
    plain(truncate_dp(scale_down(parse(amount), decimals), decimals))
}

pub fn to_input(amount: &str) -> String {
    to_input_with(amount, DEFAULT_DECIMALS)
}

/// Native stable denominations look like `uusd`, `ukrw`, `usdr`
pub fn is_native_terra(denom: &str) -> bool {
    denom.len() == 4 && denom.starts_with('u') && denom.chars().all(|c| c.is_ascii_lowercase())
}

/// Display symbol for a denomination or cw20 contract address
pub fn denom(denom: &str, whitelist: Option<&Whitelist>) -> String {
    if address::is_account_address(denom) {
        let token = whitelist.and_then(|w| w.get(denom));
        let symbol = token.and_then(|t| {
            t.symbol
                .as_deref()
                .filter(|s| !s.is_empty())
                .or_else(|| t.name.as_deref().filter(|s| !s.is_empty()))
        });
        if let Some(symbol) = symbol {
            return symbol.to_string();
        }
    }

    let unit: String = denom.chars().skip(1).collect::<String>().to_uppercase();

    if denom == "uluna" {
        "Luna".to_string()
    } else if is_native_terra(denom) && CURRENCIES.contains(&unit.as_str()) {
        format!("{}T", &unit[..2])
    } else if denom.starts_with('u') {
        unit
    } else {
        denom.to_string()
    }
}

pub fn display(
    coin: &Coin,
    decimals: u32,
    config: FormatConfig,
    whitelist: Option<&Whitelist>,
) -> DisplayCoin {
    DisplayCoin {
        value: amount(&coin.amount, decimals, config),
        unit: denom(&coin.denom, whitelist),
    }
}

/// `"1.500000 UST"`
pub fn coin(
    coin: &Coin,
    decimals: u32,
    config: FormatConfig,
    whitelist: Option<&Whitelist>,
) -> String {
    let DisplayCoin { value, unit } = display(coin, decimals, config, whitelist);
    [value, unit].join(" ")
}

/// Shorten to `head...tail`, only when the address is longer than both parts
pub fn truncate(address: &str, head: usize, tail: usize) -> String {
    let len = address.chars().count();
    if len <= head + tail {
        return address.to_string();
    }

    let start: String = address.chars().take(head).collect();
    let end: String = address.chars().skip(len - tail).collect();
    [start, end].join("...")
}

fn offset_name(offset: &FixedOffset) -> String {
    let seconds = offset.local_minus_utc();
    if seconds == 0 {
        return "UTC".to_string();
    }

    let sign = if seconds < 0 { '-' } else { '+' };
    let hours = seconds.abs() / 3600;
    let minutes = (seconds.abs() % 3600) / 60;
    if minutes == 0 {
        format!("UTC{}{}", sign, hours)
    } else {
        format!("UTC{}{}:{:02}", sign, hours, minutes)
    }
}

fn format_with(dt: &NaiveDateTime, zone: Option<String>, config: DateConfig) -> String {
    let formatted = if config.short {
        dt.format("%b %-d, %Y").to_string()
    } else if config.to_locale {
        dt.format("%b %-d, %Y, %-I:%M:%S %p").to_string()
    } else {
        dt.format("%Y.%m.%d %H:%M:%S").to_string()
    };

    if config.short {
        formatted
    } else {
        format!("{} ({})", formatted, zone.unwrap_or_else(|| "Local".to_string()))
    }
}

/// Format an ISO-8601 timestamp. Empty or unparsable input yields `""`.
pub fn date(param: &str, config: DateConfig) -> String {
    if param.trim().is_empty() {
        return String::new();
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(param) {
        return format_with(&dt.naive_local(), Some(offset_name(dt.offset())), config);
    }

    match NaiveDateTime::parse_from_str(param, "%Y-%m-%dT%H:%M:%S%.f") {
        Ok(naive) => format_with(&naive, None, config),
        Err(_) => String::new(),
    }
}

/// Re-serialize JSON compactly; invalid JSON becomes `""`
pub fn sanitize_json(input: &str) -> String {
    serde_json::from_str::<serde_json::Value>(input)
        .map(|v| v.to_string())
        .unwrap_or_default()
}
