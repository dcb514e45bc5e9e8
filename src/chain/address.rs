use anyhow::Result;
use bech32::Hrp;

pub const ACCOUNT_PREFIX: &str = "terra";
pub const VALIDATOR_PREFIX: &str = "terravaloper";

/// Encode raw address bytes with the given bech32 prefix
pub fn encode(prefix: &str, bytes: &[u8]) -> Result<String> {
    let hrp = Hrp::parse(prefix)?;
    Ok(bech32::encode::<bech32::Bech32>(hrp, bytes)?)
}

fn has_prefix(address: &str, prefix: &str) -> bool {
    match bech32::decode(address) {
        // 20 bytes for key accounts, 32 for contracts
        Ok((hrp, data)) => hrp.as_str() == prefix && (data.len() == 20 || data.len() == 32),
        Err(_) => false,
    }
}

/// True for a well-formed `terra1...` account or contract address
pub fn is_account_address(address: &str) -> bool {
    has_prefix(address, ACCOUNT_PREFIX)
}

/// True for a well-formed `terravaloper1...` operator address
pub fn is_validator_address(address: &str) -> bool {
    has_prefix(address, VALIDATOR_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_account_address() {
        let address = encode(ACCOUNT_PREFIX, &[7u8; 20]).unwrap();
        assert!(address.starts_with("terra1"));
        assert!(is_account_address(&address));
        assert!(!is_validator_address(&address));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(!is_account_address("uluna"));
        assert!(!is_account_address("terra1notanaddress"));
        assert!(!is_account_address(""));
    }

    #[test]
    fn test_contract_address_length() {
        let contract = encode(ACCOUNT_PREFIX, &[1u8; 32]).unwrap();
        assert!(is_account_address(&contract));
    }
}
