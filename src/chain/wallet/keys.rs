use anyhow::{anyhow, Result};
use bip32::{ChildNumber, XPrv};
use bip39::Mnemonic;
use ripemd::Ripemd160;
use secp256k1::{PublicKey, Secp256k1, SecretKey};
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::chain::address::{encode, ACCOUNT_PREFIX};

/// Terra coin type, BIP44 path m/44'/330'/0'/0/{index}
pub const TERRA_COIN_TYPE: u32 = 330;
/// Coin type used by wallets created before the Terra coin type existed
pub const LEGACY_COIN_TYPE: u32 = 118;

/// Key pair derived from a mnemonic; the private key is wiped on drop
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct TerraWallet {
    #[zeroize(skip)]
    pub address: String,

    private_key_bytes: [u8; 32],
    public_key_bytes: [u8; 33],
}

impl TerraWallet {
    /// Derive account 0, index 0 with the Terra coin type
    pub fn from_mnemonic(phrase: &str) -> Result<Self> {
        Self::derive(phrase, TERRA_COIN_TYPE, 0, 0)
    }

    pub fn derive(phrase: &str, coin_type: u32, account: u32, index: u32) -> Result<Self> {
        let mnemonic = Mnemonic::parse(phrase)?;
        let seed = Zeroizing::new(mnemonic.to_seed(""));

        let private_key = Zeroizing::new(derive_private_key(&seed[..], coin_type, account, index)?);
        Self::from_private_key(&private_key[..])
    }

    /// Rebuild from raw secret bytes, e.g. after decrypting them from the key store
    pub fn from_private_key(private_key: &[u8]) -> Result<Self> {
        let secp = Secp256k1::new();
        let secret_key = SecretKey::from_slice(private_key)?;
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);

        let mut private_key_bytes = [0u8; 32];
        private_key_bytes.copy_from_slice(&secret_key.secret_bytes());

        Ok(Self {
            address: account_address(&public_key)?,
            private_key_bytes,
            public_key_bytes: public_key.serialize(),
        })
    }

    pub fn private_key(&self) -> Result<SecretKey> {
        SecretKey::from_slice(&self.private_key_bytes).map_err(|e| anyhow!("Invalid private key: {}", e))
    }

    /// Secret bytes in a buffer that wipes itself
    pub fn private_key_bytes(&self) -> Zeroizing<Vec<u8>> {
        Zeroizing::new(self.private_key_bytes.to_vec())
    }

    /// Compressed SEC1 public key (33 bytes)
    pub fn public_key_bytes(&self) -> [u8; 33] {
        self.public_key_bytes
    }
}

impl std::fmt::Debug for TerraWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerraWallet").field("address", &self.address).finish_non_exhaustive()
    }
}

fn derive_private_key(seed: &[u8], coin_type: u32, account: u32, index: u32) -> Result<[u8; 32]> {
    let xprv = XPrv::new(seed).map_err(|e| anyhow!("Failed to create XPrv from seed: {}", e))?;

    let derived = xprv
        .derive_child(ChildNumber::new(44, true)?)
        .and_then(|k| k.derive_child(ChildNumber::new(coin_type, true)?))
        .and_then(|k| k.derive_child(ChildNumber::new(account, true)?))
        .and_then(|k| k.derive_child(ChildNumber::new(0, false)?))
        .and_then(|k| k.derive_child(ChildNumber::new(index, false)?))
        .map_err(|e| anyhow!("Failed to derive key: {}", e))?;

    Ok(derived.to_bytes())
}

/// Cosmos account address: bech32(ripemd160(sha256(compressed pubkey)))
pub fn account_address(public_key: &PublicKey) -> Result<String> {
    let sha = Sha256::digest(public_key.serialize());
    let hash = Ripemd160::digest(sha);
    encode(ACCOUNT_PREFIX, &hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::address::is_account_address;

    const MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    #[test]
    fn test_derivation_is_deterministic() {
        let wallet1 = TerraWallet::from_mnemonic(MNEMONIC).unwrap();
        let wallet2 = TerraWallet::from_mnemonic(MNEMONIC).unwrap();

        assert_eq!(wallet1.address, wallet2.address);
        assert!(wallet1.address.starts_with("terra1"));
        assert_eq!(wallet1.address.len(), 44);
        assert!(is_account_address(&wallet1.address));
    }

    #[test]
    fn test_coin_type_changes_address() {
        let terra = TerraWallet::derive(MNEMONIC, TERRA_COIN_TYPE, 0, 0).unwrap();
        let legacy = TerraWallet::derive(MNEMONIC, LEGACY_COIN_TYPE, 0, 0).unwrap();
        assert_ne!(terra.address, legacy.address);
    }

    #[test]
    fn test_private_key_round_trip() {
        let wallet = TerraWallet::from_mnemonic(MNEMONIC).unwrap();
        let restored = TerraWallet::from_private_key(&wallet.private_key_bytes()).unwrap();

        assert_eq!(wallet.address, restored.address);
        assert_eq!(wallet.public_key_bytes(), restored.public_key_bytes());
        assert_eq!(restored.public_key_bytes()[0] & 0xfe, 0x02);
    }

    #[test]
    fn test_rejects_invalid_mnemonic() {
        assert!(TerraWallet::from_mnemonic("not a real mnemonic").is_err());
    }
}
