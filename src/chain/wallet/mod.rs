mod keys;
mod keystore;
mod provider;
mod signer;

pub use keys::{account_address, TerraWallet, LEGACY_COIN_TYPE, TERRA_COIN_TYPE};
pub use keystore::{KeyStore, StoredKey};
pub use provider::{
    AcquiredKey, Credentials, HardwareKeyProvider, HardwareTransport, KeyProvider, LocalKeyFactory,
    LocalKeyProvider, SignMode, SignOptions, SigningKey, WalletKeyProvider,
};
pub use signer::TransactionSigner;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("Incorrect password")]
    IncorrectPassword,

    #[error("Key not found: {0}")]
    NotFound(String),

    #[error("Key already exists: {0}")]
    AlreadyExists(String),

    /// Device missing, locked, app not open, provider not configured
    #[error("Key unavailable: {0}")]
    Unavailable(String),

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Key store error: {0}")]
    Store(String),

    #[error("Key store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The account a session signs for
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub address: String,
    /// Name of the local key; `None` for watch-only or external accounts
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub ledger: bool,
    /// Hardware derivation index
    #[serde(default)]
    pub path: Option<u32>,
}

impl User {
    /// Only local, named keys are unlocked with a password
    pub fn needs_password(&self) -> bool {
        self.name.is_some() && !self.ledger
    }
}
