//! Password-encrypted key file.
//!
//! Private keys are sealed with AES-256-GCM under a key derived from the
//! password with Argon2id; a failed tag check is reported as an incorrect
//! password. Hardware accounts are stored without key material.

use std::fs;
use std::path::{Path, PathBuf};

use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use argon2::{password_hash::SaltString, Argon2, PasswordHasher};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::{KeyError, TerraWallet, User};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredKey {
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub ledger: bool,
    #[serde(default)]
    pub path: Option<u32>,
    /// base64 AES-GCM ciphertext of the private key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ciphertext: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    /// Argon2 salt (PHC base64)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
}

impl StoredKey {
    pub fn user(&self) -> User {
        User {
            address: self.address.clone(),
            name: Some(self.name.clone()),
            ledger: self.ledger,
            path: self.path,
        }
    }

    /// Decrypt the private key. CPU bound (Argon2), call off the async runtime.
    pub fn decrypt(&self, password: &str) -> Result<Zeroizing<Vec<u8>>, KeyError> {
        let (Some(ciphertext), Some(nonce), Some(salt)) = (&self.ciphertext, &self.nonce, &self.salt) else {
            return Err(KeyError::InvalidKey(format!("{} has no local key material", self.name)));
        };

        let ciphertext = BASE64
            .decode(ciphertext)
            .map_err(|e| KeyError::Store(format!("bad ciphertext for {}: {}", self.name, e)))?;
        let nonce = hex::decode(nonce).map_err(|e| KeyError::Store(format!("bad nonce for {}: {}", self.name, e)))?;
        if nonce.len() != 12 {
            return Err(KeyError::Store(format!("bad nonce length for {}", self.name)));
        }
        let salt = SaltString::from_b64(salt).map_err(|e| KeyError::Store(e.to_string()))?;

        let cipher = cipher_for(password, &salt)?;
        let plaintext = cipher
            .decrypt(Nonce::from_slice(&nonce), ciphertext.as_slice())
            .map_err(|_| KeyError::IncorrectPassword)?;

        Ok(Zeroizing::new(plaintext))
    }
}

fn cipher_for(password: &str, salt: &SaltString) -> Result<Aes256Gcm, KeyError> {
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), salt)
        .map_err(|e| KeyError::Store(format!("key derivation failed: {}", e)))?;
    let output = hash
        .hash
        .ok_or_else(|| KeyError::Store("key derivation produced no output".to_string()))?;

    let key = Zeroizing::new(output.as_bytes().to_vec());
    if key.len() < 32 {
        return Err(KeyError::Store("derived key too short".to_string()));
    }

    Aes256Gcm::new_from_slice(&key[..32]).map_err(|e| KeyError::Store(e.to_string()))
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct KeyFile {
    #[serde(default)]
    keys: Vec<StoredKey>,
}

/// Named keys persisted as one JSON file
#[derive(Debug)]
pub struct KeyStore {
    path: PathBuf,
    keys: Vec<StoredKey>,
}

impl KeyStore {
    /// Open the store at `path`; a missing file is an empty store
    pub fn open(path: impl AsRef<Path>) -> Result<Self, KeyError> {
        let path = path.as_ref().to_path_buf();
        let keys = if path.exists() {
            let content = fs::read_to_string(&path)?;
            let file: KeyFile = serde_json::from_str(&content)
                .map_err(|e| KeyError::Store(format!("{}: {}", path.display(), e)))?;
            file.keys
        } else {
            Vec::new()
        };

        log::debug!("Opened key store {} with {} keys", path.display(), keys.len());
        Ok(Self { path, keys })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn list(&self) -> &[StoredKey] {
        &self.keys
    }

    pub fn get(&self, name: &str) -> Option<&StoredKey> {
        self.keys.iter().find(|k| k.name == name)
    }

    pub fn user(&self, name: &str) -> Option<User> {
        self.get(name).map(StoredKey::user)
    }

    /// Derive the key from `mnemonic`, encrypt it and persist; returns the address
    pub fn import_mnemonic(&mut self, name: &str, mnemonic: &str, password: &str) -> Result<String, KeyError> {
        let wallet = TerraWallet::from_mnemonic(mnemonic).map_err(|e| KeyError::InvalidKey(e.to_string()))?;
        self.import_private_key(name, &wallet.private_key_bytes(), password)
    }

    pub fn import_private_key(
        &mut self,
        name: &str,
        private_key: &[u8],
        password: &str,
    ) -> Result<String, KeyError> {
        self.ensure_free(name)?;
        if password.is_empty() {
            return Err(KeyError::InvalidKey("password must not be empty".to_string()));
        }

        let wallet = TerraWallet::from_private_key(private_key).map_err(|e| KeyError::InvalidKey(e.to_string()))?;

        let salt = SaltString::generate(&mut OsRng);
        let cipher = cipher_for(password, &salt)?;
        let nonce_bytes = rand::random::<[u8; 12]>();
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), private_key)
            .map_err(|e| KeyError::Store(format!("encryption failed: {}", e)))?;

        let address = wallet.address.clone();
        self.keys.push(StoredKey {
            name: name.to_string(),
            address: address.clone(),
            ledger: false,
            path: None,
            ciphertext: Some(BASE64.encode(ciphertext)),
            nonce: Some(hex::encode(nonce_bytes)),
            salt: Some(salt.as_str().to_string()),
        });
        self.save()?;

        log::info!("Stored key {} ({})", name, address);
        Ok(address)
    }

    /// Record a hardware account; nothing secret is stored
    pub fn add_ledger(&mut self, name: &str, address: &str, path: u32) -> Result<(), KeyError> {
        self.ensure_free(name)?;
        self.keys.push(StoredKey {
            name: name.to_string(),
            address: address.to_string(),
            ledger: true,
            path: Some(path),
            ciphertext: None,
            nonce: None,
            salt: None,
        });
        self.save()
    }

    pub fn decrypt(&self, name: &str, password: &str) -> Result<Zeroizing<Vec<u8>>, KeyError> {
        self.get(name)
            .ok_or_else(|| KeyError::NotFound(name.to_string()))?
            .decrypt(password)
    }

    pub fn remove(&mut self, name: &str) -> Result<(), KeyError> {
        let before = self.keys.len();
        self.keys.retain(|k| k.name != name);
        if self.keys.len() == before {
            return Err(KeyError::NotFound(name.to_string()));
        }
        self.save()
    }

    fn ensure_free(&self, name: &str) -> Result<(), KeyError> {
        if self.get(name).is_some() {
            return Err(KeyError::AlreadyExists(name.to_string()));
        }
        Ok(())
    }

    fn save(&self) -> Result<(), KeyError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = KeyFile {
            keys: self.keys.clone(),
        };
        let content = serde_json::to_string_pretty(&file).map_err(|e| KeyError::Store(e.to_string()))?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}
