//! Key acquisition: turning user credentials into something that can sign.
//!
//! Local keys are decrypted from the [`KeyStore`]; hardware keys are opened
//! through a [`HardwareTransport`] and must be released once signing is over.
//! The protobuf/amino encoding of the transaction lives behind
//! [`SigningKey::sign_tx`].

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use zeroize::Zeroizing;

use super::{KeyError, KeyStore, StoredKey};
use crate::chain::types::{SignedTx, UnsignedTx};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignMode {
    Direct,
    LegacyAminoJson,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignOptions {
    pub account_number: u64,
    pub sequence: u64,
    pub chain_id: String,
    pub sign_mode: SignMode,
    pub is_classic: bool,
}

/// A key able to sign transactions
#[async_trait]
pub trait SigningKey: Send + Sync {
    /// Keys that cannot sign protobuf documents (older hardware apps) ask for
    /// amino JSON signing instead
    fn requires_legacy_signing(&self) -> bool {
        false
    }

    async fn sign_tx(&self, tx: &UnsignedTx, options: &SignOptions) -> Result<SignedTx, KeyError>;
}

/// What the user supplied to unlock a key
#[derive(Clone)]
pub enum Credentials {
    Local { name: String, password: Zeroizing<String> },
    Hardware { device_id: String, path: Option<u32> },
}

impl Credentials {
    pub fn local(name: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials::Local {
            name: name.into(),
            password: Zeroizing::new(password.into()),
        }
    }

    pub fn hardware(device_id: impl Into<String>, path: Option<u32>) -> Self {
        Credentials::Hardware {
            device_id: device_id.into(),
            path,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Local { name, .. } => f
                .debug_struct("Local")
                .field("name", name)
                .field("password", &"<redacted>")
                .finish(),
            Credentials::Hardware { device_id, path } => f
                .debug_struct("Hardware")
                .field("device_id", device_id)
                .field("path", path)
                .finish(),
        }
    }
}

/// Connection to a hardware signer
#[async_trait]
pub trait HardwareTransport: Send + Sync {
    async fn open(&self, device_id: &str, path: Option<u32>) -> Result<Arc<dyn SigningKey>, KeyError>;

    async fn disconnect(&self, device_id: &str) -> Result<(), KeyError>;
}

/// A key held for the duration of one signing. Hardware keys keep their
/// transport open until [`AcquiredKey::release`].
pub struct AcquiredKey {
    key: Arc<dyn SigningKey>,
    transport: Option<(Arc<dyn HardwareTransport>, String)>,
}

impl AcquiredKey {
    pub fn local(key: Arc<dyn SigningKey>) -> Self {
        Self { key, transport: None }
    }

    pub fn hardware(key: Arc<dyn SigningKey>, transport: Arc<dyn HardwareTransport>, device_id: String) -> Self {
        Self {
            key,
            transport: Some((transport, device_id)),
        }
    }

    pub fn requires_legacy_signing(&self) -> bool {
        self.key.requires_legacy_signing()
    }

    pub fn is_hardware(&self) -> bool {
        self.transport.is_some()
    }

    pub async fn sign_tx(&self, tx: &UnsignedTx, options: &SignOptions) -> Result<SignedTx, KeyError> {
        self.key.sign_tx(tx, options).await
    }

    /// Close the hardware transport, if any. A failed disconnect is logged only.
    pub async fn release(self) {
        if let Some((transport, device_id)) = self.transport {
            match transport.disconnect(&device_id).await {
                Ok(()) => log::debug!("Disconnected hardware signer {}", device_id),
                Err(e) => log::warn!("Failed to disconnect hardware signer {}: {}", device_id, e),
            }
        }
    }
}

/// Turns credentials into an [`AcquiredKey`]
#[async_trait]
pub trait KeyProvider: Send + Sync {
    async fn get_key(&self, credentials: &Credentials) -> Result<AcquiredKey, KeyError>;
}

/// Builds a signing key from decrypted private key bytes
pub type LocalKeyFactory = Arc<dyn Fn(Zeroizing<Vec<u8>>) -> Result<Arc<dyn SigningKey>, KeyError> + Send + Sync>;

/// Keys from the encrypted key store
pub struct LocalKeyProvider {
    store: Arc<KeyStore>,
    factory: LocalKeyFactory,
}

impl LocalKeyProvider {
    pub fn new(store: Arc<KeyStore>, factory: LocalKeyFactory) -> Self {
        Self { store, factory }
    }

    async fn unlock(&self, name: &str, password: &Zeroizing<String>) -> Result<AcquiredKey, KeyError> {
        let stored: StoredKey = self
            .store
            .get(name)
            .cloned()
            .ok_or_else(|| KeyError::NotFound(name.to_string()))?;
        let password = password.clone();

        // Argon2 is CPU bound
        let secret = tokio::task::spawn_blocking(move || stored.decrypt(&password))
            .await
            .map_err(|e| KeyError::Unavailable(format!("key decryption task failed: {}", e)))??;

        let key = (self.factory)(secret)?;
        Ok(AcquiredKey::local(key))
    }
}

#[async_trait]
impl KeyProvider for LocalKeyProvider {
    async fn get_key(&self, credentials: &Credentials) -> Result<AcquiredKey, KeyError> {
        match credentials {
            Credentials::Local { name, password } => self.unlock(name, password).await,
            Credentials::Hardware { .. } => Err(KeyError::Unavailable(
                "hardware credentials given to the local key provider".to_string(),
            )),
        }
    }
}

/// Keys on a hardware device
pub struct HardwareKeyProvider {
    transport: Arc<dyn HardwareTransport>,
}

impl HardwareKeyProvider {
    pub fn new(transport: Arc<dyn HardwareTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl KeyProvider for HardwareKeyProvider {
    async fn get_key(&self, credentials: &Credentials) -> Result<AcquiredKey, KeyError> {
        match credentials {
            Credentials::Hardware { device_id, path } => {
                let key = self.transport.open(device_id, *path).await?;
                log::debug!("Opened hardware signer {}", device_id);
                Ok(AcquiredKey::hardware(key, Arc::clone(&self.transport), device_id.clone()))
            }
            Credentials::Local { .. } => Err(KeyError::Unavailable(
                "local credentials given to the hardware key provider".to_string(),
            )),
        }
    }
}

/// Dispatches on the credential variant
#[derive(Default)]
pub struct WalletKeyProvider {
    local: Option<LocalKeyProvider>,
    hardware: Option<HardwareKeyProvider>,
}

impl WalletKeyProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_local(mut self, provider: LocalKeyProvider) -> Self {
        self.local = Some(provider);
        self
    }

    pub fn with_hardware(mut self, provider: HardwareKeyProvider) -> Self {
        self.hardware = Some(provider);
        self
    }
}

#[async_trait]
impl KeyProvider for WalletKeyProvider {
    async fn get_key(&self, credentials: &Credentials) -> Result<AcquiredKey, KeyError> {
        match credentials {
            Credentials::Local { .. } => match &self.local {
                Some(local) => local.get_key(credentials).await,
                None => Err(KeyError::Unavailable("no local key store configured".to_string())),
            },
            Credentials::Hardware { .. } => match &self.hardware {
                Some(hardware) => hardware.get_key(credentials).await,
                None => Err(KeyError::Unavailable("no hardware transport configured".to_string())),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    const MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    struct EchoKey {
        legacy: bool,
    }

    #[async_trait]
    impl SigningKey for EchoKey {
        fn requires_legacy_signing(&self) -> bool {
            self.legacy
        }

        async fn sign_tx(&self, _tx: &UnsignedTx, options: &SignOptions) -> Result<SignedTx, KeyError> {
            Ok(SignedTx::new(options.sequence.to_be_bytes().to_vec()))
        }
    }

    #[derive(Default)]
    struct CountingTransport {
        opened: AtomicUsize,
        closed: AtomicUsize,
    }

    #[async_trait]
    impl HardwareTransport for CountingTransport {
        async fn open(&self, _device_id: &str, _path: Option<u32>) -> Result<Arc<dyn SigningKey>, KeyError> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(EchoKey { legacy: true }))
        }

        async fn disconnect(&self, _device_id: &str) -> Result<(), KeyError> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn echo_factory() -> LocalKeyFactory {
        Arc::new(|secret: Zeroizing<Vec<u8>>| {
            if secret.len() != 32 {
                return Err(KeyError::InvalidKey("expected 32 bytes".to_string()));
            }
            Ok(Arc::new(EchoKey { legacy: false }) as Arc<dyn SigningKey>)
        })
    }

    #[tokio::test]
    async fn test_local_provider_unlocks_and_rejects_wrong_password() {
        let dir = tempdir().unwrap();
        let mut store = KeyStore::open(dir.path().join("keys.json")).unwrap();
        store.import_mnemonic("main", MNEMONIC, "hunter22").unwrap();

        let provider = LocalKeyProvider::new(Arc::new(store), echo_factory());

        let key = provider.get_key(&Credentials::local("main", "hunter22")).await.unwrap();
        assert!(!key.requires_legacy_signing());
        assert!(!key.is_hardware());

        let err = provider.get_key(&Credentials::local("main", "nope")).await.err().unwrap();
        assert!(matches!(err, KeyError::IncorrectPassword));
    }

    #[tokio::test]
    async fn test_hardware_key_release_disconnects() {
        let transport = Arc::new(CountingTransport::default());
        let provider = WalletKeyProvider::new().with_hardware(HardwareKeyProvider::new(transport.clone()));

        let key = provider.get_key(&Credentials::hardware("usb-1", Some(0))).await.unwrap();
        assert!(key.requires_legacy_signing());
        assert_eq!(transport.opened.load(Ordering::SeqCst), 1);

        key.release().await;
        assert_eq!(transport.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_provider_is_unavailable() {
        let provider = WalletKeyProvider::new();
        let err = provider.get_key(&Credentials::local("main", "pw")).await.err().unwrap();
        assert!(matches!(err, KeyError::Unavailable(_)));
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let debug = format!("{:?}", Credentials::local("main", "hunter22"));
        assert!(debug.contains("main"));
        assert!(!debug.contains("hunter22"));
    }
}
