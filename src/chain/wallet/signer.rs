use anyhow::Result;
use secp256k1::{ecdsa::Signature, Message, PublicKey, Secp256k1, SecretKey};
use sha2::{Digest, Sha256};

/// secp256k1 signer for Cosmos sign documents: SHA-256 digest, 64-byte
/// compact signature, no recovery byte
pub struct TransactionSigner {
    secp: Secp256k1<secp256k1::All>,
}

impl TransactionSigner {
    pub fn new() -> Self {
        Self {
            secp: Secp256k1::new(),
        }
    }

    /// Sign the serialized sign document (protobuf SignDoc or amino JSON)
    pub fn sign_bytes(&self, sign_doc: &[u8], private_key: &SecretKey) -> Result<[u8; 64]> {
        let digest: [u8; 32] = Sha256::digest(sign_doc).into();
        let message = Message::from_digest_slice(&digest)?;

        let signature = self.secp.sign_ecdsa(&message, private_key);
        Ok(signature.serialize_compact())
    }

    pub fn verify(&self, sign_doc: &[u8], signature: &[u8; 64], public_key: &PublicKey) -> bool {
        let digest: [u8; 32] = Sha256::digest(sign_doc).into();
        let (Ok(message), Ok(signature)) = (
            Message::from_digest_slice(&digest),
            Signature::from_compact(signature),
        ) else {
            return false;
        };

        self.secp.verify_ecdsa(&message, &signature, public_key).is_ok()
    }
}

impl Default for TransactionSigner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::wallet::TerraWallet;

    #[test]
    fn test_sign_and_verify() {
        let wallet = TerraWallet::from_mnemonic(
            "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about",
        )
        .unwrap();
        let key = wallet.private_key().unwrap();
        let public_key = PublicKey::from_slice(&wallet.public_key_bytes()).unwrap();
        let signer = TransactionSigner::new();

        let signature = signer.sign_bytes(b"sign doc", &key).unwrap();
        assert!(signer.verify(b"sign doc", &signature, &public_key));
        assert!(!signer.verify(b"other doc", &signature, &public_key));
    }

    #[test]
    fn test_signature_is_deterministic() {
        let key = SecretKey::from_slice(&[7u8; 32]).unwrap();
        let signer = TransactionSigner::default();
        assert_eq!(
            signer.sign_bytes(b"doc", &key).unwrap(),
            signer.sign_bytes(b"doc", &key).unwrap()
        );
    }
}
