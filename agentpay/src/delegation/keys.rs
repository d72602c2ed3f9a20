//! Ephemeral secp256k1 session keys

use ethers::core::k256::ecdsa::SigningKey;
use ethers::types::Address;
use rand::rngs::OsRng;

use crate::crypto;
use crate::error::{Error, Result};

/// Session keypair held locally for the lifetime of one delegated session
#[derive(Clone)]
pub struct SessionKeypair {
    key: SigningKey,
}

impl std::fmt::Debug for SessionKeypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKeypair")
            .field("public_key", &self.public_key_hex())
            .finish_non_exhaustive()
    }
}

impl SessionKeypair {
    /// Fresh key from the OS CSPRNG. Called once per new session.
    pub fn generate() -> Self {
        Self {
            key: SigningKey::random(&mut OsRng),
        }
    }

    /// Restore from a hex private key (with or without 0x prefix)
    pub fn from_private_key_hex(private_key: &str) -> Result<Self> {
        let key_hex = private_key.strip_prefix("0x").unwrap_or(private_key);
        let key_bytes =
            hex::decode(key_hex).map_err(|e| Error::Encoding(format!("Invalid private key hex: {}", e)))?;
        let key = SigningKey::from_slice(&key_bytes)
            .map_err(|e| Error::Encoding(format!("Invalid private key: {}", e)))?;
        Ok(Self { key })
    }

    pub fn private_key_hex(&self) -> String {
        crypto::to_0x_hex(&self.key.to_bytes())
    }

    /// Uncompressed SEC1 public key (`0x04 ‖ X ‖ Y`)
    pub fn public_key_hex(&self) -> String {
        let point = self.key.verifying_key().to_encoded_point(false);
        crypto::to_0x_hex(point.as_bytes())
    }

    pub fn address(&self) -> Address {
        ethers::utils::secret_key_to_address(&self.key)
    }

    pub fn sign_hash(&self, hash: &[u8; 32]) -> Result<String> {
        crypto::sign_prehash(&self.key, hash)
    }
}
