//! Custodial key handling
//!
//! Generates per-user ed25519 signing keys and seals them with
//! ChaCha20-Poly1305 under a process-wide custody key. The sealed envelope
//! (`nonce_hex:ciphertext_hex`) is the only representation that ever reaches
//! the store; decryption happens at signing time and the result is never
//! cached. The AEAD tag guarantees a wrong or corrupted key fails loudly
//! instead of producing a usable-looking but wrong signing key.

use chacha20poly1305::{
    ChaCha20Poly1305, Nonce,
    aead::{Aead, KeyInit},
};
use ed25519_dalek::SigningKey;
use rand::Rng;
use rand::rngs::OsRng;
use thiserror::Error;

/// Custody failures. Always fatal for the requesting operation.
#[derive(Debug, Error)]
pub enum CustodyError {
    #[error("Custody key must be 64 hex characters (32 bytes)")]
    InvalidCipherKey,

    #[error("Encryption failed")]
    Encrypt,

    #[error("Decryption failed: wrong custody key or corrupted envelope")]
    Decrypt,

    #[error("Malformed key envelope")]
    MalformedEnvelope,
}

/// Sealed signing key plus its derived wallet address
#[derive(Debug, Clone)]
pub struct GeneratedWallet {
    /// `nonce_hex:ciphertext_hex` custody envelope
    pub encrypted_key: String,
    /// Hex-encoded 32-byte public key
    pub address: String,
}

/// Key custody service holding the process-wide symmetric cipher
pub struct KeyCustody {
    cipher: ChaCha20Poly1305,
}

impl KeyCustody {
    /// Build from the configured custody key (64 hex chars)
    pub fn new(cipher_key_hex: &str) -> Result<Self, CustodyError> {
        let key_bytes = hex::decode(cipher_key_hex.trim())
            .map_err(|_| CustodyError::InvalidCipherKey)?;
        if key_bytes.len() != 32 {
            return Err(CustodyError::InvalidCipherKey);
        }

        let cipher = ChaCha20Poly1305::new_from_slice(&key_bytes)
            .map_err(|_| CustodyError::InvalidCipherKey)?;
        Ok(Self { cipher })
    }

    /// Generate a fresh wallet: new keypair, sealed before it leaves this
    /// function.
    pub fn generate(&self) -> Result<GeneratedWallet, CustodyError> {
        let signing_key = SigningKey::generate(&mut OsRng);
        let address = Self::address_of(&signing_key);
        let encrypted_key = self.seal(&signing_key)?;

        Ok(GeneratedWallet {
            encrypted_key,
            address,
        })
    }

    /// Seal a signing key into a custody envelope
    pub fn seal(&self, signing_key: &SigningKey) -> Result<String, CustodyError> {
        let mut nonce_bytes = [0u8; 12];
        rand::thread_rng().fill(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, signing_key.to_bytes().as_slice())
            .map_err(|_| CustodyError::Encrypt)?;

        Ok(format!(
            "{}:{}",
            hex::encode(nonce_bytes),
            hex::encode(ciphertext)
        ))
    }

    /// Open a custody envelope back into the signing key.
    ///
    /// Invoked only at the moment a transfer must be signed.
    pub fn decrypt(&self, envelope: &str) -> Result<SigningKey, CustodyError> {
        let (nonce_hex, cipher_hex) = envelope
            .split_once(':')
            .ok_or(CustodyError::MalformedEnvelope)?;

        let nonce_bytes = hex::decode(nonce_hex).map_err(|_| CustodyError::MalformedEnvelope)?;
        let ciphertext = hex::decode(cipher_hex).map_err(|_| CustodyError::MalformedEnvelope)?;
        if nonce_bytes.len() != 12 {
            return Err(CustodyError::MalformedEnvelope);
        }

        let nonce = Nonce::from_slice(&nonce_bytes);
        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext.as_slice())
            .map_err(|_| CustodyError::Decrypt)?;

        let key_bytes: [u8; 32] = plaintext
            .as_slice()
            .try_into()
            .map_err(|_| CustodyError::Decrypt)?;
        Ok(SigningKey::from_bytes(&key_bytes))
    }

    /// Derive the wallet address from a signing key
    pub fn address_of(signing_key: &SigningKey) -> String {
        hex::encode(signing_key.verifying_key().to_bytes())
    }
}
