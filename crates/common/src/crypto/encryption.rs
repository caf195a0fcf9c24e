//! AES-256-GCM encryption with a versioned key ring.
//!
//! Access and refresh tokens are encrypted before they reach persistent
//! storage. Every ciphertext records the key version that produced it, so
//! rotating to a new key only requires adding a version to the ring: new
//! writes use the newest key, old rows stay decryptable until rewritten.
//!
//! ## Usage
//!
//! ```rust
//! use postbridge_common::crypto::EncryptionService;
//!
//! let key = EncryptionService::generate_key();
//! let service = EncryptionService::new(vec![(1, key)])?;
//!
//! let ciphertext = service.encrypt_to_string(b"sensitive token")?;
//! let plaintext = service.decrypt_from_string(&ciphertext)?;
//! assert_eq!(plaintext, b"sensitive token");
//! # Ok::<(), postbridge_common::CommonError>(())
//! ```

use std::collections::BTreeMap;

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::{CommonError, CommonResult};

const ALGORITHM: &str = "AES-256-GCM";

/// Serializable encrypted payload.
///
/// `key_version` selects the ring entry used for decryption.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedData {
    pub key_version: u32,
    pub nonce: Vec<u8>,
    pub ciphertext: Vec<u8>,
    pub algorithm: String,
}

/// AES-256-GCM encryption service over a versioned key ring.
///
/// Encrypts with the highest version in the ring; decrypts with whichever
/// version the payload names.
pub struct EncryptionService {
    ciphers: BTreeMap<u32, Aes256Gcm>,
    active_version: u32,
}

impl std::fmt::Debug for EncryptionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionService")
            .field("versions", &self.ciphers.keys().collect::<Vec<_>>())
            .field("active_version", &self.active_version)
            .finish()
    }
}

impl EncryptionService {
    /// Create a service from `(version, 32-byte key)` pairs.
    ///
    /// # Errors
    /// Fails when the ring is empty, a version repeats, or a key is not
    /// exactly 32 bytes.
    pub fn new(keys: Vec<(u32, Vec<u8>)>) -> CommonResult<Self> {
        if keys.is_empty() {
            return Err(CommonError::crypto("key ring must not be empty"));
        }

        let mut ciphers = BTreeMap::new();
        for (version, key) in keys {
            if key.len() != 32 {
                return Err(CommonError::crypto(format!(
                    "key v{version} must be exactly 32 bytes, got {}",
                    key.len()
                )));
            }
            let cipher = Aes256Gcm::new_from_slice(&key)
                .map_err(|e| CommonError::crypto(format!("failed to build cipher: {e}")))?;
            if ciphers.insert(version, cipher).is_some() {
                return Err(CommonError::crypto(format!("duplicate key version {version}")));
            }
        }

        // BTreeMap keeps versions ordered; the newest is active.
        let active_version = *ciphers
            .keys()
            .next_back()
            .ok_or_else(|| CommonError::crypto("key ring must not be empty"))?;

        Ok(Self { ciphers, active_version })
    }

    /// Generate a random 32-byte symmetric key.
    #[must_use]
    pub fn generate_key() -> Vec<u8> {
        let mut key = vec![0u8; 32];
        rand::thread_rng().fill_bytes(&mut key);
        key
    }

    /// Version used for new ciphertexts.
    #[must_use]
    pub fn active_version(&self) -> u32 {
        self.active_version
    }

    /// Encrypt bytes into an [`EncryptedData`] payload with the active key.
    pub fn encrypt(&self, data: &[u8]) -> CommonResult<EncryptedData> {
        let cipher = self
            .ciphers
            .get(&self.active_version)
            .ok_or_else(|| CommonError::crypto("active cipher missing"))?;

        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, data)
            .map_err(|e| CommonError::crypto(format!("encryption failed: {e}")))?;

        Ok(EncryptedData {
            key_version: self.active_version,
            nonce: nonce.to_vec(),
            ciphertext,
            algorithm: ALGORITHM.to_string(),
        })
    }

    /// Decrypt an [`EncryptedData`] payload back into raw bytes.
    pub fn decrypt(&self, encrypted: &EncryptedData) -> CommonResult<Vec<u8>> {
        if encrypted.algorithm != ALGORITHM {
            return Err(CommonError::crypto(format!(
                "unsupported algorithm: {}",
                encrypted.algorithm
            )));
        }

        let cipher = self.ciphers.get(&encrypted.key_version).ok_or_else(|| {
            CommonError::crypto(format!("no key for version {}", encrypted.key_version))
        })?;

        let nonce_array: [u8; 12] = encrypted
            .nonce
            .as_slice()
            .try_into()
            .map_err(|_| CommonError::crypto("nonce must be exactly 12 bytes"))?;

        cipher
            .decrypt(&Nonce::from(nonce_array), encrypted.ciphertext.as_ref())
            .map_err(|e| CommonError::crypto(format!("decryption failed: {e}")))
    }

    /// Encrypt bytes and encode the payload as a single base64 string.
    pub fn encrypt_to_string(&self, data: &[u8]) -> CommonResult<String> {
        let encrypted = self.encrypt(data)?;
        let serialized = serde_json::to_vec(&encrypted)
            .map_err(|e| CommonError::encoding(format!("payload serialization failed: {e}")))?;
        Ok(BASE64.encode(serialized))
    }

    /// Decode a base64 string and decrypt the contained payload.
    pub fn decrypt_from_string(&self, encrypted_str: &str) -> CommonResult<Vec<u8>> {
        let decoded = BASE64
            .decode(encrypted_str)
            .map_err(|e| CommonError::encoding(format!("base64 decode failed: {e}")))?;
        let encrypted: EncryptedData = serde_json::from_slice(&decoded)
            .map_err(|e| CommonError::encoding(format!("payload parse failed: {e}")))?;
        self.decrypt(&encrypted)
    }
}
