//! Cipher suite implementations using RustCrypto.

use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes128Gcm, Aes256Gcm, Key};

use crate::buffer::Buf;
use crate::crypto::provider::{Cipher, KeyExchangeAlgorithm, SupportedCipherSuite};
use crate::crypto::{Aad, Nonce};
use crate::types::{CipherSuite, HashAlgorithm};

/// AES-GCM record cipher.
enum AesGcm {
    Aes128(Box<Aes128Gcm>),
    Aes256(Box<Aes256Gcm>),
}

impl std::fmt::Debug for AesGcm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AesGcm::Aes128(_) => f.debug_tuple("AesGcm::Aes128").finish(),
            AesGcm::Aes256(_) => f.debug_tuple("AesGcm::Aes256").finish(),
        }
    }
}

impl AesGcm {
    fn new(key: &[u8]) -> Result<Self, String> {
        match key.len() {
            16 => Ok(AesGcm::Aes128(Box::new(Aes128Gcm::new(
                Key::<Aes128Gcm>::from_slice(key),
            )))),
            32 => Ok(AesGcm::Aes256(Box::new(Aes256Gcm::new(
                Key::<Aes256Gcm>::from_slice(key),
            )))),
            _ => Err(format!("invalid AES-GCM key size: {}", key.len())),
        }
    }
}

impl Cipher for AesGcm {
    fn encrypt(&mut self, data: &mut Buf, aad: Aad, nonce: Nonce) -> Result<(), String> {
        let nonce = aes_gcm::Nonce::from_slice(&nonce.0);
        let res = match self {
            AesGcm::Aes128(c) => c.encrypt_in_place(nonce, &aad, data),
            AesGcm::Aes256(c) => c.encrypt_in_place(nonce, &aad, data),
        };
        res.map_err(|_| "AES-GCM encryption failed".to_string())
    }

    fn decrypt(&mut self, data: &mut Buf, aad: Aad, nonce: Nonce) -> Result<(), String> {
        if data.len() < 16 {
            return Err(format!("ciphertext too short: {}", data.len()));
        }
        let nonce = aes_gcm::Nonce::from_slice(&nonce.0);
        // The tag is stripped on success.
        let res = match self {
            AesGcm::Aes128(c) => c.decrypt_in_place(nonce, &aad, data),
            AesGcm::Aes256(c) => c.decrypt_in_place(nonce, &aad, data),
        };
        res.map_err(|_| "AES-GCM decryption failed".to_string())
    }
}

/// An ECDHE_ECDSA AES-GCM suite.
#[derive(Debug)]
struct EcdheEcdsaAesGcm {
    suite: CipherSuite,
    hash: HashAlgorithm,
    key_len: usize,
}

impl SupportedCipherSuite for EcdheEcdsaAesGcm {
    fn suite(&self) -> CipherSuite {
        self.suite
    }

    fn hash_algorithm(&self) -> HashAlgorithm {
        self.hash
    }

    fn key_lengths(&self) -> (usize, usize, usize) {
        (0, self.key_len, 4)
    }

    fn key_exchange_algorithm(&self) -> KeyExchangeAlgorithm {
        KeyExchangeAlgorithm::EcdheEcdsa
    }

    fn create_cipher(&self, key: &[u8]) -> Result<Box<dyn Cipher>, String> {
        Ok(Box::new(AesGcm::new(key)?))
    }
}

static AES_128_GCM_SHA256: EcdheEcdsaAesGcm = EcdheEcdsaAesGcm {
    suite: CipherSuite::ECDHE_ECDSA_AES128_GCM_SHA256,
    hash: HashAlgorithm::SHA256,
    key_len: 16,
};

static AES_256_GCM_SHA384: EcdheEcdsaAesGcm = EcdheEcdsaAesGcm {
    suite: CipherSuite::ECDHE_ECDSA_AES256_GCM_SHA384,
    hash: HashAlgorithm::SHA384,
    key_len: 32,
};

/// Supported suites in server preference order.
pub(super) static ALL_CIPHER_SUITES: &[&dyn SupportedCipherSuite] =
    &[&AES_128_GCM_SHA256, &AES_256_GCM_SHA384];
