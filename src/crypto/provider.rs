//! Cryptographic provider traits for pluggable crypto backends.
//!
//! The engine never performs cryptographic math itself. Every primitive it
//! needs is reached through one of the traits below, collected in a
//! [`CryptoProvider`] of static trait-object references.
//!
//! - **Cipher Suites** ([`SupportedCipherSuite`]): factory for AEAD [`Cipher`]s
//!   and, optionally, a custom [`KeyExchange`]
//! - **Key Exchange Groups** ([`SupportedKxGroup`]): factory for ephemeral ECDH
//! - **Signature Verification** ([`SignatureVerifier`])
//! - **Key Provider** ([`KeyProvider`]): parse private keys into [`SigningKey`]s
//! - **Secure Random** ([`SecureRandom`])
//! - **Hash Provider** ([`HashProvider`]): factory for [`HashContext`]s
//! - **PRF Provider** ([`PrfProvider`]): TLS 1.2 PRF
//! - **HMAC Provider** ([`HmacProvider`]): cookie MACs
//!
//! All traits require [`CryptoSafe`] so providers can be shared across
//! threads running independent connections.

use std::fmt::Debug;
use std::panic::{RefUnwindSafe, UnwindSafe};

use once_cell::sync::OnceCell;

use crate::buffer::Buf;
use crate::crypto::{Aad, Nonce};
use crate::dtls12::KeyExchange;
use crate::types::{CipherSuite, HashAlgorithm, NamedGroup};
use crate::types::{SignatureAlgorithm, SignatureAndHashAlgorithm};
use crate::Error;

/// Marker trait for types that are safe to use in crypto provider components.
pub trait CryptoSafe: Send + Sync + Debug + UnwindSafe + RefUnwindSafe {}

impl<T: Send + Sync + Debug + UnwindSafe + RefUnwindSafe> CryptoSafe for T {}

// ============================================================================
// Instance traits (created by factories)
// ============================================================================

/// AEAD cipher for in-place encryption/decryption.
pub trait Cipher: CryptoSafe {
    /// Encrypt plaintext in-place, appending the authentication tag.
    fn encrypt(&mut self, plaintext: &mut Buf, aad: Aad, nonce: Nonce) -> Result<(), String>;

    /// Decrypt ciphertext in-place, verifying and removing the tag.
    fn decrypt(&mut self, ciphertext: &mut Buf, aad: Aad, nonce: Nonce) -> Result<(), String>;

    /// Length of the authentication tag appended by `encrypt`.
    fn tag_len(&self) -> usize {
        16
    }
}

/// Stateful hash context for incremental hashing.
pub trait HashContext: CryptoSafe {
    fn update(&mut self, data: &[u8]);

    /// Finalize a copy of the context into `out`. The original keeps accumulating.
    fn clone_and_finalize(&self, out: &mut Buf);

    /// Independent copy of the running state.
    fn box_clone(&self) -> Box<dyn HashContext>;
}

/// Private key able to produce signatures.
pub trait SigningKey: CryptoSafe {
    /// Sign `data` (the signer hashes it with [`SigningKey::hash_algorithm`]).
    fn sign(&self, data: &[u8], out: &mut Buf) -> Result<(), String>;

    fn algorithm(&self) -> SignatureAlgorithm;

    fn hash_algorithm(&self) -> HashAlgorithm;

    fn signature_and_hash(&self) -> SignatureAndHashAlgorithm {
        SignatureAndHashAlgorithm::new(self.hash_algorithm(), self.algorithm())
    }
}

/// Ephemeral key pair for one handshake.
pub trait ActiveKeyExchange: CryptoSafe {
    fn pub_key(&self) -> &[u8];

    /// Complete the exchange with the peer's public key, writing the shared secret.
    fn complete(self: Box<Self>, peer_pub: &[u8], out: &mut Buf) -> Result<(), String>;

    fn group(&self) -> NamedGroup;
}

// ============================================================================
// Factory traits (referenced by CryptoProvider)
// ============================================================================

/// How a cipher suite establishes its pre-master secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyExchangeAlgorithm {
    /// Ephemeral ECDH signed with the server's ECDSA certificate key.
    EcdheEcdsa,
    /// The suite brings its own [`KeyExchange`] via
    /// [`SupportedCipherSuite::create_key_exchange`].
    Provided,
}

/// Cipher suite support.
pub trait SupportedCipherSuite: CryptoSafe {
    fn suite(&self) -> CipherSuite;

    /// PRF and verify-data hash.
    fn hash_algorithm(&self) -> HashAlgorithm;

    /// Key material lengths: (mac_key_len, enc_key_len, fixed_iv_len).
    fn key_lengths(&self) -> (usize, usize, usize);

    fn key_exchange_algorithm(&self) -> KeyExchangeAlgorithm;

    fn create_cipher(&self, key: &[u8]) -> Result<Box<dyn Cipher>, String>;

    /// Key exchange for [`KeyExchangeAlgorithm::Provided`] suites.
    fn create_key_exchange(&self) -> Option<Box<dyn KeyExchange>> {
        None
    }
}

/// Key exchange group support.
pub trait SupportedKxGroup: CryptoSafe {
    fn name(&self) -> NamedGroup;

    /// Generate an ephemeral key pair.
    fn start_exchange(&self) -> Result<Box<dyn ActiveKeyExchange>, String>;
}

/// Signature verification against certificates.
pub trait SignatureVerifier: CryptoSafe {
    /// Verify `signature` over `data` with the key in the DER certificate.
    fn verify_signature(
        &self,
        cert_der: &[u8],
        data: &[u8],
        signature: &[u8],
        hash_alg: HashAlgorithm,
        sig_alg: SignatureAlgorithm,
    ) -> Result<(), String>;

    /// Algorithms this verifier accepts, in preference order.
    fn supported_algorithms(&self) -> &'static [SignatureAndHashAlgorithm];
}

/// Private key parser.
pub trait KeyProvider: CryptoSafe {
    fn load_private_key(&self, key_der: &[u8]) -> Result<Box<dyn SigningKey>, String>;
}

/// Secure random number generator.
pub trait SecureRandom: CryptoSafe {
    fn fill(&self, buf: &mut [u8]) -> Result<(), String>;
}

/// Hash provider.
pub trait HashProvider: CryptoSafe {
    fn create_hash(&self, algorithm: HashAlgorithm) -> Result<Box<dyn HashContext>, String>;
}

/// TLS 1.2 PRF (RFC 5246 section 5).
pub trait PrfProvider: CryptoSafe {
    /// PRF(secret, label, seed) truncated to `output_len`, written to `out`.
    fn prf_tls12(
        &self,
        secret: &[u8],
        label: &str,
        seed: &[u8],
        out: &mut Buf,
        output_len: usize,
        hash: HashAlgorithm,
    ) -> Result<(), String>;
}

/// HMAC provider.
pub trait HmacProvider: CryptoSafe {
    fn hmac_sha256(&self, key: &[u8], data: &[u8]) -> Result<[u8; 32], String>;
}

// ============================================================================
// Core provider struct
// ============================================================================

/// Cryptographic provider for DTLS operations.
///
/// Holds static trait-object references, so copying it is cheap and dispatch
/// has no allocation. Cipher suite order is the server's preference order
/// and the client's offer order.
#[derive(Debug, Clone)]
pub struct CryptoProvider {
    pub cipher_suites: &'static [&'static dyn SupportedCipherSuite],
    pub kx_groups: &'static [&'static dyn SupportedKxGroup],
    pub signature_verification: &'static dyn SignatureVerifier,
    pub key_provider: &'static dyn KeyProvider,
    pub secure_random: &'static dyn SecureRandom,
    pub hash_provider: &'static dyn HashProvider,
    pub prf_provider: &'static dyn PrfProvider,
    pub hmac_provider: &'static dyn HmacProvider,
}

static DEFAULT: OnceCell<CryptoProvider> = OnceCell::new();

impl CryptoProvider {
    /// Install a process-wide default provider.
    ///
    /// Used by [`Config::builder`](crate::Config::builder) when no explicit
    /// provider is set. Returns the given provider back if one was already
    /// installed.
    pub fn install_default(provider: CryptoProvider) -> Result<(), CryptoProvider> {
        DEFAULT.set(provider)
    }

    /// The installed default provider, if any.
    pub fn get_default() -> Option<&'static CryptoProvider> {
        DEFAULT.get()
    }

    pub fn find_cipher_suite(
        &self,
        suite: CipherSuite,
    ) -> Option<&'static dyn SupportedCipherSuite> {
        self.cipher_suites.iter().copied().find(|s| s.suite() == suite)
    }

    pub fn find_kx_group(&self, group: NamedGroup) -> Option<&'static dyn SupportedKxGroup> {
        self.kx_groups.iter().copied().find(|g| g.name() == group)
    }

    /// Fill a fresh buffer of `len` random bytes.
    pub(crate) fn random_bytes(&self, len: usize) -> Result<Buf, Error> {
        let mut buf = Buf::new();
        buf.resize(len, 0);
        self.secure_random
            .fill(&mut buf)
            .map_err(|e| Error::internal_error(format!("random: {}", e)))?;
        Ok(buf)
    }

    /// Check the provider is usable for DTLS 1.2.
    pub fn validate(&self) -> Result<(), Error> {
        if self.cipher_suites.is_empty() {
            return Err(Error::ConfigError("provider has no cipher suites".into()));
        }
        for cs in self.cipher_suites {
            let suite = cs.suite();
            if suite.is_null() || suite.is_signaling() {
                return Err(Error::ConfigError(format!(
                    "provider offers non-cipher suite {:?}",
                    suite
                )));
            }
            if cs.key_exchange_algorithm() == KeyExchangeAlgorithm::EcdheEcdsa
                && self.kx_groups.is_empty()
            {
                return Err(Error::ConfigError(format!(
                    "{:?} needs at least one key exchange group",
                    suite
                )));
            }
            self.hash_provider
                .create_hash(cs.hash_algorithm())
                .map_err(|e| Error::ConfigError(format!("{:?}: {}", suite, e)))?;
        }
        Ok(())
    }
}
