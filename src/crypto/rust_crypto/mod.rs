//! Pure Rust crypto provider built on the [RustCrypto](https://github.com/RustCrypto) crates.
//!
//! Enabled by the `rust-crypto` feature, which is on by default. It is the
//! provider of last resort when a [`Config`](crate::Config) names none and no
//! process default has been installed.
//!
//! ```
//! use dtls_engine::Config;
//! use dtls_engine::crypto::rust_crypto;
//!
//! let config = Config::builder()
//!     .crypto_provider(rust_crypto::default_provider())
//!     .build()
//!     .unwrap();
//! # let _ = config;
//! ```

mod cipher_suite;
mod hash;
mod hmac;
mod kx_group;
mod sign;
mod tls12;

use crate::crypto::provider::CryptoProvider;

/// The RustCrypto-based provider.
///
/// # Cipher suites
///
/// - `TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256` (0xC02B)
/// - `TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384` (0xC02C)
///
/// # Key exchange groups
///
/// X25519, secp256r1 and secp384r1, in that order of preference.
///
/// # Keys
///
/// ECDSA private keys in PKCS#8 or SEC1, DER or PEM.
pub fn default_provider() -> CryptoProvider {
    CryptoProvider {
        cipher_suites: cipher_suite::ALL_CIPHER_SUITES,
        kx_groups: kx_group::ALL_KX_GROUPS,
        signature_verification: &sign::SIGNATURE_VERIFIER,
        key_provider: &sign::KEY_PROVIDER,
        secure_random: &tls12::SECURE_RANDOM,
        hash_provider: &hash::HASH_PROVIDER,
        prf_provider: &tls12::PRF_PROVIDER,
        hmac_provider: &hmac::HMAC_PROVIDER,
    }
}
