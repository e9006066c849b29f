//! Cryptographic primitives and the pluggable provider boundary.

mod aead;
pub mod provider;

#[cfg(feature = "rust-crypto")]
pub mod rust_crypto;

pub use aead::{Aad, AeadRecordCipher, Nonce, NullRecordCipher, RecordCipher};
pub(crate) use aead::{Iv, DTLS_EXPLICIT_NONCE_LEN, FIXED_IV_LEN};

pub use provider::{ActiveKeyExchange, Cipher, CryptoProvider, CryptoSafe};
pub use provider::{HashContext, HashProvider, HmacProvider, KeyProvider};
pub use provider::{KeyExchangeAlgorithm, PrfProvider, SecureRandom};
pub use provider::{SignatureVerifier, SigningKey, SupportedCipherSuite, SupportedKxGroup};

pub use crate::types::{HashAlgorithm, NamedGroup, SignatureAlgorithm};
