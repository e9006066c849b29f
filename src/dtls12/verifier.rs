//! Stateless cookie exchange (RFC 6347 4.2.1).

use std::fmt;

use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::crypto::CryptoProvider;
use crate::message::{ClientHello, Cookie};
use crate::Error;

const SECRET_LEN: usize = 32;

/// Issues and checks HelloVerifyRequest cookies.
///
/// A cookie is `HMAC-SHA256(secret, random || session_id || cipher_suites)`
/// of the ClientHello, so a client that resends the same hello with the
/// cookie passes without the server keeping any state in between.
pub struct HelloVerifier {
    provider: CryptoProvider,
    secret: Zeroizing<Vec<u8>>,
}

impl HelloVerifier {
    /// With a fresh random secret.
    pub fn new(provider: &CryptoProvider) -> Result<Self, Error> {
        let secret = provider.random_bytes(SECRET_LEN)?;
        Ok(Self::with_secret(provider, &secret))
    }

    /// With a known secret, e.g. shared by several servers.
    pub fn with_secret(provider: &CryptoProvider, secret: &[u8]) -> Self {
        HelloVerifier {
            provider: provider.clone(),
            secret: Zeroizing::new(secret.to_vec()),
        }
    }

    pub fn generate_cookie(&self, hello: &ClientHello) -> Result<Cookie, Error> {
        let mac = self
            .provider
            .hmac_provider
            .hmac_sha256(&self.secret, &hello.cookie_input())
            .map_err(|e| Error::internal_error(format!("cookie hmac: {}", e)))?;
        Cookie::try_new(&mac).map_err(|e| Error::internal_error(e.to_string()))
    }

    /// Whether the hello carries the cookie we would issue for it.
    pub fn verify_cookie(&self, hello: &ClientHello) -> Result<bool, Error> {
        if hello.cookie.is_empty() {
            return Ok(false);
        }
        let expected = self.generate_cookie(hello)?;
        Ok(expected[..].ct_eq(&hello.cookie[..]).into())
    }
}

impl fmt::Debug for HelloVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HelloVerifier").finish_non_exhaustive()
    }
}
