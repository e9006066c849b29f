//! TLS 1.2 PRF and secure random using RustCrypto.

use rand::rngs::OsRng;
use rand::RngCore;

use crate::buffer::Buf;
use crate::crypto::provider::{PrfProvider, SecureRandom};
use crate::types::HashAlgorithm;

use super::hmac;

#[derive(Debug)]
pub(super) struct RustCryptoPrfProvider;

impl PrfProvider for RustCryptoPrfProvider {
    fn prf_tls12(
        &self,
        secret: &[u8],
        label: &str,
        seed: &[u8],
        out: &mut Buf,
        output_len: usize,
        hash: HashAlgorithm,
    ) -> Result<(), String> {
        if !label.is_ascii() {
            return Err(format!("PRF label must be ASCII: {:?}", label));
        }

        let mut full_seed = Buf::with_capacity(label.len() + seed.len());
        full_seed.extend_from_slice(label.as_bytes());
        full_seed.extend_from_slice(seed);

        hmac::p_hash(hash, secret, &full_seed, out, output_len)
    }
}

#[derive(Debug)]
pub(super) struct RustCryptoSecureRandom;

impl SecureRandom for RustCryptoSecureRandom {
    fn fill(&self, buf: &mut [u8]) -> Result<(), String> {
        OsRng
            .try_fill_bytes(buf)
            .map_err(|e| format!("OS random failed: {}", e))
    }
}

pub(super) static PRF_PROVIDER: RustCryptoPrfProvider = RustCryptoPrfProvider;

pub(super) static SECURE_RANDOM: RustCryptoSecureRandom = RustCryptoSecureRandom;
