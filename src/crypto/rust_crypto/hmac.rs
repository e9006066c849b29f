//! HMAC and the TLS 1.2 P_hash expansion using RustCrypto.

use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha384};

use crate::buffer::Buf;
use crate::crypto::provider::HmacProvider;
use crate::types::HashAlgorithm;

/// P_hash(secret, seed) from RFC 5246 section 5, truncated to `output_len`.
pub(super) fn p_hash(
    hash_alg: HashAlgorithm,
    secret: &[u8],
    seed: &[u8],
    out: &mut Buf,
    output_len: usize,
) -> Result<(), String> {
    match hash_alg {
        HashAlgorithm::SHA256 => expand::<Hmac<Sha256>>(secret, seed, out, output_len),
        HashAlgorithm::SHA384 => expand::<Hmac<Sha384>>(secret, seed, out, output_len),
        _ => Err(format!("unsupported PRF hash: {:?}", hash_alg)),
    }
}

fn expand<M: Mac + KeyInit + Clone>(
    secret: &[u8],
    seed: &[u8],
    out: &mut Buf,
    output_len: usize,
) -> Result<(), String> {
    let keyed = <M as KeyInit>::new_from_slice(secret).map_err(|_| "invalid HMAC key")?;
    out.clear();

    // A(1) = HMAC(secret, seed)
    let mut a = keyed.clone().chain_update(seed).finalize().into_bytes();

    while out.len() < output_len {
        let chunk = keyed
            .clone()
            .chain_update(&a)
            .chain_update(seed)
            .finalize()
            .into_bytes();
        let take = (output_len - out.len()).min(chunk.len());
        out.extend_from_slice(&chunk[..take]);

        a = keyed.clone().chain_update(&a).finalize().into_bytes();
    }

    Ok(())
}

#[derive(Debug)]
pub(super) struct RustCryptoHmacProvider;

impl HmacProvider for RustCryptoHmacProvider {
    fn hmac_sha256(&self, key: &[u8], data: &[u8]) -> Result<[u8; 32], String> {
        let mac = <Hmac<Sha256> as KeyInit>::new_from_slice(key)
            .map_err(|_| "invalid HMAC key".to_string())?;
        let bytes = mac.chain_update(data).finalize().into_bytes();

        let mut output = [0u8; 32];
        output.copy_from_slice(&bytes);
        Ok(output)
    }
}

pub(super) static HMAC_PROVIDER: RustCryptoHmacProvider = RustCryptoHmacProvider;
