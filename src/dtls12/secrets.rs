//! TLS 1.2 key derivation (RFC 5246 section 6.3 and 8.1, RFC 7627).

use zeroize::Zeroizing;

use crate::buffer::Buf;
use crate::crypto::{AeadRecordCipher, CryptoProvider, Iv, SupportedCipherSuite};
use crate::message::{Random, VERIFY_DATA_LEN};
use crate::types::{ConnectionEnd, HashAlgorithm};
use crate::Error;

pub(crate) const MASTER_SECRET_LEN: usize = 48;

fn prf(
    provider: &CryptoProvider,
    secret: &[u8],
    label: &str,
    seed: &[u8],
    len: usize,
    hash: HashAlgorithm,
) -> Result<Zeroizing<Vec<u8>>, Error> {
    let mut out = Buf::with_capacity(len);
    provider
        .prf_provider
        .prf_tls12(secret, label, seed, &mut out, len, hash)
        .map_err(|e| Error::internal_error(format!("prf {}: {}", label, e)))?;
    if out.len() != len {
        return Err(Error::internal_error(format!("prf {} returned {} bytes", label, out.len())));
    }
    Ok(Zeroizing::new(out.into_vec()))
}

/// The 48 byte master secret.
///
/// With Extended Master Secret the seed is the session hash, otherwise the
/// two randoms.
pub(crate) fn master_secret(
    provider: &CryptoProvider,
    pre_master_secret: &[u8],
    hash: HashAlgorithm,
    extended: Option<&[u8]>,
    client_random: &Random,
    server_random: &Random,
) -> Result<Zeroizing<Vec<u8>>, Error> {
    match extended {
        Some(session_hash) => prf(
            provider,
            pre_master_secret,
            "extended master secret",
            session_hash,
            MASTER_SECRET_LEN,
            hash,
        ),
        None => {
            let mut seed = [0u8; 64];
            seed[..32].copy_from_slice(&client_random.0);
            seed[32..].copy_from_slice(&server_random.0);
            prf(provider, pre_master_secret, "master secret", &seed, MASTER_SECRET_LEN, hash)
        }
    }
}

/// Finished verify_data over the transcript hash.
pub(crate) fn verify_data(
    provider: &CryptoProvider,
    master_secret: &[u8],
    sender: ConnectionEnd,
    handshake_hash: &[u8],
    hash: HashAlgorithm,
) -> Result<Vec<u8>, Error> {
    let label = match sender {
        ConnectionEnd::Client => "client finished",
        ConnectionEnd::Server => "server finished",
    };
    let out = prf(provider, master_secret, label, handshake_hash, VERIFY_DATA_LEN, hash)?;
    Ok(out.to_vec())
}

/// Expand the key block and build the record cipher `entity` uses.
///
/// The key block is laid out as client MAC key, server MAC key, client
/// write key, server write key, client IV, server IV.
pub(crate) fn record_cipher(
    provider: &CryptoProvider,
    suite: &dyn SupportedCipherSuite,
    master_secret: &[u8],
    client_random: &Random,
    server_random: &Random,
    entity: ConnectionEnd,
) -> Result<AeadRecordCipher, Error> {
    let (mac_len, key_len, iv_len) = suite.key_lengths();
    let total = 2 * (mac_len + key_len + iv_len);

    let mut seed = [0u8; 64];
    seed[..32].copy_from_slice(&server_random.0);
    seed[32..].copy_from_slice(&client_random.0);
    let block = prf(
        provider,
        master_secret,
        "key expansion",
        &seed,
        total,
        suite.hash_algorithm(),
    )?;

    let keys = &block[2 * mac_len..];
    let (client_key, rest) = keys.split_at(key_len);
    let (server_key, rest) = rest.split_at(key_len);
    let (client_iv, rest) = rest.split_at(iv_len);
    let server_iv = &rest[..iv_len];

    let cipher = |key: &[u8]| {
        suite
            .create_cipher(key)
            .map_err(|e| Error::internal_error(format!("cipher: {}", e)))
    };
    let iv = |iv: &[u8]| {
        Iv::new(iv).ok_or_else(|| Error::internal_error(format!("iv length {}", iv.len())))
    };

    let client = (cipher(client_key)?, iv(client_iv)?);
    let server = (cipher(server_key)?, iv(server_iv)?);
    let ((write, write_iv), (read, read_iv)) = match entity {
        ConnectionEnd::Client => (client, server),
        ConnectionEnd::Server => (server, client),
    };
    Ok(AeadRecordCipher::new(write, write_iv, read, read_iv))
}
