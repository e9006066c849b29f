//! ECDSA signing, key loading and certificate signature verification.

use std::str;

use der::Decode;
use p256::ecdsa::{Signature as P256Signature, SigningKey as P256SigningKey};
use p256::ecdsa::VerifyingKey as P256VerifyingKey;
use p384::ecdsa::{Signature as P384Signature, SigningKey as P384SigningKey};
use p384::ecdsa::VerifyingKey as P384VerifyingKey;
use pkcs8::DecodePrivateKey;
use sha2::{Digest, Sha256, Sha384};
use signature::hazmat::{PrehashSigner, PrehashVerifier};
use spki::ObjectIdentifier;
use x509_cert::Certificate as X509Certificate;

use crate::buffer::Buf;
use crate::crypto::provider::{KeyProvider, SignatureVerifier, SigningKey};
use crate::types::{HashAlgorithm, SignatureAlgorithm, SignatureAndHashAlgorithm};

const OID_EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
const OID_P256: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.3.1.7");
const OID_P384: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.34");

fn prehash(hash_alg: HashAlgorithm, data: &[u8]) -> Result<Vec<u8>, String> {
    match hash_alg {
        HashAlgorithm::SHA256 => Ok(Sha256::digest(data).to_vec()),
        HashAlgorithm::SHA384 => Ok(Sha384::digest(data).to_vec()),
        _ => Err(format!("unsupported signature hash: {:?}", hash_alg)),
    }
}

/// ECDSA private key. P-256 signs with SHA-256, P-384 with SHA-384.
enum EcdsaSigningKey {
    P256(P256SigningKey),
    P384(P384SigningKey),
}

impl std::fmt::Debug for EcdsaSigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EcdsaSigningKey::P256(_) => f.debug_tuple("EcdsaSigningKey::P256").finish(),
            EcdsaSigningKey::P384(_) => f.debug_tuple("EcdsaSigningKey::P384").finish(),
        }
    }
}

impl SigningKey for EcdsaSigningKey {
    fn sign(&self, data: &[u8], out: &mut Buf) -> Result<(), String> {
        let digest = prehash(self.hash_algorithm(), data)?;
        out.clear();
        match self {
            EcdsaSigningKey::P256(key) => {
                let sig: P256Signature = key
                    .sign_prehash(&digest)
                    .map_err(|_| "P-256 signing failed".to_string())?;
                out.extend_from_slice(sig.to_der().as_bytes());
            }
            EcdsaSigningKey::P384(key) => {
                let sig: P384Signature = key
                    .sign_prehash(&digest)
                    .map_err(|_| "P-384 signing failed".to_string())?;
                out.extend_from_slice(sig.to_der().as_bytes());
            }
        }
        Ok(())
    }

    fn algorithm(&self) -> SignatureAlgorithm {
        SignatureAlgorithm::ECDSA
    }

    fn hash_algorithm(&self) -> HashAlgorithm {
        match self {
            EcdsaSigningKey::P256(_) => HashAlgorithm::SHA256,
            EcdsaSigningKey::P384(_) => HashAlgorithm::SHA384,
        }
    }
}

/// Loads PKCS#8 DER, SEC1 DER, or either of those PEM encoded.
#[derive(Debug)]
pub(super) struct RustCryptoKeyProvider;

impl KeyProvider for RustCryptoKeyProvider {
    fn load_private_key(&self, key_der: &[u8]) -> Result<Box<dyn SigningKey>, String> {
        if let Ok(key) = P256SigningKey::from_pkcs8_der(key_der) {
            return Ok(Box::new(EcdsaSigningKey::P256(key)));
        }
        if let Ok(key) = P384SigningKey::from_pkcs8_der(key_der) {
            return Ok(Box::new(EcdsaSigningKey::P384(key)));
        }

        if let Ok(ec_key) = sec1::EcPrivateKey::try_from(key_der) {
            let curve = match &ec_key.parameters {
                Some(sec1::EcParameters::NamedCurve(oid)) => Some(*oid),
                None if ec_key.private_key.len() == 32 => Some(OID_P256),
                None if ec_key.private_key.len() == 48 => Some(OID_P384),
                None => None,
            };
            match curve {
                Some(OID_P256) => {
                    let key = P256SigningKey::from_slice(ec_key.private_key)
                        .map_err(|_| "invalid P-256 private key".to_string())?;
                    return Ok(Box::new(EcdsaSigningKey::P256(key)));
                }
                Some(OID_P384) => {
                    let key = P384SigningKey::from_slice(ec_key.private_key)
                        .map_err(|_| "invalid P-384 private key".to_string())?;
                    return Ok(Box::new(EcdsaSigningKey::P384(key)));
                }
                Some(oid) => return Err(format!("unsupported EC curve: {}", oid)),
                None => {}
            }
        }

        if let Ok(pem_str) = str::from_utf8(key_der) {
            if pem_str.contains("-----BEGIN") {
                if let Ok((_label, doc)) = pkcs8::Document::from_pem(pem_str) {
                    return self.load_private_key(doc.as_bytes());
                }
            }
        }

        Err("failed to parse private key in any supported format".to_string())
    }
}

/// Verifies ECDSA signatures with the public key of an X.509 certificate.
#[derive(Debug)]
pub(super) struct RustCryptoSignatureVerifier;

static SUPPORTED_ALGORITHMS: &[SignatureAndHashAlgorithm] = &[
    SignatureAndHashAlgorithm::ECDSA_SHA256,
    SignatureAndHashAlgorithm::ECDSA_SHA384,
];

impl SignatureVerifier for RustCryptoSignatureVerifier {
    fn verify_signature(
        &self,
        cert_der: &[u8],
        data: &[u8],
        signature: &[u8],
        hash_alg: HashAlgorithm,
        sig_alg: SignatureAlgorithm,
    ) -> Result<(), String> {
        if sig_alg != SignatureAlgorithm::ECDSA {
            return Err(format!("unsupported signature algorithm: {:?}", sig_alg));
        }

        let cert = X509Certificate::from_der(cert_der)
            .map_err(|e| format!("failed to parse certificate: {e}"))?;
        let spki = &cert.tbs_certificate.subject_public_key_info;

        if spki.algorithm.oid != OID_EC_PUBLIC_KEY {
            return Err(format!(
                "unsupported public key algorithm: {}",
                spki.algorithm.oid
            ));
        }

        let pubkey_bytes = spki
            .subject_public_key
            .as_bytes()
            .ok_or_else(|| "invalid EC subject_public_key bitstring".to_string())?;

        let curve_oid: ObjectIdentifier = spki
            .algorithm
            .parameters
            .as_ref()
            .ok_or("missing EC curve parameter in certificate")?
            .decode_as()
            .map_err(|_| "invalid EC curve parameter in certificate".to_string())?;

        let digest = prehash(hash_alg, data)?;

        match curve_oid {
            OID_P256 => {
                let key = P256VerifyingKey::from_sec1_bytes(pubkey_bytes)
                    .map_err(|_| "invalid P-256 public key".to_string())?;
                let sig = P256Signature::from_der(signature)
                    .map_err(|_| "invalid signature encoding".to_string())?;
                key.verify_prehash(&digest, &sig)
                    .map_err(|_| format!("ECDSA verification failed ({:?})", hash_alg))
            }
            OID_P384 => {
                let key = P384VerifyingKey::from_sec1_bytes(pubkey_bytes)
                    .map_err(|_| "invalid P-384 public key".to_string())?;
                let sig = P384Signature::from_der(signature)
                    .map_err(|_| "invalid signature encoding".to_string())?;
                key.verify_prehash(&digest, &sig)
                    .map_err(|_| format!("ECDSA verification failed ({:?})", hash_alg))
            }
            _ => Err(format!("unsupported EC curve: {}", curve_oid)),
        }
    }

    fn supported_algorithms(&self) -> &'static [SignatureAndHashAlgorithm] {
        SUPPORTED_ALGORITHMS
    }
}

pub(super) static KEY_PROVIDER: RustCryptoKeyProvider = RustCryptoKeyProvider;

pub(super) static SIGNATURE_VERIFIER: RustCryptoSignatureVerifier = RustCryptoSignatureVerifier;
