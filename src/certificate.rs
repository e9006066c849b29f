//! Certificate chains, local credentials and self-signed certificate generation.

use std::fmt;
use std::sync::Arc;

use crate::crypto::{CryptoProvider, SigningKey};
use crate::Error;

/// Opaque DER certificates, leaf first.
///
/// The engine never interprets the certificates beyond handing the leaf to
/// the provider's signature verifier.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CertificateChain {
    certs: Vec<Vec<u8>>,
}

impl CertificateChain {
    pub fn new(certs: Vec<Vec<u8>>) -> Self {
        CertificateChain { certs }
    }

    /// The empty chain, meaning "no certificate".
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.certs.is_empty()
    }

    /// The end-entity certificate.
    pub fn leaf(&self) -> Option<&[u8]> {
        self.certs.first().map(|c| c.as_slice())
    }

    pub fn certs(&self) -> &[Vec<u8>] {
        &self.certs
    }
}

impl fmt::Debug for CertificateChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lens: Vec<usize> = self.certs.iter().map(|c| c.len()).collect();
        f.debug_tuple("CertificateChain").field(&lens).finish()
    }
}

/// A certificate chain and the private key of its leaf.
#[derive(Clone)]
pub struct Credentials {
    chain: CertificateChain,
    signer: Arc<dyn SigningKey>,
}

impl Credentials {
    pub fn new(chain: CertificateChain, signer: Arc<dyn SigningKey>) -> Self {
        Credentials { chain, signer }
    }

    /// Load a single certificate and its private key with the provider's
    /// [`KeyProvider`](crate::crypto::KeyProvider).
    pub fn from_der(
        provider: &CryptoProvider,
        certificate: &[u8],
        private_key: &[u8],
    ) -> Result<Self, Error> {
        if certificate.is_empty() {
            return Err(Error::InvalidArgument("empty certificate".into()));
        }
        let signer = provider
            .key_provider
            .load_private_key(private_key)
            .map_err(Error::InvalidArgument)?;
        Ok(Credentials {
            chain: CertificateChain::new(vec![certificate.to_vec()]),
            signer: Arc::from(signer),
        })
    }

    pub fn chain(&self) -> &CertificateChain {
        &self.chain
    }

    pub fn signer(&self) -> &dyn SigningKey {
        &*self.signer
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("chain", &self.chain)
            .field("signer", &self.signer.signature_and_hash())
            .finish()
    }
}

#[cfg(feature = "rcgen")]
pub use self::generate::{generate_self_signed_certificate, DtlsCertificate};

#[cfg(feature = "rcgen")]
mod generate {
    use std::fmt;

    use rcgen::{Certificate as RcgenCertificate, CertificateParams, DistinguishedName};
    use rcgen::{DnType, IsCa, KeyPair, PKCS_ECDSA_P256_SHA256};

    use super::Credentials;
    use crate::crypto::CryptoProvider;
    use crate::Error;

    /// Certificate and private key pair, both DER.
    #[derive(Clone)]
    pub struct DtlsCertificate {
        pub certificate: Vec<u8>,
        pub private_key: Vec<u8>,
    }

    impl DtlsCertificate {
        pub fn credentials(&self, provider: &CryptoProvider) -> Result<Credentials, Error> {
            Credentials::from_der(provider, &self.certificate, &self.private_key)
        }
    }

    impl fmt::Debug for DtlsCertificate {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("DtlsCertificate")
                .field("certificate", &self.certificate.len())
                .field("private_key", &self.private_key.len())
                .finish()
        }
    }

    /// Generate a self-signed ECDSA P-256 certificate valid for one year.
    pub fn generate_self_signed_certificate(common_name: &str) -> Result<DtlsCertificate, Error> {
        let failed = |e: rcgen::RcgenError| Error::InvalidArgument(format!("rcgen: {}", e));

        let key_pair = KeyPair::generate(&PKCS_ECDSA_P256_SHA256).map_err(failed)?;

        let mut params = CertificateParams::new(vec![common_name.to_string()]);
        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, common_name.to_string());
        params.distinguished_name = dn;
        params.is_ca = IsCa::NoCa;
        params.alg = &PKCS_ECDSA_P256_SHA256;
        params.key_pair = Some(key_pair);

        let not_before = time::OffsetDateTime::now_utc();
        params.not_before = not_before;
        params.not_after = not_before + time::Duration::days(365);

        let cert = RcgenCertificate::from_params(params).map_err(failed)?;

        Ok(DtlsCertificate {
            certificate: cert.serialize_der().map_err(failed)?,
            private_key: cert.serialize_private_key_der(),
        })
    }
}
