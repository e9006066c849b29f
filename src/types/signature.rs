use nom::number::complete::be_u16;
use nom::IResult;

u8_registry! {
    /// TLS 1.2 HashAlgorithm (RFC 5246 7.4.1.4.1).
    pub enum HashAlgorithm {
        None => 0,
        MD5 => 1,
        SHA1 => 2,
        SHA224 => 3,
        SHA256 => 4,
        SHA384 => 5,
        SHA512 => 6,
    }
}

impl Default for HashAlgorithm {
    fn default() -> Self {
        Self::Unknown(0)
    }
}

impl HashAlgorithm {
    /// Digest length in bytes, 0 when not a digest we know.
    pub fn output_len(&self) -> usize {
        match self {
            HashAlgorithm::MD5 => 16,
            HashAlgorithm::SHA1 => 20,
            HashAlgorithm::SHA224 => 28,
            HashAlgorithm::SHA256 => 32,
            HashAlgorithm::SHA384 => 48,
            HashAlgorithm::SHA512 => 64,
            _ => 0,
        }
    }
}

u8_registry! {
    pub enum SignatureAlgorithm {
        Anonymous => 0,
        RSA => 1,
        DSA => 2,
        ECDSA => 3,
    }
}

impl Default for SignatureAlgorithm {
    fn default() -> Self {
        Self::Unknown(0)
    }
}

u8_registry! {
    /// Certificate types a server may ask for in a CertificateRequest.
    #[allow(non_camel_case_types)]
    #[derive(Default)]
    pub enum ClientCertificateType {
        RSA_SIGN => 1,
        DSS_SIGN => 2,
        #[default]
        ECDSA_SIGN => 64,
    }
}

/// A `SignatureAndHashAlgorithm` pair, on the wire as hash byte then
/// signature byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SignatureAndHashAlgorithm {
    pub hash: HashAlgorithm,
    pub signature: SignatureAlgorithm,
}

impl SignatureAndHashAlgorithm {
    pub const ECDSA_SHA256: SignatureAndHashAlgorithm =
        SignatureAndHashAlgorithm::new(HashAlgorithm::SHA256, SignatureAlgorithm::ECDSA);

    pub const ECDSA_SHA384: SignatureAndHashAlgorithm =
        SignatureAndHashAlgorithm::new(HashAlgorithm::SHA384, SignatureAlgorithm::ECDSA);

    pub const fn new(hash: HashAlgorithm, signature: SignatureAlgorithm) -> Self {
        SignatureAndHashAlgorithm { hash, signature }
    }

    pub fn from_u16(value: u16) -> Self {
        let [hash, signature] = value.to_be_bytes();
        SignatureAndHashAlgorithm::new(
            HashAlgorithm::from_u8(hash),
            SignatureAlgorithm::from_u8(signature),
        )
    }

    pub fn as_u16(&self) -> u16 {
        u16::from_be_bytes([self.hash.as_u8(), self.signature.as_u8()])
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], SignatureAndHashAlgorithm> {
        let (input, value) = be_u16(input)?;
        Ok((input, SignatureAndHashAlgorithm::from_u16(value)))
    }
}
