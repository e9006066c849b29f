use nom::number::complete::be_u16;
use nom::IResult;

use super::ProtocolVersion;

/// TLS cipher suite identifier.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CipherSuite {
    TLS_NULL_WITH_NULL_NULL,                 // 0x0000
    TLS_RSA_WITH_AES_128_CBC_SHA,            // 0x002F
    TLS_RSA_WITH_AES_256_CBC_SHA,            // 0x0035
    TLS_EMPTY_RENEGOTIATION_INFO_SCSV,       // 0x00FF
    TLS_FALLBACK_SCSV,                       // 0x5600
    ECDHE_ECDSA_AES128_GCM_SHA256,           // 0xC02B
    ECDHE_ECDSA_AES256_GCM_SHA384,           // 0xC02C
    ECDHE_ECDSA_CHACHA20_POLY1305_SHA256,    // 0xCCA9
    Unknown(u16),
}

impl CipherSuite {
    pub fn from_u16(value: u16) -> Self {
        use CipherSuite::*;
        match value {
            0x0000 => TLS_NULL_WITH_NULL_NULL,
            0x002F => TLS_RSA_WITH_AES_128_CBC_SHA,
            0x0035 => TLS_RSA_WITH_AES_256_CBC_SHA,
            0x00FF => TLS_EMPTY_RENEGOTIATION_INFO_SCSV,
            0x5600 => TLS_FALLBACK_SCSV,
            0xC02B => ECDHE_ECDSA_AES128_GCM_SHA256,
            0xC02C => ECDHE_ECDSA_AES256_GCM_SHA384,
            0xCCA9 => ECDHE_ECDSA_CHACHA20_POLY1305_SHA256,
            _ => Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        use CipherSuite::*;
        match self {
            TLS_NULL_WITH_NULL_NULL => 0x0000,
            TLS_RSA_WITH_AES_128_CBC_SHA => 0x002F,
            TLS_RSA_WITH_AES_256_CBC_SHA => 0x0035,
            TLS_EMPTY_RENEGOTIATION_INFO_SCSV => 0x00FF,
            TLS_FALLBACK_SCSV => 0x5600,
            ECDHE_ECDSA_AES128_GCM_SHA256 => 0xC02B,
            ECDHE_ECDSA_AES256_GCM_SHA384 => 0xC02C,
            ECDHE_ECDSA_CHACHA20_POLY1305_SHA256 => 0xCCA9,
            Unknown(value) => *value,
        }
    }

    /// Signaling cipher suite values never name a real cipher.
    pub fn is_signaling(&self) -> bool {
        matches!(
            self,
            CipherSuite::TLS_EMPTY_RENEGOTIATION_INFO_SCSV | CipherSuite::TLS_FALLBACK_SCSV
        )
    }

    pub fn is_null(&self) -> bool {
        *self == CipherSuite::TLS_NULL_WITH_NULL_NULL
    }

    /// Whether the suite uses elliptic curve key exchange.
    pub fn uses_ecc(&self) -> bool {
        // 0xC0xx and 0xCCA8..0xCCAE are the ECC registry ranges.
        let v = self.as_u16();
        (v >> 8) == 0xC0 || (0xCCA8..=0xCCAE).contains(&v)
    }

    /// AEAD suites (and anything defined after TLS 1.1) need DTLS 1.2.
    pub fn is_valid_for_version(&self, version: ProtocolVersion) -> bool {
        if self.is_null() || self.is_signaling() {
            return false;
        }
        match self {
            CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA
            | CipherSuite::TLS_RSA_WITH_AES_256_CBC_SHA => version.is_dtls(),
            _ => version.has_signature_algorithms(),
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], CipherSuite> {
        let (input, value) = be_u16(input)?;
        Ok((input, Self::from_u16(value)))
    }
}

impl Default for CipherSuite {
    fn default() -> Self {
        CipherSuite::TLS_NULL_WITH_NULL_NULL
    }
}
