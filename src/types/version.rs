use std::fmt;

use nom::number::complete::be_u16;
use nom::IResult;

use crate::buffer::Buf;

/// Wire protocol version.
///
/// DTLS versions are the one's complement of the TLS versions they map to, so
/// a numerically *smaller* value is a *newer* version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolVersion {
    DTLS1_0,
    DTLS1_2,
    DTLS1_3,
    Unknown(u16),
}

impl ProtocolVersion {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0xFEFF => ProtocolVersion::DTLS1_0,
            0xFEFD => ProtocolVersion::DTLS1_2,
            0xFEFC => ProtocolVersion::DTLS1_3,
            _ => ProtocolVersion::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            ProtocolVersion::DTLS1_0 => 0xFEFF,
            ProtocolVersion::DTLS1_2 => 0xFEFD,
            ProtocolVersion::DTLS1_3 => 0xFEFC,
            ProtocolVersion::Unknown(value) => *value,
        }
    }

    /// Whether the version belongs to the datagram family (major byte 0xFE).
    pub fn is_dtls(&self) -> bool {
        self.as_u16() >> 8 == 0xFE
    }

    /// Whether `self` is a newer DTLS version than `other`.
    pub fn is_later_than(&self, other: ProtocolVersion) -> bool {
        self.is_dtls() && other.is_dtls() && self.as_u16() < other.as_u16()
    }

    /// Whether `self` is the same as or older than `other`.
    pub fn is_equal_or_earlier(&self, other: ProtocolVersion) -> bool {
        !self.is_later_than(other)
    }

    /// Whether signature_algorithms negotiation (TLS 1.2) applies.
    pub fn has_signature_algorithms(&self) -> bool {
        !ProtocolVersion::DTLS1_2.is_later_than(*self)
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], ProtocolVersion> {
        let (input, version) = be_u16(input)?;
        Ok((input, Self::from_u16(version)))
    }

    pub fn serialize(&self, output: &mut Buf) {
        output.extend_from_slice(&self.as_u16().to_be_bytes());
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolVersion::DTLS1_0 => write!(f, "DTLS 1.0"),
            ProtocolVersion::DTLS1_2 => write!(f, "DTLS 1.2"),
            ProtocolVersion::DTLS1_3 => write!(f, "DTLS 1.3"),
            ProtocolVersion::Unknown(v) => write!(f, "Unknown({:04x})", v),
        }
    }
}
