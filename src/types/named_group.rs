use nom::number::complete::be_u16;
use nom::IResult;

/// Elliptic curve groups (RFC 8422 / RFC 7919 registry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NamedGroup {
    #[default]
    Secp256r1,
    Secp384r1,
    Secp521r1,
    X25519,
    X448,
    Unknown(u16),
}

impl NamedGroup {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0x0017 => NamedGroup::Secp256r1,
            0x0018 => NamedGroup::Secp384r1,
            0x0019 => NamedGroup::Secp521r1,
            0x001D => NamedGroup::X25519,
            0x001E => NamedGroup::X448,
            _ => NamedGroup::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            NamedGroup::Secp256r1 => 0x0017,
            NamedGroup::Secp384r1 => 0x0018,
            NamedGroup::Secp521r1 => 0x0019,
            NamedGroup::X25519 => 0x001D,
            NamedGroup::X448 => 0x001E,
            NamedGroup::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], NamedGroup> {
        let (input, value) = be_u16(input)?;
        Ok((input, NamedGroup::from_u16(value)))
    }
}

u8_registry! {
    /// ECParameters curve_type (RFC 8422 5.4). Only named curves are used.
    pub enum CurveType {
        ExplicitPrime => 1,
        ExplicitChar2 => 2,
        NamedCurve => 3,
    }
}
