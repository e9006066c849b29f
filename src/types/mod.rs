//! Protocol enumerations shared by the record layer, the codecs and the
//! handshake state machines.

/// A one-byte code point registry: the listed values plus `Unknown` for
/// anything else, with `from_u8`, `as_u8` and a nom `parse`.
macro_rules! u8_registry {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $value:literal ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $( $(#[$vmeta])* $variant, )*
            Unknown(u8),
        }

        impl $name {
            pub fn from_u8(value: u8) -> Self {
                match value {
                    $( $value => $name::$variant, )*
                    _ => $name::Unknown(value),
                }
            }

            pub fn as_u8(&self) -> u8 {
                match self {
                    $( $name::$variant => $value, )*
                    $name::Unknown(value) => *value,
                }
            }

            pub fn parse(input: &[u8]) -> nom::IResult<&[u8], $name> {
                let (input, value) = nom::number::complete::be_u8(input)?;
                Ok((input, $name::from_u8(value)))
            }
        }
    };
}

mod alert;
pub use alert::{Alert, AlertDescription, AlertLevel};

mod cipher_suite;
pub use cipher_suite::CipherSuite;

mod comp_meth;
pub use comp_meth::CompressionMethod;

mod ctype;
pub use ctype::ContentType;

mod handshake;
pub use handshake::HandshakeType;

mod named_group;
pub use named_group::{CurveType, NamedGroup};

mod signature;
pub use signature::{ClientCertificateType, HashAlgorithm};
pub use signature::{SignatureAlgorithm, SignatureAndHashAlgorithm};

mod version;
pub use version::ProtocolVersion;

/// Which side of the connection an endpoint is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEnd {
    Client,
    Server,
}
