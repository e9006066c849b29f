//! Short opaque identifiers carried with a one-byte length.

use std::fmt;
use std::ops::Deref;

use nom::error::{Error, ErrorKind};
use nom::{Err, IResult};

use super::opaque8;
use crate::buffer::Buf;

#[derive(Debug, thiserror::Error)]
#[error("{kind} of {len} bytes, at most {max} allowed")]
pub struct InvalidLength {
    kind: &'static str,
    len: usize,
    max: usize,
}

/// Fixed-capacity storage, so ids are `Copy` and need no allocation.
macro_rules! bounded_id {
    ($(#[$meta:meta])* $name:ident, $max:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy)]
        pub struct $name {
            bytes: [u8; $max],
            len: usize,
        }

        impl $name {
            pub const MAX_LEN: usize = $max;

            pub fn empty() -> Self {
                $name {
                    bytes: [0; $max],
                    len: 0,
                }
            }

            pub fn try_new(data: &[u8]) -> Result<Self, InvalidLength> {
                if data.len() > $max {
                    return Err(InvalidLength {
                        kind: stringify!($name),
                        len: data.len(),
                        max: $max,
                    });
                }
                let mut id = Self::empty();
                id.bytes[..data.len()].copy_from_slice(data);
                id.len = data.len();
                Ok(id)
            }

            pub fn parse(input: &[u8]) -> IResult<&[u8], Self> {
                let (rest, data) = opaque8(input)?;
                let id = Self::try_new(data)
                    .map_err(|_| Err::Failure(Error::new(input, ErrorKind::LengthValue)))?;
                Ok((rest, id))
            }

            pub fn serialize(&self, output: &mut Buf) {
                output.put_opaque8(self);
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::empty()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}(", stringify!($name))?;
                for b in self.iter() {
                    write!(f, "{:02x}", b)?;
                }
                write!(f, ")")
            }
        }

        impl PartialEq for $name {
            fn eq(&self, other: &Self) -> bool {
                **self == **other
            }
        }

        impl Eq for $name {}

        impl Deref for $name {
            type Target = [u8];

            fn deref(&self) -> &[u8] {
                &self.bytes[..self.len]
            }
        }

        impl TryFrom<&[u8]> for $name {
            type Error = InvalidLength;

            fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
                Self::try_new(value)
            }
        }
    };
}

bounded_id!(
    /// Session id, empty when the server will not cache the session.
    SessionId,
    32
);
bounded_id!(
    /// HelloVerifyRequest cookie.
    Cookie,
    255
);
